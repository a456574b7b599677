//! Runtime fallback for registering a recipient's declared interests when
//! only an `Arc<dyn Any + Send + Sync>` is at hand.
//!
//! Prefer [`MessengerExt::register_all`](crate::MessengerExt::register_all),
//! which is resolved at compile time. Discovery only works for types that
//! were [`declare`]d first, either by hand or through
//! `#[derive(Subscriber)]` with `#[discoverable]`, which declares the type
//! from a static constructor at program start.

use std::{
    any::{Any, TypeId},
    sync::Arc,
};

use dashmap::DashMap;
use lazy_static::lazy_static;

use crate::{
    error::Error, message::DefaultToken, recipient::Subscriber, Messenger,
    StrongReferenceMessenger, WeakReferenceMessenger,
};

type Registrar<X> = fn(&X, Arc<dyn Any + Send + Sync>) -> Result<(), Error>;

lazy_static! {
    static ref DECLARED: DashMap<TypeId, sealed::Declared> = DashMap::new();
}

mod sealed {
    use super::*;

    #[derive(Clone, Copy)]
    pub struct Declared {
        pub type_name: &'static str,
        pub strong: Registrar<StrongReferenceMessenger>,
        pub weak: Registrar<WeakReferenceMessenger>,
    }

    pub trait Sealed: Sized {
        fn pick(declared: &Declared) -> Registrar<Self>;
    }

    impl Sealed for StrongReferenceMessenger {
        fn pick(declared: &Declared) -> Registrar<Self> {
            declared.strong
        }
    }

    impl Sealed for WeakReferenceMessenger {
        fn pick(declared: &Declared) -> Registrar<Self> {
            declared.weak
        }
    }
}

/// Messengers that can register discovered recipients.
pub trait DiscoveryTarget: Messenger + sealed::Sealed {}

impl DiscoveryTarget for StrongReferenceMessenger {}
impl DiscoveryTarget for WeakReferenceMessenger {}

/// Makes `R` discoverable. Declaring a type twice is harmless.
pub fn declare<R: Subscriber>() {
    let declared = sealed::Declared {
        type_name: std::any::type_name::<R>(),
        strong: subscribe_erased::<StrongReferenceMessenger, R>,
        weak: subscribe_erased::<WeakReferenceMessenger, R>,
    };

    if DECLARED.insert(TypeId::of::<R>(), declared).is_none() {
        log::trace!("declared {} for discovery", declared.type_name);
    }
}

#[inline]
pub fn is_declared<R: Any>() -> bool {
    DECLARED.contains_key(&TypeId::of::<R>())
}

/// Registers every interest of `recipient`'s concrete type on the default
/// channel.
///
/// Fails with [`Error::UndeclaredRecipient`] if the type was never declared.
pub fn register_discovered<X: DiscoveryTarget>(
    messenger: &X,
    recipient: Arc<dyn Any + Send + Sync>,
) -> Result<(), Error> {
    let type_id = (*recipient).type_id();

    let declared = match DECLARED.get(&type_id) {
        Some(declared) => *declared,
        None => return Err(Error::UndeclaredRecipient(type_id)),
    };

    log::trace!("registering discovered {}", declared.type_name);

    X::pick(&declared)(messenger, recipient)
}

fn subscribe_erased<X: Messenger, R: Subscriber>(
    messenger: &X,
    recipient: Arc<dyn Any + Send + Sync>,
) -> Result<(), Error> {
    match recipient.downcast::<R>() {
        Ok(recipient) => R::subscribe(&recipient, messenger, DefaultToken),
        Err(_) => Err(Error::UndeclaredRecipient(TypeId::of::<R>())),
    }
}

use core::fmt;
use std::sync::Arc;

use crate::{error::Error, message::Token, Message, Messenger};

/// Identity of a registered recipient.
///
/// Two ids are equal iff they were taken from the same `Arc` allocation; the
/// recipient's own `PartialEq`/`Hash` (if any) are never consulted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecipientId(usize);

impl RecipientId {
    #[inline]
    pub fn of<R: ?Sized>(recipient: &Arc<R>) -> Self {
        Self(Arc::as_ptr(recipient) as *const () as usize)
    }
}

impl fmt::Debug for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecipientId({:#x})", self.0)
    }
}

/// A recipient that knows how to handle `M` on its own.
pub trait Recipient<M: Message>: Send + Sync + 'static {
    fn receive(&self, message: &mut M);
}

/// A recipient declaring every message it is interested in.
///
/// Usually produced by `#[derive(Subscriber)]`:
///
/// ```rust,ignore
/// #[derive(Subscriber)]
/// #[receives(Ping, Pong)]
/// struct Player;
///
/// impl Recipient<Ping> for Player { .. }
/// impl Recipient<Pong> for Player { .. }
///
/// messenger.register_all_default(&Arc::new(Player))?;
/// ```
pub trait Subscriber: Send + Sync + Sized + 'static {
    fn subscribe<X, T>(this: &Arc<Self>, messenger: &X, token: T) -> Result<(), Error>
    where
        X: Messenger,
        T: Token + Clone;
}

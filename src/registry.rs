use std::sync::Arc;

use crate::{
    error::Error,
    message::{DefaultToken, Message, Token},
    messages::Request,
    recipient::{Recipient, Subscriber},
};

/// A registry routing messages from senders to the recipients registered for
/// them, partitioned into channels by token.
///
/// Handlers always run on the sending thread, after the registry lock has
/// been released, so they are free to register, unregister or send.
pub trait Messenger: Send + Sync + 'static {
    /// Whether `recipient` has a handler for `M` on the `token` channel.
    fn is_registered<M, T, R>(&self, recipient: &Arc<R>, token: &T) -> bool
    where
        M: Message,
        T: Token,
        R: Send + Sync + 'static;

    /// Registers `handler` for `M` messages sent on the `token` channel.
    ///
    /// Fails with [`Error::DuplicateRegistration`] if `recipient` already has
    /// a handler for this message type and token; the existing handler stays.
    fn register<M, T, R, F>(&self, recipient: &Arc<R>, token: T, handler: F) -> Result<(), Error>
    where
        M: Message,
        T: Token,
        R: Send + Sync + 'static,
        F: Fn(&R, &mut M) + Send + Sync + 'static;

    /// Removes the handler `recipient` registered for `M` on `token`.
    fn unregister<M, T, R>(&self, recipient: &Arc<R>, token: &T)
    where
        M: Message,
        T: Token,
        R: Send + Sync + 'static;

    /// Removes every registration of `recipient`, on every channel.
    fn unregister_all<R>(&self, recipient: &Arc<R>)
    where
        R: Send + Sync + 'static;

    /// Removes every registration of `recipient` made with exactly `token`,
    /// whatever the message type.
    fn unregister_all_on_channel<T, R>(&self, recipient: &Arc<R>, token: &T)
    where
        T: Token,
        R: Send + Sync + 'static;

    /// Delivers `message` to every handler registered for `M` on `token`
    /// and hands the message back.
    fn send<M, T>(&self, message: M, token: T) -> M
    where
        M: Message,
        T: Token;

    /// Reclaims bookkeeping left behind by recipients that are gone.
    fn cleanup(&self) {}

    /// Drops every registration.
    fn reset(&self);
}

/// Conveniences available on every [`Messenger`].
pub trait MessengerExt: Messenger {
    #[inline]
    fn is_registered_default<M, R>(&self, recipient: &Arc<R>) -> bool
    where
        M: Message,
        R: Send + Sync + 'static,
    {
        self.is_registered::<M, _, _>(recipient, &DefaultToken)
    }

    #[inline]
    fn register_default<M, R, F>(&self, recipient: &Arc<R>, handler: F) -> Result<(), Error>
    where
        M: Message,
        R: Send + Sync + 'static,
        F: Fn(&R, &mut M) + Send + Sync + 'static,
    {
        self.register::<M, _, _, _>(recipient, DefaultToken, handler)
    }

    #[inline]
    fn unregister_default<M, R>(&self, recipient: &Arc<R>)
    where
        M: Message,
        R: Send + Sync + 'static,
    {
        self.unregister::<M, _, _>(recipient, &DefaultToken)
    }

    #[inline]
    fn send_default<M: Message>(&self, message: M) -> M {
        self.send(message, DefaultToken)
    }

    /// Sends a freshly defaulted `M` on the default channel.
    #[inline]
    fn send_new<M: Message + Default>(&self) -> M {
        self.send(M::default(), DefaultToken)
    }

    /// Registers `recipient`'s own [`Recipient<M>`] implementation.
    fn register_recipient<M, T, R>(&self, recipient: &Arc<R>, token: T) -> Result<(), Error>
    where
        M: Message,
        T: Token,
        R: Recipient<M>,
    {
        self.register::<M, _, _, _>(recipient, token, |r: &R, message: &mut M| {
            r.receive(message)
        })
    }

    #[inline]
    fn register_recipient_default<M, R>(&self, recipient: &Arc<R>) -> Result<(), Error>
    where
        M: Message,
        R: Recipient<M>,
    {
        self.register_recipient::<M, _, _>(recipient, DefaultToken)
    }

    /// Registers every message `recipient` declares through [`Subscriber`].
    ///
    /// Registrations made before a failure are kept.
    #[inline]
    fn register_all<R, T>(&self, recipient: &Arc<R>, token: T) -> Result<(), Error>
    where
        Self: Sized,
        R: Subscriber,
        T: Token + Clone,
    {
        R::subscribe(recipient, self, token)
    }

    #[inline]
    fn register_all_default<R>(&self, recipient: &Arc<R>) -> Result<(), Error>
    where
        Self: Sized,
        R: Subscriber,
    {
        self.register_all(recipient, DefaultToken)
    }

    /// Sends `request` and extracts the response a recipient stored in it.
    fn request<M, T>(&self, request: M, token: T) -> Result<M::Response, Error>
    where
        M: Request,
        T: Token,
    {
        self.send(request, token)
            .into_response()
            .ok_or_else(Error::no_response::<M>)
    }

    #[inline]
    fn request_default<M: Request>(&self, request: M) -> Result<M::Response, Error> {
        self.request(request, DefaultToken)
    }
}

impl<X: Messenger> MessengerExt for X {}

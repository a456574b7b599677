//! Ready-made message types, including the request/response family used by
//! [`MessengerExt::request`](crate::MessengerExt::request).

use core::fmt;

use futures::future::{BoxFuture, FutureExt, JoinAll};

use crate::{error::Error, message::Message};

/// A message a recipient can answer in place.
pub trait Request: Message {
    type Response;

    /// The response stored by a recipient, if any.
    fn into_response(self) -> Option<Self::Response>;
}

/// Holds at most one response. The first reply wins; later ones are refused.
pub struct ResponseSlot<T> {
    value: Option<T>,
}

impl<T> ResponseSlot<T> {
    pub fn new() -> Self {
        Self { value: None }
    }

    pub fn reply(&mut self, value: T) -> Result<(), Error> {
        if self.value.is_some() {
            return Err(Error::ResponseAlreadySet);
        }

        self.value = Some(value);
        Ok(())
    }

    #[inline]
    pub fn has_response(&self) -> bool {
        self.value.is_some()
    }

    #[inline]
    pub fn response(&self) -> Option<&T> {
        self.value.as_ref()
    }

    #[inline]
    pub fn into_inner(self) -> Option<T> {
        self.value
    }
}

impl<T> Default for ResponseSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ResponseSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResponseSlot").field(&self.value).finish()
    }
}

/// A request without payload, answered with a single `T`.
#[derive(Debug)]
pub struct RequestMessage<T> {
    slot: ResponseSlot<T>,
}

impl<T: Send + 'static> RequestMessage<T> {
    pub fn new() -> Self {
        Self {
            slot: ResponseSlot::new(),
        }
    }

    #[inline]
    pub fn reply(&mut self, value: T) -> Result<(), Error> {
        self.slot.reply(value)
    }

    #[inline]
    pub fn has_response(&self) -> bool {
        self.slot.has_response()
    }

    #[inline]
    pub fn response(&self) -> Option<&T> {
        self.slot.response()
    }
}

impl<T: Send + 'static> Default for RequestMessage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Request for RequestMessage<T> {
    type Response = T;

    fn into_response(self) -> Option<T> {
        self.slot.into_inner()
    }
}

/// A request every recipient may answer. Always yields the (possibly empty)
/// list of replies, in delivery order.
#[derive(Debug)]
pub struct CollectionRequestMessage<T> {
    responses: Vec<T>,
}

impl<T: Send + 'static> CollectionRequestMessage<T> {
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
        }
    }

    #[inline]
    pub fn reply(&mut self, value: T) {
        self.responses.push(value)
    }

    #[inline]
    pub fn responses(&self) -> &[T] {
        &self.responses
    }
}

impl<T: Send + 'static> Default for CollectionRequestMessage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Request for CollectionRequestMessage<T> {
    type Response = Vec<T>;

    fn into_response(self) -> Option<Vec<T>> {
        Some(self.responses)
    }
}

/// A request answered with a future; the requester awaits the returned
/// future once `send` is over.
pub struct AsyncRequestMessage<T> {
    slot: ResponseSlot<BoxFuture<'static, T>>,
}

impl<T: Send + 'static> AsyncRequestMessage<T> {
    pub fn new() -> Self {
        Self {
            slot: ResponseSlot::new(),
        }
    }

    pub fn reply(&mut self, value: T) -> Result<(), Error> {
        self.slot.reply(futures::future::ready(value).boxed())
    }

    pub fn reply_with<F>(&mut self, fut: F) -> Result<(), Error>
    where
        F: core::future::Future<Output = T> + Send + 'static,
    {
        self.slot.reply(fut.boxed())
    }

    #[inline]
    pub fn has_response(&self) -> bool {
        self.slot.has_response()
    }
}

impl<T: Send + 'static> Default for AsyncRequestMessage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Request for AsyncRequestMessage<T> {
    type Response = BoxFuture<'static, T>;

    fn into_response(self) -> Option<Self::Response> {
        self.slot.into_inner()
    }
}

/// Like [`CollectionRequestMessage`], with every reply produced asynchronously.
pub struct AsyncCollectionRequestMessage<T> {
    responses: Vec<BoxFuture<'static, T>>,
}

impl<T: Send + 'static> AsyncCollectionRequestMessage<T> {
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
        }
    }

    pub fn reply(&mut self, value: T) {
        self.responses.push(futures::future::ready(value).boxed())
    }

    pub fn reply_with<F>(&mut self, fut: F)
    where
        F: core::future::Future<Output = T> + Send + 'static,
    {
        self.responses.push(fut.boxed())
    }
}

impl<T: Send + 'static> Default for AsyncCollectionRequestMessage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Request for AsyncCollectionRequestMessage<T> {
    type Response = JoinAll<BoxFuture<'static, T>>;

    fn into_response(self) -> Option<Self::Response> {
        Some(futures::future::join_all(self.responses))
    }
}

/// Notifies that a value changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChangedMessage<T> {
    pub value: T,
}

impl<T> ValueChangedMessage<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

/// Notifies that a named property moved from `old_value` to `new_value`.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChangedMessage<T> {
    pub property_name: String,
    pub old_value: T,
    pub new_value: T,
}

impl<T> PropertyChangedMessage<T> {
    pub fn new(property_name: impl Into<String>, old_value: T, new_value: T) -> Self {
        Self {
            property_name: property_name.into(),
            old_value,
            new_value,
        }
    }
}

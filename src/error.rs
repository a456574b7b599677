#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Duplicate Registration: recipient already handles {message} on this {token} channel")]
    DuplicateRegistration {
        message: &'static str,
        token: &'static str,
    },

    #[error("No Response Received for request {request}")]
    NoResponseReceived { request: &'static str },

    #[error("Response already set: a recipient has already replied to this request")]
    ResponseAlreadySet,

    #[error("Undeclared Recipient: type ({0:?}) was never declared for discovery")]
    UndeclaredRecipient(std::any::TypeId),
}

impl Error {
    pub(crate) fn duplicate<M, T>() -> Self {
        Error::DuplicateRegistration {
            message: std::any::type_name::<M>(),
            token: std::any::type_name::<T>(),
        }
    }

    pub(crate) fn no_response<M>() -> Self {
        Error::NoResponseReceived {
            request: std::any::type_name::<M>(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

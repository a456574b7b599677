use core::any::TypeId;
use core::fmt;
use core::hash::{Hash, Hasher};

use crate::message::{Message, Token};

/// Partitions a registry by (message type, token type).
#[derive(Clone, Copy)]
pub struct ChannelKey {
    message: TypeId,
    token: TypeId,
    message_name: &'static str,
    token_name: &'static str,
}

impl ChannelKey {
    #[inline]
    pub fn of<M: Message, T: Token>() -> Self {
        Self {
            message: TypeId::of::<M>(),
            token: TypeId::of::<T>(),
            message_name: std::any::type_name::<M>(),
            token_name: std::any::type_name::<T>(),
        }
    }

    #[inline]
    pub fn message_type(&self) -> TypeId {
        self.message
    }

    #[inline]
    pub fn token_type(&self) -> TypeId {
        self.token
    }

    #[inline]
    pub fn has_token<T: Token>(&self) -> bool {
        self.token == TypeId::of::<T>()
    }
}

impl PartialEq for ChannelKey {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message && self.token == other.token
    }
}

impl Eq for ChannelKey {}

impl Hash for ChannelKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.message.hash(state);
        self.token.hash(state);
    }
}

impl fmt::Debug for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.message_name, self.token_name)
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

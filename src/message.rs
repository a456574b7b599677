use core::any::Any;
use core::hash::Hash;

/// Anything that can travel through a messenger.
pub trait Message: Any + Send + 'static {}
impl<T: Any + Send> Message for T {}

/// A value selecting a channel. Two registrations share a channel when their
/// tokens have the same type and compare equal.
pub trait Token: Any + Eq + Hash + Send + Sync + 'static {}
impl<T: Any + Eq + Hash + Send + Sync> Token for T {}

/// Token of the default channel, used by the `*_default` helpers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefaultToken;

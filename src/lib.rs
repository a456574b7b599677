//! In-process typed publish/subscribe.
//!
//! Components register handlers for a message type on a channel (selected
//! by a token value) and other components send messages without holding a
//! reference to any recipient. Two registries are provided:
//! [`StrongReferenceMessenger`] keeps its recipients alive, while
//! [`WeakReferenceMessenger`] lets them go once nobody else owns them.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use messenger::{Messenger, MessengerExt, StrongReferenceMessenger};
//!
//! struct LoggedIn(String);
//! struct Sidebar;
//!
//! let messenger = StrongReferenceMessenger::new();
//! let sidebar = Arc::new(Sidebar);
//!
//! messenger.register_default(&sidebar, |_: &Sidebar, msg: &mut LoggedIn| {
//!     println!("welcome {}", msg.0);
//! })?;
//!
//! messenger.send_default(LoggedIn("ada".into()));
//! ```

extern crate self as messenger;

mod channel;
mod config;
pub mod discovery;
mod error;
mod mapping;
mod message;
pub mod messages;
mod recipient;
mod registry;
mod strong;
mod typed_pool;
mod weak;

pub use channel::ChannelKey;
pub use config::MessengerConfig;
pub use error::{Error, Result};
pub use message::{DefaultToken, Message, Token};
pub use messages::Request;
pub use recipient::{Recipient, RecipientId, Subscriber};
pub use registry::{Messenger, MessengerExt};
pub use strong::StrongReferenceMessenger;
pub use typed_pool::{Pooled, TypedPool};
pub use weak::WeakReferenceMessenger;

pub mod derive {
    pub use messenger_derive::*;
}

pub use messenger_derive::Subscriber;

#[doc(hidden)]
pub mod __private {
    pub use ctor;
}

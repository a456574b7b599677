use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use lazy_static::lazy_static;
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::{
    channel::ChannelKey,
    config::MessengerConfig,
    error::Error,
    mapping::{self, AnyRecipient, ChannelTable, Delivery, Garbage},
    message::{Message, Token},
    recipient::RecipientId,
    typed_pool::TypedPool,
    Messenger,
};

lazy_static! {
    static ref GLOBAL: StrongReferenceMessenger = StrongReferenceMessenger::new();
}

#[derive(Default)]
struct Registry {
    /// Every channel a recipient has at least one handler on.
    recipients: HashMap<RecipientId, HashSet<ChannelKey>>,
    channels: ChannelTable,
}

impl Registry {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            recipients: HashMap::with_capacity(capacity),
            channels: HashMap::with_capacity(capacity),
        }
    }

    fn forget(&mut self, id: RecipientId, key: &ChannelKey) {
        let now_empty = match self.recipients.get_mut(&id) {
            Some(keys) => {
                keys.remove(key);
                keys.is_empty()
            }
            None => false,
        };

        if now_empty {
            self.recipients.remove(&id);
        }
    }
}

struct Inner {
    registry: Mutex<Registry>,
    pool: TypedPool,
}

/// Messenger keeping every registered recipient alive until it is
/// unregistered.
///
/// Cloning is cheap and yields a handle onto the same registry.
#[derive(Clone)]
pub struct StrongReferenceMessenger {
    inner: Arc<Inner>,
}

impl StrongReferenceMessenger {
    pub fn new() -> Self {
        Self::with_config(MessengerConfig::default())
    }

    pub fn with_config(config: MessengerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry::with_capacity(config.initial_capacity)),
                pool: TypedPool::new(config.max_pooled_buffers),
            }),
        }
    }

    /// The process-wide instance, created on first use.
    pub fn global() -> &'static StrongReferenceMessenger {
        &GLOBAL
    }

    /// Number of live channels, i.e. (message, token) type pairs with at
    /// least one handler.
    pub fn channel_count(&self) -> usize {
        self.inner.registry.lock().channels.len()
    }

    /// Number of distinct recipients with at least one handler.
    pub fn recipient_count(&self) -> usize {
        self.inner.registry.lock().recipients.len()
    }
}

impl Default for StrongReferenceMessenger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StrongReferenceMessenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.registry.lock();

        f.debug_struct("StrongReferenceMessenger")
            .field("channels", &registry.channels.len())
            .field("recipients", &registry.recipients.len())
            .finish()
    }
}

impl Messenger for StrongReferenceMessenger {
    fn is_registered<M, T, R>(&self, recipient: &Arc<R>, token: &T) -> bool
    where
        M: Message,
        T: Token,
        R: Send + Sync + 'static,
    {
        let registry = self.inner.registry.lock();

        mapping::lookup::<M, T, AnyRecipient>(&registry.channels)
            .map_or(false, |channel| channel.contains(RecipientId::of(recipient), token))
    }

    fn register<M, T, R, F>(&self, recipient: &Arc<R>, token: T, handler: F) -> Result<(), Error>
    where
        M: Message,
        T: Token,
        R: Send + Sync + 'static,
        F: Fn(&R, &mut M) + Send + Sync + 'static,
    {
        let id = RecipientId::of(recipient);
        let key = ChannelKey::of::<M, T>();
        let target: AnyRecipient = recipient.clone();
        let handler = mapping::erase_handler(handler);
        let mut garbage = Garbage::new();

        let res = {
            let mut registry = self.inner.registry.lock();
            let res = mapping::insert_into(
                &mut registry.channels,
                id,
                target,
                token,
                handler,
                &mut garbage,
            );

            if res.is_ok() {
                registry
                    .recipients
                    .entry(id)
                    .or_insert_with(HashSet::new)
                    .insert(key);
            }

            res
        };

        // a rejected handler is dropped only once the lock is released
        drop(garbage);

        match res {
            Ok(()) => log::trace!("registered {:?} on {}", id, key),
            Err(ref err) => log::debug!("register {:?} on {}: {}", id, key, err),
        }

        res
    }

    fn unregister<M, T, R>(&self, recipient: &Arc<R>, token: &T)
    where
        M: Message,
        T: Token,
        R: Send + Sync + 'static,
    {
        let id = RecipientId::of(recipient);
        let key = ChannelKey::of::<M, T>();
        let mut garbage = Garbage::new();

        let removed = {
            let mut registry = self.inner.registry.lock();
            let left = mapping::remove_from::<M, T, AnyRecipient>(
                &mut registry.channels,
                id,
                token,
                &mut garbage,
            );

            if left == Some(true) {
                registry.forget(id, &key);
            }

            left.is_some()
        };

        drop(garbage);

        if removed {
            log::trace!("unregistered {:?} from {}", id, key);
        }
    }

    fn unregister_all<R>(&self, recipient: &Arc<R>)
    where
        R: Send + Sync + 'static,
    {
        let id = RecipientId::of(recipient);
        let mut garbage = Garbage::new();
        let mut removed = 0;

        {
            let mut registry = self.inner.registry.lock();
            let Registry {
                recipients,
                channels,
            } = &mut *registry;

            let keys = match recipients.remove(&id) {
                Some(keys) => keys,
                None => return,
            };

            for key in &keys {
                let emptied = channels.get_mut(key).map_or(false, |channel| {
                    removed += channel.remove_recipient(id, &mut garbage);
                    channel.is_empty()
                });

                if emptied {
                    if let Some(channel) = channels.remove(key) {
                        log::trace!("dropped empty channel {}", channel.key());
                    }
                }
            }
        }

        drop(garbage);

        log::trace!("unregistered {:?} ({} handlers)", id, removed);
    }

    fn unregister_all_on_channel<T, R>(&self, recipient: &Arc<R>, token: &T)
    where
        T: Token,
        R: Send + Sync + 'static,
    {
        let id = RecipientId::of(recipient);
        let mut garbage = Garbage::new();

        {
            let mut registry = self.inner.registry.lock();
            let Registry {
                recipients,
                channels,
            } = &mut *registry;

            let keys = match recipients.get_mut(&id) {
                Some(keys) => keys,
                None => return,
            };

            let mut drained: SmallVec<[ChannelKey; 8]> = SmallVec::new();
            keys.retain(|key| {
                if !key.has_token::<T>() {
                    return true;
                }

                let channel = match channels.get_mut(key) {
                    Some(channel) => channel,
                    None => return false,
                };

                channel.remove_recipient_token(id, token, &mut garbage);
                if channel.is_empty() {
                    drained.push(channel.key());
                }

                channel.contains_recipient(id)
            });

            if keys.is_empty() {
                recipients.remove(&id);
            }

            for key in &drained {
                channels.remove(key);
            }
        }

        drop(garbage);
    }

    fn send<M, T>(&self, mut message: M, token: T) -> M
    where
        M: Message,
        T: Token,
    {
        let deliveries = {
            let registry = self.inner.registry.lock();
            let channel = match mapping::lookup::<M, T, AnyRecipient>(&registry.channels) {
                Some(channel) => channel,
                None => return message,
            };

            let mut buf = self
                .inner
                .pool
                .rent::<Delivery<M>>(channel.total_handler_count());

            channel.snapshot(&token, &mut buf);
            buf
        };

        log::trace!(
            "send {} to {} handlers",
            ChannelKey::of::<M, T>(),
            deliveries.len()
        );

        mapping::deliver(&deliveries, &mut message);

        message
    }

    fn reset(&self) {
        let dropped = {
            let mut registry = self.inner.registry.lock();
            std::mem::take(&mut *registry)
        };

        log::debug!(
            "reset: dropped {} channels, {} recipients",
            dropped.channels.len(),
            dropped.recipients.len()
        );

        // recipients and handlers may run drop code; the lock is released by now
        drop(dropped);
    }
}

use std::{
    collections::HashMap,
    fmt,
    num::NonZeroUsize,
    sync::{Arc, Weak},
};

use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::{
    channel::ChannelKey,
    config::MessengerConfig,
    error::Error,
    mapping::{self, ChannelTable, Delivery, Garbage, WeakRecipient},
    message::{Message, Token},
    recipient::RecipientId,
    typed_pool::TypedPool,
    Messenger,
};

lazy_static! {
    static ref GLOBAL: WeakReferenceMessenger = WeakReferenceMessenger::new();
}

#[derive(Default)]
struct Registry {
    channels: ChannelTable,
    registrations_since_sweep: usize,
}

impl Registry {
    /// Evicts collected or empty recipient entries, then every channel left
    /// without a live recipient. Returns (entries, channels) removed.
    fn sweep(&mut self, garbage: &mut Garbage) -> (usize, usize) {
        let before = self.channels.len();
        let mut entries = 0;

        self.channels.retain(|_, channel| {
            entries += channel.sweep(garbage);

            let keep = channel.has_live_recipients();
            if !keep {
                log::trace!("dropped dead channel {}", channel.key());
            }

            keep
        });

        self.registrations_since_sweep = 0;

        (entries, before - self.channels.len())
    }
}

struct Inner {
    registry: Mutex<Registry>,
    pool: TypedPool,
    auto_cleanup_interval: Option<NonZeroUsize>,
}

/// Messenger that only observes its recipients.
///
/// A recipient is delivered to for as long as some other owner keeps its
/// `Arc` alive; once the last one is dropped the registration is ignored,
/// and [`cleanup`](Messenger::cleanup) reclaims what it left behind.
///
/// Entries hold a `Weak`, which pins the allocation (not the value), so the
/// address used as [`RecipientId`] cannot be reused by another recipient
/// while a stale entry still refers to it.
#[derive(Clone)]
pub struct WeakReferenceMessenger {
    inner: Arc<Inner>,
}

impl WeakReferenceMessenger {
    pub fn new() -> Self {
        Self::with_config(MessengerConfig::default())
    }

    pub fn with_config(config: MessengerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry {
                    channels: HashMap::with_capacity(config.initial_capacity),
                    registrations_since_sweep: 0,
                }),
                pool: TypedPool::new(config.max_pooled_buffers),
                auto_cleanup_interval: config.auto_cleanup_interval,
            }),
        }
    }

    /// The process-wide instance, created on first use.
    pub fn global() -> &'static WeakReferenceMessenger {
        &GLOBAL
    }

    /// Number of channels with at least one entry, stale ones included until
    /// the next cleanup.
    pub fn channel_count(&self) -> usize {
        self.inner.registry.lock().channels.len()
    }
}

impl Default for WeakReferenceMessenger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WeakReferenceMessenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakReferenceMessenger")
            .field("channels", &self.channel_count())
            .field("auto_cleanup_interval", &self.inner.auto_cleanup_interval)
            .finish()
    }
}

impl Messenger for WeakReferenceMessenger {
    fn is_registered<M, T, R>(&self, recipient: &Arc<R>, token: &T) -> bool
    where
        M: Message,
        T: Token,
        R: Send + Sync + 'static,
    {
        let registry = self.inner.registry.lock();

        mapping::lookup::<M, T, WeakRecipient>(&registry.channels)
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
        let target: WeakRecipient = Arc::downgrade(recipient) as Weak<R>;
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

            match self.inner.auto_cleanup_interval {
                Some(interval) if res.is_ok() => {
                    registry.registrations_since_sweep += 1;

                    if registry.registrations_since_sweep >= interval.get() {
                        let (entries, channels) = registry.sweep(&mut garbage);
                        log::debug!(
                            "auto cleanup: dropped {} entries, {} channels",
                            entries,
                            channels
                        );
                    }
                }
                _ => (),
            }

            res
        };

        // evicted handlers are dropped only once the lock is released
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
        let mut garbage = Garbage::new();

        let removed = mapping::remove_from::<M, T, WeakRecipient>(
            &mut self.inner.registry.lock().channels,
            id,
            token,
            &mut garbage,
        );

        drop(garbage);

        if removed.is_some() {
            log::trace!("unregistered {:?} from {}", id, ChannelKey::of::<M, T>());
        }
    }

    fn unregister_all<R>(&self, recipient: &Arc<R>)
    where
        R: Send + Sync + 'static,
    {
        let id = RecipientId::of(recipient);
        let mut garbage = Garbage::new();
        let mut removed = 0;

        self.inner.registry.lock().channels.retain(|_, channel| {
            removed += channel.remove_recipient(id, &mut garbage);

            let keep = !channel.is_empty();
            if !keep {
                log::trace!("dropped empty channel {}", channel.key());
            }

            keep
        });

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

        self.inner.registry.lock().channels.retain(|key, channel| {
            if key.has_token::<T>() {
                channel.remove_recipient_token(id, token, &mut garbage);
            }

            !channel.is_empty()
        });

        drop(garbage);
    }

    fn send<M, T>(&self, mut message: M, token: T) -> M
    where
        M: Message,
        T: Token,
    {
        let deliveries = {
            let registry = self.inner.registry.lock();
            let channel = match mapping::lookup::<M, T, WeakRecipient>(&registry.channels) {
                Some(channel) => channel,
                None => return message,
            };

            let mut buf = self
                .inner
                .pool
                .rent::<Delivery<M>>(channel.total_handler_count());

            // collected recipients fail to upgrade and are skipped here
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

    fn cleanup(&self) {
        let mut garbage = Garbage::new();
        let (entries, channels) = self.inner.registry.lock().sweep(&mut garbage);
        drop(garbage);

        log::debug!("cleanup: dropped {} entries, {} channels", entries, channels);
    }

    fn reset(&self) {
        let dropped = std::mem::take(&mut *self.inner.registry.lock());

        log::debug!("reset: dropped {} channels", dropped.channels.len());
    }
}

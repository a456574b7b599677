//! Per-channel registration table shared by both messenger flavours.
//!
//! A [`ChannelMapping`] maps each recipient to its token -> handler table for
//! one [`ChannelKey`]. The registries store mappings type-erased behind
//! [`ErasedChannel`] and recover the concrete type with a checked downcast
//! whenever the message and token types are known again.

use std::{
    any::Any,
    collections::HashMap,
    sync::{Arc, Weak},
};

use indexmap::{map::Entry, IndexMap};
use smallvec::SmallVec;

use crate::{
    channel::ChannelKey,
    error::Error,
    message::{Message, Token},
    recipient::RecipientId,
};

pub(crate) type AnyRecipient = Arc<dyn Any + Send + Sync>;
pub(crate) type WeakRecipient = Weak<dyn Any + Send + Sync>;
pub(crate) type Handler<M> = Arc<dyn Fn(&(dyn Any + Send + Sync), &mut M) + Send + Sync>;

/// One snapshotted (recipient, handler) pair, invoked after the lock is gone.
pub(crate) type Delivery<M> = (AnyRecipient, Handler<M>);

/// Handlers, tokens and recipients evicted while the registry lock was held.
///
/// Their `Drop` may call back into the messenger, so callers must only drop
/// this once the lock is released.
pub(crate) type Garbage = SmallVec<[Box<dyn Any + Send>; 4]>;

pub(crate) fn erase_handler<R, M, F>(handler: F) -> Handler<M>
where
    R: Send + Sync + 'static,
    M: Message,
    F: Fn(&R, &mut M) + Send + Sync + 'static,
{
    Arc::new(move |recipient: &(dyn Any + Send + Sync), message: &mut M| {
        if let Some(recipient) = recipient.downcast_ref::<R>() {
            handler(recipient, message)
        }
    })
}

/// How an entry refers to its recipient.
pub(crate) trait Target: Send + Sync + 'static {
    fn upgrade(&self) -> Option<AnyRecipient>;
    fn is_alive(&self) -> bool;
}

impl Target for AnyRecipient {
    #[inline]
    fn upgrade(&self) -> Option<AnyRecipient> {
        Some(self.clone())
    }

    #[inline]
    fn is_alive(&self) -> bool {
        true
    }
}

impl Target for WeakRecipient {
    #[inline]
    fn upgrade(&self) -> Option<AnyRecipient> {
        Weak::upgrade(self)
    }

    #[inline]
    fn is_alive(&self) -> bool {
        self.strong_count() > 0
    }
}

struct RecipientEntry<M, T, P> {
    target: P,
    handlers: HashMap<T, Handler<M>>,
}

impl<M, T: Token, P> RecipientEntry<M, T, P> {
    fn new(target: P, token: T, handler: Handler<M>) -> Self {
        let mut handlers = HashMap::with_capacity(1);
        handlers.insert(token, handler);

        Self { target, handlers }
    }
}

pub(crate) struct ChannelMapping<M, T, P> {
    key: ChannelKey,
    recipients: IndexMap<RecipientId, RecipientEntry<M, T, P>>,
    total_handler_count: usize,
}

impl<M: Message, T: Token, P: Target> ChannelMapping<M, T, P> {
    pub fn new() -> Self {
        Self {
            key: ChannelKey::of::<M, T>(),
            recipients: IndexMap::new(),
            total_handler_count: 0,
        }
    }

    #[inline]
    pub fn total_handler_count(&self) -> usize {
        self.total_handler_count
    }

    pub fn contains(&self, id: RecipientId, token: &T) -> bool {
        self.recipients.get(&id).map_or(false, |entry| {
            entry.target.is_alive() && entry.handlers.contains_key(token)
        })
    }

    /// Adds a handler; an occupied (recipient, token) slot is left untouched
    /// and the rejected registration goes to `garbage`.
    pub fn insert(
        &mut self,
        id: RecipientId,
        target: P,
        token: T,
        handler: Handler<M>,
        garbage: &mut Garbage,
    ) -> Result<(), Error> {
        match self.recipients.entry(id) {
            Entry::Occupied(mut slot) if !slot.get().target.is_alive() => {
                let stale = slot.insert(RecipientEntry::new(target, token, handler));
                self.total_handler_count -= stale.handlers.len();
                garbage.push(Box::new(stale));
            }

            Entry::Occupied(mut slot) => {
                let handlers = &mut slot.get_mut().handlers;
                if handlers.contains_key(&token) {
                    garbage.push(Box::new((token, handler, target)));
                    return Err(Error::duplicate::<M, T>());
                }

                handlers.insert(token, handler);
                garbage.push(Box::new(target));
            }

            Entry::Vacant(slot) => {
                slot.insert(RecipientEntry::new(target, token, handler));
            }
        }

        self.total_handler_count += 1;

        Ok(())
    }

    pub fn remove(&mut self, id: RecipientId, token: &T, garbage: &mut Garbage) -> bool {
        let entry = match self.recipients.get_mut(&id) {
            Some(entry) => entry,
            None => return false,
        };

        let removed = match entry.handlers.remove_entry(token) {
            Some(removed) => removed,
            None => return false,
        };

        let emptied = entry.handlers.is_empty();
        garbage.push(Box::new(removed));
        self.total_handler_count -= 1;

        if emptied {
            if let Some(entry) = self.recipients.swap_remove(&id) {
                garbage.push(Box::new(entry));
            }
        }

        true
    }

    /// Copies every live handler registered for exactly `token`, in table order.
    pub fn snapshot(&self, token: &T, out: &mut Vec<Delivery<M>>) {
        for entry in self.recipients.values() {
            if let Some(handler) = entry.handlers.get(token) {
                if let Some(recipient) = entry.target.upgrade() {
                    out.push((recipient, handler.clone()));
                }
            }
        }
    }
}

pub(crate) type ChannelTable = HashMap<ChannelKey, Box<dyn ErasedChannel>>;

pub(crate) fn lookup<M: Message, T: Token, P: Target>(
    table: &ChannelTable,
) -> Option<&ChannelMapping<M, T, P>> {
    table
        .get(&ChannelKey::of::<M, T>())
        .and_then(|channel| channel.as_any().downcast_ref())
}

pub(crate) fn lookup_mut<M: Message, T: Token, P: Target>(
    table: &mut ChannelTable,
) -> Option<&mut ChannelMapping<M, T, P>> {
    table
        .get_mut(&ChannelKey::of::<M, T>())
        .and_then(|channel| channel.as_any_mut().downcast_mut())
}

/// Adds a handler, creating the channel on first use.
pub(crate) fn insert_into<M: Message, T: Token, P: Target>(
    table: &mut ChannelTable,
    id: RecipientId,
    target: P,
    token: T,
    handler: Handler<M>,
    garbage: &mut Garbage,
) -> Result<(), Error> {
    if let Some(channel) = lookup_mut::<M, T, P>(table) {
        return channel.insert(id, target, token, handler, garbage);
    }

    let mut channel = ChannelMapping::<M, T, P>::new();
    channel.insert(id, target, token, handler, garbage)?;
    table.insert(ChannelKey::of::<M, T>(), Box::new(channel));

    Ok(())
}

/// Removes one handler, dropping the channel once it is empty.
///
/// Returns `None` if nothing was registered, otherwise whether `id` has no
/// handler left on this channel.
pub(crate) fn remove_from<M: Message, T: Token, P: Target>(
    table: &mut ChannelTable,
    id: RecipientId,
    token: &T,
    garbage: &mut Garbage,
) -> Option<bool> {
    let channel = lookup_mut::<M, T, P>(table)?;
    if !channel.remove(id, token, garbage) {
        return None;
    }

    let left = !channel.contains_recipient(id);
    if channel.is_empty() {
        table.remove(&ChannelKey::of::<M, T>());
    }

    Some(left)
}

/// Runs every snapshotted handler, in order.
pub(crate) fn deliver<M: Message>(deliveries: &[Delivery<M>], message: &mut M) {
    for (recipient, handler) in deliveries {
        (**handler)(&**recipient, message);
    }
}

/// Operations the registries need without knowing `M` or `T`.
pub(crate) trait ErasedChannel: Send + Sync + 'static {
    fn key(&self) -> ChannelKey;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn contains_recipient(&self, id: RecipientId) -> bool;

    /// Removes every handler of `id`, returning how many were removed.
    fn remove_recipient(&mut self, id: RecipientId, garbage: &mut Garbage) -> usize;

    /// Removes the handler of `id` for `token`, if `token` has this channel's
    /// token type.
    fn remove_recipient_token(
        &mut self,
        id: RecipientId,
        token: &dyn Any,
        garbage: &mut Garbage,
    ) -> usize;

    /// Removes entries whose recipient is gone or whose handler table is
    /// empty, keeping the order of the others.
    fn sweep(&mut self, garbage: &mut Garbage) -> usize;

    fn has_live_recipients(&self) -> bool;
    fn is_empty(&self) -> bool;
}

impl<M: Message, T: Token, P: Target> ErasedChannel for ChannelMapping<M, T, P> {
    fn key(&self) -> ChannelKey {
        self.key
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn contains_recipient(&self, id: RecipientId) -> bool {
        self.recipients.contains_key(&id)
    }

    fn remove_recipient(&mut self, id: RecipientId, garbage: &mut Garbage) -> usize {
        match self.recipients.swap_remove(&id) {
            Some(entry) => {
                let removed = entry.handlers.len();
                self.total_handler_count -= removed;
                garbage.push(Box::new(entry));
                removed
            }
            None => 0,
        }
    }

    fn remove_recipient_token(
        &mut self,
        id: RecipientId,
        token: &dyn Any,
        garbage: &mut Garbage,
    ) -> usize {
        match token.downcast_ref::<T>() {
            Some(token) => self.remove(id, token, garbage) as usize,
            None => 0,
        }
    }

    fn sweep(&mut self, garbage: &mut Garbage) -> usize {
        let before = self.recipients.len();
        let recipients = std::mem::replace(&mut self.recipients, IndexMap::with_capacity(before));

        for (id, entry) in recipients {
            if entry.target.is_alive() && !entry.handlers.is_empty() {
                self.recipients.insert(id, entry);
            } else {
                self.total_handler_count -= entry.handlers.len();
                garbage.push(Box::new(entry));
            }
        }

        before - self.recipients.len()
    }

    fn has_live_recipients(&self) -> bool {
        self.recipients.values().any(|entry| entry.target.is_alive())
    }

    fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;
    struct Counter;

    fn noop() -> Handler<Ping> {
        erase_handler(|_: &Counter, _: &mut Ping| {})
    }

    #[test]
    fn duplicate_token_is_rejected() {
        let recipient: AnyRecipient = Arc::new(Counter);
        let id = RecipientId::of(&recipient);
        let mut mapping = ChannelMapping::<Ping, u8, AnyRecipient>::new();
        let mut garbage = Garbage::new();

        mapping.insert(id, recipient.clone(), 1, noop(), &mut garbage).unwrap();
        mapping.insert(id, recipient.clone(), 2, noop(), &mut garbage).unwrap();

        assert!(matches!(
            mapping.insert(id, recipient, 1, noop(), &mut garbage),
            Err(Error::DuplicateRegistration { .. })
        ));
        assert_eq!(mapping.total_handler_count(), 2);
    }

    #[test]
    fn removing_last_token_drops_recipient() {
        let recipient: AnyRecipient = Arc::new(Counter);
        let id = RecipientId::of(&recipient);
        let mut mapping = ChannelMapping::<Ping, u8, AnyRecipient>::new();
        let mut garbage = Garbage::new();

        mapping.insert(id, recipient, 1, noop(), &mut garbage).unwrap();
        assert!(!mapping.remove(id, &2, &mut garbage));
        assert!(mapping.remove(id, &1, &mut garbage));
        assert!(!mapping.remove(id, &1, &mut garbage));

        assert!(ErasedChannel::is_empty(&mapping));
        assert_eq!(mapping.total_handler_count(), 0);
    }

    #[test]
    fn removed_entries_are_handed_back() {
        let recipient: AnyRecipient = Arc::new(Counter);
        let id = RecipientId::of(&recipient);
        let mut mapping = ChannelMapping::<Ping, u8, AnyRecipient>::new();
        let mut garbage = Garbage::new();

        mapping.insert(id, recipient.clone(), 1, noop(), &mut garbage).unwrap();
        mapping.insert(id, recipient.clone(), 2, noop(), &mut garbage).unwrap();
        garbage.clear();

        assert_eq!(mapping.remove_recipient(id, &mut garbage), 2);

        // the registry's clone survives until the caller lets go of it
        assert_eq!(Arc::strong_count(&recipient), 2);
        drop(garbage);
        assert_eq!(Arc::strong_count(&recipient), 1);
    }

    #[test]
    fn erased_token_removal_checks_token_type() {
        let recipient: AnyRecipient = Arc::new(Counter);
        let id = RecipientId::of(&recipient);
        let mut mapping = ChannelMapping::<Ping, u8, AnyRecipient>::new();
        let mut garbage = Garbage::new();

        mapping.insert(id, recipient, 1, noop(), &mut garbage).unwrap();

        assert_eq!(mapping.remove_recipient_token(id, &1u32, &mut garbage), 0);
        assert_eq!(mapping.remove_recipient_token(id, &1u8, &mut garbage), 1);
        assert!(!mapping.contains_recipient(id));
    }

    #[test]
    fn snapshot_filters_by_token_value() {
        let a: AnyRecipient = Arc::new(Counter);
        let b: AnyRecipient = Arc::new(Counter);
        let mut mapping = ChannelMapping::<Ping, u8, AnyRecipient>::new();
        let mut garbage = Garbage::new();

        mapping
            .insert(RecipientId::of(&a), a.clone(), 1, noop(), &mut garbage)
            .unwrap();
        mapping
            .insert(RecipientId::of(&b), b.clone(), 2, noop(), &mut garbage)
            .unwrap();

        let mut out = Vec::new();
        mapping.snapshot(&1, &mut out);

        assert_eq!(out.len(), 1);
        assert!(Arc::ptr_eq(&out[0].0, &a));
    }

    #[test]
    fn sweep_drops_collected_recipients() {
        let first: AnyRecipient = Arc::new(Counter);
        let gone: AnyRecipient = Arc::new(Counter);
        let last: AnyRecipient = Arc::new(Counter);
        let mut mapping = ChannelMapping::<Ping, u8, WeakRecipient>::new();
        let mut garbage = Garbage::new();

        for r in [&first, &gone, &last].iter().copied() {
            mapping
                .insert(RecipientId::of(r), Arc::downgrade(r), 1, noop(), &mut garbage)
                .unwrap();
        }

        drop(gone);

        let mut out = Vec::new();
        mapping.snapshot(&1, &mut out);
        assert_eq!(out.len(), 2);

        assert_eq!(mapping.sweep(&mut garbage), 1);
        assert_eq!(garbage.len(), 1);
        assert_eq!(mapping.total_handler_count(), 2);
        assert!(mapping.has_live_recipients());

        // survivors keep their order
        out.clear();
        mapping.snapshot(&1, &mut out);
        assert!(Arc::ptr_eq(&out[0].0, &first));
        assert!(Arc::ptr_eq(&out[1].0, &last));
    }
}

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    ops::{Deref, DerefMut},
};

use parking_lot::Mutex;

/// Reusable `Vec` buffers, bucketed by element type.
pub struct TypedPool {
    pool: Mutex<HashMap<TypeId, Vec<Box<dyn Any + Send>>>>,
    max_retained: usize,
}

impl TypedPool {
    pub fn new(max_retained: usize) -> Self {
        Self {
            pool: Mutex::new(HashMap::new()),
            max_retained,
        }
    }

    /// Takes an empty buffer with room for at least `capacity` elements.
    /// It goes back to the pool, emptied, when the guard is dropped.
    pub fn rent<T: Send + 'static>(&self, capacity: usize) -> Pooled<'_, T> {
        let reused = self
            .pool
            .lock()
            .get_mut(&TypeId::of::<Vec<T>>())
            .and_then(|bucket| bucket.pop());

        let mut buf = match reused.map(|b| b.downcast::<Vec<T>>()) {
            Some(Ok(buf)) => *buf,
            _ => Vec::new(),
        };

        buf.reserve(capacity);

        Pooled { pool: self, buf }
    }

    /// Number of idle buffers currently held for element type `T`.
    pub fn retained<T: Send + 'static>(&self) -> usize {
        self.pool
            .lock()
            .get(&TypeId::of::<Vec<T>>())
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn put<T: Send + 'static>(&self, mut buf: Vec<T>) {
        // elements may run arbitrary drop code, so never under the pool lock
        buf.clear();

        let mut pool = self.pool.lock();
        let bucket = pool.entry(TypeId::of::<Vec<T>>()).or_insert_with(Vec::new);
        if bucket.len() < self.max_retained {
            bucket.push(Box::new(buf));
        }
    }
}

pub struct Pooled<'a, T: Send + 'static> {
    pool: &'a TypedPool,
    buf: Vec<T>,
}

impl<T: Send + 'static> Deref for Pooled<'_, T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl<T: Send + 'static> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl<T: Send + 'static> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buf));
    }
}

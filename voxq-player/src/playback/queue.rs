//! Playback queue
//!
//! Insertion-ordered double-ended sequence guarded by a single `RwLock`.
//! Reads (length, peeks, snapshots) share the lock; every mutation takes it
//! exclusively. Positional operations validate indices against the length
//! observed under the same write guard that performs the mutation, so an
//! invalid index never leaves the queue partially modified.
//!
//! The lock is a `std::sync::RwLock`: no operation awaits while holding it,
//! and the queue is shared between the async control loop and synchronous
//! callers.

use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Reorderable double-ended queue of playable items
#[derive(Debug)]
pub struct PlaybackQueue<T> {
    items: RwLock<VecDeque<T>>,
}

impl<T: Clone> PlaybackQueue<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(VecDeque::new()),
        }
    }

    // Mutations never panic halfway, so a poisoned lock still guards a
    // consistent sequence.
    fn read(&self) -> RwLockReadGuard<'_, VecDeque<T>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<T>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current element count
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Peek at the first item without removing it
    pub fn front(&self) -> Option<T> {
        self.read().front().cloned()
    }

    /// Peek at the last item without removing it
    pub fn back(&self) -> Option<T> {
        self.read().back().cloned()
    }

    /// Append items, preserving the order of the batch
    ///
    /// Returns the length right after the append, observed under the same
    /// write guard. A concurrent pop cannot skew it.
    pub fn push_back<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let mut queue = self.write();
        queue.extend(items);
        queue.len()
    }

    /// Prepend items, preserving the order of the batch
    ///
    /// `push_front([a, b])` on `[c]` yields `[a, b, c]`.
    pub fn push_front<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        let batch: Vec<T> = items.into_iter().collect();
        let mut queue = self.write();
        for item in batch.into_iter().rev() {
            queue.push_front(item);
        }
    }

    /// Remove and return the first item; `None` when empty
    pub fn pop_front(&self) -> Option<T> {
        self.write().pop_front()
    }

    /// Remove and return the last item; `None` when empty
    pub fn pop_back(&self) -> Option<T> {
        self.write().pop_back()
    }

    /// Remove the item at `index`
    pub fn remove(&self, index: usize) -> Result<T> {
        let mut queue = self.write();
        let len = queue.len();
        queue.remove(index).ok_or(Error::OutOfBounds { index, len })
    }

    /// Move the item at `from` so that it ends up at position `to`
    ///
    /// Items strictly between the two positions shift by one towards `from`.
    /// Both indices must address an existing item, even when they are equal.
    pub fn reorder(&self, from: usize, to: usize) -> Result<()> {
        let mut queue = self.write();
        let len = queue.len();
        for index in [from, to] {
            if index >= len {
                return Err(Error::OutOfBounds { index, len });
            }
        }
        if from == to {
            return Ok(());
        }

        if let Some(item) = queue.remove(from) {
            queue.insert(to, item);
        }
        Ok(())
    }

    /// Point-in-time copy of the queue contents
    pub fn snapshot(&self) -> Vec<T> {
        self.read().iter().cloned().collect()
    }

    /// Remove everything, returning the discarded items in order
    pub fn clear(&self) -> Vec<T> {
        self.write().drain(..).collect()
    }
}

impl<T: Clone> Default for PlaybackQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

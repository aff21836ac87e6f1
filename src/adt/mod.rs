//! Ordered containers backing the event queue
//!
//! The engine needs to cancel events that are not yet due, so a plain binary
//! heap is not enough: every insert hands back a [`Handle`] that can later
//! remove that exact entry in O(log n).

pub mod avl;

use std::cmp::Ordering;

pub use avl::{AvlTree, Handle, Iter};

/// Caller-supplied total order over keys
pub trait KeyOrder<K> {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Simulation time order: keys closer than `epsilon` compare equal.
///
/// Equal keys keep insertion order in the queue, which absorbs the jitter of
/// roots that should coincide but differ in the last few bits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeOrder {
    pub epsilon: f64,
}

impl TimeOrder {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }
}

impl KeyOrder<f64> for TimeOrder {
    fn compare(&self, a: &f64, b: &f64) -> Ordering {
        let diff = a - b;
        if diff.abs() < self.epsilon {
            Ordering::Equal
        } else if diff < 0.0 {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }
}

/// Priority queue with positional handles
pub trait PriorityQueue<K, V> {
    type Handle: Copy;

    /// Insert an entry; the handle stays valid until that entry is removed.
    fn insert(&mut self, key: K, value: V) -> Self::Handle;

    fn peek_min(&self) -> Option<(&K, &V)>;

    fn delete_min(&mut self) -> Option<(K, V)>;

    /// Remove an arbitrary entry. Stale handles yield `None`.
    fn delete(&mut self, handle: Self::Handle) -> Option<(K, V)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

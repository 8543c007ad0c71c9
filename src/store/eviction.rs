//! Eviction Tracker Module
//!
//! Ordering-based eviction bookkeeping for the bounded store.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

// == Eviction Policy ==
/// Which tracked key is sacrificed when a bounded store is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently used
    #[default]
    Lru,
    /// First in, first out; reads do not refresh position
    Fifo,
    /// Most recently used
    Mru,
}

// == Eviction Tracker ==
/// Tracks key order for the configured policy.
///
/// Keys are stored in a VecDeque where:
/// - Front = most recently inserted or touched
/// - Back = oldest
#[derive(Debug)]
pub struct EvictionTracker<K> {
    policy: EvictionPolicy,
    order: VecDeque<K>,
}

impl<K: PartialEq + Clone> EvictionTracker<K> {
    // == Constructor ==
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            policy,
            order: VecDeque::new(),
        }
    }

    // == Insert ==
    /// Records a write of `key`.
    ///
    /// FIFO keeps an overwritten key at its original position.
    pub fn insert(&mut self, key: &K) {
        if self.policy == EvictionPolicy::Fifo && self.contains(key) {
            return;
        }
        self.remove(key);
        self.order.push_front(key.clone());
    }

    // == Touch ==
    /// Records a read of `key`.
    pub fn touch(&mut self, key: &K) {
        match self.policy {
            EvictionPolicy::Fifo => {}
            EvictionPolicy::Lru | EvictionPolicy::Mru => {
                self.remove(key);
                self.order.push_front(key.clone());
            }
        }
    }

    // == Remove ==
    /// Stops tracking `key`.
    pub fn remove(&mut self, key: &K) {
        self.order.retain(|k| k != key);
    }

    // == Evict ==
    /// Returns and forgets the key to evict next.
    ///
    /// Returns None if nothing is tracked.
    pub fn evict(&mut self) -> Option<K> {
        match self.policy {
            EvictionPolicy::Lru | EvictionPolicy::Fifo => self.order.pop_back(),
            EvictionPolicy::Mru => self.order.pop_front(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.order.iter().any(|k| k == key)
    }
}

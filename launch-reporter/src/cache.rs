// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A bounded, thread-safe cache for small facts about a run.
//!
//! Reconciliation needs to remember things like "this test instance is part of a retry chain"
//! for the duration of a run, but runs can be arbitrarily long. [`TrackingCache`] holds at most
//! `capacity` entries; inserting a new key into a full cache evicts the oldest key still
//! present (FIFO by first insertion).

use crate::helpers::lock;
use indexmap::IndexMap;
use std::{hash::Hash, num::NonZeroUsize, sync::Mutex};
use tracing::debug;

/// The default capacity, used when no capacity is configured.
pub const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(1000).unwrap();

/// A thread-safe key-value map with a hard capacity and FIFO eviction.
#[derive(Debug)]
pub struct TrackingCache<K, V> {
    capacity: NonZeroUsize,
    // Insertion order is eviction order.
    entries: Mutex<IndexMap<K, V>>,
}

impl<K, V> TrackingCache<K, V>
where
    K: Hash + Eq,
{
    /// Creates a new, empty cache with the given capacity.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(IndexMap::with_capacity(capacity.get())),
        }
    }

    /// Returns the maximum number of entries this cache holds.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Returns the number of entries currently in the cache.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Inserts a value, returning the previous value for this key if there was one.
    ///
    /// Replacing the value of a key that's already present keeps its position in the eviction
    /// order.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let mut entries = lock(&self.entries);
        if let Some(existing) = entries.get_mut(&key) {
            return Some(std::mem::replace(existing, value));
        }
        Self::make_room(&mut entries, self.capacity);
        entries.insert(key, value);
        None
    }

    /// Returns true if the key is present.
    pub fn contains_key(&self, key: &K) -> bool {
        lock(&self.entries).contains_key(key)
    }

    /// Removes a key, returning its value if it was present.
    pub fn remove(&self, key: &K) -> Option<V> {
        // shift_remove keeps the relative order of the remaining keys.
        lock(&self.entries).shift_remove(key)
    }

    /// Removes every entry.
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    fn make_room(entries: &mut IndexMap<K, V>, capacity: NonZeroUsize) {
        while entries.len() >= capacity.get() {
            if entries.shift_remove_index(0).is_none() {
                break;
            }
            debug!(capacity = capacity.get(), "tracking cache full, evicted oldest entry");
        }
    }
}

impl<K, V> TrackingCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Returns a clone of the value for this key.
    pub fn get(&self, key: &K) -> Option<V> {
        lock(&self.entries).get(key).cloned()
    }

    /// Returns the value for this key, inserting the result of `f` if it's absent.
    ///
    /// The check and the insert happen under a single lock acquisition, so concurrent callers
    /// racing on the same key observe the same value.
    pub fn get_or_insert_with(&self, key: K, f: impl FnOnce() -> V) -> V {
        let mut entries = lock(&self.entries);
        if let Some(value) = entries.get(&key) {
            return value.clone();
        }
        Self::make_room(&mut entries, self.capacity);
        let value = f();
        entries.insert(key, value.clone());
        value
    }
}

impl<K, V> Default for TrackingCache<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

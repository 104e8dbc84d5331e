//! Bounded in-memory cache for downloaded artifacts
//!
//! Entries are evicted strictly in insertion order. Reads never refresh an
//! entry and inserting an existing key leaves the stored value untouched.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Capability interface the job layer uses to store results
pub trait Cache<V>: Send + Sync {
    fn set(&self, key: &str, value: V);
    fn get(&self, key: &str) -> Option<V>;
    /// Keys oldest-first, padded with empty strings up to the capacity
    fn dump(&self) -> Vec<String>;
}

struct Slots<V> {
    values: HashMap<String, V>,
    order: VecDeque<String>,
}

/// Fixed-capacity FIFO store
pub struct BoundedCache<V> {
    capacity: usize,
    slots: Mutex<Slots<V>>,
}

impl<V: Clone> BoundedCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Mutex::new(Slots {
                values: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().values.contains_key(key)
    }

    fn lock(&self) -> MutexGuard<'_, Slots<V>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone + Send> Cache<V> for BoundedCache<V> {
    fn set(&self, key: &str, value: V) {
        if self.capacity == 0 {
            return;
        }

        let mut slots = self.lock();
        if slots.values.contains_key(key) {
            tracing::trace!(key, "Cache key already present, keeping original");
            return;
        }

        // Eviction and insertion happen under the same guard
        if slots.order.len() >= self.capacity {
            if let Some(oldest) = slots.order.pop_front() {
                slots.values.remove(&oldest);
                tracing::debug!(evicted = %oldest, "Cache full, evicted oldest entry");
            }
        }

        slots.order.push_back(key.to_string());
        slots.values.insert(key.to_string(), value);
    }

    fn get(&self, key: &str) -> Option<V> {
        self.lock().values.get(key).cloned()
    }

    fn dump(&self) -> Vec<String> {
        let slots = self.lock();
        let mut keys: Vec<String> = slots.order.iter().cloned().collect();
        keys.resize(self.capacity, String::new());
        keys
    }
}

/// Derives the cache key for a locator: everything before the first `?`.
///
/// Returns `None` when the locator has no `scheme://` prefix. Such locators
/// must not be cached.
pub fn cache_key(locator: &str) -> Option<String> {
    let locator = locator.trim();
    let (scheme, rest) = locator.split_once("://")?;

    let valid_scheme = scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid_scheme || rest.is_empty() {
        return None;
    }

    let key = match locator.find('?') {
        Some(idx) => &locator[..idx],
        None => locator,
    };
    if key.len() <= scheme.len() + 3 {
        return None;
    }
    Some(key.to_string())
}

//! Bounded response cache with strict FIFO eviction.
//!
//! Reads never affect eviction order: the entry inserted first is the one
//! evicted first, however often it is read. Entries have no TTL and live
//! until evicted or until the owning gateway is dropped.

use std::collections::{HashMap, VecDeque};

use portal_core::ServiceKind;

/// Separator between request fields in a cache signature.
const FIELD_SEPARATOR: char = '\u{1f}';

/// Composite key: service identity plus request payload signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    service: ServiceKind,
    signature: String,
}

impl CacheKey {
    pub fn new(service: ServiceKind, fields: &[&str]) -> Self {
        let mut signature = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                signature.push(FIELD_SEPARATOR);
            }
            signature.push_str(field);
        }
        Self { service, signature }
    }
}

/// Counters describing cache activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
}

#[derive(Debug)]
pub struct ResponseCache<V> {
    capacity: usize,
    entries: HashMap<CacheKey, V>,
    order: VecDeque<CacheKey>,
    stats: CacheStats,
}

impl<V: Clone> ResponseCache<V> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Look up a response. Records a hit or miss; never reorders.
    pub fn get(&mut self, key: &CacheKey) -> Option<V> {
        match self.entries.get(key) {
            Some(response) => {
                self.stats.hits += 1;
                Some(response.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert a response, evicting the oldest entry when the bound is
    /// exceeded. Returns the evicted key, if any.
    ///
    /// Re-inserting an existing key replaces its response in place and keeps
    /// its original position in the eviction order.
    pub fn insert(&mut self, key: CacheKey, response: V) -> Option<CacheKey> {
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = response;
            return None;
        }

        self.order.push_back(key.clone());
        self.entries.insert(key, response);
        self.stats.insertions += 1;

        if self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                self.stats.evictions += 1;
                return Some(oldest);
            }
        }
        None
    }
}

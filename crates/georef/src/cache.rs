//! Capacity bounded least-frequently-used cache.
//!
//! Used to memoize locality expansions across queries and batches. Every `get`, `contains`, or
//! `insert` of an existing key bumps that key's score. When full, inserting a new key evicts the
//! entry with the lowest score, the oldest one on ties.
//!
//! A pointer to the oldest never-read entry is kept so the common fill-then-evict pattern does
//! not scan the whole map; it is cleared whenever that entry is read or evicted, after which the
//! eviction falls back to a linear scan.

use std::{
    hash::Hash,
    num::NonZeroUsize,
    sync::{Mutex, PoisonError},
};

use ahash::AHashMap as HashMap;
use tracing::trace;

use crate::address::{AreaFilter, EntitySelector};

#[derive(Debug)]
struct Entry<V> {
    value: V,
    score: u64,
    seq: u64,
}

#[derive(Debug)]
pub struct FrequencyBoundedCache<K, V> {
    capacity: NonZeroUsize,
    entries: HashMap<K, Entry<V>>,
    next_seq: u64,
    /// Entries that were never read.
    untouched: usize,
    /// Oldest untouched key, when known.
    candidate: Option<K>,
}

impl<K, V> FrequencyBoundedCache<K, V>
where
    K: Clone + Eq + Hash,
{
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity.get()),
            next_seq: 0,
            untouched: 0,
            candidate: None,
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.touch(key);
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn contains(&mut self, key: &K) -> bool {
        self.touch(key)
    }

    /// Inserts or replaces the value of `key`, evicting an entry first if the cache is full.
    pub fn insert(&mut self, key: K, value: V) {
        if self.touch(&key) {
            if let Some(entry) = self.entries.get_mut(&key) {
                entry.value = value;
            }
            return;
        }

        if self.entries.len() >= self.capacity.get() {
            self.evict();
        }

        if self.untouched == 0 {
            self.candidate = Some(key.clone());
        }
        self.untouched += 1;

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            key,
            Entry {
                value,
                score: 0,
                seq,
            },
        );
    }

    /// Bumps the score of `key`, returning whether it was present.
    fn touch(&mut self, key: &K) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        if entry.score == 0 {
            self.untouched -= 1;
        }
        entry.score += 1;
        if self.candidate.as_ref() == Some(key) {
            self.candidate = None;
        }
        true
    }

    fn evict(&mut self) {
        let victim = self.candidate.take().or_else(|| {
            self.entries
                .iter()
                .min_by_key(|(_, entry)| (entry.score, entry.seq))
                .map(|(key, _)| key.clone())
        });

        if let Some(victim) = victim
            && let Some(entry) = self.entries.remove(&victim)
        {
            if entry.score == 0 {
                self.untouched -= 1;
            }
            trace!(score = entry.score, "Evicted cache entry");
        }
    }
}

/// A [`FrequencyBoundedCache`] behind a mutex, shareable across threads.
///
/// Values are cloned out on reads. A poisoned lock is recovered since the cache never holds
/// partially updated state across a panic point.
#[derive(Debug)]
pub struct SharedFrequencyCache<K, V> {
    inner: Mutex<FrequencyBoundedCache<K, V>>,
}

impl<K, V> SharedFrequencyCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(FrequencyBoundedCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: K, value: V) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capacity()
    }
}

/// Everything a locality expansion depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalityCacheKey {
    pub locality: EntitySelector,
    pub state: Option<AreaFilter>,
    pub department: Option<AreaFilter>,
    pub census_locality: Option<AreaFilter>,
    pub local_government: Option<AreaFilter>,
    pub exact: bool,
}

/// Census locality IDs found for a locality expansion, empty results included.
pub type LocalityCache = SharedFrequencyCache<LocalityCacheKey, Vec<String>>;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn cache(capacity: usize) -> FrequencyBoundedCache<u32, String> {
        FrequencyBoundedCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn test_overflow_without_reads_evicts_first_key() {
        let mut cache = cache(3);
        for key in 0..4 {
            cache.insert(key, key.to_string());
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.get(&0).is_none());
        assert!(cache.contains(&1));
        assert!(cache.contains(&2));
        assert!(cache.contains(&3));
    }

    #[test]
    fn test_frequently_read_keys_survive() {
        let mut cache = cache(2);
        cache.insert(1, "one".into());
        cache.insert(2, "two".into());
        assert_eq!(cache.get(&1).map(String::as_str), Some("one"));
        assert_eq!(cache.get(&1).map(String::as_str), Some("one"));

        cache.insert(3, "three".into());
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert!(cache.contains(&3));
    }

    #[test]
    fn test_linear_scan_after_candidate_is_read() {
        let mut cache = cache(3);
        cache.insert(1, "a".into());
        cache.insert(2, "b".into());
        cache.insert(3, "c".into());
        // Reading the candidate clears it; the scan must then pick the oldest unread entry.
        cache.get(&1);

        cache.insert(4, "d".into());
        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert!(cache.contains(&3));
        assert!(cache.contains(&4));
    }

    #[test]
    fn test_insert_existing_replaces_and_scores() {
        let mut cache = cache(2);
        cache.insert(1, "a".into());
        cache.insert(2, "b".into());
        cache.insert(1, "A".into());
        cache.insert(3, "c".into());

        assert_eq!(cache.get(&1).map(String::as_str), Some("A"));
        assert!(!cache.contains(&2));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_capacity_one() {
        let mut cache = cache(1);
        cache.insert(1, "a".into());
        cache.insert(2, "b".into());
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&2));
        assert_eq!(cache.capacity(), 1);
    }

    #[test]
    fn test_shared_cache_across_threads() {
        let cache: Arc<SharedFrequencyCache<u32, u32>> =
            Arc::new(SharedFrequencyCache::new(NonZeroUsize::new(16).unwrap()));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        cache.insert(t * 100 + i, i);
                        let _ = cache.get(&(t * 100));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 16);
        assert_eq!(cache.capacity(), 16);
    }

    #[test]
    fn test_locality_key_distinguishes_filters() {
        let key = LocalityCacheKey {
            locality: EntitySelector::Name("Palermo".into()),
            state: None,
            department: None,
            census_locality: None,
            local_government: None,
            exact: false,
        };
        let other = LocalityCacheKey {
            state: Some(AreaFilter::Ids(vec!["02".into()])),
            ..key.clone()
        };

        let cache: LocalityCache = SharedFrequencyCache::new(NonZeroUsize::new(4).unwrap());
        cache.insert(key.clone(), vec!["02007010".into()]);
        assert_eq!(cache.get(&key), Some(vec!["02007010".to_string()]));
        assert_eq!(cache.get(&other), None);
    }
}

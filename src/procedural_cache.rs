//! The [ProceduralLruCache] holds assets for a scene generator, evicting procedurally created assets by how recently
//! they were touched.
//!
//! Recency is tracked as an integer rank rather than a linked list.  Every call to
//! [ProceduralLruCache::touch] moves the touched assets onto a fresh rank one above anything issued before, and
//! [ProceduralLruCache::remove_lru] evicts from the lowest rank in use.  Ranks never run past [MAX_PRIORITY]: once
//! they reach it, the ranks in use are compressed back down toward the configured minimum before the next one is
//! issued.
//!
//! Assets passed in at construction, or added with `procedural` set to false, are pinned.  They are never evicted or
//! ranked, and may only be removed with [ProceduralLruCache::remove] or [ProceduralLruCache::clear].
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use tracing::{debug, trace, warn};

use crate::rank_queue::RankQueue;
use crate::*;

type CacheHashMap<K, V> = HashMap<K, V, ahash::RandomState>;

/// The highest rank the cache will ever hand out.
///
/// One below `i32::MAX`, so that `rank + 1` is always representable.
pub const MAX_PRIORITY: i32 = i32::MAX - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_builder::Builder)]
pub struct ProceduralCacheConfig {
    /// Rank given to procedural assets which have never been touched.
    #[builder(default = "0")]
    pub ranking_min_value: i32,
    /// Initial upper bound of the ranks in use; the first touch lands here.
    #[builder(default = "1")]
    pub ranking_max_value: i32,
}

impl Default for ProceduralCacheConfig {
    fn default() -> ProceduralCacheConfig {
        ProceduralCacheConfig {
            ranking_min_value: 0,
            ranking_max_value: 1,
        }
    }
}

impl ProceduralCacheConfig {
    fn validate(&self) -> Result<(), CacheError> {
        let reason = if self.ranking_min_value > self.ranking_max_value {
            "minimum ranking is above the maximum"
        } else if self.ranking_max_value > MAX_PRIORITY {
            "maximum ranking leaves no headroom below i32::MAX"
        } else if self.ranking_min_value >= MAX_PRIORITY {
            "minimum ranking leaves no room for touched assets"
        } else {
            return Ok(());
        };

        Err(CacheError::InvalidConfiguration {
            min: self.ranking_min_value,
            max: self.ranking_max_value,
            reason,
        })
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("invalid ranking range [{min}, {max}]: {reason}")]
    InvalidConfiguration {
        min: i32,
        max: i32,
        reason: &'static str,
    },
    /// Holds the `Debug` rendering of the key.
    #[error("an asset is already cached under key {0}")]
    DuplicateKey(String),
}

struct CacheEntry<V> {
    value: V,
    procedural: bool,
}

pub struct ProceduralLruCache<K: Hash + Eq, V> {
    config: ProceduralCacheConfig,
    entries: CacheHashMap<K, CacheEntry<V>>,
    /// Ranks of the procedural entries only; pinned entries never appear here.
    queue: RankQueue<K>,
    priority_min_value: i32,
    priority_max_value: i32,
    /// Whether any touch has issued a rank yet.  Until one has, `priority_max_value` is only the configured ceiling.
    promoted: bool,
}

impl<K: Hash + Eq + Clone + Debug, V> ProceduralLruCache<K, V> {
    /// Build a cache whose `initial` assets are all pinned.
    pub fn new(
        initial: impl IntoIterator<Item = (K, V)>,
        config: ProceduralCacheConfig,
    ) -> Result<ProceduralLruCache<K, V>, CacheError> {
        config.validate()?;

        let entries = initial
            .into_iter()
            .map(|(k, value)| {
                (
                    k,
                    CacheEntry {
                        value,
                        procedural: false,
                    },
                )
            })
            .collect::<CacheHashMap<K, CacheEntry<V>>>();
        debug!(
            "Procedural asset cache created with {} preloaded assets, ranking range [{}, {}]",
            entries.len(),
            config.ranking_min_value,
            config.ranking_max_value
        );

        Ok(ProceduralLruCache {
            entries,
            queue: RankQueue::new(),
            priority_min_value: config.ranking_min_value,
            priority_max_value: config.ranking_max_value,
            promoted: false,
            config,
        })
    }

    /// Shorthand for [ProceduralLruCache::new] with an explicit ranking range.
    pub fn with_ranking(
        initial: impl IntoIterator<Item = (K, V)>,
        ranking_min_value: i32,
        ranking_max_value: i32,
    ) -> Result<ProceduralLruCache<K, V>, CacheError> {
        Self::new(
            initial,
            ProceduralCacheConfig {
                ranking_min_value,
                ranking_max_value,
            },
        )
    }

    pub fn config(&self) -> &ProceduralCacheConfig {
        &self.config
    }

    /// Lowest rank held by a touched asset, or the configured minimum before anything is touched.
    pub fn priority_min_value(&self) -> i32 {
        self.priority_min_value
    }

    /// The most recently issued rank, or the configured maximum before anything is touched.
    pub fn priority_max_value(&self) -> i32 {
        self.priority_max_value
    }

    /// Add an asset.  Procedural assets start out as the first candidates for eviction; anything else is pinned.
    ///
    /// An existing key is never overwritten.
    pub fn add_asset(&mut self, key: K, value: V, procedural: bool) -> Result<(), CacheError> {
        if self.entries.contains_key(&key) {
            return Err(CacheError::DuplicateKey(format!("{:?}", key)));
        }

        if procedural {
            self.queue
                .insert(key.clone(), self.config.ranking_min_value);
        }
        debug!("Added asset {:?} (procedural: {})", key, procedural);
        self.entries.insert(key, CacheEntry { value, procedural });
        Ok(())
    }

    /// Mark a group of assets as used together, making them the last candidates for eviction.
    ///
    /// Unknown and pinned keys are skipped.  If every remaining key already holds the highest rank, nothing changes.
    pub fn touch<'a, I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        let mut seen = HashSet::<&K, ahash::RandomState>::default();
        let batch = keys
            .into_iter()
            .filter(|k| self.queue.rank(k).is_some() && seen.insert(*k))
            .collect::<Vec<&K>>();
        if batch.is_empty() {
            return;
        }

        let top = self.priority_max_value;
        if self.promoted && batch.iter().all(|k| self.queue.rank(k) == Some(top)) {
            trace!("Touched assets already hold the highest rank {}", top);
            return;
        }

        // Detach first, so that the touched keys are not part of any renormalization.
        for k in &batch {
            self.queue.remove(k);
        }
        let rank = self.next_rank();
        for k in batch {
            trace!("Promoting asset {:?} to rank {}", k, rank);
            self.queue.insert(k.clone(), rank);
        }

        self.promoted = true;
        self.priority_max_value = rank;
        self.refresh_priority_min();
    }

    /// Pick the rank for the next promotion, compressing the ranks in use if the top of the range has been reached.
    fn next_rank(&mut self) -> i32 {
        let floor = self.config.ranking_min_value;
        if !self.promoted {
            return self.priority_max_value.max(floor + 1);
        }
        if self.priority_max_value < MAX_PRIORITY {
            return self.priority_max_value + 1;
        }

        warn!(
            "Asset ranks reached {}; renormalizing {} procedural assets",
            MAX_PRIORITY,
            self.queue.len()
        );
        // Leave the top rank free for this promotion, unless that leaves nowhere to put the existing ones.
        let ceiling = if MAX_PRIORITY - 1 > floor {
            MAX_PRIORITY - 1
        } else {
            MAX_PRIORITY
        };
        match self.queue.renormalize(floor, ceiling) {
            Some(highest) => highest.saturating_add(1).min(MAX_PRIORITY),
            None => floor + 1,
        }
    }

    fn refresh_priority_min(&mut self) {
        if let Some(lowest) = self.queue.lowest_rank_above(self.config.ranking_min_value) {
            self.priority_min_value = lowest;
        }
    }

    /// Evict up to `limit` procedural assets from the lowest rank in use, returning them in eviction order.
    ///
    /// Only a single rank is ever evicted from per call, so fewer than `limit` assets may come back even if more are
    /// cached.  If `delete_with_highest_priority` is false and the lowest rank is also the highest rank issued by a
    /// touch, nothing is evicted.
    pub fn remove_lru(&mut self, limit: usize, delete_with_highest_priority: bool) -> Vec<(K, V)> {
        let rank = match self.queue.lowest_rank() {
            Some(r) => r,
            None => return vec![],
        };
        // Untouched assets sit at the configured minimum and are never protected.
        let touched = rank > self.config.ranking_min_value;
        if !delete_with_highest_priority && touched && rank == self.priority_max_value {
            debug!("Lowest rank {} is the highest; keeping its assets", rank);
            return vec![];
        }

        let evicted = self
            .queue
            .pop_lowest(limit)
            .into_iter()
            .filter_map(|k| {
                let entry = self.entries.remove(&k)?;
                Some((k, entry.value))
            })
            .collect::<Vec<(K, V)>>();
        self.refresh_priority_min();

        debug!(
            "Evicted {} assets at rank {}; {} remain",
            evicted.len(),
            rank,
            self.entries.len()
        );
        evicted
    }

    /// Remove an asset, pinned or not.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.remove(key)?;
        if entry.procedural {
            self.queue.remove(key);
            self.refresh_priority_min();
        }
        Some(entry.value)
    }

    /// Drop every asset and return the ranking range to its configured state.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.queue.clear();
        self.priority_min_value = self.config.ranking_min_value;
        self.priority_max_value = self.config.ranking_max_value;
        self.promoted = false;
    }

    /// Find an asset.  This doesn't count as a use; call [ProceduralLruCache::touch] for that.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key).map(|e| &mut e.value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// The rank of a procedural asset; `None` for pinned or missing keys.
    pub fn priority(&self, key: &K) -> Option<i32> {
        self.queue.rank(key)
    }

    pub fn is_procedural(&self, key: &K) -> Option<bool> {
        self.entries.get(key).map(|e| e.procedural)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// Iterator visiting procedural keys in the order [ProceduralLruCache::remove_lru] would reach them.
    pub fn eviction_order(&self) -> impl Iterator<Item = &K> {
        self.queue.iter()
    }
}

impl<K: Hash + Eq + Clone + Debug, V> AssetMap<K, V> for ProceduralLruCache<K, V> {
    fn contains_key(&self, key: &K) -> bool {
        ProceduralLruCache::contains_key(self, key)
    }

    fn get_asset(&self, key: &K) -> Option<&V> {
        self.get(key)
    }

    fn asset_keys(&self) -> Vec<&K> {
        self.keys().collect()
    }

    fn asset_count(&self) -> usize {
        self.count()
    }
}

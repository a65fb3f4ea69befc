//! The [AssetMap] trait is the read-only view scene generators need of a store of assets.
//!
//! Both a plain `HashMap` of preloaded assets and a [crate::ProceduralLruCache] implement it, so generator code can
//! be written once and handed either.
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

/// Look up assets by key without affecting how they are cached.
pub trait AssetMap<K, V> {
    fn contains_key(&self, key: &K) -> bool;

    fn get_asset(&self, key: &K) -> Option<&V>;

    /// All keys currently present, in no particular order.
    fn asset_keys(&self) -> Vec<&K>;

    fn asset_count(&self) -> usize;
}

impl<K: Hash + Eq, V, S: BuildHasher> AssetMap<K, V> for HashMap<K, V, S> {
    fn contains_key(&self, key: &K) -> bool {
        HashMap::contains_key(self, key)
    }

    fn get_asset(&self, key: &K) -> Option<&V> {
        self.get(key)
    }

    fn asset_keys(&self) -> Vec<&K> {
        self.keys().collect()
    }

    fn asset_count(&self) -> usize {
        self.len()
    }
}

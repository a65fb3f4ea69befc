//! An LRU map for assets which a scene generator creates at runtime.
//!
//! A procedural scene generator builds meshes, materials and prefabs on the fly, and every new scene adds more of them.
//! Keeping all of them grows memory without bound, but throwing them away after each scene means rebuilding the ones
//! that the next scene would have reused.  This crate provides the middle ground:
//!
//! [ProceduralLruCache] maps keys to assets.  Assets handed to it up front are pinned and stay until removed by hand.
//! Assets added procedurally are ranked: each call to [ProceduralLruCache::touch] puts the assets a scene used on a
//! new rank above everything before it, and [ProceduralLruCache::remove_lru] evicts from the lowest rank when the
//! host decides it is over budget.  Evicted assets are handed back so that the host can release whatever they hold.
//!
//! Ranks are `i32`s bounded by [MAX_PRIORITY].  When a touch would need a rank past that, the ranks in use are
//! compressed back down while keeping their order, so the cache can run indefinitely.
//!
//! Code which only needs to read assets can take any [AssetMap], which is implemented for both the cache and a plain
//! `HashMap`.
//!
//! The cache is not internally synchronized; hosts which share it between threads should put it behind a `Mutex`.
mod procedural_cache;
mod rank_queue;
mod traits;

pub use procedural_cache::*;
pub use traits::*;

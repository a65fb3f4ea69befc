//! A [RankQueue] orders keys by an integer rank, oldest first within a rank.
//!
//! This is an ordered map of rank to tier plus an auxiliary hash-based index from key to rank, so that moving a key
//! between tiers never needs to search every tier.
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::ops::Bound;

use ahash::RandomState;

pub(crate) struct RankQueue<K: Hash + Eq> {
    /// Keys grouped by rank, each tier in the order its keys joined it.
    tiers: BTreeMap<i32, Vec<K>>,
    /// Points at the tier of each key.
    ranks: HashMap<K, i32, RandomState>,
}

impl<K: Hash + Eq + Clone> RankQueue<K> {
    pub(crate) fn new() -> RankQueue<K> {
        RankQueue {
            tiers: Default::default(),
            ranks: Default::default(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.ranks.len()
    }

    pub(crate) fn rank(&self, key: &K) -> Option<i32> {
        self.ranks.get(key).copied()
    }

    /// Append a key to the back of the tier at `rank`, detaching it from wherever it was first.
    pub(crate) fn insert(&mut self, key: K, rank: i32) {
        self.remove(&key);
        self.tiers.entry(rank).or_default().push(key.clone());
        self.ranks.insert(key, rank);
    }

    /// Detach a key, returning the rank it held.
    pub(crate) fn remove(&mut self, key: &K) -> Option<i32> {
        let rank = self.ranks.remove(key)?;
        let now_empty = match self.tiers.get_mut(&rank) {
            Some(tier) => {
                if let Some(pos) = tier.iter().position(|k| k == key) {
                    tier.remove(pos);
                }
                tier.is_empty()
            }
            None => false,
        };

        if now_empty {
            self.tiers.remove(&rank);
        }
        Some(rank)
    }

    /// Rank of the lowest non-empty tier.
    pub(crate) fn lowest_rank(&self) -> Option<i32> {
        self.tiers.keys().next().copied()
    }

    /// Lowest rank strictly greater than `floor`.
    pub(crate) fn lowest_rank_above(&self, floor: i32) -> Option<i32> {
        self.tiers
            .range((Bound::Excluded(floor), Bound::Unbounded))
            .next()
            .map(|(rank, _)| *rank)
    }

    /// Take up to `limit` keys from the front of the lowest tier and never from any other tier.
    pub(crate) fn pop_lowest(&mut self, limit: usize) -> Vec<K> {
        let rank = match self.lowest_rank() {
            Some(r) => r,
            None => return vec![],
        };

        let (taken, now_empty) = match self.tiers.get_mut(&rank) {
            Some(tier) => {
                let count = limit.min(tier.len());
                let taken = tier.drain(..count).collect::<Vec<K>>();
                (taken, tier.is_empty())
            }
            None => (vec![], false),
        };

        if now_empty {
            self.tiers.remove(&rank);
        }
        for k in &taken {
            self.ranks.remove(k);
        }
        taken
    }

    /// Re-space every tier ranked above `floor` onto consecutive ranks starting at `floor + 1` and ending no higher
    /// than `ceiling`, keeping the tiers in order.
    ///
    /// If there are more tiers than ranks in `(floor, ceiling]`, the oldest tiers are merged together into
    /// `floor + 1`, oldest keys first.  Returns the highest rank now in use above `floor`.
    ///
    /// Requires `floor < ceiling`.
    pub(crate) fn renormalize(&mut self, floor: i32, ceiling: i32) -> Option<i32> {
        debug_assert!(floor < ceiling);
        let lowest_moved = floor.checked_add(1)?;
        let moved = self.tiers.split_off(&lowest_moved);
        let count = moved.len() as i64;
        let slots = i64::from(ceiling) - i64::from(floor);
        let overflow = (count - slots).max(0);

        let mut highest = None;
        for (i, (_, keys)) in moved.into_iter().enumerate() {
            let offset = (i as i64 - overflow).max(0);
            // Bounded by `ceiling` since `offset < slots`.
            let new_rank = (i64::from(lowest_moved) + offset) as i32;
            for k in &keys {
                self.ranks.insert(k.clone(), new_rank);
            }
            self.tiers.entry(new_rank).or_default().extend(keys);
            highest = Some(new_rank);
        }
        highest
    }

    pub(crate) fn clear(&mut self) {
        self.tiers.clear();
        self.ranks.clear();
    }

    /// Iterator visiting keys lowest rank first.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &K> {
        self.tiers.values().flat_map(|tier| tier.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(queue: &RankQueue<&'static str>) -> Vec<&'static str> {
        queue.iter().copied().collect()
    }

    #[test]
    fn test_insert_orders_by_rank_then_arrival() {
        let mut queue = RankQueue::new();
        queue.insert("c", 3);
        queue.insert("a", 1);
        queue.insert("b", 3);
        queue.insert("d", 2);

        assert_eq!(collect(&queue), vec!["a", "d", "c", "b"]);
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.lowest_rank(), Some(1));
        assert_eq!(queue.lowest_rank_above(1), Some(2));
        assert_eq!(queue.lowest_rank_above(3), None);
    }

    #[test]
    fn test_reinsert_moves_key() {
        let mut queue = RankQueue::new();
        queue.insert("a", 0);
        queue.insert("b", 0);
        queue.insert("a", 5);

        assert_eq!(queue.rank(&"a"), Some(5));
        assert_eq!(collect(&queue), vec!["b", "a"]);
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.remove(&"b"), Some(0));
        assert_eq!(queue.remove(&"b"), None);
        // The emptied tier must not linger as the lowest rank.
        assert_eq!(queue.lowest_rank(), Some(5));
    }

    #[test]
    fn test_pop_lowest_stays_in_one_tier() {
        let mut queue = RankQueue::new();
        queue.insert("a", 0);
        queue.insert("b", 0);
        queue.insert("c", 1);

        assert_eq!(queue.pop_lowest(5), vec!["a", "b"]);
        assert_eq!(queue.rank(&"a"), None);
        assert_eq!(queue.pop_lowest(0), Vec::<&str>::new());
        assert_eq!(queue.pop_lowest(1), vec!["c"]);
        assert_eq!(queue.pop_lowest(1), Vec::<&str>::new());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_renormalize_with_room() {
        let mut queue = RankQueue::new();
        queue.insert("untouched", 0);
        queue.insert("a", 100);
        queue.insert("b", 250);
        queue.insert("c", 250);
        queue.insert("d", 1000);

        assert_eq!(queue.renormalize(0, 10), Some(3));
        assert_eq!(queue.rank(&"untouched"), Some(0));
        assert_eq!(queue.rank(&"a"), Some(1));
        assert_eq!(queue.rank(&"b"), Some(2));
        assert_eq!(queue.rank(&"c"), Some(2));
        assert_eq!(queue.rank(&"d"), Some(3));
        assert_eq!(collect(&queue), vec!["untouched", "a", "b", "c", "d"]);
    }

    #[test]
    fn test_renormalize_merges_oldest_tiers() {
        let mut queue = RankQueue::new();
        queue.insert("a", 5);
        queue.insert("b", 6);
        queue.insert("c", 7);
        queue.insert("d", 8);

        assert_eq!(queue.renormalize(0, 2), Some(2));
        assert_eq!(collect(&queue), vec!["a", "b", "c", "d"]);
        assert_eq!(queue.rank(&"c"), Some(1));
        assert_eq!(queue.rank(&"d"), Some(2));
    }

    #[test]
    fn test_renormalize_at_integer_limit() {
        let mut queue = RankQueue::new();
        queue.insert("a", i32::MAX - 2);
        queue.insert("b", i32::MAX - 1);
        queue.insert("c", i32::MAX);

        assert_eq!(
            queue.renormalize(i32::MAX - 3, i32::MAX - 1),
            Some(i32::MAX - 1)
        );
        assert_eq!(queue.rank(&"a"), Some(i32::MAX - 2));
        assert_eq!(queue.rank(&"b"), Some(i32::MAX - 2));
        assert_eq!(queue.rank(&"c"), Some(i32::MAX - 1));

        let mut empty = RankQueue::<&str>::new();
        assert_eq!(empty.renormalize(0, 1), None);
    }
}

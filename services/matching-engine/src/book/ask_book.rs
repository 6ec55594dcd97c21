//! Ask (sell-side) order book
//!
//! Maintains resting sell orders sorted by price ascending (best ask first).
//! Mirror image of the bid book; within a level, orders are FIFO by receive
//! time.

use std::collections::BTreeMap;
use types::order::Order;

use super::price_level::PriceLevel;
use super::{PriceKey, PRICE_EPSILON};

/// Ask (sell) side of the book
///
/// The lowest price level is best. Prices within `PRICE_EPSILON` of an
/// existing level coalesce into it.
#[derive(Debug, Default)]
pub struct AskBook {
    /// Price levels; `next()` is the best ask
    levels: BTreeMap<PriceKey, PriceLevel>,
}

impl AskBook {
    /// Create a new empty ask book
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// Rest an order, coalescing into a tolerance-equal level if one exists
    pub fn insert(&mut self, order: Order) {
        let key = self.level_key(order.price);
        self.levels.entry(key).or_default().push(order);
    }

    fn level_key(&self, price: f64) -> PriceKey {
        let lo = PriceKey(price - PRICE_EPSILON);
        let hi = PriceKey(price + PRICE_EPSILON);
        self.levels
            .range(lo..=hi)
            .next()
            .map(|(key, _)| *key)
            .unwrap_or(PriceKey(price))
    }

    /// Best ask as (price, total level quantity)
    pub fn best(&self) -> Option<(f64, u64)> {
        self.levels
            .iter()
            .next()
            .map(|(key, level)| (key.0, level.total_quantity()))
    }

    /// Front order of the best level (lowest price, earliest received)
    pub fn front_order(&self) -> Option<&Order> {
        self.levels.iter().next().and_then(|(_, level)| level.front())
    }

    /// Fill the front order of the best level, pruning the level when empty
    ///
    /// # Panics
    /// Panics if the book is empty; callers check `best()` first.
    pub fn fill_best(&mut self, traded: u64) {
        let (&key, level) = self
            .levels
            .iter_mut()
            .next()
            .expect("fill_best on an empty ask book");
        level.fill_front(traded);
        if level.is_empty() {
            self.levels.remove(&key);
        }
    }

    /// Aggregate remaining quantity reachable by a buy at `limit`,
    /// scanning best levels first and stopping once `cap` is reached
    ///
    /// Non-destructive; used for fill-or-kill feasibility.
    pub fn fillable_quantity(&self, limit: f64, cap: u64) -> u64 {
        let mut accum = 0u64;
        for (key, level) in self.levels.iter() {
            if limit < key.0 {
                break;
            }
            accum = accum.saturating_add(level.total_quantity());
            if accum >= cap {
                break;
            }
        }
        accum
    }

    /// Depth snapshot: top `depth` levels as (price, total quantity),
    /// best first
    pub fn depth_snapshot(&self, depth: usize) -> Vec<(f64, u64)> {
        self.levels
            .iter()
            .take(depth)
            .map(|(key, level)| (key.0, level.total_quantity()))
            .collect()
    }

    /// Check if the ask book is empty
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of price levels
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Number of resting orders across all levels
    pub fn order_count(&self) -> usize {
        self.levels.values().map(PriceLevel::order_count).sum()
    }

    /// Total remaining quantity across all levels
    pub fn total_quantity(&self) -> u64 {
        self.levels.values().map(PriceLevel::total_quantity).sum()
    }
}

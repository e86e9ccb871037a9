//! Per-side price level storage.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::types::PriceLevel;

/// Price to quantity map for one side of the book.
///
/// Never holds a non-positive quantity once an update returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceLevelMap {
    levels: BTreeMap<Decimal, Decimal>,
}

impl PriceLevelMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from a full listing, skipping removal levels.
    pub fn from_levels(levels: impl IntoIterator<Item = PriceLevel>) -> Self {
        let mut map = Self::new();
        map.apply(levels);
        map
    }

    /// Apply a batch of levels in order; later levels for a price win.
    pub fn apply(&mut self, levels: impl IntoIterator<Item = PriceLevel>) {
        for level in levels {
            self.upsert(level);
        }
    }

    /// Insert or replace a level, or remove it when its quantity is zero.
    pub fn upsert(&mut self, level: PriceLevel) {
        if level.is_removal() {
            self.levels.remove(&level.price);
        } else {
            self.levels.insert(level.price, level.quantity);
        }
    }

    /// Quantity resting at `price`.
    pub fn get(&self, price: &Decimal) -> Option<Decimal> {
        self.levels.get(price).copied()
    }

    /// Number of price levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether the side has no levels.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Lowest `depth` levels, ascending by price.
    pub fn ascending(&self, depth: usize) -> Vec<PriceLevel> {
        self.levels
            .iter()
            .take(depth)
            .map(|(&price, &quantity)| PriceLevel { price, quantity })
            .collect()
    }

    /// Highest `depth` levels, descending by price.
    pub fn descending(&self, depth: usize) -> Vec<PriceLevel> {
        self.levels
            .iter()
            .rev()
            .take(depth)
            .map(|(&price, &quantity)| PriceLevel { price, quantity })
            .collect()
    }
}

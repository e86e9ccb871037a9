//! Local replica of one symbol's order book.

use super::level_map::PriceLevelMap;
use super::types::{PriceLevel, Projection, Side};

/// Replica built from a REST snapshot plus streamed depth deltas.
///
/// Owned by a single writer. Readers only ever see [`Projection`]s.
#[derive(Debug, Clone)]
pub struct BookReplica {
    symbol: String,
    asks: PriceLevelMap,
    bids: PriceLevelMap,
    snapshot_loaded: bool,
}

impl BookReplica {
    /// Create an empty replica that drops deltas until a snapshot loads.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            asks: PriceLevelMap::new(),
            bids: PriceLevelMap::new(),
            snapshot_loaded: false,
        }
    }

    /// Symbol this replica tracks.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Whether a snapshot has been loaded.
    pub fn is_snapshot_loaded(&self) -> bool {
        self.snapshot_loaded
    }

    /// Ask side.
    pub fn asks(&self) -> &PriceLevelMap {
        &self.asks
    }

    /// Bid side.
    pub fn bids(&self) -> &PriceLevelMap {
        &self.bids
    }

    /// Replace both sides with a full listing.
    pub fn load_snapshot(&mut self, asks: Vec<PriceLevel>, bids: Vec<PriceLevel>) {
        let asks = PriceLevelMap::from_levels(asks);
        let bids = PriceLevelMap::from_levels(bids);
        self.asks = asks;
        self.bids = bids;
        self.snapshot_loaded = true;
    }

    /// Apply one side of a depth delta.
    ///
    /// Returns `false` and leaves the book untouched when no snapshot has
    /// been loaded yet.
    pub fn apply_delta(&mut self, side: Side, levels: &[PriceLevel]) -> bool {
        if !self.snapshot_loaded {
            return false;
        }
        let book = match side {
            Side::Ask => &mut self.asks,
            Side::Bid => &mut self.bids,
        };
        book.apply(levels.iter().copied());
        true
    }

    /// Apply both sides of a depth delta frame.
    pub fn apply_update(&mut self, asks: &[PriceLevel], bids: &[PriceLevel]) -> bool {
        self.apply_delta(Side::Ask, asks) && self.apply_delta(Side::Bid, bids)
    }

    /// Build an ordered view with at most `depth` levels per side.
    ///
    /// Returns `None` when either side is empty, including before the first
    /// snapshot.
    pub fn project(&self, depth: usize) -> Option<Projection> {
        if depth == 0 || self.asks.is_empty() || self.bids.is_empty() {
            return None;
        }
        Some(Projection {
            symbol: self.symbol.clone(),
            asks: self.asks.ascending(depth),
            bids: self.bids.descending(depth),
        })
    }
}

//! Order book types and data structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Single price level in an order book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceLevel {
    /// Price at this level.
    pub price: Decimal,
    /// Quantity resting at this price. Zero removes the level.
    pub quantity: Decimal,
}

impl PriceLevel {
    /// Create a new price level.
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }

    /// Whether this level removes its price instead of resting.
    pub fn is_removal(&self) -> bool {
        self.quantity <= Decimal::ZERO
    }
}

/// Side of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Side {
    /// Sell orders, best is lowest.
    Ask,
    /// Buy orders, best is highest.
    Bid,
}

/// Immutable, depth-capped view of a replica.
///
/// Asks are strictly ascending and bids strictly descending, so the best
/// price of each side comes first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Projection {
    /// Symbol this view belongs to.
    pub symbol: String,
    /// Ask levels sorted by price ascending.
    pub asks: Vec<PriceLevel>,
    /// Bid levels sorted by price descending.
    pub bids: Vec<PriceLevel>,
}

impl Projection {
    /// Get the best bid price.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Get the best ask price.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Get the spread between best ask and best bid.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Check if the book is crossed (best_ask < best_bid).
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => ask < bid,
            _ => false,
        }
    }

    /// Total quantity on the ask side of this view.
    pub fn total_ask_quantity(&self) -> Decimal {
        self.asks.iter().map(|l| l.quantity).sum()
    }

    /// Total quantity on the bid side of this view.
    pub fn total_bid_quantity(&self) -> Decimal {
        self.bids.iter().map(|l| l.quantity).sum()
    }

    /// Copy of this view cut to `depth` levels per side.
    ///
    /// Returns `None` for a zero depth.
    pub fn truncated(&self, depth: usize) -> Option<Projection> {
        if depth == 0 {
            return None;
        }
        Some(Projection {
            symbol: self.symbol.clone(),
            asks: self.asks.iter().take(depth).copied().collect(),
            bids: self.bids.iter().take(depth).copied().collect(),
        })
    }
}

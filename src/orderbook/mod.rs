//! Order book module for the local replica.
//!
//! This module handles:
//! - Price level types and immutable projections
//! - Per-side price level maps with remove-on-zero semantics
//! - The snapshot-gated book replica

pub mod level_map;
pub mod replica;
pub mod types;

pub use level_map::PriceLevelMap;
pub use replica::BookReplica;
pub use types::{PriceLevel, Projection, Side};

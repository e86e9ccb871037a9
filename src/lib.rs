//! Local order book replica for MEXC spot depth streams.
//!
//! A [`feed::FeedSession`] loads a REST depth snapshot, subscribes to the
//! aggregated depth stream and keeps a [`orderbook::BookReplica`] in sync by
//! applying incremental price level updates:
//!
//! ```text
//! REST snapshot ──► BookReplica ◄── depth deltas ◄── FrameDecoder ◄── WebSocket
//!                        │
//!                        └──► Projection (top N per side) ──► pollers / callback
//! ```
//!
//! Readers never touch the replica. Every applied delta publishes a fresh
//! immutable [`orderbook::Projection`] that replaces the previous one
//! atomically.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`orderbook`]: Price level maps, the replica and projections
//! - [`feed`]: Frame decoding, snapshot loading, sessions and their manager
//! - [`market`]: Symbol directory and REST client setup
//! - [`render`]: Text rendering of projections
//! - [`api`]: HTTP API for health, sessions and metrics
//! - [`metrics`]: Prometheus metric helpers
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod feed;
pub mod market;
pub mod metrics;
pub mod orderbook;
pub mod render;
pub mod utils;

pub use config::{Config, FeedConfig};
pub use error::{FeedError, Result};

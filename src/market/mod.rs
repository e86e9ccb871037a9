//! Market metadata module.
//!
//! This module handles:
//! - Symbol normalization and lookup
//! - The exchange's default symbol listing
//! - Shared REST client construction

pub mod client;
pub mod types;

pub use client::{build_http_client, SymbolDirectory};
pub use types::{lookup_symbol, normalize_symbol, SymbolLookup, MAX_CANDIDATES};

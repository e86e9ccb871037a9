//! Protobuf wire types of the v3 push stream.
//!
//! Only the fields needed for aggregated depth are declared; prost skips
//! everything else in the wrapper's body.

/// Envelope around every binary push.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PushWrapper {
    /// Channel the push belongs to.
    #[prost(string, tag = "1")]
    pub channel: String,
    /// Symbol name.
    #[prost(string, optional, tag = "3")]
    pub symbol: Option<String>,
    /// Exchange symbol id.
    #[prost(string, optional, tag = "4")]
    pub symbol_id: Option<String>,
    /// Creation time in milliseconds.
    #[prost(int64, optional, tag = "5")]
    pub create_time: Option<i64>,
    /// Send time in milliseconds.
    #[prost(int64, optional, tag = "6")]
    pub send_time: Option<i64>,
    /// Aggregated depth body.
    #[prost(message, optional, tag = "313")]
    pub aggre_depths: Option<AggreDepths>,
}

/// Aggregated depth changes.
#[derive(Clone, PartialEq, prost::Message)]
pub struct AggreDepths {
    /// Changed ask levels.
    #[prost(message, repeated, tag = "1")]
    pub asks: Vec<DepthItem>,
    /// Changed bid levels.
    #[prost(message, repeated, tag = "2")]
    pub bids: Vec<DepthItem>,
    /// Event type.
    #[prost(string, tag = "3")]
    pub event_type: String,
    /// First version covered by this push.
    #[prost(string, tag = "4")]
    pub from_version: String,
    /// Last version covered by this push.
    #[prost(string, tag = "5")]
    pub to_version: String,
}

/// One changed level, decimal strings on the wire.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DepthItem {
    /// Price.
    #[prost(string, tag = "1")]
    pub price: String,
    /// Quantity; "0" removes the level.
    #[prost(string, tag = "2")]
    pub quantity: String,
}

impl DepthItem {
    /// Create an item from decimal strings.
    pub fn new(price: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            price: price.into(),
            quantity: quantity.into(),
        }
    }
}

//! Classification of inbound stream frames.

use prost::Message as _;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::proto::{DepthItem, PushWrapper};
use crate::orderbook::PriceLevel;

/// Channel name of binary keepalive pushes.
pub const PING_CHANNEL: &str = "system@ping";

/// Raw payload of one stream frame.
#[derive(Debug, Clone, Copy)]
pub enum RawFrame<'a> {
    /// Binary payload, normally protobuf.
    Binary(&'a [u8]),
    /// Text payload, normally a JSON control message.
    Text(&'a str),
}

/// Normalized stream update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateFrame {
    /// Incremental price level changes.
    DepthUpdate {
        /// Changed ask levels.
        asks: Vec<PriceLevel>,
        /// Changed bid levels.
        bids: Vec<PriceLevel>,
    },
    /// Server keepalive that needs an acknowledgement.
    Keepalive,
    /// Empty, malformed or uninteresting frame.
    Unrecognized,
}

/// JSON control message, sent and received as text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Request method ("SUBSCRIPTION", "PING", "PONG").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Topics for subscription requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<String>>,
    /// Request id echoed in acks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Ack status code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    /// Ack payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl ControlMessage {
    /// Subscription request for the given topics.
    pub fn subscribe(topics: Vec<String>) -> Self {
        Self {
            method: Some("SUBSCRIPTION".to_string()),
            params: Some(topics),
            ..Default::default()
        }
    }

    /// Acknowledgement for a keepalive.
    pub fn pong() -> Self {
        Self {
            method: Some("PONG".to_string()),
            ..Default::default()
        }
    }

    /// Whether this is a keepalive request.
    pub fn is_ping(&self) -> bool {
        self.method
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("PING"))
    }
}

/// Stateless frame decoder. Never fails; bad input is `Unrecognized`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Create a decoder.
    pub fn new() -> Self {
        Self
    }

    /// Classify one frame.
    pub fn decode(&self, raw: RawFrame<'_>) -> UpdateFrame {
        match raw {
            RawFrame::Binary(bytes) => match PushWrapper::decode(bytes) {
                Ok(wrapper) => Self::from_wrapper(wrapper),
                Err(e) => {
                    debug!(error = %e, len = bytes.len(), "Binary frame is not protobuf, trying text");
                    Self::decode_text(&String::from_utf8_lossy(bytes))
                }
            },
            RawFrame::Text(text) => Self::decode_text(text),
        }
    }

    fn from_wrapper(wrapper: PushWrapper) -> UpdateFrame {
        if let Some(depths) = wrapper.aggre_depths {
            return UpdateFrame::DepthUpdate {
                asks: parse_items(&depths.asks),
                bids: parse_items(&depths.bids),
            };
        }
        if wrapper.channel == PING_CHANNEL {
            return UpdateFrame::Keepalive;
        }
        debug!(channel = %wrapper.channel, "Ignoring push without depth");
        UpdateFrame::Unrecognized
    }

    fn decode_text(text: &str) -> UpdateFrame {
        match serde_json::from_str::<ControlMessage>(text.trim()) {
            Ok(message) if message.is_ping() => UpdateFrame::Keepalive,
            Ok(message) => {
                debug!(id = ?message.id, code = ?message.code, msg = ?message.msg, "Control message");
                UpdateFrame::Unrecognized
            }
            Err(e) => {
                debug!(error = %e, "Undecodable text frame");
                UpdateFrame::Unrecognized
            }
        }
    }
}

fn parse_items(items: &[DepthItem]) -> Vec<PriceLevel> {
    items
        .iter()
        .filter_map(|item| {
            let price = item.price.trim().parse::<Decimal>().ok()?;
            let quantity = item.quantity.trim().parse::<Decimal>().ok()?;
            Some(PriceLevel::new(price, quantity))
        })
        .collect()
}

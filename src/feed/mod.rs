//! Depth stream feed.
//!
//! This module handles:
//! - Protobuf push wrappers and JSON control messages
//! - Classifying inbound frames
//! - The one-shot REST snapshot
//! - Per-symbol sessions with reconnect and keepalive handling
//! - A registry of concurrent sessions

pub mod decoder;
pub mod manager;
pub mod proto;
pub mod session;
pub mod snapshot;

pub use decoder::{ControlMessage, FrameDecoder, RawFrame, UpdateFrame, PING_CHANNEL};
pub use manager::SessionManager;
pub use session::{ConnectionState, FeedSession, ProjectionReader, UpdateCallback};
pub use snapshot::{parse_depth_snapshot, DepthSnapshot, SnapshotLoader};

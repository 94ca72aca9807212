//! Wire and domain types for the hivewire realtime client
//!
//! This crate holds everything about hivewire that does not need a runtime:
//!
//! - **Frames**: STOMP 1.2 frames as carried in WebSocket text messages
//! - **Codec**: JSON conversion between frame bodies and domain types
//! - **Types**: message envelope, presence, notifications and connection state
//! - **Error handling**: the shared error type
//! - **Telemetry**: OpenTelemetry and `tracing` bootstrap for applications
//!
//! # Architecture
//!
//! The crate is transport-agnostic. It knows how a frame looks on the wire and
//! how a body maps to a [`DomainMessage`], but opening sockets, reconnecting
//! and routing live in `hivewire-client`.
//!
//! # Example
//!
//! ```rust
//! use hivewire_core::{codec, DomainMessage, Frame, MessageType};
//! use serde_json::json;
//!
//! let msg = DomainMessage::new(MessageType::ForumNewReply, "forum.reply.created", json!({"replyId": 4}));
//! let frame = Frame::send("/app/forum/reply/create", codec::encode_body(&msg).unwrap());
//!
//! let inbound = Frame::decode(&frame.encode()).unwrap().unwrap();
//! let decoded = codec::decode_message(&inbound.body).unwrap();
//! assert_eq!(decoded.message_type, MessageType::ForumNewReply);
//! ```

pub mod codec;
pub mod error;
pub mod frame;
pub mod telemetry;
pub mod types;

pub use error::{Error, Result};
pub use frame::{Frame, StompCommand};
pub use telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
pub use types::{
    ConnectionState, DomainMessage, MessageType, NotificationMessage, NotificationPriority,
    PresenceKey, PresenceStatus, PresenceUpdate, ReconnectionInfo,
};

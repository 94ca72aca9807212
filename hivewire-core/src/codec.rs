//! Frame body codec
//!
//! Converts between frame bodies (JSON text) and the domain types in
//! [`crate::types`]. The codec is stateless; the STOMP envelope itself is
//! handled by [`crate::frame`].
//!
//! # Presence Bodies
//!
//! The broker publishes presence in two shapes: wrapped in a
//! [`DomainMessage`] (`{"type":"USER_ONLINE","payload":{...}}`) on the global
//! presence topic, and as a bare [`PresenceUpdate`] on group presence topics.
//! [`decode_presence`] accepts both.
//!
//! # Examples
//!
//! ```rust
//! use hivewire_core::{codec, PresenceStatus};
//!
//! let bare = r#"{"userId":5,"status":"BUSY","groupId":1}"#;
//! let wrapped = r#"{"id":"m","type":"USER_ONLINE","payload":{"userId":5,"status":"ONLINE"}}"#;
//!
//! assert_eq!(codec::decode_presence(bare).unwrap().status, PresenceStatus::Busy);
//! assert_eq!(codec::decode_presence(wrapped).unwrap().status, PresenceStatus::Online);
//! assert!(codec::decode_message("not json").is_err());
//! ```

use crate::error::{Error, Result};
use crate::types::{DomainMessage, NotificationMessage, PresenceUpdate};
use serde::Serialize;
use serde_json::Value;

/// Encode any serializable body to JSON text
pub fn encode_body<T: Serialize + ?Sized>(body: &T) -> Result<String> {
    serde_json::to_string(body).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a frame body into a message envelope
pub fn decode_message(body: &str) -> Result<DomainMessage> {
    serde_json::from_str(body).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a presence frame body, wrapped or bare
pub fn decode_presence(body: &str) -> Result<PresenceUpdate> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| Error::Serialization(e.to_string()))?;

    // An envelope has both "type" and "payload"; a bare update has "userId"
    let inner = match (value.get("payload"), value.get("type")) {
        (Some(payload), Some(_)) if value.get("userId").is_none() => payload.clone(),
        _ => value,
    };

    serde_json::from_value(inner).map_err(|e| Error::Serialization(e.to_string()))
}

/// Extract the notification carried by a `NOTIFICATION` message
pub fn decode_notification(message: &DomainMessage) -> Result<NotificationMessage> {
    message.payload_as()
}

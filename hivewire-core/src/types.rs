//! Domain types exchanged with the realtime broker
//!
//! These are the structures the client decodes from inbound frame bodies and
//! encodes for outbound sends. Field names follow the broker's JSON (camelCase
//! fields, SCREAMING_SNAKE_CASE enum values).
//!
//! # Message Envelope
//!
//! Almost every broker frame carries a [`DomainMessage`]: an envelope with a
//! typed `type`, a free-form `event` label and a `payload` whose shape depends
//! on the type. Presence frames are the exception, they may arrive either as an
//! envelope or as a bare [`PresenceUpdate`].
//!
//! # Connection Bookkeeping
//!
//! [`ConnectionState`] and [`ReconnectionInfo`] live here rather than in the
//! client crate so UI code can depend on them without pulling in the runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Connection lifecycle state
///
/// ```text
/// Disconnected → Connecting → Connected
///                     ↓           ↓
///                  Reconnecting ←─┘
///                     ↓
///                   Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// Not connected and not trying to
    Disconnected,
    /// Initial connection attempt in flight
    Connecting,
    /// Session established
    Connected,
    /// Connection lost, retries scheduled
    Reconnecting,
    /// Retries exhausted; needs an explicit retry
    Failed,
}

impl ConnectionState {
    /// Numeric encoding used by the connection-state gauge
    pub fn as_gauge_value(&self) -> i64 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Reconnecting => 3,
            ConnectionState::Failed => 4,
        }
    }

    /// Whether a connection attempt is pending or in flight
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting
        )
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Reconnecting => "RECONNECTING",
            ConnectionState::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Snapshot of the reconnection bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectionInfo {
    /// Reconnection attempts scheduled since the last successful connect
    pub attempts: u32,
    /// Attempts allowed before giving up
    pub max_attempts: u32,
    /// Whether the client is currently in the reconnect cycle
    pub is_reconnecting: bool,
}

impl ReconnectionInfo {
    /// Info for a client that has not needed to reconnect
    pub fn idle(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            is_reconnecting: false,
        }
    }
}

/// Kind of domain event carried by a [`DomainMessage`]
///
/// Unknown kinds deserialize into `Other` so feature-prefix routing still
/// works for types this crate does not know about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    Text,
    System,
    Notification,
    Join,
    Leave,
    Reply,
    Subscribe,
    Unsubscribe,
    Disconnect,
    Heartbeat,
    UserOnline,
    UserOffline,
    UserAway,
    PresenceUpdate,
    ForumNewPost,
    ForumNewReply,
    ForumPostVoted,
    ForumReplyVoted,
    ForumReplyAccepted,
    ForumPostEdited,
    BuddyRequest,
    BuddyMatched,
    BuddyCheckin,
    TimerUpdate,
    HiveActivity,
    /// A kind not listed above, kept verbatim
    Other(String),
}

impl MessageType {
    /// Wire name of the type
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Text => "TEXT",
            MessageType::System => "SYSTEM",
            MessageType::Notification => "NOTIFICATION",
            MessageType::Join => "JOIN",
            MessageType::Leave => "LEAVE",
            MessageType::Reply => "REPLY",
            MessageType::Subscribe => "SUBSCRIBE",
            MessageType::Unsubscribe => "UNSUBSCRIBE",
            MessageType::Disconnect => "DISCONNECT",
            MessageType::Heartbeat => "HEARTBEAT",
            MessageType::UserOnline => "USER_ONLINE",
            MessageType::UserOffline => "USER_OFFLINE",
            MessageType::UserAway => "USER_AWAY",
            MessageType::PresenceUpdate => "PRESENCE_UPDATE",
            MessageType::ForumNewPost => "FORUM_NEW_POST",
            MessageType::ForumNewReply => "FORUM_NEW_REPLY",
            MessageType::ForumPostVoted => "FORUM_POST_VOTED",
            MessageType::ForumReplyVoted => "FORUM_REPLY_VOTED",
            MessageType::ForumReplyAccepted => "FORUM_REPLY_ACCEPTED",
            MessageType::ForumPostEdited => "FORUM_POST_EDITED",
            MessageType::BuddyRequest => "BUDDY_REQUEST",
            MessageType::BuddyMatched => "BUDDY_MATCHED",
            MessageType::BuddyCheckin => "BUDDY_CHECKIN",
            MessageType::TimerUpdate => "TIMER_UPDATE",
            MessageType::HiveActivity => "HIVE_ACTIVITY",
            MessageType::Other(other) => other,
        }
    }

    /// Whether the wire name starts with a feature namespace such as `FORUM_`
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.as_str().starts_with(prefix)
    }
}

impl From<String> for MessageType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "TEXT" => MessageType::Text,
            "SYSTEM" => MessageType::System,
            "NOTIFICATION" => MessageType::Notification,
            "JOIN" => MessageType::Join,
            "LEAVE" => MessageType::Leave,
            "REPLY" => MessageType::Reply,
            "SUBSCRIBE" => MessageType::Subscribe,
            "UNSUBSCRIBE" => MessageType::Unsubscribe,
            "DISCONNECT" => MessageType::Disconnect,
            "HEARTBEAT" => MessageType::Heartbeat,
            "USER_ONLINE" => MessageType::UserOnline,
            "USER_OFFLINE" => MessageType::UserOffline,
            "USER_AWAY" => MessageType::UserAway,
            "PRESENCE_UPDATE" => MessageType::PresenceUpdate,
            "FORUM_NEW_POST" => MessageType::ForumNewPost,
            "FORUM_NEW_REPLY" => MessageType::ForumNewReply,
            "FORUM_POST_VOTED" => MessageType::ForumPostVoted,
            "FORUM_REPLY_VOTED" => MessageType::ForumReplyVoted,
            "FORUM_REPLY_ACCEPTED" => MessageType::ForumReplyAccepted,
            "FORUM_POST_EDITED" => MessageType::ForumPostEdited,
            "BUDDY_REQUEST" => MessageType::BuddyRequest,
            "BUDDY_MATCHED" => MessageType::BuddyMatched,
            "BUDDY_CHECKIN" => MessageType::BuddyCheckin,
            "TIMER_UPDATE" => MessageType::TimerUpdate,
            "HIVE_ACTIVITY" => MessageType::HiveActivity,
            _ => MessageType::Other(value),
        }
    }
}

impl From<&str> for MessageType {
    fn from(value: &str) -> Self {
        MessageType::from(value.to_string())
    }
}

impl From<MessageType> for String {
    fn from(value: MessageType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope for every application-level message
///
/// Immutable once built; the builder-style helpers consume and return `self`.
///
/// # Examples
///
/// ```rust
/// use hivewire_core::{DomainMessage, MessageType};
/// use serde_json::json;
///
/// let msg = DomainMessage::new(MessageType::ForumNewPost, "forum.post.created", json!({"postId": 9}))
///     .with_sender("42", "ada");
///
/// assert_eq!(msg.message_type, MessageType::ForumNewPost);
/// assert_eq!(msg.sender_username.as_deref(), Some("ada"));
/// assert!(!msg.id.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainMessage {
    /// Unique per message
    #[serde(default)]
    pub id: String,
    /// Domain-event kind
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Free-form event label, e.g. `presence.update`
    #[serde(default)]
    pub event: String,
    /// Type-specific payload
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_username: Option<String>,
    /// ISO-8601 timestamp
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl DomainMessage {
    /// Create a message with a fresh id and the current UTC timestamp
    pub fn new(message_type: MessageType, event: impl Into<String>, payload: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message_type,
            event: event.into(),
            payload,
            sender_id: None,
            sender_username: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach sender identity
    pub fn with_sender(mut self, id: impl Into<String>, username: impl Into<String>) -> Self {
        self.sender_id = Some(id.into());
        self.sender_username = Some(username.into());
        self
    }

    /// Attach one metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Deserialize the payload into a concrete type
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        serde_json::from_value(self.payload.clone()).map_err(crate::Error::from)
    }
}

/// Live status of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresenceStatus {
    Online,
    Away,
    Busy,
    InFocusSession,
    InBuddySession,
    DoNotDisturb,
    Offline,
}

impl PresenceStatus {
    /// False only for `Offline`
    pub fn is_present(&self) -> bool {
        !matches!(self, PresenceStatus::Offline)
    }
}

impl Default for PresenceStatus {
    fn default() -> Self {
        PresenceStatus::Offline
    }
}

/// Key of a presence record: one per user per group
///
/// `group_id: None` is the user's global (not group-scoped) status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PresenceKey {
    pub user_id: i64,
    pub group_id: Option<i64>,
}

/// A presence record as broadcast by the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "PresenceWire")]
pub struct PresenceUpdate {
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub status: PresenceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Shared-space identifier; read from `groupId`, else `hiveId`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_activity: Option<String>,
    /// ISO-8601 timestamp
    #[serde(default)]
    pub last_seen: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_minutes_remaining: Option<i64>,
}

/// Inbound shape of [`PresenceUpdate`]; brokers send `groupId`, `hiveId` or both
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresenceWire {
    user_id: i64,
    #[serde(default)]
    username: Option<String>,
    status: PresenceStatus,
    #[serde(default)]
    status_message: Option<String>,
    #[serde(default)]
    group_id: Option<i64>,
    #[serde(default)]
    hive_id: Option<i64>,
    #[serde(default)]
    current_activity: Option<String>,
    #[serde(default)]
    last_seen: String,
    #[serde(default)]
    focus_minutes_remaining: Option<i64>,
}

impl From<PresenceWire> for PresenceUpdate {
    fn from(wire: PresenceWire) -> Self {
        Self {
            user_id: wire.user_id,
            username: wire.username,
            status: wire.status,
            status_message: wire.status_message,
            group_id: wire.group_id.or(wire.hive_id),
            current_activity: wire.current_activity,
            last_seen: wire.last_seen,
            focus_minutes_remaining: wire.focus_minutes_remaining,
        }
    }
}

impl PresenceUpdate {
    /// Minimal record for a user/status pair, stamped now
    pub fn new(user_id: i64, status: PresenceStatus) -> Self {
        Self {
            user_id,
            username: None,
            status,
            status_message: None,
            group_id: None,
            current_activity: None,
            last_seen: chrono::Utc::now().to_rfc3339(),
            focus_minutes_remaining: None,
        }
    }

    /// Scope the record to a group
    pub fn in_group(mut self, group_id: i64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    /// Attach an activity label
    pub fn with_activity(mut self, activity: impl Into<String>) -> Self {
        self.current_activity = Some(activity.into());
        self
    }

    /// The (user, group) key this record is stored under
    pub fn key(&self) -> PresenceKey {
        PresenceKey {
            user_id: self.user_id,
            group_id: self.group_id,
        }
    }
}

/// Notification urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for NotificationPriority {
    fn default() -> Self {
        NotificationPriority::Normal
    }
}

/// A user-facing notification, accumulated until cleared
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    pub id: String,
    /// Broker notification kind, e.g. `BUDDY_CHECKIN_REMINDER`
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub priority: NotificationPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_action: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

//! Inbound message classification and dispatch
//!
//! Each MESSAGE frame is decoded exactly once and then classified:
//!
//! - frames whose destination contains the presence segment are presence
//!   frames: they feed the presence tracker, the presence-update handlers and
//!   the [`Channel::Presence`] handlers
//! - everything else is a [`DomainMessage`] and goes to [`Channel::General`],
//!   to [`Channel::Notification`] for `NOTIFICATION` messages, and to every
//!   [`Channel::Feature`] whose prefix matches the message type
//!
//! A frame whose body fails to decode never reaches any handler.

use crate::handlers::{Handler, HandlerId, HandlerSet};
use hivewire_core::{codec, DomainMessage, Frame, MessageType, PresenceUpdate, Result};
use std::fmt;

/// Handler for decoded domain messages
pub type MessageHandler = Handler<DomainMessage>;

/// Handler for presence updates
pub type PresenceHandler = Handler<PresenceUpdate>;

/// Message channel a handler can register on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Every routed message
    General,
    /// Messages of type `NOTIFICATION`
    Notification,
    /// Presence frames, as an envelope
    Presence,
    /// Messages whose type starts with the prefix, e.g. `FORUM_`
    Feature(String),
}

impl Channel {
    /// Feature channel for a namespace
    ///
    /// `"forum"`, `"FORUM"` and `"FORUM_"` all select `FORUM_*` types.
    pub fn feature(namespace: &str) -> Self {
        let name = namespace.trim().trim_end_matches('_').to_ascii_uppercase();
        Channel::Feature(format!("{}_", name))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::General => f.write_str("general"),
            Channel::Notification => f.write_str("notification"),
            Channel::Presence => f.write_str("presence"),
            Channel::Feature(prefix) => write!(f, "feature:{}", prefix),
        }
    }
}

/// Result of decoding a MESSAGE frame body
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Inbound {
    Presence {
        update: PresenceUpdate,
        envelope: DomainMessage,
    },
    Message(DomainMessage),
}

pub(crate) struct MessageRouter {
    presence_segment: String,
    general: HandlerSet<DomainMessage>,
    notification: HandlerSet<DomainMessage>,
    presence_messages: HandlerSet<DomainMessage>,
    presence_updates: HandlerSet<PresenceUpdate>,
    // Ordered by first registration of each prefix
    features: Vec<(String, HandlerSet<DomainMessage>)>,
}

impl MessageRouter {
    pub fn new(presence_segment: impl Into<String>) -> Self {
        Self {
            presence_segment: presence_segment.into(),
            general: HandlerSet::new(),
            notification: HandlerSet::new(),
            presence_messages: HandlerSet::new(),
            presence_updates: HandlerSet::new(),
            features: Vec::new(),
        }
    }

    pub fn on_message(&mut self, id: HandlerId, channel: Channel, handler: MessageHandler) {
        match channel {
            Channel::General => self.general.insert(id, handler),
            Channel::Notification => self.notification.insert(id, handler),
            Channel::Presence => self.presence_messages.insert(id, handler),
            Channel::Feature(prefix) => {
                match self.features.iter_mut().find(|(p, _)| *p == prefix) {
                    Some((_, set)) => set.insert(id, handler),
                    None => {
                        let mut set = HandlerSet::new();
                        set.insert(id, handler);
                        self.features.push((prefix, set));
                    }
                }
            }
        }
    }

    pub fn on_presence_update(&mut self, id: HandlerId, handler: PresenceHandler) {
        self.presence_updates.insert(id, handler);
    }

    /// Remove a handler from whichever channel holds it
    pub fn remove(&mut self, id: HandlerId) -> bool {
        let removed = self.general.remove(id)
            || self.notification.remove(id)
            || self.presence_messages.remove(id)
            || self.presence_updates.remove(id)
            || self.features.iter_mut().any(|(_, set)| set.remove(id));
        self.features.retain(|(_, set)| !set.is_empty());
        removed
    }

    pub fn is_presence_destination(&self, destination: &str) -> bool {
        destination.contains(self.presence_segment.as_str())
    }

    /// Decode a MESSAGE frame body according to its destination
    pub fn classify(&self, frame: &Frame) -> Result<Inbound> {
        let destination = frame.destination().unwrap_or_default();
        if !self.is_presence_destination(destination) {
            return codec::decode_message(&frame.body).map(Inbound::Message);
        }

        let update = codec::decode_presence(&frame.body)?;
        let envelope = codec::decode_message(&frame.body)
            .ok()
            .filter(|message| message.payload.get("userId").is_some())
            .unwrap_or_else(|| {
                let payload = serde_json::to_value(&update).unwrap_or_default();
                DomainMessage::new(MessageType::PresenceUpdate, "presence.update", payload)
            });
        Ok(Inbound::Presence { update, envelope })
    }

    /// Run the channel handlers for a domain message; returns panics caught
    pub fn dispatch_message(&self, message: &DomainMessage) -> usize {
        let mut panics = self.general.dispatch(message);
        if message.message_type == MessageType::Notification {
            panics += self.notification.dispatch(message);
        }
        for (prefix, set) in &self.features {
            if message.message_type.has_prefix(prefix) {
                panics += set.dispatch(message);
            }
        }
        panics
    }

    /// Run the presence handlers; returns panics caught
    pub fn dispatch_presence(&self, update: &PresenceUpdate, envelope: &DomainMessage) -> usize {
        self.presence_updates.dispatch(update) + self.presence_messages.dispatch(envelope)
    }
}

//! Accumulated user notifications
//!
//! `NOTIFICATION` messages are appended here in arrival order and stay until
//! the caller clears them, by id or all at once.

use hivewire_core::{codec, DomainMessage, NotificationMessage};

#[derive(Debug, Default)]
pub(crate) struct NotificationCenter {
    items: Vec<NotificationMessage>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the notification carried by `message`
    ///
    /// A payload that does not decode is logged and skipped.
    pub fn ingest(&mut self, message: &DomainMessage) -> bool {
        match codec::decode_notification(message) {
            Ok(notification) => {
                tracing::debug!(
                    notification_id = %notification.id,
                    notification_type = %notification.notification_type,
                    "Notification received"
                );
                self.items.push(notification);
                true
            }
            Err(e) => {
                tracing::warn!(message_id = %message.id, error = %e, "Undecodable notification payload");
                false
            }
        }
    }

    pub fn list(&self) -> Vec<NotificationMessage> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Remove every entry with the given id
    pub fn clear(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    pub fn clear_all(&mut self) {
        self.items.clear();
    }
}

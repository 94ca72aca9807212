//! Subscription registry
//!
//! The registry is the authority for "what am I listening to". It keeps two
//! views of every entry:
//!
//! - the **standing** subscription: topic plus callback, kept until the caller
//!   unsubscribes or the client disconnects
//! - whether that subscription is **live** on the current transport session
//!
//! When the session drops every entry goes stale but stays standing. On the
//! next transition into CONNECTED, [`SubscriptionRegistry::replay`] produces a
//! SUBSCRIBE frame per standing entry and marks them live again.

use hivewire_core::Frame;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Callback for frames arriving on a subscribed topic
pub type SubscriptionCallback = Arc<dyn Fn(&Frame) + Send + Sync>;

/// Opaque subscription handle; doubles as the STOMP subscription id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

impl FromStr for SubscriptionId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("sub-")
            .and_then(|n| n.parse().ok())
            .map(SubscriptionId)
            .ok_or(())
    }
}

pub(crate) struct SubscriptionEntry {
    pub id: SubscriptionId,
    pub topic: String,
    pub callback: SubscriptionCallback,
    pub live: bool,
}

impl SubscriptionEntry {
    fn subscribe_frame(&self) -> Frame {
        Frame::subscribe(&self.id.to_string(), &self.topic)
    }
}

pub(crate) struct SubscriptionRegistry {
    entries: BTreeMap<SubscriptionId, SubscriptionEntry>,
    next_id: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Register a live subscription and return its SUBSCRIBE frame
    pub fn insert(
        &mut self,
        topic: impl Into<String>,
        callback: SubscriptionCallback,
    ) -> (SubscriptionId, Frame) {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        let entry = SubscriptionEntry {
            id,
            topic: topic.into(),
            callback,
            live: true,
        };
        let frame = entry.subscribe_frame();
        self.entries.insert(id, entry);
        (id, frame)
    }

    /// Remove an entry; unknown ids are a no-op
    pub fn remove(&mut self, id: SubscriptionId) -> Option<SubscriptionEntry> {
        self.entries.remove(&id)
    }

    /// Entry an inbound MESSAGE frame belongs to
    ///
    /// Matches on the `subscription` header first, then on the destination.
    pub fn lookup(&self, frame: &Frame) -> Option<&SubscriptionEntry> {
        let by_id = frame
            .subscription()
            .and_then(|raw| raw.parse::<SubscriptionId>().ok())
            .and_then(|id| self.entries.get(&id));

        by_id.or_else(|| {
            let destination = frame.destination()?;
            self.entries
                .values()
                .find(|entry| entry.topic == destination)
        })
    }

    /// The session is gone; nothing is live any more
    pub fn mark_all_stale(&mut self) {
        for entry in self.entries.values_mut() {
            entry.live = false;
        }
    }

    /// SUBSCRIBE frames for every standing entry, which become live
    pub fn replay(&mut self) -> Vec<Frame> {
        self.entries
            .values_mut()
            .map(|entry| {
                entry.live = true;
                entry.subscribe_frame()
            })
            .collect()
    }

    /// UNSUBSCRIBE frames for every live entry
    pub fn unsubscribe_frames(&self) -> Vec<Frame> {
        self.entries
            .values()
            .filter(|entry| entry.live)
            .map(|entry| Frame::unsubscribe(&entry.id.to_string()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `(id, topic)` of every standing entry
    pub fn topics(&self) -> Vec<(SubscriptionId, String)> {
        self.entries
            .values()
            .map(|entry| (entry.id, entry.topic.clone()))
            .collect()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivewire_core::StompCommand;

    fn noop() -> SubscriptionCallback {
        Arc::new(|_: &Frame| {})
    }

    fn message(subscription: Option<&str>, destination: &str) -> Frame {
        let frame = Frame::new(StompCommand::Message).header("destination", destination);
        match subscription {
            Some(id) => frame.header("subscription", id),
            None => frame,
        }
    }

    #[test]
    fn test_insert_builds_subscribe_frame() {
        let mut registry = SubscriptionRegistry::new();
        let (id, frame) = registry.insert("/topic/presence", noop());

        assert_eq!(id.to_string(), "sub-1");
        assert_eq!(frame.command, StompCommand::Subscribe);
        assert_eq!(frame.get_header("id"), Some("sub-1"));
        assert_eq!(frame.destination(), Some("/topic/presence"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = SubscriptionRegistry::new();
        let (a, _) = registry.insert("/topic/a", noop());
        let (b, _) = registry.insert("/topic/b", noop());

        assert!(registry.remove(a).is_some());
        assert!(registry.remove(a).is_none());
        assert!(registry.remove(SubscriptionId(99)).is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.topics(), vec![(b, "/topic/b".to_string())]);
    }

    #[test]
    fn test_lookup_by_header_then_destination() {
        let mut registry = SubscriptionRegistry::new();
        let (a, _) = registry.insert("/topic/hive/1/presence", noop());
        let (b, _) = registry.insert("/user/queue/notifications", noop());

        let by_header = message(Some("sub-2"), "/user/1/queue/notifications");
        assert_eq!(registry.lookup(&by_header).map(|e| e.id), Some(b));

        let by_destination = message(None, "/topic/hive/1/presence");
        assert_eq!(registry.lookup(&by_destination).map(|e| e.id), Some(a));

        assert!(registry.lookup(&message(Some("sub-77"), "/topic/other")).is_none());
    }

    #[test]
    fn test_replay_after_stale() {
        let mut registry = SubscriptionRegistry::new();
        registry.insert("/topic/x", noop());
        registry.insert("/topic/y", noop());

        registry.mark_all_stale();
        assert!(registry.unsubscribe_frames().is_empty());

        let frames = registry.replay();
        let mut topics: Vec<_> = frames.iter().filter_map(|f| f.destination()).collect();
        topics.sort_unstable();
        assert_eq!(topics, vec!["/topic/x", "/topic/y"]);
        assert_eq!(registry.unsubscribe_frames().len(), 2);
    }

    #[test]
    fn test_subscription_id_parse() {
        assert_eq!("sub-12".parse::<SubscriptionId>(), Ok(SubscriptionId(12)));
        assert!("12".parse::<SubscriptionId>().is_err());
        assert!("sub-x".parse::<SubscriptionId>().is_err());
    }
}

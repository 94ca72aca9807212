//! Presence tracking and status-change debounce
//!
//! The tracker keeps one record per `(user_id, group_id)` pair. A newer record
//! for the same pair replaces the older one, and an `OFFLINE` record removes
//! the pair, so "who is present" never returns stale entries.
//!
//! # Local Status Debounce
//!
//! Local status changes are applied immediately and then published. Sends are
//! spaced by a quiet interval: a change requested less than `quiet_interval`
//! after the last send is deferred until `last_sent + quiet_interval`, and any
//! further change before then replaces the deferred one. Only the latest
//! status in the window goes out, and it goes out at most one quiet interval
//! after it was requested.

use hivewire_core::{PresenceKey, PresenceStatus, PresenceUpdate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

/// Body published for a local status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: PresenceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_activity: Option<String>,
}

impl StatusChange {
    pub fn new(status: PresenceStatus) -> Self {
        Self {
            status,
            group_id: None,
            current_activity: None,
        }
    }

    pub fn in_group(mut self, group_id: i64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn with_activity(mut self, activity: impl Into<String>) -> Self {
        self.current_activity = Some(activity.into());
        self
    }
}

impl From<PresenceStatus> for StatusChange {
    fn from(status: PresenceStatus) -> Self {
        StatusChange::new(status)
    }
}

pub(crate) struct PresenceTracker {
    records: BTreeMap<PresenceKey, PresenceUpdate>,
    user_id: Option<i64>,
    local: Option<StatusChange>,
    quiet_interval: Duration,
    last_sent: Option<Instant>,
    deferred: Option<(StatusChange, Instant)>,
}

impl PresenceTracker {
    pub fn new(user_id: Option<i64>, quiet_interval: Duration) -> Self {
        Self {
            records: BTreeMap::new(),
            user_id,
            local: None,
            quiet_interval,
            last_sent: None,
            deferred: None,
        }
    }

    /// Upsert an inbound record; `OFFLINE` removes the key
    pub fn apply(&mut self, update: PresenceUpdate) {
        let key = update.key();
        if update.status.is_present() {
            self.records.insert(key, update);
        } else {
            self.records.remove(&key);
        }
    }

    pub fn presence_of(&self, user_id: i64, group_id: Option<i64>) -> Option<PresenceUpdate> {
        self.records
            .get(&PresenceKey { user_id, group_id })
            .cloned()
    }

    /// Present users scoped to `group_id` (`None` is the global scope)
    pub fn present_users(&self, group_id: Option<i64>) -> Vec<PresenceUpdate> {
        self.records
            .values()
            .filter(|record| record.group_id == group_id && record.status.is_present())
            .cloned()
            .collect()
    }

    pub fn online_count(&self, group_id: Option<i64>) -> usize {
        self.records
            .values()
            .filter(|record| record.group_id == group_id && record.status.is_present())
            .count()
    }

    pub fn local_status(&self) -> Option<StatusChange> {
        self.local.clone()
    }

    /// Apply a local status change
    ///
    /// Returns the change when it may be sent right away; otherwise it is
    /// deferred until [`PresenceTracker::deadline`].
    pub fn request(&mut self, change: StatusChange, now: Instant) -> Option<StatusChange> {
        self.local = Some(change.clone());
        if let Some(user_id) = self.user_id {
            let mut own = PresenceUpdate::new(user_id, change.status);
            own.group_id = change.group_id;
            own.current_activity = change.current_activity.clone();
            self.apply(own);
        }

        match self.last_sent {
            Some(last) if now.duration_since(last) < self.quiet_interval => {
                let due = last + self.quiet_interval;
                self.deferred = Some((change, due));
                None
            }
            _ => {
                self.deferred = None;
                Some(change)
            }
        }
    }

    /// When the deferred change is due, if there is one
    pub fn deadline(&self) -> Option<Instant> {
        self.deferred.as_ref().map(|(_, due)| *due)
    }

    /// Take the deferred change if it is due
    pub fn take_due(&mut self, now: Instant) -> Option<StatusChange> {
        match &self.deferred {
            Some((_, due)) if *due <= now => self.deferred.take().map(|(change, _)| change),
            _ => None,
        }
    }

    /// A status change went out on the wire
    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }

    /// Manual disconnect: records describe a session that is gone
    pub fn clear(&mut self) {
        self.records.clear();
        self.deferred = None;
    }
}

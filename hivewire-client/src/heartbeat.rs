//! Liveness heartbeat while connected
//!
//! The scheduler owns an optional interval timer. [`HeartbeatScheduler::start`]
//! and [`HeartbeatScheduler::stop`] are idempotent, so the connection actor
//! can call them on every transition without double-scheduling. The first
//! beat fires one full period after `start`.

use hivewire_core::{codec, DomainMessage, Frame, MessageType, Result};
use serde_json::json;
use std::time::Duration;
use tokio::time::{self, Interval, MissedTickBehavior};

pub(crate) struct HeartbeatScheduler {
    period: Duration,
    destination: String,
    timer: Option<Interval>,
}

impl HeartbeatScheduler {
    pub fn new(period: Duration, destination: impl Into<String>) -> Self {
        Self {
            period,
            destination: destination.into(),
            timer: None,
        }
    }

    /// Start beating; no-op if already running
    pub fn start(&mut self) -> bool {
        if self.timer.is_some() {
            return false;
        }
        let mut timer = time::interval_at(time::Instant::now() + self.period, self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.timer = Some(timer);
        true
    }

    /// Stop beating; no-op if not running
    pub fn stop(&mut self) -> bool {
        self.timer.take().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Wait for the next beat; pending forever while stopped
    pub async fn tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// The liveness frame to publish
    pub fn beat(&self) -> Result<Frame> {
        let message = DomainMessage::new(MessageType::Heartbeat, "heartbeat", json!({}));
        Ok(Frame::send(&self.destination, codec::encode_body(&message)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivewire_core::StompCommand;

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let mut heartbeat = HeartbeatScheduler::new(Duration::from_secs(30), "/app/presence/ws-heartbeat");
        assert!(heartbeat.start());
        assert!(!heartbeat.start());
        assert!(heartbeat.is_running());
        assert!(heartbeat.stop());
        assert!(!heartbeat.stop());
        assert!(!heartbeat.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_beat_after_one_period() {
        let mut heartbeat = HeartbeatScheduler::new(Duration::from_secs(30), "/app/presence/ws-heartbeat");
        heartbeat.start();

        let started = time::Instant::now();
        heartbeat.tick().await;
        assert_eq!(started.elapsed(), Duration::from_secs(30));

        heartbeat.tick().await;
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_scheduler_never_ticks() {
        let mut heartbeat = HeartbeatScheduler::new(Duration::from_secs(1), "/hb");
        let waited = time::timeout(Duration::from_secs(10), heartbeat.tick()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn test_beat_frame() {
        let heartbeat = HeartbeatScheduler::new(Duration::from_secs(30), "/app/presence/ws-heartbeat");
        let frame = heartbeat.beat().unwrap();
        assert_eq!(frame.command, StompCommand::Send);
        assert_eq!(frame.destination(), Some("/app/presence/ws-heartbeat"));

        let message = codec::decode_message(&frame.body).unwrap();
        assert_eq!(message.message_type, MessageType::Heartbeat);
    }
}

//! Realtime messaging client over STOMP/WebSocket
//!
//! This crate keeps a single long-lived STOMP session to a message broker and
//! turns it into typed application events. It owns the connection lifecycle
//! so the rest of an application only sees state transitions and messages.
//!
//! # Core Features
//!
//! - **Connection lifecycle**: explicit state machine with observable transitions
//! - **Auto-Reconnection**: exponential backoff with jitter and an attempt cap
//! - **Standing subscriptions**: replayed on every new session
//! - **Typed routing**: general, notification, presence and per-feature channels
//! - **Presence**: per-user/per-group tracking and debounced status publishing
//! - **Notifications**: accumulated until cleared
//! - **Heartbeat**: periodic liveness message while connected
//! - **Observability**: OpenTelemetry metrics and `tracing` spans
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hivewire_client::{Channel, ClientBuilder, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new(ClientConfig::new("ws://localhost:8080/ws"))
//!         .token_provider(|| std::env::var("FOCUSHIVE_TOKEN").ok())
//!         .build()?;
//!
//!     client.on_message(Channel::Notification, |msg| {
//!         println!("notification: {:?}", msg.payload);
//!     });
//!     client.connect();
//!
//!     let mut state = client.watch_state();
//!     while state.changed().await.is_ok() {
//!         println!("connection: {}", *state.borrow());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # With Reconnection
//!
//! ```rust,no_run
//! use hivewire_client::{ClientBuilder, ClientConfig, ExponentialBackoff};
//! use std::time::Duration;
//!
//! # async fn example() -> hivewire_core::Result<()> {
//! let client = ClientBuilder::new(ClientConfig::new("ws://localhost:8080/ws"))
//!     .reconnection_strategy(Box::new(
//!         ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(10))
//!             .with_jitter(0.1),
//!     ))
//!     .build()?;
//! client.connect();
//! # Ok(())
//! # }
//! ```

mod builder;
mod client;
mod config;
mod connection;
mod handlers;
mod heartbeat;
mod metrics;
mod notification;
mod presence;
mod reconnect;
mod registry;
mod router;
mod token;
mod transport;

pub use builder::ClientBuilder;
pub use client::RealtimeClient;
pub use config::ClientConfig;
pub use handlers::{Handler, HandlerId};
pub use metrics::ClientMetrics;
pub use presence::StatusChange;
pub use reconnect::{
    ExponentialBackoff, FixedDelay, ReconnectDecision, ReconnectionController,
    ReconnectionStrategy, DEFAULT_JITTER,
};
pub use registry::{SubscriptionCallback, SubscriptionId};
pub use router::{Channel, MessageHandler, PresenceHandler};
pub use token::{Anonymous, TokenProvider};
pub use transport::{FrameSink, FrameStream, Transport, WebSocketTransport};

// Re-export the core types handlers receive
pub use hivewire_core::{
    ConnectionState, DomainMessage, Error, Frame, MessageType, NotificationMessage,
    NotificationPriority, PresenceStatus, PresenceUpdate, ReconnectionInfo, Result,
};

//! hivewire - realtime messaging over STOMP/WebSocket
//!
//! This is the main convenience crate that re-exports the hivewire sub-crates.
//! Use this crate if you want a single dependency for the wire types and the
//! client.
//!
//! # Architecture
//!
//! hivewire is organized into modular crates:
//!
//! - **hivewire-core**: STOMP frame codec, domain message types, errors, telemetry
//! - **hivewire-client**: connection actor with reconnection, subscriptions,
//!   routing, presence and notifications
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hivewire::{Channel, ClientBuilder, ClientConfig, ConnectionState};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new(ClientConfig::new("ws://localhost:8080/ws"))
//!         .token_provider(|| std::env::var("FOCUSHIVE_TOKEN").ok())
//!         .build()?;
//!
//!     client.on_message(Channel::feature("forum"), |msg| {
//!         println!("forum: {} {:?}", msg.message_type, msg.payload);
//!     });
//!     client.connect();
//!
//!     let mut state = client.watch_state();
//!     state.wait_for(|s| *s == ConnectionState::Connected).await?;
//!     client.send_message("/app/hive/7/chat", &json!({"text": "hello"}));
//!
//!     Ok(())
//! }
//! ```

pub use hivewire_client as client;
pub use hivewire_core as core;

// Convenience re-exports of the most commonly used types
pub use hivewire_client::{Channel, ClientBuilder, ClientConfig, RealtimeClient, StatusChange};
pub use hivewire_core::{ConnectionState, DomainMessage, MessageType, PresenceStatus};

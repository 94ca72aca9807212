//! Client metrics definitions
//!
//! OpenTelemetry instruments describing connection health and traffic. They
//! are exported through whatever meter provider the application installed,
//! typically via `hivewire_core::init_telemetry`.
//!
//! # Metrics Collected
//!
//! - **connection.state**: current connection state (gauge)
//! - **connect.attempts**: transport open + handshake attempts (counter)
//! - **reconnection.attempts**: reconnection attempts scheduled (counter)
//! - **reconnection.success**: sessions re-established after a loss (counter)
//! - **frames.received**: MESSAGE frames routed (counter)
//! - **frames.dropped**: inbound frames dropped, by reason (counter)
//! - **messages.sent**: frames published (counter)
//! - **sends.dropped**: sends discarded while not connected (counter)
//! - **handler.panics**: handler invocations that panicked (counter)
//! - **presence.updates**: presence records applied (counter)
//!
//! # Examples
//!
//! ```rust,no_run
//! use hivewire_client::{ClientBuilder, ClientConfig, ClientMetrics};
//!
//! # async fn example() -> hivewire_core::Result<()> {
//! let client = ClientBuilder::new(ClientConfig::new("ws://localhost:8080/ws"))
//!     .metrics(ClientMetrics::new("focushive-web"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use hivewire_core::ConnectionState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Meter},
    KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Connection state (0=disconnected, 1=connecting, 2=connected, 3=reconnecting, 4=failed)
    pub connection_state: Gauge<i64>,
    pub connect_attempts: Counter<u64>,
    pub reconnection_attempts: Counter<u64>,
    pub reconnection_success: Counter<u64>,
    pub frames_received: Counter<u64>,
    pub frames_dropped: Counter<u64>,
    pub messages_sent: Counter<u64>,
    pub sends_dropped: Counter<u64>,
    pub handler_panics: Counter<u64>,
    pub presence_updates: Counter<u64>,
}

impl ClientMetrics {
    /// Instruments on the global meter provider
    pub fn new(service_name: impl Into<String>) -> Self {
        let meter = global::meter_with_scope(
            opentelemetry::InstrumentationScope::builder(service_name.into())
                .with_version(env!("CARGO_PKG_VERSION"))
                .build(),
        );
        Self::new_with_meter(&meter)
    }

    /// Instruments on a caller-supplied meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("hivewire.client.connection.state")
                .with_description("Connection state (0=disconnected, 1=connecting, 2=connected, 3=reconnecting, 4=failed)")
                .build(),
            connect_attempts: meter
                .u64_counter("hivewire.client.connect.attempts")
                .with_description("Transport open and handshake attempts")
                .build(),
            reconnection_attempts: meter
                .u64_counter("hivewire.client.reconnection.attempts")
                .with_description("Reconnection attempts scheduled")
                .build(),
            reconnection_success: meter
                .u64_counter("hivewire.client.reconnection.success")
                .with_description("Sessions re-established after a loss")
                .build(),
            frames_received: meter
                .u64_counter("hivewire.client.frames.received")
                .with_description("MESSAGE frames routed to handlers")
                .build(),
            frames_dropped: meter
                .u64_counter("hivewire.client.frames.dropped")
                .with_description("Inbound frames dropped")
                .build(),
            messages_sent: meter
                .u64_counter("hivewire.client.messages.sent")
                .with_description("Frames published to the broker")
                .build(),
            sends_dropped: meter
                .u64_counter("hivewire.client.sends.dropped")
                .with_description("Sends discarded while not connected")
                .build(),
            handler_panics: meter
                .u64_counter("hivewire.client.handler.panics")
                .with_description("Handler invocations that panicked")
                .build(),
            presence_updates: meter
                .u64_counter("hivewire.client.presence.updates")
                .with_description("Presence records applied")
                .build(),
        }
    }

    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(
            state.as_gauge_value(),
            &[KeyValue::new("state", state.to_string())],
        );
    }

    pub fn record_connect_attempt(&self) {
        self.connect_attempts.add(1, &[]);
    }

    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }

    pub fn record_frame(&self, message_type: &str) {
        self.frames_received
            .add(1, &[KeyValue::new("type", message_type.to_string())]);
    }

    /// Record a dropped inbound frame (`malformed`, `undecodable`, `broker_error`)
    pub fn record_frame_dropped(&self, reason: &'static str) {
        self.frames_dropped.add(1, &[KeyValue::new("reason", reason)]);
    }

    pub fn record_sent(&self) {
        self.messages_sent.add(1, &[]);
    }

    pub fn record_send_dropped(&self) {
        self.sends_dropped.add(1, &[]);
    }

    pub fn record_handler_panics(&self, count: usize) {
        if count > 0 {
            self.handler_panics.add(count as u64, &[]);
        }
    }

    pub fn record_presence_update(&self) {
        self.presence_updates.add(1, &[]);
    }
}

//! Client builder for configuring transport, credentials and reconnection
//!
//! The `ClientBuilder` provides a fluent API for assembling a client before
//! the connection actor starts. It allows you to:
//! - Supply the bearer token source
//! - Swap the reconnection strategy
//! - Replace the transport (tests use in-memory channels)
//! - Configure telemetry and client metrics
//!
//! # Examples
//!
//! ```rust,no_run
//! use hivewire_client::{ClientBuilder, ClientConfig, FixedDelay};
//! use std::time::Duration;
//!
//! # async fn example() -> hivewire_core::Result<()> {
//! let client = ClientBuilder::new(ClientConfig::from_file("hivewire.toml")?)
//!     .token_provider(|| Some("eyJhbGciOi...".to_string()))
//!     .reconnection_strategy(Box::new(FixedDelay::new(Duration::from_secs(2))))
//!     .with_default_telemetry()
//!     .service_name("focushive-web")
//!     .build()?;
//!
//! client.connect();
//! # Ok(())
//! # }
//! ```

use crate::client::RealtimeClient;
use crate::config::ClientConfig;
use crate::connection::{ActorParts, ConnectionActor};
use crate::metrics::ClientMetrics;
use crate::reconnect::{ExponentialBackoff, ReconnectionController, ReconnectionStrategy};
use crate::token::{Anonymous, TokenProvider};
use crate::transport::{Transport, WebSocketTransport};
use hivewire_core::{ConnectionState, Error, ReconnectionInfo, Result, TelemetryConfig};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Builder for configuring and creating a [`RealtimeClient`]
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    metrics: Option<ClientMetrics>,
    telemetry_config: Option<TelemetryConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: Arc::new(WebSocketTransport),
            tokens: Arc::new(Anonymous),
            reconnect_strategy: None,
            metrics: None,
            telemetry_config: None,
            service_name: None,
        }
    }

    /// Where bearer tokens come from; read on every connection attempt
    pub fn token_provider(mut self, provider: impl TokenProvider) -> Self {
        self.tokens = Arc::new(provider);
        self
    }

    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    /// Replace the default exponential backoff built from the config delays
    pub fn reconnection_strategy(mut self, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        self.reconnect_strategy = Some(strategy);
        self
    }

    /// Record client metrics on the given instruments
    pub fn metrics(mut self, metrics: ClientMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Initialize OpenTelemetry with a custom configuration at build time
    pub fn with_telemetry(mut self, config: TelemetryConfig) -> Self {
        self.telemetry_config = Some(config);
        self
    }

    /// Initialize OpenTelemetry with the environment-driven defaults
    pub fn with_default_telemetry(mut self) -> Self {
        self.telemetry_config = Some(TelemetryConfig::default());
        self
    }

    /// Service name for telemetry (used if telemetry is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Validate the configuration and start the connection actor
    ///
    /// Does not connect; call [`RealtimeClient::connect`]. Must be called
    /// from within a tokio runtime.
    pub fn build(self) -> Result<RealtimeClient> {
        self.config.validate()?;

        let metrics = match self.telemetry_config {
            Some(mut telemetry) => {
                if let Some(name) = &self.service_name {
                    telemetry.service_name = name.clone();
                }
                let service_name = telemetry.service_name.clone();
                hivewire_core::init_telemetry(telemetry).map_err(|e| {
                    Error::Internal(format!("Failed to initialize telemetry: {}", e))
                })?;
                Some(
                    self.metrics
                        .unwrap_or_else(|| ClientMetrics::new(service_name)),
                )
            }
            None => self.metrics,
        };

        let strategy: Box<dyn ReconnectionStrategy> = match self.reconnect_strategy {
            Some(strategy) => strategy,
            None => Box::new(ExponentialBackoff::new(
                self.config.base_reconnect_delay(),
                self.config.max_reconnect_delay(),
            )),
        };
        let reconnection = ReconnectionController::new(strategy, self.config.max_reconnect_attempts);

        let (commands, inbox) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (info_tx, info_rx) = watch::channel(ReconnectionInfo::idle(
            self.config.max_reconnect_attempts,
        ));

        tracing::debug!(
            endpoint = %self.config.endpoint,
            max_attempts = self.config.max_reconnect_attempts,
            metrics = metrics.is_some(),
            "Starting connection actor"
        );

        let actor = ConnectionActor::new(ActorParts {
            config: self.config,
            transport: self.transport,
            tokens: self.tokens,
            reconnection,
            metrics,
            inbox,
            state_tx,
            info_tx,
        });
        tokio::spawn(actor.run());

        Ok(RealtimeClient::new(commands, state_rx, info_rx))
    }
}

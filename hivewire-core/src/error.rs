//! Error types for hivewire
//!
//! A single `Error` enum covers everything that can go wrong below the public
//! client surface: opening the transport, negotiating the STOMP session,
//! decoding frames and bodies, and loading configuration.
//!
//! # Where Errors Surface
//!
//! Business operations on the client (send, subscribe, presence updates) never
//! return these errors to the caller. Transport and handshake failures are fed
//! into the reconnection controller, malformed frames are logged and dropped.
//! The error type is public because the `Transport` trait and configuration
//! loading are part of the API.
//!
//! # Examples
//!
//! ```rust
//! use hivewire_core::Error;
//!
//! let error = Error::Handshake("broker rejected CONNECT".into());
//! assert!(error.is_recoverable());
//! assert!(!Error::Config("max_reconnect_attempts must be positive".into()).is_recoverable());
//! ```

use thiserror::Error;

/// Result type for hivewire operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for hivewire operations
///
/// # Error Categories
///
/// - **Transport errors**: WebSocket, ConnectionClosed, Timeout
/// - **Session errors**: Handshake, Auth
/// - **Decoding errors**: Parse, Serialization
/// - **Setup errors**: Config, Internal
///
/// The enum is `Clone` so an attempt outcome can be reported to several
/// observers without re-creating the error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// WebSocket transport layer error
    ///
    /// Covers failures to open the socket and read/write errors on an
    /// established socket.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The STOMP session could not be established
    ///
    /// The broker answered CONNECT with something other than CONNECTED, or the
    /// socket closed before the handshake finished.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The broker rejected the credential presented in CONNECT
    #[error("Authentication rejected: {0}")]
    Auth(String),

    /// An operation did not complete within its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The connection is no longer usable
    #[error("Connection closed")]
    ConnectionClosed,

    /// A frame on the wire is not valid STOMP
    #[error("Frame parse error: {0}")]
    Parse(String),

    /// A frame body could not be converted to or from JSON
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// The client actor is gone or an internal invariant broke
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the reconnection controller should retry after this error
    ///
    /// Transport, session and timeout failures are retried. An auth failure is
    /// retried too, since the token accessor may hand out a refreshed credential
    /// on the next attempt.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::WebSocket(_)
                | Error::Handshake(_)
                | Error::Auth(_)
                | Error::Timeout(_)
                | Error::ConnectionClosed
        )
    }

    /// Whether this error describes bad inbound data rather than a broken link
    ///
    /// Such frames are dropped and the session stays up.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Error::Parse(_) | Error::Serialization(_))
    }

    /// Short label used for log fields and metric attributes
    pub fn kind(&self) -> &'static str {
        match self {
            Error::WebSocket(_) => "websocket",
            Error::Handshake(_) => "handshake",
            Error::Auth(_) => "auth",
            Error::Timeout(_) => "timeout",
            Error::ConnectionClosed => "connection_closed",
            Error::Parse(_) => "parse",
            Error::Serialization(_) => "serialization",
            Error::Config(_) => "config",
            Error::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

//! Access-token accessor
//!
//! The client never stores credentials. Each connection attempt asks the
//! injected [`TokenProvider`] for the current token, so a token refreshed by
//! the authentication layer is picked up by the next attempt.

/// On-demand source of the bearer token sent in `CONNECT`
pub trait TokenProvider: Send + Sync + 'static {
    /// Current access token, or `None` to connect anonymously
    fn token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync + 'static,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// Provider for brokers that do not require authentication
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl TokenProvider for Anonymous {
    fn token(&self) -> Option<String> {
        None
    }
}

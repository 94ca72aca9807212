//! Transport capability and STOMP session handshake
//!
//! A [`Transport`] opens a duplex text-message channel to an endpoint. The
//! client layers STOMP on top of it, so any message-oriented transport works:
//! [`WebSocketTransport`] in production, in-memory channels in tests.

use async_trait::async_trait;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use hivewire_core::{Error, Frame, Result, StompCommand};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Outbound half of an open transport
pub type FrameSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// Inbound half of an open transport
///
/// The stream yields `Err` on a transport error and ends when the peer
/// closes the connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Opens duplex text channels to the broker
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, endpoint: &str) -> Result<(FrameSink, FrameStream)>;
}

/// WebSocket transport over `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, endpoint: &str) -> Result<(FrameSink, FrameStream)> {
        let (ws_stream, _) = connect_async(endpoint)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;
        let (write, read) = ws_stream.split();

        let sink = write
            .with(|text: String| future::ok::<_, tokio_tungstenite::tungstenite::Error>(Message::Text(text)))
            .sink_map_err(|e| Error::WebSocket(e.to_string()));

        let stream = read.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => Some(
                    String::from_utf8(bytes)
                        .map_err(|e| Error::Parse(format!("binary frame is not UTF-8: {}", e))),
                ),
                Ok(Message::Close(_)) => Some(Err(Error::ConnectionClosed)),
                Ok(_) => None,
                Err(e) => Some(Err(Error::WebSocket(e.to_string()))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

/// An open transport with an established STOMP session
pub(crate) struct Session {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Session {
    pub async fn send(&mut self, frame: Frame) -> Result<()> {
        self.sink.send(frame.encode()).await
    }

    /// Best-effort DISCONNECT and close
    pub async fn close(mut self) {
        let _ = self.send(Frame::disconnect()).await;
        let _ = self.sink.close().await;
    }
}

/// Parameters of one connection attempt
pub(crate) struct Handshake {
    pub transport: Arc<dyn Transport>,
    pub endpoint: String,
    pub host: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Handshake {
    /// Open the transport and negotiate the session within the deadline
    pub async fn establish(self) -> Result<Session> {
        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.negotiate()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "no CONNECTED frame within {:?}",
                timeout
            ))),
        }
    }

    async fn negotiate(self) -> Result<Session> {
        let (mut sink, mut stream) = self.transport.open(&self.endpoint).await?;
        sink.send(Frame::connect(&self.host, self.token.as_deref()).encode())
            .await?;

        loop {
            let text = match stream.next().await {
                Some(Ok(text)) => text,
                Some(Err(e)) => return Err(Error::Handshake(e.to_string())),
                None => {
                    return Err(Error::Handshake(
                        "connection closed before CONNECTED".to_string(),
                    ))
                }
            };

            let frame = match Frame::decode(&text)? {
                Some(frame) => frame,
                None => continue,
            };

            match frame.command {
                StompCommand::Connected => {
                    tracing::debug!(
                        version = frame.get_header("version").unwrap_or("unknown"),
                        server = frame.get_header("server").unwrap_or("unknown"),
                        "STOMP session established"
                    );
                    return Ok(Session { sink, stream });
                }
                StompCommand::Error => {
                    let reason = frame
                        .get_header("message")
                        .map(str::to_string)
                        .unwrap_or_else(|| frame.body.clone());
                    return Err(Error::Auth(reason));
                }
                other => {
                    return Err(Error::Handshake(format!(
                        "unexpected {} frame during handshake",
                        other
                    )))
                }
            }
        }
    }
}

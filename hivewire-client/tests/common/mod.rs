//! Common test utilities for hivewire-client integration tests
//!
//! [`MockBroker`] is an in-memory STOMP broker: the client opens sessions
//! through [`MockTransport`] and the test drives the broker side of each one
//! through a [`BrokerSession`]. [`MockWsBroker`] does the same over a real
//! WebSocket listener for end-to-end checks of the production transport.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::{SinkExt, StreamExt};
use hivewire_client::{ClientConfig, FrameSink, FrameStream, RealtimeClient, Transport};
use hivewire_core::{ConnectionState, DomainMessage, Error, Frame, MessageType, Result, StompCommand};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const CONNECTED: &str = "CONNECTED\nversion:1.2\nserver:mock-broker\n\n\0";

static MESSAGE_IDS: AtomicU64 = AtomicU64::new(1);

/// Configuration tuned for deterministic tests
///
/// The heartbeat is pushed out of the way; tests that need it override it.
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::new("ws://mock-broker/ws");
    config.heartbeat_interval_ms = 3_600_000;
    config.user_id = Some(42);
    config
}

struct Shared {
    refuse: AtomicBool,
    auto_accept: AtomicBool,
    opens: AtomicUsize,
    sessions: mpsc::UnboundedSender<BrokerSession>,
}

/// Client side of the in-memory broker
#[derive(Clone)]
pub struct MockTransport {
    shared: Arc<Shared>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, _endpoint: &str) -> Result<(FrameSink, FrameStream)> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        if self.shared.refuse.load(Ordering::SeqCst) {
            return Err(Error::WebSocket("connection refused".to_string()));
        }

        let (to_broker, inbound) = fmpsc::unbounded::<String>();
        let (outbound, to_client) = fmpsc::unbounded::<Result<String>>();
        if self.shared.auto_accept.load(Ordering::SeqCst) {
            let _ = outbound.unbounded_send(Ok(CONNECTED.to_string()));
        }
        let _ = self.shared.sessions.send(BrokerSession { inbound, outbound });

        let sink = to_broker.sink_map_err(|e| Error::WebSocket(e.to_string()));
        Ok((Box::pin(sink), Box::pin(to_client)))
    }
}

/// Test handle on the in-memory broker
pub struct MockBroker {
    shared: Arc<Shared>,
    sessions: mpsc::UnboundedReceiver<BrokerSession>,
}

impl MockBroker {
    /// Broker that answers every CONNECT with CONNECTED
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                refuse: AtomicBool::new(false),
                auto_accept: AtomicBool::new(true),
                opens: AtomicUsize::new(0),
                sessions: tx,
            }),
            sessions: rx,
        }
    }

    /// Broker whose sessions the test must accept or reject by hand
    pub fn manual() -> Self {
        let broker = Self::new();
        broker.shared.auto_accept.store(false, Ordering::SeqCst);
        broker
    }

    pub fn transport(&self) -> MockTransport {
        MockTransport {
            shared: self.shared.clone(),
        }
    }

    /// Refuse transport opens until switched back
    pub fn set_refuse(&self, refuse: bool) {
        self.shared.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of transport opens so far, refused ones included
    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Wait for the client to open the next session
    pub async fn accept(&mut self) -> BrokerSession {
        tokio::time::timeout(Duration::from_secs(600), self.sessions.recv())
            .await
            .expect("no session opened in time")
            .expect("broker dropped")
    }

    /// Session opened since the last accept, if any
    pub fn try_accept(&mut self) -> Option<BrokerSession> {
        self.sessions.try_recv().ok()
    }
}

/// Broker side of one open session
pub struct BrokerSession {
    inbound: fmpsc::UnboundedReceiver<String>,
    outbound: fmpsc::UnboundedSender<Result<String>>,
}

impl BrokerSession {
    /// Next frame from the client; `None` once the client closed the session
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            let text = self.inbound.next().await?;
            if let Some(frame) = Frame::decode(&text).expect("client sent a malformed frame") {
                return Some(frame);
            }
        }
    }

    /// Skip frames until one with `command` arrives
    pub async fn expect(&mut self, command: StompCommand) -> Frame {
        loop {
            match self.recv().await {
                Some(frame) if frame.command == command => return frame,
                Some(_) => continue,
                None => panic!("session closed while waiting for {}", command),
            }
        }
    }

    /// Every frame already written by the client, without waiting
    pub fn drain(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(Some(text)) = self.inbound.try_next() {
            if let Ok(Some(frame)) = Frame::decode(&text) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Answer the CONNECT of a manual session
    pub async fn accept_connect(&mut self) -> Frame {
        let connect = self.expect(StompCommand::Connect).await;
        self.push(CONNECTED);
        connect
    }

    /// Reject the CONNECT of a manual session with an ERROR frame
    pub async fn reject_connect(&mut self, reason: &str) -> Frame {
        let connect = self.expect(StompCommand::Connect).await;
        self.push(
            Frame::new(StompCommand::Error)
                .header("message", reason)
                .encode(),
        );
        connect
    }

    /// Raw text to the client
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.outbound.unbounded_send(Ok(text.into()));
    }

    /// Deliver a MESSAGE frame with a JSON body
    pub fn deliver(&self, destination: &str, subscription: Option<&str>, body: &Value) {
        self.push(message_frame(destination, subscription, &body.to_string()));
    }

    /// Deliver a domain message envelope
    pub fn deliver_message(&self, destination: &str, message: &DomainMessage) {
        let body = serde_json::to_value(message).expect("message serializes");
        self.deliver(destination, None, &body);
    }

    /// Simulate a transport error
    pub fn fail(&self, reason: &str) {
        let _ = self
            .outbound
            .unbounded_send(Err(Error::WebSocket(reason.to_string())));
    }

    /// Close the broker side; the client sees the stream end
    pub fn close(self) {}
}

/// MESSAGE frame text
pub fn message_frame(destination: &str, subscription: Option<&str>, body: &str) -> String {
    let id = MESSAGE_IDS.fetch_add(1, Ordering::SeqCst);
    let mut frame = Frame::new(StompCommand::Message)
        .header("destination", destination)
        .header("message-id", format!("m-{}", id));
    if let Some(subscription) = subscription {
        frame = frame.header("subscription", subscription);
    }
    frame.with_body(body).encode()
}

/// Domain message with the given type and payload
pub fn domain_message(message_type: MessageType, payload: Value) -> DomainMessage {
    let event = message_type.as_str().to_lowercase();
    DomainMessage::new(message_type, event, payload)
}

/// Wait until the client reports `target`
pub async fn wait_for_state(client: &RealtimeClient, target: ConnectionState) {
    let mut rx: watch::Receiver<ConnectionState> = client.watch_state();
    tokio::time::timeout(Duration::from_secs(600), rx.wait_for(|state| *state == target))
        .await
        .unwrap_or_else(|_| panic!("client never reached {}", target))
        .expect("connection actor stopped");
}

/// Records every value a handler is called with
#[derive(Clone)]
pub struct Recorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, value: T) {
        self.seen.lock().unwrap().push(value);
    }

    pub fn values(&self) -> Vec<T> {
        self.seen.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

/// Let the actor work through everything already queued
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// STOMP broker over a real WebSocket listener
///
/// Answers CONNECT with CONNECTED and forwards every other client frame to
/// the test.
pub struct MockWsBroker {
    addr: SocketAddr,
    frames: mpsc::UnboundedReceiver<Frame>,
    push: mpsc::UnboundedSender<Message>,
}

impl MockWsBroker {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(ws_stream) = accept_async(stream).await else {
                return;
            };
            let (mut write, mut read) = ws_stream.split();

            loop {
                tokio::select! {
                    incoming = read.next() => {
                        let Some(Ok(Message::Text(text))) = incoming else { break };
                        let Ok(Some(frame)) = Frame::decode(&text) else { continue };
                        if frame.command == StompCommand::Connect {
                            let _ = write.send(Message::Text(CONNECTED.to_string())).await;
                        }
                        let _ = frames_tx.send(frame);
                    }
                    outgoing = push_rx.recv() => {
                        let Some(message) = outgoing else { break };
                        let _ = write.send(message).await;
                    }
                }
            }
        });

        Self {
            addr,
            frames: frames_rx,
            push: push_tx,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Skip frames until one with `command` arrives
    pub async fn expect(&mut self, command: StompCommand) -> Frame {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), self.frames.recv())
                .await
                .expect("no frame in time")
                .expect("broker stopped");
            if frame.command == command {
                return frame;
            }
        }
    }

    pub fn push(&self, text: impl Into<String>) {
        let _ = self.push.send(Message::Text(text.into()));
    }

    pub fn push_binary(&self, bytes: Vec<u8>) {
        let _ = self.push.send(Message::Binary(bytes));
    }
}

//! The connection actor
//!
//! One task owns every piece of mutable client state: the transport session,
//! the subscription registry, the router, presence, notifications, the
//! heartbeat and the connection state. Public operations arrive as
//! [`Command`]s on an unbounded inbox and are handled one at a time, so no
//! state is ever touched from two places at once.
//!
//! # Event Loop
//!
//! Each turn of the loop waits for whichever comes first:
//!
//! - a command from a [`RealtimeClient`](crate::RealtimeClient) handle
//! - the outcome of the in-flight connection attempt
//! - an inbound text message on the live session
//! - the reconnect timer
//! - the presence debounce deadline
//! - the next heartbeat
//!
//! Connection attempts run as a spawned task so the actor keeps serving
//! commands during a slow handshake. At most one attempt exists at a time; a
//! disconnect aborts it and drops its handle, so its outcome is never seen.

use crate::config::ClientConfig;
use crate::handlers::{invoke_isolated, Handler, HandlerId, HandlerSet};
use crate::heartbeat::HeartbeatScheduler;
use crate::metrics::ClientMetrics;
use crate::notification::NotificationCenter;
use crate::presence::{PresenceTracker, StatusChange};
use crate::reconnect::{ReconnectDecision, ReconnectionController};
use crate::registry::{SubscriptionCallback, SubscriptionId, SubscriptionRegistry};
use crate::router::{Channel, Inbound, MessageHandler, MessageRouter, PresenceHandler};
use crate::token::TokenProvider;
use crate::transport::{Handshake, Session, Transport};
use hivewire_core::{
    ConnectionState, Error, Frame, MessageType, NotificationMessage, PresenceUpdate,
    ReconnectionInfo, Result, StompCommand,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Messages from client handles to the actor
pub(crate) enum Command {
    Connect,
    Disconnect,
    Retry,
    ReconnectWithNewToken,
    Send {
        destination: String,
        body: String,
    },
    Subscribe {
        topic: String,
        callback: SubscriptionCallback,
        reply: oneshot::Sender<Option<SubscriptionId>>,
    },
    Unsubscribe(SubscriptionId),
    OnConnectionChange {
        id: HandlerId,
        handler: Handler<ConnectionState>,
    },
    OnMessage {
        id: HandlerId,
        channel: Channel,
        handler: MessageHandler,
    },
    OnPresenceUpdate {
        id: HandlerId,
        handler: PresenceHandler,
    },
    RemoveHandler(HandlerId),
    UpdateStatus(StatusChange),
    ClearNotification(String),
    ClearAllNotifications,
    Query(Query),
    Shutdown(oneshot::Sender<()>),
}

/// Read-only questions answered from actor state
pub(crate) enum Query {
    PresenceOf {
        user_id: i64,
        group_id: Option<i64>,
        reply: oneshot::Sender<Option<PresenceUpdate>>,
    },
    PresentUsers {
        group_id: Option<i64>,
        reply: oneshot::Sender<Vec<PresenceUpdate>>,
    },
    OnlineCount {
        group_id: Option<i64>,
        reply: oneshot::Sender<usize>,
    },
    LocalStatus(oneshot::Sender<Option<StatusChange>>),
    Notifications(oneshot::Sender<Vec<NotificationMessage>>),
    UnreadCount(oneshot::Sender<usize>),
    Subscriptions(oneshot::Sender<Vec<(SubscriptionId, String)>>),
}

enum Event {
    Command(Command),
    InboxClosed,
    Attempt(Result<Session>),
    Inbound(Option<Result<String>>),
    RetryDue,
    PresenceDue,
    Heartbeat,
}

/// Everything the actor needs at startup
pub(crate) struct ActorParts {
    pub config: ClientConfig,
    pub transport: Arc<dyn Transport>,
    pub tokens: Arc<dyn TokenProvider>,
    pub reconnection: ReconnectionController,
    pub metrics: Option<ClientMetrics>,
    pub inbox: mpsc::UnboundedReceiver<Command>,
    pub state_tx: watch::Sender<ConnectionState>,
    pub info_tx: watch::Sender<ReconnectionInfo>,
}

pub(crate) struct ConnectionActor {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    inbox: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    info_tx: watch::Sender<ReconnectionInfo>,
    metrics: Option<ClientMetrics>,

    state: ConnectionState,
    session: Option<Session>,
    attempt: Option<JoinHandle<Result<Session>>>,
    retry_at: Option<Instant>,
    // Set while the current cycle started from a lost session
    recovering: bool,

    reconnection: ReconnectionController,
    registry: SubscriptionRegistry,
    router: MessageRouter,
    presence: PresenceTracker,
    notifications: NotificationCenter,
    heartbeat: HeartbeatScheduler,
    listeners: HandlerSet<ConnectionState>,
}

impl ConnectionActor {
    pub fn new(parts: ActorParts) -> Self {
        let ActorParts {
            config,
            transport,
            tokens,
            reconnection,
            metrics,
            inbox,
            state_tx,
            info_tx,
        } = parts;

        let router = MessageRouter::new(config.presence_segment.clone());
        let presence = PresenceTracker::new(config.user_id, config.presence_quiet_interval());
        let heartbeat = HeartbeatScheduler::new(
            config.heartbeat_interval(),
            config.heartbeat_destination.clone(),
        );

        Self {
            config,
            transport,
            tokens,
            inbox,
            state_tx,
            info_tx,
            metrics,
            state: ConnectionState::Disconnected,
            session: None,
            attempt: None,
            retry_at: None,
            recovering: false,
            reconnection,
            registry: SubscriptionRegistry::new(),
            router,
            presence,
            notifications: NotificationCenter::new(),
            heartbeat,
            listeners: HandlerSet::new(),
        }
    }

    pub async fn run(mut self) {
        tracing::debug!(endpoint = %self.config.endpoint, "Connection actor started");

        loop {
            let event = tokio::select! {
                command = self.inbox.recv() => match command {
                    Some(command) => Event::Command(command),
                    None => Event::InboxClosed,
                },
                outcome = attempt_outcome(&mut self.attempt) => Event::Attempt(outcome),
                inbound = next_inbound(&mut self.session) => Event::Inbound(inbound),
                _ = wait_until(self.retry_at) => Event::RetryDue,
                _ = wait_until(self.presence.deadline()) => Event::PresenceDue,
                _ = self.heartbeat.tick() => Event::Heartbeat,
            };

            match event {
                Event::Command(Command::Shutdown(reply)) => {
                    self.disconnect().await;
                    let _ = reply.send(());
                    break;
                }
                Event::Command(command) => self.handle_command(command).await,
                Event::InboxClosed => {
                    self.disconnect().await;
                    break;
                }
                Event::Attempt(outcome) => {
                    self.attempt = None;
                    match outcome {
                        Ok(session) => self.on_established(session).await,
                        Err(e) => {
                            tracing::warn!(error = %e, kind = e.kind(), "Connection attempt failed");
                            self.on_lost(e);
                        }
                    }
                }
                Event::Inbound(Some(Ok(text))) => self.handle_text(&text),
                Event::Inbound(Some(Err(e))) if e.is_malformed_input() => {
                    tracing::warn!(error = %e, "Dropping malformed frame");
                    self.record_dropped("malformed");
                }
                Event::Inbound(Some(Err(e))) => {
                    tracing::warn!(error = %e, "Transport error");
                    self.on_lost(e);
                }
                Event::Inbound(None) => {
                    tracing::warn!("Transport closed by peer");
                    self.on_lost(Error::ConnectionClosed);
                }
                Event::RetryDue => {
                    self.retry_at = None;
                    tracing::info!(
                        attempt = self.reconnection.attempts(),
                        max_attempts = self.reconnection.max_attempts(),
                        "Attempting reconnection"
                    );
                    self.start_attempt();
                }
                Event::PresenceDue => {
                    let now = Instant::now();
                    if let Some(change) = self.presence.take_due(now) {
                        self.publish_status(change, now).await;
                    }
                }
                Event::Heartbeat => match self.heartbeat.beat() {
                    Ok(frame) => {
                        tracing::trace!("Sending heartbeat");
                        self.send_frame(frame).await;
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to build heartbeat"),
                },
            }
        }

        tracing::debug!("Connection actor stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.connect(),
            Command::Disconnect => self.disconnect().await,
            Command::Retry => {
                tracing::info!("Manual connection retry");
                self.reconnection.reset();
                self.publish_info();
                self.connect();
            }
            Command::ReconnectWithNewToken => self.reconnect_with_new_token().await,
            Command::Send { destination, body } => {
                if self.state != ConnectionState::Connected {
                    tracing::warn!(
                        destination = %destination,
                        state = %self.state,
                        "Dropping send while not connected"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_send_dropped();
                    }
                    return;
                }
                self.send_frame(Frame::send(&destination, body)).await;
            }
            Command::Subscribe {
                topic,
                callback,
                reply,
            } => {
                let id = self.subscribe(topic, callback).await;
                let _ = reply.send(id);
            }
            Command::Unsubscribe(id) => self.unsubscribe(id).await,
            Command::OnConnectionChange { id, handler } => {
                // Late listeners see the current state right away
                let ok = invoke_isolated(&id, handler.as_ref(), &self.state);
                self.record_panics(usize::from(!ok));
                self.listeners.insert(id, handler);
            }
            Command::OnMessage {
                id,
                channel,
                handler,
            } => {
                tracing::debug!(handler = %id, channel = %channel, "Message handler registered");
                self.router.on_message(id, channel, handler);
            }
            Command::OnPresenceUpdate { id, handler } => {
                self.router.on_presence_update(id, handler);
            }
            Command::RemoveHandler(id) => {
                let removed = self.router.remove(id) || self.listeners.remove(id);
                tracing::debug!(handler = %id, removed, "Handler removal");
            }
            Command::UpdateStatus(change) => {
                let now = Instant::now();
                tracing::debug!(status = ?change.status, group_id = ?change.group_id, "Local status change");
                if let Some(change) = self.presence.request(change, now) {
                    self.publish_status(change, now).await;
                }
            }
            Command::ClearNotification(id) => {
                self.notifications.clear(&id);
            }
            Command::ClearAllNotifications => self.notifications.clear_all(),
            Command::Query(query) => self.answer(query),
            Command::Shutdown(reply) => {
                // Handled by the run loop; kept for exhaustiveness
                let _ = reply.send(());
            }
        }
    }

    fn answer(&self, query: Query) {
        match query {
            Query::PresenceOf {
                user_id,
                group_id,
                reply,
            } => {
                let _ = reply.send(self.presence.presence_of(user_id, group_id));
            }
            Query::PresentUsers { group_id, reply } => {
                let _ = reply.send(self.presence.present_users(group_id));
            }
            Query::OnlineCount { group_id, reply } => {
                let _ = reply.send(self.presence.online_count(group_id));
            }
            Query::LocalStatus(reply) => {
                let _ = reply.send(self.presence.local_status());
            }
            Query::Notifications(reply) => {
                let _ = reply.send(self.notifications.list());
            }
            Query::UnreadCount(reply) => {
                let _ = reply.send(self.notifications.len());
            }
            Query::Subscriptions(reply) => {
                let _ = reply.send(self.registry.topics());
            }
        }
    }

    fn connect(&mut self) {
        match self.state {
            ConnectionState::Connected | ConnectionState::Connecting => {
                tracing::debug!(state = %self.state, "Connect ignored");
            }
            ConnectionState::Reconnecting => {
                if self.attempt.is_none() {
                    // Skip the rest of the backoff; the timer must not fire as well
                    self.retry_at = None;
                    self.start_attempt();
                }
            }
            ConnectionState::Disconnected | ConnectionState::Failed => {
                self.recovering = false;
                self.set_state(ConnectionState::Connecting);
                self.start_attempt();
            }
        }
    }

    fn start_attempt(&mut self) {
        if self.attempt.is_some() {
            return;
        }

        let handshake = Handshake {
            transport: self.transport.clone(),
            endpoint: self.config.endpoint.clone(),
            host: self.config.host.clone(),
            token: self.tokens.token(),
            timeout: self.config.handshake_timeout(),
        };
        tracing::debug!(
            endpoint = %handshake.endpoint,
            authenticated = handshake.token.is_some(),
            "Opening transport"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_connect_attempt();
        }
        self.attempt = Some(tokio::spawn(handshake.establish()));
    }

    async fn on_established(&mut self, session: Session) {
        let recovered = self.recovering;
        self.recovering = false;
        self.session = Some(session);
        self.retry_at = None;
        self.reconnection.on_connected();
        self.publish_info();
        self.set_state(ConnectionState::Connected);

        if recovered {
            tracing::info!("Reconnected");
            if let Some(metrics) = &self.metrics {
                metrics.record_reconnection_success();
            }
        } else {
            tracing::info!(endpoint = %self.config.endpoint, "Connected");
        }

        let replay = self.registry.replay();
        if !replay.is_empty() {
            tracing::debug!(count = replay.len(), "Replaying standing subscriptions");
        }
        for frame in replay {
            if !self.send_frame(frame).await {
                return;
            }
        }

        self.heartbeat.start();
    }

    /// The session or the attempt failed; decide between retry and give up
    fn on_lost(&mut self, error: Error) {
        self.session = None;
        self.heartbeat.stop();
        self.registry.mark_all_stale();
        self.recovering = true;

        match self.reconnection.on_failure() {
            ReconnectDecision::Retry { attempt, delay } => {
                tracing::info!(
                    attempt,
                    max_attempts = self.reconnection.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    cause = error.kind(),
                    "Scheduling reconnection"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_reconnection_attempt();
                }
                self.retry_at = Some(Instant::now() + delay);
                self.publish_info();
                self.set_state(ConnectionState::Reconnecting);
            }
            ReconnectDecision::GiveUp { attempts } => {
                tracing::error!(attempts, cause = %error, "Reconnection attempts exhausted");
                self.retry_at = None;
                self.publish_info();
                self.set_state(ConnectionState::Failed);
            }
        }
    }

    /// Manual teardown; always succeeds
    async fn disconnect(&mut self) {
        self.heartbeat.stop();
        self.retry_at = None;
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }

        if let Some(mut session) = self.session.take() {
            for frame in self.registry.unsubscribe_frames() {
                if session.send(frame).await.is_err() {
                    break;
                }
            }
            session.close().await;
        }

        self.registry.clear();
        self.presence.clear();
        self.recovering = false;
        self.reconnection.reset();
        self.publish_info();
        self.set_state(ConnectionState::Disconnected);
    }

    /// Replace the session using a fresh credential, keeping subscriptions
    async fn reconnect_with_new_token(&mut self) {
        tracing::info!("Reconnecting with new token");
        self.heartbeat.stop();
        self.retry_at = None;
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
        if let Some(session) = self.session.take() {
            session.close().await;
        }

        self.registry.mark_all_stale();
        self.recovering = false;
        self.reconnection.reset();
        self.publish_info();
        self.set_state(ConnectionState::Connecting);
        self.start_attempt();
    }

    async fn subscribe(
        &mut self,
        topic: String,
        callback: SubscriptionCallback,
    ) -> Option<SubscriptionId> {
        if self.state != ConnectionState::Connected {
            tracing::warn!(topic = %topic, state = %self.state, "Cannot subscribe while not connected");
            return None;
        }

        let (id, frame) = self.registry.insert(topic, callback);
        tracing::debug!(subscription = %id, destination = frame.destination().unwrap_or_default(), "Subscribed");
        self.send_frame(frame).await;
        Some(id)
    }

    async fn unsubscribe(&mut self, id: SubscriptionId) {
        let Some(entry) = self.registry.remove(id) else {
            return;
        };
        tracing::debug!(subscription = %id, topic = %entry.topic, "Unsubscribed");
        if entry.live && self.state == ConnectionState::Connected {
            self.send_frame(Frame::unsubscribe(&id.to_string())).await;
        }
    }

    async fn publish_status(&mut self, change: StatusChange, now: Instant) {
        if self.state != ConnectionState::Connected {
            tracing::warn!(status = ?change.status, "Dropping status change while not connected");
            if let Some(metrics) = &self.metrics {
                metrics.record_send_dropped();
            }
            return;
        }

        let body = match hivewire_core::codec::encode_body(&change) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode status change");
                return;
            }
        };
        let destination = self.config.presence_status_destination.clone();
        if self.send_frame(Frame::send(&destination, body)).await {
            self.presence.mark_sent(now);
        }
    }

    /// Write a frame to the live session; a failed write loses the session
    async fn send_frame(&mut self, frame: Frame) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        tracing::debug!(frame = %frame, "Sending frame");
        match session.send(frame).await {
            Ok(()) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_sent();
                }
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Write failed");
                self.on_lost(e);
                false
            }
        }
    }

    fn handle_text(&mut self, text: &str) {
        let frame = match Frame::decode(text) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::trace!("Broker heart-beat");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed frame");
                self.record_dropped("malformed");
                return;
            }
        };

        match frame.command {
            StompCommand::Message => self.route(&frame),
            StompCommand::Error => {
                let reason = frame
                    .get_header("message")
                    .unwrap_or("broker error")
                    .to_string();
                tracing::warn!(reason = %reason, "Broker sent ERROR frame");
                self.record_dropped("broker_error");
                self.on_lost(Error::WebSocket(reason));
            }
            StompCommand::Receipt => {
                tracing::debug!(receipt = frame.get_header("receipt-id").unwrap_or_default(), "Receipt");
            }
            other => tracing::debug!(command = %other, "Ignoring frame"),
        }
    }

    fn route(&mut self, frame: &Frame) {
        let inbound = match self.router.classify(frame) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::warn!(
                    destination = frame.destination().unwrap_or_default(),
                    error = %e,
                    "Dropping undecodable message"
                );
                self.record_dropped("undecodable");
                return;
            }
        };

        let mut panics = 0;
        if let Some(entry) = self.registry.lookup(frame) {
            if !invoke_isolated(&entry.id, entry.callback.as_ref(), frame) {
                panics += 1;
            }
        }

        match inbound {
            Inbound::Presence { update, envelope } => {
                tracing::debug!(user_id = update.user_id, group_id = ?update.group_id, status = ?update.status, "Presence update");
                self.presence.apply(update.clone());
                panics += self.router.dispatch_presence(&update, &envelope);
                if let Some(metrics) = &self.metrics {
                    metrics.record_presence_update();
                    metrics.record_frame(envelope.message_type.as_str());
                }
            }
            Inbound::Message(message) => {
                tracing::debug!(message_type = %message.message_type, id = %message.id, "Message received");
                if message.message_type == MessageType::Notification {
                    self.notifications.ingest(&message);
                }
                panics += self.router.dispatch_message(&message);
                if let Some(metrics) = &self.metrics {
                    metrics.record_frame(message.message_type.as_str());
                }
            }
        }

        self.record_panics(panics);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        tracing::info!(from = %self.state, to = %state, "Connection state changed");
        self.state = state;
        self.state_tx.send_replace(state);
        if let Some(metrics) = &self.metrics {
            metrics.update_connection_state(state);
        }
        let panics = self.listeners.dispatch(&state);
        self.record_panics(panics);
    }

    fn publish_info(&self) {
        self.info_tx.send_replace(self.reconnection.info());
    }

    fn record_dropped(&self, reason: &'static str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_frame_dropped(reason);
        }
    }

    fn record_panics(&self, count: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.record_handler_panics(count);
        }
    }
}

async fn attempt_outcome(attempt: &mut Option<JoinHandle<Result<Session>>>) -> Result<Session> {
    match attempt {
        Some(handle) => match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(Error::Internal(format!("connection attempt task failed: {}", e))),
        },
        None => std::future::pending().await,
    }
}

async fn next_inbound(session: &mut Option<Session>) -> Option<Result<String>> {
    use futures::StreamExt;

    match session {
        Some(session) => session.stream.next().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

//! Public client handle
//!
//! [`RealtimeClient`] is a cheap, cloneable handle to the connection actor.
//! Every operation is a message into the actor's inbox; none of them block or
//! fail across the public boundary. Connection problems are only ever visible
//! as [`ConnectionState`] transitions.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hivewire_client::{Channel, ClientBuilder, ClientConfig};
//! use hivewire_core::{ConnectionState, PresenceStatus};
//!
//! # async fn example() -> hivewire_core::Result<()> {
//! let client = ClientBuilder::new(ClientConfig::new("ws://localhost:8080/ws"))
//!     .token_provider(|| std::env::var("FOCUSHIVE_TOKEN").ok())
//!     .build()?;
//!
//! client.on_connection_change(|state| {
//!     if *state == ConnectionState::Failed {
//!         eprintln!("offline; offer a retry");
//!     }
//! });
//! client.on_message(Channel::feature("forum"), |msg| {
//!     println!("forum event {}", msg.message_type);
//! });
//!
//! client.connect();
//! client.update_status(PresenceStatus::InFocusSession);
//! # Ok(())
//! # }
//! ```

use crate::connection::{Command, Query};
use crate::handlers::HandlerId;
use crate::presence::StatusChange;
use crate::registry::SubscriptionId;
use crate::router::Channel;
use hivewire_core::{
    codec, ConnectionState, DomainMessage, Frame, NotificationMessage, PresenceUpdate,
    ReconnectionInfo,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Handle to a realtime connection
#[derive(Clone)]
pub struct RealtimeClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    reconnection: watch::Receiver<ReconnectionInfo>,
}

impl RealtimeClient {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        state: watch::Receiver<ConnectionState>,
        reconnection: watch::Receiver<ReconnectionInfo>,
    ) -> Self {
        Self {
            commands,
            state,
            reconnection,
        }
    }

    fn dispatch(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("Connection actor has stopped; command ignored");
        }
    }

    async fn query<T: Default>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Query) -> T {
        let (tx, rx) = oneshot::channel();
        self.dispatch(Command::Query(build(tx)));
        rx.await.unwrap_or_default()
    }

    /// Open the connection; no-op if connected or connecting
    pub fn connect(&self) {
        self.dispatch(Command::Connect);
    }

    /// Tear down the connection and forget all subscriptions
    pub fn disconnect(&self) {
        self.dispatch(Command::Disconnect);
    }

    /// Reset the attempt counter and connect; the way out of `FAILED`
    pub fn retry_connection(&self) {
        self.dispatch(Command::Retry);
    }

    /// Replace the session right away, reading a fresh token
    ///
    /// Standing subscriptions are kept and replayed on the new session.
    pub fn reconnect_with_new_token(&self) {
        self.dispatch(Command::ReconnectWithNewToken);
    }

    /// Publish `body` as JSON to `destination`
    ///
    /// Dropped with a log entry if the body cannot be serialized or the client
    /// is not connected.
    pub fn send_message<T: Serialize + ?Sized>(&self, destination: &str, body: &T) {
        match codec::encode_body(body) {
            Ok(body) => self.dispatch(Command::Send {
                destination: destination.to_string(),
                body,
            }),
            Err(e) => {
                tracing::warn!(destination, error = %e, "Dropping unserializable message");
            }
        }
    }

    /// Publish a domain message envelope
    pub fn send(&self, destination: &str, message: &DomainMessage) {
        self.send_message(destination, message);
    }

    /// Listen on `topic`; `None` if not connected
    #[tracing::instrument(skip(self, callback))]
    pub async fn subscribe<F>(&self, topic: &str, callback: F) -> Option<SubscriptionId>
    where
        F: Fn(&Frame) + Send + Sync + 'static,
    {
        let (reply, rx) = oneshot::channel();
        self.dispatch(Command::Subscribe {
            topic: topic.to_string(),
            callback: Arc::new(callback),
            reply,
        });
        rx.await.ok().flatten()
    }

    /// Stop listening; unknown or already removed ids are ignored
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.dispatch(Command::Unsubscribe(id));
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Current reconnection bookkeeping
    pub fn reconnection_info(&self) -> ReconnectionInfo {
        *self.reconnection.borrow()
    }

    /// Receiver that observes every published state
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Called on every state transition, and once right away with the
    /// current state
    pub fn on_connection_change<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        let id = HandlerId::next();
        self.dispatch(Command::OnConnectionChange {
            id,
            handler: Arc::new(handler),
        });
        id
    }

    /// Called for every message routed to `channel`
    pub fn on_message<F>(&self, channel: Channel, handler: F) -> HandlerId
    where
        F: Fn(&DomainMessage) + Send + Sync + 'static,
    {
        let id = HandlerId::next();
        self.dispatch(Command::OnMessage {
            id,
            channel,
            handler: Arc::new(handler),
        });
        id
    }

    /// Called for every inbound presence record
    pub fn on_presence_update<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&PresenceUpdate) + Send + Sync + 'static,
    {
        let id = HandlerId::next();
        self.dispatch(Command::OnPresenceUpdate {
            id,
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove any handler by the id its registration returned
    pub fn remove_handler(&self, id: HandlerId) {
        self.dispatch(Command::RemoveHandler(id));
    }

    /// Change the local status; applied locally at once, published debounced
    pub fn update_status(&self, change: impl Into<StatusChange>) {
        self.dispatch(Command::UpdateStatus(change.into()));
    }

    pub async fn presence_of(&self, user_id: i64, group_id: Option<i64>) -> Option<PresenceUpdate> {
        self.query(|reply| Query::PresenceOf {
            user_id,
            group_id,
            reply,
        })
        .await
    }

    /// Present users in a group, or globally for `None`
    pub async fn present_users(&self, group_id: Option<i64>) -> Vec<PresenceUpdate> {
        self.query(|reply| Query::PresentUsers { group_id, reply })
            .await
    }

    pub async fn online_count(&self, group_id: Option<i64>) -> usize {
        self.query(|reply| Query::OnlineCount { group_id, reply })
            .await
    }

    /// Last status requested through [`RealtimeClient::update_status`]
    pub async fn local_status(&self) -> Option<StatusChange> {
        self.query(Query::LocalStatus).await
    }

    /// Accumulated notifications, oldest first
    pub async fn notifications(&self) -> Vec<NotificationMessage> {
        self.query(Query::Notifications).await
    }

    pub async fn unread_count(&self) -> usize {
        self.query(Query::UnreadCount).await
    }

    pub fn clear_notification(&self, id: &str) {
        self.dispatch(Command::ClearNotification(id.to_string()));
    }

    pub fn clear_all_notifications(&self) {
        self.dispatch(Command::ClearAllNotifications);
    }

    /// Standing subscriptions as `(id, topic)`
    pub async fn subscriptions(&self) -> Vec<(SubscriptionId, String)> {
        self.query(Query::Subscriptions).await
    }

    /// Disconnect and stop the actor; other handles become inert
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        self.dispatch(Command::Shutdown(tx));
        let _ = rx.await;
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("state", &self.state())
            .field("reconnection", &self.reconnection_info())
            .finish()
    }
}

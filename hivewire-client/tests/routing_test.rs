//! Message routing integration tests
//!
//! Tests channel dispatch order, notification accumulation and isolation of
//! panicking handlers.

mod common;

use common::*;
use hivewire_client::{Channel, ClientBuilder, RealtimeClient};
use hivewire_core::{ConnectionState, MessageType, NotificationPriority, StompCommand};
use serde_json::json;

async fn connected(broker: &mut MockBroker) -> (RealtimeClient, BrokerSession) {
    let client = ClientBuilder::new(test_config())
        .transport(broker.transport())
        .build()
        .unwrap();
    client.connect();
    let mut session = broker.accept().await;
    wait_for_state(&client, ConnectionState::Connected).await;
    session.expect(StompCommand::Connect).await;
    (client, session)
}

fn notification(id: &str, title: &str) -> hivewire_core::DomainMessage {
    domain_message(
        MessageType::Notification,
        json!({
            "id": id,
            "type": "BUDDY_CHECKIN_REMINDER",
            "title": title,
            "message": "Time to check in with your buddy",
            "priority": "HIGH",
            "createdAt": "2024-03-01T10:00:00"
        }),
    )
}

fn tagged(log: &Recorder<String>, tag: &'static str) -> impl Fn(&hivewire_core::DomainMessage) + Send + Sync + 'static {
    let log = log.clone();
    move |msg| log.push(format!("{}:{}", tag, msg.message_type))
}

#[tokio::test(start_paused = true)]
async fn test_forum_post_reaches_general_and_forum_once() {
    let mut broker = MockBroker::new();
    let (client, session) = connected(&mut broker).await;

    let log = Recorder::new();
    client.on_message(Channel::General, tagged(&log, "general-1"));
    client.on_message(Channel::feature("forum"), tagged(&log, "forum-1"));
    client.on_message(Channel::General, tagged(&log, "general-2"));
    client.on_message(Channel::feature("forum"), tagged(&log, "forum-2"));
    client.on_message(Channel::feature("buddy"), tagged(&log, "buddy"));
    client.on_message(Channel::Notification, tagged(&log, "notification"));

    session.deliver_message(
        "/topic/hive/7/forum",
        &domain_message(MessageType::ForumNewPost, json!({"postId": 99})),
    );
    settle().await;

    assert_eq!(
        log.values(),
        vec![
            "general-1:FORUM_NEW_POST",
            "general-2:FORUM_NEW_POST",
            "forum-1:FORUM_NEW_POST",
            "forum-2:FORUM_NEW_POST",
        ]
    );
    assert!(client.notifications().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_notification_appended_once() {
    let mut broker = MockBroker::new();
    let (client, session) = connected(&mut broker).await;

    let log = Recorder::new();
    client.on_message(Channel::General, tagged(&log, "general"));
    client.on_message(Channel::Notification, tagged(&log, "notification"));

    session.deliver_message("/user/queue/notifications", &notification("n-1", "Check in"));
    settle().await;

    assert_eq!(
        log.values(),
        vec!["general:NOTIFICATION", "notification:NOTIFICATION"]
    );
    let stored = client.notifications().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, "n-1");
    assert_eq!(stored[0].priority, NotificationPriority::High);
    assert_eq!(client.unread_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_clear_notifications() {
    let mut broker = MockBroker::new();
    let (client, session) = connected(&mut broker).await;

    for (id, title) in [("n-1", "first"), ("n-2", "second"), ("n-3", "third")] {
        session.deliver_message("/user/queue/notifications", &notification(id, title));
    }
    settle().await;
    assert_eq!(client.unread_count().await, 3);

    client.clear_notification("n-2");
    client.clear_notification("n-404");
    let ids: Vec<_> = client
        .notifications()
        .await
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(ids, vec!["n-1", "n-3"]);

    client.clear_all_notifications();
    assert!(client.notifications().await.is_empty());
    client.clear_all_notifications();
    assert_eq!(client.unread_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_notification_payload_not_stored() {
    let mut broker = MockBroker::new();
    let (client, session) = connected(&mut broker).await;

    let log = Recorder::new();
    client.on_message(Channel::Notification, tagged(&log, "notification"));
    session.deliver_message(
        "/user/queue/notifications",
        &domain_message(MessageType::Notification, json!({"unexpected": true})),
    );
    settle().await;

    assert!(client.notifications().await.is_empty());
    assert_eq!(log.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_handler_is_isolated() {
    let mut broker = MockBroker::new();
    let (client, session) = connected(&mut broker).await;

    let log = Recorder::new();
    client.on_message(Channel::General, tagged(&log, "before"));
    client.on_message(Channel::General, |_| panic!("handler bug"));
    client.on_message(Channel::General, tagged(&log, "after"));
    client.on_message(Channel::feature("forum"), tagged(&log, "forum"));

    session.deliver_message(
        "/topic/hive/7/forum",
        &domain_message(MessageType::ForumNewReply, json!({})),
    );
    session.deliver_message(
        "/topic/hive/7/forum",
        &domain_message(MessageType::ForumNewReply, json!({})),
    );
    settle().await;

    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(log.len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_remove_handler_stops_delivery() {
    let mut broker = MockBroker::new();
    let (client, session) = connected(&mut broker).await;

    let log = Recorder::new();
    let general = client.on_message(Channel::General, tagged(&log, "general"));
    let forum = client.on_message(Channel::feature("forum"), tagged(&log, "forum"));

    session.deliver_message(
        "/topic/hive/7/forum",
        &domain_message(MessageType::ForumNewPost, json!({})),
    );
    settle().await;
    assert_eq!(log.len(), 2);

    client.remove_handler(general);
    client.remove_handler(forum);
    client.remove_handler(forum);
    session.deliver_message(
        "/topic/hive/7/forum",
        &domain_message(MessageType::ForumNewPost, json!({})),
    );
    settle().await;
    assert_eq!(log.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_types_route_by_prefix() {
    let mut broker = MockBroker::new();
    let (client, session) = connected(&mut broker).await;

    let log = Recorder::new();
    client.on_message(Channel::feature("playlist"), tagged(&log, "playlist"));

    session.deliver(
        "/topic/hive/7/music",
        None,
        &json!({
            "id": "m-1",
            "type": "PLAYLIST_TRACK_ADDED",
            "event": "playlist.track",
            "payload": {"trackId": 3},
            "timestamp": "2024-03-01T10:00:00"
        }),
    );
    settle().await;

    assert_eq!(log.values(), vec!["playlist:PLAYLIST_TRACK_ADDED"]);
}

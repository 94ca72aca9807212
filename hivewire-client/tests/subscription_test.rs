//! Subscription integration tests
//!
//! Tests the standing subscription set: delivery to per-topic callbacks,
//! replay after a reconnect and idempotent unsubscribe.

mod common;

use common::*;
use hivewire_client::{ClientBuilder, FixedDelay, RealtimeClient, SubscriptionId};
use hivewire_core::{ConnectionState, MessageType, StompCommand};
use serde_json::json;
use std::time::Duration;

async fn connected(broker: &mut MockBroker) -> (RealtimeClient, BrokerSession) {
    let client = ClientBuilder::new(test_config())
        .transport(broker.transport())
        .reconnection_strategy(Box::new(FixedDelay::new(Duration::from_secs(1))))
        .build()
        .unwrap();
    client.connect();
    let mut session = broker.accept().await;
    wait_for_state(&client, ConnectionState::Connected).await;
    session.expect(StompCommand::Connect).await;
    (client, session)
}

fn chat_body(text: &str) -> serde_json::Value {
    serde_json::to_value(domain_message(MessageType::Text, json!(text))).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_receives_topic_messages() {
    let mut broker = MockBroker::new();
    let (client, mut session) = connected(&mut broker).await;

    let received = Recorder::new();
    let sink = received.clone();
    let id = client
        .subscribe("/topic/x", move |frame| {
            sink.push(frame.destination().unwrap_or_default().to_string())
        })
        .await
        .unwrap();

    let subscribe = session.expect(StompCommand::Subscribe).await;
    assert_eq!(subscribe.get_header("id"), Some(id.to_string().as_str()));
    assert_eq!(subscribe.destination(), Some("/topic/x"));

    session.deliver("/topic/x", Some(&id.to_string()), &chat_body("one"));
    session.deliver("/topic/other", None, &chat_body("two"));
    settle().await;

    assert_eq!(received.values(), vec!["/topic/x".to_string()]);
    assert_eq!(
        client.subscriptions().await,
        vec![(id, "/topic/x".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_resubscribes_standing_topics() {
    let mut broker = MockBroker::new();
    let (client, mut session) = connected(&mut broker).await;

    let received = Recorder::new();
    let sink = received.clone();
    let id = client
        .subscribe("/topic/x", move |frame| sink.push(frame.body.clone()))
        .await
        .unwrap();
    session.expect(StompCommand::Subscribe).await;

    session.close();
    wait_for_state(&client, ConnectionState::Reconnecting).await;

    let mut resumed = broker.accept().await;
    wait_for_state(&client, ConnectionState::Connected).await;
    let replay = resumed.expect(StompCommand::Subscribe).await;
    assert_eq!(replay.destination(), Some("/topic/x"));
    assert_eq!(replay.get_header("id"), Some(id.to_string().as_str()));

    resumed.deliver("/topic/x", Some(&id.to_string()), &chat_body("after"));
    settle().await;
    assert_eq!(received.len(), 1);
    assert_eq!(client.subscriptions().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_is_idempotent() {
    let mut broker = MockBroker::new();
    let (client, mut session) = connected(&mut broker).await;

    let kept = Recorder::new();
    let sink = kept.clone();
    let a = client.subscribe("/topic/a", |_| {}).await.unwrap();
    let b = client
        .subscribe("/topic/b", move |frame| sink.push(frame.body.clone()))
        .await
        .unwrap();

    client.unsubscribe(a);
    client.unsubscribe(a);
    client.unsubscribe("sub-999".parse::<SubscriptionId>().unwrap());
    settle().await;

    let unsubscribes: Vec<_> = session
        .drain()
        .into_iter()
        .filter(|frame| frame.command == StompCommand::Unsubscribe)
        .collect();
    assert_eq!(unsubscribes.len(), 1);
    assert_eq!(unsubscribes[0].get_header("id"), Some(a.to_string().as_str()));

    session.deliver("/topic/b", Some(&b.to_string()), &chat_body("still routed"));
    settle().await;
    assert_eq!(kept.len(), 1);
    assert_eq!(client.subscriptions().await, vec![(b, "/topic/b".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_while_reconnecting_drops_from_replay() {
    let mut broker = MockBroker::new();
    let (client, session) = connected(&mut broker).await;

    let a = client.subscribe("/topic/a", |_| {}).await.unwrap();
    client.subscribe("/topic/b", |_| {}).await.unwrap();

    session.close();
    wait_for_state(&client, ConnectionState::Reconnecting).await;
    client.unsubscribe(a);

    let mut resumed = broker.accept().await;
    wait_for_state(&client, ConnectionState::Connected).await;
    settle().await;

    let replayed: Vec<_> = resumed
        .drain()
        .into_iter()
        .filter(|frame| frame.command == StompCommand::Subscribe)
        .filter_map(|frame| frame.destination().map(str::to_string))
        .collect();
    assert_eq!(replayed, vec!["/topic/b".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_callback_does_not_break_session() {
    let mut broker = MockBroker::new();
    let (client, session) = connected(&mut broker).await;

    let id = client
        .subscribe("/topic/x", |_| panic!("subscriber bug"))
        .await
        .unwrap();
    let general = Recorder::new();
    let sink = general.clone();
    client.on_message(hivewire_client::Channel::General, move |msg| {
        sink.push(msg.id.clone())
    });

    session.deliver("/topic/x", Some(&id.to_string()), &chat_body("boom"));
    session.deliver("/topic/x", Some(&id.to_string()), &chat_body("again"));
    settle().await;

    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(general.len(), 2);
}

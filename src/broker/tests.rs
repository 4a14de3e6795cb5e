use super::redis_backend::classify;
use super::slot::PendingSlot;
use super::*;
use crate::config::Settings;
use crate::utils::RelayError;
use async_trait::async_trait;
use futures_util::stream;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// Polls `condition` until it holds or a second has passed.
async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn memory_link(channel: &str) -> (Arc<MemoryBroker>, BrokerLink) {
    let broker = Arc::new(MemoryBroker::new());
    let link = BrokerLink::connect(broker.clone(), Channel::from(channel))
        .await
        .unwrap();
    (broker, link)
}

/// Backend whose subscription ends immediately, as if the connection dropped.
struct EndedSubscription;

#[async_trait]
impl BrokerBackend for EndedSubscription {
    async fn subscribe(&self, _channel: &Channel) -> Result<MessageStream, RelayError> {
        Ok(stream::empty().boxed())
    }

    async fn publish(&self, _channel: &Channel, _payload: &[u8]) -> Result<u64, RelayError> {
        Err(RelayError::BrokerUnavailable("connection reset".into()))
    }
}

/// Backend that refuses every subscription.
struct RejectingBackend;

#[async_trait]
impl BrokerBackend for RejectingBackend {
    async fn subscribe(&self, _channel: &Channel) -> Result<MessageStream, RelayError> {
        Err(RelayError::BrokerAuth("WRONGPASS invalid password".into()))
    }

    async fn publish(&self, _channel: &Channel, _payload: &[u8]) -> Result<u64, RelayError> {
        Err(RelayError::BrokerAuth("NOAUTH Authentication required.".into()))
    }
}

#[test]
fn test_payload_text_replaces_invalid_utf8() {
    let msg = Message::published(Channel::from("c"), vec![b'h', b'i', 0xff]);
    assert_eq!(msg.payload_text(), "hi\u{fffd}");
    assert!(msg.is_payload());
    assert!(!Message::subscribe_ack(Channel::from("c")).is_payload());
}

#[test]
fn test_slot_put_overwrites_and_take_consumes() {
    let slot = PendingSlot::new();
    assert!(slot.put(Message::published(Channel::from("c"), "a")).is_none());

    let displaced = slot.put(Message::published(Channel::from("c"), "b")).unwrap();
    assert_eq!(displaced.payload, b"a");

    assert_eq!(slot.take().unwrap().payload, b"b");
    assert!(slot.take().is_none());
}

#[tokio::test]
async fn test_slot_take_within_times_out() {
    let slot = PendingSlot::new();
    let started = tokio::time::Instant::now();
    assert!(slot.take_within(Duration::from_millis(30)).await.is_none());
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[tokio::test]
async fn test_slot_take_within_sees_late_arrival() {
    let slot = Arc::new(PendingSlot::new());

    let writer = slot.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        writer.put(Message::published(Channel::from("c"), "late"));
    });

    let msg = slot.take_within(Duration::from_secs(2)).await.unwrap();
    assert_eq!(msg.payload, b"late");
}

#[tokio::test]
async fn test_memory_publish_without_subscribers_reaches_nobody() {
    let broker = MemoryBroker::new();
    let receivers = broker.publish(&Channel::from("empty"), b"hello").await.unwrap();
    assert_eq!(receivers, 0);
}

#[tokio::test]
async fn test_link_connect_subscribes_once() {
    let (broker, link) = memory_link("gChannel").await;
    assert_eq!(link.state(), LinkState::Connected);
    assert_eq!(link.channel().as_str(), "gChannel");
    let receivers = broker.publish(&Channel::from("gChannel"), b"x").await.unwrap();
    assert_eq!(receivers, 1);
}

#[tokio::test]
async fn test_link_publish_counts_own_subscription() {
    let (_broker, link) = memory_link("gChannel").await;
    let receivers = link.publish(link.channel(), b"hello").await.unwrap();
    assert_eq!(receivers, 1);
    assert_eq!(link.stats().published, 1);
}

#[tokio::test]
async fn test_link_delivers_message_once() {
    let (_broker, link) = memory_link("gChannel").await;
    link.publish(link.channel(), b"hello").await.unwrap();

    let msg = link
        .drain_next_within(Duration::from_secs(1))
        .await
        .unwrap()
        .expect("message should arrive");
    assert_eq!(msg.payload_text(), "hello");
    assert_eq!(msg.kind, MessageKind::Message);

    assert!(link.drain_next().unwrap().is_none());
    assert_eq!(link.stats().delivered, 1);
}

#[tokio::test]
async fn test_link_ignores_subscribe_ack() {
    let (_broker, link) = memory_link("gChannel").await;
    // Give the worker time to consume the acknowledgement.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(link.drain_next().unwrap().is_none());
    assert_eq!(link.stats().received, 0);
}

#[tokio::test]
async fn test_link_overwrites_unpolled_message() {
    let (_broker, link) = memory_link("gChannel").await;
    link.publish(link.channel(), b"a").await.unwrap();
    link.publish(link.channel(), b"b").await.unwrap();

    wait_until(|| link.stats().received == 2).await;

    let msg = link.drain_next().unwrap().unwrap();
    assert_eq!(msg.payload_text(), "b");
    assert!(link.drain_next().unwrap().is_none());
    assert_eq!(link.stats().overwritten, 1);
}

#[tokio::test]
async fn test_concurrent_drains_deliver_to_one_caller() {
    let (_broker, link) = memory_link("gChannel").await;
    let link = Arc::new(link);
    link.publish(link.channel(), b"only-once").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let link = link.clone();
        handles.push(tokio::spawn(async move {
            link.drain_next_within(Duration::from_millis(200))
                .await
                .unwrap()
        }));
    }

    let mut delivered = 0;
    for handle in handles {
        if let Some(msg) = handle.await.unwrap() {
            assert_eq!(msg.payload_text(), "only-once");
            delivered += 1;
        }
    }
    assert_eq!(delivered, 1);
}

#[tokio::test]
async fn test_closed_link_reports_unavailable() {
    let (_broker, link) = memory_link("gChannel").await;
    link.close();

    assert_eq!(link.state(), LinkState::Closed);
    assert!(matches!(
        link.drain_next(),
        Err(RelayError::BrokerUnavailable(_))
    ));
    assert!(matches!(
        link.drain_next_within(Duration::from_millis(10)).await,
        Err(RelayError::BrokerUnavailable(_))
    ));
}

#[tokio::test]
async fn test_link_closes_when_subscription_ends() {
    let link = BrokerLink::connect(Arc::new(EndedSubscription), Channel::from("c"))
        .await
        .unwrap();

    wait_until(|| link.state() == LinkState::Closed).await;
    assert!(link.drain_next().is_err());
    assert!(matches!(
        link.publish(link.channel(), b"x").await,
        Err(RelayError::BrokerUnavailable(_))
    ));
}

#[tokio::test]
async fn test_link_connect_propagates_auth_failure() {
    let result = BrokerLink::connect(Arc::new(RejectingBackend), Channel::from("c")).await;
    assert!(matches!(result, Err(RelayError::BrokerAuth(_))));
}

#[test]
fn test_classify_redis_errors() {
    let auth = redis::RedisError::from((redis::ErrorKind::AuthenticationFailed, "bad password"));
    assert!(matches!(classify(auth), RelayError::BrokerAuth(_)));

    let io = redis::RedisError::from(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "refused",
    ));
    assert!(matches!(classify(io), RelayError::BrokerUnavailable(_)));
}

#[test]
fn test_classify_auth_without_server_password() {
    let err = redis::RedisError::from((
        redis::ErrorKind::ResponseError,
        "An error was signalled by the server",
        "AUTH <password> called without any password configured for the default user. \
         Are you sure your configuration is correct?"
            .to_string(),
    ));
    assert!(matches!(classify(err), RelayError::BrokerAuth(_)));

    let other = redis::RedisError::from((
        redis::ErrorKind::ResponseError,
        "An error was signalled by the server",
        "unknown command 'FOO'".to_string(),
    ));
    assert!(matches!(classify(other), RelayError::BrokerUnavailable(_)));
}

#[tokio::test]
async fn test_redis_connect_to_closed_port_is_unavailable() {
    // Reserve a port, then release it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut settings = Settings::default().redis;
    settings.port = port;

    let result = BrokerLink::connect_redis(&settings).await;
    assert!(matches!(result, Err(RelayError::BrokerUnavailable(_))));
}

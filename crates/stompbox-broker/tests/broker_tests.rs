//! End-to-end broker tests over a real WebSocket transport

use std::collections::HashMap;
use std::time::Duration;
use stompbox_broker::{Broker, BrokerConfig, SimpleAuthProvider};
use stompbox_core::{codec, Command, Frame};
use stompbox_transport::{
    Transport, TransportEvent, TransportReceiver, TransportSender, WebSocketReceiver,
    WebSocketSender, WebSocketTransport,
};
use stompbox_test_utils::{FrameCollector, TestBroker, DEFAULT_TIMEOUT};
use tokio::time::timeout;

async fn connect(url: &str) -> (WebSocketSender, WebSocketReceiver) {
    WebSocketTransport::connect(url).await.unwrap()
}

async fn send_frame(sender: &WebSocketSender, frame: &Frame) {
    sender.send(codec::serialize(frame)).await.unwrap();
}

/// Receive the next parsed frame, skipping transport bookkeeping events
async fn recv_frame(receiver: &mut WebSocketReceiver) -> Frame {
    timeout(Duration::from_secs(5), async {
        loop {
            match receiver.recv().await {
                Some(TransportEvent::Data(data)) => return codec::parse(&data).unwrap(),
                Some(TransportEvent::Connected) => continue,
                other => panic!("connection ended while waiting for a frame: {:?}", other),
            }
        }
    })
    .await
    .expect("timed out waiting for a frame")
}

async fn expect_silence(receiver: &mut WebSocketReceiver, wait: Duration) {
    let result = timeout(wait, async {
        loop {
            match receiver.recv().await {
                Some(TransportEvent::Data(data)) => return codec::parse(&data).unwrap(),
                Some(TransportEvent::Connected) => continue,
                _ => std::future::pending::<()>().await,
            }
        }
    })
    .await;
    assert!(result.is_err(), "expected no frame, got {:?}", result);
}

/// Perform the CONNECT handshake and return the CONNECTED frame
async fn stomp_connect(
    sender: &WebSocketSender,
    receiver: &mut WebSocketReceiver,
) -> Frame {
    send_frame(sender, &Frame::new(Command::Connect)).await;
    let reply = recv_frame(receiver).await;
    assert_eq!(reply.command, Command::Connected);
    reply
}

fn subscribe_frame(id: &str, destination: &str) -> Frame {
    Frame::new(Command::Subscribe)
        .with_header("id", id)
        .with_header("destination", destination)
}

#[tokio::test]
async fn test_connect_returns_connected_with_version() {
    let broker = TestBroker::start().await;
    let (sender, mut receiver) = connect(&broker.url()).await;

    let reply = stomp_connect(&sender, &mut receiver).await;
    assert_eq!(reply.header("version"), Some("1.2"));
    assert_eq!(reply.header("server"), Some("Test Broker"));
    assert!(reply.header("session").is_some());
}

#[tokio::test]
async fn test_connect_echoes_heart_beat() {
    let broker = TestBroker::start().await;
    let (sender, mut receiver) = connect(&broker.url()).await;

    let frame = Frame::new(Command::Connect).with_header("heart-beat", "4000,4000");
    send_frame(&sender, &frame).await;

    let reply = recv_frame(&mut receiver).await;
    assert_eq!(reply.command, Command::Connected);
    assert_eq!(reply.header("heart-beat"), Some("4000,4000"));
}

#[tokio::test]
async fn test_auth_rejects_bad_credentials() {
    let broker = Broker::new(BrokerConfig::default())
        .with_auth(SimpleAuthProvider::new(Some("user".into()), Some("pw".into())));
    let broker = TestBroker::start_with(broker).await;

    let (sender, mut receiver) = connect(&broker.url()).await;
    let frame = Frame::new(Command::Connect)
        .with_header("login", "user")
        .with_header("passcode", "wrong");
    send_frame(&sender, &frame).await;

    let reply = recv_frame(&mut receiver).await;
    assert_eq!(reply.command, Command::Error);
    assert_eq!(reply.body, "Authentication failed");
    assert_eq!(reply.header("content-type"), Some("text/plain"));
}

#[tokio::test]
async fn test_auth_accepts_good_credentials() {
    let broker = Broker::new(BrokerConfig::default())
        .with_auth(SimpleAuthProvider::new(Some("user".into()), Some("pw".into())));
    let broker = TestBroker::start_with(broker).await;

    let (sender, mut receiver) = connect(&broker.url()).await;
    let frame = Frame::new(Command::Connect)
        .with_header("login", "user")
        .with_header("passcode", "pw");
    send_frame(&sender, &frame).await;

    let reply = recv_frame(&mut receiver).await;
    assert_eq!(reply.command, Command::Connected);
}

#[tokio::test]
async fn test_broadcast_reaches_each_subscriber() {
    let broker = TestBroker::start().await;

    let (sender_a, mut receiver_a) = connect(&broker.url()).await;
    let (sender_b, mut receiver_b) = connect(&broker.url()).await;
    stomp_connect(&sender_a, &mut receiver_a).await;
    stomp_connect(&sender_b, &mut receiver_b).await;

    send_frame(&sender_a, &subscribe_frame("sub-a", "/topic/news")).await;
    send_frame(&sender_b, &subscribe_frame("sub-b", "/topic/news")).await;

    let subscribed = stompbox_test_utils::wait_for(
        || async { broker.broker().subscription_count() == 2 },
        Duration::from_millis(10),
        DEFAULT_TIMEOUT,
    )
    .await;
    assert!(subscribed);

    broker.broker().send("/topic/news", "breaking").await;

    let msg_a = recv_frame(&mut receiver_a).await;
    let msg_b = recv_frame(&mut receiver_b).await;

    for msg in [&msg_a, &msg_b] {
        assert_eq!(msg.command, Command::Message);
        assert_eq!(msg.header("destination"), Some("/topic/news"));
        assert_eq!(msg.body, "breaking");
        assert!(msg.header("timestamp").is_some());
    }
    assert_eq!(msg_a.header("subscription"), Some("sub-a"));
    assert_eq!(msg_b.header("subscription"), Some("sub-b"));
    // each delivery carries its own message id
    assert_ne!(msg_a.header("message-id"), msg_b.header("message-id"));
}

#[tokio::test]
async fn test_send_with_headers_overrides_generated() {
    let broker = TestBroker::start().await;
    let (sender, mut receiver) = connect(&broker.url()).await;
    stomp_connect(&sender, &mut receiver).await;

    send_frame(&sender, &subscribe_frame("s1", "/topic/t")).await;
    assert!(
        stompbox_test_utils::wait_for(
            || async { broker.broker().subscription_count() == 1 },
            Duration::from_millis(10),
            DEFAULT_TIMEOUT,
        )
        .await
    );

    let mut headers = HashMap::new();
    headers.insert("content-type".to_string(), "application/json".to_string());
    broker
        .broker()
        .send_with_headers("/topic/t", "{}", headers)
        .await;

    let msg = recv_frame(&mut receiver).await;
    assert_eq!(msg.header("content-type"), Some("application/json"));
    assert_eq!(msg.body, "{}");
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let broker = TestBroker::start().await;
    let (sender, mut receiver) = connect(&broker.url()).await;
    stomp_connect(&sender, &mut receiver).await;

    send_frame(&sender, &subscribe_frame("s1", "/topic/t")).await;
    assert!(
        stompbox_test_utils::wait_for(
            || async { broker.broker().subscription_count() == 1 },
            Duration::from_millis(10),
            DEFAULT_TIMEOUT,
        )
        .await
    );

    let unsubscribe = Frame::new(Command::Unsubscribe).with_header("id", "s1");
    send_frame(&sender, &unsubscribe).await;
    assert!(
        stompbox_test_utils::wait_for(
            || async { broker.broker().subscription_count() == 0 },
            Duration::from_millis(10),
            DEFAULT_TIMEOUT,
        )
        .await
    );

    broker.broker().send("/topic/t", "after").await;
    expect_silence(&mut receiver, Duration::from_millis(300)).await;
}

#[tokio::test]
async fn test_subscribe_missing_id_is_rejected() {
    let broker = TestBroker::start().await;
    let (sender, mut receiver) = connect(&broker.url()).await;
    stomp_connect(&sender, &mut receiver).await;

    let frame = Frame::new(Command::Subscribe).with_header("destination", "/topic/t");
    send_frame(&sender, &frame).await;

    let reply = recv_frame(&mut receiver).await;
    assert_eq!(reply.command, Command::Error);
    assert_eq!(reply.body, "Missing subscription headers");
    assert_eq!(broker.broker().subscription_count(), 0);

    // the connection survives the mistake
    send_frame(&sender, &subscribe_frame("s1", "/topic/t")).await;
    assert!(
        stompbox_test_utils::wait_for(
            || async { broker.broker().subscription_count() == 1 },
            Duration::from_millis(10),
            DEFAULT_TIMEOUT,
        )
        .await
    );
}

#[tokio::test]
async fn test_send_with_no_subscribers_is_noop() {
    let broker = TestBroker::start().await;
    let (sender, mut receiver) = connect(&broker.url()).await;
    stomp_connect(&sender, &mut receiver).await;

    broker.broker().send("/topic/empty", "void").await;
    expect_silence(&mut receiver, Duration::from_millis(300)).await;
}

#[tokio::test]
async fn test_send_routes_to_handler_not_subscribers() {
    let broker = TestBroker::start().await;
    let collector = FrameCollector::new();
    broker.broker().subscribe("/queue/in", collector.callback());

    let (sender, mut receiver) = connect(&broker.url()).await;
    stomp_connect(&sender, &mut receiver).await;

    // a client subscription on the same destination must NOT see SENDs
    send_frame(&sender, &subscribe_frame("s1", "/queue/in")).await;
    assert!(
        stompbox_test_utils::wait_for(
            || async { broker.broker().subscription_count() == 1 },
            Duration::from_millis(10),
            DEFAULT_TIMEOUT,
        )
        .await
    );

    let send = Frame::new(Command::Send)
        .with_header("destination", "/queue/in")
        .with_body("work item");
    send_frame(&sender, &send).await;

    assert!(collector.wait_for_count(1, DEFAULT_TIMEOUT).await);
    let frame = collector.last().unwrap();
    assert_eq!(frame.body, "work item");
    assert_eq!(frame.header("destination"), Some("/queue/in"));

    expect_silence(&mut receiver, Duration::from_millis(300)).await;
}

#[tokio::test]
async fn test_handler_replaced_by_later_registration() {
    let broker = TestBroker::start().await;
    let first = FrameCollector::new();
    let second = FrameCollector::new();
    broker.broker().subscribe("/queue/in", first.callback());
    broker.broker().subscribe("/queue/in", second.callback());

    let (sender, mut receiver) = connect(&broker.url()).await;
    stomp_connect(&sender, &mut receiver).await;

    let send = Frame::new(Command::Send)
        .with_header("destination", "/queue/in")
        .with_body("x");
    send_frame(&sender, &send).await;

    assert!(second.wait_for_count(1, DEFAULT_TIMEOUT).await);
    assert_eq!(first.count(), 0);
}

#[tokio::test]
async fn test_unsupported_commands_get_error_frames() {
    let broker = TestBroker::start().await;
    let (sender, mut receiver) = connect(&broker.url()).await;
    stomp_connect(&sender, &mut receiver).await;

    // recognized but unserved
    send_frame(&sender, &Frame::new(Command::Begin)).await;
    let reply = recv_frame(&mut receiver).await;
    assert_eq!(reply.command, Command::Error);
    assert_eq!(reply.body, "Unsupported command: BEGIN");

    // entirely unknown token
    sender
        .send(bytes::Bytes::from_static(b"BANANA\n\n\0"))
        .await
        .unwrap();
    let reply = recv_frame(&mut receiver).await;
    assert_eq!(reply.command, Command::Error);
    assert_eq!(reply.body, "Unsupported command: BANANA");
}

#[tokio::test]
async fn test_malformed_payload_is_recoverable() {
    let broker = TestBroker::start().await;
    let (sender, mut receiver) = connect(&broker.url()).await;

    sender
        .send(bytes::Bytes::from_static(&[0xFF, 0xFE, 0xFD]))
        .await
        .unwrap();
    let reply = recv_frame(&mut receiver).await;
    assert_eq!(reply.command, Command::Error);
    assert_eq!(reply.body, "Invalid frame format");

    // the session is still usable
    stomp_connect(&sender, &mut receiver).await;
}

#[tokio::test]
async fn test_ping_gets_delayed_heartbeat() {
    let broker = TestBroker::start().await;
    let (sender, mut receiver) = connect(&broker.url()).await;
    stomp_connect(&sender, &mut receiver).await;

    sender
        .send(bytes::Bytes::from_static(b"\n"))
        .await
        .unwrap();

    let reply = recv_frame(&mut receiver).await;
    assert_eq!(reply.command, Command::Ping);
}

#[tokio::test]
async fn test_ping_then_close_before_reply_is_harmless() {
    let broker = TestBroker::start().await;
    let (sender, mut receiver) = connect(&broker.url()).await;
    stomp_connect(&sender, &mut receiver).await;

    // probe, then drop the connection before the delayed reply fires
    sender
        .send(bytes::Bytes::from_static(b"\n"))
        .await
        .unwrap();
    sender.close().await.unwrap();
    drop(receiver);

    assert!(
        stompbox_test_utils::wait_for(
            || async { broker.broker().session_count() == 0 },
            Duration::from_millis(10),
            DEFAULT_TIMEOUT,
        )
        .await
    );

    // the broker is still serving
    let (sender2, mut receiver2) = connect(&broker.url()).await;
    stomp_connect(&sender2, &mut receiver2).await;
}

#[tokio::test]
async fn test_disconnect_removes_subscriptions() {
    let broker = TestBroker::start().await;
    let (sender, mut receiver) = connect(&broker.url()).await;
    stomp_connect(&sender, &mut receiver).await;

    send_frame(&sender, &subscribe_frame("s1", "/topic/t")).await;
    assert!(
        stompbox_test_utils::wait_for(
            || async { broker.broker().subscription_count() == 1 },
            Duration::from_millis(10),
            DEFAULT_TIMEOUT,
        )
        .await
    );

    send_frame(&sender, &Frame::new(Command::Disconnect)).await;
    assert!(
        stompbox_test_utils::wait_for(
            || async {
                broker.broker().subscription_count() == 0 && broker.broker().session_count() == 0
            },
            Duration::from_millis(10),
            DEFAULT_TIMEOUT,
        )
        .await
    );
}

#[tokio::test]
async fn test_dropped_client_is_cleaned_up() {
    let broker = TestBroker::start().await;
    let (sender, mut receiver) = connect(&broker.url()).await;
    stomp_connect(&sender, &mut receiver).await;

    send_frame(&sender, &subscribe_frame("s1", "/topic/t")).await;
    assert!(
        stompbox_test_utils::wait_for(
            || async { broker.broker().subscription_count() == 1 },
            Duration::from_millis(10),
            DEFAULT_TIMEOUT,
        )
        .await
    );

    sender.close().await.unwrap();
    drop(receiver);

    assert!(
        stompbox_test_utils::wait_for(
            || async {
                broker.broker().session_count() == 0 && broker.broker().subscription_count() == 0
            },
            Duration::from_millis(10),
            DEFAULT_TIMEOUT,
        )
        .await
    );
}

#[tokio::test]
async fn test_mount_path_rejects_other_paths() {
    let broker = Broker::new(BrokerConfig {
        path: Some("/stomp".to_string()),
        ..BrokerConfig::default()
    });
    let broker = TestBroker::start_with(broker).await;

    let url = format!("ws://127.0.0.1:{}/stomp", broker.port());
    let (sender, mut receiver) = connect(&url).await;
    stomp_connect(&sender, &mut receiver).await;

    let wrong = format!("ws://127.0.0.1:{}/other", broker.port());
    assert!(WebSocketTransport::connect(&wrong).await.is_err());
}

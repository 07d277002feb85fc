//! Downstream WebSocket protocol tests against an in-process gateway.

mod common;
use common::{next_json, send_json, TestGateway};

use futures_util::StreamExt;
use medtrack_gateway::GatewayConfig;
use serde_json::json;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn test_welcome_lists_trackable_pairs() {
    let gateway = TestGateway::start(GatewayConfig::default()).await;
    let mut client = gateway.connect().await;

    let welcome = next_json(&mut client).await;
    assert_eq!(welcome["type"], "welcome");
    assert_eq!(welcome["pairs"], json!(["btcusdt", "ethusdt"]));
    assert_eq!(welcome["message"], "Connected to median tracker");
}

#[tokio::test]
async fn test_subscribe_then_receive_only_subscribed_updates() {
    let gateway = TestGateway::start(GatewayConfig::default()).await;
    gateway.trade("btcusdt", "100");

    let mut client = gateway.connect().await;
    next_json(&mut client).await;

    send_json(&mut client, json!({"type": "subscribe", "pair": "BTCUSDT"})).await;
    let snapshot = next_json(&mut client).await;
    assert_eq!(snapshot["type"], "median");
    assert_eq!(snapshot["data"]["pair"], "btcusdt");
    assert_eq!(snapshot["data"]["median"], 100.0);
    assert_eq!(snapshot["data"]["stats"]["count"], 1);

    let confirmation = next_json(&mut client).await;
    assert_eq!(confirmation["type"], "subscribed");
    assert_eq!(confirmation["pair"], "btcusdt");

    gateway.trade("ethusdt", "3000");
    gateway.trade("btcusdt", "200");

    let update = next_json(&mut client).await;
    assert_eq!(update["type"], "medianUpdate");
    assert_eq!(update["data"]["pair"], "btcusdt");
    assert_eq!(update["data"]["price"], 200.0);
    assert_eq!(update["data"]["median"], 150.0);
    assert_eq!(update["data"]["count"], 2);

    // Nothing for ethusdt was queued ahead of the pong.
    send_json(&mut client, json!({"type": "ping"})).await;
    assert_eq!(next_json(&mut client).await, json!({"type": "pong"}));
}

#[tokio::test]
async fn test_unsubscribe_stops_updates() {
    let gateway = TestGateway::start(GatewayConfig::default()).await;
    let mut client = gateway.connect().await;
    next_json(&mut client).await;

    send_json(&mut client, json!({"type": "subscribe", "pair": "ethusdt"})).await;
    next_json(&mut client).await;
    next_json(&mut client).await;

    send_json(&mut client, json!({"type": "unsubscribe", "pair": "ethusdt"})).await;
    let reply = next_json(&mut client).await;
    assert_eq!(reply["type"], "unsubscribed");
    assert_eq!(reply["pair"], "ethusdt");

    gateway.trade("ethusdt", "3000");
    send_json(&mut client, json!({"type": "ping"})).await;
    assert_eq!(next_json(&mut client).await["type"], "pong");
}

#[tokio::test]
async fn test_control_errors() {
    let gateway = TestGateway::start(GatewayConfig::default()).await;
    let mut client = gateway.connect().await;
    next_json(&mut client).await;

    send_json(&mut client, json!({"type": "subscribe", "pair": "doge"})).await;
    let err = next_json(&mut client).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["message"], "Pair doge not available");
    assert_eq!(err["availablePairs"], json!(["btcusdt", "ethusdt"]));

    send_json(&mut client, json!({"type": "subscribe", "pair": 7})).await;
    assert_eq!(next_json(&mut client).await["message"], "Invalid pair format");

    send_json(&mut client, json!({"type": "getMedian", "pair": "doge"})).await;
    let err = next_json(&mut client).await;
    assert_eq!(err["message"], "No data available for pair doge");
    assert_eq!(err["availablePairs"], json!(["btcusdt", "ethusdt"]));

    send_json(&mut client, json!({"type": "teleport"})).await;
    assert_eq!(
        next_json(&mut client).await["message"],
        "Unknown message type: teleport"
    );

    use futures_util::SinkExt;
    client.send(Message::Text("{oops".to_string())).await.unwrap();
    assert_eq!(next_json(&mut client).await["message"], "Invalid message format");

    // The connection survives every error.
    send_json(&mut client, json!({"type": "getAllMedians"})).await;
    let all = next_json(&mut client).await;
    assert_eq!(all["type"], "allMedians");
    assert!(all["data"]["btcusdt"].is_object());
    assert!(all["data"]["ethusdt"].is_object());
}

#[tokio::test]
async fn test_silent_client_is_terminated_and_removed() {
    let config = GatewayConfig {
        heartbeat_interval_ms: 100,
        ..Default::default()
    };
    let gateway = TestGateway::start(config).await;
    let mut client = gateway.connect().await;
    next_json(&mut client).await;

    send_json(&mut client, json!({"type": "subscribe", "pair": "btcusdt"})).await;
    next_json(&mut client).await;
    next_json(&mut client).await;
    assert_eq!(gateway.broadcaster.connection_count(), 1);

    // Stop reading: pings queue up unanswered.
    assert!(gateway.wait_for_connections(0).await);

    gateway.trade("btcusdt", "1");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(gateway.broadcaster.connection_count(), 0);
    drop(client);
}

#[tokio::test]
async fn test_responsive_client_survives_heartbeats() {
    let config = GatewayConfig {
        heartbeat_interval_ms: 50,
        ..Default::default()
    };
    let gateway = TestGateway::start(config).await;
    let mut client = gateway.connect().await;
    next_json(&mut client).await;

    // Reading drives automatic pong replies.
    let deadline = tokio::time::Instant::now() + Duration::from_millis(400);
    while tokio::time::Instant::now() < deadline {
        let _ = tokio::time::timeout(Duration::from_millis(20), client.next()).await;
    }

    assert_eq!(gateway.broadcaster.connection_count(), 1);
    send_json(&mut client, json!({"type": "ping"})).await;
    assert_eq!(next_json(&mut client).await["type"], "pong");
}

#[tokio::test]
async fn test_connection_limit_refuses_extra_sessions() {
    let config = GatewayConfig {
        max_connections: 1,
        ..Default::default()
    };
    let gateway = TestGateway::start(config).await;
    let mut first = gateway.connect().await;
    next_json(&mut first).await;

    let second = tokio_tungstenite::connect_async(gateway.ws_url()).await;
    match second {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 503);
        }
        other => panic!("expected 503, got {other:?}"),
    }
}

#[tokio::test]
async fn test_shutdown_closes_sessions() {
    let gateway = TestGateway::start(GatewayConfig::default()).await;
    let mut client = gateway.connect().await;
    next_json(&mut client).await;

    gateway.shutdown.cancel();

    let closed = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok());
    assert!(gateway.wait_for_connections(0).await);
}

//! In-process gateway harness.

#![allow(dead_code)]

use futures_util::StreamExt;
use medtrack_core::{Price, Symbol, TradeEvent};
use medtrack_feed::{FeedEvent, FeedEventBus, TrackerRegistry};
use medtrack_gateway::{run_fanout, serve, AppState, GatewayConfig, SubscriptionBroadcaster};
use medtrack_ws::ConnectionState;
use serde_json::Value;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestGateway {
    pub addr: SocketAddr,
    pub registry: Arc<TrackerRegistry>,
    pub broadcaster: Arc<SubscriptionBroadcaster>,
    pub bus: FeedEventBus,
    pub feed_state: watch::Sender<ConnectionState>,
    pub shutdown: CancellationToken,
}

pub fn symbols(names: &[&str]) -> Vec<Symbol> {
    names.iter().map(|n| Symbol::parse(n).unwrap()).collect()
}

pub fn test_state(config: GatewayConfig) -> (AppState, TestGateway) {
    let registry = Arc::new(TrackerRegistry::with_symbols(symbols(&["btcusdt", "ethusdt"])));
    let broadcaster = Arc::new(SubscriptionBroadcaster::new(registry.clone()));
    let (feed_state, feed_state_rx) = watch::channel(ConnectionState::Connected);
    let shutdown = CancellationToken::new();
    let state = AppState::new(
        broadcaster.clone(),
        feed_state_rx,
        config,
        "test",
        shutdown.clone(),
    );
    let gateway = TestGateway {
        addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        registry,
        broadcaster,
        bus: FeedEventBus::new(64),
        feed_state,
        shutdown,
    };
    (state, gateway)
}

impl TestGateway {
    pub async fn start(config: GatewayConfig) -> Self {
        let (state, mut gateway) = test_state(config);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        gateway.addr = listener.local_addr().unwrap();

        tokio::spawn(run_fanout(
            gateway.broadcaster.clone(),
            gateway.bus.subscribe(),
            gateway.shutdown.clone(),
        ));
        tokio::spawn(serve(listener, state));
        gateway
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub async fn connect(&self) -> Client {
        let (client, _) = tokio_tungstenite::connect_async(self.ws_url()).await.unwrap();
        client
    }

    /// Apply a trade and publish it the way the upstream connector does.
    pub fn trade(&self, pair: &str, price: &str) {
        let trade = TradeEvent::from_epoch_ms(
            Symbol::parse(pair).unwrap(),
            Price::from_str(price).unwrap(),
            1_700_000_000_000,
        )
        .unwrap();
        let update = self.registry.apply(&trade).unwrap();
        self.bus.publish(FeedEvent::MedianUpdate(update));
    }

    pub async fn wait_for_connections(&self, count: usize) -> bool {
        tokio::time::timeout(Duration::from_secs(3), async {
            while self.broadcaster.connection_count() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok()
    }
}

/// Next JSON text message, skipping control frames.
pub async fn next_json(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(3), client.next())
            .await
            .expect("message within timeout")
            .expect("stream open")
            .expect("valid frame");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

pub async fn send_json(client: &mut Client, value: Value) {
    use futures_util::SinkExt;
    client.send(Message::Text(value.to_string())).await.unwrap();
}

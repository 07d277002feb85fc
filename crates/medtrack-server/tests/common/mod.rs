//! Shared harness for end-to-end application tests.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use medtrack_core::Symbol;
use medtrack_server::{AppConfig, AppResult, Application};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Exchange stand-in that pushes one trade frame per tick to every
/// connection until the peer goes away.
pub struct StreamingUpstream {
    addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl StreamingUpstream {
    pub async fn start(symbol: &'static str, price: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    let (mut write, mut read) = ws.split();
                    let mut tick = tokio::time::interval(Duration::from_millis(20));
                    let mut time_ms = 1_700_000_000_000i64;
                    loop {
                        tokio::select! {
                            _ = tick.tick() => {
                                time_ms += 20;
                                let frame = trade_frame(symbol, price, time_ms);
                                if write.send(Message::Text(frame)).await.is_err() {
                                    return;
                                }
                            }
                            msg = read.next() => match msg {
                                Some(Ok(Message::Ping(data))) => {
                                    let _ = write.send(Message::Pong(data)).await;
                                }
                                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                                _ => {}
                            },
                        }
                    }
                });
            }
        });

        Self { addr, accept_task }
    }

    pub fn base_url(&self) -> String {
        format!("ws://{}/stream", self.addr)
    }
}

impl Drop for StreamingUpstream {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

pub fn trade_frame(symbol: &str, price: &str, time_ms: i64) -> String {
    format!(
        r#"{{"stream":"{lower}@trade","data":{{"e":"trade","E":{time_ms},"s":"{symbol}","t":1,"p":"{price}","q":"0.5","T":{time_ms},"m":false,"M":true}}}}"#,
        lower = symbol.to_lowercase(),
    )
}

/// Base URL on a port nothing listens on.
pub async fn unused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}/stream")
}

pub fn test_config(upstream_url: String) -> AppConfig {
    let mut config = AppConfig::default();
    config.environment = "test".to_string();
    config.shutdown_grace_secs = 5;
    config.feed.ws_url = upstream_url;
    config.feed.reconnect_base_delay_ms = 10;
    config.feed.reconnect_max_delay_ms = 50;
    config
}

/// Application running on an ephemeral port.
pub struct RunningApp {
    pub addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<AppResult<()>>,
}

impl RunningApp {
    pub async fn start(config: AppConfig, pairs: &[&str]) -> Self {
        let symbols = pairs.iter().map(|p| Symbol::parse(p).unwrap()).collect();
        let app = Application::from_symbols(config, symbols).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(app.run_with(listener, async move {
            let _ = stopped.await;
        }));

        Self {
            addr,
            stop: Some(stop),
            task,
        }
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub async fn connect(&self) -> Client {
        let url = format!("ws://{}/ws", self.addr);
        let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        client
    }

    /// Signal shutdown and wait for the application to return.
    pub async fn stop(mut self) -> AppResult<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(10), &mut self.task)
            .await
            .expect("application stops within timeout")
            .expect("application task not panicked")
    }
}

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
    client.send(Message::Text(value.to_string())).await.unwrap();
}

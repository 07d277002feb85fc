//! Mock exchange stream for feed integration tests.
//!
//! Pushes a fixed script of text frames to every connection, records the
//! request URI of each handshake, and answers pings.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};

pub struct MockUpstream {
    addr: SocketAddr,
    request_uris: Arc<Mutex<Vec<String>>>,
    accept_task: tokio::task::JoinHandle<()>,
}

impl MockUpstream {
    pub async fn start(script: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let request_uris = Arc::new(Mutex::new(Vec::new()));

        let uris = request_uris.clone();
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let script = script.clone();
                let uris = uris.clone();
                tokio::spawn(async move {
                    let record = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                        uris.lock().unwrap().push(req.uri().to_string());
                        Ok(resp)
                    };
                    let Ok(ws) = accept_hdr_async(stream, record).await else {
                        return;
                    };
                    let (mut write, mut read) = ws.split();
                    for frame in script {
                        if write.send(Message::Text(frame)).await.is_err() {
                            return;
                        }
                    }
                    while let Some(Ok(msg)) = read.next().await {
                        match msg {
                            Message::Ping(data) => {
                                let _ = write.send(Message::Pong(data)).await;
                            }
                            Message::Close(_) => break,
                            _ => {}
                        }
                    }
                });
            }
        });

        Self {
            addr,
            request_uris,
            accept_task,
        }
    }

    /// Base URL without the stream query.
    pub fn base_url(&self) -> String {
        format!("ws://{}/stream", self.addr)
    }

    pub fn request_uris(&self) -> Vec<String> {
        self.request_uris.lock().unwrap().clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// A combined-stream trade frame as the exchange sends it.
pub fn trade_frame(symbol: &str, price: &str, time_ms: i64) -> String {
    format!(
        r#"{{"stream":"{lower}@trade","data":{{"e":"trade","E":{time_ms},"s":"{symbol}","t":1,"p":"{price}","q":"1.0","T":{time_ms},"m":false,"M":true}}}}"#,
        lower = symbol.to_lowercase(),
    )
}

//! Mock upstream WebSocket server for integration tests.
//!
//! Provides a simple server that can:
//! - Accept connections and count them
//! - Record the request URI of every handshake
//! - Push canned frames, close immediately, or go silent

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};

/// What the server does with each accepted connection.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Answer pings and keep the connection open.
    Responsive,
    /// Push these frames after the handshake, then stay responsive.
    SendFrames(Vec<String>),
    /// Complete the handshake, then close right away.
    CloseImmediately,
    /// Complete the handshake, then never read again (pings go unanswered).
    Unresponsive,
}

/// A mock WebSocket server for testing.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    connections: Arc<AtomicU32>,
    request_uris: Arc<Mutex<Vec<String>>>,
}

impl MockWsServer {
    /// Start a new mock server on an available port.
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicU32::new(0));
        let request_uris = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let connections_clone = connections.clone();
        let uris_clone = request_uris.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(
                            stream,
                            behavior.clone(),
                            connections_clone.clone(),
                            uris_clone.clone(),
                        ));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            connections,
            request_uris,
        }
    }

    /// Get the server's WebSocket URL.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of completed handshakes.
    pub fn connection_count(&self) -> u32 {
        self.connections.load(Ordering::SeqCst)
    }

    /// Request URIs seen during handshakes.
    pub fn request_uris(&self) -> Vec<String> {
        self.request_uris.lock().unwrap().clone()
    }

    /// Shutdown the server (stops accepting).
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// A URL nothing listens on.
pub async fn unused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}", addr)
}

async fn handle_connection(
    stream: TcpStream,
    behavior: MockBehavior,
    connections: Arc<AtomicU32>,
    request_uris: Arc<Mutex<Vec<String>>>,
) {
    let record_uri = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        request_uris.lock().unwrap().push(req.uri().to_string());
        Ok(resp)
    };

    let ws_stream = match accept_hdr_async(stream, record_uri).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };
    connections.fetch_add(1, Ordering::SeqCst);

    let (mut write, mut read) = ws_stream.split();

    match behavior {
        MockBehavior::CloseImmediately => {
            let _ = write.send(Message::Close(None)).await;
            return;
        }
        MockBehavior::Unresponsive => {
            // Hold both halves open without ever polling the reader.
            let _held = (write, read);
            std::future::pending::<()>().await;
            return;
        }
        MockBehavior::SendFrames(frames) => {
            for frame in frames {
                if write.send(Message::Text(frame)).await.is_err() {
                    return;
                }
            }
        }
        MockBehavior::Responsive => {}
    }

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }
}

//! Mock venue gateway speaking the wire protocol over WebSocket.
//!
//! Replies to every request with a fresh ticket and the echoed `reqId`.
//! Faults can be armed for the next request:
//! - drop: close the connection without replying
//! - silence: swallow the request and never reply

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Default)]
struct VenueState {
    requests: Mutex<Vec<Value>>,
    connections: AtomicU32,
    next_ticket: AtomicU64,
    drop_next: AtomicBool,
    silence_next: AtomicBool,
}

/// A mock venue WebSocket server.
pub struct MockVenueServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    state: Arc<VenueState>,
}

impl MockVenueServer {
    /// Start on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(VenueState {
            next_ticket: AtomicU64::new(1000),
            ..Default::default()
        });
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(stream, accept_state.clone()));
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            state,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn connection_count(&self) -> u32 {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Decoded request frames received so far.
    pub async fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().await.clone()
    }

    /// Close the connection on the next request instead of replying.
    pub fn drop_next_request(&self) {
        self.state.drop_next.store(true, Ordering::SeqCst);
    }

    /// Never reply to the next request.
    pub fn silence_next_request(&self) {
        self.state.silence_next.store(true, Ordering::SeqCst);
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(stream: TcpStream, state: Arc<VenueState>) {
    state.connections.fetch_add(1, Ordering::SeqCst);

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let Ok(request) = serde_json::from_str::<Value>(&text) else {
                    let _ = write.send(Message::Binary(b"garbage".to_vec())).await;
                    continue;
                };
                state.requests.lock().await.push(request.clone());

                if state.drop_next.swap(false, Ordering::SeqCst) {
                    break;
                }
                if state.silence_next.swap(false, Ordering::SeqCst) {
                    continue;
                }

                let ticket = state.next_ticket.fetch_add(1, Ordering::SeqCst);
                let reply = json!({
                    "error": false,
                    "retcode": 10009,
                    "msg": "done",
                    "ticket": ticket,
                    "reqId": request.get("reqId").cloned().unwrap_or(Value::Null),
                    "data": { "equity": 10000, "unrealized_pnl": 0 },
                });
                if write.send(Message::Text(reply.to_string())).await.is_err() {
                    break;
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }
}

//! Mock venue gateway for application tests.
//!
//! Answers wire requests over WebSocket by action:
//! - `account_info`: the configured equity
//! - `symbol_info`: the configured spec for the symbol
//! - anything else: a plain success with a fresh ticket

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

struct VenueState {
    equity: Mutex<String>,
    specs: Mutex<HashMap<String, Value>>,
    actions: Mutex<Vec<String>>,
    next_ticket: AtomicU64,
}

/// A mock venue WebSocket server.
pub struct MockVenue {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    state: Arc<VenueState>,
}

impl MockVenue {
    /// Start on an available port with equity 10000 and an EURUSD spec.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(VenueState {
            equity: Mutex::new("10000".to_string()),
            specs: Mutex::new(HashMap::new()),
            actions: Mutex::new(Vec::new()),
            next_ticket: AtomicU64::new(500),
        });
        state.specs.lock().await.insert(
            "EURUSD".to_string(),
            json!({
                "symbol": "EURUSD",
                "min_lot": "0.01",
                "lot_step": "0.01",
                "max_lot": "100",
                "margin_per_lot": "1000",
            }),
        );
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

    pub async fn set_equity(&self, equity: &str) {
        *self.state.equity.lock().await = equity.to_string();
    }

    pub async fn set_spec(&self, symbol: &str, spec: Value) {
        self.state.specs.lock().await.insert(symbol.to_string(), spec);
    }

    /// Actions received so far, in order.
    pub async fn actions(&self) -> Vec<String> {
        self.state.actions.lock().await.clone()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn reply_for(state: &VenueState, request: &Value) -> Value {
    let action = request["action"].as_str().unwrap_or_default();
    let ticket = state.next_ticket.fetch_add(1, Ordering::SeqCst);
    let data = match action {
        "account_info" => {
            let equity = state.equity.lock().await.clone();
            Some(json!({ "equity": equity, "unrealized_pnl": "0" }))
        }
        "symbol_info" => {
            let symbol = request["payload"]["symbol"].as_str().unwrap_or_default();
            match state.specs.lock().await.get(symbol) {
                Some(spec) => Some(spec.clone()),
                None => {
                    return json!({
                        "error": true,
                        "retcode": 4301,
                        "msg": format!("unknown symbol {symbol}"),
                        "reqId": request["reqId"],
                    })
                }
            }
        }
        _ => None,
    };

    let mut reply = json!({
        "error": false,
        "retcode": 10009,
        "msg": "done",
        "ticket": ticket,
        "reqId": request["reqId"],
    });
    if let Some(data) = data {
        reply["data"] = data;
    }
    reply
}

async fn handle_connection(stream: TcpStream, state: Arc<VenueState>) {
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
                    continue;
                };
                if let Some(action) = request["action"].as_str() {
                    state.actions.lock().await.push(action.to_string());
                }
                let reply = reply_for(&state, &request).await;
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

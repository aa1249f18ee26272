//! Request/reply channel over a persistent WebSocket.
//!
//! One request is outstanding at a time. The connection is opened lazily on
//! the first call and dropped after any failure, so the next call starts on
//! a fresh socket and can never read a stale reply.

use crate::transport::{io_error, BoxFuture, Transport, TransportError};
use crate::wire::{WireRequest, WireResponse};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex as TokioMutex;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket channel settings.
#[derive(Debug, Clone)]
pub struct SocketChannelConfig {
    /// `ws://` or `wss://` endpoint of the venue gateway.
    pub url: String,
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
    /// Deadline for the reply, measured from the end of the send.
    pub recv_timeout: Duration,
}

impl SocketChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(5),
            send_timeout: Duration::from_secs(5),
            recv_timeout: Duration::from_secs(10),
        }
    }
}

/// WebSocket request/reply transport.
pub struct SocketChannel {
    config: SocketChannelConfig,
    conn: TokioMutex<Option<WsStream>>,
    shutdown: CancellationToken,
}

impl SocketChannel {
    pub fn new(config: SocketChannelConfig, shutdown: CancellationToken) -> Self {
        Self {
            config,
            conn: TokioMutex::new(None),
            shutdown,
        }
    }

    pub fn config(&self) -> &SocketChannelConfig {
        &self.config
    }

    /// Whether a connection is currently held.
    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Close the held connection, if any.
    pub async fn close(&self) {
        if let Some(mut stream) = self.conn.lock().await.take() {
            if let Err(e) = stream.close(None).await {
                debug!(error = %e, "Close frame not delivered");
            }
            info!(url = %self.config.url, "Venue socket closed");
        }
    }

    async fn connect(&self) -> Result<WsStream, TransportError> {
        info!(url = %self.config.url, "Connecting to venue socket");
        let (stream, _response) = tokio::time::timeout(
            self.config.connect_timeout,
            connect_async_tls_with_config(self.config.url.as_str(), None, true, None),
        )
        .await
        .map_err(|_| {
            TransportError::Timeout(format!(
                "connect to {} exceeded {:?}",
                self.config.url, self.config.connect_timeout
            ))
        })?
        .map_err(ws_error)?;
        info!(url = %self.config.url, "Venue socket connected");
        Ok(stream)
    }

    async fn exchange(
        &self,
        conn: &mut Option<WsStream>,
        req_id: &str,
        frame: String,
    ) -> Result<WireResponse, TransportError> {
        let stream = match conn.take() {
            Some(stream) => stream,
            None => self.connect().await?,
        };
        let stream = conn.insert(stream);

        tokio::time::timeout(self.config.send_timeout, stream.send(Message::Text(frame)))
            .await
            .map_err(|_| {
                TransportError::Timeout(format!("send exceeded {:?}", self.config.send_timeout))
            })?
            .map_err(ws_error)?;

        let deadline = Instant::now() + self.config.recv_timeout;
        loop {
            let next = tokio::time::timeout_at(deadline, stream.next())
                .await
                .map_err(|_| {
                    TransportError::Timeout(format!(
                        "no reply to {req_id} within {:?}",
                        self.config.recv_timeout
                    ))
                })?;

            match next {
                None => {
                    return Err(TransportError::ConnectionReset(
                        "socket closed by venue".to_string(),
                    ))
                }
                Some(Err(e)) => return Err(ws_error(e)),
                Some(Ok(Message::Text(text))) => {
                    let reply = WireResponse::decode(&text)
                        .map_err(|e| TransportError::Protocol(format!("malformed reply: {e}")))?;
                    if let Some(echo) = reply.req_id.as_deref() {
                        if echo != req_id {
                            return Err(TransportError::Protocol(format!(
                                "reply for {echo} while waiting for {req_id}"
                            )));
                        }
                    }
                    return Ok(reply);
                }
                Some(Ok(Message::Ping(data))) => {
                    stream.send(Message::Pong(data)).await.map_err(ws_error)?;
                }
                Some(Ok(Message::Close(frame))) => {
                    return Err(TransportError::ConnectionReset(format!(
                        "closed by venue: {frame:?}"
                    )))
                }
                Some(Ok(Message::Binary(_))) => {
                    return Err(TransportError::Protocol(
                        "unexpected binary frame".to_string(),
                    ))
                }
                Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
            }
        }
    }
}

impl Transport for SocketChannel {
    fn name(&self) -> &'static str {
        "socket"
    }

    fn call<'a>(
        &'a self,
        request: &'a WireRequest,
    ) -> BoxFuture<'a, Result<WireResponse, TransportError>> {
        Box::pin(async move {
            if self.shutdown.is_cancelled() {
                return Err(TransportError::Shutdown);
            }
            let frame = request
                .encode()
                .map_err(|e| TransportError::Protocol(format!("encode failed: {e}")))?;

            let mut conn = self.conn.lock().await;
            let result = self.exchange(&mut conn, &request.req_id, frame).await;
            if let Err(e) = &result {
                if conn.take().is_some() {
                    warn!(url = %self.config.url, error = %e, "Dropping venue socket after failure");
                }
            }
            result
        })
    }
}

/// Map a tungstenite error onto the transport taxonomy.
fn ws_error(e: tungstenite::Error) -> TransportError {
    use tungstenite::error::ProtocolError;
    use tungstenite::Error;
    match e {
        Error::ConnectionClosed
        | Error::AlreadyClosed
        | Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            TransportError::ConnectionReset(e.to_string())
        }
        Error::Io(ref io) => io_error(io),
        other => TransportError::Protocol(other.to_string()),
    }
}

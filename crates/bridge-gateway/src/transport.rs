//! Transport abstraction for venue calls.
//!
//! A transport performs exactly one request/reply exchange per `call`; the
//! router decides whether a failed call may be repeated.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bridge_core::ActionKind;
use bridge_resilience::Failure;
use parking_lot::Mutex;
use thiserror::Error;

use crate::wire::{WireRequest, WireResponse};

pub use bridge_resilience::BoxFuture;

/// Why a single exchange with the venue failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection was never established.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("name resolution failed: {0}")]
    Dns(String),

    /// No reply within the per-attempt deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The connection dropped after the request may have been sent.
    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// Malformed frame, bad URL, handshake rejected.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Whether the request provably never reached the venue.
    pub fn is_pre_execution(&self) -> bool {
        matches!(self, Self::ConnectionRefused(_) | Self::Dns(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionRefused(_) => "connection_refused",
            Self::Dns(_) => "dns",
            Self::Timeout(_) => "timeout",
            Self::ConnectionReset(_) => "connection_reset",
            Self::Io(_) => "io",
            Self::Protocol(_) => "protocol",
            Self::Shutdown => "shutdown",
        }
    }

    /// Retry class for this failure on an action of `kind`.
    ///
    /// Queries retry every connection-class failure. Writes retry only
    /// pre-execution failures; anything that could have reached the venue
    /// is an unknown outcome.
    pub fn classify(self, kind: ActionKind) -> Failure<Self> {
        match self {
            Self::Shutdown => Failure::Terminal(self),
            Self::Protocol(_) => Failure::Fatal(self),
            Self::ConnectionRefused(_) | Self::Dns(_) => Failure::Retryable(self),
            Self::Timeout(_) | Self::ConnectionReset(_) | Self::Io(_) => match kind {
                ActionKind::Query => Failure::Retryable(self),
                ActionKind::Write => Failure::Unknown(self),
            },
        }
    }
}

/// Map an I/O error from a socket operation.
pub(crate) fn io_error(e: &std::io::Error) -> TransportError {
    use std::io::ErrorKind;
    let text = e.to_string();
    match e.kind() {
        ErrorKind::ConnectionRefused => TransportError::ConnectionRefused(text),
        ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportError::Timeout(text),
        ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::UnexpectedEof
        | ErrorKind::NotConnected => TransportError::ConnectionReset(text),
        _ if looks_like_dns(&text) => TransportError::Dns(text),
        _ => TransportError::Io(text),
    }
}

pub(crate) fn looks_like_dns(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("no such host")
}

/// One request/reply exchange with the venue.
pub trait Transport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn call<'a>(&'a self, request: &'a WireRequest)
        -> BoxFuture<'a, Result<WireResponse, TransportError>>;
}

/// Arc wrapper for Transport trait objects.
pub type DynTransport = Arc<dyn Transport>;

// ============================================================================
// MockTransport
// ============================================================================

/// Scripted transport for tests.
///
/// Pops one scripted result per call. Once the script is empty every call
/// succeeds with a fresh ticket.
#[derive(Debug)]
pub struct MockTransport {
    script: Mutex<VecDeque<Result<WireResponse, TransportError>>>,
    calls: Mutex<Vec<WireRequest>>,
    next_ticket: AtomicU64,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            next_ticket: AtomicU64::new(1),
        }
    }

    pub fn push_reply(&self, reply: WireResponse) {
        self.script.lock().push_back(Ok(reply));
    }

    pub fn push_error(&self, error: TransportError) {
        self.script.lock().push_back(Err(error));
    }

    /// Requests received so far.
    pub fn calls(&self) -> Vec<WireRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn call<'a>(
        &'a self,
        request: &'a WireRequest,
    ) -> BoxFuture<'a, Result<WireResponse, TransportError>> {
        Box::pin(async move {
            self.calls.lock().push(request.clone());
            let scripted = self.script.lock().pop_front();
            scripted.unwrap_or_else(|| {
                let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
                Ok(WireResponse::ok(ticket).with_req_id(request.req_id.clone()))
            })
        })
    }
}

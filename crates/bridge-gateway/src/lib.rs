//! Venue gateway for the bridge.
//!
//! Routes structured commands to the venue over two channels:
//! - a persistent WebSocket request/reply channel for queries
//! - a direct HTTP channel for writes (orders, closes)
//!
//! # Retry safety
//!
//! | Failure                     | Query  | Write          |
//! |-----------------------------|--------|----------------|
//! | connection refused / DNS    | retry  | retry          |
//! | timeout / reset / I/O       | retry  | outcome unknown|
//! | protocol                    | fatal  | fatal          |
//!
//! A write is never repeated once it may have reached the venue.

pub mod direct;
pub mod error;
pub mod lifecycle;
pub mod router;
pub mod socket;
pub mod transport;
pub mod wire;

pub use direct::{DirectClient, DirectClientConfig};
pub use error::{GatewayError, GatewayResult};
pub use lifecycle::RequestLifecycle;
pub use router::{GatewayRouter, RouterPolicies};
pub use socket::{SocketChannel, SocketChannelConfig};
pub use transport::{BoxFuture, DynTransport, MockTransport, Transport, TransportError};
pub use wire::{WireRequest, WireResponse};

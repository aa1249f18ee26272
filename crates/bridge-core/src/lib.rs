//! Core domain types for the venue bridge.
//!
//! This crate provides the types shared by the invocation engine, the risk
//! gate and the gateway router:
//! - `Lots`, `Money`: precision-safe numeric types
//! - `VenueSpec`: per-symbol lot constraints supplied by the venue
//! - `OrderIntent`, `NormalizedOrder`: sizing input and output
//! - `GatewayRequest`, `GatewayResponse`, `RequestState`: routed commands

pub mod decimal;
pub mod error;
pub mod gateway;
pub mod order;
pub mod venue;

pub use decimal::{Lots, Money};
pub use error::{CoreError, Result};
pub use gateway::{
    Action, ActionKind, ExecutionId, GatewayRequest, GatewayResponse, Payload, RequestId,
    RequestState, ResultCode, OUTCOME_UNKNOWN_MESSAGE,
};
pub use order::{Direction, EquitySnapshot, NormalizedOrder, OrderIntent, TradeClose};
pub use venue::{RawVenueSpec, VenueSpec};

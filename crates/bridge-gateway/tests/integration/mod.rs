//! Integration tests for bridge-gateway.
//!
//! These tests drive the router and transports against stand-in venues:
//! - WebSocket request/reply with reconnects
//! - Retry safety of writes under injected failures

pub mod common;

//! Integration tests for venue-bridge.
//!
//! These tests verify the interaction between components:
//! - Preflight against a mock venue
//! - Command intake through the bridge handle
//! - Risk halts across the running application

pub mod common;

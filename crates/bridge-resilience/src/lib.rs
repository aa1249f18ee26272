//! Resilient invocation engine.
//!
//! Wraps remote calls with bounded retries, exponential backoff and
//! failure-class-aware stopping rules:
//! - [`RetryPolicy`]: validated budget and backoff shape
//! - [`Failure`]: the class an operation assigns to its own error
//! - [`Invoker`]: the retry loop, with reachability probing and shutdown
//! - [`redact`]: secret masking for anything that reaches a log line

pub mod error;
pub mod failure;
pub mod invoker;
pub mod policy;
pub mod probe;
pub mod redact;

pub use error::{InvokeError, PolicyError, PolicyResult};
pub use failure::{AttemptOutcome, Failure, InvocationAttempt};
pub use invoker::Invoker;
pub use policy::{RetryPolicy, RetryPolicyConfig};
pub use probe::{AssumeReachable, BoxFuture, ReachabilityProbe, TcpProbe};
pub use redact::redact;

//! Retry loop around a single remote call.
//!
//! The invoker never interrupts an attempt that is already running: an
//! interrupted write is exactly the ambiguous outcome the classification
//! exists to avoid. Shutdown is observed before each attempt and while
//! backing off.

use crate::error::InvokeError;
use crate::failure::{Failure, InvocationAttempt};
use crate::policy::RetryPolicy;
use crate::probe::{AssumeReachable, ReachabilityProbe, TcpProbe};
use crate::redact::redact;
use bridge_telemetry::Metrics;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runs fallible operations under a [`RetryPolicy`].
///
/// Cheap to clone; clones share the probe and the shutdown token.
#[derive(Clone)]
pub struct Invoker {
    probe: Arc<dyn ReachabilityProbe>,
    shutdown: CancellationToken,
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker")
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Invoker {
    pub fn new(probe: Arc<dyn ReachabilityProbe>, shutdown: CancellationToken) -> Self {
        Self { probe, shutdown }
    }

    /// Invoker using the default public-endpoint TCP probe.
    pub fn with_tcp_probe(shutdown: CancellationToken) -> Self {
        Self::new(Arc::new(TcpProbe::default()), shutdown)
    }

    /// Invoker that skips reachability probing.
    pub fn without_probe(shutdown: CancellationToken) -> Self {
        Self::new(Arc::new(AssumeReachable), shutdown)
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Run `op` until it succeeds or the policy says stop.
    ///
    /// Only [`Failure::Retryable`] is retried. `Terminal`, `Fatal` and
    /// `Unknown` are returned after the attempt that produced them.
    pub async fn invoke<T, E, F, Fut>(
        &self,
        operation: &str,
        policy: &RetryPolicy,
        mut op: F,
    ) -> Result<T, InvokeError<E>>
    where
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure<E>>>,
    {
        let correlation_id = Uuid::new_v4().simple().to_string();
        let started = Instant::now();
        let mut attempt: u32 = 0;

        debug!(
            correlation_id = %correlation_id,
            operation,
            max_attempts = ?policy.max_attempts(),
            overall_timeout_ms = policy.overall_timeout().as_millis() as u64,
            "Invocation started"
        );

        let result = loop {
            if self.shutdown.is_cancelled() {
                break Err(InvokeError::Shutdown { attempts: attempt });
            }

            attempt += 1;
            let failure = match op().await {
                Ok(value) => {
                    InvocationAttempt::success(attempt, started.elapsed())
                        .log(&correlation_id, operation);
                    break Ok(value);
                }
                Err(failure) => failure,
            };
            InvocationAttempt::failure(attempt, started.elapsed(), &failure)
                .log(&correlation_id, operation);

            let last = match failure {
                Failure::Retryable(e) => e,
                Failure::Terminal(error) => {
                    break Err(InvokeError::Terminal {
                        attempts: attempt,
                        error,
                    })
                }
                Failure::Fatal(error) => {
                    break Err(InvokeError::Fatal {
                        attempts: attempt,
                        error,
                    })
                }
                Failure::Unknown(error) => {
                    break Err(InvokeError::OutcomeUnknown {
                        attempts: attempt,
                        error,
                    })
                }
            };

            if policy.max_attempts().is_some_and(|max| attempt >= max) {
                break Err(InvokeError::RetriesExhausted {
                    attempts: attempt,
                    last,
                });
            }

            let wait = policy.backoff_for(attempt);
            if started.elapsed() + wait > policy.overall_timeout() {
                break Err(InvokeError::BudgetExceeded {
                    attempts: attempt,
                    budget: policy.overall_timeout(),
                    last,
                });
            }

            if !self.probe.any_reachable().await {
                break Err(InvokeError::NetworkUnavailable {
                    attempts: attempt,
                    last,
                });
            }

            Metrics::backoff_scheduled(operation);
            debug!(
                correlation_id = %correlation_id,
                operation,
                attempt,
                wait_ms = wait.as_millis() as u64,
                "Backing off before retry"
            );

            let cancelled = tokio::select! {
                () = tokio::time::sleep(wait) => false,
                () = self.shutdown.cancelled() => true,
            };
            if cancelled {
                break Err(InvokeError::Shutdown { attempts: attempt });
            }
        };

        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        match &result {
            Ok(_) => {
                Metrics::invocation_finished(
                    operation,
                    "success",
                    attempt,
                    elapsed.as_secs_f64() * 1000.0,
                );
                if attempt > 1 {
                    info!(
                        correlation_id = %correlation_id,
                        operation,
                        attempts = attempt,
                        elapsed_ms,
                        "Invocation succeeded after retries"
                    );
                }
            }
            Err(err) => {
                let outcome = err.outcome_label();
                Metrics::invocation_finished(
                    operation,
                    outcome,
                    err.attempts(),
                    elapsed.as_secs_f64() * 1000.0,
                );
                let error = err.last_error().map(|e| redact(&e.to_string()));
                warn!(
                    correlation_id = %correlation_id,
                    operation,
                    attempts = err.attempts(),
                    elapsed_ms,
                    outcome,
                    error = ?error,
                    "Invocation gave up"
                );
            }
        }

        result
    }
}

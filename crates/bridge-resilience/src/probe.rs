//! Best-effort network reachability probes.
//!
//! Before each retry the invoker asks a probe whether the outside world is
//! reachable at all. When every endpoint is down there is no point burning
//! the attempt budget against the venue.

use futures_util::future::select_ok;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Well-known public resolvers run by independent operators.
pub const DEFAULT_PROBE_ENDPOINTS: [&str; 3] = ["1.1.1.1:53", "8.8.8.8:53", "9.9.9.9:53"];

/// Per-endpoint connect timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Reachability check used between retries.
pub trait ReachabilityProbe: Send + Sync {
    /// Resolves to `true` if at least one endpoint answered.
    fn any_reachable(&self) -> BoxFuture<'_, bool>;
}

/// TCP connect probe against several independent endpoints.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    endpoints: Vec<String>,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Self {
        Self { endpoints, timeout }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(
            DEFAULT_PROBE_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_PROBE_TIMEOUT,
        )
    }
}

impl ReachabilityProbe for TcpProbe {
    fn any_reachable(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            // Nothing to probe means nothing to disprove.
            if self.endpoints.is_empty() {
                return true;
            }

            let attempts = self.endpoints.iter().map(|endpoint| {
                let timeout = self.timeout;
                Box::pin(async move {
                    match tokio::time::timeout(timeout, TcpStream::connect(endpoint.as_str())).await
                    {
                        Ok(Ok(_)) => Ok(()),
                        Ok(Err(e)) => {
                            debug!(endpoint = %endpoint, error = %e, "Probe endpoint unreachable");
                            Err(())
                        }
                        Err(_) => {
                            debug!(endpoint = %endpoint, "Probe endpoint timed out");
                            Err(())
                        }
                    }
                })
            });

            select_ok(attempts).await.is_ok()
        })
    }
}

/// Probe that always reports the network as reachable (probing disabled).
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeReachable;

impl ReachabilityProbe for AssumeReachable {
    fn any_reachable(&self) -> BoxFuture<'_, bool> {
        Box::pin(async { true })
    }
}

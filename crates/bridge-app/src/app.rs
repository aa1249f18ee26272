//! Main application orchestration.
//!
//! Coordinates all components:
//! - Gateway router over the socket and direct channels
//! - Heartbeat, equity poll and venue spec refresh
//! - Trade-close intake and session rollover
//! - Commands from the strategy via [`BridgeHandle`]

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use bridge_core::{
    Direction, GatewayRequest, GatewayResponse, RawVenueSpec, RequestId, TradeClose, VenueSpec,
};
use bridge_gateway::{
    DirectClient, DynTransport, GatewayResult, GatewayRouter, RouterPolicies, SocketChannel,
};
use bridge_resilience::{Invoker, TcpProbe};
use bridge_risk::{RiskError, RiskGate, RiskSession, SpecCache};
use bridge_telemetry::Metrics;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on waiting for in-flight commands at shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

// ============================================================================
// BridgeEvent / BridgeHandle
// ============================================================================

/// Inputs accepted by the running application.
#[derive(Debug)]
pub enum BridgeEvent {
    /// Route a command and send back the result.
    Route {
        request: GatewayRequest,
        reply: oneshot::Sender<GatewayResult<GatewayResponse>>,
    },

    /// Size an order from a win probability, route it and send back the result.
    SizedOrder {
        request_id: RequestId,
        symbol: String,
        direction: Direction,
        win_probability: Option<f64>,
        reply: oneshot::Sender<GatewayResult<GatewayResponse>>,
    },

    /// A trade was closed with realized P&L.
    TradeClosed(TradeClose),

    /// Operator acknowledged a drawdown halt.
    AcknowledgeDrawdown { reply: oneshot::Sender<bool> },
}

/// Cloneable sender side for the strategy and operator tooling.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    tx: mpsc::Sender<BridgeEvent>,
}

impl BridgeHandle {
    /// Route a command and wait for its result.
    pub async fn route(&self, request: GatewayRequest) -> AppResult<GatewayResponse> {
        let (reply, rx) = oneshot::channel();
        self.send(BridgeEvent::Route { request, reply }).await?;
        let result = rx.await.map_err(|_| AppError::Shutdown)?;
        Ok(result?)
    }

    /// Submit an order sized by the risk gate from `win_probability`.
    pub async fn submit_sized_order(
        &self,
        request_id: RequestId,
        symbol: impl Into<String>,
        direction: Direction,
        win_probability: Option<f64>,
    ) -> AppResult<GatewayResponse> {
        let (reply, rx) = oneshot::channel();
        self.send(BridgeEvent::SizedOrder {
            request_id,
            symbol: symbol.into(),
            direction,
            win_probability,
            reply,
        })
        .await?;
        let result = rx.await.map_err(|_| AppError::Shutdown)?;
        Ok(result?)
    }

    pub async fn trade_closed(&self, close: TradeClose) -> AppResult<()> {
        self.send(BridgeEvent::TradeClosed(close)).await
    }

    /// Returns whether a drawdown halt was cleared.
    pub async fn acknowledge_drawdown_halt(&self) -> AppResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(BridgeEvent::AcknowledgeDrawdown { reply }).await?;
        rx.await.map_err(|_| AppError::Shutdown)
    }

    async fn send(&self, event: BridgeEvent) -> AppResult<()> {
        self.tx.send(event).await.map_err(|_| AppError::Shutdown)
    }
}

// ============================================================================
// Application
// ============================================================================

/// Main application.
pub struct Application {
    config: AppConfig,
    router: Arc<GatewayRouter>,
    /// Held to close the socket at shutdown.
    socket: Option<Arc<SocketChannel>>,
    shutdown: CancellationToken,
    event_tx: mpsc::Sender<BridgeEvent>,
    event_rx: mpsc::Receiver<BridgeEvent>,
    in_flight: TaskTracker,
}

impl Application {
    /// Create the application with the configured venue channels.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let shutdown = CancellationToken::new();
        let socket = Arc::new(SocketChannel::new(
            config.socket_channel_config(),
            shutdown.clone(),
        ));
        let direct = Arc::new(DirectClient::new(
            config.direct_client_config(),
            shutdown.clone(),
        )?);

        let query: DynTransport = socket.clone();
        let mut app = Self::with_transports(config, query, direct, shutdown)?;
        app.socket = Some(socket);
        Ok(app)
    }

    /// Create the application over caller-supplied transports.
    pub fn with_transports(
        config: AppConfig,
        query: DynTransport,
        write: DynTransport,
        shutdown: CancellationToken,
    ) -> AppResult<Self> {
        config.validate()?;

        let invoker = if config.probe.enabled {
            Invoker::new(
                Arc::new(TcpProbe::new(
                    config.probe.endpoints.clone(),
                    Duration::from_millis(config.probe.timeout_ms),
                )),
                shutdown.clone(),
            )
        } else {
            Invoker::without_probe(shutdown.clone())
        };

        let session_date = Utc::now().date_naive();
        let session = Arc::new(RiskSession::new(
            config.start_equity(),
            &config.risk,
            session_date,
        )?);
        let specs = Arc::new(SpecCache::from_specs(config.venue_specs()?)?);
        if specs.is_empty() {
            warn!("No symbols configured, every order will be rejected");
        }

        let router = GatewayRouter::new(
            invoker,
            query,
            write,
            RiskGate::new(config.risk.clone()),
            session,
            specs,
        )
        .with_policies(RouterPolicies {
            query: config.query_policy()?,
            write: config.write_policy()?,
        });

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        info!(
            socket_url = %config.venue.socket_url,
            direct_url = %config.venue.direct_url,
            %session_date,
            start_equity = %config.start_equity,
            symbols = ?router.specs().symbols(),
            "Application configured"
        );

        Ok(Self {
            config,
            router: Arc::new(router),
            socket: None,
            shutdown,
            event_tx,
            event_rx,
            in_flight: TaskTracker::new(),
        })
    }

    pub fn handle(&self) -> BridgeHandle {
        BridgeHandle {
            tx: self.event_tx.clone(),
        }
    }

    pub fn router(&self) -> &Arc<GatewayRouter> {
        &self.router
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Verify the venue answers, then load equity and specs.
    ///
    /// The risk session is rebased on the live equity, so limits apply
    /// from the account's actual value rather than the configured one.
    pub async fn run_preflight(&self) -> AppResult<()> {
        info!("Running preflight checks");

        let heartbeat = self
            .router
            .heartbeat()
            .await
            .map_err(|e| AppError::Preflight(format!("Venue heartbeat failed: {e}")))?;
        if heartbeat.failed() {
            return Err(AppError::Preflight(format!(
                "Venue rejected heartbeat: {} {}",
                heartbeat.result_code(),
                heartbeat.message()
            )));
        }

        let snapshot = self
            .router
            .fetch_equity()
            .await
            .map_err(|e| AppError::Preflight(format!("Equity query failed: {e}")))?;
        self.router.session().rebase(snapshot)?;
        info!(
            equity = %snapshot.equity,
            unrealized_pnl = %snapshot.unrealized_pnl,
            configured = %self.config.start_equity,
            "Account equity loaded"
        );

        let refreshed = refresh_specs(&self.router).await;
        info!(refreshed, total = self.router.specs().len(), "Preflight complete");
        Ok(())
    }

    /// Run until Ctrl-C or the shutdown token fires.
    pub async fn run(mut self) -> AppResult<()> {
        info!("Starting application");

        let schedule = self.config.schedule.clone();
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        let router = self.router.clone();
        tasks.extend(spawn_periodic(
            "heartbeat",
            Duration::from_secs(schedule.heartbeat_interval_secs),
            self.shutdown.clone(),
            move || {
                let router = router.clone();
                async move {
                    match router.heartbeat().await {
                        Ok(response) if !response.failed() => debug!("Heartbeat ok"),
                        Ok(response) => warn!(
                            retcode = %response.result_code(),
                            msg = %response.message(),
                            "Heartbeat rejected by venue"
                        ),
                        Err(e) => warn!(error = %e, "Heartbeat failed"),
                    }
                }
            },
        ));

        let router = self.router.clone();
        tasks.extend(spawn_periodic(
            "equity_poll",
            Duration::from_secs(schedule.equity_poll_interval_secs),
            self.shutdown.clone(),
            move || {
                let router = router.clone();
                async move {
                    if let Err(e) = router.poll_equity().await {
                        warn!(error = %e, "Equity poll failed");
                    }
                }
            },
        ));

        let router = self.router.clone();
        tasks.extend(spawn_periodic(
            "spec_refresh",
            Duration::from_secs(schedule.spec_refresh_interval_secs),
            self.shutdown.clone(),
            move || {
                let router = router.clone();
                async move {
                    refresh_specs(&router).await;
                }
            },
        ));

        let session = self.router.session().clone();
        tasks.extend(spawn_periodic(
            "rollover",
            Duration::from_secs(schedule.rollover_check_interval_secs),
            self.shutdown.clone(),
            move || {
                let session = session.clone();
                async move {
                    session.check_rollover(Utc::now());
                }
            },
        ));

        info!("Entering main event loop");
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                result = &mut ctrl_c => {
                    match result {
                        Ok(()) => info!("Ctrl-C received, shutting down"),
                        Err(e) => error!(error = %e, "Ctrl-C handler failed, shutting down"),
                    }
                    self.shutdown.cancel();
                    break;
                }
                Some(event) = self.event_rx.recv() => {
                    self.dispatch(event);
                }
            }
        }

        self.drain().await;
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        if let Some(socket) = &self.socket {
            socket.close().await;
        }
        match Metrics::render() {
            Ok(snapshot) => debug!(%snapshot, "Final metrics"),
            Err(e) => warn!(error = %e, "Metrics render failed"),
        }
        info!("Application stopped");
        Ok(())
    }

    fn dispatch(&self, event: BridgeEvent) {
        match event {
            BridgeEvent::Route { request, reply } => {
                let router = self.router.clone();
                self.in_flight.spawn(async move {
                    let result = router.route(&request).await;
                    if reply.send(result).is_err() {
                        debug!(req_id = %request.request_id(), "Caller dropped before reply");
                    }
                });
            }
            BridgeEvent::SizedOrder {
                request_id,
                symbol,
                direction,
                win_probability,
                reply,
            } => {
                let router = self.router.clone();
                self.in_flight.spawn(async move {
                    let result = router
                        .submit_sized_order(request_id.clone(), &symbol, direction, win_probability)
                        .await;
                    if reply.send(result).is_err() {
                        debug!(req_id = %request_id, "Caller dropped before reply");
                    }
                });
            }
            BridgeEvent::TradeClosed(close) => {
                info!(symbol = %close.symbol, realized_pnl = %close.realized_pnl, "Trade closed");
                self.router.session().on_trade_closed(&close);
            }
            BridgeEvent::AcknowledgeDrawdown { reply } => {
                let cleared = self.router.session().acknowledge_drawdown_halt();
                if reply.send(cleared).is_err() {
                    debug!(cleared, "Caller dropped before drawdown acknowledgement reply");
                }
            }
        }
    }

    /// Stop intake and wait for in-flight commands.
    async fn drain(&mut self) {
        self.event_rx.close();
        while let Some(event) = self.event_rx.recv().await {
            match event {
                // Not yet dispatched; the caller sees a shutdown error.
                BridgeEvent::Route { .. } | BridgeEvent::SizedOrder { .. } => {}
                other => self.dispatch(other),
            }
        }

        self.in_flight.close();
        if !self.in_flight.is_empty() {
            info!(pending = self.in_flight.len(), "Waiting for in-flight commands");
        }
        if tokio::time::timeout(SHUTDOWN_GRACE, self.in_flight.wait())
            .await
            .is_err()
        {
            error!(
                pending = self.in_flight.len(),
                "In-flight commands still running at shutdown deadline"
            );
        }
    }
}

/// Spawn `tick` every `period` until shutdown. A zero period disables the task.
fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    shutdown: CancellationToken,
    mut tick: F,
) -> Option<JoinHandle<()>>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    if period.is_zero() {
        info!(task = name, "Periodic task disabled");
        return None;
    }
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => tick().await,
            }
        }
        debug!(task = name, "Periodic task stopped");
    }))
}

/// Re-read the venue spec of every cached symbol. Returns how many were applied.
///
/// A material change (lot bounds or step) is not applied; orders keep
/// being sized against the cached spec until an operator restarts.
pub async fn refresh_specs(router: &GatewayRouter) -> usize {
    let mut applied = 0;
    for symbol in router.specs().symbols() {
        let spec = match fetch_spec(router, &symbol).await {
            Ok(spec) => spec,
            Err(e) => {
                warn!(%symbol, error = %e, "Venue spec refresh failed");
                continue;
            }
        };
        match router.specs().update(spec) {
            Ok(()) => applied += 1,
            Err(RiskError::SpecChanged { symbol, detail }) => {
                error!(%symbol, %detail, "Venue spec changed materially, keeping cached spec");
            }
            Err(e) => warn!(%symbol, error = %e, "Venue spec rejected"),
        }
    }
    applied
}

async fn fetch_spec(router: &GatewayRouter, symbol: &str) -> AppResult<VenueSpec> {
    let request_id = RequestId::new(format!(
        "spec-{symbol}-{}",
        Utc::now().timestamp_millis()
    ))?;
    let response = router
        .route(&GatewayRequest::symbol_info(request_id, symbol))
        .await?;
    if response.failed() {
        return Err(AppError::Preflight(format!(
            "symbol_info {symbol} rejected: {} {}",
            response.result_code(),
            response.message()
        )));
    }
    let data = response
        .data()
        .cloned()
        .ok_or_else(|| AppError::Preflight(format!("symbol_info {symbol} returned no data")))?;
    let raw: RawVenueSpec = serde_json::from_value(data)
        .map_err(|e| AppError::Preflight(format!("symbol_info {symbol} malformed: {e}")))?;
    if raw.symbol != symbol {
        return Err(AppError::Preflight(format!(
            "symbol_info {symbol} answered for {}",
            raw.symbol
        )));
    }
    Ok(VenueSpec::try_from(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_zero_period_disables_task() {
        let handle = spawn_periodic("noop", Duration::ZERO, CancellationToken::new(), || async {});
        assert!(handle.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_task_ticks_until_shutdown() {
        let ticks = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();
        let counter = ticks.clone();
        let handle = spawn_periodic("count", Duration::from_secs(10), token.clone(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

        // First tick fires immediately, then at 10s and 20s.
        tokio::time::sleep(Duration::from_secs(25)).await;
        token.cancel();
        handle.await.unwrap();
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }
}

//! Main application orchestration.
//!
//! Wires the components together:
//! - Tracked-symbol selection (explicit pairs, discovery or defaults)
//! - Upstream feed connector feeding the tracker registry
//! - Fan-out from the feed event bus to downstream subscribers
//! - Gateway server (REST snapshots + downstream WebSocket)
//! - Periodic statistics logging
//!
//! Upstream exhaustion does not stop the process: the gateway keeps serving
//! last-known medians until a shutdown signal arrives.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use medtrack_core::Symbol;
use medtrack_feed::{FeedError, FeedEventBus, TrackerRegistry, UpstreamFeedConnector};
use medtrack_gateway::{run_fanout, serve, AppState, SubscriptionBroadcaster};
use medtrack_registry::{resolve_symbols, ExchangeInfoClient, RegistryError};
use medtrack_ws::ConnectionState;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    registry: Arc<TrackerRegistry>,
    bus: FeedEventBus,
    broadcaster: Arc<SubscriptionBroadcaster>,
    shutdown: CancellationToken,
}

impl Application {
    /// Resolve the tracked set and build the application.
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        let client = ExchangeInfoClient::new(config.symbols.exchange_info_url.clone())?;
        let symbols = resolve_symbols(&client, &config.symbols.selection_policy()).await;
        Self::from_symbols(config, symbols)
    }

    /// Build the application for a fixed tracked set.
    pub fn from_symbols(config: AppConfig, symbols: Vec<Symbol>) -> AppResult<Self> {
        if symbols.is_empty() {
            return Err(RegistryError::NoSymbols("tracked set is empty".to_string()).into());
        }

        let registry = Arc::new(TrackerRegistry::with_symbols(symbols));
        let bus = FeedEventBus::new(config.feed.channel_capacity);
        let broadcaster = Arc::new(SubscriptionBroadcaster::new(Arc::clone(&registry)));

        info!(
            environment = %config.environment,
            pairs = ?registry.symbols(),
            "Application initialized"
        );

        Ok(Self {
            config,
            registry,
            bus,
            broadcaster,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TrackerRegistry> {
        &self.registry
    }

    /// Token cancelled when the application shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Bind the configured port and run until SIGINT or SIGTERM.
    pub async fn run(self) -> AppResult<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.gateway.port));
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "Gateway listening (REST + WebSocket)");
        self.run_with(listener, wait_for_signal()).await
    }

    /// Run on an already-bound listener until `shutdown_signal` resolves.
    pub async fn run_with<F>(self, listener: TcpListener, shutdown_signal: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        // Subscribe before the connector starts so no update is missed.
        let fanout_rx = self.bus.subscribe();

        let connector = UpstreamFeedConnector::new(
            self.config.feed.connection_config(),
            Arc::clone(&self.registry),
            self.bus.clone(),
            self.config.feed.channel_capacity,
        );
        let connection = connector.connection();
        let feed_state = connector.subscribe_state();

        let state = AppState::new(
            Arc::clone(&self.broadcaster),
            feed_state.clone(),
            self.config.gateway.clone(),
            self.config.environment.clone(),
            self.shutdown.clone(),
        );

        let mut feed_task = tokio::spawn(connector.run());
        let fanout_task = tokio::spawn(run_fanout(
            Arc::clone(&self.broadcaster),
            fanout_rx,
            self.shutdown.clone(),
        ));
        let mut gateway_task = tokio::spawn(serve(listener, state));

        let mut stats_interval =
            tokio::time::interval(Duration::from_secs(self.config.stats_interval_secs));
        // First tick completes immediately.
        stats_interval.tick().await;

        tokio::pin!(shutdown_signal);
        let mut feed_done = false;
        let mut gateway_exit = None;

        info!("Application running");

        loop {
            tokio::select! {
                () = &mut shutdown_signal => {
                    info!("Shutdown signal received");
                    break;
                }
                joined = &mut feed_task, if !feed_done => {
                    feed_done = true;
                    match joined {
                        Ok(Ok(())) => info!("Upstream feed stopped"),
                        Ok(Err(FeedError::Exhausted { attempts })) => {
                            error!(
                                attempts,
                                "Upstream feed exhausted, serving last-known medians"
                            );
                        }
                        Ok(Err(e)) => error!(error = %e, "Upstream feed failed"),
                        Err(e) => error!(error = %e, "Upstream feed task failed"),
                    }
                }
                joined = &mut gateway_task => {
                    error!("Gateway server exited");
                    gateway_exit = Some(joined);
                    break;
                }
                _ = stats_interval.tick() => {
                    self.log_stats(&feed_state);
                }
            }
        }

        self.shutdown.cancel();
        connection.shutdown();

        let grace_secs = self.config.shutdown_grace_secs;
        let drain = async move {
            if !feed_done {
                if let Ok(Err(e)) = feed_task.await {
                    warn!(error = %e, "Upstream feed ended with error during shutdown");
                }
            }
            if let Err(e) = fanout_task.await {
                warn!(error = %e, "Fan-out task failed");
            }
            match gateway_exit {
                Some(joined) => joined,
                None => gateway_task.await,
            }
        };

        let gateway_result = tokio::time::timeout(Duration::from_secs(grace_secs), drain)
            .await
            .map_err(|_| {
                error!(grace_secs, "Shutdown timed out");
                AppError::ShutdownTimeout { grace_secs }
            })?;

        match gateway_result {
            Ok(Ok(())) => {
                info!("Shutdown complete");
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(AppError::TaskFailed(e.to_string())),
        }
    }

    fn log_stats(&self, feed_state: &watch::Receiver<ConnectionState>) {
        let snapshots = self.registry.snapshot_all();
        let total_trades: u64 = snapshots.iter().map(|s| s.observation_count()).sum();

        info!(
            feed = feed_state.borrow().as_str(),
            connections = self.broadcaster.connection_count(),
            pairs = snapshots.len(),
            total_trades,
            "Median tracker stats"
        );

        for snapshot in snapshots.iter() {
            info!(
                pair = %snapshot.pair,
                count = snapshot.observation_count(),
                median = ?snapshot.median,
                "Pair stats"
            );
        }
    }
}

/// Wait for SIGINT or SIGTERM.
///
/// A handler that cannot be installed never resolves, leaving the other one
/// in charge.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, initiating shutdown"),
        () = terminate => info!("Received SIGTERM, initiating shutdown"),
    }
}

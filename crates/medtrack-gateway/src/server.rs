//! HTTP server implementation using axum.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use medtrack_feed::TrackerRegistry;
use medtrack_telemetry::Metrics;
use medtrack_ws::ConnectionState;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::broadcast::SubscriptionBroadcaster;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::session::{run_session, SessionSettings};
use crate::types::{
    HealthResponse, MedianListResponse, MedianResponse, PairNotFoundResponse, PairStats,
    StatsResponse,
};

/// Caps concurrent downstream WebSocket sessions.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Claim a slot; the slot is released when the guard drops.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }
}

pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    registry: Arc<TrackerRegistry>,
    broadcaster: Arc<SubscriptionBroadcaster>,
    connection_limiter: Arc<ConnectionLimiter>,
    feed_state: watch::Receiver<ConnectionState>,
    config: GatewayConfig,
    environment: String,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        broadcaster: Arc<SubscriptionBroadcaster>,
        feed_state: watch::Receiver<ConnectionState>,
        config: GatewayConfig,
        environment: impl Into<String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry: Arc::clone(broadcaster.registry()),
            broadcaster,
            connection_limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
            feed_state,
            config,
            environment: environment.into(),
            shutdown,
        }
    }

    fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

/// CORS policy for the configured origin.
///
/// `*` allows any origin without credentials; browsers reject credentialed
/// wildcard responses and tower-http refuses to build them.
fn cors_layer(cors_origin: &str) -> GatewayResult<CorsLayer> {
    let cors = CorsLayer::new().allow_methods([Method::GET]);
    if cors_origin.trim() == "*" {
        return Ok(cors.allow_origin(AllowOrigin::any()));
    }

    let origin: HeaderValue = cors_origin
        .parse()
        .map_err(|_| GatewayError::Config(format!("invalid CORS origin: {cors_origin}")))?;
    Ok(cors.allow_origin(origin).allow_credentials(true))
}

/// Create the axum router.
pub fn create_router(state: AppState) -> GatewayResult<Router> {
    let cors = cors_layer(&state.config.cors_origin)?;

    let trace = state.is_development();
    let router = Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/median", get(get_all_medians))
        .route("/median/stats/all", get(get_stats))
        .route("/median/{pair}", get(get_median))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(cors)
        .with_state(state);

    Ok(if trace {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    })
}

async fn get_all_medians(State(state): State<AppState>) -> Json<MedianListResponse> {
    let data = state.registry.snapshot_all();
    Json(MedianListResponse {
        success: true,
        count: data.len(),
        data,
    })
}

async fn get_median(State(state): State<AppState>, Path(pair): Path<String>) -> Response {
    match state.registry.snapshot(&pair.to_lowercase()) {
        Some(data) => Json(MedianResponse {
            success: true,
            data,
        })
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(PairNotFoundResponse::new(&pair, state.registry.symbols())),
        )
            .into_response(),
    }
}

async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let data = state
        .registry
        .snapshot_all()
        .iter()
        .map(PairStats::from)
        .collect();
    Json(StatsResponse {
        success: true,
        data,
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let feed = *state.feed_state.borrow();
    Json(HealthResponse {
        status: if feed.is_terminal() { "degraded" } else { "ok" },
        environment: state.environment.clone(),
        pairs: state.registry.symbols(),
        feed: feed.as_str(),
        connections: state.broadcaster.connection_count(),
        timestamp: Utc::now(),
    })
}

async fn metrics() -> Response {
    match Metrics::encode() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let Some(guard) = state.connection_limiter.try_acquire() else {
        warn!(
            current = state.connection_limiter.current_count(),
            max = state.config.max_connections,
            "WebSocket connection limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    let settings = SessionSettings {
        heartbeat_interval: Duration::from_millis(state.config.heartbeat_interval_ms),
        queue_capacity: state.config.outbound_queue_capacity,
    };
    let broadcaster = Arc::clone(&state.broadcaster);
    let shutdown = state.shutdown.clone();

    ws.on_upgrade(move |socket| async move {
        let _guard = guard;
        run_session(socket, broadcaster, settings, shutdown).await;
    })
}

/// Serve on an already-bound listener until `shutdown` is cancelled.
pub async fn serve(listener: TcpListener, state: AppState) -> GatewayResult<()> {
    let shutdown = state.shutdown.clone();
    let app = create_router(state)?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Gateway server stopped");
    Ok(())
}

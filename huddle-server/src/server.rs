//! Router assembly and process startup.

use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Extension, Router,
    http::{HeaderValue, Method},
    routing::{get, get_service},
};
use metrics_exporter_prometheus::PrometheusHandle;
use shared::config::server::{Config, CorsConfig, DatabaseConfig};
use sqlx::{Executor, PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
};
use tracing::{info, warn};

use crate::{
    app_state::AppState,
    db::bootstrap,
    handlers,
    middleware::{identity, request_context},
    routes,
    services::activity_reconciler,
    store::MemoryStore,
    telemetry, tracer,
};

pub use crate::telemetry::metrics_handle;

/// Opens the PostgreSQL pool; each new connection applies the configured statement timeout.
///
/// # Errors
/// Returns the driver error when no connection can be established.
pub async fn connect(db: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let timeout_ms = db.statement_timeout_ms;
    PgPoolOptions::new()
        .max_connections(db.max_connections)
        .after_connect(move |conn, _| {
            Box::pin(async move {
                conn.execute(format!("SET statement_timeout = {timeout_ms}").as_str())
                    .await?;
                Ok(())
            })
        })
        .connect(&db.url)
        .await
}

fn cors(settings: &CorsConfig) -> CorsLayer {
    let origins = if settings.allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            settings
                .allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        // Credentials are only legal with an explicit origin list.
        .allow_credentials(settings.allow_credentials && !settings.allowed_origins.is_empty())
        .max_age(Duration::from_secs(settings.max_age_seconds))
}

/// Serves the built web client; unknown paths get `index.html` so client-side routes resolve.
fn web_client<S>(static_dir: &Path, spa_index: &Path) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let assets = ServeDir::new(static_dir)
        .append_index_html_on_directories(true)
        .fallback(get_service(ServeFile::new(spa_index)));
    Router::new().fallback_service(assets)
}

/// `/api/*`: every matched route needs a caller identity.
fn chat_api(config: &Config) -> Router<Arc<AppState>> {
    Router::new()
        .merge(handlers::conversations::routes())
        .merge(handlers::messages::routes())
        .merge(handlers::streaming::routes())
        .route_layer(axum::middleware::from_fn_with_state(
            identity::IdentityState::from_config(config),
            identity::require_identity,
        ))
}

/// The complete HTTP surface: chat API, health checks, metrics, API docs and the web client.
pub fn create_app_router(
    state: Arc<AppState>,
    config: Arc<Config>,
    metrics: PrometheusHandle,
) -> Router {
    Router::new()
        .merge(chat_api(&config))
        .merge(routes::health::create_health_router())
        .merge(routes::openapi::openapi_routes())
        .route("/metrics", get(telemetry::scrape))
        .merge(web_client(&config.web.static_dir, &config.web.spa_index))
        // Chat handlers extract the state as an extension.
        .layer(Extension(Arc::clone(&state)))
        .layer(Extension(metrics))
        .layer(Extension(Arc::clone(&config)))
        .layer(cors(&config.server.cors))
        .layer(tracer::create_trace_layer())
        // Outermost, so the trace span already sees the request id.
        .layer(axum::middleware::from_fn_with_state(
            request_context::RequestIdState::from_config(&config),
            request_context::assign_request_id,
        ))
        .with_state(state)
}

/// Builds the store: PostgreSQL bootstrapped from `db.bootstrap_path`, or process memory.
///
/// # Errors
/// Fails when the database cannot be reached or a bootstrap script fails.
pub async fn create_app_state(config: &Config, in_memory: bool) -> anyhow::Result<Arc<AppState>> {
    if in_memory {
        warn!("serving from the in-memory store; nothing survives a restart");
        let store = Arc::new(MemoryStore::new());
        return Ok(Arc::new(AppState::in_memory(store, config)));
    }

    let pool = connect(&config.db)
        .await
        .with_context(|| format!("cannot connect to {}", redact(&config.db.url)))?;
    bootstrap::ensure_liveness(&pool)
        .await
        .context("database is not answering")?;
    bootstrap::run(&pool, &config.db).await?;
    bootstrap::ensure_readiness(&pool)
        .await
        .context("chat tables are missing after bootstrap")?;
    Ok(Arc::new(AppState::with_postgres(pool, config)))
}

/// Drops the password from a connection URL before it reaches a log line or error.
fn redact(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            // Only cannot-be-a-base URLs reject a password, and those never carry one.
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<unparseable database url>".to_string(),
    }
}

/// Completes on CTRL+C or when `shutdown` is cancelled, then cancels `shutdown` for everyone else.
pub async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("interrupt received"),
            Err(err) => {
                warn!(error = %err, "cannot listen for CTRL+C; waiting for cancellation");
                shutdown.cancelled().await;
            }
        },
        () = shutdown.cancelled() => {}
    }
    info!("shutting down");
    shutdown.cancel();
}

/// Serves until shutdown, running the last-activity reconciler alongside.
///
/// # Errors
/// Fails when the store cannot be prepared or the port cannot be bound.
pub async fn run(config: Config, in_memory: bool) -> anyhow::Result<()> {
    telemetry::init_logging(&config);
    info!(profile = ?config.profile, port = config.server.port, "starting huddle server");

    let config = Arc::new(config);
    let metrics = telemetry::metrics_handle();
    let state = create_app_state(&config, in_memory).await?;

    let shutdown = CancellationToken::new();
    let reconciler = activity_reconciler::spawn(
        Arc::clone(&state.conversations),
        Duration::from_secs(config.activity.reconcile_interval_seconds),
        shutdown.child_token(),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!(%addr, "listening");

    let app = create_app_router(state, config, metrics);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Some(task) = reconciler {
        if let Err(err) = task.await {
            warn!(error = %err, "activity reconciler did not stop cleanly");
        }
    }
    Ok(())
}

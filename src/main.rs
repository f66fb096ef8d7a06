use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use clickhouse::Client;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use wardragon_aggregator::config::AggregatorConfig;
use wardragon_aggregator::config_db::ConfigDb;
use wardragon_aggregator::storage::StorageWriter;
use wardragon_aggregator::{collector, handlers, migrations, retention_enforcer, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("wardragon_aggregator=debug,tower_http=debug")),
        )
        .init();

    let config_path = std::env::var("KITS_CONFIG").unwrap_or_else(|_| "./kits.toml".to_string());
    let config = AggregatorConfig::load(&config_path)?;

    let clickhouse_url =
        std::env::var("CLICKHOUSE_URL").unwrap_or_else(|_| "http://localhost:8123".to_string());
    let clickhouse_user = std::env::var("CLICKHOUSE_USER").unwrap_or_else(|_| "default".to_string());
    let clickhouse_password = std::env::var("CLICKHOUSE_PASSWORD").unwrap_or_default();
    let clickhouse_database =
        std::env::var("CLICKHOUSE_DATABASE").unwrap_or_else(|_| "wardragon".to_string());

    let ch = Client::default()
        .with_url(&clickhouse_url)
        .with_user(&clickhouse_user)
        .with_password(&clickhouse_password)
        .with_database(&clickhouse_database);

    migrations::run(&ch, &config.retention, &clickhouse_database).await?;

    let registry_db_path = std::env::var("REGISTRY_DB").unwrap_or_else(|_| "./registry.db".to_string());
    let config_db = Arc::new(ConfigDb::open(&registry_db_path)?);
    tracing::info!("kit registry opened at {registry_db_path}");

    let seeded = config_db.reload_from_config(&config.kits)?;
    tracing::info!("seeded {seeded} kit(s) from {config_path}");

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.collector.request_timeout_secs))
        .build()?;

    let writer = StorageWriter::new(ch.clone());

    retention_enforcer::spawn_retention_enforcer(ch.clone(), config.retention.clone());

    let collector_handle = collector::spawn(
        http_client.clone(),
        config.collector.clone(),
        writer.clone(),
        config_db.clone(),
    );

    let state = AppState {
        ch,
        config_db,
        writer,
        http_client,
    };

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/kits", get(handlers::kits::list_kits))
        .route("/api/drones", get(handlers::drones::list_drones))
        .route("/api/signals", get(handlers::signals::list_signals))
        .route("/api/export/csv", get(handlers::export::export_csv))
        .route(
            "/api/patterns/repeated-drones",
            get(handlers::patterns::repeated_drones),
        )
        .route("/api/patterns/coordinated", get(handlers::patterns::coordinated))
        .route("/api/patterns/pilot-reuse", get(handlers::patterns::pilot_reuse))
        .route("/api/patterns/anomalies", get(handlers::patterns::anomalies))
        .route("/api/patterns/multi-kit", get(handlers::patterns::multi_kit))
        .route("/api/admin/kits", post(handlers::admin::add_kit))
        .route("/api/admin/kits/{kit_id}", delete(handlers::admin::remove_kit))
        .route("/api/admin/kits/test", post(handlers::admin::test_kit))
        .with_state(state);

    let allowed_origins: Vec<String> = std::env::var("CORS_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    let app = if allowed_origins.is_empty() {
        tracing::warn!("no CORS origins configured - CORS disabled (same-origin only)");
        app
    } else {
        let origins: Vec<HeaderValue> = allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();
        app.layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers(Any),
        )
    };

    let app = app.layer(TraceLayer::new_for_http());

    let http_port: u16 = std::env::var("HTTP_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8090);
    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    tracing::info!("wardragon-aggregator listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = shutdown_signal();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            collector_handle.shutdown();
            collector_handle.join().await;
        })
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {},
                _ = sigterm.recv() => {},
            }
        }
        Err(err) => {
            tracing::warn!("failed to install SIGTERM handler (CTRL-C only): {err}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
    tracing::info!("shutdown signal received");
}

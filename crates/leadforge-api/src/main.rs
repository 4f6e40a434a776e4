//! leadforge-api - HTTP API server for leadforge

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leadforge_api::services::{run_workflow_dispatcher, telemetry_mirror};
use leadforge_api::{build_router, AppConfig, AppState};
use leadforge_core::defaults::SESSION_PURGE_AFTER_DAYS;
use leadforge_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // LOG_FORMAT  - "json" or "text" (default: "text")
    // LOG_FILE    - path to log file, enables daily-rotated file logging
    // LOG_ANSI    - "true"/"false" override ANSI colors
    // RUST_LOG    - env filter (default: "leadforge_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "leadforge_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("leadforge-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = AppConfig::from_env()?;
    info!(
        rate_limit_enabled = config.rate_limit_enabled,
        rate_limit_requests = config.rate_limit_requests,
        rate_limit_period_secs = config.rate_limit_period_secs,
        relay_enabled = config.relay_enabled,
        "Configuration loaded"
    );

    info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;
    info!("Database connected");

    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    match db.sessions.purge_expired(SESSION_PURGE_AFTER_DAYS).await {
        Ok(0) => {}
        Ok(purged) => info!(purged, "Purged expired sessions"),
        Err(e) => warn!(error = %e, "Failed to purge expired sessions"),
    }

    let state = AppState::new(db, &config)?;

    tokio::spawn(telemetry_mirror(state.events.clone()));
    if state.relay.is_enabled() {
        tokio::spawn(run_workflow_dispatcher(
            state.events.clone(),
            state.relay.clone(),
        ));
        info!("Workflow dispatcher started");
    } else {
        info!("Workflow relay disabled; events will not be forwarded");
    }

    let app = build_router(state, &config);

    let addr = config.bind_addr();
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

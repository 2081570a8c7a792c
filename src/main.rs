// Main entry point for the camp registration service

use camp_registration::api::{create_router, AppState};
use camp_registration::auth::AdminGate;
use camp_registration::config::Config;
use camp_registration::state::RedisStore;

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load and validate configuration first (before any logging)
    let config = Config::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!(e)
    })?;

    // 2. Initialize tracing subscriber with config values
    // Must be done only once - tracing panics if init() is called multiple times
    init_tracing(&config)?;

    info!("Starting camp registration service");

    info!(
        bind_address = %config.bind_address,
        port = config.port,
        "Configuration loaded"
    );

    // 3. Initialize the Redis-backed stores (one connection, three seams)
    let store = Arc::new(
        RedisStore::new(
            &config.redis_url,
            config.redis_connection_timeout_secs,
            config.redis_operation_timeout_secs,
        )
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to initialize Redis store");
            anyhow::anyhow!(e)
        })?,
    );

    info!("Redis store initialized");

    // 4. Initialize the admin gate
    let admin_gate = Arc::new(AdminGate::new(config.admin_key.clone()));
    if admin_gate.is_configured() {
        info!("Admin gate initialized");
    } else {
        warn!("ADMIN_KEY not set; admin endpoints will answer 404 for every credential");
    }

    // 5. Create AppState
    let app_state = AppState {
        registrations: store.clone(),
        full_records: store.clone(),
        receipts: store,
        admin_gate,
        config: Arc::new(config.clone()),
    };

    // 6. Create router
    let router = create_router(&app_state).with_state(app_state);

    info!("Router created");

    // 7. Start HTTP server
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind to address");
        e
    })?;

    info!(addr = %addr, "Server listening on {}", addr);

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = %e, "Server error");
            e
        })?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber based on configuration
fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    // Create filter from RUST_LOG env var or config
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_env_filter(filter);

    if config.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            info!("SIGTERM received, starting graceful shutdown");
        },
    }
}

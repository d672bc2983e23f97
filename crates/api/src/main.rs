use std::net::SocketAddr;
use std::sync::Arc;

use nm_api::config::ServerConfig;
use nm_api::router::build_app_router;
use nm_api::state::AppState;
use nm_db::store::PgStore;
use nm_library::LibraryConfig;
use nm_pipeline::CharacterLibraryService;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nm_api=debug,nm_pipeline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let library_config = LibraryConfig::from_env();
    tracing::info!(
        base_url = %library_config.base_url,
        timeout_ms = library_config.timeout.as_millis() as u64,
        retry_attempts = library_config.retry_attempts,
        max_retries = library_config.max_retries,
        "Loaded character library configuration",
    );

    // --- Database ---
    let database_url = config
        .database_url
        .clone()
        .expect("DATABASE_URL must be set");

    let pool = nm_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    nm_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    nm_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Character library ---
    let store = Arc::new(PgStore::new(pool.clone()));
    let library = Arc::new(CharacterLibraryService::from_config(
        &library_config,
        store.clone(),
        store,
    ));

    let startup_health = library.check_health().await;
    if startup_health.is_healthy {
        tracing::info!(
            response_time_ms = startup_health.response_time_ms,
            "Character library reachable",
        );
    } else {
        tracing::warn!(
            error = ?startup_health.error,
            "Character library unreachable at start-up; requests will fail until it recovers",
        );
    }

    // --- App state ---
    let state = AppState {
        pool: Some(pool),
        config: Arc::new(config.clone()),
        library,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

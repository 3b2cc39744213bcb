use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imperium_api::background::session_janitor;
use imperium_api::config::ServerConfig;
use imperium_api::router::build_app_router;
use imperium_api::state::AppState;
use imperium_db::DbPool;

/// How long shutdown waits for the janitor to finish an in-flight sweep.
const JANITOR_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let pool = prepare_database().await;
    let state = AppState::new(pool.clone(), config.clone());

    let janitor_cancel = CancellationToken::new();
    let janitor = spawn_janitor(pool, &state, &config, janitor_cancel.clone());

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    let app = build_app_router(state, &config);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!(%addr, "Imperium API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped accepting connections");
    janitor_cancel.cancel();
    if tokio::time::timeout(JANITOR_SHUTDOWN_GRACE, janitor).await.is_err() {
        tracing::warn!("Session janitor did not stop in time");
    }
    tracing::info!("Graceful shutdown complete");
}

/// `RUST_LOG` wins; otherwise debug for this crate and tower-http.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imperium_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Connect, health-check and migrate. Any failure aborts startup.
async fn prepare_database() -> DbPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = imperium_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    imperium_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    imperium_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database ready (connected, healthy, migrated)");
    pool
}

fn spawn_janitor(
    pool: DbPool,
    state: &AppState,
    config: &ServerConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(session_janitor::run(
        pool,
        Arc::clone(&state.sessions),
        Duration::from_secs(config.session_janitor_interval_secs),
        cancel,
    ))
}

/// Resolve on SIGINT, or SIGTERM on Unix.
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
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

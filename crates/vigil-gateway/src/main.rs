//! vigil gateway binary.
//!
//! Startup: config (file + env) → fan-out logger for the profile → tracing
//! bridge → router → serve until Ctrl-C / SIGTERM → drain and flush sinks.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vigil_gateway::obs::logger::SHUTDOWN_GRACE;
use vigil_gateway::obs::{FanoutLogger, SinkLayer};
use vigil_gateway::{app_state::AppState, config, router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cfg = config::load_from_env()?;
    let listen = cfg.server.listen_addr()?;
    let profile = cfg.environment;

    let logger = Arc::new(FanoutLogger::from_config(&cfg).await?);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(profile.default_directives()));
    tracing_subscriber::registry()
        .with(filter)
        .with(SinkLayer::new(Arc::clone(&logger)))
        .try_init()?;

    let state = AppState::new(cfg, Arc::clone(&logger));
    // Business routes are mounted by embedders; the bare binary serves ops only.
    let app = router::build_router(state, Router::new());

    let listener = tokio::net::TcpListener::bind(listen).await?;
    tracing::info!("Server running on {listen} in {profile} mode");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    match &served {
        Ok(()) => tracing::info!("Process terminated"),
        Err(e) => tracing::error!(error = %e, "server failed"),
    }

    if tokio::time::timeout(SHUTDOWN_GRACE, logger.shutdown())
        .await
        .is_err()
    {
        eprintln!("log sinks did not flush within {SHUTDOWN_GRACE:?}");
    }

    served.map_err(Into::into)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

//! Identity Gateway
//!
//! Entry point for the identity translation gateway.
//! Verifies end-user tokens and forwards requests to the backend under the
//! gateway's own service identity.

use identity_gateway::config::{load_config, InvalidConfig, LoggingConfig, RawEnvironment};
use identity_gateway::logging::init_logging;
use identity_gateway::routes;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration is read once; logging needs it before anything is reported
    let env = RawEnvironment::from_process();
    let loaded = load_config(&env);

    let logging = match &loaded {
        Ok((config, _)) => config.logging().clone(),
        Err(_) => LoggingConfig::default(),
    };
    init_logging(&logging)?;

    info!("Starting Identity Gateway");

    let (config, warnings) = loaded.map_err(|e| {
        if let InvalidConfig::Rejected { errors, warnings } = &e {
            for warning in warnings {
                warn!(target: "gw.config", field = %warning.field, "{}", warning.message);
            }
            for err in errors {
                error!(target: "gw.config", field = %err.field, "{}", err.reason);
            }
        }
        error!(target: "gw.config", "Failed to load configuration: {}", e);
        e
    })?;

    for warning in &warnings {
        warn!(target: "gw.config", field = %warning.field, "{}", warning.message);
    }

    let base = config.base();
    info!(
        target: "gw.config",
        environment = %config.environment(),
        port = base.port,
        backend_target_url = %base.backend_target_url,
        backend_audience = %base.backend_audience,
        skip_verification = config.skip_verification(),
        skip_auth = config.skip_auth(),
        "Configuration loaded successfully"
    );

    let app = routes::build_app(&config).map_err(|e| {
        error!("Failed to initialize identity translation: {}", e);
        e
    })?;

    let addr = SocketAddr::from(([0, 0, 0, 0], base.port));
    info!("Identity Gateway listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Identity Gateway shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

//! Rota Session Probe - Entry Point
//!
//! Bootstraps the rotation controller from the configured pool provider and
//! fetches the probe targets through it, with graceful shutdown support.

use anyhow::Context;
use http::HeaderName;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rota_session::config::LogConfig;
use rota_session::probe::Probe;
use rota_session::{Config, RotationController};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("failed to load configuration")?;

    // Initialize tracing
    init_tracing(&config.log);
    info!("Starting rota-session probe");

    // Fetch the proxy pool; a failed fetch is a fatal configuration error
    let controller = RotationController::from_config(&config.rotation)
        .await
        .context("failed to initialize proxy rotation")?;
    if controller.is_enabled() {
        info!("Loaded {} proxy endpoints", controller.pool_size());
    } else {
        warn!("Proxy rotation disabled, probing targets directly");
    }

    let session_header = HeaderName::from_bytes(config.rotation.session_header.as_bytes())
        .context("invalid session header")?;
    let probe = Probe::new(controller.into_shared(), session_header, config.probe.clone());

    tokio::select! {
        reports = probe.run() => {
            let succeeded = reports
                .iter()
                .filter(|r| r.status.map(|s| s < 400).unwrap_or(false))
                .count();
            for report in &reports {
                match (&report.status, &report.error) {
                    (Some(status), _) => info!(
                        url = %report.url,
                        status,
                        attempts = report.attempts,
                        rotations = report.rotations,
                        "Probe result"
                    ),
                    (None, Some(err)) => error!(url = %report.url, "Probe failed: {}", err),
                    (None, None) => error!(url = %report.url, "Probe produced no response"),
                }
            }
            info!("{}/{} probe targets succeeded", succeeded, reports.len());
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("rota-session probe stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rota_session={}", log.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
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
}

//! Gatekeeper: authentication and authorization core.
//!
//! Loads configuration, connects the credential store and cache, seeds the
//! bootstrap superadmin, and stays up until interrupted.

use tracing_subscriber::{EnvFilter, fmt};

use gatekeeper::AuthRuntime;
use gatekeeper_core::config::AppConfig;
use gatekeeper_core::error::AppError;

#[tokio::main]
async fn main() {
    let env = std::env::var("GATEKEEPER_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env).and_then(|c| {
        c.validate_for_environment(&env)?;
        Ok(c)
    }) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config, &env).await {
        tracing::error!(error = %e, "Gatekeeper failed");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig, env: &str) -> Result<(), AppError> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        env,
        backend = %config.database.backend,
        "Starting Gatekeeper"
    );

    let runtime = AuthRuntime::build(&config).await?;
    runtime.bootstrap(&config).await?;

    tracing::info!("Gatekeeper ready");
    shutdown_signal().await;

    tracing::info!("Shutdown signal received");
    runtime.shutdown().await;
    tracing::info!("Gatekeeper shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
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

// src/main.rs
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod config;
mod error;
mod handlers;
mod ingest;
mod reference;
mod spreadsheet;
mod statistics;
mod store;
mod timesheet;

#[cfg(test)]
mod auth_tests;
#[cfg(test)]
mod statistics_tests;
#[cfg(test)]
mod test_support;

use auth::UserStore;
use config::{AppConfig, Cli};
use error::AppError;
use handlers::{build_router, AppState};
use store::JsonStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- Initialize Logging ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting timesheet statistics server");

    // --- Load Configuration ---
    let config = AppConfig::from_env()
        .context("Failed to read configuration from the environment")?
        .with_overrides(cli);
    info!(
        "Configuration loaded. Data directory: {}, team scope: '{}'",
        config.data_dir.display(),
        config.team_scope
    );

    // --- Prepare Record Store ---
    let store = JsonStore::new(config.data_dir.clone());
    store
        .bootstrap()
        .with_context(|| format!("Failed to prepare data directory {}", config.data_dir.display()))?;
    let users = UserStore::load(store.clone()).context("Failed to load registered users")?;

    let tls_paths = config
        .tls_paths()
        .map(|(cert, key)| (PathBuf::from(cert), PathBuf::from(key)));
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", config.bind_address()))?;

    let state = AppState::new(config, store, users);
    let app = build_router(state);

    // --- Run Web Server ---
    match tls_paths {
        Some((cert_path, key_path)) => {
            let tls_config = match RustlsConfig::from_pem_file(&cert_path, &key_path).await {
                Ok(tls_config) => tls_config,
                Err(e) => {
                    let err_msg = format!("Failed to load TLS cert/key: {}", e);
                    error!("{}", err_msg);
                    return Err(AppError::TlsConfig(err_msg).into());
                }
            };
            info!(
                "TLS configuration loaded from {} and {}",
                cert_path.display(),
                key_path.display()
            );
            info!("Starting server on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server terminated unexpectedly")?;
        }
        None => {
            warn!("CERT_PATH/KEY_PATH not set, serving plain HTTP");
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("Listening on http://{}", addr);
            axum::serve(listener, app)
                .await
                .context("HTTP server terminated unexpectedly")?;
        }
    }

    Ok(())
}

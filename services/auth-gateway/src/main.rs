//! PKCE Auth Gateway
//!
//! Single-binary Rust service that:
//! 1. Redirects browsers to the identity provider with a PKCE challenge
//! 2. Exchanges the returned code and seals the refresh token in a cookie
//! 3. Serves the signed-in user's profile from that cookie alone
//! 4. Optionally exposes /health and /metrics on a separate admin port

mod admin;
mod config;
mod error;
mod flow;
mod metrics;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::admin::{AdminState, build_admin_router};
use crate::config::Config;
use crate::metrics::GatewayMetrics;
use crate::routes::{GatewayState, build_router};

/// How long in-flight requests get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs; LOG_LEVEL wins over RUST_LOG
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting pkce-auth-gateway");

    let prometheus = metrics::install_recorder()?;

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.listen_addr,
        admin_listen_addr = ?config.admin_listen_addr,
        app_origin = %config.flow.app_origin,
        client_id = %config.flow.oauth.client_id,
        credential_cookie = %config.flow.credential_cookie,
        "configuration loaded"
    );

    let gateway_metrics = GatewayMetrics::new();
    let state = GatewayState {
        flow: Arc::new(config.flow),
        http: reqwest::Client::new(),
        metrics: gateway_metrics.clone(),
    };
    let app = build_router(state, config.max_connections);

    let admin_handle = match config.admin_listen_addr {
        Some(addr) => {
            let admin_app = build_admin_router(AdminState {
                metrics: gateway_metrics,
                prometheus,
            });
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind admin listener to {addr}"))?;
            info!(addr = %addr, "admin listener ready");
            Some(tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, admin_app).await {
                    error!(error = %e, "admin listener failed");
                }
            }))
        }
        None => None,
    };

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "accepting requests");

    // The drain timer starts at signal receipt, not at server start: the
    // server is told to drain first, then raced against DRAIN_TIMEOUT.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    if let Some(handle) = admin_handle {
        handle.abort();
    }

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

//! `sig-gateway` — a reverse-proxy gateway that authenticates autonomous
//! agents via HTTP message signatures before forwarding requests to a
//! merchant origin.
//!
//! # Quick start
//!
//! ```sh
//! # Defaults: listens on :3001, expects a registry on :4000 and upstreams
//! # on :5000 (/api*) and :5001 (everything else).
//! sig-gateway
//!
//! # Pointed at real services:
//! REGISTRY_URL=https://keys.example.com \
//! API_UPSTREAM_URL=https://api.merchant.example \
//! APP_UPSTREAM_URL=https://merchant.example \
//! sig-gateway
//! ```
//!
//! # Environment variables
//!
//! See [`sig_gateway::config::GatewayConfig::from_env`] for the full list.

use std::time::Duration;

use sig_gateway::config::GatewayConfig;
use sig_gateway::replay::run_sweep_loop;
use sig_gateway::router::{build_router, AppState};

#[tokio::main]
async fn main() {
    let config = GatewayConfig::from_env();

    let default_filter = if config.debug {
        "sig_gateway=debug,tower_http=debug"
    } else {
        "sig_gateway=info,tower_http=debug"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    tracing::info!(
        registry_url = %config.registry_url,
        api_upstream_url = %config.api_upstream_url,
        app_upstream_url = %config.app_upstream_url,
        "starting sig-gateway"
    );

    let state = AppState::new(config.clone());

    // Spawn the background replay-guard sweep loop.
    {
        let replay_guard = state.replay_guard.clone();
        tracing::info!("replay guard: sweep loop starting (interval = 60s)");
        tokio::spawn(async move {
            run_sweep_loop(replay_guard, Duration::from_secs(60)).await;
        });
    }

    let app = build_router(state);

    tracing::info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {e}", config.bind_addr));

    axum::serve(listener, app).await.expect("server error");
}

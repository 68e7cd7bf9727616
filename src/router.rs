//! Assembles the Axum [`Router`] (spec §3 ADDED `AppState`, §4.6).

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::gate::{is_gated, run_pipeline, GateRequest};
use crate::proxy::{forward, select_upstream};
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::registry::KeyCache;
use crate::replay::ReplayGuard;
use crate::security_headers::security_headers_middleware;

/// Shared application state threaded through every handler via axum's
/// `State` extractor (spec §3 ADDED).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub key_cache: Arc<KeyCache>,
    pub replay_guard: Arc<ReplayGuard>,
    pub upstream_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client for handler state");

        let key_cache = Arc::new(KeyCache::new(
            config.registry_url.clone(),
            config.cache_ttl,
            http_client.clone(),
        ));
        let replay_guard = Arc::new(ReplayGuard::new(config.nonce_ttl));

        Self {
            config: Arc::new(config),
            key_cache,
            replay_guard,
            upstream_client: http_client,
        }
    }
}

/// Build the complete application router with shared state.
pub fn build_router(state: AppState) -> Router {
    let rate_limiter = Arc::new(RateLimiter::new(state.config.rate_limit_per_minute));

    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(axum::middleware::from_fn(move |req, next| {
            rate_limit_middleware(Arc::clone(&rate_limiter), req, next)
        }))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Single entry point for every path: gate-and-verify, then proxy (spec §4.6).
async fn dispatch(State(state): State<AppState>, req: Request) -> Response {
    let path = req.uri().path().to_string();

    if is_gated(&path) {
        let authority = req
            .headers()
            .get("host")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .to_string();

        let gate_req = GateRequest {
            authority: &authority,
            path_and_query: &path_and_query,
            headers: req.headers(),
        };

        if let Err(err) = run_pipeline(&state.config, &state.key_cache, &state.replay_guard, &gate_req).await {
            return err.into_response();
        }
    }

    let upstream = select_upstream(&path, &state.config.api_upstream_url, &state.config.app_upstream_url);
    match forward(&state.upstream_client, upstream, req).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

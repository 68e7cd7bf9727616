//! Gateway configuration, populated from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

/// Runtime configuration for the signature-verification gateway.
///
/// All fields are populated from environment variables with sensible
/// defaults, so the gateway can be started with zero configuration (it will
/// simply refuse every gated request until `REGISTRY_URL` etc. are set).
///
/// | Variable | Default | Description |
/// |----------|---------|--------------|
/// | `LISTEN_PORT` | `3001` | TCP port to listen on (binds `0.0.0.0`) |
/// | `REGISTRY_URL` | `http://localhost:4000` | Base URL of the key registry |
/// | `API_UPSTREAM_URL` | `http://localhost:5000` | Upstream for `/api*` paths |
/// | `APP_UPSTREAM_URL` | `http://localhost:5001` | Upstream for all other paths |
/// | `CACHE_TTL_MS` | `5000` | Key-cache entry lifetime |
/// | `NONCE_TTL_MS` | `3600000` | Replay-guard retention window |
/// | `CLOCK_SKEW_S` | `60` | Allowed future-clock skew for `created` |
/// | `DEBUG` | `false` | Verbose tracing |
/// | `GATEWAY_RATE_LIMIT_PER_MINUTE` | `0` (disabled) | Per-IP request cap |
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address the server binds to.
    pub bind_addr: SocketAddr,

    /// Base URL of the key registry service (no trailing slash).
    pub registry_url: String,

    /// Upstream base URL for requests whose path begins with `/api`.
    pub api_upstream_url: String,

    /// Upstream base URL for all other requests.
    pub app_upstream_url: String,

    /// How long a fetched key stays valid in the in-memory cache.
    pub cache_ttl: Duration,

    /// How long a recorded nonce is retained by the replay guard.
    pub nonce_ttl: Duration,

    /// Allowed clock skew for `created` timestamps in the future.
    pub clock_skew: Duration,

    /// Verbose tracing toggle.
    pub debug: bool,

    /// Per-IP request cap for the rate-limit placeholder. `0` disables it.
    pub rate_limit_per_minute: u32,
}

impl GatewayConfig {
    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env() -> Self {
        let port: u16 = std::env::var("LISTEN_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3001);

        let bind_addr: SocketAddr = format!("0.0.0.0:{port}")
            .parse()
            .expect("LISTEN_PORT must produce a valid socket address");

        Self {
            bind_addr,
            registry_url: env_trimmed("REGISTRY_URL", "http://localhost:4000"),
            api_upstream_url: env_trimmed("API_UPSTREAM_URL", "http://localhost:5000"),
            app_upstream_url: env_trimmed("APP_UPSTREAM_URL", "http://localhost:5001"),
            cache_ttl: Duration::from_millis(env_u64("CACHE_TTL_MS", 5_000)),
            nonce_ttl: Duration::from_millis(env_u64("NONCE_TTL_MS", 3_600_000)),
            clock_skew: Duration::from_secs(env_u64("CLOCK_SKEW_S", 60)),
            debug: std::env::var("DEBUG")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            rate_limit_per_minute: std::env::var("GATEWAY_RATE_LIMIT_PER_MINUTE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        }
    }
}

fn env_trimmed(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim_end_matches('/').to_string())
        .unwrap_or_else(|| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

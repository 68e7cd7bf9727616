//! Per-IP fixed-window rate limiting placeholder (spec §1 Non-goals, §4.6 ADDED).
//!
//! Carried forward from the reference node's rate limiter largely unchanged:
//! a configurable per-minute cap keyed on client IP, extracted from
//! `X-Forwarded-For` → `X-Real-IP` → `"unknown"`. A limit of `0` disables it
//! entirely, which is the gateway's default — the contract does not require
//! rate-limiting, only that a placeholder exist.
//!
//! Runs ahead of the gate, on every request including non-gated paths; its
//! 429 rejection is independent of the §7 error taxonomy.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

/// Fixed-window per-IP rate limiter. Cheaply shared via `Arc`.
pub struct RateLimiter {
    state: RwLock<HashMap<String, Bucket>>,
    max_per_window: u32,
    window: Duration,
}

struct Bucket {
    count: u32,
    window_start: Instant,
}

impl RateLimiter {
    /// Pass `0` to disable rate limiting.
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            state: RwLock::new(HashMap::new()),
            max_per_window: max_per_minute,
            window: Duration::from_secs(60),
        }
    }

    /// Returns `Ok(())` if the request is allowed, `Err(retry_after_secs)` otherwise.
    pub fn check(&self, ip_key: &str) -> Result<(), u64> {
        if self.max_per_window == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());

        let bucket = state.entry(ip_key.to_string()).or_insert_with(|| Bucket {
            count: 0,
            window_start: now,
        });

        let elapsed = now.duration_since(bucket.window_start);

        if elapsed >= self.window {
            bucket.count = 1;
            bucket.window_start = now;
            return Ok(());
        }

        if bucket.count >= self.max_per_window {
            let retry_after = (self.window.saturating_sub(elapsed)).as_secs().max(1);
            return Err(retry_after);
        }

        bucket.count += 1;
        Ok(())
    }
}

/// `axum::middleware::from_fn` entry point enforcing per-IP rate limiting.
pub async fn rate_limit_middleware(limiter: Arc<RateLimiter>, req: Request<Body>, next: Next) -> Response {
    let ip_key = extract_ip(&req);

    match limiter.check(&ip_key) {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            let body = serde_json::json!({ "code": "RATE_LIMIT_EXCEEDED", "message": "rate limit exceeded" });
            let mut resp = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
                resp.headers_mut().insert("retry-after", v);
            }
            resp
        }
    }
}

fn extract_ip(req: &Request<Body>) -> String {
    if let Some(xff) = req.headers().get("x-forwarded-for") {
        if let Ok(s) = xff.to_str() {
            if let Some(ip) = s.split(',').next().map(str::trim) {
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    if let Some(xri) = req.headers().get("x-real-ip") {
        if let Ok(s) = xri.to_str() {
            if !s.is_empty() {
                return s.to_string();
            }
        }
    }

    "unknown".to_string()
}

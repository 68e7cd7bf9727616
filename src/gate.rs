//! Gate & Proxy orchestrator (spec §4.6) — route policy and pipeline wiring.
//!
//! `is_gated` decides which paths require a signature; `run_pipeline` drives
//! the envelope parser, key cache, replay guard, base-string builder, and
//! verifier over a single gated request. Every step logs one sanitised
//! event, matching the reference node's handler style.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::HeaderMap;

use crate::base_string::{build_base_string, RequestContext};
use crate::config::GatewayConfig;
use crate::envelope::{parse_envelope, validate_key_id};
use crate::error::GatewayError;
use crate::registry::{KeyCache, RegistryOutcome};
use crate::replay::{ReplayGuard, ReplayOutcome};
use crate::sanitize::sanitize_for_log;
use crate::verify::{verify, Algorithm, VerifyOutcome};

/// Paths whose lowercased form starts with `/product/` require a signature
/// (spec §4.6 route policy). All other paths are admitted unconditionally.
pub fn is_gated(path: &str) -> bool {
    path.to_lowercase().starts_with("/product/")
}

/// Everything the pipeline needs about the live request besides the headers.
pub struct GateRequest<'a> {
    pub authority: &'a str,
    pub path_and_query: &'a str,
    pub headers: &'a HeaderMap,
}

/// Run the full verification pipeline (spec §4.6 steps 1-9) for a gated
/// request. Returns `Ok(())` if the request is admitted, or the
/// [`GatewayError`] that should be rendered back to the client.
pub async fn run_pipeline(
    config: &GatewayConfig,
    key_cache: &KeyCache,
    replay_guard: &Arc<ReplayGuard>,
    req: &GateRequest<'_>,
) -> Result<(), GatewayError> {
    let sig_input = req
        .headers
        .get("signature-input")
        .and_then(|v| v.to_str().ok());
    let signature = req.headers.get("signature").and_then(|v| v.to_str().ok());

    let (sig_input, signature) = match (sig_input, signature) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            tracing::warn!(code = "SIGNATURE_REQUIRED", path = sanitize_for_log(req.path_and_query), "gated request missing signature headers");
            return Err(GatewayError::SignatureRequired);
        }
    };

    // 1. Parse envelope.
    let envelope = match parse_envelope(sig_input, signature) {
        Ok(env) => env,
        Err(err) => {
            tracing::warn!(code = err.code(), "envelope parse failed");
            return Err(err);
        }
    };

    // 2. Validate key_id charset before consulting any backend.
    if let Err(err) = validate_key_id(&envelope.key_id) {
        tracing::warn!(code = err.code(), key_id = sanitize_for_log(&envelope.key_id), "invalid key_id");
        return Err(err);
    }

    // 3. Fetch key record.
    let key_record = match key_cache.get(&envelope.key_id).await {
        RegistryOutcome::Found(record) => record,
        RegistryOutcome::NotFound => {
            tracing::warn!(code = "KEY_NOT_FOUND", key_id = sanitize_for_log(&envelope.key_id), "key not found in registry");
            return Err(GatewayError::KeyNotFound);
        }
        RegistryOutcome::FetchError => {
            tracing::error!(code = "REGISTRY_UNAVAILABLE", "registry fetch failed");
            return Err(GatewayError::RegistryUnavailable);
        }
    };

    if key_record.algorithm != envelope.algorithm {
        tracing::warn!(code = "KEY_NOT_FOUND", "key record algorithm does not match envelope algorithm");
        return Err(GatewayError::KeyNotFound);
    }

    // 4. Enforce is_active.
    if !key_record.is_active() {
        tracing::warn!(code = "KEY_INACTIVE", key_id = sanitize_for_log(&envelope.key_id), "key is inactive");
        return Err(GatewayError::KeyInactive);
    }

    // 5. Temporal check.
    let now = now_unix_seconds();
    let skew = config.clock_skew.as_secs() as i64;
    if let Some(created) = envelope.created {
        if created > now + skew {
            tracing::warn!(code = "TIMESTAMP_FUTURE", "created is beyond allowed clock skew");
            return Err(GatewayError::TimestampFuture);
        }
    }
    if let Some(expires) = envelope.expires {
        if expires < now {
            tracing::warn!(code = "SIGNATURE_EXPIRED", "signature has expired");
            return Err(GatewayError::SignatureExpired);
        }
    }

    // 6. Nonce check (inserted before cryptographic verification, per §4.4 rationale).
    match replay_guard.check_and_record(&envelope.nonce) {
        ReplayOutcome::Fresh => {}
        ReplayOutcome::Replay => {
            tracing::warn!(code = "REPLAY", nonce = sanitize_for_log(&envelope.nonce), "nonce already seen");
            return Err(GatewayError::Replay);
        }
    }

    // 7. Build base string.
    let ctx = RequestContext {
        authority: req.authority,
        path_and_query: req.path_and_query,
        headers: req.headers,
    };
    let base_string = match build_base_string(&envelope, &ctx) {
        Ok(bs) => bs,
        Err(err) => {
            tracing::warn!(code = err.code(), "base string construction failed");
            return Err(err);
        }
    };

    // 8. Signature bytes already extracted during envelope parse (step 8 of
    // spec §4.6 collapses into §4.1's own base64 decode).

    // 9. Verify.
    let algorithm = match Algorithm::parse(&envelope.algorithm) {
        Some(alg) => alg,
        None => {
            tracing::warn!(code = "UNSUPPORTED_ALGORITHM", algorithm = sanitize_for_log(&envelope.algorithm), "unsupported algorithm");
            return Err(GatewayError::UnsupportedAlgorithm(envelope.algorithm.clone()));
        }
    };

    match verify(&algorithm, &key_record.public_key, &base_string, &envelope.signature_bytes) {
        VerifyOutcome::Valid => {
            tracing::info!(key_id = sanitize_for_log(&envelope.key_id), "signature verified");
            Ok(())
        }
        VerifyOutcome::Invalid => {
            tracing::warn!(code = "SIGNATURE_BAD", key_id = sanitize_for_log(&envelope.key_id), "cryptographic verification failed");
            Err(GatewayError::SignatureBad)
        }
    }
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

//! Base-String Builder (spec §4.2).
//!
//! Reconstructs the exact byte sequence the signer covered, from the parsed
//! covered-component list and the live request. Byte-identical with what
//! the signer produced: no header-value normalisation beyond whatever the
//! underlying HTTP parser has already done, and the final `@signature-params`
//! line is the envelope's original raw parameter substring, not a
//! re-serialization.

use axum::http::HeaderMap;

use crate::envelope::SignatureEnvelope;
use crate::error::GatewayError;

/// Everything the builder needs about the live request, independent of axum's
/// extractor types (spec §3 `RequestContext`).
pub struct RequestContext<'a> {
    pub authority: &'a str,
    pub path_and_query: &'a str,
    pub headers: &'a HeaderMap,
}

/// Build the canonical base string for `envelope` against `ctx`.
///
/// Per §9 Open Question 3, a covered component absent from the request is
/// treated as the stricter RFC-faithful failure (`INVALID_ENVELOPE`) rather
/// than silently omitted, since the signer's own base string would have
/// included that line — see `DESIGN.md` for the rationale.
pub fn build_base_string(
    envelope: &SignatureEnvelope,
    ctx: &RequestContext,
) -> Result<String, GatewayError> {
    let mut lines = Vec::with_capacity(envelope.covered_components.len() + 1);

    for component in &envelope.covered_components {
        let value = resolve_component(component, ctx)?;
        lines.push(format!("\"{component}\": {value}"));
    }

    lines.push(format!("\"@signature-params\": {}", envelope.raw_params_expr));

    Ok(lines.join("\n"))
}

fn resolve_component(component: &str, ctx: &RequestContext) -> Result<String, GatewayError> {
    match component {
        "@authority" | "host" => Ok(ctx.authority.to_string()),
        "@path" => Ok(ctx.path_and_query.to_string()),
        "content-type" => Ok(ctx
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string()),
        other => ctx
            .headers
            .get(other)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .ok_or_else(|| {
                GatewayError::InvalidEnvelope(format!("covered component absent from request: {other}"))
            }),
    }
}

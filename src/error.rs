//! The gateway's error taxonomy (spec §7) and its HTML rendering.
//!
//! All variants are terminal for the request: no retries, no fall-through
//! to the upstream. A short, generic message goes to the client; detail is
//! deliberately thin so the response never confirms whether a given key
//! exists, and never carries key material, signature bytes, or raw headers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// The single tagged error type returned by the verification pipeline.
///
/// Maps 1:1 onto the table in spec §7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Signature headers missing, malformed, or inconsistent.
    InvalidEnvelope(String),
    /// `key_id` fails the charset/length rule.
    InvalidKeyId(String),
    /// Registry returned 404 for the given `key_id`.
    KeyNotFound,
    /// Key record's `is_active` is not the literal string `"true"`.
    KeyInactive,
    /// `created` is further in the future than the allowed clock skew.
    TimestampFuture,
    /// `expires` is in the past.
    SignatureExpired,
    /// `nonce` is absent from the envelope.
    MissingNonce,
    /// `nonce` has already been recorded by the replay guard.
    Replay,
    /// Cryptographic verification failed.
    SignatureBad,
    /// `alg` is not one of the supported algorithms.
    UnsupportedAlgorithm(String),
    /// Transport or parse error talking to the registry.
    RegistryUnavailable,
    /// Gated path, no signature headers present at all.
    SignatureRequired,
}

impl GatewayError {
    /// HTTP status code this error maps to (spec §7).
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::UnsupportedAlgorithm(_) => StatusCode::BAD_REQUEST,
            GatewayError::RegistryUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::FORBIDDEN,
        }
    }

    /// Machine-readable code, also used as the log event name.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidEnvelope(_) => "INVALID_ENVELOPE",
            GatewayError::InvalidKeyId(_) => "INVALID_KEY_ID",
            GatewayError::KeyNotFound => "KEY_NOT_FOUND",
            GatewayError::KeyInactive => "KEY_INACTIVE",
            GatewayError::TimestampFuture => "TIMESTAMP_FUTURE",
            GatewayError::SignatureExpired => "SIGNATURE_EXPIRED",
            GatewayError::MissingNonce => "MISSING_NONCE",
            GatewayError::Replay => "REPLAY",
            GatewayError::SignatureBad => "SIGNATURE_BAD",
            GatewayError::UnsupportedAlgorithm(_) => "UNSUPPORTED_ALGORITHM",
            GatewayError::RegistryUnavailable => "REGISTRY_UNAVAILABLE",
            GatewayError::SignatureRequired => "SIGNATURE_REQUIRED",
        }
    }

    /// Generic client-facing message. Never confirms key existence.
    fn message(&self) -> &'static str {
        match self {
            GatewayError::InvalidEnvelope(_) => "the signature headers could not be parsed",
            GatewayError::InvalidKeyId(_) => "the supplied key identifier is invalid",
            GatewayError::KeyNotFound => "signature verification failed",
            GatewayError::KeyInactive => "signature verification failed",
            GatewayError::TimestampFuture => "signature timestamp is not yet valid",
            GatewayError::SignatureExpired => "signature has expired",
            GatewayError::MissingNonce => "signature is missing a required nonce",
            GatewayError::Replay => "this request has already been processed",
            GatewayError::SignatureBad => "signature verification failed",
            GatewayError::UnsupportedAlgorithm(_) => "unsupported signature algorithm",
            GatewayError::RegistryUnavailable => "internal error while verifying the request",
            GatewayError::SignatureRequired => "this request requires a signature",
        }
    }

    /// A short, non-sensitive hint for the `Details:` line. Never key
    /// material, signature bytes, or raw header values.
    fn detail(&self) -> Option<String> {
        match self {
            GatewayError::UnsupportedAlgorithm(alg) => {
                Some(format!("offered algorithm: {}", crate::sanitize::sanitize_for_log(alg)))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::error::Error for GatewayError {}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let title = match status {
            StatusCode::BAD_REQUEST => "Bad Request",
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Error",
            _ => "Forbidden",
        };
        let body = render_error_page(title, self.message(), self.detail().as_deref());
        (status, [("content-type", "text/html; charset=utf-8")], body).into_response()
    }
}

/// Render the safe, context-free HTML error page (spec §4.6 "Error rendering").
///
/// All three arguments are HTML-escaped before interpolation. No stack
/// traces, no header echoes, no inline scripts or external resources.
pub fn render_error_page(title: &str, message: &str, detail: Option<&str>) -> String {
    let title = escape_html(title);
    let message = escape_html(message);
    let detail_line = detail
        .map(|d| format!("<p class=\"detail\">Details: {}</p>", escape_html(d)))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n\
<html lang=\"en\">\n\
<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
<body>\n\
<h1>{title}</h1>\n\
<p>{message}</p>\n\
{detail_line}\n\
</body>\n\
</html>\n"
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(GatewayError::SignatureRequired.status(), StatusCode::FORBIDDEN);
        assert_eq!(GatewayError::Replay.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            GatewayError::UnsupportedAlgorithm("hmac".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::RegistryUnavailable.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_page_escapes_html() {
        let page = render_error_page("<Title>", "msg & stuff", Some("<script>alert(1)</script>"));
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains("&amp; stuff"));
    }

    #[test]
    fn detail_omitted_when_none() {
        let page = render_error_page("Forbidden", "nope", None);
        assert!(!page.contains("Details:"));
    }

    #[test]
    fn unsupported_algorithm_detail_is_sanitised() {
        let err = GatewayError::UnsupportedAlgorithm("hmac\n-sha256".into());
        let detail = err.detail().unwrap();
        assert!(!detail.contains('\n'));
    }

    #[test]
    fn key_not_found_message_does_not_confirm_absence_explicitly() {
        let err = GatewayError::KeyNotFound;
        assert_eq!(err.message(), "signature verification failed");
    }
}

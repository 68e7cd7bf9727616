//! Log-injection defence.
//!
//! Every request- or registry-derived string that reaches a `tracing` call
//! passes through [`sanitize_for_log`] first: control characters are
//! stripped and the result is truncated to a fixed byte bound, so a hostile
//! header value can't forge extra log lines or blow out log storage.

/// Maximum length, in bytes, of a sanitised log value.
pub const MAX_LOG_VALUE_LEN: usize = 200;

/// Strip ASCII control characters and truncate to [`MAX_LOG_VALUE_LEN`] bytes
/// at a UTF-8-safe boundary.
pub fn sanitize_for_log(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_control() || *c == ' ')
        .collect();

    if cleaned.len() <= MAX_LOG_VALUE_LEN {
        return cleaned;
    }

    let mut boundary = MAX_LOG_VALUE_LEN;
    while boundary > 0 && !cleaned.is_char_boundary(boundary) {
        boundary -= 1;
    }
    let mut truncated = cleaned[..boundary].to_string();
    truncated.push_str("...(truncated)");
    truncated
}

//! Signature Envelope Parser (spec §4.1).
//!
//! Decodes the `signature-input` / `signature` header pair into a
//! [`SignatureEnvelope`]. Hand-rolled rather than delegated to a Structured
//! Field Values parser: the wire grammar here uses a capitalised `keyId`
//! parameter key, which a conformant `sf-token` key grammar rejects, and the
//! base-string builder (§4.2) needs the *original byte substring* of the
//! parameter expression, not a re-serialization a parse-then-print round
//! trip would produce. The scanning style (quote-aware splitting, `unquote`)
//! follows the same shape as the reference node's signature-header parser.

use crate::error::GatewayError;

/// A fully parsed signature envelope, derived from one request (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEnvelope {
    /// The LABEL shared by both wire headers, e.g. `sig2`.
    pub label: String,
    /// Covered components, in signer order: `@authority`, `@path`, header names, ...
    pub covered_components: Vec<String>,
    /// `keyId` parameter. Charset-validated by [`validate_key_id`], not here.
    pub key_id: String,
    /// `alg` parameter, lowercased.
    pub algorithm: String,
    /// `created` parameter, unix seconds.
    pub created: Option<i64>,
    /// `expires` parameter, unix seconds.
    pub expires: Option<i64>,
    /// `nonce` parameter. Always non-empty; absence is rejected during parse.
    pub nonce: String,
    /// `tag` parameter. Logged only, never interpreted.
    pub tag: Option<String>,
    /// Raw signature bytes, base64-decoded from the companion header.
    pub signature_bytes: Vec<u8>,
    /// The original parameter expression from `signature-input`, starting at
    /// `(` and including the trailing parameter list, with the `LABEL=`
    /// prefix removed. Used verbatim as the final base-string line (§4.2).
    pub raw_params_expr: String,
}

/// Characters permitted in a `key_id` (spec §3): `[A-Za-z0-9._-]`, 1..100 chars.
pub fn validate_key_id(key_id: &str) -> Result<(), GatewayError> {
    if key_id.is_empty()
        || key_id.len() > 100
        || !key_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
    {
        return Err(GatewayError::InvalidKeyId(key_id.to_string()));
    }
    Ok(())
}

/// Parse the `signature-input` and `signature` header values into an envelope.
///
/// Any structural mismatch, a missing companion header, or a LABEL mismatch
/// between the two headers maps to `INVALID_ENVELOPE` (spec §4.1).
pub fn parse_envelope(
    sig_input_header: &str,
    signature_header: &str,
) -> Result<SignatureEnvelope, GatewayError> {
    let (label, component_list, raw_params_expr, param_list) =
        split_signature_input(sig_input_header)?;

    let covered_components = parse_component_list(component_list)?;
    let params = parse_param_list(param_list)?;

    let key_id = params
        .get("keyid")
        .cloned()
        .ok_or_else(|| invalid("missing keyId parameter"))?;
    let algorithm = params
        .get("alg")
        .cloned()
        .ok_or_else(|| invalid("missing alg parameter"))?
        .to_lowercase();
    let nonce = params
        .get("nonce")
        .cloned()
        .filter(|n| !n.is_empty())
        .ok_or(GatewayError::MissingNonce)?;
    let tag = params.get("tag").cloned();

    let created = params
        .get("created")
        .map(|v| parse_i64(v))
        .transpose()?;
    let expires = params
        .get("expires")
        .map(|v| parse_i64(v))
        .transpose()?;

    if let (Some(c), Some(e)) = (created, expires) {
        if c > e {
            return Err(invalid("created must not be after expires"));
        }
    }

    let (sig_label, signature_bytes) = parse_signature_value(signature_header)?;
    if sig_label != label {
        return Err(invalid("signature-input and signature LABELs do not match"));
    }

    Ok(SignatureEnvelope {
        label,
        covered_components,
        key_id,
        algorithm,
        created,
        expires,
        nonce,
        tag,
        signature_bytes,
        raw_params_expr,
    })
}

fn invalid(msg: &str) -> GatewayError {
    GatewayError::InvalidEnvelope(msg.to_string())
}

fn parse_i64(v: &str) -> Result<i64, GatewayError> {
    v.parse::<i64>()
        .map_err(|_| invalid("non-integer timestamp parameter"))
}

/// Split `LABEL=(ITEM ITEM ...); key=value; key=value; ...` into
/// `(label, component-list text, raw parameter expression, parameter-list text)`.
///
/// `raw parameter expression` is the `(`-prefixed substring starting right
/// after `LABEL=`, unchanged — this is what survives into the base string.
fn split_signature_input(
    header: &str,
) -> Result<(String, &str, String, &str), GatewayError> {
    let header = header.trim();
    let eq = header.find('=').ok_or_else(|| invalid("missing '=' after LABEL"))?;
    let label = header[..eq].trim().to_string();
    if label.is_empty() {
        return Err(invalid("empty LABEL"));
    }

    let rest = &header[eq + 1..];
    if !rest.starts_with('(') {
        return Err(invalid("expected '(' after LABEL="));
    }

    let close = rest.find(')').ok_or_else(|| invalid("unterminated component list"))?;
    let component_list = &rest[1..close];

    let after = &rest[close + 1..];
    let after = after
        .strip_prefix(';')
        .ok_or_else(|| invalid("expected ';' after component list"))?;

    let raw_params_expr = rest.to_string();
    Ok((label, component_list, raw_params_expr, after))
}

fn parse_component_list(list: &str) -> Result<Vec<String>, GatewayError> {
    let components: Vec<String> = list
        .split_whitespace()
        .map(unquote)
        .collect::<Result<_, _>>()?;
    if components.is_empty() {
        return Err(invalid("covered-component list is empty"));
    }
    Ok(components)
}

/// Parse `key=value` pairs separated by `;`, quote-aware. Keys are matched
/// case-insensitively and stored lowercased.
fn parse_param_list(list: &str) -> Result<std::collections::HashMap<String, String>, GatewayError> {
    let mut params = std::collections::HashMap::new();
    for part in split_params(list) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let eq = part.find('=').ok_or_else(|| invalid("parameter missing '='"))?;
        let key = part[..eq].trim().to_lowercase();
        let raw_value = part[eq + 1..].trim();
        let value = if raw_value.starts_with('"') {
            unquote(raw_value)?
        } else {
            raw_value.to_string()
        };
        params.insert(key, value);
    }
    Ok(params)
}

/// Split on `;` outside double-quoted strings.
fn split_params(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in s.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ';' if !in_quotes => {
                parts.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

fn unquote(s: &str) -> Result<String, GatewayError> {
    let s = s.trim();
    if s.starts_with('"') && s.ends_with('"') && s.len() >= 2 {
        Ok(s[1..s.len() - 1].to_string())
    } else {
        Err(invalid("expected a quoted string"))
    }
}

/// Parse `LABEL=:BASE64:` into `(label, decoded bytes)`.
fn parse_signature_value(header: &str) -> Result<(String, Vec<u8>), GatewayError> {
    let header = header.trim();
    let eq = header.find('=').ok_or_else(|| invalid("missing '=' in signature header"))?;
    let label = header[..eq].trim().to_string();
    let rest = header[eq + 1..].trim();

    if !(rest.starts_with(':') && rest.ends_with(':') && rest.len() >= 2) {
        return Err(invalid("signature value must be ':'-delimited base64"));
    }
    let b64 = &rest[1..rest.len() - 1];

    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|_| invalid("signature value is not valid base64"))?;

    Ok((label, bytes))
}

//! Transparent forwarding to the merchant origin (spec §4.6 step 10, §6).
//!
//! Streams both directions through `reqwest` rather than buffering: the
//! inbound `axum::body::Body` becomes a `reqwest::Body` over its data
//! stream, and the upstream response body is streamed back unchanged. The
//! `Host` header is rewritten to the upstream's authority; every other
//! header — including both signature headers — passes through untouched.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;

/// Select the upstream base URL for a given request path (spec §6).
pub fn select_upstream<'a>(path: &str, api_upstream: &'a str, app_upstream: &'a str) -> &'a str {
    if path.starts_with("/api") {
        api_upstream
    } else {
        app_upstream
    }
}

/// Forward `req` to `upstream_base`, streaming the request body out and the
/// response body back. All headers pass through unchanged except `Host`.
pub async fn forward(
    client: &reqwest::Client,
    upstream_base: &str,
    req: Request,
) -> Result<Response, GatewayError> {
    let (parts, body) = req.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target_url = format!("{upstream_base}{path_and_query}");
    let target_uri: Uri = target_url
        .parse()
        .map_err(|_| GatewayError::RegistryUnavailable)?;
    let authority = target_uri
        .authority()
        .map(|a| a.as_str().to_string())
        .unwrap_or_default();

    let method = parts.method.clone();
    let mut outbound_headers = reqwest::header::HeaderMap::new();
    for (name, value) in parts.headers.iter() {
        outbound_headers.insert(name.clone(), value.clone());
    }
    if let Ok(host_value) = reqwest::header::HeaderValue::from_str(&authority) {
        outbound_headers.insert(reqwest::header::HOST, host_value);
    }

    let reqwest_body = reqwest::Body::wrap_stream(body.into_data_stream());

    let upstream_response = client
        .request(method, target_url)
        .headers(outbound_headers)
        .body(reqwest_body)
        .send()
        .await
        .map_err(|_| GatewayError::RegistryUnavailable)?;

    let status = StatusCode::from_u16(upstream_response.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);

    let mut response_headers = HeaderMap::new();
    for (name, value) in upstream_response.headers().iter() {
        if let (Ok(name), Ok(value)) = (
            axum::http::HeaderName::from_bytes(name.as_str().as_bytes()),
            axum::http::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            response_headers.append(name, value);
        }
    }

    let body_stream = upstream_response.bytes_stream();
    let outbound_body = Body::from_stream(body_stream);

    let mut response = (status, outbound_body).into_response();
    *response.headers_mut() = response_headers;
    Ok(response)
}

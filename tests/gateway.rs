//! End-to-end scenarios driving the full router (spec §8 concrete scenarios).
//!
//! Each test spins up a loopback mock registry (and, where needed, a mock
//! upstream) and drives requests through `router::build_router` via
//! `tower::ServiceExt::oneshot`, exactly as the reference node's federation
//! tests spin up a loopback peer.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use http_body_util::BodyExt;
use rand::rngs::OsRng;
use tower::ServiceExt;

use sig_gateway::config::GatewayConfig;
use sig_gateway::router::{build_router, AppState};

async fn read_body(resp: Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn spawn_mock_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn test_config(registry_url: String, app_upstream_url: String) -> GatewayConfig {
    GatewayConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        registry_url,
        api_upstream_url: app_upstream_url.clone(),
        app_upstream_url,
        cache_ttl: Duration::from_secs(5),
        nonce_ttl: Duration::from_secs(3600),
        clock_skew: Duration::from_secs(60),
        debug: false,
        rate_limit_per_minute: 0,
    }
}

fn sign_envelope(
    signing_key: &SigningKey,
    authority: &str,
    path: &str,
    created: i64,
    expires: i64,
    nonce: &str,
    label: &str,
) -> (String, String) {
    let params = format!(
        r#"("@authority" "@path"); created={created}; expires={expires}; keyId="agent-1"; alg="ed25519"; nonce="{nonce}""#
    );
    let base_string = format!(
        "\"@authority\": {authority}\n\"@path\": {path}\n\"@signature-params\": {params}"
    );
    let signature = signing_key.sign(base_string.as_bytes()).to_bytes();
    let sig_b64 = base64::engine::general_purpose::STANDARD.encode(signature);

    let sig_input = format!("{label}={params}");
    let signature_header = format!("{label}=:{sig_b64}:");
    (sig_input, signature_header)
}

async fn mock_registry_with_key(key_id: &str, public_key_b64: String, is_active: &str) -> String {
    mock_registry_with_key_algorithm(key_id, public_key_b64, is_active, "ed25519").await
}

async fn mock_registry_with_key_algorithm(
    key_id: &str,
    public_key_b64: String,
    is_active: &str,
    algorithm: &str,
) -> String {
    let record = serde_json::json!({
        "key_id": key_id,
        "algorithm": algorithm,
        "is_active": is_active,
        "public_key": public_key_b64,
        "description": "test agent",
        "agent_id": 1,
        "agent_name": "agent",
        "agent_domain": "example.com",
    });
    let route = format!("/keys/{key_id}");
    let app = Router::new().route(&route, get(move || {
        let record = record.clone();
        async move { Json(record) }
    }));
    spawn_mock_server(app).await
}

async fn mock_upstream_ok(body: &'static str) -> String {
    let app = Router::new().fallback(get(move || async move { body }));
    spawn_mock_server(app).await
}

#[tokio::test]
async fn happy_path_ed25519() {
    let signing_key = SigningKey::generate(&mut OsRng);
    let public_key_b64 =
        base64::engine::general_purpose::STANDARD.encode(signing_key.verifying_key().to_bytes());

    let registry_url = mock_registry_with_key("agent-1", public_key_b64, "true").await;
    let upstream_url = mock_upstream_ok("hello from upstream").await;
    let upstream_authority = upstream_url.trim_start_matches("http://").to_string();

    let config = test_config(registry_url, upstream_url);
    let app = build_router(AppState::new(config));

    let created = now();
    let (sig_input, sig) = sign_envelope(
        &signing_key,
        &upstream_authority,
        "/product/42",
        created,
        created + 300,
        "n-1",
        "sig2",
    );

    let req = Request::builder()
        .uri("/product/42")
        .header("host", &upstream_authority)
        .header("signature-input", sig_input)
        .header("signature", sig)
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_body(resp).await, "hello from upstream");
}

#[tokio::test]
async fn replay_is_rejected_on_second_submission() {
    let signing_key = SigningKey::generate(&mut OsRng);
    let public_key_b64 =
        base64::engine::general_purpose::STANDARD.encode(signing_key.verifying_key().to_bytes());

    let registry_url = mock_registry_with_key("agent-1", public_key_b64, "true").await;
    let upstream_url = mock_upstream_ok("hello").await;
    let upstream_authority = upstream_url.trim_start_matches("http://").to_string();

    let config = test_config(registry_url, upstream_url);
    let app = build_router(AppState::new(config));

    let created = now();
    let (sig_input, sig) = sign_envelope(
        &signing_key,
        &upstream_authority,
        "/product/42",
        created,
        created + 300,
        "n-replay",
        "sig2",
    );

    let make_req = || {
        Request::builder()
            .uri("/product/42")
            .header("host", &upstream_authority)
            .header("signature-input", sig_input.clone())
            .header("signature", sig.clone())
            .body(Body::empty())
            .unwrap()
    };

    let first = app.clone().oneshot(make_req()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.oneshot(make_req()).await.unwrap();
    assert_eq!(second.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn expired_signature_is_rejected() {
    let signing_key = SigningKey::generate(&mut OsRng);
    let public_key_b64 =
        base64::engine::general_purpose::STANDARD.encode(signing_key.verifying_key().to_bytes());

    let registry_url = mock_registry_with_key("agent-1", public_key_b64, "true").await;
    let upstream_url = mock_upstream_ok("hello").await;
    let upstream_authority = upstream_url.trim_start_matches("http://").to_string();

    let config = test_config(registry_url, upstream_url);
    let app = build_router(AppState::new(config));

    let created = now() - 1000;
    let (sig_input, sig) = sign_envelope(
        &signing_key,
        &upstream_authority,
        "/product/42",
        created,
        created + 1,
        "n-expired",
        "sig2",
    );

    let req = Request::builder()
        .uri("/product/42")
        .header("host", &upstream_authority)
        .header("signature-input", sig_input)
        .header("signature", sig)
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_headers_on_gated_path_is_rejected() {
    let config = test_config("http://127.0.0.1:1".into(), "http://127.0.0.1:1".into());
    let app = build_router(AppState::new(config));

    let req = Request::builder()
        .uri("/product/42")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn non_gated_path_passes_through_without_headers() {
    let upstream_url = mock_upstream_ok("about page").await;
    let config = test_config("http://127.0.0.1:1".into(), upstream_url);
    let app = build_router(AppState::new(config));

    let req = Request::builder().uri("/about").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_body(resp).await, "about page");
}

#[tokio::test]
async fn unsupported_algorithm_is_rejected_with_400() {
    // The registry must be reachable and hold an active key whose algorithm
    // matches the envelope's, so the pipeline clears steps 3-6 (key fetch,
    // active check, temporal check, nonce check) and reaches the
    // `Algorithm::parse` rejection at step 9 rather than failing earlier.
    let registry_url =
        mock_registry_with_key_algorithm("agent-1", "AAAA".to_string(), "true", "hmac-sha256")
            .await;
    let upstream_url = mock_upstream_ok("hello").await;
    let upstream_authority = upstream_url.trim_start_matches("http://").to_string();

    let config = test_config(registry_url, upstream_url);
    let app = build_router(AppState::new(config));

    let created = now();
    let params = format!(
        r#"("@authority" "@path"); created={created}; expires={}; keyId="agent-1"; alg="hmac-sha256"; nonce="n-bad-alg""#,
        created + 300
    );
    let sig_input = format!("sig2={params}");
    let sig = "sig2=:AAAA:".to_string();

    let req = Request::builder()
        .uri("/product/42")
        .header("host", &upstream_authority)
        .header("signature-input", sig_input)
        .header("signature", sig)
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn registry_miss_returns_403_key_not_found() {
    let registry_url = mock_registry_with_key("other-agent", "AAAA".into(), "true").await;
    let upstream_url = mock_upstream_ok("hello").await;
    let upstream_authority = upstream_url.trim_start_matches("http://").to_string();

    let config = test_config(registry_url, upstream_url);
    let app = build_router(AppState::new(config));

    let signing_key = SigningKey::generate(&mut OsRng);
    let created = now();
    let (sig_input, sig) = sign_envelope(
        &signing_key,
        &upstream_authority,
        "/product/42",
        created,
        created + 300,
        "n-ghost",
        "sig2",
    );
    let sig_input = sig_input.replace("agent-1", "ghost");

    let req = Request::builder()
        .uri("/product/42")
        .header("host", &upstream_authority)
        .header("signature-input", sig_input)
        .header("signature", sig)
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn happy_path_rsa_pss_sha256() {
    use rsa::pkcs8::EncodePublicKey;
    use rsa::pss::Pss;
    use rsa::RsaPrivateKey;
    use sha2::{Digest, Sha256};

    let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let public_key = rsa::RsaPublicKey::from(&private_key);
    let public_key_pem = public_key.to_public_key_pem(rsa::pkcs8::LineEnding::LF).unwrap();

    let registry_url = mock_registry_with_key("agent-rsa", public_key_pem, "true").await;
    let upstream_url = mock_upstream_ok("hello from upstream").await;
    let upstream_authority = upstream_url.trim_start_matches("http://").to_string();

    let config = test_config(registry_url, upstream_url);
    let app = build_router(AppState::new(config));

    let created = now();
    let params = format!(
        r#"("@authority" "@path"); created={created}; expires={}; keyId="agent-rsa"; alg="rsa-pss-sha256"; nonce="n-rsa""#,
        created + 300
    );
    let base_string = format!(
        "\"@authority\": {upstream_authority}\n\"@path\": /product/42\n\"@signature-params\": {params}"
    );
    let digest = Sha256::digest(base_string.as_bytes());
    use rsa::traits::PublicKeyParts;
    let key_bits = public_key.n().bits();
    let salt_len = (key_bits - 1).div_ceil(8).saturating_sub(32).saturating_sub(2);
    let scheme = Pss::new_with_salt::<Sha256>(salt_len);
    let signature = private_key
        .sign_with_rng(&mut rand::thread_rng(), scheme, &digest)
        .unwrap();
    let sig_b64 = base64::engine::general_purpose::STANDARD.encode(signature);

    let req = Request::builder()
        .uri("/product/42")
        .header("host", &upstream_authority)
        .header("signature-input", format!("sig2={params}"))
        .header("signature", format!("sig2=:{sig_b64}:"))
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_body(resp).await, "hello from upstream");
}

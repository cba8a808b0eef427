//! Gateway integration tests
//!
//! Upstream services are real axum servers on ephemeral loopback ports.
//!
//! Author: hephaex@gmail.com

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, Request, StatusCode, Uri},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tourbook_api::auth::identity::verify_identity_signature;
use tourbook_api::auth::TokenService;
use tourbook_api::test_utils::{
    auth_state_for_testing, create_gateway_router_for_testing, test_config,
};
use tourbook_api::{auth_router, booking_router};
use tourbook_api::state::BookingState;
use tourbook_core::{AppConfig, Identity, Role};
use tower::ServiceExt;

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Base URL nothing listens on
async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn echo(
    State(hits): State<Arc<AtomicUsize>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    Json(json!({
        "method": method.as_str(),
        "uri": uri.to_string(),
        "body": body,
        "user_id": get("x-user-id"),
        "role": get("x-user-role"),
        "timestamp": get("x-gateway-timestamp"),
        "signature": get("x-gateway-signature"),
        "cookie": get("cookie"),
    }))
}

/// Upstream that reports what it received, and a hit counter
async fn spawn_echo() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().fallback(echo).with_state(hits.clone());
    (spawn(app).await, hits)
}

fn config_with_upstream(base: &str) -> AppConfig {
    let mut config = test_config();
    config.services.auth = base.to_string();
    config.services.user = base.to_string();
    config.services.tour = base.to_string();
    config.services.review = base.to_string();
    config.services.booking = base.to_string();
    config
}

fn access_token(config: &AppConfig, subject: &str, role: Role) -> String {
    TokenService::new(&config.tokens)
        .issue_access_token(&Identity::new(subject, role))
        .unwrap()
}

fn request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_protected_route_without_token_is_not_forwarded() {
    let (base, hits) = spawn_echo().await;
    let gateway = create_gateway_router_for_testing(config_with_upstream(&base));

    let (status, _, json) = send(
        &gateway,
        request("GET", "/api/v1/tour/t-1").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_forged_identity_headers_are_replaced() {
    let (base, _) = spawn_echo().await;
    let config = config_with_upstream(&base);
    let token = access_token(&config, "u-1", Role::User);
    let gateway = create_gateway_router_for_testing(config);

    let (status, _, json) = send(
        &gateway,
        request("GET", "/api/v1/tour/t-1")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header("x-user-id", "admin-1")
            .header("x-user-role", "ADMIN")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user_id"], "u-1");
    assert_eq!(json["role"], "USER");
}

#[tokio::test]
async fn test_forged_headers_without_token_are_rejected() {
    let (base, hits) = spawn_echo().await;
    let gateway = create_gateway_router_for_testing(config_with_upstream(&base));

    let (status, _, _) = send(
        &gateway,
        request("GET", "/api/v1/user/admin-1")
            .header("x-user-id", "admin-1")
            .header("x-user-role", "ADMIN")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_public_route_forwards_without_identity() {
    let (base, _) = spawn_echo().await;
    let gateway = create_gateway_router_for_testing(config_with_upstream(&base));

    let (status, _, json) = send(
        &gateway,
        request("POST", "/api/v1/auth/login?next=%2Fhome")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-user-id", "admin-1")
            .header("x-user-role", "ADMIN")
            .body(Body::from(r#"{"username":"alice"}"#))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["method"], "POST");
    assert_eq!(json["uri"], "/api/v1/auth/login?next=%2Fhome");
    assert_eq!(json["body"], r#"{"username":"alice"}"#);
    assert!(json["user_id"].is_null());
    assert!(json["role"].is_null());
}

#[tokio::test]
async fn test_cookie_token_is_forwarded_with_identity() {
    let (base, _) = spawn_echo().await;
    let config = config_with_upstream(&base);
    let token = access_token(&config, "u-7", Role::Admin);
    let gateway = create_gateway_router_for_testing(config);
    let cookie = format!("accessToken={token}");

    let (status, _, json) = send(
        &gateway,
        request("GET", "/api/v1/review/tour/t-1")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user_id"], "u-7");
    assert_eq!(json["role"], "ADMIN");
    assert_eq!(json["cookie"], cookie);
    assert!(json["signature"].is_null());
}

#[tokio::test]
async fn test_identity_headers_are_signed_with_shared_secret() {
    let (base, _) = spawn_echo().await;
    let mut config = config_with_upstream(&base);
    config.identity.gateway_secret = Some("hop-secret".to_string());
    let token = access_token(&config, "u-1", Role::User);
    let gateway = create_gateway_router_for_testing(config);

    let (status, _, json) = send(
        &gateway,
        request("GET", "/api/v1/booking/b-1")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let timestamp: i64 = json["timestamp"].as_str().unwrap().parse().unwrap();
    let signature = json["signature"].as_str().unwrap();
    assert!(verify_identity_signature(
        "hop-secret",
        "u-1",
        "USER",
        timestamp,
        signature
    ));
    assert!(!verify_identity_signature(
        "other-secret",
        "u-1",
        "USER",
        timestamp,
        signature
    ));
}

#[tokio::test]
async fn test_session_route() {
    let (base, hits) = spawn_echo().await;
    let config = config_with_upstream(&base);
    let token = access_token(&config, "u-1", Role::User);
    let gateway = create_gateway_router_for_testing(config);

    let (status, _, json) = send(
        &gateway,
        request("GET", "/api/v1/session")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["subject_id"], "u-1");
    assert_eq!(json["data"]["role"], "USER");

    let (status, _, _) = send(
        &gateway,
        request("GET", "/api/v1/session").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let config = config_with_upstream(&dead_url().await);
    let token = access_token(&config, "u-1", Role::User);
    let gateway = create_gateway_router_for_testing(config);

    let (status, _, json) = send(
        &gateway,
        request("GET", "/api/v1/tour/t-1")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_oversized_body_is_rejected_before_forwarding() {
    let (base, hits) = spawn_echo().await;
    let mut config = config_with_upstream(&base);
    config.server.max_body_size = 16;
    let gateway = create_gateway_router_for_testing(config);

    let (status, _, json) = send(
        &gateway,
        request("POST", "/api/v1/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("x".repeat(64)))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["error"], "PAYLOAD_TOO_LARGE");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_prefix_is_not_found() {
    let (base, hits) = spawn_echo().await;
    let gateway = create_gateway_router_for_testing(config_with_upstream(&base));

    let (status, _, _) = send(
        &gateway,
        request("GET", "/internal/metrics").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_openapi_spec_available() {
    let (base, _) = spawn_echo().await;
    let gateway = create_gateway_router_for_testing(config_with_upstream(&base));

    let (status, _, json) = send(
        &gateway,
        request("GET", "/api-docs/openapi.json").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["openapi"].is_string());
    assert!(json["paths"]["/api/v1/auth/login"].is_object());
    assert!(json["paths"]["/api/v1/booking/{id}"].is_object());
}

/// Gateway in front of the real booking service
#[tokio::test]
async fn test_booking_through_gateway() {
    let mut config = test_config();
    config.identity.gateway_secret = Some("hop-secret".to_string());

    let booking_base = spawn(booking_router(Arc::new(BookingState::new(config.clone())))).await;
    let mut gateway_config = config.clone();
    gateway_config.services.booking = booking_base;
    let gateway = create_gateway_router_for_testing(gateway_config.clone());

    let alice = access_token(&gateway_config, "u-alice", Role::User);
    let bob = access_token(&gateway_config, "u-bob", Role::User);

    let (status, _, json) = send(
        &gateway,
        request("POST", "/api/v1/booking")
            .header(header::AUTHORIZATION, format!("Bearer {alice}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "tour_id": "t-1",
                    "full_name": "Alice Doe",
                    "guest_size": 3,
                    "phone": "+351 900 000",
                    "book_at": "2026-11-01T09:00:00Z"
                })
                .to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["data"]["user_id"], "u-alice");
    let uri = format!("/api/v1/booking/{}", json["data"]["id"].as_str().unwrap());

    let (status, _, _) = send(
        &gateway,
        request("GET", &uri)
            .header(header::AUTHORIZATION, format!("Bearer {alice}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(
        &gateway,
        request("GET", &uri)
            .header(header::AUTHORIZATION, format!("Bearer {bob}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = send(
        &gateway,
        request("GET", &uri).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// Gateway in front of the real auth service, with signed identity headers
#[tokio::test]
async fn test_end_to_end_through_gateway() {
    let mut config = test_config();
    config.identity.gateway_secret = Some("hop-secret".to_string());

    let auth_base = spawn(auth_router(auth_state_for_testing(config.clone()))).await;
    let mut gateway_config = config.clone();
    gateway_config.services.auth = auth_base.clone();
    gateway_config.services.user = auth_base;
    let gateway = create_gateway_router_for_testing(gateway_config);

    let (status, _, json) = send(
        &gateway,
        request("POST", "/api/v1/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "username": "alice", "email": "a@x.com", "password": "Secret123" })
                    .to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    let alice_id = json["data"]["id"].as_str().unwrap().to_string();

    let (status, headers, _) = send(
        &gateway,
        request("POST", "/api/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "username": "alice", "password": "Secret123" }).to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get_all(header::SET_COOKIE).iter().count(), 2);

    let cookie = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .collect::<Vec<_>>()
        .join("; ");

    let (status, _, json) = send(
        &gateway,
        request("GET", &format!("/api/v1/user/{alice_id}"))
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["username"], "alice");

    // The service refuses unsigned identity headers when a secret is set
    let direct = auth_router(auth_state_for_testing(config));
    let (status, _, _) = send(
        &direct,
        request("GET", "/api/v1/auth/me")
            .header("x-user-id", &alice_id)
            .header("x-user-role", "ADMIN")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

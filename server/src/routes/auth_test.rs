use super::*;
use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use tower::ServiceExt;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::state::test_helpers::{test_app_state, unreachable_app_state};

fn json_request(method: &str, uri: &str, body: &Value) -> Request {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn cookie_request(method: &str, uri: &str, cookies: &str) -> Request {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header(COOKIE, cookies)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_owned())
        .collect()
}

// =============================================================================
// PASS-THROUGH
// =============================================================================

#[tokio::test]
async fn login_relays_body_status_and_every_cookie() {
    let server = MockServer::start().await;
    let access = "access_token=a; Expires=Wed, 21 Oct 2026 07:28:00 GMT; Path=/; HttpOnly";
    let refresh = "refresh_token=r; Expires=Thu, 22 Oct 2026 07:28:00 GMT; Path=/; HttpOnly";
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({ "password": "hunter2" })))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("Set-Cookie", access)
                .append_header("Set-Cookie", refresh)
                .set_body_json(json!({ "authenticated": true, "message": "ok" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = crate::routes::app(test_app_state(&server.uri()))
        .oneshot(json_request("POST", "/api/auth/login", &json!({ "password": "hunter2" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(set_cookies(&response), vec![access.to_owned(), refresh.to_owned()]);
    assert_eq!(json_body(response).await, json!({ "authenticated": true, "message": "ok" }));
}

#[tokio::test]
async fn backend_rejection_keeps_its_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "authenticated": false, "message": "Invalid password" })),
        )
        .mount(&server)
        .await;

    let response = crate::routes::app(test_app_state(&server.uri()))
        .oneshot(json_request("POST", "/api/auth/login", &json!({ "password": "nope" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["message"], "Invalid password");
}

#[tokio::test]
async fn cookie_routes_forward_the_raw_cookie_header() {
    let server = MockServer::start().await;
    let cookies = "access_token=a; refresh_token=r";
    for (verb, endpoint) in [
        ("POST", "/api/v1/auth/refresh"),
        ("GET", "/api/v1/auth/verify"),
        ("GET", "/api/v1/auth/academic-status"),
        ("POST", "/api/v1/auth/logout"),
    ] {
        Mock::given(method(verb))
            .and(path(endpoint))
            .and(header("cookie", cookies))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "authenticated": true })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let app = crate::routes::app(test_app_state(&server.uri()));
    for (verb, uri) in [
        ("POST", "/api/auth/refresh"),
        ("GET", "/api/auth/verify"),
        ("GET", "/api/auth/academic-status"),
        ("POST", "/api/auth/logout"),
    ] {
        let response = app
            .clone()
            .oneshot(cookie_request(verb, uri, cookies))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{verb} {uri}");
    }
}

#[tokio::test]
async fn logout_relays_cookie_clearing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/logout"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("Set-Cookie", "access_token=; Max-Age=0; Path=/")
                .append_header("Set-Cookie", "refresh_token=; Max-Age=0; Path=/")
                .set_body_json(json!({ "message": "Logged out successfully" })),
        )
        .mount(&server)
        .await;

    let response = crate::routes::app(test_app_state(&server.uri()))
        .oneshot(cookie_request("POST", "/api/auth/logout", "access_token=a"))
        .await
        .unwrap();

    assert_eq!(set_cookies(&response).len(), 2);
}

// =============================================================================
// FALLBACKS
// =============================================================================

#[tokio::test]
async fn unreachable_backend_uses_per_route_fallbacks() {
    let app = crate::routes::app(unreachable_app_state());
    let cases = [
        (
            json_request("POST", "/api/auth/login", &json!({ "password": "x" })),
            StatusCode::BAD_GATEWAY,
            json!({ "authenticated": false, "message": "Failed to connect to server" }),
        ),
        (
            cookie_request("POST", "/api/auth/logout", "access_token=a"),
            StatusCode::OK,
            json!({ "message": "Logged out" }),
        ),
        (
            cookie_request("POST", "/api/auth/refresh", "refresh_token=r"),
            StatusCode::BAD_GATEWAY,
            json!({ "authenticated": false }),
        ),
        (
            cookie_request("GET", "/api/auth/verify", "access_token=a"),
            StatusCode::BAD_GATEWAY,
            json!({ "authenticated": false, "message": "Failed to verify" }),
        ),
        (
            cookie_request("GET", "/api/auth/academic-status", "access_token=a"),
            StatusCode::BAD_GATEWAY,
            json!({ "authenticated": false }),
        ),
        (
            json_request("POST", "/api/auth/register-academic", &json!({ "email": "a@uni.edu" })),
            StatusCode::BAD_GATEWAY,
            json!({ "authenticated": false, "message": "Failed to register" }),
        ),
    ];

    for (request, status, body) in cases {
        let uri = request.uri().clone();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), status, "{uri}");
        assert_eq!(json_body(response).await, body, "{uri}");
    }
}

#[tokio::test]
async fn non_json_backend_body_counts_as_relay_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>Internal Server Error</html>"))
        .mount(&server)
        .await;

    let response = crate::routes::app(test_app_state(&server.uri()))
        .oneshot(cookie_request("POST", "/api/auth/refresh", "refresh_token=r"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await, json!({ "authenticated": false }));
}

#[tokio::test]
async fn healthz_is_ok() {
    let response = crate::routes::app(unreachable_app_state())
        .oneshot(axum::http::Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

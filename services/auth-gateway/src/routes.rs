//! HTTP routing facade
//!
//! Maps the four public routes onto the flow engine and wraps each request
//! with a request id span, metrics, and error-to-response conversion.
//! Anything else, including a known path with the wrong method, gets
//! `404 Not Found.`.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::Router;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, on};
use pkce_auth::CookieMap;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::error::FlowError;
use crate::flow::{self, CallbackQuery, FlowConfig, SessionPhase};
use crate::metrics::{self as gateway_metrics, GatewayMetrics};

/// Shared state for all route handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub flow: Arc<FlowConfig>,
    pub http: reqwest::Client,
    pub metrics: GatewayMetrics,
}

/// Build the public router.
///
/// `max_connections` caps concurrently served requests.
pub fn build_router(state: GatewayState, max_connections: usize) -> Router {
    Router::new()
        .route("/auth/login", on(MethodFilter::GET, login_handler).fallback(not_found))
        .route(
            "/auth/callback",
            on(MethodFilter::GET, callback_handler).fallback(not_found),
        )
        .route("/auth/logout", on(MethodFilter::GET, logout_handler).fallback(not_found))
        .route("/api/me", on(MethodFilter::GET, me_handler).fallback(not_found))
        .fallback(not_found)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}

/// Every `Cookie` header on the request, merged into one jar.
fn cookie_jar(headers: &HeaderMap) -> CookieMap {
    CookieMap::parse_all(
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok()),
    )
}

/// Run one request inside a `request` span and record its outcome.
async fn observe<F>(state: &GatewayState, route: &'static str, handler: F) -> Response
where
    F: Future<Output = Response>,
{
    let request_id = new_request_id();
    let span = info_span!("request", request_id = %request_id, route);
    let started = Instant::now();
    state.metrics.requests_total.fetch_add(1, Ordering::Relaxed);

    let response = handler.instrument(span.clone()).await;

    let status = response.status();
    let elapsed = started.elapsed();
    gateway_metrics::record_request(route, status.as_u16(), elapsed.as_secs_f64());
    span.in_scope(|| {
        debug!(
            status = status.as_u16(),
            duration_ms = elapsed.as_millis() as u64,
            "request completed"
        );
    });
    response
}

/// Log, count, and render a flow failure.
///
/// `credential_cookie` is set only on routes that consumed the credential,
/// so only those can delete it.
fn fail(state: &GatewayState, err: FlowError, credential_cookie: Option<&str>) -> Response {
    let status = err.status();
    let kind = err.kind();
    if status.is_server_error() {
        state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
        error!(error = %err, kind, "request failed");
    } else {
        warn!(error = %err, kind, "request rejected");
    }

    if matches!(
        err,
        FlowError::TokenExchangeFailed { .. }
            | FlowError::RefreshFailed(_)
            | FlowError::ResourceFetchFailed(_)
            | FlowError::UpstreamTimeout(_)
    ) {
        gateway_metrics::record_upstream_error(kind);
    }
    if credential_cookie.is_some() && err.clears_credential() {
        gateway_metrics::record_credential_cleared(kind);
        info!(reason = kind, "clearing credential cookie");
    }

    err.into_response_clearing(credential_cookie)
}

async fn login_handler(State(state): State<GatewayState>) -> Response {
    observe(&state, "login", async { flow::begin_login(&state.flow) }).await
}

async fn callback_handler(
    State(state): State<GatewayState>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Response {
    observe(&state, "callback", async {
        // An undecodable query is handled like an empty one and fails the
        // state check.
        let query = match query {
            Ok(Query(q)) => q,
            Err(rejection) => {
                debug!(error = %rejection, "callback query rejected");
                CallbackQuery::default()
            }
        };
        let cookies = cookie_jar(&headers);
        debug!(
            phase = SessionPhase::of(&cookies, &state.flow.credential_cookie).as_str(),
            "callback received"
        );
        match flow::complete_callback(&state.flow, &state.http, &query, &cookies).await {
            Ok(response) => response,
            Err(err) => fail(&state, err, None),
        }
    })
    .await
}

async fn me_handler(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    observe(&state, "me", async {
        let cookies = cookie_jar(&headers);
        match flow::fetch_me(&state.flow, &state.http, &cookies).await {
            Ok(response) => response,
            Err(err) => fail(&state, err, Some(state.flow.credential_cookie.as_str())),
        }
    })
    .await
}

async fn logout_handler(State(state): State<GatewayState>) -> Response {
    observe(&state, "logout", async {
        gateway_metrics::record_credential_cleared("logout");
        flow::logout(&state.flow)
    })
    .await
}

async fn not_found(State(state): State<GatewayState>) -> Response {
    observe(&state, "not_found", async {
        (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "Not Found.",
        )
            .into_response()
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Form;
    use axum::http::Request;
    use axum::routing::{get, post};
    use common::Secret;
    use pkce_auth::{
        EncryptionKey, OAuthClient, ProviderEndpoints, clear_cookie, code_challenge, decrypt,
        encrypt,
    };
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    const KEY: [u8; 32] = [7u8; 32];

    /// Mock identity provider and resource API. Returns the base URL and a
    /// counter of requests it has served.
    async fn start_mock_provider() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let token_hits = hits.clone();
        let me_hits = hits.clone();
        let app = axum::Router::new()
            .route(
                "/token",
                post(move |Form(form): Form<HashMap<String, String>>| {
                    let hits = token_hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        let field = |k: &str| form.get(k).map(String::as_str);
                        match (field("grant_type"), field("code"), field("refresh_token")) {
                            (Some("authorization_code"), Some("abc"), _)
                                if field("code_verifier").map(str::len) == Some(128) =>
                            {
                                axum::Json(serde_json::json!({
                                    "access_token": "at0",
                                    "refresh_token": "rt1",
                                    "expires_in": 3600,
                                }))
                                .into_response()
                            }
                            (Some("authorization_code"), Some("no-refresh"), _) => {
                                axum::Json(serde_json::json!({"access_token": "at0"}))
                                    .into_response()
                            }
                            (Some("refresh_token"), _, Some("rt1")) => {
                                axum::Json(serde_json::json!({
                                    "access_token": "at1",
                                    "expires_in": 3600,
                                }))
                                .into_response()
                            }
                            (Some("refresh_token"), _, Some("slow")) => {
                                tokio::time::sleep(Duration::from_secs(2)).await;
                                axum::Json(serde_json::json!({"access_token": "at1"}))
                                    .into_response()
                            }
                            _ => (StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant"}"#)
                                .into_response(),
                        }
                    }
                }),
            )
            .route(
                "/me",
                get(move |headers: HeaderMap| {
                    let hits = me_hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                            Some("Bearer at1") => (
                                StatusCode::OK,
                                r#"{"displayName":"Alice","mail":"alice@example.com"}"#,
                            )
                                .into_response(),
                            _ => StatusCode::UNAUTHORIZED.into_response(),
                        }
                    }
                }),
            );

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), hits)
    }

    fn test_state(base: &str) -> GatewayState {
        let mut oauth = OAuthClient::new(
            "client-abc".into(),
            Secret::new("shh".into()),
            "https://app.example.com/auth/callback".into(),
        );
        oauth.endpoints = ProviderEndpoints::parse(
            &format!("{base}/authorize"),
            &format!("{base}/token"),
            &format!("{base}/me"),
        )
        .unwrap();
        oauth.timeout = Duration::from_millis(500);

        GatewayState {
            flow: Arc::new(FlowConfig {
                oauth,
                app_origin: "https://app.example.com".into(),
                encryption_key: EncryptionKey::from_bytes(KEY),
                credential_cookie: "refresh_token".into(),
            }),
            http: reqwest::Client::new(),
            metrics: GatewayMetrics::new(),
        }
    }

    async fn send(app: &Router, method: &str, uri: &str, cookie: Option<&str>) -> Response {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        app.clone()
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn set_cookies(resp: &Response) -> Vec<String> {
        resp.headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_owned())
            .collect()
    }

    fn sealed(plaintext: &str) -> String {
        encrypt(plaintext, &EncryptionKey::from_bytes(KEY)).unwrap()
    }

    #[tokio::test]
    async fn full_login_profile_logout_flow() {
        let (base, _) = start_mock_provider().await;
        let app = build_router(test_state(&base), 16);

        // Login
        let resp = send(&app, "GET", "/auth/login", None).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        let location = resp.headers()[header::LOCATION].to_str().unwrap().to_owned();
        assert!(location.starts_with(&format!("{base}/authorize?")));
        let jar = CookieMap::parse_all(set_cookies(&resp).iter().map(String::as_str));
        let state = jar.get("state").unwrap().to_owned();
        let verifier = jar.get("code_verifier").unwrap().to_owned();
        let url = reqwest::Url::parse(&location).unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params["state"], state);
        assert_eq!(params["code_challenge"], code_challenge(&verifier));

        // Callback
        let resp = send(
            &app,
            "GET",
            &format!("/auth/callback?code=abc&state={state}"),
            Some(&format!("state={state}; code_verifier={verifier}")),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()[header::LOCATION], "https://app.example.com");
        let cookies = set_cookies(&resp);
        assert_eq!(cookies.len(), 3);
        assert!(cookies[0].starts_with("refresh_token="));
        assert!(cookies[0].contains("Max-Age=2592000"));
        assert!(cookies.contains(&clear_cookie("state")));
        assert!(cookies.contains(&clear_cookie("code_verifier")));
        let credential = CookieMap::parse(&cookies[0])
            .get("refresh_token")
            .unwrap()
            .to_owned();
        assert_eq!(
            decrypt(&credential, &EncryptionKey::from_bytes(KEY)).unwrap(),
            "rt1"
        );

        // Profile
        let resp = send(
            &app,
            "GET",
            "/api/me",
            Some(&format!("refresh_token={credential}")),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
        assert!(set_cookies(&resp).is_empty());
        let body: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(body["displayName"], "Alice");

        // Logout
        let resp = send(
            &app,
            "GET",
            "/auth/logout",
            Some(&format!("refresh_token={credential}")),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            set_cookies(&resp),
            vec![clear_cookie("refresh_token")]
        );
        assert_eq!(body_text(resp).await, "Logged out.");
    }

    #[tokio::test]
    async fn callback_with_mismatched_state_is_rejected() {
        let (base, hits) = start_mock_provider().await;
        let app = build_router(test_state(&base), 16);

        let resp = send(
            &app,
            "GET",
            "/auth/callback?code=abc&state=S",
            Some("state=T; code_verifier=v"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(set_cookies(&resp).is_empty());
        assert_eq!(body_text(resp).await, "Invalid state.");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn callback_without_verifier_is_rejected() {
        let (base, hits) = start_mock_provider().await;
        let app = build_router(test_state(&base), 16);

        let resp = send(&app, "GET", "/auth/callback?code=abc&state=S", Some("state=S")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(resp).await, "Missing code or verifier.");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn callback_forwards_provider_rejection() {
        let (base, _) = start_mock_provider().await;
        let app = build_router(test_state(&base), 16);

        let resp = send(
            &app,
            "GET",
            "/auth/callback?code=bad-code&state=S",
            Some("state=S; code_verifier=v"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(set_cookies(&resp).is_empty());
        let body = body_text(resp).await;
        assert!(body.starts_with("Token exchange failed: "), "got: {body}");
        assert!(body.contains("invalid_grant"));
    }

    #[tokio::test]
    async fn callback_without_refresh_token_is_bad_gateway() {
        let (base, _) = start_mock_provider().await;
        let app = build_router(test_state(&base), 16);

        let resp = send(
            &app,
            "GET",
            "/auth/callback?code=no-refresh&state=S",
            Some("state=S; code_verifier=v"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert!(set_cookies(&resp).is_empty());
    }

    #[tokio::test]
    async fn me_without_cookie_makes_no_upstream_call() {
        let (base, hits) = start_mock_provider().await;
        let app = build_router(test_state(&base), 16);

        let resp = send(&app, "GET", "/api/me", None).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&resp).is_empty());
        assert_eq!(body_text(resp).await, "Unauthorized.");

        let resp = send(&app, "GET", "/api/me", Some("refresh_token=")).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn me_with_malformed_credential_clears_cookie() {
        let (base, hits) = start_mock_provider().await;
        let app = build_router(test_state(&base), 16);

        let resp = send(&app, "GET", "/api/me", Some("refresh_token=garbage")).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            set_cookies(&resp),
            vec![clear_cookie("refresh_token")]
        );
        assert_eq!(body_text(resp).await, "An error occurred.");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn me_with_revoked_refresh_token_clears_cookie() {
        let (base, _) = start_mock_provider().await;
        let app = build_router(test_state(&base), 16);

        let cookie = format!("refresh_token={}", sealed("revoked"));
        let resp = send(&app, "GET", "/api/me", Some(&cookie)).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(set_cookies(&resp).len(), 1);
        assert!(set_cookies(&resp)[0].contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn me_upstream_timeout_is_bad_gateway() {
        let (base, _) = start_mock_provider().await;
        let app = build_router(test_state(&base), 16);

        let cookie = format!("refresh_token={}", sealed("slow"));
        let resp = send(&app, "GET", "/api/me", Some(&cookie)).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert!(set_cookies(&resp)[0].starts_with("refresh_token=;"));
        assert_eq!(body_text(resp).await, "Upstream timed out.");
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let app = build_router(test_state("http://127.0.0.1:9"), 16);

        let resp = send(&app, "GET", "/nope", None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(resp).await, "Not Found.");
    }

    #[tokio::test]
    async fn wrong_method_is_not_found() {
        let app = build_router(test_state("http://127.0.0.1:9"), 16);

        for (method, uri) in [
            ("POST", "/auth/login"),
            ("DELETE", "/api/me"),
            ("PUT", "/auth/logout"),
        ] {
            let resp = send(&app, method, uri, None).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{method} {uri}");
            assert_eq!(body_text(resp).await, "Not Found.");
        }
    }

    #[tokio::test]
    async fn head_is_not_served_on_flow_routes() {
        let app = build_router(test_state("http://127.0.0.1:9"), 16);

        for uri in ["/auth/login", "/auth/callback", "/auth/logout", "/api/me"] {
            let resp = send(&app, "HEAD", uri, Some("refresh_token=a.b")).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "HEAD {uri}");
            assert!(set_cookies(&resp).is_empty(), "HEAD {uri}");
        }
    }

    #[tokio::test]
    async fn request_counter_tracks_every_route() {
        let state = test_state("http://127.0.0.1:9");
        let counter = state.metrics.requests_total.clone();
        let app = build_router(state, 16);

        send(&app, "GET", "/auth/login", None).await;
        send(&app, "GET", "/api/me", None).await;
        send(&app, "GET", "/missing", None).await;
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }
}

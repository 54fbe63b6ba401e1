use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::config::GatewayConfig;
use crate::{proxy, relay, GatewayError, Result};

/// Shared per-process state handed to every handler.
///
/// One reqwest client is built at startup and reused for all outbound calls;
/// timeouts are delegated to its defaults. No other state survives between
/// requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
        }
    }
}

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/anilist/token", post(relay::anilist::exchange_token))
        .route("/api/anilist/graphql", post(relay::anilist::graphql))
        .route("/api/mal/authorize", get(relay::mal::authorize))
        .route("/api/mal/callback", get(relay::mal::callback))
        .route("/api/mal/token", post(relay::mal::exchange_token))
        .route("/api/mal/api", post(relay::mal::api_call))
        .route("/api/proxy", get(proxy::fetch).options(proxy::preflight))
        .with_state(state)
}

/// Bind the configured address and serve until shutdown.
pub async fn run(config: GatewayConfig) -> Result<()> {
    let addr = config.bind_addr;
    let app = router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::Server(format!("failed to bind to {addr}: {e}")))?;
    info!(%addr, "ani-gateway listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| GatewayError::Server(format!("server failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn test_router() -> Router {
        let config = GatewayConfig::builder()
            .anilist_client_id("anilist-id")
            .anilist_client_secret("anilist-secret")
            .mal_client_id("mal-id")
            .mal_client_secret("mal-secret")
            .frontend_origin("http://localhost:5173")
            .build();
        router(AppState::new(config))
    }

    fn json_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_code_fails_fast_on_anilist_token_exchange() {
        let response = test_router()
            .oneshot(json_post("/api/anilist/token", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("code"));
    }

    #[tokio::test]
    async fn missing_code_fails_fast_on_mal_token_exchange() {
        let response = test_router()
            .oneshot(json_post("/api/mal/token", r#"{"code_verifier":"v"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn graphql_relay_requires_token_and_query() {
        let response = test_router()
            .oneshot(json_post("/api/anilist/graphql", r#"{"token":"t"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("query"));
    }

    #[tokio::test]
    async fn api_relay_rejects_unknown_methods() {
        let response = test_router()
            .oneshot(json_post(
                "/api/mal/api",
                r#"{"token":"t","endpoint":"anime/1","method":"BREW"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn authorize_answers_with_a_complete_flow() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/mal/authorize")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let auth_url = body["authUrl"].as_str().unwrap();
        assert!(auth_url.starts_with("https://myanimelist.net/v1/oauth2/authorize?"));
        assert!(auth_url.contains("code_challenge_method=S256"));
        assert!(auth_url.contains("client_id=mal-id"));
        let verifier = body["codeVerifier"].as_str().unwrap();
        assert!((43..=128).contains(&verifier.len()));
        assert_eq!(body["state"].as_str().unwrap().len(), 32);
    }

    #[tokio::test]
    async fn callback_redirects_code_and_state_to_the_front_end() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/mal/callback?code=abc&state=xyz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert_eq!(
            location,
            "http://localhost:5173/auth/mal/callback?code=abc&state=xyz"
        );
    }

    #[tokio::test]
    async fn callback_without_code_lands_on_the_error_page() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/mal/callback?state=xyz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert_eq!(location, "http://localhost:5173/auth/mal/error");
    }

    #[tokio::test]
    async fn proxy_rejects_non_http_targets() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/proxy?url=ftp%3A%2F%2Fhost%2Ffile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn proxy_without_url_is_a_cors_visible_400() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/proxy")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("url"));
    }

    #[tokio::test]
    async fn proxy_preflight_carries_open_cors() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/proxy?url=x")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }
}

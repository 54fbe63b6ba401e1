use axum::extract::State;
use axum::http::header;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use super::shared::*;
use crate::server::AppState;
use crate::Result;

/// Body of `POST /api/anilist/token`.
#[derive(Debug, Deserialize)]
pub struct TokenExchangeRequest {
    pub code: Option<String>,
}

/// Body of `POST /api/anilist/graphql`.
#[derive(Debug, Deserialize)]
pub struct GraphqlRequest {
    pub token: Option<String>,
    pub query: Option<String>,
    #[serde(default)]
    pub variables: Option<serde_json::Value>,
}

/// Exchange an AniList authorization code for tokens.
///
/// One server-to-server POST to the AniList token endpoint with the
/// gateway's client credentials; the provider's token JSON is mirrored back
/// on success, its status and body on failure. A missing `code` fails with
/// 400 before any outbound call.
pub async fn exchange_token(
    State(app): State<AppState>,
    Json(request): Json<TokenExchangeRequest>,
) -> Result<Json<ProviderTokens>> {
    let code = require_field(request.code.as_deref(), "code")?;

    let body = build_anilist_token_request(code, &app.config);
    let response = app.http.post(ANILIST_TOKEN_URL).json(&body).send().await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        error!(status, "anilist token exchange rejected");
        return Err(upstream_error(status, body));
    }

    let tokens: ProviderTokens = response.json().await?;
    Ok(Json(tokens))
}

/// Relay a GraphQL query to AniList with the caller's bearer token attached.
pub async fn graphql(
    State(app): State<AppState>,
    Json(request): Json<GraphqlRequest>,
) -> Result<Json<serde_json::Value>> {
    let token = require_field(request.token.as_deref(), "token")?;
    let query = require_field(request.query.as_deref(), "query")?;

    let payload = json!({
        "query": query,
        "variables": request.variables.unwrap_or_else(|| json!({})),
    });

    debug!("relaying anilist graphql query");
    let response = app
        .http
        .post(ANILIST_GRAPHQL_URL)
        .bearer_auth(token)
        .header(header::ACCEPT, "application/json")
        .json(&payload)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        error!(status = status.as_u16(), "anilist graphql call rejected");
        return Err(upstream_error(status.as_u16(), body));
    }

    Ok(Json(serde_json::from_str(&body)?))
}

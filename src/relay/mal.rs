use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::Json;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};
use url::Url;

use super::shared::*;
use crate::pkce::{self, PkcePair};
use crate::server::AppState;
use crate::{GatewayError, Result};

/// Response of `GET /api/mal/authorize`.
///
/// The verifier must be retained by the browser and presented again at
/// token-exchange time; the gateway is stateless and does not persist it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponse {
    pub auth_url: String,
    pub code_verifier: String,
    pub state: String,
}

/// Query of `GET /api/mal/callback`.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// Body of `POST /api/mal/token`.
#[derive(Debug, Deserialize)]
pub struct TokenExchangeRequest {
    pub code: Option<String>,
    pub code_verifier: Option<String>,
}

/// Body of `POST /api/mal/api`.
#[derive(Debug, Deserialize)]
pub struct ApiCallRequest {
    pub token: Option<String>,
    pub endpoint: Option<String>,
    #[serde(default)]
    pub params: Option<serde_json::Map<String, Value>>,
    pub method: Option<String>,
}

/// Start a MAL authorization attempt.
///
/// Generates a fresh PKCE pair and CSRF state and hands all three pieces to
/// the caller along with the authorization URL to visit.
pub async fn authorize(State(app): State<AppState>) -> Result<Json<AuthorizeResponse>> {
    let pair = PkcePair::generate();
    let state = pkce::generate_state();

    let mut url = Url::parse(MAL_AUTHORIZE_URL)?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &app.config.mal_client_id)
        .append_pair("code_challenge", &pair.challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("redirect_uri", &app.config.mal_redirect_uri)
        .append_pair("state", &state);

    Ok(Json(AuthorizeResponse {
        auth_url: url.to_string(),
        code_verifier: pair.verifier,
        state,
    }))
}

/// Receive the MAL redirect and bounce the browser back to the front end.
///
/// The code and state ride along as query parameters; a missing code lands
/// on the front end's error page instead.
pub async fn callback(
    State(app): State<AppState>,
    Query(params): Query<CallbackQuery>,
) -> Redirect {
    let origin = app.config.frontend_origin.trim_end_matches('/');
    match params.code.as_deref() {
        Some(code) if !code.is_empty() => {
            let state = params.state.as_deref().unwrap_or("");
            Redirect::to(&format!(
                "{origin}/auth/mal/callback?code={}&state={}",
                urlencoding::encode(code),
                urlencoding::encode(state),
            ))
        }
        _ => Redirect::to(&format!("{origin}/auth/mal/error")),
    }
}

/// Exchange a MAL authorization code (plus PKCE verifier) for tokens.
pub async fn exchange_token(
    State(app): State<AppState>,
    Json(request): Json<TokenExchangeRequest>,
) -> Result<Json<ProviderTokens>> {
    let code = require_field(request.code.as_deref(), "code")?;

    let form = build_mal_token_form(code, request.code_verifier.as_deref(), &app.config);
    let response = app.http.post(MAL_TOKEN_URL).form(&form).send().await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        error!(status, "mal token exchange rejected");
        return Err(upstream_error(status, body));
    }

    let tokens: ProviderTokens = response.json().await?;
    Ok(Json(tokens))
}

/// Relay an authenticated call to an arbitrary MAL REST endpoint.
///
/// `GET` calls carry their params as a query string; mutating calls to the
/// `my_list_status` endpoint family are form-urlencoded (a content-type the
/// provider mandates for those routes), everything else is JSON. The bearer
/// token is always attached, and any provider body is normalized to JSON
/// before it reaches the browser.
pub async fn api_call(
    State(app): State<AppState>,
    Json(request): Json<ApiCallRequest>,
) -> Result<Json<Value>> {
    let token = require_field(request.token.as_deref(), "token")?;
    let endpoint = require_field(request.endpoint.as_deref(), "endpoint")?;
    let method = parse_method(request.method.as_deref().unwrap_or("GET"))?;
    let params = request.params.unwrap_or_default();

    let url = format!("{MAL_API_BASE}/{}", endpoint.trim_start_matches('/'));
    debug!(%method, %url, "relaying mal api call");

    let mut outbound = app.http.request(method.clone(), &url).bearer_auth(token);
    match body_encoding(&method, endpoint) {
        BodyEncoding::Query => {
            if !params.is_empty() {
                outbound = outbound.query(&render_pairs(&params));
            }
        }
        BodyEncoding::Form => outbound = outbound.form(&render_pairs(&params)),
        BodyEncoding::Json => outbound = outbound.json(&params),
    }

    let response = outbound.send().await?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        error!(status = status.as_u16(), %url, "mal api call rejected");
        return Err(upstream_error(status.as_u16(), body));
    }

    Ok(Json(normalize_provider_body(&body)))
}

/// How the relayed call's parameters travel to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BodyEncoding {
    Query,
    Form,
    Json,
}

pub(super) fn body_encoding(method: &Method, endpoint: &str) -> BodyEncoding {
    if *method == Method::GET {
        BodyEncoding::Query
    } else if endpoint.contains("my_list_status") {
        BodyEncoding::Form
    } else {
        BodyEncoding::Json
    }
}

fn parse_method(raw: &str) -> Result<Method> {
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        other => Err(GatewayError::BadRequest(format!(
            "unsupported method: {other}"
        ))),
    }
}

/// Render JSON params as string pairs for query/form encoding.
///
/// Scalars lose their JSON quoting; anything structured keeps its JSON
/// rendering, which is what MAL expects for the few array-valued fields.
fn render_pairs(params: &serde_json::Map<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}

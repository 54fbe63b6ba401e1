use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::GatewayConfig;
use crate::{GatewayError, Result};

// Provider endpoints
pub(super) const ANILIST_TOKEN_URL: &str = "https://anilist.co/api/v2/oauth/token";
pub(super) const ANILIST_GRAPHQL_URL: &str = "https://graphql.anilist.co";
pub(super) const MAL_AUTHORIZE_URL: &str = "https://myanimelist.net/v1/oauth2/authorize";
pub(super) const MAL_TOKEN_URL: &str = "https://myanimelist.net/v1/oauth2/token";
pub(super) const MAL_API_BASE: &str = "https://api.myanimelist.net/v2";

/// Token body mirrored back from a provider on a successful exchange.
///
/// Opaque to this layer: the browser persists it and the provider governs
/// its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTokens {
    pub access_token: String,
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Reject a missing or blank request field before any outbound call is made.
pub(super) fn require_field<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(GatewayError::BadRequest(format!(
            "missing required field: {name}"
        ))),
    }
}

/// Wrap a non-2xx provider response so its status is mirrored downstream.
pub(super) fn upstream_error(status: u16, body: String) -> GatewayError {
    GatewayError::Upstream { status, body }
}

/// Build the AniList token exchange request body
pub(super) fn build_anilist_token_request(
    code: &str,
    config: &GatewayConfig,
) -> serde_json::Value {
    json!({
        "grant_type": "authorization_code",
        "client_id": config.anilist_client_id,
        "client_secret": config.anilist_client_secret,
        "redirect_uri": config.anilist_redirect_uri,
        "code": code,
    })
}

/// Build the MAL token exchange form body
///
/// MAL's token endpoint is form-urlencoded; the verifier is attached only
/// when the client completed a PKCE flow.
pub(super) fn build_mal_token_form(
    code: &str,
    verifier: Option<&str>,
    config: &GatewayConfig,
) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("client_id", config.mal_client_id.clone()),
        ("client_secret", config.mal_client_secret.clone()),
        ("grant_type", "authorization_code".to_string()),
        ("code", code.to_string()),
        ("redirect_uri", config.mal_redirect_uri.clone()),
    ];
    if let Some(verifier) = verifier {
        form.push(("code_verifier", verifier.to_string()));
    }
    form
}

/// Normalize a provider response body so callers always receive JSON.
///
/// Empty bodies become `{"success": true}`, non-JSON bodies become
/// `{"message": text}`.
pub(super) fn normalize_provider_body(text: &str) -> serde_json::Value {
    if text.trim().is_empty() {
        return json!({ "success": true });
    }
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "message": text }))
}

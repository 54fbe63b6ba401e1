//! Stream proxy and HLS manifest rewriter.
//!
//! Upstream hosts hot-link-protect their media, so the gateway fetches on the
//! browser's behalf with a spoofed header set and always answers with an open
//! CORS policy. When the upstream response is an HLS playlist, every relative
//! URI line is rewritten to point back through this route so the player's
//! segment fetches stay same-origin.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::server::AppState;
use crate::{GatewayError, Result};

/// Same-origin route rewritten playlist lines point at.
pub(crate) const PROXY_ROUTE: &str = "/api/proxy";

const SPOOFED_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const SPOOFED_ORIGIN: &str = "https://megacloud.club";
const SPOOFED_REFERER: &str = "https://megacloud.club/";

// `url` stays optional so a missing parameter reaches the handler (and its
// CORS insertion) instead of dying in the extractor.
#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    url: Option<String>,
}

/// Fetch an upstream URL and pass it through, rewriting HLS playlists.
///
/// The upstream status and content type are mirrored; this is a passthrough,
/// not a resilient fetch client, so there is no retry and any transport
/// failure surfaces as a generic 500. Every response, error or not, carries
/// `Access-Control-Allow-Origin: *`.
pub async fn fetch(State(app): State<AppState>, Query(params): Query<ProxyQuery>) -> Response {
    let mut response = match proxy_upstream(&app, params.url.as_deref()).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

async fn proxy_upstream(app: &AppState, raw_url: Option<&str>) -> Result<Response> {
    let raw_url = raw_url.ok_or_else(|| {
        GatewayError::BadRequest("missing required query parameter: url".to_string())
    })?;
    let target = decode_target(raw_url)?;
    debug!(url = %target, "proxying upstream fetch");

    let response = app
        .http
        .get(&target)
        .header(header::USER_AGENT, SPOOFED_USER_AGENT)
        .header(header::ORIGIN, SPOOFED_ORIGIN)
        .header(header::REFERER, SPOOFED_REFERER)
        .header(header::ACCEPT, "*/*")
        .send()
        .await?;

    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = response.bytes().await?;

    let mut headers = HeaderMap::new();
    if is_playlist(&content_type) {
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| GatewayError::Internal(format!("playlist is not valid UTF-8: {e}")))?;
        let rewritten = rewrite_playlist(text, &target)?;
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/vnd.apple.mpegurl"),
        );
        Ok((status, headers, rewritten).into_response())
    } else {
        if let Ok(value) = HeaderValue::from_str(&content_type) {
            if !content_type.is_empty() {
                headers.insert(header::CONTENT_TYPE, value);
            }
        }
        Ok((status, headers, bytes).into_response())
    }
}

/// Answer CORS preflights for the proxy route.
pub async fn preflight() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    (StatusCode::NO_CONTENT, headers)
}

fn is_playlist(content_type: &str) -> bool {
    // application/vnd.apple.mpegurl or application/x-mpegurl
    content_type.to_ascii_lowercase().contains("mpegurl")
}

/// Decode the `url` query parameter, tolerating multiply-escaped redirects.
///
/// Decoding repeats until no `%` remains or a pass stops changing the
/// string, so a stray literal `%` cannot spin. Callers must not rely on
/// nested percent-encoding surviving.
pub(crate) fn decode_target(raw: &str) -> Result<String> {
    let mut target = raw.to_string();
    while target.contains('%') {
        match urlencoding::decode(&target) {
            Ok(decoded) if decoded != target => target = decoded.into_owned(),
            _ => break,
        }
    }
    if !target.starts_with("http://") && !target.starts_with("https://") {
        return Err(GatewayError::BadRequest(
            "url must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(target)
}

/// Rewrite every relative URI line of a playlist to a re-proxied absolute one.
///
/// Operates per physical line: tag/comment lines (`#…`) and already-absolute
/// URLs pass through byte-identical, and line order, count, terminators
/// (LF or CRLF) and any trailing newline are preserved, since players depend
/// on tag/URI adjacency. URIs embedded in tag attributes are not rewritten.
pub(crate) fn rewrite_playlist(text: &str, manifest_url: &str) -> Result<String> {
    let base = manifest_base(manifest_url)?;
    let lines: Vec<String> = text
        .split('\n')
        .map(|line| {
            // peel a CRLF's carriage return before classifying, re-attach after
            let (body, cr) = match line.strip_suffix('\r') {
                Some(body) => (body, "\r"),
                None => (line, ""),
            };
            format!("{}{cr}", rewrite_line(body, &base))
        })
        .collect();
    Ok(lines.join("\n"))
}

/// Base for resolving relative segment references: the manifest URL with its
/// query and fragment stripped.
fn manifest_base(manifest_url: &str) -> Result<Url> {
    let mut base = Url::parse(manifest_url)?;
    base.set_query(None);
    base.set_fragment(None);
    Ok(base)
}

fn rewrite_line(line: &str, base: &Url) -> String {
    let trimmed = line.trim();
    if trimmed.is_empty()
        || trimmed.starts_with('#')
        || trimmed.starts_with("http://")
        || trimmed.starts_with("https://")
    {
        return line.to_string();
    }

    match base.join(trimmed) {
        Ok(resolved) => format!("{PROXY_ROUTE}?url={}", urlencoding::encode(resolved.as_str())),
        Err(e) => {
            // permissive by default: an unresolvable line passes through
            warn!(line = trimmed, error = %e, "failed to resolve playlist line");
            line.to_string()
        }
    }
}

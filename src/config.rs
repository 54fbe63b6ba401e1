use std::env;
use std::net::SocketAddr;

use crate::{GatewayError, Result};

/// Runtime configuration for the gateway.
///
/// Provider credentials are supplied through the environment once at startup
/// and travel through the shared server state into every handler; nothing is
/// read from ambient globals after boot.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// AniList OAuth client ID.
    pub anilist_client_id: String,
    /// AniList OAuth client secret.
    pub anilist_client_secret: String,
    /// Redirect URI registered with AniList.
    pub anilist_redirect_uri: String,
    /// MyAnimeList OAuth client ID.
    pub mal_client_id: String,
    /// MyAnimeList OAuth client secret.
    pub mal_client_secret: String,
    /// Redirect URI registered with MyAnimeList (points at this gateway's
    /// callback route).
    pub mal_redirect_uri: String,
    /// Base URL of the web front end; the MAL callback redirects here.
    pub frontend_origin: String,
    /// Listen address for the HTTP server.
    pub bind_addr: SocketAddr,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            anilist_client_id: String::new(),
            anilist_client_secret: String::new(),
            anilist_redirect_uri: "http://localhost:5173/auth/anilist/callback".to_string(),
            mal_client_id: String::new(),
            mal_client_secret: String::new(),
            mal_redirect_uri: "http://localhost:3001/api/mal/callback".to_string(),
            frontend_origin: "http://localhost:5173".to_string(),
            bind_addr: ([127, 0, 0, 1], 3001).into(),
        }
    }
}

impl GatewayConfig {
    /// Create a new config builder
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }

    /// Load the configuration from the environment.
    ///
    /// Provider credentials (`ANILIST_CLIENT_ID`, `ANILIST_CLIENT_SECRET`,
    /// `MAL_CLIENT_ID`, `MAL_CLIENT_SECRET`) are required and missing values
    /// fail startup. Redirect URIs, `FRONTEND_ORIGIN` and `BIND_ADDR` fall
    /// back to localhost development defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let bind_addr = match env::var("BIND_ADDR") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| GatewayError::Config(format!("invalid BIND_ADDR {raw:?}: {e}")))?,
            Err(_) => defaults.bind_addr,
        };

        Ok(Self {
            anilist_client_id: require_var("ANILIST_CLIENT_ID")?,
            anilist_client_secret: require_var("ANILIST_CLIENT_SECRET")?,
            anilist_redirect_uri: env::var("ANILIST_REDIRECT_URI")
                .unwrap_or(defaults.anilist_redirect_uri),
            mal_client_id: require_var("MAL_CLIENT_ID")?,
            mal_client_secret: require_var("MAL_CLIENT_SECRET")?,
            mal_redirect_uri: env::var("MAL_REDIRECT_URI").unwrap_or(defaults.mal_redirect_uri),
            frontend_origin: env::var("FRONTEND_ORIGIN").unwrap_or(defaults.frontend_origin),
            bind_addr,
        })
    }
}

fn require_var(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(GatewayError::Config(format!(
            "missing required environment variable: {name}"
        ))),
    }
}

/// Builder for [`GatewayConfig`], mainly useful in tests.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfigBuilder {
    anilist_client_id: Option<String>,
    anilist_client_secret: Option<String>,
    anilist_redirect_uri: Option<String>,
    mal_client_id: Option<String>,
    mal_client_secret: Option<String>,
    mal_redirect_uri: Option<String>,
    frontend_origin: Option<String>,
    bind_addr: Option<SocketAddr>,
}

impl GatewayConfigBuilder {
    /// Set the AniList OAuth client ID
    pub fn anilist_client_id(mut self, value: impl Into<String>) -> Self {
        self.anilist_client_id = Some(value.into());
        self
    }

    /// Set the AniList OAuth client secret
    pub fn anilist_client_secret(mut self, value: impl Into<String>) -> Self {
        self.anilist_client_secret = Some(value.into());
        self
    }

    /// Set the AniList redirect URI
    pub fn anilist_redirect_uri(mut self, value: impl Into<String>) -> Self {
        self.anilist_redirect_uri = Some(value.into());
        self
    }

    /// Set the MyAnimeList OAuth client ID
    pub fn mal_client_id(mut self, value: impl Into<String>) -> Self {
        self.mal_client_id = Some(value.into());
        self
    }

    /// Set the MyAnimeList OAuth client secret
    pub fn mal_client_secret(mut self, value: impl Into<String>) -> Self {
        self.mal_client_secret = Some(value.into());
        self
    }

    /// Set the MyAnimeList redirect URI
    pub fn mal_redirect_uri(mut self, value: impl Into<String>) -> Self {
        self.mal_redirect_uri = Some(value.into());
        self
    }

    /// Set the front-end origin the MAL callback redirects to
    pub fn frontend_origin(mut self, value: impl Into<String>) -> Self {
        self.frontend_origin = Some(value.into());
        self
    }

    /// Set the listen address
    pub fn bind_addr(mut self, value: SocketAddr) -> Self {
        self.bind_addr = Some(value);
        self
    }

    /// Build the GatewayConfig
    pub fn build(self) -> GatewayConfig {
        let defaults = GatewayConfig::default();
        GatewayConfig {
            anilist_client_id: self.anilist_client_id.unwrap_or(defaults.anilist_client_id),
            anilist_client_secret: self
                .anilist_client_secret
                .unwrap_or(defaults.anilist_client_secret),
            anilist_redirect_uri: self
                .anilist_redirect_uri
                .unwrap_or(defaults.anilist_redirect_uri),
            mal_client_id: self.mal_client_id.unwrap_or(defaults.mal_client_id),
            mal_client_secret: self.mal_client_secret.unwrap_or(defaults.mal_client_secret),
            mal_redirect_uri: self.mal_redirect_uri.unwrap_or(defaults.mal_redirect_uri),
            frontend_origin: self.frontend_origin.unwrap_or(defaults.frontend_origin),
            bind_addr: self.bind_addr.unwrap_or(defaults.bind_addr),
        }
    }
}

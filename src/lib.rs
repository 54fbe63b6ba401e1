//! # ani-gateway
//!
//! Backend-for-frontend gateway for an anime-streaming web application.
//!
//! The browser client handles all rendering and local state; this crate
//! covers the three things a browser cannot do on its own:
//!
//! - **OAuth relays**: exchange authorization codes against AniList (plain
//!   authorization-code flow) and MyAnimeList (authorization-code + PKCE)
//!   without exposing client secrets to the browser.
//! - **API relays**: forward AniList GraphQL queries and arbitrary
//!   MyAnimeList REST calls with a bearer token attached, normalizing the
//!   provider's responses to JSON.
//! - **Stream proxy**: fetch video manifests and segments past hot-link
//!   protection and CORS, rewriting relative URIs inside HLS playlists so
//!   every segment fetch stays same-origin.
//!
//! Every handler is a stateless request transform: validate input, make at
//! most one outbound call, mirror the provider's answer. No session state
//! survives between requests.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ani_gateway::{server, GatewayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::from_env()?;
//!     server::run(config).await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod pkce;

pub mod proxy;
pub mod relay;
pub mod server;

// Public API exports
pub use config::{GatewayConfig, GatewayConfigBuilder};
pub use error::{GatewayError, Result};
pub use pkce::{generate_state, PkcePair, DEFAULT_VERIFIER_BYTES};
pub use server::{router, run, AppState};

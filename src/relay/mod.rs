//! Stateless request transforms in front of the AniList and MyAnimeList APIs.
//!
//! Each handler validates its input, performs at most one server-to-server
//! call with the gateway's credentials attached, and mirrors the provider's
//! answer back to the browser.

pub mod anilist;
pub mod mal;
mod shared;

pub use shared::ProviderTokens;

//! OAuth 2.0 token exchanges against the marketplace token endpoint.
//!
//! Two exchanges exist:
//! 1. Authorization code → first credential (no credential stored yet)
//! 2. Refresh token → replacement credential (stored credential is stale)
//!
//! Neither retries. A rejected exchange is reported as "no credential" and
//! the caller decides what to do with it.

mod executor;
mod flow;

pub use executor::{HttpExecutor, HttpResponse, RequestExecutor};
pub use flow::{OAuthFlow, OAuthRequestSpec};

/// Mercado Libre token endpoint
pub const TOKEN_URL: &str = "https://api.mercadolibre.com/oauth/token";

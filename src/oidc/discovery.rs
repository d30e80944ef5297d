//! OpenID Connect discovery.
//!
//! Platform registrations may leave the authorize, token or JWKS URLs unset;
//! those are then resolved at runtime from the issuer's
//! `/.well-known/openid-configuration` document.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// The subset of the OpenID Provider Metadata this tool consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    /// Issuer identifier. Must match the issuer the document was fetched for.
    pub issuer: String,

    /// Authorization endpoint (target of the OIDC login redirect).
    pub authorization_endpoint: String,

    /// Token endpoint for the client-credentials grant (optional in the
    /// document; required before any service call).
    #[serde(default)]
    pub token_endpoint: Option<String>,

    /// JWK Set document URL (optional in the document; required before
    /// signature verification).
    #[serde(default)]
    pub jwks_uri: Option<String>,
}

/// Issuer comparison tolerant of a trailing slash, which platforms are
/// inconsistent about in their own metadata.
fn same_issuer(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

impl DiscoveryDocument {
    /// Well-known path appended to the issuer URL.
    pub const WELL_KNOWN_PATH: &'static str = "/.well-known/openid-configuration";

    /// Fetch and validate the discovery document for `issuer`.
    ///
    /// The `issuer` field inside the document must match the issuer it was
    /// fetched for; a mismatch means the URL serves metadata for somebody
    /// else and every endpoint in it is suspect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if the document is unreachable, is not
    /// valid JSON, or echoes a different issuer.
    pub async fn fetch(client: &Client, issuer: &str) -> Result<Self> {
        let url = format!("{}{}", issuer.trim_end_matches('/'), Self::WELL_KNOWN_PATH);
        debug!(url = %url, "Fetching OpenID Connect discovery document");

        let response = client.get(&url).send().await.map_err(|e| Error::Discovery {
            issuer: issuer.to_string(),
            detail: format!("request failed: {e}"),
        })?;

        if !response.status().is_success() {
            return Err(Error::Discovery {
                issuer: issuer.to_string(),
                detail: format!("HTTP {}", response.status()),
            });
        }

        let document: Self = response.json().await.map_err(|e| Error::Discovery {
            issuer: issuer.to_string(),
            detail: format!("invalid document: {e}"),
        })?;

        if !same_issuer(&document.issuer, issuer) {
            return Err(Error::Discovery {
                issuer: issuer.to_string(),
                detail: format!("document issuer mismatch: {}", document.issuer),
            });
        }

        debug!(issuer = %document.issuer, "Discovered platform endpoints");
        Ok(document)
    }
}

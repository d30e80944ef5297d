//! OIDC third-party-initiated login.
//!
//! The platform opens the flow by sending the browser to the tool's login
//! initiation endpoint with `iss`, `login_hint`, `lti_message_hint` and
//! `target_link_uri`. [`LoginInitiator`] validates the request, mints the
//! nonce/state pair and answers with a redirect to the platform's authorize
//! endpoint carrying the full OIDC authentication request.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;
use url::Url;

use super::discovery::DiscoveryDocument;
use super::state::{self, NonceStore};
use crate::registry::{PlatformRegistration, SharedRegistry};
use crate::{Error, Result};

/// Query or form parameters of a third-party-initiated login request.
///
/// Every field is optional at the wire level so that absent and empty
/// parameters produce the same `missing_parameter` error instead of a
/// framework-level deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    /// Issuer identifier of the calling platform.
    #[serde(default)]
    pub iss: Option<String>,
    /// Opaque user hint, passed through to the authorize request.
    #[serde(default)]
    pub login_hint: Option<String>,
    /// Opaque message hint, passed through verbatim.
    #[serde(default)]
    pub lti_message_hint: Option<String>,
    /// Launch URL on the tool; becomes the OIDC `redirect_uri`.
    #[serde(default)]
    pub target_link_uri: Option<String>,
}

/// Reject absent, empty and whitespace-only parameters alike.
fn require<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::MissingParameter(name)),
    }
}

/// Builds the authorize redirect that answers a login initiation.
pub struct LoginInitiator {
    registry: SharedRegistry,
    nonces: Arc<dyn NonceStore>,
    http: reqwest::Client,
    public_url: Url,
}

impl LoginInitiator {
    /// Create an initiator for a tool reachable at `public_url`.
    #[must_use]
    pub fn new(
        registry: SharedRegistry,
        nonces: Arc<dyn NonceStore>,
        http: reqwest::Client,
        public_url: Url,
    ) -> Self {
        Self {
            registry,
            nonces,
            http,
            public_url,
        }
    }

    /// Validate a login initiation and build the authorize redirect URL.
    ///
    /// Checks run in a fixed order: parameter presence, issuer resolution,
    /// then the open-redirect guard on `target_link_uri`. Only after all
    /// three pass is the nonce/state pair minted and recorded.
    ///
    /// # Errors
    ///
    /// [`Error::MissingParameter`] for an absent or empty parameter,
    /// [`Error::UnknownIssuer`] when no platform is registered for `iss`,
    /// [`Error::OpenRedirectRejected`] when `target_link_uri` does not point
    /// back at this tool, and [`Error::Discovery`] when the platform's
    /// authorize endpoint has to be discovered and the fetch fails.
    pub async fn begin(&self, request: &LoginRequest) -> Result<Url> {
        let issuer = require(&request.iss, "iss")?;
        let login_hint = require(&request.login_hint, "login_hint")?;
        let message_hint = require(&request.lti_message_hint, "lti_message_hint")?;
        let target_link_uri = require(&request.target_link_uri, "target_link_uri")?;

        let platform = self
            .registry
            .find_by_issuer(issuer)
            .await
            .ok_or_else(|| Error::UnknownIssuer(issuer.to_string()))?;

        // The redirect_uri is attacker-supplied; refusing foreign hosts keeps
        // the tool from being used as an open redirector.
        let target = Url::parse(target_link_uri)
            .map_err(|_| Error::OpenRedirectRejected(target_link_uri.to_string()))?;
        if target.host_str() != self.public_url.host_str() {
            return Err(Error::OpenRedirectRejected(target_link_uri.to_string()));
        }

        let nonce = state::generate_value();
        let login_state = state::generate_value();
        self.nonces.put(&nonce, &login_state).await;

        let mut authorize = self.authorize_url_for(&platform).await?;
        authorize
            .query_pairs_mut()
            .append_pair("client_id", &platform.client_id)
            .append_pair("response_type", "id_token")
            .append_pair("response_mode", "form_post")
            .append_pair("redirect_uri", target_link_uri)
            .append_pair("scope", "openid")
            .append_pair("state", &login_state)
            .append_pair("login_hint", login_hint)
            .append_pair("nonce", &nonce)
            .append_pair("prompt", "none")
            .append_pair("lti_message_hint", message_hint);

        info!(
            issuer = %platform.issuer,
            platform = %platform.platform_id,
            "Login initiation accepted, redirecting to authorize endpoint"
        );
        Ok(authorize)
    }

    /// Authorize URL from the registration, falling back to OIDC discovery.
    async fn authorize_url_for(&self, platform: &PlatformRegistration) -> Result<Url> {
        let raw = match &platform.authorize_url {
            Some(url) => url.clone(),
            None => {
                DiscoveryDocument::fetch(&self.http, &platform.issuer)
                    .await?
                    .authorization_endpoint
            }
        };
        Url::parse(&raw).map_err(|e| {
            Error::Config(format!(
                "authorize URL for platform '{}' is not a valid URL: {e}",
                platform.platform_id
            ))
        })
    }
}

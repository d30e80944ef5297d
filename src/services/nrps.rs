//! Names and Role Provisioning Services (NRPS) client.
//!
//! NRPS is the roster API: given the `context_memberships_url` from the
//! launch claims, it returns who is enrolled in the launching context and in
//! which roles. Unlike AGS, the member objects use snake_case member names on
//! the wire, matching the OIDC standard claims they mirror.

use std::sync::Arc;

use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::lti::{media_types, scopes};
use crate::services::ags::check_service_response;
use crate::services::token::AccessTokenService;

/// One person's membership in the launched context.
#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    /// `Active`, `Inactive` or `Deleted`; absent members count as active.
    #[serde(default)]
    pub status: Option<String>,
    /// Full display name, when the platform shares it.
    #[serde(default)]
    pub name: Option<String>,
    /// Given name, when shared.
    #[serde(default)]
    pub given_name: Option<String>,
    /// Family name, when shared.
    #[serde(default)]
    pub family_name: Option<String>,
    /// Email address, when shared.
    #[serde(default)]
    pub email: Option<String>,
    /// Stable platform user id; matches the `sub` of this person's launches.
    pub user_id: String,
    /// LIS SIS identifier, when the platform carries one.
    #[serde(default)]
    pub lis_person_sourcedid: Option<String>,
    /// Full role URIs this person holds in the context.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// The context block echoed inside a membership container.
#[derive(Debug, Clone, Deserialize)]
pub struct MembershipContext {
    /// Stable context id, matching the launch's context claim.
    pub id: String,
    /// Short label such as a course code.
    #[serde(default)]
    pub label: Option<String>,
    /// Human-readable title.
    #[serde(default)]
    pub title: Option<String>,
}

/// The membership container a platform returns for one context.
#[derive(Debug, Clone, Deserialize)]
pub struct MembershipContainer {
    /// URL of this container.
    #[serde(default)]
    pub id: Option<String>,
    /// The context the members belong to.
    pub context: MembershipContext,
    /// The roster itself.
    pub members: Vec<Member>,
}

/// NRPS operations against one platform.
pub struct NrpsClient {
    tokens: Arc<AccessTokenService>,
    http: reqwest::Client,
}

impl NrpsClient {
    /// Builds an NRPS client sharing the token service and HTTP client.
    pub fn new(tokens: Arc<AccessTokenService>, http: reqwest::Client) -> Self {
        Self { tokens, http }
    }

    /// Fetches the roster behind a launch's `context_memberships_url`.
    pub async fn list_memberships(
        &self,
        issuer: &str,
        memberships_url: &str,
    ) -> Result<MembershipContainer> {
        let token = self
            .tokens
            .get_access_token(issuer, &[scopes::NRPS_MEMBERSHIP_READONLY])
            .await?;
        debug!(url = %memberships_url, "listing memberships");

        let response = self
            .http
            .get(memberships_url)
            .bearer_auth(&token.access_token)
            .header(ACCEPT, media_types::MEMBERSHIP_CONTAINER)
            .send()
            .await?;
        let body = check_service_response(response).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

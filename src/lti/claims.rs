//! Typed claim set of a validated LTI launch.
//!
//! The identity token's payload is deserialized into [`LaunchClaims`] during
//! validation. Message-type-specific blocks (resource link, deep-linking
//! settings, service endpoints) are explicit `Option` fields rather than an
//! open claims map, so their absence is checked at the type level.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `aud` claim: either a single value or an array (RFC 7519 §4.1.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience value
    Single(String),
    /// Multiple audience values
    Multiple(Vec<String>),
}

impl Audience {
    /// All audience values, regardless of wire shape.
    #[must_use]
    pub fn values(&self) -> &[String] {
        match self {
            Self::Single(aud) => std::slice::from_ref(aud),
            Self::Multiple(auds) => auds,
        }
    }

    /// Whether `value` is among the audience values.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        self.values().iter().any(|aud| aud == value)
    }

    /// True when no audience value is present or all are empty strings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values().iter().all(String::is_empty)
    }
}

/// The validated claim set of an LTI launch message.
///
/// Produced fresh per request by the launch validator; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchClaims {
    /// Issuer: the platform's OIDC issuer identifier
    pub iss: String,
    /// Audience(s): every value must be trusted by this tool
    pub aud: Audience,
    /// The launching user (absent on anonymous launches)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiry, seconds since epoch
    pub exp: u64,
    /// Issued-at, seconds since epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// Not-before, seconds since epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
    /// Authorized party, echoed by some platforms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,
    /// Single-use nonce minted at login initiation
    pub nonce: String,
    /// LTI message type, e.g. `LtiResourceLinkRequest`
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/message_type")]
    pub message_type: String,
    /// LTI version, "1.3.0"
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/version")]
    pub version: String,
    /// Platform-side deployment of this tool
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/deployment_id")]
    pub deployment_id: String,
    /// Final launch URL inside the tool
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti/claim/target_link_uri",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_link_uri: Option<String>,
    /// Resource link being launched (resource-link messages)
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti/claim/resource_link",
        skip_serializing_if = "Option::is_none"
    )]
    pub resource_link: Option<ResourceLinkClaim>,
    /// Course / context of the launch
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti/claim/context",
        skip_serializing_if = "Option::is_none"
    )]
    pub context: Option<ContextClaim>,
    /// Roles of the launching user
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti/claim/roles",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub roles: Vec<String>,
    /// Tool-specific custom parameters
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti/claim/custom",
        default,
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub custom: HashMap<String, Value>,
    /// Platform product metadata (captured as a registry side-channel)
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti/claim/tool_platform",
        skip_serializing_if = "Option::is_none"
    )]
    pub platform: Option<PlatformClaim>,
    /// Presentation hints
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti/claim/launch_presentation",
        skip_serializing_if = "Option::is_none"
    )]
    pub launch_presentation: Option<LaunchPresentationClaim>,
    /// LIS identifiers carried over from LTI 1.x
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti/claim/lis",
        skip_serializing_if = "Option::is_none"
    )]
    pub lis: Option<LisClaim>,
    /// Assignment and Grade Services endpoint block
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti-ags/claim/endpoint",
        skip_serializing_if = "Option::is_none"
    )]
    pub ags: Option<AgsEndpointClaim>,
    /// Names and Role Provisioning Services block
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti-nrps/claim/namesroleservice",
        skip_serializing_if = "Option::is_none"
    )]
    pub nrps: Option<NrpsClaim>,
    /// Deep-linking settings (deep-linking request messages)
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti-dl/claim/deep_linking_settings",
        skip_serializing_if = "Option::is_none"
    )]
    pub deep_linking_settings: Option<DeepLinkingSettingsClaim>,
}

/// Resource link block of a launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLinkClaim {
    /// Stable platform-side identifier of the link
    pub id: String,
    /// Link title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Link description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Course / context block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextClaim {
    /// Stable platform-side context identifier
    pub id: String,
    /// Short label, e.g. a course code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Full title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Context type URIs
    #[serde(rename = "type", default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
}

/// Platform product metadata (`tool_platform` claim).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformClaim {
    /// Globally unique platform instance identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    /// Display name of the platform instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Product family, e.g. "moodle"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_family_code: Option<String>,
    /// Product version string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Platform URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Administrative contact address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
}

/// Presentation hints block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchPresentationClaim {
    /// Where the platform renders the tool: "iframe", "window", ...
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_target: Option<String>,
    /// URL the tool may send the user back to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    /// BCP 47 locale of the launch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Viewport height in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Viewport width in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

/// LIS identifiers block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LisClaim {
    /// LIS identifier of the launching user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_sourcedid: Option<String>,
    /// LIS identifier of the course offering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_offering_sourcedid: Option<String>,
    /// LIS identifier of the course section
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_section_sourcedid: Option<String>,
}

/// Assignment and Grade Services endpoint block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgsEndpointClaim {
    /// Scopes the platform grants this tool for AGS calls
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<String>,
    /// Line item collection URL for the launch context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineitems: Option<String>,
    /// URL of the line item coupled to this specific resource link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineitem: Option<String>,
}

/// Names and Role Provisioning Services block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NrpsClaim {
    /// Membership container URL for the launch context
    pub context_memberships_url: String,
    /// NRPS versions the platform supports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_versions: Vec<String>,
}

/// Deep-linking settings block of an `LtiDeepLinkingRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepLinkingSettingsClaim {
    /// Platform URL the signed response must be POSTed back to
    pub deep_link_return_url: String,
    /// Content item types the platform accepts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accept_types: Vec<String>,
    /// Presentation targets the platform accepts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accept_presentation_document_targets: Vec<String>,
    /// Acceptable media types for file items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_media_types: Option<String>,
    /// Whether multiple items may be returned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_multiple: Option<bool>,
    /// Whether the platform creates the items without further confirmation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_create: Option<bool>,
    /// Default title suggested by the platform
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Default text suggested by the platform
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Opaque platform state; must be echoed verbatim in the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

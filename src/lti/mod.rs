//! LTI 1.3 / LTI Advantage message vocabulary.
//!
//! Claim URIs, message types, scopes, and media types are defined by the
//! IMS specifications and shared by the launch validator, the deep-linking
//! signer, and the AGS/NRPS service clients.

pub mod claims;
pub mod deep_linking;

pub use claims::{
    AgsEndpointClaim, Audience, ContextClaim, DeepLinkingSettingsClaim, LaunchClaims,
    LaunchPresentationClaim, LisClaim, NrpsClaim, PlatformClaim, ResourceLinkClaim,
};
pub use deep_linking::{ContentItem, DeepLinkingResponseClaims};

/// LTI version asserted in every message
pub const LTI_VERSION: &str = "1.3.0";

/// JWT claim URIs from the LTI 1.3 core and LTI Advantage specifications
pub mod claim {
    /// Message type (`LtiResourceLinkRequest`, `LtiDeepLinkingRequest`, ...)
    pub const MESSAGE_TYPE: &str = "https://purl.imsglobal.org/spec/lti/claim/message_type";
    /// LTI version ("1.3.0")
    pub const VERSION: &str = "https://purl.imsglobal.org/spec/lti/claim/version";
    /// Platform-side deployment of this tool
    pub const DEPLOYMENT_ID: &str = "https://purl.imsglobal.org/spec/lti/claim/deployment_id";
    /// Final launch URL inside the tool
    pub const TARGET_LINK_URI: &str = "https://purl.imsglobal.org/spec/lti/claim/target_link_uri";
    /// Resource link block
    pub const RESOURCE_LINK: &str = "https://purl.imsglobal.org/spec/lti/claim/resource_link";
    /// Course/context block
    pub const CONTEXT: &str = "https://purl.imsglobal.org/spec/lti/claim/context";
    /// Launching user's roles
    pub const ROLES: &str = "https://purl.imsglobal.org/spec/lti/claim/roles";
    /// Tool-specific custom parameters
    pub const CUSTOM: &str = "https://purl.imsglobal.org/spec/lti/claim/custom";
    /// Platform product metadata
    pub const TOOL_PLATFORM: &str = "https://purl.imsglobal.org/spec/lti/claim/tool_platform";
    /// Presentation hints (document target, return URL)
    pub const LAUNCH_PRESENTATION: &str =
        "https://purl.imsglobal.org/spec/lti/claim/launch_presentation";
    /// LIS identifiers carried over from LTI 1.x
    pub const LIS: &str = "https://purl.imsglobal.org/spec/lti/claim/lis";
    /// Assignment and Grade Services endpoint block
    pub const AGS_ENDPOINT: &str = "https://purl.imsglobal.org/spec/lti-ags/claim/endpoint";
    /// Names and Role Provisioning Services block
    pub const NRPS: &str = "https://purl.imsglobal.org/spec/lti-nrps/claim/namesroleservice";
    /// Deep-linking settings block (request direction)
    pub const DL_SETTINGS: &str =
        "https://purl.imsglobal.org/spec/lti-dl/claim/deep_linking_settings";
    /// Selected content items (response direction)
    pub const DL_CONTENT_ITEMS: &str = "https://purl.imsglobal.org/spec/lti-dl/claim/content_items";
    /// Opaque platform state echoed back in the response
    pub const DL_DATA: &str = "https://purl.imsglobal.org/spec/lti-dl/claim/data";
}

/// LTI message type discriminators
pub mod message_type {
    /// Ordinary resource-link launch
    pub const RESOURCE_LINK_REQUEST: &str = "LtiResourceLinkRequest";
    /// Platform asks the tool to select content
    pub const DEEP_LINKING_REQUEST: &str = "LtiDeepLinkingRequest";
    /// Tool returns selected content items
    pub const DEEP_LINKING_RESPONSE: &str = "LtiDeepLinkingResponse";
}

/// OAuth2 scopes for LTI Advantage services
pub mod scopes {
    /// Manage line items
    pub const AGS_LINE_ITEM: &str = "https://purl.imsglobal.org/spec/lti-ags/scope/lineitem";
    /// Read line items
    pub const AGS_LINE_ITEM_READONLY: &str =
        "https://purl.imsglobal.org/spec/lti-ags/scope/lineitem.readonly";
    /// Read results
    pub const AGS_RESULT_READONLY: &str =
        "https://purl.imsglobal.org/spec/lti-ags/scope/result.readonly";
    /// Publish scores
    pub const AGS_SCORE: &str = "https://purl.imsglobal.org/spec/lti-ags/scope/score";
    /// Read context membership
    pub const NRPS_MEMBERSHIP_READONLY: &str =
        "https://purl.imsglobal.org/spec/lti-nrps/scope/contextmembership.readonly";
}

/// Media types for LTI Advantage REST exchanges
pub mod media_types {
    /// Line item collection
    pub const LINE_ITEM_CONTAINER: &str = "application/vnd.ims.lis.v2.lineitemcontainer+json";
    /// Single line item
    pub const LINE_ITEM: &str = "application/vnd.ims.lis.v2.lineitem+json";
    /// Result collection
    pub const RESULT_CONTAINER: &str = "application/vnd.ims.lis.v2.resultcontainer+json";
    /// Score publish body
    pub const SCORE: &str = "application/vnd.ims.lis.v1.score+json";
    /// Membership container
    pub const MEMBERSHIP_CONTAINER: &str =
        "application/vnd.ims.lti-nrps.v2.membershipcontainer+json";
}

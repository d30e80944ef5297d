//! Deep-linking response payloads.
//!
//! In the deep-linking workflow the platform sends an `LtiDeepLinkingRequest`
//! launch; the tool answers with a signed `LtiDeepLinkingResponse` JWT whose
//! payload lists the selected content items. These are the response-direction
//! types; the request direction is covered by
//! [`DeepLinkingSettingsClaim`](crate::lti::claims::DeepLinkingSettingsClaim).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::claims::Audience;

/// A content item the tool hands back to the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentItem {
    /// An LTI resource link the platform can launch later
    #[serde(rename = "ltiResourceLink")]
    LtiResourceLink {
        /// Item title shown by the platform
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Longer description
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// Launch URL; the platform uses the tool default when absent
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        /// Custom parameters to include in future launches of this item
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        custom: HashMap<String, String>,
    },
    /// A plain hyperlink
    #[serde(rename = "link")]
    Link {
        /// Link target
        url: String,
        /// Link title
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
}

/// Claim set of a signed `LtiDeepLinkingResponse` JWT.
///
/// Issuer and audience are reversed relative to a launch: the tool's client
/// id issues the response and the platform's issuer identifier receives it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepLinkingResponseClaims {
    /// The tool's client id as registered with the platform
    pub iss: String,
    /// The platform's issuer identifier
    pub aud: Audience,
    /// Subject of the originating launch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Issued-at, seconds since epoch
    pub iat: u64,
    /// Not-before, seconds since epoch
    pub nbf: u64,
    /// Expiry, seconds since epoch
    pub exp: u64,
    /// Fresh response nonce
    pub nonce: String,
    /// Always `LtiDeepLinkingResponse`
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/message_type")]
    pub message_type: String,
    /// LTI version, "1.3.0"
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/version")]
    pub version: String,
    /// Deployment id echoed from the originating request
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/deployment_id")]
    pub deployment_id: String,
    /// Opaque platform state echoed verbatim from the request settings
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti-dl/claim/data",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<String>,
    /// The selected content items
    #[serde(rename = "https://purl.imsglobal.org/spec/lti-dl/claim/content_items")]
    pub content_items: Vec<ContentItem>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_content_item_wire_tags() {
        // GIVEN one item of each supported type
        let items = vec![
            ContentItem::LtiResourceLink {
                title: Some("Chapter 4 quiz".to_string()),
                text: None,
                url: Some("https://tool.example/tool?activity=42".to_string()),
                custom: HashMap::new(),
            },
            ContentItem::Link {
                url: "https://tool.example/syllabus".to_string(),
                title: None,
            },
        ];

        // WHEN serialized
        let value = serde_json::to_value(&items).unwrap();

        // THEN the discriminator uses the IMS camelCase tag names and
        // absent optionals are omitted entirely
        assert_eq!(value[0]["type"], json!("ltiResourceLink"));
        assert_eq!(value[0]["title"], json!("Chapter 4 quiz"));
        assert!(value[0].get("text").is_none());
        assert!(value[0].get("custom").is_none());
        assert_eq!(value[1]["type"], json!("link"));
    }

    #[test]
    fn test_content_items_round_trip() {
        let mut custom = HashMap::new();
        custom.insert("difficulty".to_string(), "hard".to_string());
        let original = vec![ContentItem::LtiResourceLink {
            title: Some("Lab 1".to_string()),
            text: Some("Wet lab intro".to_string()),
            url: None,
            custom,
        }];

        let parsed: Vec<ContentItem> =
            serde_json::from_value(serde_json::to_value(&original).unwrap()).unwrap();

        assert_eq!(parsed, original);
    }
}

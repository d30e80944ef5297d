//! LTI launch validation — the `id_token` state machine.
//!
//! # Validation flow
//!
//! 1. Parse the token: JWT header plus an unverified peek at the payload.
//! 2. Require `iss`, `aud` and `nonce` to be present and non-empty.
//! 3. Resolve the platform registration by `(iss, aud)`; every audience
//!    value the token carries must be trusted, extras are a rejection.
//! 4. Consume the nonce (single use) and compare the echoed `state` against
//!    the one recorded at login initiation.
//! 5. Resolve the platform's verification key by the header `kid`.
//! 6. Verify the RS256 signature, `exp` (5-minute symmetric skew), `iss`,
//!    and re-check the audience on the verified payload.
//! 7. Hand the typed [`LaunchClaims`] to the caller.
//!
//! Steps run strictly in this order; the first failure is terminal and its
//! reason is preserved in the returned [`Error`]. The nonce is consumed at
//! step 4, so a launch that later fails signature checks still burns its
//! login and the user must re-initiate.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, Validation};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{debug, info};

use super::keys::KeyResolver;
use super::state::NonceStore;
use crate::lti::{Audience, LaunchClaims};
use crate::registry::SharedRegistry;
use crate::{Error, Result};

/// Symmetric clock-skew allowance for temporal claims, in seconds.
const CLOCK_SKEW_LEEWAY_SECS: u64 = 300;

/// Form body a platform POSTs to the launch endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LaunchRequest {
    /// The signed identity token.
    #[serde(default)]
    pub id_token: Option<String>,
    /// Echo of the `state` issued at login initiation.
    #[serde(default)]
    pub state: Option<String>,
    /// Sent by some platforms; not used for validation.
    #[serde(default)]
    pub scope: Option<String>,
    /// Sent by some platforms; not used for validation.
    #[serde(default)]
    pub session_state: Option<String>,
}

/// Outcome of a successfully validated launch.
#[derive(Debug, Clone)]
pub struct ValidatedLaunch {
    /// Registry id of the platform the launch was validated against.
    pub platform_id: String,
    /// Verified, typed claim set.
    pub claims: LaunchClaims,
}

/// Unverified payload peek: just enough to resolve the platform and the
/// in-flight login before any cryptography runs.
#[derive(Debug, Deserialize)]
struct PeekedClaims {
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Option<Audience>,
    #[serde(default)]
    nonce: Option<String>,
}

/// Base64url-decode the payload segment and parse it as a claim set.
fn peek_claims(token: &str) -> Result<PeekedClaims> {
    let mut parts = token.splitn(3, '.');
    let (Some(_), Some(payload), Some(_)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::MalformedToken(
            "expected three dot-separated segments".to_string(),
        ));
    };

    let bytes = base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, payload)
        .map_err(|e| Error::MalformedToken(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedToken(format!("payload is not a JSON claim set: {e}")))
}

/// Validates inbound launches against the registry, nonce store and the
/// platform's published keys.
pub struct LaunchValidator {
    registry: SharedRegistry,
    nonces: Arc<dyn NonceStore>,
    keys: Arc<KeyResolver>,
}

impl LaunchValidator {
    /// Create a validator over the given collaborators.
    #[must_use]
    pub fn new(
        registry: SharedRegistry,
        nonces: Arc<dyn NonceStore>,
        keys: Arc<KeyResolver>,
    ) -> Self {
        Self {
            registry,
            nonces,
            keys,
        }
    }

    /// Run a launch through the full validation sequence.
    ///
    /// `expected_platform` is the platform id the launch URL was addressed
    /// to, when the deployment routes launches per platform; a token that
    /// validates against a different registration is rejected even when its
    /// own claims are internally consistent.
    ///
    /// # Errors
    ///
    /// Each validation step maps to one [`Error`] variant; see the module
    /// documentation for the sequence.
    pub async fn validate(
        &self,
        request: &LaunchRequest,
        expected_platform: Option<&str>,
    ) -> Result<ValidatedLaunch> {
        let token = match request.id_token.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Err(Error::MissingParameter("id_token")),
        };

        // Step 1: syntactic parse of header and payload.
        let header =
            jsonwebtoken::decode_header(token).map_err(|e| Error::MalformedToken(e.to_string()))?;
        let peeked = peek_claims(token)?;

        // Step 2: claims needed to even route the token.
        let issuer = peeked
            .iss
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(Error::MissingClaim("iss"))?;
        let audience = peeked
            .aud
            .as_ref()
            .filter(|a| !a.is_empty())
            .ok_or(Error::MissingClaim("aud"))?;
        let nonce = peeked
            .nonce
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(Error::MissingClaim("nonce"))?;

        // Step 3: platform resolution by (iss, aud).
        let mut platform = None;
        for value in audience.values() {
            if let Some(found) = self
                .registry
                .find_by_issuer_and_client_id(issuer, value)
                .await
            {
                platform = Some(found);
                break;
            }
        }
        let platform = platform.ok_or_else(|| Error::UnknownPlatform {
            issuer: issuer.to_string(),
            audience: audience.values().join(", "),
        })?;

        // The wire format permits extra audience values; this tool does not.
        if let Some(extra) = audience
            .values()
            .iter()
            .find(|value| **value != platform.client_id)
        {
            return Err(Error::UnknownPlatform {
                issuer: issuer.to_string(),
                audience: extra.clone(),
            });
        }

        if let Some(expected) = expected_platform {
            if expected != platform.platform_id {
                debug!(
                    expected = %expected,
                    resolved = %platform.platform_id,
                    "Launch posted to the wrong platform endpoint"
                );
                return Err(Error::UnknownPlatform {
                    issuer: issuer.to_string(),
                    audience: platform.client_id.clone(),
                });
            }
        }

        // Step 4: single-use nonce plus the echoed state.
        let stored_state = self
            .nonces
            .take_and_delete(nonce)
            .await
            .ok_or_else(|| Error::Replay("nonce not issued by this tool or already used".into()))?;
        let presented_state = request.state.as_deref().unwrap_or("");
        let state_matches: bool = stored_state
            .as_bytes()
            .ct_eq(presented_state.as_bytes())
            .into();
        if !state_matches {
            return Err(Error::Replay(
                "echoed state does not match this login".into(),
            ));
        }

        // Step 5: verification key by header kid.
        let decoding_key = self.keys.resolve(&platform, header.kid.as_deref()).await?;

        // Step 6: signature and registered-claim validation.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = CLOCK_SKEW_LEEWAY_SECS;
        validation.set_issuer(&[platform.issuer.as_str()]);
        validation.set_audience(&[platform.client_id.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let token_data = jsonwebtoken::decode::<LaunchClaims>(token, &decoding_key, &validation)
            .map_err(|e| Error::SignatureOrClaim(e.to_string()))?;
        let claims = token_data.claims;

        // Re-check the full audience list on the verified payload.
        if !claims
            .aud
            .values()
            .iter()
            .all(|value| *value == platform.client_id)
        {
            return Err(Error::SignatureOrClaim(
                "audience list carries untrusted values".to_string(),
            ));
        }

        // Step 7: accepted.
        if let Some(platform_claims) = &claims.platform {
            self.registry
                .record_platform_metadata(&platform.issuer, platform_claims)
                .await;
        }
        info!(
            platform = %platform.platform_id,
            message_type = %claims.message_type,
            deployment_id = %claims.deployment_id,
            "Launch accepted"
        );

        Ok(ValidatedLaunch {
            platform_id: platform.platform_id.clone(),
            claims,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::oidc::state::InMemoryNonceStore;
    use crate::registry::{ConfigRegistry, PlatformRegistration};

    fn test_platform() -> PlatformRegistration {
        PlatformRegistration {
            platform_id: "moodle-main".to_string(),
            name: "Moodle".to_string(),
            issuer: "https://lms.example.edu".to_string(),
            client_id: "client-1".to_string(),
            authorize_url: None,
            access_token_url: None,
            jwk_set_url: Some("https://lms.example.edu/mod/lti/certs.php".to_string()),
            kid: None,
            private_key_pem: "unused".to_string(),
            public_key_pem: None,
        }
    }

    fn validator() -> (LaunchValidator, Arc<InMemoryNonceStore>) {
        let nonces = Arc::new(InMemoryNonceStore::new(Duration::from_secs(600)));
        let validator = LaunchValidator::new(
            Arc::new(ConfigRegistry::new(vec![test_platform()])),
            nonces.clone(),
            Arc::new(KeyResolver::new(
                reqwest::Client::new(),
                Duration::from_secs(3600),
            )),
        );
        (validator, nonces)
    }

    fn encode_segment(value: &serde_json::Value) -> String {
        base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            value.to_string(),
        )
    }

    /// A structurally valid JWT with a garbage signature. Enough to exercise
    /// every step before signature verification.
    fn unsigned_token(payload: &serde_json::Value) -> String {
        let header = serde_json::json!({"alg": "RS256", "typ": "JWT", "kid": "key-1"});
        format!(
            "{}.{}.c2ln",
            encode_segment(&header),
            encode_segment(payload)
        )
    }

    fn request_with(token: String, state: Option<&str>) -> LaunchRequest {
        LaunchRequest {
            id_token: Some(token),
            state: state.map(str::to_string),
            scope: None,
            session_state: None,
        }
    }

    #[tokio::test]
    async fn rejects_absent_id_token() {
        // GIVEN: a POST without an id_token
        let (validator, _) = validator();

        // WHEN/THEN: rejected before any parsing
        let err = validator
            .validate(&LaunchRequest::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter("id_token")));
    }

    #[tokio::test]
    async fn rejects_garbage_token_as_malformed() {
        // GIVEN: a token that is not a JWT at all
        let (validator, _) = validator();
        let request = request_with("definitely-not-a-jwt".to_string(), Some("s"));

        // WHEN/THEN: step 1 fails
        let err = validator.validate(&request, None).await.unwrap_err();
        assert!(matches!(err, Error::MalformedToken(_)));
    }

    #[tokio::test]
    async fn rejects_non_json_payload_as_malformed() {
        // GIVEN: three segments, but the payload is not a JSON object
        let (validator, _) = validator();
        let header = serde_json::json!({"alg": "RS256", "typ": "JWT"});
        let token = format!("{}.bm90LWpzb24.c2ln", encode_segment(&header));

        // WHEN/THEN: step 1 fails
        let err = validator
            .validate(&request_with(token, Some("s")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedToken(_)));
    }

    #[tokio::test]
    async fn rejects_missing_routing_claims() {
        let (validator, _) = validator();

        for (payload, expected) in [
            (
                serde_json::json!({"aud": "client-1", "nonce": "n"}),
                "iss",
            ),
            (
                serde_json::json!({"iss": "https://lms.example.edu", "nonce": "n"}),
                "aud",
            ),
            (
                serde_json::json!({"iss": "https://lms.example.edu", "aud": "client-1"}),
                "nonce",
            ),
            (
                serde_json::json!({"iss": "https://lms.example.edu", "aud": [], "nonce": "n"}),
                "aud",
            ),
        ] {
            // GIVEN: a token with one routing claim absent or empty
            let token = unsigned_token(&payload);

            // WHEN/THEN: step 2 names the claim
            let err = validator
                .validate(&request_with(token, Some("s")), None)
                .await
                .unwrap_err();
            assert!(
                matches!(err, Error::MissingClaim(c) if c == expected),
                "expected missing_claim {expected}, got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn rejects_unknown_issuer_audience_pair() {
        // GIVEN: a known issuer but an audience this tool never registered
        let (validator, _) = validator();
        let token = unsigned_token(&serde_json::json!({
            "iss": "https://lms.example.edu",
            "aud": "someone-elses-client",
            "nonce": "n"
        }));

        // WHEN/THEN: step 3 fails
        let err = validator
            .validate(&request_with(token, Some("s")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownPlatform { .. }));
    }

    #[tokio::test]
    async fn rejects_extra_untrusted_audience_value() {
        // GIVEN: the trusted client id plus a second, untrusted audience
        let (validator, nonces) = validator();
        nonces.put("n", "s").await;
        let token = unsigned_token(&serde_json::json!({
            "iss": "https://lms.example.edu",
            "aud": ["client-1", "attacker-client"],
            "nonce": "n"
        }));

        // WHEN: validated
        let err = validator
            .validate(&request_with(token, Some("s")), None)
            .await
            .unwrap_err();

        // THEN: the extra value is a rejection, not a tolerated extra
        match err {
            Error::UnknownPlatform { audience, .. } => {
                assert_eq!(audience, "attacker-client");
            }
            other => panic!("expected unknown_platform_or_client, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_launch_addressed_to_wrong_platform() {
        // GIVEN: a token that resolves to moodle-main but was posted to the
        // launch URL of a different registration
        let (validator, nonces) = validator();
        nonces.put("n", "s").await;
        let token = unsigned_token(&serde_json::json!({
            "iss": "https://lms.example.edu",
            "aud": "client-1",
            "nonce": "n"
        }));

        // WHEN/THEN: the platform id mismatch is a rejection
        let err = validator
            .validate(&request_with(token, Some("s")), Some("canvas-prod"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownPlatform { .. }));
    }

    #[tokio::test]
    async fn rejects_unknown_nonce_as_replay() {
        // GIVEN: a well-formed token whose nonce was never issued
        let (validator, _) = validator();
        let token = unsigned_token(&serde_json::json!({
            "iss": "https://lms.example.edu",
            "aud": "client-1",
            "nonce": "never-issued"
        }));

        // WHEN/THEN: step 4 fails
        let err = validator
            .validate(&request_with(token, Some("s")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Replay(_)));
    }

    #[tokio::test]
    async fn rejects_state_mismatch_as_replay() {
        // GIVEN: a recorded login whose state differs from the echoed one
        let (validator, nonces) = validator();
        nonces.put("n", "the-real-state").await;
        let token = unsigned_token(&serde_json::json!({
            "iss": "https://lms.example.edu",
            "aud": "client-1",
            "nonce": "n"
        }));

        // WHEN: the launch echoes a different state
        let err = validator
            .validate(&request_with(token, Some("a-forged-state")), None)
            .await
            .unwrap_err();

        // THEN: rejected, and the nonce is burned
        assert!(matches!(err, Error::Replay(_)));
        assert!(nonces.take_and_delete("n").await.is_none());
    }

    #[tokio::test]
    async fn rejects_absent_state_as_replay() {
        // GIVEN: a recorded login but a launch POST without a state field
        let (validator, nonces) = validator();
        nonces.put("n", "the-real-state").await;
        let token = unsigned_token(&serde_json::json!({
            "iss": "https://lms.example.edu",
            "aud": "client-1",
            "nonce": "n"
        }));

        // WHEN/THEN: treated like a mismatch
        let err = validator
            .validate(&request_with(token, None), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Replay(_)));
    }
}

//! Client-credentials token exchange against a platform's OAuth2 endpoint.
//!
//! LTI Advantage services are plain REST APIs guarded by bearer tokens. The
//! tool obtains them with the `client_credentials` grant, authenticating via
//! a signed JWT client assertion rather than a client secret (IMS Security
//! Framework §4). Tokens are not cached here; callers making a burst of
//! service requests should reuse the returned token themselves.

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::oidc::DiscoveryDocument;
use crate::registry::{PlatformRegistration, SharedRegistry};
use crate::signing::ResponseSigner;

/// Assertion type URN for JWT-based client authentication (RFC 7523).
pub const CLIENT_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// A granted service token, ready to present as `Authorization: Bearer`.
#[derive(Debug, Clone)]
pub struct BearerToken {
    /// The opaque token value.
    pub access_token: String,
    /// Token type as reported by the platform, normally `Bearer`.
    pub token_type: String,
    /// Lifetime in seconds, when the platform reports one.
    pub expires_in: Option<u64>,
    /// The scope actually granted, which may be narrower than requested.
    pub scope: Option<String>,
}

/// Wire shape of the token endpoint response.
///
/// Everything is optional because real platforms disagree about which fields
/// accompany an error, and at least one ships an `error` member on success.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Runs the client-credentials grant against platform token endpoints.
pub struct AccessTokenService {
    registry: SharedRegistry,
    http: reqwest::Client,
}

impl AccessTokenService {
    /// Builds a token service over the given registry and HTTP client.
    pub fn new(registry: SharedRegistry, http: reqwest::Client) -> Self {
        Self { registry, http }
    }

    /// Obtains a bearer token for the given platform and scopes.
    ///
    /// The token endpoint comes from the registration when configured and
    /// from OIDC discovery otherwise. One request is made; a failed grant is
    /// reported as [`Error::TokenExchange`] and never retried automatically,
    /// since a platform that rejects a client assertion once will keep
    /// rejecting it.
    pub async fn get_access_token(&self, issuer: &str, scopes: &[&str]) -> Result<BearerToken> {
        let platform = self
            .registry
            .find_by_issuer(issuer)
            .await
            .ok_or_else(|| Error::UnknownIssuer(issuer.to_string()))?;

        let token_endpoint = self.token_endpoint_for(&platform).await?;
        let signer = ResponseSigner::from_registration(&platform)?;
        let assertion = signer.sign_client_assertion(&platform.client_id, &token_endpoint)?;
        let scope = scopes.join(" ");

        debug!(
            issuer = %platform.issuer,
            endpoint = %token_endpoint,
            scope = %scope,
            "requesting service token"
        );

        let response = self
            .http
            .post(&token_endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_assertion_type", CLIENT_ASSERTION_TYPE),
                ("client_assertion", assertion.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let token = interpret_token_response(status, &body)?;

        info!(
            issuer = %platform.issuer,
            granted_scope = token.scope.as_deref().unwrap_or(&scope),
            expires_in = ?token.expires_in,
            "service token granted"
        );
        Ok(token)
    }

    async fn token_endpoint_for(&self, platform: &PlatformRegistration) -> Result<String> {
        if let Some(url) = &platform.access_token_url {
            return Ok(url.clone());
        }
        let document = DiscoveryDocument::fetch(&self.http, &platform.issuer).await?;
        document.token_endpoint.ok_or_else(|| Error::Discovery {
            issuer: platform.issuer.clone(),
            detail: "discovery document does not advertise a token_endpoint".to_string(),
        })
    }
}

/// Turns a raw token endpoint reply into a grant or a failure.
///
/// The deciding signal is the presence of `access_token`, not the HTTP
/// status and not the `error` member: a widely deployed platform returns
/// `"error": "Created"` alongside a perfectly valid token. That one code is
/// treated as noise; any other `error` value is a real refusal even when a
/// token is present, because we cannot tell what the platform thinks it
/// granted.
fn interpret_token_response(status: StatusCode, body: &str) -> Result<BearerToken> {
    let parsed: TokenResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(err) => {
            return Err(Error::TokenExchange {
                error: format!("http_{}", status.as_u16()),
                detail: if body.is_empty() {
                    format!("unparseable token response: {err}")
                } else {
                    truncate_detail(body)
                },
            });
        }
    };

    if let Some(error) = parsed.error.as_deref()
        && error != "Created"
    {
        return Err(Error::TokenExchange {
            error: error.to_string(),
            detail: parsed
                .error_description
                .unwrap_or_else(|| truncate_detail(body)),
        });
    }

    match parsed.access_token {
        Some(access_token) if !access_token.is_empty() => Ok(BearerToken {
            access_token,
            token_type: parsed.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_in: parsed.expires_in,
            scope: parsed.scope,
        }),
        _ => Err(Error::TokenExchange {
            error: parsed
                .error
                .unwrap_or_else(|| format!("http_{}", status.as_u16())),
            detail: parsed
                .error_description
                .unwrap_or_else(|| "token endpoint reply carried no access_token".to_string()),
        }),
    }
}

fn truncate_detail(body: &str) -> String {
    const LIMIT: usize = 512;
    if body.len() <= LIMIT {
        body.to_string()
    } else {
        let mut end = LIMIT;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpret(status: u16, body: &str) -> Result<BearerToken> {
        interpret_token_response(StatusCode::from_u16(status).unwrap(), body)
    }

    #[test]
    fn clean_grant_is_accepted() {
        let token = interpret(
            200,
            r#"{"access_token":"tok-1","token_type":"Bearer","expires_in":3600,"scope":"a b"}"#,
        )
        .unwrap();
        assert_eq!(token.access_token, "tok-1");
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, Some(3600));
        assert_eq!(token.scope.as_deref(), Some("a b"));
    }

    #[test]
    fn created_error_with_token_is_a_grant() {
        // Some platforms echo the HTTP reason phrase into the error member.
        let token = interpret(
            200,
            r#"{"access_token":"tok-2","token_type":"Bearer","error":"Created"}"#,
        )
        .unwrap();
        assert_eq!(token.access_token, "tok-2");
    }

    #[test]
    fn created_error_without_token_still_fails() {
        let err = interpret(201, r#"{"error":"Created"}"#).unwrap_err();
        match err {
            Error::TokenExchange { error, .. } => assert_eq!(error, "Created"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn created_match_is_exact() {
        let err = interpret(200, r#"{"access_token":"tok","error":"created"}"#).unwrap_err();
        match err {
            Error::TokenExchange { error, .. } => assert_eq!(error, "created"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn real_error_code_beats_a_token() {
        let err = interpret(
            200,
            r#"{"access_token":"tok","error":"invalid_scope","error_description":"scope not allowed"}"#,
        )
        .unwrap_err();
        match err {
            Error::TokenExchange { error, detail } => {
                assert_eq!(error, "invalid_scope");
                assert_eq!(detail, "scope not allowed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_token_on_success_status_fails() {
        let err = interpret(200, r#"{"token_type":"Bearer"}"#).unwrap_err();
        match err {
            Error::TokenExchange { error, .. } => assert_eq!(error, "http_200"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_token_value_fails() {
        let err = interpret(200, r#"{"access_token":""}"#).unwrap_err();
        assert!(matches!(err, Error::TokenExchange { .. }));
    }

    #[test]
    fn unparseable_body_reports_http_status() {
        let err = interpret(502, "<html>Bad Gateway</html>").unwrap_err();
        match err {
            Error::TokenExchange { error, detail } => {
                assert_eq!(error, "http_502");
                assert!(detail.contains("Bad Gateway"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn oauth_error_reply_maps_to_token_exchange() {
        let err = interpret(
            400,
            r#"{"error":"invalid_client","error_description":"assertion audience mismatch"}"#,
        )
        .unwrap_err();
        match err {
            Error::TokenExchange { error, detail } => {
                assert_eq!(error, "invalid_client");
                assert_eq!(detail, "assertion audience mismatch");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn token_type_defaults_to_bearer() {
        let token = interpret(200, r#"{"access_token":"tok-3"}"#).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, None);
    }

    #[test]
    fn oversized_error_bodies_are_truncated() {
        let body = format!("{{\"oops\": \"{}\"", "x".repeat(2048));
        let err = interpret(500, &body).unwrap_err();
        match err {
            Error::TokenExchange { detail, .. } => assert!(detail.len() < 600),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

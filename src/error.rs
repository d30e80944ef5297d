//! Error types for the LTI tool.

use std::io;

use thiserror::Error;

/// Result type alias for the LTI tool
pub type Result<T> = std::result::Result<T, Error>;

/// LTI tool errors.
///
/// Launch and login rejections carry a machine-distinguishable reason
/// ([`Error::code`]) plus a human-readable detail string; the HTTP layer maps
/// them through [`Error::http_status`]. Validation failures are values, never
/// panics: a rejected launch is an expected outcome.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required login-initiation parameter was absent or empty
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Login-initiation issuer does not match any registered platform
    #[error("Unknown issuer: {0}")]
    UnknownIssuer(String),

    /// `target_link_uri` points off this tool's host
    #[error("Refusing open redirect to: {0}")]
    OpenRedirectRejected(String),

    /// The posted token is not syntactically a JWT
    #[error("Malformed identity token: {0}")]
    MalformedToken(String),

    /// A claim required before validation can proceed is absent or empty
    #[error("Identity token is missing required claim: {0}")]
    MissingClaim(&'static str),

    /// No registered platform matches the token's `(iss, aud)` pair, or the
    /// token carries an audience value this tool does not trust
    #[error("No trusted platform for issuer {issuer} and audience {audience}")]
    UnknownPlatform {
        /// Token issuer
        issuer: String,
        /// Offending audience value (or list rendering)
        audience: String,
    },

    /// Nonce not found in the store, or the echoed state did not match:
    /// a replayed or forged launch
    #[error("Replay detected: {0}")]
    Replay(String),

    /// The platform's key set has no key matching the token's `kid`
    #[error("No key in platform JWKS matches kid: {0}")]
    UnknownKeyId(String),

    /// Network or parse failure while fetching JWKS / discovery metadata
    #[error("Key resolution failed: {0}")]
    KeyResolution(String),

    /// Signature, expiry, issuer, or audience verification failed
    #[error("Signature or claim validation failed: {0}")]
    SignatureOrClaim(String),

    /// OIDC discovery document could not be fetched or was inconsistent
    #[error("OIDC discovery failed for {issuer}: {detail}")]
    Discovery {
        /// Issuer the discovery ran against
        issuer: String,
        /// What went wrong
        detail: String,
    },

    /// The platform's token endpoint rejected the client-credentials grant.
    /// Carries the platform's error string verbatim for operator debugging.
    #[error("Token exchange failed ({error}): {detail}")]
    TokenExchange {
        /// Platform error code, verbatim
        error: String,
        /// Platform error description or response body
        detail: String,
    },

    /// An AGS/NRPS service call returned a non-success status
    #[error("Platform service call failed with status {status}: {body}")]
    UpstreamService {
        /// HTTP status returned by the platform
        status: u16,
        /// Response body, verbatim
        body: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JWT encoding error (signing-side; decode failures are mapped to
    /// [`Error::SignatureOrClaim`] at the validation site)
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Machine-readable reason code for logs and error response bodies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::MissingParameter(_) => "missing_parameter",
            Self::UnknownIssuer(_) => "unknown_issuer",
            Self::OpenRedirectRejected(_) => "open_redirect_rejected",
            Self::MalformedToken(_) => "malformed_token",
            Self::MissingClaim(_) => "missing_claim",
            Self::UnknownPlatform { .. } => "unknown_platform_or_client",
            Self::Replay(_) => "replay_detected",
            Self::UnknownKeyId(_) => "unknown_key_id",
            Self::KeyResolution(_) => "key_resolution_failed",
            Self::SignatureOrClaim(_) => "signature_or_claim_invalid",
            Self::Discovery { .. } => "discovery_failed",
            Self::TokenExchange { .. } => "token_exchange_failed",
            Self::UpstreamService { .. } => "upstream_service_failed",
            Self::Http(_) => "upstream_unreachable",
            Self::Io(_) | Self::Json(_) | Self::Jwt(_) | Self::Internal(_) => "internal",
        }
    }

    /// HTTP status this error maps to at the service boundary.
    ///
    /// Client input problems are 400, trust/validation rejections 401,
    /// upstream fetch failures 502, everything else 500.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MissingParameter(_)
            | Self::UnknownIssuer(_)
            | Self::OpenRedirectRejected(_)
            | Self::MalformedToken(_)
            | Self::MissingClaim(_) => 400,
            Self::UnknownPlatform { .. }
            | Self::Replay(_)
            | Self::UnknownKeyId(_)
            | Self::SignatureOrClaim(_) => 401,
            Self::KeyResolution(_)
            | Self::Discovery { .. }
            | Self::TokenExchange { .. }
            | Self::UpstreamService { .. }
            | Self::Http(_) => 502,
            Self::Config(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Jwt(_)
            | Self::Internal(_) => 500,
        }
    }
}

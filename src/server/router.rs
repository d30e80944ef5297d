//! HTTP routes and handlers for the tool surface.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`/`POST` | `/oidc-login` | Third-party login initiation; 302 to the platform |
//! | `POST` | `/tool` | Launch endpoint receiving the `id_token` form POST |
//! | `POST` | `/deep-link` | Sign a deep-linking response; returns the auto-submit form |
//! | `GET` | `/.well-known/jwks.json` | Tool verification keys (alias `/oauth2/jwks`) |
//! | `GET` | `/.well-known/openid-configuration` | Tool issuer metadata |
//! | `GET` | `/health` | Liveness probe |
//!
//! `/tool` accepts an optional `?platform_id=` query pinned by the platform
//! registration; when present, the launch must resolve to that platform
//! (mix-up defense for tools registered with several platforms).
//!
//! Failures render as `{"error": code, "message": detail}` with the status
//! from [`Error::http_status`].

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer, trace::TraceLayer};
use tracing::{info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::lti::deep_linking::ContentItem;
use crate::oidc::{LaunchRequest, LaunchValidator, LoginInitiator, LoginRequest, ValidatedLaunch};
use crate::registry::SharedRegistry;
use crate::signing::{self, ResponseSigner, jwk_from_public_pem};

/// Shared application state behind every handler.
pub struct AppState {
    /// The tool's public base URL, as platforms reach it.
    pub public_url: Url,
    /// Trusted platform registrations.
    pub registry: SharedRegistry,
    /// Login-initiation flow.
    pub login: LoginInitiator,
    /// Launch validation flow.
    pub launch: LaunchValidator,
}

/// Build the tool router with the standard middleware stack.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/oidc-login",
            get(login_get_handler).post(login_post_handler),
        )
        .route("/tool", post(launch_handler))
        .route("/deep-link", post(deep_link_handler))
        .route("/.well-known/jwks.json", get(jwks_handler))
        .route("/oauth2/jwks", get(jwks_handler))
        .route(
            "/.well-known/openid-configuration",
            get(openid_configuration_handler),
        )
        .layer(CatchPanicLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Login initiation ──────────────────────────────────────────────────────

/// `GET /oidc-login` — platforms sending the initiation as a query string.
async fn login_get_handler(
    State(state): State<Arc<AppState>>,
    Query(request): Query<LoginRequest>,
) -> Response {
    begin_login(&state, &request).await
}

/// `POST /oidc-login` — platforms sending the initiation as a form body.
async fn login_post_handler(
    State(state): State<Arc<AppState>>,
    Form(request): Form<LoginRequest>,
) -> Response {
    begin_login(&state, &request).await
}

async fn begin_login(state: &AppState, request: &LoginRequest) -> Response {
    match state.login.begin(request).await {
        Ok(location) => (
            StatusCode::FOUND,
            [(header::LOCATION, location.to_string())],
        )
            .into_response(),
        Err(err) => reject(&err),
    }
}

// ── Launch ────────────────────────────────────────────────────────────────

/// Query string of the launch endpoint.
#[derive(Debug, Deserialize)]
struct LaunchQuery {
    /// Platform this URL was registered for, when platform-scoped.
    #[serde(default)]
    platform_id: Option<String>,
}

/// `POST /tool` — the platform's `form_post` carrying the identity token.
async fn launch_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LaunchQuery>,
    Form(request): Form<LaunchRequest>,
) -> Response {
    match state
        .launch
        .validate(&request, query.platform_id.as_deref())
        .await
    {
        Ok(launch) => (StatusCode::OK, Json(launch_summary(&launch))).into_response(),
        Err(err) => reject(&err),
    }
}

/// Condense a validated launch into the JSON the endpoint answers with.
fn launch_summary(launch: &ValidatedLaunch) -> Value {
    let claims = &launch.claims;
    json!({
        "message_type": claims.message_type,
        "platform_id": launch.platform_id,
        "issuer": claims.iss,
        "subject": claims.sub,
        "deployment_id": claims.deployment_id,
        "context_title": claims.context.as_ref().and_then(|c| c.title.as_deref()),
        "resource_link_title": claims.resource_link.as_ref().and_then(|r| r.title.as_deref()),
        "roles": claims.roles,
        "services": {
            "line_items": claims.ags.as_ref().and_then(|a| a.lineitems.as_deref()),
            "memberships": claims.nrps.as_ref().map(|n| n.context_memberships_url.as_str()),
            "deep_link_return_url": claims
                .deep_linking_settings
                .as_ref()
                .map(|s| s.deep_link_return_url.as_str()),
        },
    })
}

// ── Deep-linking response ─────────────────────────────────────────────────

/// Body of `POST /deep-link`; every echoed value comes from the launch
/// summary of the originating `LtiDeepLinkingRequest`.
#[derive(Debug, Deserialize)]
pub struct DeepLinkSubmission {
    /// Issuer of the platform the response goes back to.
    pub issuer: String,
    /// Deployment id echoed from the originating launch.
    pub deployment_id: String,
    /// The platform's `deep_link_return_url`.
    pub return_url: String,
    /// Opaque `data` value from the deep-linking settings, echoed verbatim.
    #[serde(default)]
    pub data: Option<String>,
    /// Subject of the originating launch.
    #[serde(default)]
    pub subject: Option<String>,
    /// Content the user selected.
    #[serde(default)]
    pub content_items: Vec<ContentItem>,
}

/// `POST /deep-link` — sign the selection and hand back the return form.
async fn deep_link_handler(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<DeepLinkSubmission>,
) -> Response {
    match sign_deep_link(&state, submission).await {
        Ok(page) => Html(page).into_response(),
        Err(err) => reject(&err),
    }
}

async fn sign_deep_link(state: &AppState, submission: DeepLinkSubmission) -> Result<String> {
    let platform = state
        .registry
        .find_by_issuer(&submission.issuer)
        .await
        .ok_or_else(|| Error::UnknownIssuer(submission.issuer.clone()))?;

    let claims = signing::deep_linking_response_claims(
        &platform,
        &submission.deployment_id,
        submission.subject.as_deref(),
        submission.data.as_deref(),
        submission.content_items,
    );
    let signer = ResponseSigner::from_registration(&platform)?;
    let jwt = signer.sign_deep_linking(&claims)?;

    info!(
        issuer = %platform.issuer,
        items = claims.content_items.len(),
        "deep-linking response signed"
    );
    Ok(signing::auto_submit_form(&submission.return_url, &jwt))
}

// ── Key publication ───────────────────────────────────────────────────────

/// `GET /.well-known/jwks.json` — the tool's verification keys.
///
/// One entry per registration carrying a public key PEM; registrations
/// sharing a key (same kid) are emitted once. A key that fails to parse is
/// skipped with a warning rather than poisoning the whole set.
async fn jwks_handler(State(state): State<Arc<AppState>>) -> Response {
    let mut keys = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for platform in state.registry.all().await {
        let Some(pem) = platform.public_key_pem.as_deref() else {
            continue;
        };
        match jwk_from_public_pem(pem, platform.kid.as_deref()) {
            Ok(jwk) => {
                if seen.insert(jwk.kid.clone()) {
                    keys.push(jwk);
                }
            }
            Err(err) => {
                warn!(
                    platform = %platform.platform_id,
                    error = %err,
                    "public key not publishable, skipping"
                );
            }
        }
    }

    Json(json!({ "keys": keys })).into_response()
}

/// `GET /.well-known/openid-configuration` — minimal tool issuer metadata.
async fn openid_configuration_handler(State(state): State<Arc<AppState>>) -> Response {
    let base = state.public_url.as_str().trim_end_matches('/').to_string();
    Json(json!({
        "issuer": base,
        "jwks_uri": format!("{base}/.well-known/jwks.json"),
        "token_endpoint_auth_signing_alg_values_supported": ["RS256"],
    }))
    .into_response()
}

// ── Health ────────────────────────────────────────────────────────────────

/// `GET /health` — liveness.
async fn health_handler() -> Response {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// Log a rejection and render it through the shared error shape.
fn reject(err: &Error) -> Response {
    warn!(code = err.code(), error = %err, "request rejected");
    error_response(err.http_status(), err.code(), &err.to_string())
}

/// Create a JSON error response.
fn error_response(status: u16, error: &str, message: &str) -> Response {
    let status =
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"error": error, "message": message}))).into_response()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::lti::claims::{Audience, LaunchClaims};
    use crate::lti::{LTI_VERSION, message_type};
    use crate::oidc::{InMemoryNonceStore, KeyResolver, NonceStore};
    use crate::registry::{ConfigRegistry, PlatformRegistration};

    const TEST_PUBLIC_PEM: &str = "-----BEGIN PUBLIC KEY-----\nMIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAmWtpvUNARl+B9DenjbtD\nMcwfwkX4k7xYgkbLBJ7ON2VUPEfxHfOe50KqxX6AJzvHIaEWyOPM/J4YYIzO12nN\nzjKRElPSp5PDDigKYJePhxPl1bQnrY2A/L1GaVWx2rDjZqtldjJiuOI6CdsDT+GF\n+Twd1O4H2OMhYk6iATQqGzJQxKndHEMdQqFa2NhDpuyEl9xhcUUVUboQR0+a8hfd\noNTqhedK2ImTQ0JDFwt5e1c/XCLTj5PWfKJeHxqBYrt2hPgo8fjE0S6BX2fCOqUQ\n//4kPyI0ik5AZAOZ0o2RSEZn0GeiW3HiUl0kIMDuIMD12AMjzN5ePcHcl39zq96s\nyQIDAQAB\n-----END PUBLIC KEY-----";

    fn registration(platform_id: &str, issuer: &str) -> PlatformRegistration {
        PlatformRegistration {
            platform_id: platform_id.to_string(),
            name: "Test LMS".to_string(),
            issuer: issuer.to_string(),
            client_id: "client-1".to_string(),
            authorize_url: Some("https://lms.example.edu/auth".to_string()),
            access_token_url: None,
            jwk_set_url: None,
            kid: Some("key-1".to_string()),
            private_key_pem: String::new(),
            public_key_pem: None,
        }
    }

    fn state_with(registrations: Vec<PlatformRegistration>) -> Arc<AppState> {
        let registry: SharedRegistry = Arc::new(ConfigRegistry::new(registrations));
        let nonces: Arc<dyn NonceStore> =
            Arc::new(InMemoryNonceStore::new(Duration::from_secs(300)));
        let http = reqwest::Client::new();
        let keys = Arc::new(KeyResolver::new(http.clone(), Duration::from_secs(300)));
        let public_url = Url::parse("https://tool.example.com").unwrap();
        Arc::new(AppState {
            public_url: public_url.clone(),
            registry: Arc::clone(&registry),
            login: LoginInitiator::new(
                Arc::clone(&registry),
                Arc::clone(&nonces),
                http.clone(),
                public_url,
            ),
            launch: LaunchValidator::new(registry, nonces, keys),
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = health_handler().await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn login_with_all_parameters_redirects() {
        // GIVEN: a registered platform with a configured authorize URL
        let state = state_with(vec![registration("lms-1", "https://lms.example.edu")]);
        let request = LoginRequest {
            iss: Some("https://lms.example.edu".to_string()),
            login_hint: Some("hint".to_string()),
            lti_message_hint: Some("mh".to_string()),
            target_link_uri: Some("https://tool.example.com/tool".to_string()),
        };

        // WHEN: the initiation is handled
        let response = begin_login(&state, &request).await;

        // THEN: 302 with a Location on the platform's authorize endpoint
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(location.starts_with("https://lms.example.edu/auth?"));
    }

    #[tokio::test]
    async fn login_missing_parameter_is_a_400() {
        let state = state_with(vec![registration("lms-1", "https://lms.example.edu")]);
        let request = LoginRequest {
            iss: Some("https://lms.example.edu".to_string()),
            login_hint: None,
            lti_message_hint: Some("mh".to_string()),
            target_link_uri: Some("https://tool.example.com/tool".to_string()),
        };

        let response = begin_login(&state, &request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "missing_parameter");
        assert!(body["message"].as_str().unwrap().contains("login_hint"));
    }

    #[tokio::test]
    async fn launch_with_garbage_token_is_a_400() {
        let state = state_with(vec![registration("lms-1", "https://lms.example.edu")]);
        let request = LaunchRequest {
            id_token: Some("not-a-jwt".to_string()),
            state: None,
            scope: None,
            session_state: None,
        };

        let response = launch_handler(
            State(Arc::clone(&state)),
            Query(LaunchQuery { platform_id: None }),
            Form(request),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "malformed_token");
    }

    #[tokio::test]
    async fn deep_link_for_unknown_issuer_is_a_400() {
        let state = state_with(vec![registration("lms-1", "https://lms.example.edu")]);
        let submission = DeepLinkSubmission {
            issuer: "https://stranger.example.org".to_string(),
            deployment_id: "dep-1".to_string(),
            return_url: "https://lms.example.edu/deep_link_return".to_string(),
            data: None,
            subject: None,
            content_items: Vec::new(),
        };

        let response = deep_link_handler(State(state), Json(submission)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "unknown_issuer");
    }

    #[tokio::test]
    async fn jwks_deduplicates_shared_keys_and_skips_missing_ones() {
        // GIVEN: two registrations sharing one key, one with no public key
        let mut with_key_a = registration("lms-1", "https://lms.example.edu");
        with_key_a.public_key_pem = Some(TEST_PUBLIC_PEM.to_string());
        let mut with_key_b = registration("lms-2", "https://other.example.edu");
        with_key_b.public_key_pem = Some(TEST_PUBLIC_PEM.to_string());
        let keyless = registration("lms-3", "https://third.example.edu");
        let state = state_with(vec![with_key_a, with_key_b, keyless]);

        // WHEN: the JWKS document is rendered
        let response = jwks_handler(State(state)).await;

        // THEN: exactly one key, carrying the shared kid
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let keys = body["keys"].as_array().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0]["kid"], "key-1");
        assert_eq!(keys[0]["kty"], "RSA");
        assert_eq!(keys[0]["use"], "sig");
    }

    #[tokio::test]
    async fn openid_configuration_advertises_the_jwks() {
        let state = state_with(vec![]);
        let response = openid_configuration_handler(State(state)).await;
        let body = body_json(response).await;
        assert_eq!(body["issuer"], "https://tool.example.com");
        assert_eq!(
            body["jwks_uri"],
            "https://tool.example.com/.well-known/jwks.json"
        );
    }

    #[tokio::test]
    async fn launch_summary_surfaces_service_urls() {
        let launch = ValidatedLaunch {
            platform_id: "lms-1".to_string(),
            claims: LaunchClaims {
                iss: "https://lms.example.edu".to_string(),
                aud: Audience::Single("client-1".to_string()),
                sub: Some("user-9".to_string()),
                exp: 4_102_444_800,
                iat: None,
                nbf: None,
                azp: None,
                nonce: "n".to_string(),
                message_type: message_type::RESOURCE_LINK_REQUEST.to_string(),
                version: LTI_VERSION.to_string(),
                deployment_id: "dep-1".to_string(),
                target_link_uri: None,
                resource_link: None,
                context: None,
                roles: vec!["Learner".to_string()],
                custom: HashMap::new(),
                platform: None,
                launch_presentation: None,
                lis: None,
                ags: None,
                nrps: None,
                deep_linking_settings: None,
            },
        };

        let summary = launch_summary(&launch);
        assert_eq!(summary["message_type"], message_type::RESOURCE_LINK_REQUEST);
        assert_eq!(summary["platform_id"], "lms-1");
        assert_eq!(summary["subject"], "user-9");
        assert_eq!(summary["services"]["line_items"], Value::Null);
    }

    #[test]
    fn error_response_renders_the_shared_shape() {
        let response = error_response(401, "replay_detected", "nonce already consumed");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

//! OIDC third-party-initiated login and LTI 1.3 launch validation.
//!
//! The flow has two HTTP legs. First the platform sends the browser to the
//! login initiation endpoint; [`login::LoginInitiator`] resolves the issuer,
//! mints a nonce/state pair, records it in the [`state::NonceStore`] and
//! redirects the browser to the platform's authorize endpoint. The platform
//! then POSTs a signed `id_token` back; [`launch::LaunchValidator`] walks the
//! token through parse, claim presence, platform resolution, nonce
//! consumption, key resolution and signature checks before handing typed
//! claims to the caller.
//!
//! Submodules:
//! - [`state`] — single-use nonce store with TTL eviction
//! - [`discovery`] — OpenID Connect discovery document fetch
//! - [`keys`] — cached platform JWKS lookup and refresh
//! - [`login`] — login initiation (authorize redirect construction)
//! - [`launch`] — id_token validation state machine

pub mod discovery;
pub mod keys;
pub mod launch;
pub mod login;
pub mod state;

pub use discovery::DiscoveryDocument;
pub use keys::KeyResolver;
pub use launch::{LaunchRequest, LaunchValidator, ValidatedLaunch};
pub use login::{LoginInitiator, LoginRequest};
pub use state::{InMemoryNonceStore, NonceStore, spawn_sweeper};

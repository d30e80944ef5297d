//! LTI 1.3 Tool Library
//!
//! The tool ("client") half of LTI 1.3 / LTI Advantage for connecting to
//! learning management systems.
//!
//! # Features
//!
//! - **Login initiation**: OIDC third-party-initiated login with single-use
//!   nonce/state binding the two legs of the handshake
//! - **Launch validation**: signature, claim and anti-replay checks over the
//!   platform's `id_token` form POST against dynamically discovered JWKS
//! - **Deep linking**: signed `LtiDeepLinkingResponse` JWTs delivered via an
//!   auto-submitting return form
//! - **LTI Advantage services**: JWT client-assertion token exchange plus
//!   AGS (gradebook) and NRPS (roster) clients
//! - **Key publication**: the tool's own JWKS and issuer metadata endpoints

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod lti;
pub mod oidc;
pub mod registry;
pub mod server;
pub mod services;
pub mod signing;

pub use error::{Error, Result};
pub use lti::LTI_VERSION;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}

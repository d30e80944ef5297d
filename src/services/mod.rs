//! Platform service clients — everything the tool calls *on* the platform
//! after a launch.
//!
//! All three clients authenticate the same way: [`token::AccessTokenService`]
//! signs a client assertion and runs the client-credentials grant, then the
//! AGS and NRPS clients present the bearer token against the service URLs the
//! launch claims advertised.

pub mod ags;
pub mod nrps;
pub mod token;

pub use ags::{AgsClient, LineItem, LineItemResult, Score};
pub use nrps::{Member, MembershipContainer, NrpsClient};
pub use token::{AccessTokenService, BearerToken};

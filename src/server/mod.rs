//! HTTP server wiring.
//!
//! [`router`] owns the axum routes and handlers; [`tool`] owns process
//! lifecycle (binding, the nonce sweeper, graceful shutdown).

pub mod router;
pub mod tool;

pub use router::{AppState, create_router};
pub use tool::Tool;

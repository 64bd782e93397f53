//! REST API module for the site-manager integration
//!
//! Exposes the persisted switchover state, the aggregated health verdict and
//! the mode-change endpoint over HTTP(S).

mod auth;
mod dto;
mod handlers;
mod server;

pub use auth::{extract_token, AuthDecision, Authenticator, NoAuth, TokenReviewAuthenticator};
pub use dto::HealthResponse;
pub use server::{build_tls_server_config, router, run_server, AppState};

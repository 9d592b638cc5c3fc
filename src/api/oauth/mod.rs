//! OAuth 2.0 authorization server surface.
//!
//! Implements the authorization-code grant over the store: single-use
//! 16-character codes and non-expiring 256-character opaque access
//! tokens. Scoping is a single implicit wildcard; there is no refresh
//! grant and no token expiry.

pub mod codes;
pub mod handlers;
pub mod models;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;

/// Creates OAuth 2.0 routes
pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/oauth2/authorize", get(handlers::authorize))
        .route("/oauth2/token", post(handlers::token))
}

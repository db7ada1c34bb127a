use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// API endpoints reachable without a session: sign-in, and the access check,
/// which answers for anonymous visitors too. Paths are relative to `/api`.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /api/auth/login
        // Password sign-in through the identity provider; sets the session cookie.
        .route("/auth/login", post(handlers::login))
        // GET /api/access?path=...
        // The guard's decision for a location in the caller's session.
        .route("/access", get(handlers::check_access))
}

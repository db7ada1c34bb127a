use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Endpoints that only make sense for a signed-in identity. The router is
/// wrapped in the authentication layer in `create_router`, and each handler
/// also takes `AuthUser` for the identity itself. Paths are relative to `/api`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/me
        .route("/me", get(handlers::get_me))
        // GET /api/navigation
        // Sidebar menu for the caller's role.
        .route("/navigation", get(handlers::get_navigation))
}

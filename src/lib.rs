use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Access core: who may open which page.
pub mod guard;
pub mod roles;
pub mod route_table;
pub mod session;
pub mod shell;

// Collaborators of the core.
pub mod content;
pub mod directory;
pub mod history;
pub mod provider;

// HTTP surface.
pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;

use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use content::{ContentState, StaticContentLoader};
pub use directory::{DirectoryState, InMemoryDirectory, PostgresDirectory};
pub use provider::{AuthProviderState, MockAuthProvider, SupabaseAuthProvider};
pub use route_table::RouteTable;

/// ApiDoc
///
/// OpenAPI document for the JSON endpoints, served at `/api-docs/openapi.json`.
/// Page paths are not part of it.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::check_access, handlers::get_me, handlers::get_navigation
    ),
    components(
        schemas(
            models::Identity, models::NavLink, models::DecisionView, models::LoginRequest,
            models::LoginResponse, roles::Role, route_table::PageId,
        )
    ),
    tags(
        (name = "smartmadrassa", description = "SmartMadrassa access gate API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The shared, immutable container of every service a request may need.
#[derive(Clone)]
pub struct AppState {
    /// Profile lookups for resolving token subjects to identities.
    pub directory: DirectoryState,
    /// Password sign-in against the identity provider.
    pub auth: AuthProviderState,
    /// The role-policy table enforced by the page gate and reported by the API.
    pub routes: Arc<RouteTable>,
    /// Page content modules.
    pub content: ContentState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for DirectoryState {
    fn from_ref(app_state: &AppState) -> DirectoryState {
        app_state.directory.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects requests to the authenticated API with 401 unless `AuthUser`
/// resolves.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the API routes, the page gate fallback and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // Unknown API paths answer 404 instead of falling through to the page gate.
    let api_router = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .fallback(handlers::api_not_found);

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Liveness check for the load balancer.
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api_router)
        // Every other path is a page, gated by the route table.
        .fallback(handlers::serve_page)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span, tagged with the `x-request-id` so every log
/// line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

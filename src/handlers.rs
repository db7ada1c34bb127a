use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::{
    AppState,
    auth::{AuthUser, MaybeAuthUser, SESSION_COOKIE},
    config::Env,
    content::placeholder_html,
    guard,
    models::{DecisionView, Identity, LoginRequest, LoginResponse, NavLink},
    provider::AuthError,
    session::Session,
    shell::{self, Navigation, Shell},
};

/// Set on rendered pages whose identity must replace its provisioned password.
pub const PASSWORD_CHANGE_HEADER: HeaderName = HeaderName::from_static("x-password-change-required");

// --- Query Structs ---

/// AccessQuery
///
/// The location to check with `GET /api/access`.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct AccessQuery {
    /// Path (optionally with query) as the browser would request it.
    pub path: String,
}

fn session_of(user: Option<AuthUser>) -> Session {
    Session::resolved(user.map(|user| user.identity))
}

// --- Handlers ---

/// login
///
/// [Public Route] Signs in against the identity provider, resolves the
/// school profile and sets the session cookie. `redirect_to` is the sanitized
/// path the visitor was sent away from.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials or no profile"),
        (status = 502, description = "Identity provider unavailable")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let tokens = state
        .auth
        .sign_in(&payload.email, &payload.password)
        .await
        .map_err(|e| match e {
            AuthError::InvalidCredentials => {
                tracing::info!("sign-in rejected by identity provider");
                StatusCode::UNAUTHORIZED
            }
            AuthError::Unavailable(reason) => {
                tracing::error!(%reason, "identity provider unavailable");
                StatusCode::BAD_GATEWAY
            }
        })?;

    let expires_at = i64::try_from(tokens.expires_in)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| {
            tracing::error!(expires_in = tokens.expires_in, "identity provider returned an unusable token lifetime");
            StatusCode::BAD_GATEWAY
        })?;

    let identity = state
        .directory
        .resolve(tokens.account_id, Some(&tokens.email))
        .await
        .ok_or_else(|| {
            tracing::warn!(account_id = %tokens.account_id, "signed-in account has no profile");
            StatusCode::UNAUTHORIZED
        })?;

    let secure = if state.config.env == Env::Production { "; Secure" } else { "" };
    let cookie = format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{secure}",
        tokens.access_token, tokens.expires_in
    );

    tracing::info!(user_id = %identity.id, role = %identity.role, "signed in");

    let response = LoginResponse {
        access_token: tokens.access_token,
        expires_at,
        identity,
        redirect_to: guard::return_target(payload.from.as_deref()),
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(response)))
}

/// check_access
///
/// [Public Route] The access decision for `path` in the caller's session, as
/// the page gate would make it. Lets a client-side router share the policy.
#[utoipa::path(
    get,
    path = "/api/access",
    params(AccessQuery),
    responses((status = 200, description = "Decision", body = DecisionView))
)]
pub async fn check_access(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    Query(query): Query<AccessQuery>,
) -> Json<DecisionView> {
    let decision = shell::decide(&state.routes, &query.path, &session_of(user));
    Json(DecisionView::from(&decision))
}

/// get_me
///
/// [Authenticated Route] The caller's identity.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current identity", body = Identity),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn get_me(AuthUser { identity }: AuthUser) -> Json<Identity> {
    Json(identity)
}

/// get_navigation
///
/// [Authenticated Route] The sidebar menu for the caller's role, derived from
/// the same table the page gate enforces.
#[utoipa::path(
    get,
    path = "/api/navigation",
    responses(
        (status = 200, description = "Menu entries", body = [NavLink]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn get_navigation(
    AuthUser { identity }: AuthUser,
    State(state): State<AppState>,
) -> Json<Vec<NavLink>> {
    Json(state.routes.navigation_for(identity.role))
}

/// api_not_found
///
/// Fallback for unknown paths under `/api`.
pub async fn api_not_found(uri: Uri) -> StatusCode {
    tracing::debug!(%uri, "no API route");
    StatusCode::NOT_FOUND
}

/// serve_page
///
/// Fallback for every non-API path: runs the request through the shell and
/// answers with the page or a `303` redirect.
pub async fn serve_page(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let location = uri
        .path_and_query()
        .map(|path_and_query| path_and_query.as_str())
        .unwrap_or("/");

    // Each request gets its own shell so concurrent requests never supersede each other.
    let shell = Shell::new(state.routes.clone(), state.content.clone());

    match shell.navigate(location, &session_of(user)).await {
        Navigation::Rendered(page) => {
            let mut response = Html(page.content.html).into_response();
            if page.password_change_required {
                response
                    .headers_mut()
                    .insert(PASSWORD_CHANGE_HEADER, HeaderValue::from_static("true"));
            }
            response
        }
        Navigation::Redirected(redirect) => Redirect::to(&redirect.location()).into_response(),
        // Request sessions are always resolved, so this arm only keeps the match exhaustive.
        Navigation::Pending => (
            [
                (HeaderName::from_static("refresh"), "1"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            Html(placeholder_html()),
        )
            .into_response(),
        Navigation::Abandoned => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        Navigation::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

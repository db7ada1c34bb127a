use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    guard::Decision,
    roles::Role,
    route_table::PageId,
};

// --- Core Schemas ---

/// Identity
///
/// The authenticated user record, resolved from the profile directory once the
/// identity provider has vouched for the account. The role is the only field
/// page access depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Identity {
    // Same id as the identity provider's account.
    pub id: Uuid,
    // Display name shown in the layout header.
    pub name: String,
    pub email: String,
    pub role: Role,
    pub avatar: Option<String>,
    // Set on accounts created by an administrator; cleared after the first password change.
    #[serde(default)]
    pub must_change_password: bool,
}

/// NavLink
///
/// One entry of the sidebar menu, derived from the route table for a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NavLink {
    pub path: String,
    pub page: PageId,
    /// Translation key of the menu label (e.g. `sidebar.grades`).
    pub label_key: String,
}

/// DecisionView
///
/// JSON rendering of a guard decision, returned by `GET /api/access` so a
/// client-side router can consult the same policy as the page gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DecisionView {
    /// One of `allow`, `pending`, `redirect`.
    pub outcome: String,
    /// Redirect target, only for `redirect`.
    pub location: Option<String>,
    /// The originally requested path carried by a login redirect.
    pub from: Option<String>,
}

impl From<&Decision> for DecisionView {
    fn from(decision: &Decision) -> Self {
        match decision {
            Decision::Allow => Self {
                outcome: "allow".to_string(),
                location: None,
                from: None,
            },
            Decision::Pending => Self {
                outcome: "pending".to_string(),
                location: None,
                from: None,
            },
            Decision::Redirect(redirect) => Self {
                outcome: "redirect".to_string(),
                location: Some(redirect.to.clone()),
                from: redirect.from.clone(),
            },
        }
    }
}

// --- Request Payloads ---

/// LoginRequest
///
/// Input payload for `POST /api/auth/login`. The password is forwarded to the
/// identity provider and never stored or logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    #[schema(example = "director@smartmadrassa.test")]
    pub email: String,
    pub password: String,
    /// The path the user was sent away from, as carried by the login redirect.
    #[schema(example = "/grades")]
    pub from: Option<String>,
}

// --- Response Payloads ---

/// LoginResponse
///
/// Issued after a successful sign-in. `redirect_to` is the sanitized return
/// path the client should navigate to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub access_token: String,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
    pub identity: Identity,
    pub redirect_to: String,
}

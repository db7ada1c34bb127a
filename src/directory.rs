use async_trait::async_trait;
use sqlx::PgPool;
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};
use uuid::Uuid;

use crate::{models::Identity, roles::Role};

/// Display name used for profiles that never set one.
pub const DEFAULT_DISPLAY_NAME: &str = "Utilisateur";

/// Directory Trait
///
/// Read access to the profile store that maps identity-provider accounts to
/// school identities. Lookups that fail in the backend are logged and reported
/// as absent: to the guard a broken lookup and a missing profile look the same.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn get_identity(&self, id: Uuid) -> Option<Identity>;

    async fn find_by_email(&self, email: &str) -> Option<Identity>;

    /// Resolves an account: by id first, then by email for profiles that were
    /// provisioned before the account existed.
    async fn resolve(&self, id: Uuid, email: Option<&str>) -> Option<Identity> {
        if let Some(identity) = self.get_identity(id).await {
            return Some(identity);
        }
        let identity = self.find_by_email(email?).await?;
        tracing::debug!(account_id = %id, profile_id = %identity.id, "profile resolved by email");
        Some(identity)
    }
}

/// DirectoryState
///
/// The concrete type used to share the profile directory across the application state.
pub type DirectoryState = Arc<dyn Directory>;

// --- Postgres ---

const SELECT_BY_ID: &str = r#"
    SELECT id, name, email, role, avatar_url, must_change_password
    FROM profiles
    WHERE id = $1
"#;

const SELECT_BY_EMAIL: &str = r#"
    SELECT id, name, email, role, avatar_url, must_change_password
    FROM profiles
    WHERE lower(email) = lower($1)
    LIMIT 1
"#;

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    name: Option<String>,
    email: String,
    // Stored as text; anything outside the role enum is rejected on read.
    role: String,
    avatar_url: Option<String>,
    must_change_password: Option<bool>,
}

impl ProfileRow {
    fn into_identity(self) -> Option<Identity> {
        let role = match self.role.parse::<Role>() {
            Ok(role) => role,
            Err(e) => {
                tracing::warn!(profile_id = %self.id, error = %e, "profile role not recognised; ignoring profile");
                return None;
            }
        };
        Some(Identity {
            id: self.id,
            name: self
                .name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            email: self.email,
            role,
            avatar: self.avatar_url,
            must_change_password: self.must_change_password.unwrap_or(false),
        })
    }
}

/// PostgresDirectory
///
/// Profile lookups against the `profiles` table.
pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PostgresDirectory {
    async fn get_identity(&self, id: Uuid) -> Option<Identity> {
        match sqlx::query_as::<_, ProfileRow>(SELECT_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(row) => row.and_then(ProfileRow::into_identity),
            Err(e) => {
                tracing::error!("get_identity error: {:?}", e);
                None
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Option<Identity> {
        match sqlx::query_as::<_, ProfileRow>(SELECT_BY_EMAIL)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(row) => row.and_then(ProfileRow::into_identity),
            Err(e) => {
                tracing::error!("find_by_email error: {:?}", e);
                None
            }
        }
    }
}

// --- In-Memory ---

/// InMemoryDirectory
///
/// A profile directory held in memory, for local runs without a database and
/// for tests.
#[derive(Default)]
pub struct InMemoryDirectory {
    profiles: RwLock<HashMap<Uuid, Identity>>,
}

impl InMemoryDirectory {
    pub fn new(identities: impl IntoIterator<Item = Identity>) -> Self {
        let directory = Self::default();
        for identity in identities {
            directory.insert(identity);
        }
        directory
    }

    pub fn insert(&self, identity: Identity) {
        self.profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.id, identity);
    }

    pub fn remove(&self, id: Uuid) -> Option<Identity> {
        self.profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn get_identity(&self, id: Uuid) -> Option<Identity> {
        self.profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    async fn find_by_email(&self, email: &str) -> Option<Identity> {
        self.profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|identity| identity.email.eq_ignore_ascii_case(email))
            .cloned()
    }
}

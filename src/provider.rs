use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use reqwest::StatusCode;
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{Claims, JWT_AUDIENCE};

/// Tokens issued by the identity provider for a successful sign-in.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub access_token: String,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: u64,
    pub account_id: Uuid,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// AuthProvider
///
/// The hosted identity service's password sign-in. Session validation does not
/// go through here: issued tokens are verified locally by the `AuthUser` extractor.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthTokens, AuthError>;
}

/// The concrete type used to share the identity provider across the application state.
pub type AuthProviderState = Arc<dyn AuthProvider>;

// --- Hosted Provider (Supabase GoTrue) ---

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: Uuid,
    email: Option<String>,
}

/// SupabaseAuthProvider
///
/// Signs users in through the provider's password grant endpoint
/// (`POST /auth/v1/token?grant_type=password`).
#[derive(Clone)]
pub struct SupabaseAuthProvider {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseAuthProvider {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthTokens, AuthError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(AuthError::Unavailable(format!("unexpected status {status}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        Ok(AuthTokens {
            access_token: body.access_token,
            expires_in: body.expires_in,
            account_id: body.user.id,
            email: body.user.email.unwrap_or_else(|| email.to_string()),
        })
    }
}

// --- Local Mock ---

/// MockAuthProvider
///
/// Signs in against a fixed set of accounts and issues tokens signed with the
/// configured secret, so the rest of the stack sees the same tokens the hosted
/// provider would issue. For local runs and tests only.
pub struct MockAuthProvider {
    secret: String,
    ttl_secs: u64,
    accounts: HashMap<String, (String, Uuid)>,
}

impl MockAuthProvider {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
            ttl_secs: 3600,
            accounts: HashMap::new(),
        }
    }

    pub fn with_account(mut self, email: &str, password: &str, account_id: Uuid) -> Self {
        self.accounts.insert(
            email.to_ascii_lowercase(),
            (password.to_string(), account_id),
        );
        self
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthTokens, AuthError> {
        let account_id = match self.accounts.get(&email.to_ascii_lowercase()) {
            Some((expected, account_id)) if expected == password => *account_id,
            _ => return Err(AuthError::InvalidCredentials),
        };

        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: account_id,
            email: Some(email.to_string()),
            aud: JWT_AUDIENCE.to_string(),
            iat: now,
            exp: now + self.ttl_secs as usize,
        };
        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        Ok(AuthTokens {
            access_token,
            expires_in: self.ttl_secs,
            account_id,
            email: email.to_string(),
        })
    }
}

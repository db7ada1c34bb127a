use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    directory::DirectoryState,
    models::Identity,
};

/// Cookie carrying the session token for page requests.
pub const SESSION_COOKIE: &str = "sm_session";

/// Audience the identity provider stamps on signed-in users' tokens.
pub const JWT_AUDIENCE: &str = "authenticated";

/// Claims
///
/// The payload of a session token issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the account id, which is also the profile id.
    pub sub: Uuid,
    /// Used to find profiles provisioned under the email before the account existed.
    #[serde(default)]
    pub email: Option<String>,
    pub aud: String,
    pub exp: usize,
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: Identity,
}

/// AuthUser Extractor Implementation
///
/// Resolves the request's identity:
/// 1. Local bypass: in `Env::Local`, an `x-user-id` header naming a known profile.
/// 2. Token: the `Authorization: Bearer` header, or the session cookie.
/// 3. Validation: signature, audience and expiry of the token.
/// 4. Profile lookup: by account id, falling back to the token's email.
///
/// Rejection: `StatusCode::UNAUTHORIZED` on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    DirectoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let directory = DirectoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| Uuid::parse_str(value).ok());
            if let Some(user_id) = bypass_id {
                if let Some(identity) = directory.get_identity(user_id).await {
                    return Ok(AuthUser { identity });
                }
            }
        }

        let token = bearer_token(parts)
            .or_else(|| cookie_token(parts))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let claims = decode_claims(token, &config.jwt_secret)?;

        let identity = directory
            .resolve(claims.sub, claims.email.as_deref())
            .await
            .ok_or_else(|| {
                // Valid token, but no profile: the account was never provisioned or was deleted.
                tracing::info!(account_id = %claims.sub, "token has no matching profile");
                StatusCode::UNAUTHORIZED
            })?;

        Ok(AuthUser { identity })
    }
}

/// MaybeAuthUser
///
/// The optional form of `AuthUser` for routes that serve anonymous visitors
/// too. Never rejects.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    DirectoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(AuthUser::from_request_parts(parts, state).await.ok()))
    }
}

fn decode_claims(token: &str, secret: &str) -> Result<Claims, StatusCode> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.set_audience(&[JWT_AUDIENCE]);

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("session token expired"),
                kind => tracing::debug!(?kind, "session token rejected"),
            }
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn cookie_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
        })
}

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, NodeEnv},
    context::Context,
    error::RpcError,
    models::Session,
    repository::RepositoryState,
};

/// Cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "session-token";
/// Development-only login header: the value is a user id.
pub const DEV_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of a session token. Tokens are minted by the identity service; this
/// crate only verifies them.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: Uuid,
    /// Expiration time (seconds since epoch).
    pub exp: usize,
    /// Issued at (seconds since epoch).
    pub iat: usize,
}

/// SessionResolver
///
/// Builds the optional session for an incoming request. An `Err` means the
/// context could not be built at all (the whole request fails); an
/// unrecognised or expired credential is simply `Ok(None)`.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Session>, RpcError>;
}

pub type SessionState = Arc<dyn SessionResolver>;

/// create_context
///
/// Per-request context creation; awaited before any guard runs. A resolver
/// failure fails the request as `INTERNAL_SERVER_ERROR`.
pub async fn create_context(
    resolver: &dyn SessionResolver,
    headers: &HeaderMap,
) -> Result<Context, RpcError> {
    let session = resolver.resolve(headers).await.map_err(|e| {
        tracing::error!("create_context error: {}", e);
        RpcError::internal("Failed to create context")
    })?;
    Ok(Context { session })
}

/// JwtSessionResolver
///
/// Resolves sessions from an HS256 token in the `Authorization: Bearer` header
/// or the [`SESSION_COOKIE`] cookie, then loads the user from the repository.
///
/// A valid token whose user no longer exists yields a session without a user,
/// which `is_authed` rejects like an anonymous request.
pub struct JwtSessionResolver {
    repo: RepositoryState,
    decoding_key: DecodingKey,
    node_env: NodeEnv,
}

impl JwtSessionResolver {
    pub fn new(repo: RepositoryState, config: &AppConfig) -> Self {
        Self {
            repo,
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            node_env: config.node_env,
        }
    }

    // Local development bypass: `x-user-id: <uuid>` logs in as that user.
    async fn resolve_dev_header(&self, headers: &HeaderMap) -> Option<Session> {
        let user_id = headers
            .get(DEV_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())?;

        let user = self.repo.get_user(user_id).await?;
        Some(Session {
            user: Some(user),
            expires: Utc::now() + Duration::hours(1),
        })
    }
}

#[async_trait]
impl SessionResolver for JwtSessionResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Session>, RpcError> {
        if self.node_env.is_development() {
            if let Some(session) = self.resolve_dev_header(headers).await {
                return Ok(Some(session));
            }
        }

        let Some(token) = extract_token(headers) else {
            return Ok(None);
        };

        let mut validation = Validation::default();
        validation.validate_exp = true;

        let claims = match decode::<Claims>(&token, &self.decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                match e.kind() {
                    ErrorKind::ExpiredSignature => tracing::debug!("session token expired"),
                    _ => tracing::debug!("session token rejected: {}", e),
                }
                return Ok(None);
            }
        };

        let Some(expires) = i64::try_from(claims.exp)
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        else {
            tracing::debug!(exp = claims.exp, "session token rejected: expiry out of range");
            return Ok(None);
        };
        let user = self.repo.get_user(claims.sub).await;

        Ok(Some(Session { user, expires }))
    }
}

/// Bearer header first, then the session cookie.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);
    if bearer.is_some() {
        return bearer;
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Principal;
use crate::db::{sessions, users};
use crate::errors::AppError;
use crate::models::user::User;
use crate::store::with_timeout;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            exp_hours,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;

        if exp_hours <= 0 {
            return Err(AppError::configuration("JWT_EXP_HOURS must be positive"));
        }

        Ok(Self::new(secret.into_bytes(), exp_hours))
    }

    /// Lifetime of a session issued at login.
    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.exp_hours)
    }

    /// Signs a token for one session; it expires together with the session.
    pub fn encode(&self, user_id: Uuid, session_id: Uuid, expires_at: DateTime<Utc>) -> Result<String, AppError> {
        let claims = Claims {
            sub: user_id,
            sid: session_id,
            exp: expires_at.timestamp() as usize,
            iat: Utc::now().timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    /// Session id
    pub sid: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// The authenticated caller: a live session of an active user, with the
/// role resolved into a principal.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub session_id: Uuid,
    pub principal: Principal,
}

impl AuthUser {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

pub async fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, AppError> {
    let claims = state.config.jwt.decode(token)?;

    let session = sessions::fetch_session(&state.pool, claims.sid)
        .await?
        .filter(|s| s.user_id == claims.sub)
        .ok_or_else(|| AppError::unauthorized("session not found"))?;
    if !session.is_live(Utc::now()) {
        return Err(AppError::unauthorized("session has ended"));
    }

    let user: User = users::fetch_user(&state.pool, claims.sub)
        .await
        .map_err(|_| AppError::unauthorized("user not found"))?
        .try_into()?;
    if !user.is_active {
        return Err(AppError::unauthorized("user is deactivated"));
    }

    let role = with_timeout(state.config.store_timeout, state.roles.get(user.role_id))
        .await
        .map_err(|err| match err {
            AppError::NotFound(_) => AppError::unauthorized("role not found"),
            other => other,
        })?;

    let principal = Principal::new(user.id, user.panel_type)
        .with_session(session.id)
        .with_role(role.id, role.key, role.is_system_role)
        .with_permissions(role.permissions)
        .with_hotel(user.hotel_id);

    Ok(AuthUser {
        user,
        session_id: session.id,
        principal,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("Authorization header missing"))?;

        authenticate(state, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip_carries_session() {
        let jwt = JwtConfig::new("test-secret", 1);
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let token = jwt.encode(user_id, session_id, Utc::now() + jwt.session_ttl()).unwrap();

        let claims = jwt.decode(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.sid, session_id);
    }

    #[test]
    fn test_expired_or_foreign_tokens_are_rejected() {
        let jwt = JwtConfig::new("test-secret", 1);
        let expired = jwt
            .encode(Uuid::new_v4(), Uuid::new_v4(), Utc::now() - Duration::hours(2))
            .unwrap();
        assert!(matches!(jwt.decode(&expired), Err(AppError::Token(_))));

        let other = JwtConfig::new("other-secret", 1);
        let token = other.encode(Uuid::new_v4(), Uuid::new_v4(), Utc::now() + Duration::hours(1)).unwrap();
        assert!(jwt.decode(&token).is_err());
    }
}

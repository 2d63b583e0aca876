use crate::config::AppConfig;
use crate::entities::user::{Entity as UserEntity, Role};
use crate::middleware::logging::ApiError;
use axum::{
    extract::{Extension, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::{str::FromStr, sync::Arc};
use thiserror::Error;
use tracing::debug;

/// Requires a valid bearer token. With `Role::Admin` as state the caller must
/// also be an admin; `Role::User` admits any signed-in account.
pub async fn auth_middleware(
    State(required): State<Role>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<AppConfig>>,
    mut req: Request,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|header| header.strip_prefix("Bearer ")) {
        Some(token) => token.trim(),
        None => {
            return ApiError::Unauthorized("User not authenticated".to_string()).into_response();
        }
    };

    let claims = match validate_token(&db, token, &config.secret).await {
        Ok(claims) => claims,
        Err(AuthMiddlewareError::InternalServerError(err)) => {
            return ApiError::DbError(err).into_response();
        }
        Err(err) => {
            debug!(error = %err, "Rejected bearer token");
            return ApiError::Unauthorized("Invalid or expired token".to_string()).into_response();
        }
    };

    if required == Role::Admin && !claims.is_admin() {
        return ApiError::Forbidden("Unauthorized".to_string()).into_response();
    }

    req.extensions_mut().insert(claims);
    next.run(req).await
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn role(&self) -> Option<Role> {
        Role::from_str(&self.role).ok()
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }
}

pub fn generate_token(
    user_id: i32,
    role: Role,
    secret: &str,
    ttl_hours: i64,
) -> Result<String, AuthMiddlewareError> {
    let exp = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .ok_or(AuthMiddlewareError::GenerationFail)?
        .timestamp() as usize;

    let claims = Claims {
        user_id,
        role: role.to_string(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthMiddlewareError::GenerationFail)
}

/// Decodes the token and checks the account still exists with the same role.
pub async fn validate_token(
    db: &DatabaseConnection,
    token: &str,
    secret: &str,
) -> Result<Claims, AuthMiddlewareError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AuthMiddlewareError::TokenExpired)?
    .claims;

    let role = claims.role().ok_or(AuthMiddlewareError::ValidationFail)?;

    match UserEntity::find_by_id(claims.user_id).one(db).await {
        Ok(Some(user)) if user.role == role => Ok(claims),
        Ok(_) => Err(AuthMiddlewareError::InvalidUserOrRole),
        Err(err) => Err(AuthMiddlewareError::InternalServerError(err.to_string())),
    }
}

#[derive(Error, Debug)]
pub enum AuthMiddlewareError {
    #[error("Invalid user id or role")]
    InvalidUserOrRole,
    #[error("Token expired or malformed")]
    TokenExpired,
    #[error("Failed to validate token")]
    ValidationFail,
    #[error("Failed to generate token")]
    GenerationFail,
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_decode_with_the_same_secret() {
        let token = generate_token(7, Role::Admin, "test-secret", 1).unwrap();

        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap()
        .claims;

        assert_eq!(decoded.user_id, 7);
        assert!(decoded.is_admin());
    }

    #[test]
    fn tokens_do_not_decode_with_another_secret() {
        let token = generate_token(7, Role::User, "test-secret", 1).unwrap();
        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other-secret"),
            &Validation::new(Algorithm::HS256),
        );
        assert!(result.is_err());
    }
}

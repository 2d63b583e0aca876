use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::Response,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::config::AppConfig;
use crate::entities::hash_password;
use crate::entities::user::{self, Entity as UserEntity, Role};
use crate::middleware::{
    auth::generate_token,
    logging::{to_response, ApiError},
};

pub fn auth_routes() -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
}

// ROUTES
async fn signup(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<AppConfig>>,
    payload: Result<Json<SignupPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    payload.validate()?;

    let password =
        hash_password(&payload.password).map_err(ApiError::PasswordHashFailed)?;

    let txn = db
        .begin()
        .await
        .map_err(|err| ApiError::TransactionCreationFailed(err.to_string()))?;

    let new_user = user::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        email: Set(normalize_email(&payload.email)),
        password: Set(password),
        role: Set(Role::User),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let model = match new_user.insert(&txn).await {
        Ok(model) => model,
        Err(err) => {
            let _ = txn.rollback().await;
            return Err(ApiError::from_write(err, "Email already registered"));
        }
    };
    txn.commit().await?;

    let token = generate_token(model.id, model.role, &config.secret, config.token_ttl_hours)
        .map_err(|err| ApiError::TokenGenerationFailed(err.to_string()))?;

    info!(user_id = model.id, "User registered");
    Ok(to_response(
        (
            StatusCode::CREATED,
            Json(json!({
                "token": token,
                "user": UserResponse::new(model),
            })),
        ),
        Ok(()),
    ))
}

async fn signin(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<AppConfig>>,
    payload: Result<Json<SigninPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;

    let model = UserEntity::find()
        .filter(user::Column::Email.eq(normalize_email(&payload.email)))
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    model
        .check_hash(&payload.password)
        .map_err(|_| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    let token = generate_token(model.id, model.role, &config.secret, config.token_ttl_hours)
        .map_err(|err| ApiError::TokenGenerationFailed(err.to_string()))?;

    Ok(to_response(
        (
            StatusCode::OK,
            Json(json!({
                "token": token,
                "user": UserResponse::new(model),
            })),
        ),
        Ok(()),
    ))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

//Structs
#[derive(Deserialize, Validate)]
struct SignupPayload {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(email)]
    email: String,
    #[validate(length(min = 6, max = 128))]
    password: String,
}

#[derive(Deserialize)]
struct SigninPayload {
    email: String,
    password: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    id: i32,
    name: String,
    email: String,
    role: Role,
}

impl UserResponse {
    pub fn new(value: user::Model) -> UserResponse {
        UserResponse {
            id: value.id,
            name: value.name,
            email: value.email,
            role: value.role,
        }
    }
}

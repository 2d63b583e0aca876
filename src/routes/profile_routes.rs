use axum::{extract::Extension, http::StatusCode, response::Response, routing::get, Json, Router};
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;

use crate::entities::user::{Entity as UserEntity, Role};
use crate::middleware::{
    auth::{auth_middleware, Claims},
    logging::{to_response, ApiError},
};
use crate::routes::auth_routes::UserResponse;

pub fn profile_routes() -> Router {
    Router::new()
        .route("/profile", get(get_profile))
        .route_layer(axum::middleware::from_fn_with_state(
            Role::User,
            auth_middleware,
        ))
}

async fn get_profile(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    let model = UserEntity::find_by_id(claims.user_id)
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found!".to_string()))?;

    Ok(to_response(
        (StatusCode::OK, Json(UserResponse::new(model))),
        Ok(()),
    ))
}

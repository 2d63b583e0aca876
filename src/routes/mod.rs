pub mod auth_routes;
pub mod banner_routes;
pub mod category_routes;
pub mod order_routes;
pub mod product_routes;
pub mod profile_routes;
pub mod upload_routes;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::middleware::logging::{logging_middleware, ApiError};
use crate::uploads::UploadStore;

use {
    auth_routes::auth_routes, banner_routes::banner_routes, category_routes::category_routes,
    order_routes::order_routes, product_routes::product_routes, profile_routes::profile_routes,
    upload_routes::upload_routes,
};

pub fn api_router(db: Arc<DatabaseConnection>, config: Arc<AppConfig>, store: UploadStore) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .nest("/api/products", product_routes())
        .nest("/api/categories", category_routes())
        .nest("/api/banners", banner_routes())
        .nest("/api/orders", order_routes())
        .nest("/api/auth", auth_routes())
        .nest("/api/user", profile_routes())
        .nest("/uploads", upload_routes())
        .fallback(route_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .layer(DefaultBodyLimit::max(config.body_limit()))
        .layer(Extension(db))
        .layer(Extension(store))
        .layer(Extension(config))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn health() -> &'static str {
    "Storefront API is running"
}

async fn route_not_found() -> Response {
    ApiError::NotFound("Route not found".to_string()).into_response()
}

pub mod config;
pub mod entities;
pub mod middleware;
pub mod routes;
pub mod uploads;

use axum::Router;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::entities::{seed_admin, setup_schema};
use crate::routes::api_router;
use crate::uploads::UploadStore;

/// Connects, creates missing tables and seeds the admin account.
pub async fn connect(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options.sqlx_logging(false);

    let db = Database::connect(options).await?;
    setup_schema(&db).await?;
    seed_admin(&db, config).await?;
    Ok(db)
}

pub async fn create_app(db: DatabaseConnection, config: AppConfig) -> std::io::Result<Router> {
    let store = UploadStore::new(config.upload_dir.clone());
    store.ensure_dir().await?;

    Ok(api_router(Arc::new(db), Arc::new(config), store))
}

use dotenvy::dotenv;
use std::{env, path::PathBuf};
use thiserror::Error;

use crate::uploads::image_set::MAX_PRODUCT_IMAGES;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable '{0}'")]
    Missing(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub secret: String,
    pub token_ttl_hours: i64,
    pub file_size_limit: usize,
    /// Replaces `{scheme}://{host}` when building upload URLs.
    pub public_base_url: Option<String>,
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let host = optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or("PORT", 6000u16)?;
        let database_url = optional("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://storefront.db?mode=rwc".to_string());
        let upload_dir = optional("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./uploads"));
        let secret = required("SECRET")?;
        let token_ttl_hours = parse_or("TOKEN_TTL_HOURS", 24i64)?;
        let file_size_limit = parse_or("FILE_SIZE_LIMIT", 5 * 1024 * 1024usize)?;
        let public_base_url = optional("PUBLIC_BASE_URL");
        let admin_name = optional("ADMIN_NAME").unwrap_or_else(|| "Admin".to_string());
        let admin_email =
            optional("ADMIN_EMAIL").unwrap_or_else(|| "admin@example.com".to_string());
        let admin_password = required("ADMIN_PASSWORD")?;

        tracing::info!("Application configuration loaded.");

        Ok(Self {
            host,
            port,
            database_url,
            upload_dir,
            secret,
            token_ttl_hours,
            file_size_limit,
            public_base_url,
            admin_name,
            admin_email,
            admin_password,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Largest multipart request the server accepts: a full product form.
    pub fn body_limit(&self) -> usize {
        self.file_size_limit
            .saturating_mul(MAX_PRODUCT_IMAGES)
            .saturating_add(1024 * 1024)
    }
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parse_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw.parse::<T>().map_err(|err| ConfigError::Invalid {
            name,
            reason: err.to_string(),
        }),
        None => Ok(default),
    }
}

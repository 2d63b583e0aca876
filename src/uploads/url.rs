use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::{convert::Infallible, sync::Arc};

use crate::config::AppConfig;
use crate::uploads::image_set::ImageSet;

/// `{scheme}://{host}` of the incoming request, used to turn stored
/// filenames into absolute `/uploads/` URLs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseUrl(pub String);

impl BaseUrl {
    pub fn from_parts(scheme: &str, host: &str) -> Self {
        BaseUrl(format!("{scheme}://{host}"))
    }

    pub fn upload_url(&self, file_name: &str) -> String {
        format!("{}/uploads/{}", self.0.trim_end_matches('/'), file_name)
    }

    pub fn optional_url(&self, file_name: Option<&str>) -> Option<String> {
        file_name.map(|name| self.upload_url(name))
    }

    pub fn image_urls(&self, images: &ImageSet) -> Vec<String> {
        images.iter().map(|name| self.upload_url(name)).collect()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BaseUrl
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(base) = parts
            .extensions
            .get::<Arc<AppConfig>>()
            .and_then(|config| config.public_base_url.clone())
        {
            return Ok(BaseUrl(base.trim_end_matches('/').to_string()));
        }

        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or("http");

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| parts.uri.authority().map(|authority| authority.as_str()))
            .unwrap_or("localhost");

        Ok(BaseUrl::from_parts(scheme, host))
    }
}

/// Last path segment of an upload URL (or the value itself if it has none).
pub fn file_name_from_url(value: &str) -> Option<String> {
    let without_query = value.split(['?', '#']).next().unwrap_or_default();
    without_query
        .rsplit('/')
        .next()
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

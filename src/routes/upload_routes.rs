use axum::{
    extract::{Extension, Path},
    http::{header, HeaderMap, HeaderValue},
    response::Response,
    routing::get,
    Router,
};

use crate::middleware::logging::{to_response, ApiError};
use crate::uploads::UploadStore;

pub fn upload_routes() -> Router {
    Router::new().route("/:file_name", get(serve_upload))
}

pub async fn serve_upload(
    Path(file_name): Path<String>,
    Extension(store): Extension<UploadStore>,
) -> Result<Response, ApiError> {
    let (body, content_type) = store
        .open(&file_name)
        .await
        .ok_or_else(|| ApiError::NotFound("Not found".to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("inline"),
    );

    Ok(to_response((headers, body), Ok(())))
}

use axum::{
    extract::{Extension, Multipart, Path, Query},
    http::StatusCode,
    middleware,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::entities::{
    banner::{self, Entity as BannerEntity},
    user::Role,
};
use crate::middleware::{
    auth::auth_middleware,
    logging::{to_response, ApiError},
};
use crate::uploads::{storage::is_safe_file_name, url::file_name_from_url};
use crate::uploads::{BaseUrl, UploadForm, UploadStore};

//ROUTERS
pub fn banner_routes() -> Router {
    let admin_routes = Router::new()
        .route("/", post(create_banner))
        .route("/:id", put(update_banner).delete(delete_banner))
        .route_layer(middleware::from_fn_with_state(Role::Admin, auth_middleware));

    Router::new()
        .route("/", get(get_banners))
        .merge(admin_routes)
}

//ROUTES
async fn get_banners(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    base: BaseUrl,
) -> Result<Response, ApiError> {
    let banners = BannerEntity::find()
        .order_by_asc(banner::Column::Id)
        .all(&*db)
        .await?;

    let response: Vec<BannerResponse> = banners
        .into_iter()
        .map(|banner| BannerResponse::new(banner, &base))
        .collect();
    Ok(to_response((StatusCode::OK, Json(response)), Ok(())))
}

async fn create_banner(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<AppConfig>>,
    Extension(store): Extension<UploadStore>,
    base: BaseUrl,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::parse(&mut multipart, "image", 1, config.file_size_limit).await?;
    let payload = BannerPayload::from_form(&form)?;

    let written = store.save_all(form.first_file()).await?;
    let image = written.first().cloned().or(payload.image_from_url);

    let txn = db
        .begin()
        .await
        .map_err(|err| ApiError::TransactionCreationFailed(err.to_string()))?;

    let new_banner = banner::ActiveModel {
        title: Set(payload.title),
        link: Set(payload.link),
        image: Set(image),
        ..Default::default()
    };

    let inserted = match new_banner.insert(&txn).await {
        Ok(model) => model,
        Err(err) => {
            let _ = txn.rollback().await;
            store.remove_all(&written).await;
            return Err(err.into());
        }
    };
    if let Err(err) = txn.commit().await {
        store.remove_all(&written).await;
        return Err(err.into());
    }

    Ok(to_response(
        (
            StatusCode::CREATED,
            Json(BannerResponse::new(inserted, &base)),
        ),
        Ok(()),
    ))
}

async fn update_banner(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<AppConfig>>,
    Extension(store): Extension<UploadStore>,
    base: BaseUrl,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::parse(&mut multipart, "image", 1, config.file_size_limit).await?;
    let payload = BannerPayload::from_form(&form)?;

    let txn = db
        .begin()
        .await
        .map_err(|err| ApiError::TransactionCreationFailed(err.to_string()))?;

    let current = BannerEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Banner not found".to_string()))?;
    let previous_image = current.image.clone();

    let written = store.save_all(form.first_file()).await?;

    let mut banner: banner::ActiveModel = current.into();
    banner.title = Set(payload.title);
    banner.link = Set(payload.link);
    if let Some(image) = written.first().cloned().or(payload.image_from_url) {
        banner.image = Set(Some(image));
    }

    let updated = match banner.update(&txn).await {
        Ok(model) => model,
        Err(err) => {
            let _ = txn.rollback().await;
            store.remove_all(&written).await;
            return Err(err.into());
        }
    };
    if let Err(err) = txn.commit().await {
        store.remove_all(&written).await;
        return Err(err.into());
    }

    // A fresh upload supersedes the old file.
    if !written.is_empty() {
        let superseded =
            previous_image.filter(|previous| updated.image.as_ref() != Some(previous));
        if let Some(previous) = superseded {
            store.remove(&previous).await;
        }
    }

    Ok(to_response(
        (
            StatusCode::OK,
            Json(json!({
                "message": "Banner updated successfully",
                "banner": BannerResponse::new(updated, &base),
            })),
        ),
        Ok(()),
    ))
}

async fn delete_banner(
    Path(id): Path<i32>,
    Query(query): Query<DeleteBannerQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(store): Extension<UploadStore>,
) -> Result<Response, ApiError> {
    let txn = db
        .begin()
        .await
        .map_err(|err| ApiError::TransactionCreationFailed(err.to_string()))?;

    let banner = BannerEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Banner not found".to_string()))?;

    let image = banner.image.clone();
    let banner: banner::ActiveModel = banner.into();
    if let Err(err) = banner.delete(&txn).await {
        let _ = txn.rollback().await;
        return Err(err.into());
    }
    txn.commit().await?;

    if query.keep_image.as_deref() != Some("true") {
        if let Some(image) = image {
            store.remove(&image).await;
        }
    }

    Ok(to_response(
        (
            StatusCode::OK,
            Json(json!({
                "message": "Banner deleted successfully"
            })),
        ),
        Ok(()),
    ))
}

//Structs
#[derive(Deserialize)]
struct DeleteBannerQuery {
    /// Only the literal `true` keeps the file.
    #[serde(rename = "keepImage")]
    keep_image: Option<String>,
}

struct BannerPayload {
    title: String,
    link: Option<String>,
    /// Filename taken from an `image` URL sent instead of a file.
    image_from_url: Option<String>,
}

impl BannerPayload {
    fn from_form(form: &UploadForm) -> Result<Self, ApiError> {
        let title = form
            .text("title")
            .ok_or_else(|| ApiError::MissingFields(form.received(&["title", "link"])))?;

        let image_from_url = match form.text("image") {
            Some(url) => {
                let name = file_name_from_url(&url)
                    .filter(|name| is_safe_file_name(name))
                    .ok_or_else(|| ApiError::BadRequest("Invalid image reference.".to_string()))?;
                Some(name)
            }
            None => None,
        };

        Ok(BannerPayload {
            title,
            link: form.text("link"),
            image_from_url,
        })
    }
}

#[derive(Serialize)]
struct BannerResponse {
    id: i32,
    title: String,
    link: Option<String>,
    image: Option<String>,
}

impl BannerResponse {
    fn new(value: banner::Model, base: &BaseUrl) -> BannerResponse {
        BannerResponse {
            id: value.id,
            title: value.title,
            link: value.link,
            image: base.optional_url(value.image.as_deref()),
        }
    }
}

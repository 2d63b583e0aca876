use axum::{
    extract::{Extension, Multipart, Path},
    http::StatusCode,
    middleware,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::entities::{
    category::{self, Entity as CategoryEntity},
    product::{self, Entity as ProductEntity},
    user::Role,
};
use crate::middleware::{
    auth::auth_middleware,
    logging::{to_response, ApiError},
};
use crate::uploads::{BaseUrl, UploadForm, UploadStore};

//ROUTERS
pub fn category_routes() -> Router {
    let admin_routes = Router::new()
        .route("/", post(create_category))
        .route("/:id", put(update_category).delete(delete_category))
        .route_layer(middleware::from_fn_with_state(Role::Admin, auth_middleware));

    Router::new()
        .route("/", get(get_categories))
        .route("/:id", get(get_category))
        .merge(admin_routes)
}

//ROUTES
async fn get_categories(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    base: BaseUrl,
) -> Result<Response, ApiError> {
    let categories = CategoryEntity::find()
        .order_by_asc(category::Column::Id)
        .all(&*db)
        .await?;

    let response: Vec<CategoryResponse> = categories
        .into_iter()
        .map(|categ| CategoryResponse::new(categ, &base))
        .collect();
    Ok(to_response((StatusCode::OK, Json(response)), Ok(())))
}

async fn get_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    base: BaseUrl,
) -> Result<Response, ApiError> {
    let category = CategoryEntity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category not found".to_string()))?;

    Ok(to_response(
        (StatusCode::OK, Json(CategoryResponse::new(category, &base))),
        Ok(()),
    ))
}

async fn create_category(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<AppConfig>>,
    Extension(store): Extension<UploadStore>,
    base: BaseUrl,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::parse(&mut multipart, "image", 1, config.file_size_limit).await?;
    let name = form
        .text("name")
        .ok_or_else(|| ApiError::MissingFields(form.received(&["name"])))?;

    let written = store.save_all(form.first_file()).await?;

    let txn = db
        .begin()
        .await
        .map_err(|err| ApiError::TransactionCreationFailed(err.to_string()))?;

    let new_category = category::ActiveModel {
        name: Set(name),
        image: Set(written.first().cloned()),
        ..Default::default()
    };

    let inserted = match new_category.insert(&txn).await {
        Ok(model) => model,
        Err(err) => {
            let _ = txn.rollback().await;
            store.remove_all(&written).await;
            return Err(ApiError::from_write(err, "Category already exists"));
        }
    };
    if let Err(err) = txn.commit().await {
        store.remove_all(&written).await;
        return Err(err.into());
    }

    Ok(to_response(
        (
            StatusCode::CREATED,
            Json(CategoryResponse::new(inserted, &base)),
        ),
        Ok(()),
    ))
}

async fn update_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<AppConfig>>,
    Extension(store): Extension<UploadStore>,
    base: BaseUrl,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::parse(&mut multipart, "image", 1, config.file_size_limit).await?;
    let name = form
        .text("name")
        .ok_or_else(|| ApiError::MissingFields(form.received(&["name"])))?;

    let txn = db
        .begin()
        .await
        .map_err(|err| ApiError::TransactionCreationFailed(err.to_string()))?;

    let current = CategoryEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category not found".to_string()))?;
    let previous_image = current.image.clone();

    let written = store.save_all(form.first_file()).await?;

    let mut category: category::ActiveModel = current.into();
    category.name = Set(name);
    // Only replace the image when a new one was uploaded.
    if let Some(image) = written.first() {
        category.image = Set(Some(image.clone()));
    }

    let updated = match category.update(&txn).await {
        Ok(model) => model,
        Err(err) => {
            let _ = txn.rollback().await;
            store.remove_all(&written).await;
            return Err(ApiError::from_write(err, "Category already exists"));
        }
    };
    if let Err(err) = txn.commit().await {
        store.remove_all(&written).await;
        return Err(err.into());
    }

    if !written.is_empty() {
        if let Some(previous) = previous_image {
            store.remove(&previous).await;
        }
    }

    Ok(to_response(
        (
            StatusCode::OK,
            Json(json!({
                "message": "Category updated successfully",
                "category": CategoryResponse::new(updated, &base),
            })),
        ),
        Ok(()),
    ))
}

async fn delete_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(store): Extension<UploadStore>,
) -> Result<Response, ApiError> {
    let txn = db
        .begin()
        .await
        .map_err(|err| ApiError::TransactionCreationFailed(err.to_string()))?;

    let category = CategoryEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category not found".to_string()))?;

    let product_count = ProductEntity::find()
        .filter(product::Column::CategoryId.eq(id))
        .count(&txn)
        .await?;
    if product_count > 0 {
        return Err(ApiError::Conflict(format!(
            "Category still has {product_count} product(s)"
        )));
    }

    let image = category.image.clone();
    let category: category::ActiveModel = category.into();
    if let Err(err) = category.delete(&txn).await {
        let _ = txn.rollback().await;
        return Err(err.into());
    }
    txn.commit().await?;

    if let Some(image) = image {
        store.remove(&image).await;
    }

    Ok(to_response(
        (
            StatusCode::OK,
            Json(json!({
                "message": "Category deleted successfully"
            })),
        ),
        Ok(()),
    ))
}

//Structs
#[derive(Serialize)]
struct CategoryResponse {
    id: i32,
    name: String,
    image: Option<String>,
}

impl CategoryResponse {
    fn new(value: category::Model, base: &BaseUrl) -> CategoryResponse {
        CategoryResponse {
            id: value.id,
            name: value.name,
            image: base.optional_url(value.image.as_deref()),
        }
    }
}

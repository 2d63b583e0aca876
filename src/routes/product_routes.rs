use axum::{
    extract::{Extension, Multipart, Path},
    http::StatusCode,
    middleware,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::config::AppConfig;
use crate::entities::{
    category::Entity as CategoryEntity,
    product::{self, Entity as ProductEntity},
    user::Role,
};
use crate::middleware::{
    auth::auth_middleware,
    logging::{to_response, ApiError},
};
use crate::uploads::{BaseUrl, ImageSet, UploadForm, UploadStore, MAX_PRODUCT_IMAGES};

//ROUTERS
pub fn product_routes() -> Router {
    let admin_routes = Router::new()
        .route("/", post(create_product))
        .route("/:id", put(update_product).delete(delete_product))
        .route_layer(middleware::from_fn_with_state(Role::Admin, auth_middleware));

    Router::new()
        .route("/", get(get_products))
        .route("/:id", get(get_product))
        .route("/category/:category_id", get(get_products_by_category))
        .merge(admin_routes)
}

//ROUTES
async fn get_products(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    base: BaseUrl,
) -> Result<Response, ApiError> {
    let products = ProductEntity::find()
        .order_by_asc(product::Column::Id)
        .all(&*db)
        .await?;

    let response: Vec<ProductResponse> = products
        .into_iter()
        .map(|prod| ProductResponse::new(prod, &base))
        .collect();
    Ok(to_response((StatusCode::OK, Json(response)), Ok(())))
}

async fn get_products_by_category(
    Path(category_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    base: BaseUrl,
) -> Result<Response, ApiError> {
    let products = ProductEntity::find()
        .filter(product::Column::CategoryId.eq(category_id))
        .order_by_asc(product::Column::Id)
        .all(&*db)
        .await?;

    let response: Vec<ProductResponse> = products
        .into_iter()
        .map(|prod| ProductResponse::new(prod, &base))
        .collect();
    Ok(to_response((StatusCode::OK, Json(response)), Ok(())))
}

async fn get_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    base: BaseUrl,
) -> Result<Response, ApiError> {
    let product = ProductEntity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;

    Ok(to_response(
        (StatusCode::OK, Json(ProductResponse::new(product, &base))),
        Ok(()),
    ))
}

async fn create_product(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<AppConfig>>,
    Extension(store): Extension<UploadStore>,
    base: BaseUrl,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::parse(
        &mut multipart,
        "image",
        MAX_PRODUCT_IMAGES,
        config.file_size_limit,
    )
    .await?;
    let payload = ProductPayload::from_form(&form)?;

    let txn = db
        .begin()
        .await
        .map_err(|err| ApiError::TransactionCreationFailed(err.to_string()))?;

    if CategoryEntity::find_by_id(payload.category_id)
        .one(&txn)
        .await?
        .is_none()
    {
        return Err(ApiError::BadRequest(format!(
            "No category with {} id was found.",
            payload.category_id
        )));
    }

    let images = ImageSet::default()
        .reconcile(&[], form.file_names())
        .images;
    let written = store.save_all(form.kept_files(&images)).await?;

    let new_product = product::ActiveModel {
        name: Set(payload.name),
        price: Set(payload.price),
        description: Set(payload.description),
        stock: Set(payload.stock),
        category_id: Set(payload.category_id),
        image: Set(Some(images.to_stored())),
        weight: Set(payload.weight),
        qty: Set(payload.qty),
        ..Default::default()
    };

    let inserted = match new_product.insert(&txn).await {
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

    info!(product_id = inserted.id, images = images.len(), "Created product");
    Ok(to_response(
        (
            StatusCode::CREATED,
            Json(ProductResponse::new(inserted, &base)),
        ),
        Ok(()),
    ))
}

async fn update_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<AppConfig>>,
    Extension(store): Extension<UploadStore>,
    base: BaseUrl,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::parse(
        &mut multipart,
        "image",
        MAX_PRODUCT_IMAGES,
        config.file_size_limit,
    )
    .await?;
    let payload = ProductPayload::from_form(&form)?;
    let removals = images_to_remove(&form);

    let txn = db
        .begin()
        .await
        .map_err(|err| ApiError::TransactionCreationFailed(err.to_string()))?;

    let current = ProductEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;

    if CategoryEntity::find_by_id(payload.category_id)
        .one(&txn)
        .await?
        .is_none()
    {
        return Err(ApiError::BadRequest(format!(
            "No category with {} id was found.",
            payload.category_id
        )));
    }

    let reconciliation =
        ImageSet::from_stored(current.image.as_deref()).reconcile(&removals, form.file_names());
    if !reconciliation.discarded.is_empty() {
        info!(
            product_id = id,
            discarded = reconciliation.discarded.len(),
            "Image limit reached, dropping extra uploads"
        );
    }
    let written = store
        .save_all(form.kept_files(&reconciliation.images))
        .await?;

    let mut product: product::ActiveModel = current.into();
    product.name = Set(payload.name);
    product.price = Set(payload.price);
    product.description = Set(payload.description);
    product.stock = Set(payload.stock);
    product.category_id = Set(payload.category_id);
    product.image = Set(Some(reconciliation.images.to_stored()));
    product.weight = Set(payload.weight);
    product.qty = Set(payload.qty);

    let updated = match product.update(&txn).await {
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

    store.remove_all(&reconciliation.removed).await;

    Ok(to_response(
        (
            StatusCode::OK,
            Json(json!({
                "message": "Product updated successfully",
                "product": ProductResponse::new(updated, &base),
            })),
        ),
        Ok(()),
    ))
}

async fn delete_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(store): Extension<UploadStore>,
) -> Result<Response, ApiError> {
    let txn = db
        .begin()
        .await
        .map_err(|err| ApiError::TransactionCreationFailed(err.to_string()))?;

    let product = ProductEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
    let images = ImageSet::from_stored(product.image.as_deref());

    let product: product::ActiveModel = product.into();
    if let Err(err) = product.delete(&txn).await {
        let _ = txn.rollback().await;
        return Err(err.into());
    }
    txn.commit().await?;

    // The row is gone; the files follow on a best-effort basis.
    store.remove_all(&images).await;

    Ok(to_response(
        (
            StatusCode::OK,
            Json(json!({
                "message": "Product deleted successfully"
            })),
        ),
        Ok(()),
    ))
}

//Utils
/// `imagesToRemove` arrives as JSON array text; anything unreadable removes nothing.
fn images_to_remove(form: &UploadForm) -> Vec<String> {
    let Some(raw) = form.text("imagesToRemove") else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(names) => names,
        Err(err) => {
            warn!(error = %err, "Error parsing imagesToRemove");
            Vec::new()
        }
    }
}

fn parse_field<T: std::str::FromStr>(value: &str, field: &str) -> Result<T, ApiError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid value for `{field}`")))
}

//Structs
const PRODUCT_FIELDS: [&str; 7] = [
    "name",
    "price",
    "description",
    "stock",
    "category_id",
    "weight",
    "qty",
];

#[derive(Debug, Validate)]
struct ProductPayload {
    #[validate(length(min = 1, max = 255))]
    name: String,
    #[validate(range(min = 0.0))]
    price: f64,
    description: String,
    #[validate(range(min = 0))]
    stock: i32,
    category_id: i32,
    #[validate(range(min = 0.0))]
    weight: f64,
    #[validate(range(min = 0))]
    qty: i32,
}

impl ProductPayload {
    fn from_form(form: &UploadForm) -> Result<Self, ApiError> {
        let (name, price, description, stock, category_id) = match (
            form.text("name"),
            form.text("price"),
            form.text("description"),
            form.text("stock"),
            form.text("category_id"),
        ) {
            (Some(name), Some(price), Some(description), Some(stock), Some(category_id)) => {
                (name, price, description, stock, category_id)
            }
            _ => return Err(ApiError::MissingFields(form.received(&PRODUCT_FIELDS))),
        };

        let payload = ProductPayload {
            name,
            price: parse_field(&price, "price")?,
            description,
            stock: parse_field(&stock, "stock")?,
            category_id: parse_field(&category_id, "category_id")?,
            weight: match form.text("weight") {
                Some(weight) => parse_field(&weight, "weight")?,
                None => 0.0,
            },
            qty: match form.text("qty") {
                Some(qty) => parse_field(&qty, "qty")?,
                None => 0,
            },
        };
        payload.validate()?;
        Ok(payload)
    }
}

#[derive(Serialize)]
pub struct ProductResponse {
    id: i32,
    name: String,
    price: f64,
    description: String,
    stock: i32,
    category_id: i32,
    image: Vec<String>,
    #[serde(rename = "imageUrl")]
    image_url: Vec<String>,
    weight: f64,
    qty: i32,
}

impl ProductResponse {
    pub fn new(value: product::Model, base: &BaseUrl) -> ProductResponse {
        let images = ImageSet::from_stored(value.image.as_deref());
        ProductResponse {
            id: value.id,
            name: value.name,
            price: value.price,
            description: value.description,
            stock: value.stock,
            category_id: value.category_id,
            image_url: base.image_urls(&images),
            image: images.into_vec(),
            weight: value.weight,
            qty: value.qty,
        }
    }
}

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    middleware,
    response::Response,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    str::FromStr,
    sync::Arc,
};
use tracing::info;
use validator::Validate;

use crate::entities::{
    order::{self, Entity as OrderEntity, Status},
    order_item::{self, Entity as OrderItemEntity},
    product::{self, Entity as ProductEntity},
    user::{self, Entity as UserEntity, Role},
};
use crate::middleware::{
    auth::{auth_middleware, Claims},
    logging::{to_response, ApiError},
};
use crate::routes::product_routes::ProductResponse;
use crate::uploads::BaseUrl;

//ROUTERS
pub fn order_routes() -> Router {
    let admin_routes = Router::new()
        .route("/admin/all", get(get_all_orders))
        .route("/:id/status", patch(update_order_status))
        .route_layer(middleware::from_fn_with_state(Role::Admin, auth_middleware));

    Router::new()
        .route("/", post(create_order).get(get_orders))
        .route("/:id", get(get_order))
        .route_layer(middleware::from_fn_with_state(Role::User, auth_middleware))
        .merge(admin_routes)
}

//ROUTES
async fn create_order(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    base: BaseUrl,
    payload: Result<Json<CreateOrderPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    payload.validate()?;

    let txn = db
        .begin()
        .await
        .map_err(|err| ApiError::TransactionCreationFailed(err.to_string()))?;

    let product_ids: HashSet<i32> = payload.items.iter().map(|item| item.product_id).collect();
    let known: HashSet<i32> = ProductEntity::find()
        .filter(product::Column::Id.is_in(product_ids.iter().copied()))
        .all(&txn)
        .await?
        .into_iter()
        .map(|product| product.id)
        .collect();
    if let Some(missing) = payload
        .items
        .iter()
        .find(|item| !known.contains(&item.product_id))
    {
        return Err(ApiError::BadRequest(format!(
            "No product with {} id was found.",
            missing.product_id
        )));
    }

    let total = payload.total.unwrap_or_else(|| {
        payload
            .items
            .iter()
            .map(|item| item.price * f64::from(item.quantity))
            .sum()
    });

    let new_order = order::ActiveModel {
        user_id: Set(claims.user_id),
        status: Set(Status::Pending),
        shipping_address: Set(payload.shipping_address),
        payment_method: Set(payload.payment_method),
        total: Set(total),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let order = new_order.insert(&txn).await?;

    let items = payload.items.iter().map(|item| order_item::ActiveModel {
        order_id: Set(order.id),
        product_id: Set(Some(item.product_id)),
        quantity: Set(item.quantity),
        price: Set(item.price),
        ..Default::default()
    });
    OrderItemEntity::insert_many(items).exec(&txn).await?;

    let mut response = load_orders(&txn, vec![order], false, &base).await?;
    txn.commit().await?;

    info!(user_id = claims.user_id, "Order placed");
    Ok(to_response(
        (StatusCode::CREATED, Json(response.remove(0))),
        Ok(()),
    ))
}

async fn get_orders(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    base: BaseUrl,
) -> Result<Response, ApiError> {
    let orders = OrderEntity::find()
        .filter(order::Column::UserId.eq(claims.user_id))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(&*db)
        .await?;

    let response = load_orders(&*db, orders, false, &base).await?;
    Ok(to_response((StatusCode::OK, Json(response)), Ok(())))
}

async fn get_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    base: BaseUrl,
) -> Result<Response, ApiError> {
    let order = OrderEntity::find_by_id(id)
        .filter(order::Column::UserId.eq(claims.user_id))
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    let mut response = load_orders(&*db, vec![order], false, &base).await?;
    Ok(to_response((StatusCode::OK, Json(response.remove(0))), Ok(())))
}

async fn update_order_status(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    base: BaseUrl,
    payload: Result<Json<UpdateStatusPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let status = Status::from_str(payload.status.trim()).map_err(ApiError::BadRequest)?;

    let txn = db
        .begin()
        .await
        .map_err(|err| ApiError::TransactionCreationFailed(err.to_string()))?;

    let order = OrderEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    let mut order: order::ActiveModel = order.into();
    order.status = Set(status);
    let updated = order.update(&txn).await?;

    let mut response = load_orders(&txn, vec![updated], false, &base).await?;
    txn.commit().await?;

    info!(order_id = id, status = %status, "Order status updated");
    Ok(to_response((StatusCode::OK, Json(response.remove(0))), Ok(())))
}

async fn get_all_orders(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    base: BaseUrl,
) -> Result<Response, ApiError> {
    let orders = OrderEntity::find()
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(&*db)
        .await?;

    let response = load_orders(&*db, orders, true, &base).await?;
    Ok(to_response((StatusCode::OK, Json(response)), Ok(())))
}

//Utils
/// Attaches items (with their products) and optionally the owner to each order,
/// keeping the given order.
async fn load_orders<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<order::Model>,
    include_user: bool,
    base: &BaseUrl,
) -> Result<Vec<OrderResponse>, DbErr> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let order_ids: Vec<i32> = orders.iter().map(|order| order.id).collect();
    let rows = OrderItemEntity::find()
        .filter(order_item::Column::OrderId.is_in(order_ids))
        .order_by_asc(order_item::Column::Id)
        .find_also_related(ProductEntity)
        .all(conn)
        .await?;

    let mut items: HashMap<i32, Vec<OrderItemResponse>> = HashMap::new();
    for (item, product) in rows {
        items
            .entry(item.order_id)
            .or_default()
            .push(OrderItemResponse::new(item, product, base));
    }

    let mut users: HashMap<i32, UserSummary> = HashMap::new();
    if include_user {
        let user_ids: HashSet<i32> = orders.iter().map(|order| order.user_id).collect();
        for user in UserEntity::find()
            .filter(user::Column::Id.is_in(user_ids))
            .all(conn)
            .await?
        {
            users.insert(user.id, UserSummary::new(user));
        }
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            OrderResponse {
                items: items.remove(&order.id).unwrap_or_default(),
                user: users.get(&order.user_id).cloned(),
                id: order.id,
                user_id: order.user_id,
                status: order.status,
                shipping_address: order.shipping_address,
                payment_method: order.payment_method,
                total: order.total,
                created_at: order.created_at,
            }
        })
        .collect())
}

//Structs
#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateOrderPayload {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    #[validate(nested)]
    items: Vec<OrderItemPayload>,
    #[validate(length(min = 1))]
    shipping_address: String,
    #[validate(length(min = 1))]
    payment_method: String,
    #[validate(range(min = 0.0))]
    total: Option<f64>,
}

#[derive(Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct OrderItemPayload {
    product_id: i32,
    #[validate(range(min = 1))]
    quantity: i32,
    #[validate(range(min = 0.0))]
    price: f64,
}

#[derive(Deserialize)]
struct UpdateStatusPayload {
    status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    id: i32,
    user_id: i32,
    status: Status,
    shipping_address: String,
    payment_method: String,
    total: f64,
    created_at: DateTime<Utc>,
    items: Vec<OrderItemResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserSummary>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderItemResponse {
    id: i32,
    product_id: Option<i32>,
    quantity: i32,
    price: f64,
    product: Option<ProductResponse>,
}

impl OrderItemResponse {
    fn new(
        item: order_item::Model,
        product: Option<product::Model>,
        base: &BaseUrl,
    ) -> OrderItemResponse {
        OrderItemResponse {
            id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
            price: item.price,
            product: product.map(|product| ProductResponse::new(product, base)),
        }
    }
}

#[derive(Clone, Serialize)]
struct UserSummary {
    id: i32,
    name: String,
    email: String,
}

impl UserSummary {
    fn new(value: user::Model) -> UserSummary {
        UserSummary {
            id: value.id,
            name: value.name,
            email: value.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(items: serde_json::Value) -> CreateOrderPayload {
        serde_json::from_value(json!({
            "items": items,
            "shippingAddress": "Baker street 221b",
            "paymentMethod": "cash"
        }))
        .unwrap()
    }

    #[test]
    fn empty_orders_fail_validation() {
        let errors = payload(json!([])).validate().unwrap_err();
        assert!(errors.errors().contains_key("items"));
    }

    #[test]
    fn item_rules_are_checked() {
        assert!(payload(json!([{ "productId": 1, "quantity": 2, "price": 4.5 }]))
            .validate()
            .is_ok());
        assert!(payload(json!([{ "productId": 1, "quantity": 0, "price": 4.5 }]))
            .validate()
            .is_err());
        assert!(payload(json!([{ "productId": 1, "quantity": 1, "price": -1.0 }]))
            .validate()
            .is_err());
    }
}

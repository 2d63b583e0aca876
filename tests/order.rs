mod common;

use common::{spawn_app, TestApp};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn place_order(app: &TestApp, token: &str, product_id: &Value) -> Value {
    let response = app
        .client
        .post(app.url("/api/orders"))
        .bearer_auth(token)
        .json(&json!({
            "items": [
                { "productId": product_id, "quantity": 2, "price": 4.5 },
            ],
            "shippingAddress": "Baker street 221b",
            "paymentMethod": "cash"
        }))
        .send()
        .await
        .expect("Failed to send create order request");
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_create_and_read_orders() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let category_id = app.create_category(&admin, "Tea").await;
    let product = app.create_product(&admin, category_id, 1).await;
    let user = app.user_token("buyer@example.com").await;

    let order = place_order(&app, &user, &product["id"]).await;
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["total"], 9.0);
    assert_eq!(order["shippingAddress"], "Baker street 221b");
    assert_eq!(order["items"][0]["quantity"], 2);
    assert_eq!(order["items"][0]["product"]["name"], "Green tea");
    assert_eq!(order["items"][0]["product"]["imageUrl"], product["imageUrl"]);
    assert!(order.get("user").is_none());

    let listing: Value = app
        .client
        .get(app.url("/api/orders"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing.as_array().unwrap().len(), 1);

    let response = app
        .client
        .get(app.url(&format!("/api/orders/{}", order["id"])))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: Value = response.json().await.unwrap();
    assert_eq!(fetched["id"], order["id"]);
}

#[tokio::test]
async fn test_orders_are_private() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let category_id = app.create_category(&admin, "Tea").await;
    let product = app.create_product(&admin, category_id, 0).await;
    let owner = app.user_token("owner@example.com").await;
    let stranger = app.user_token("stranger@example.com").await;

    let order = place_order(&app, &owner, &product["id"]).await;

    let response = app
        .client
        .get(app.url(&format!("/api/orders/{}", order["id"])))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Order not found");

    let listing: Value = app
        .client
        .get(app.url("/api/orders"))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listing.as_array().unwrap().is_empty());

    let anonymous = app.client.get(app.url("/api/orders")).send().await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_order_validation() {
    let app = spawn_app().await;
    let user = app.user_token("buyer@example.com").await;

    let empty = app
        .client
        .post(app.url("/api/orders"))
        .bearer_auth(&user)
        .json(&json!({ "items": [], "shippingAddress": "Home", "paymentMethod": "card" }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let unknown = app
        .client
        .post(app.url("/api/orders"))
        .bearer_auth(&user)
        .json(&json!({
            "items": [{ "productId": 404, "quantity": 1, "price": 1.0 }],
            "shippingAddress": "Home",
            "paymentMethod": "card"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    let body: Value = unknown.json().await.unwrap();
    assert_eq!(body["message"], "No product with 404 id was found.");

    let malformed = app
        .client
        .post(app.url("/api/orders"))
        .bearer_auth(&user)
        .json(&json!({ "items": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_order_status() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let category_id = app.create_category(&admin, "Tea").await;
    let product = app.create_product(&admin, category_id, 0).await;
    let user = app.user_token("buyer@example.com").await;
    let order = place_order(&app, &user, &product["id"]).await;
    let status_url = app.url(&format!("/api/orders/{}/status", order["id"]));

    let forbidden = app
        .client
        .patch(&status_url)
        .bearer_auth(&user)
        .json(&json!({ "status": "SHIPPED" }))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let invalid = app
        .client
        .patch(&status_url)
        .bearer_auth(&admin)
        .json(&json!({ "status": "LOST" }))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let response = app
        .client
        .patch(&status_url)
        .bearer_auth(&admin)
        .json(&json!({ "status": "SHIPPED" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "SHIPPED");

    let missing = app
        .client
        .patch(app.url("/api/orders/999/status"))
        .bearer_auth(&admin)
        .json(&json!({ "status": "SHIPPED" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_lists_all_orders() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let category_id = app.create_category(&admin, "Tea").await;
    let product = app.create_product(&admin, category_id, 0).await;
    let first = app.user_token("first@example.com").await;
    let second = app.user_token("second@example.com").await;

    place_order(&app, &first, &product["id"]).await;
    place_order(&app, &first, &product["id"]).await;
    place_order(&app, &second, &product["id"]).await;

    let forbidden = app
        .client
        .get(app.url("/api/orders/admin/all"))
        .bearer_auth(&first)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let response = app
        .client
        .get(app.url("/api/orders/admin/all"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    let orders = body.as_array().unwrap();
    assert_eq!(orders.len(), 3);
    let emails: Vec<&str> = orders
        .iter()
        .map(|order| order["user"]["email"].as_str().unwrap())
        .collect();
    assert_eq!(
        emails.iter().filter(|email| **email == "first@example.com").count(),
        2
    );
    assert!(emails.contains(&"second@example.com"));
}

#[tokio::test]
async fn test_order_survives_product_deletion() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let category_id = app.create_category(&admin, "Tea").await;
    let product = app.create_product(&admin, category_id, 1).await;
    let user = app.user_token("buyer@example.com").await;
    let order = place_order(&app, &user, &product["id"]).await;

    let deleted = app
        .client
        .delete(app.url(&format!("/api/products/{}", product["id"])))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);

    let response = app
        .client
        .get(app.url(&format!("/api/orders/{}", order["id"])))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    let item = &body["items"][0];
    assert!(item["productId"].is_null());
    assert!(item["product"].is_null());
    assert_eq!(item["quantity"], 2);
    assert_eq!(item["price"], 4.5);
    assert_eq!(body["total"], 9.0);
}

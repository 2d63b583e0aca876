#![allow(dead_code)]

use reqwest::{multipart, Client, StatusCode};
use serde_json::{json, Value};
use std::path::PathBuf;
use storefront::config::AppConfig;
use uuid::Uuid;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "Secret15";

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub upload_dir: PathBuf,
}

/// Starts the full router on an ephemeral port with its own SQLite file and
/// upload directory.
pub async fn spawn_app() -> TestApp {
    let root = std::env::temp_dir().join(format!("storefront-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&root).expect("Failed to create test directory");
    let upload_dir = root.join("uploads");

    let config = AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: format!("sqlite://{}?mode=rwc", root.join("test.db").display()),
        upload_dir: upload_dir.clone(),
        secret: "test-secret".to_string(),
        token_ttl_hours: 1,
        file_size_limit: 1024 * 1024,
        public_base_url: None,
        admin_name: "Admin".to_string(),
        admin_email: ADMIN_EMAIL.to_string(),
        admin_password: ADMIN_PASSWORD.to_string(),
    };

    let db = storefront::connect(&config)
        .await
        .expect("Failed to prepare database");
    let app = storefront::create_app(db, config)
        .await
        .expect("Failed to build app");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let address = format!(
        "http://{}",
        listener.local_addr().expect("Listener has no address")
    );
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });

    TestApp {
        address,
        client: Client::new(),
        upload_dir,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn upload_url(&self, file_name: &str) -> String {
        format!("{}/uploads/{}", self.address, file_name)
    }

    async fn signin(&self, email: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/auth/signin"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to send signin request");
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = response.json().await.expect("Failed to parse signin body");
        body["token"]
            .as_str()
            .expect("Token not found in signin response")
            .to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.signin(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Registers a regular user and returns its token.
    pub async fn user_token(&self, email: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/auth/signup"))
            .json(&json!({ "name": "Test User", "email": email, "password": "Muzion15" }))
            .send()
            .await
            .expect("Failed to send signup request");
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Value = response.json().await.expect("Failed to parse signup body");
        body["token"]
            .as_str()
            .expect("Token not found in signup response")
            .to_string()
    }

    pub async fn create_category(&self, token: &str, name: &str) -> i32 {
        let form = multipart::Form::new().text("name", name.to_string());
        let response = self
            .client
            .post(self.url("/api/categories"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .expect("Failed to send create category request");
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Value = response.json().await.expect("Failed to parse category body");
        body["id"].as_i64().expect("Category id missing") as i32
    }

    pub async fn create_product(&self, token: &str, category_id: i32, images: usize) -> Value {
        let mut form = product_form("Green tea", category_id);
        for index in 0..images {
            form = form.part("image", png_part(&format!("photo-{index}.png")));
        }

        let response = self
            .client
            .post(self.url("/api/products"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .expect("Failed to send create product request");
        assert_eq!(response.status(), StatusCode::CREATED);

        response.json().await.expect("Failed to parse product body")
    }

    pub fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.upload_dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.upload_dir.join(name).exists()
    }
}

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";

pub fn png_part(file_name: &str) -> multipart::Part {
    multipart::Part::bytes(PNG_BYTES.to_vec())
        .file_name(file_name.to_string())
        .mime_str("image/png")
        .expect("Invalid mime type")
}

pub fn product_form(name: &str, category_id: i32) -> multipart::Form {
    multipart::Form::new()
        .text("name", name.to_string())
        .text("price", "4.50")
        .text("description", "Loose leaf green tea")
        .text("stock", "12")
        .text("category_id", category_id.to_string())
        .text("weight", "0.25")
        .text("qty", "1")
}

pub fn names(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("Expected an array")
        .iter()
        .map(|item| item.as_str().expect("Expected a string").to_string())
        .collect()
}

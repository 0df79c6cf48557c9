//! Integration tests for the storefront backend.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::{Config, LogFormat};
use crate::db::{init_database, DocumentStore, SqliteDocumentStore};
use crate::storage::{LocalObjectStorage, ObjectStorage, UnconfiguredStorage};
use crate::{create_router, AppState};

const ADMIN_KEY: &str = "test-admin-key";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::build(Some(ADMIN_KEY), false).await
    }

    async fn with_media() -> Self {
        Self::build(Some(ADMIN_KEY), true).await
    }

    async fn build(admin_key: Option<&str>, with_media: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let media_dir = temp_dir.path().join("media");

        let config = Config {
            admin_key: admin_key.map(str::to_string),
            db_path: temp_dir.path().join("test.sqlite"),
            media_dir: with_media.then(|| media_dir.clone()),
            media_base_url: "/media".to_string(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            log_format: LogFormat::Text,
            upload_timeout: Duration::from_secs(5),
            max_image_width: 800,
            jpeg_quality: 70,
            require_image_on_edit: false,
        };

        // Initialize database
        let pool = init_database(&config.db_path)
            .await
            .expect("Failed to init DB");
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(pool));

        let storage: Arc<dyn ObjectStorage> = if with_media {
            Arc::new(LocalObjectStorage::new(media_dir, "/media"))
        } else {
            Arc::new(UnconfiguredStorage)
        };

        let app = create_router(AppState::new(store, storage, config));

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = admin_key {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-admin-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn put(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .put(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn delete(&self, path: &str) -> (u16, Value) {
        let resp = self.client.delete(self.url(path)).send().await.unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    /// Create a product with an existing image reference and return its id.
    async fn create_product(&self, name: &str, category: &str) -> String {
        let (status, body) = self
            .post(
                "/api/products",
                json!({
                    "name": name,
                    "price": "150000",
                    "category": category,
                    "image": "https://cdn.example/p.jpg"
                }),
            )
            .await;
        assert_eq!(status, 200, "{}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

fn png_base64(width: u32, height: u32) -> String {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 90, 255]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    general_purpose::STANDARD.encode(out.into_inner())
}

fn names(page: &Value) -> Vec<String> {
    page["data"]["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_admin_routes_require_key() {
    let fixture = TestFixture::new().await;
    let anonymous = Client::new();

    let resp = anonymous
        .post(fixture.url("/api/products"))
        .json(&json!({ "name": "A", "image": "x.jpg" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = anonymous
        .put(fixture.url("/api/settings"))
        .header("x-admin-key", "wrong-key")
        .json(&json!({ "contactPhone": "1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = anonymous
        .put(fixture.url("/api/settings"))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({ "contactPhone": "1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Storefront reads stay public
    let resp = anonymous
        .get(fixture.url("/api/products"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_open_admin_without_configured_key() {
    let fixture = TestFixture::build(None, false).await;

    let (status, _) = fixture
        .post("/api/news", json!({ "title": "Tin mới", "image": "x.jpg" }))
        .await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_product_crud_with_inline_fallback() {
    let fixture = TestFixture::new().await;

    // Storage is unconfigured, so the upload falls back to an inline JPEG
    let (status, body) = fixture
        .post(
            "/api/products",
            json!({
                "name": "Cây Hoa Hồng",
                "price": "150000",
                "category": "cay-xanh",
                "description": "Hoa đẹp",
                "imageFile": { "fileName": "hong.png", "data": png_base64(1200, 600) }
            }),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["success"], true);

    let created = &body["data"];
    let id = created["id"].as_str().unwrap().to_string();
    assert!(created["image"]
        .as_str()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));
    assert_eq!(created["displayPrice"], "150.000đ");
    assert!(created["createdAt"].is_string());
    assert_eq!(created["createdAt"], created["updatedAt"]);

    // Get
    let (status, body) = fixture.get(&format!("/api/products/{}", id)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["name"], "Cây Hoa Hồng");

    // Partial update keeps untouched fields and the image
    let (status, body) = fixture
        .put(&format!("/api/products/{}", id), json!({ "name": "Hoa Hồng Đỏ" }))
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["name"], "Hoa Hồng Đỏ");
    assert_eq!(body["data"]["price"], "150000");
    assert_eq!(body["data"]["image"], created["image"]);
    assert_eq!(body["data"]["createdAt"], created["createdAt"]);

    // Delete
    let (status, _) = fixture.delete(&format!("/api/products/{}", id)).await;
    assert_eq!(status, 200);

    let (status, body) = fixture.get(&format!("/api/products/{}", id)).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = fixture.delete(&format!("/api/products/{}", id)).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_upload_to_media_storage() {
    let fixture = TestFixture::with_media().await;

    let (status, body) = fixture
        .post(
            "/api/services",
            json!({
                "title": "Thiết kế sân vườn",
                "imageFile": { "fileName": "garden photo.png", "data": png_base64(64, 64) }
            }),
        )
        .await;
    assert_eq!(status, 200, "{}", body);

    let image = body["data"]["image"].as_str().unwrap();
    assert!(image.starts_with("/media/services/"), "{}", image);
    assert!(image.ends_with("_garden_photo.png"));

    let resp = fixture.client.get(fixture.url(image)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_save_validation() {
    let fixture = TestFixture::new().await;

    // No image at all on create
    let (status, body) = fixture.post("/api/products", json!({ "name": "A" })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    // Missing required name
    let (status, _) = fixture
        .post("/api/products", json!({ "price": "1", "image": "x.jpg" }))
        .await;
    assert_eq!(status, 400);

    // Undecodable image aborts the save
    let (status, body) = fixture
        .post(
            "/api/products",
            json!({
                "name": "Broken",
                "imageFile": {
                    "fileName": "broken.png",
                    "data": general_purpose::STANDARD.encode(b"not really a png")
                }
            }),
        )
        .await;
    assert_eq!(status, 422);
    assert_eq!(body["error"]["code"], "IMAGE_ERROR");

    let (_, body) = fixture.get("/api/products").await;
    assert!(body["data"]["records"].as_array().unwrap().is_empty());

    // Updating a missing record
    let (status, _) = fixture
        .put("/api/products/missing", json!({ "name": "B" }))
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_unknown_collection_is_not_found() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get("/api/members").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_pagination_follows_cursor_to_the_end() {
    let fixture = TestFixture::new().await;
    for i in 0..25 {
        fixture.create_product(&format!("P{}", i), "cay-xanh").await;
    }

    let (_, first) = fixture.get("/api/products").await;
    assert_eq!(first["data"]["records"].as_array().unwrap().len(), 20);
    assert_eq!(first["data"]["hasMore"], true);
    assert_eq!(first["data"]["reset"], false);

    let cursor = first["data"]["nextCursor"].as_str().unwrap();
    let (_, second) = fixture
        .get(&format!("/api/products?cursor={}", cursor))
        .await;
    assert_eq!(second["data"]["records"].as_array().unwrap().len(), 5);
    assert_eq!(second["data"]["hasMore"], false);
    assert!(second["data"]["nextCursor"].is_null());

    let mut seen = names(&first);
    seen.extend(names(&second));
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 25);
}

#[tokio::test]
async fn test_exact_page_multiple_needs_one_empty_request() {
    let fixture = TestFixture::new().await;
    for i in 0..20 {
        fixture.create_product(&format!("P{}", i), "cay-xanh").await;
    }

    let (_, first) = fixture.get("/api/products?pageSize=20").await;
    assert_eq!(first["data"]["hasMore"], true);

    let cursor = first["data"]["nextCursor"].as_str().unwrap();
    let (status, second) = fixture
        .get(&format!("/api/products?pageSize=20&cursor={}", cursor))
        .await;
    assert_eq!(status, 200);
    assert!(second["data"]["records"].as_array().unwrap().is_empty());
    assert_eq!(second["data"]["hasMore"], false);
}

#[tokio::test]
async fn test_cursor_from_other_filter_restarts_listing() {
    let fixture = TestFixture::new().await;
    for i in 0..3 {
        fixture.create_product(&format!("A{}", i), "ban-cong").await;
        fixture.create_product(&format!("B{}", i), "cay-xanh").await;
    }

    let (_, filtered) = fixture
        .get("/api/products?category=ban-cong&pageSize=2")
        .await;
    assert!(names(&filtered).iter().all(|n| n.starts_with('A')));
    let cursor = filtered["data"]["nextCursor"].as_str().unwrap();

    let (status, body) = fixture
        .get(&format!("/api/products?pageSize=2&cursor={}", cursor))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["reset"], true);
    assert_eq!(names(&body), vec!["B2", "A2"]);

    // Changing the ordering also invalidates the cursor
    let (_, body) = fixture
        .get(&format!("/api/products?pageSize=2&order=asc&cursor={}", cursor))
        .await;
    assert_eq!(body["data"]["reset"], true);
    assert_eq!(names(&body), vec!["A0", "B0"]);

    let (status, body) = fixture.get("/api/products?cursor=not-a-cursor!").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_search_is_accent_insensitive() {
    let fixture = TestFixture::new().await;
    fixture.create_product("Cây Hoa Hồng", "cay-xanh").await;
    fixture.create_product("Cây Xanh", "cay-xanh").await;
    fixture.create_product("Hoa Giấy", "ban-cong").await;

    let (status, body) = fixture.get("/api/products?q=hoa").await;
    assert_eq!(status, 200);
    assert_eq!(names(&body), vec!["Hoa Giấy", "Cây Hoa Hồng"]);

    let (_, body) = fixture.get("/api/products?q=H%E1%BB%92NG").await;
    assert_eq!(names(&body), vec!["Cây Hoa Hồng"]);
}

#[tokio::test]
async fn test_settings_merge_keeps_banners() {
    let fixture = TestFixture::new().await;

    let (status, _) = fixture
        .put(
            "/api/settings",
            json!({
                "contactEmail": "shop@example.com",
                "banners": {
                    "home": { "image": "https://cdn.example/home.jpg" },
                    "shop": { "imageFile": { "fileName": "shop.png", "data": png_base64(100, 40) } }
                }
            }),
        )
        .await;
    assert_eq!(status, 200);

    let (status, body) = fixture
        .put("/api/settings", json!({ "contactPhone": "0909 123 456" }))
        .await;
    assert_eq!(status, 200);

    let config = &body["data"];
    assert_eq!(config["contactPhone"], "0909 123 456");
    assert_eq!(config["contactEmail"], "shop@example.com");
    assert_eq!(config["heroImage_home"], "https://cdn.example/home.jpg");
    assert!(config["heroImage_shop"]
        .as_str()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));

    // Empty slots fall back to the home banner
    let (_, body) = fixture.get("/api/settings/banner/about").await;
    assert_eq!(body["data"]["image"], "https://cdn.example/home.jpg");

    let (status, _) = fixture.get("/api/settings/banner/footer").await;
    assert_eq!(status, 404);

    let (status, body) = fixture
        .put(
            "/api/settings",
            json!({ "banners": { "footer": { "image": "x.jpg" } } }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_settings_default_to_empty() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get("/api/settings").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["contactPhone"], "");
    assert_eq!(body["data"]["heroImage_home"], "");
}

#[tokio::test]
async fn test_reviews() {
    let fixture = TestFixture::new().await;
    let product = fixture.create_product("Cây Hoa Hồng", "cay-xanh").await;

    let (status, body) = fixture
        .post(
            "/api/reviews",
            json!({ "contextId": product, "name": "Lan", "content": "Cây rất đẹp" }),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["rating"], 5);

    let (status, _) = fixture
        .post(
            "/api/reviews",
            json!({ "contextId": product, "name": "Minh", "content": "Tốt", "rating": 4 }),
        )
        .await;
    assert_eq!(status, 200);

    let (status, _) = fixture
        .post(
            "/api/reviews",
            json!({ "contextId": "other", "name": "X", "content": "Y", "rating": 9 }),
        )
        .await;
    assert_eq!(status, 400);

    let (status, body) = fixture
        .get(&format!("/api/reviews?contextId={}", product))
        .await;
    assert_eq!(status, 200);
    let reviews = body["data"].as_array().unwrap();
    assert_eq!(reviews.len(), 2);
    assert_eq!(reviews[0]["name"], "Minh");

    let (status, _) = fixture.get("/api/reviews").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_article_image_upload() {
    let payload = json!({ "fileName": "inline.png", "data": png_base64(32, 32) });

    // No fallback for article images
    let fixture = TestFixture::new().await;
    let (status, body) = fixture
        .post("/api/uploads/article-image", payload.clone())
        .await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "STORAGE_ERROR");

    let fixture = TestFixture::with_media().await;
    let (status, body) = fixture.post("/api/uploads/article-image", payload).await;
    assert_eq!(status, 200);
    assert!(body["data"]["url"]
        .as_str()
        .unwrap()
        .starts_with("/media/article_images/"));
}

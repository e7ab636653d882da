#![allow(dead_code)]

use std::time::Duration;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`

use kiosk_console::jwt::JwtConfig;
use kiosk_console::{create_app_with, AppConfig};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password-1";
pub const PASSWORD: &str = "password-123";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub async fn spawn_app() -> Result<TestApp> {
    spawn_app_with(|config| config).await
}

/// Fresh sqlite file with migrations applied, a super admin, and the router.
pub async fn spawn_app_with(configure: impl FnOnce(AppConfig) -> AppConfig) -> Result<TestApp> {
    let dir = tempdir()?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    kiosk_console::db::seed::create_super_admin(&pool, ADMIN_EMAIL, "Ada Admin", ADMIN_PASSWORD).await?;

    let config = configure(AppConfig::new(JwtConfig::new("test-secret", 1)));
    let app = create_app_with(pool.clone(), config).await?;

    Ok(TestApp { app, pool, _dir: dir })
}

impl TestApp {
    pub async fn request(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<Response> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        Ok(self.app.clone().oneshot(req).await?)
    }

    /// Sends the request and decodes the JSON envelope.
    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let resp = self.request(method, uri, token, body).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
        Ok((status, value))
    }

    pub async fn text(&self, uri: &str, token: &str) -> Result<(StatusCode, Response)> {
        let resp = self.request("GET", uri, Some(token), None).await?;
        Ok((resp.status(), resp))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let (status, v) = self
            .send("POST", "/auth/login", None, Some(json!({ "email": email, "password": password })))
            .await?;
        assert_eq!(status, StatusCode::OK, "login failed: {}", v);
        Ok(v["data"]["token"].as_str().unwrap_or_default().to_string())
    }

    pub async fn admin_token(&self) -> Result<String> {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Creates a role and returns its JSON view.
    pub async fn create_role(&self, token: &str, name: &str, scope: &str, permissions: Value) -> Result<Value> {
        let (status, v) = self
            .send(
                "POST",
                "/roles",
                Some(token),
                Some(json!({ "name": name, "scope": scope, "permissions": permissions })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "create role failed: {}", v);
        Ok(v["data"].clone())
    }

    pub async fn create_hotel(&self, token: &str, name: &str) -> Result<Value> {
        let (status, v) = self
            .send("POST", "/hotels", Some(token), Some(json!({ "name": name, "city": "Lisbon" })))
            .await?;
        assert_eq!(status, StatusCode::CREATED, "create hotel failed: {}", v);
        Ok(v["data"].clone())
    }

    /// Invites a user with `PASSWORD` and returns its JSON.
    pub async fn invite(&self, token: &str, email: &str, role_id: &str, hotel_id: Option<&str>) -> Result<Value> {
        let (status, v) = self
            .send(
                "POST",
                "/users",
                Some(token),
                Some(json!({
                    "email": email,
                    "full_name": "Test User",
                    "role_id": role_id,
                    "hotel_id": hotel_id,
                    "password": PASSWORD,
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "invite failed: {}", v);
        Ok(v["data"].clone())
    }

    pub async fn role_id(&self, key: &str) -> Result<String> {
        Ok(sqlx::query_scalar("SELECT id FROM roles WHERE key = ?")
            .bind(key)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Polls until the audit listener has written an entry named `event`.
    pub async fn wait_for_audit(&self, event: &str) -> Result<i64> {
        for _ in 0..100 {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM audit_log WHERE event_name = ?")
                .bind(event)
                .fetch_one(&self.pool)
                .await?;
            if count > 0 {
                return Ok(count);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        anyhow::bail!("no audit entry named {}", event)
    }
}

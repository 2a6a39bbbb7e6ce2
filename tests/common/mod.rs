#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};

use shop_admin_api::config::{AppConfig, Environment};
use shop_admin_api::database::{MemoryStore, Store};
use shop_admin_api::seed::{self, AdminSeed};
use shop_admin_api::{router, AppState};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "password";

/// A server on its own port backed by a freshly seeded in-memory store.
/// It lives as long as the test's runtime.
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub store: Arc<dyn Store>,
}

pub async fn spawn() -> Result<TestServer> {
    spawn_with(AppConfig::for_environment(Environment::Development)).await
}

pub async fn spawn_with(config: AppConfig) -> Result<TestServer> {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let admin = AdminSeed {
        username: "admin".to_string(),
        email: ADMIN_EMAIL.to_string(),
        password: ADMIN_PASSWORD.to_string(),
    };
    seed::run(store.clone(), &admin).await.context("seeding store")?;

    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    let app = router(AppState::new(config, store.clone()));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await;
    });

    Ok(TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        store,
    })
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    pub fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path)).header("Accept", "application/json");
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn send(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = self.request(method, path, token);
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let res = builder.send().await?;
        let status = res.status();
        let text = res.text().await?;
        let body = if text.is_empty() { Value::Null } else { serde_json::from_str(&text)? };
        Ok((status, body))
    }

    pub async fn get(&self, path: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::POST, path, Some(token), Some(body)).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::PUT, path, Some(token), Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.send(Method::DELETE, path, Some(token), None).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let (status, body) = self
            .send(Method::POST, "/auth/login", None, Some(json!({ "email": email, "password": password })))
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed with {}: {}", status, body);
        body["data"]["token"].as_str().map(str::to_string).context("token missing from login response")
    }

    pub async fn admin_token(&self) -> Result<String> {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Creates a user holding `roles` (by name) through the API and logs in as them.
    pub async fn user_with_roles(&self, admin: &str, username: &str, roles: &[&str]) -> Result<String> {
        let email = format!("{}@example.com", username);
        let (status, body) = self
            .post(
                "/users",
                admin,
                json!({ "username": username, "email": email, "password": "secret123", "roles": roles }),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "user creation failed with {}: {}", status, body);
        self.login(&email, "secret123").await
    }

    /// Creates a role with exactly the named permissions.
    pub async fn role_with_permissions(&self, admin: &str, name: &str, permissions: &[&str]) -> Result<i64> {
        let (_, all) = self.get("/permissions", admin).await?;
        let ids: Vec<i64> = all["data"]["permissions"]
            .as_array()
            .context("permissions list")?
            .iter()
            .filter(|p| permissions.contains(&p["name"].as_str().unwrap_or_default()))
            .filter_map(|p| p["id"].as_i64())
            .collect();
        let (status, body) = self.post("/roles", admin, json!({ "name": name, "permissions": ids })).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "role creation failed with {}: {}", status, body);
        body["data"]["id"].as_i64().context("role id")
    }
}

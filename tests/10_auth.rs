mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::json;

#[tokio::test]
async fn health_endpoint_reports_database() -> Result<()> {
    let server = common::spawn().await?;
    let res = server.client.get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await?;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["message"], "API is running");
    assert_eq!(body["components"]["database"]["status"], "OK");
    Ok(())
}

#[tokio::test]
async fn login_returns_bearer_token_and_user() -> Result<()> {
    let server = common::spawn().await?;
    let (status, body) = server
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": common::ADMIN_EMAIL, "password": common::ADMIN_PASSWORD })),
        )
        .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status_code"], 1001);
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert!(body["data"]["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["data"]["user"]["email"], common::ADMIN_EMAIL);
    assert!(body["data"]["user"].get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn login_with_wrong_password_is_rejected() -> Result<()> {
    let server = common::spawn().await?;
    let (status, body) = server
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": common::ADMIN_EMAIL, "password": "not-the-password" })),
        )
        .await?;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["status_code"], 2005);
    assert_eq!(body["errors"]["email"][0], "The provided credentials are incorrect.");
    assert!(body.get("data").is_none());
    Ok(())
}

#[tokio::test]
async fn login_requires_email_and_password() -> Result<()> {
    let server = common::spawn().await?;
    let (status, body) = server.send(Method::POST, "/auth/login", None, Some(json!({}))).await?;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status_code"], 2004);
    assert!(body["errors"]["email"].is_array());
    assert!(body["errors"]["password"].is_array());
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_token() -> Result<()> {
    let server = common::spawn().await?;
    let (status, body) = server.send(Method::GET, "/user-profile", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = server.send(Method::GET, "/brands", Some("garbage"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn profile_and_logout() -> Result<()> {
    let server = common::spawn().await?;
    let token = server.admin_token().await?;

    let (status, body) = server.get("/user-profile", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], common::ADMIN_EMAIL);

    let (status, body) = server.send(Method::POST, "/auth/logout", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status_code"], 1003);

    // The token is revoked server-side.
    let (status, _) = server.get("/user-profile", &token).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn new_login_revokes_previous_token() -> Result<()> {
    let server = common::spawn().await?;
    let first = server.admin_token().await?;
    let second = server.admin_token().await?;

    let (status, _) = server.get("/user-profile", &first).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = server.get("/user-profile", &second).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let server = common::spawn().await?;
    let body: serde_json::Value = server.client.get(&server.base_url).send().await?.json().await?;
    assert_eq!(body["data"]["name"], "shop-admin-api");
    Ok(())
}

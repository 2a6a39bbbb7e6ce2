mod common;

use anyhow::Result;
use serde_json::json;

#[tokio::test]
async fn indonesian_catalog_translates_coded_messages() -> Result<()> {
    let server = common::spawn().await?;
    let res = server
        .client
        .post(server.url("/auth/login"))
        .header("Accept-Language", "id-ID,id;q=0.9,en;q=0.8")
        .json(&json!({ "email": common::ADMIN_EMAIL, "password": common::ADMIN_PASSWORD }))
        .send()
        .await?;
    let body: serde_json::Value = res.json().await?;
    assert_eq!(body["message"], "Login berhasil");
    assert_eq!(body["status_code"], 1001);
    Ok(())
}

#[tokio::test]
async fn unknown_locale_keeps_default_message() -> Result<()> {
    let server = common::spawn().await?;
    let res = server
        .client
        .post(server.url("/auth/login"))
        .header("Accept-Language", "fr")
        .json(&json!({ "email": common::ADMIN_EMAIL, "password": common::ADMIN_PASSWORD }))
        .send()
        .await?;
    let body: serde_json::Value = res.json().await?;
    assert_eq!(body["message"], "Login successful");
    Ok(())
}

#[tokio::test]
async fn errors_are_translated_too() -> Result<()> {
    let server = common::spawn().await?;
    let res = server
        .client
        .get(server.url("/user-profile"))
        .header("Accept-Language", "id")
        .send()
        .await?;
    assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await?;
    assert_eq!(body["message"], "Tidak terautentikasi");
    Ok(())
}

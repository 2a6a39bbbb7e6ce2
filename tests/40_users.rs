mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::json;

#[tokio::test]
async fn user_is_created_with_roles() -> Result<()> {
    let server = common::spawn().await?;
    let admin = server.admin_token().await?;

    let (status, body) = server
        .post(
            "/users",
            &admin,
            json!({ "username": "jane", "email": "jane@example.com", "password": "secret123", "roles": ["Manager"] }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status_code"], 3000);
    assert_eq!(body["data"]["roles"][0]["name"], "Manager");
    assert!(body["data"].get("password").is_none());

    let (_, profile) = server.get("/user-profile", &admin).await?;
    let admin_id = profile["data"]["id"].clone();
    assert!(admin_id.is_i64());
    assert_eq!(body["data"]["created_by"], admin_id);
    assert_eq!(body["data"]["updated_by"], admin_id);

    let (status, body) = server
        .post("/users", &admin, json!({ "username": "jane2", "email": "jane@example.com", "password": "short" }))
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["email"][0], "The email has already been taken.");
    assert!(body["errors"]["password"].is_array());

    let (status, body) = server
        .post(
            "/users",
            &admin,
            json!({ "username": "joe", "email": "joe@example.com", "password": "secret123", "roles": ["Manager", "Pilot"] }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["roles.1"].is_array());
    Ok(())
}

#[tokio::test]
async fn unknown_user_uses_domain_code() -> Result<()> {
    let server = common::spawn().await?;
    let admin = server.admin_token().await?;
    let (status, body) = server.get("/users/999", &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status_code"], 3004);
    assert_eq!(body["message"], "User not found");
    Ok(())
}

#[tokio::test]
async fn update_keeps_unchanged_email_and_rehashes_password() -> Result<()> {
    let server = common::spawn().await?;
    let admin = server.admin_token().await?;
    let (_, body) = server
        .post("/users", &admin, json!({ "username": "jane", "email": "jane@example.com", "password": "secret123" }))
        .await?;
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = server
        .put(
            &format!("/users/{}", id),
            &admin,
            json!({ "username": "jane.doe", "email": "jane@example.com", "password": "another123" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status_code"], 3005);
    assert_eq!(body["data"]["username"], "jane.doe");

    server.login("jane@example.com", "another123").await?;

    let (status, body) = server.put(&format!("/users/{}", id), &admin, json!({ "username": "jd" })).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["username"].is_array());
    Ok(())
}

#[tokio::test]
async fn soft_delete_trash_and_restore() -> Result<()> {
    let server = common::spawn().await?;
    let admin = server.admin_token().await?;
    let jane = server.user_with_roles(&admin, "jane", &["Sales"]).await?;
    let (_, list) = server.get("/users?search=jane", &admin).await?;
    let id = list["data"]["users"][0]["id"].as_i64().unwrap();

    let (status, body) = server.delete(&format!("/users/{}", id), &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status_code"], 3007);

    // Deleting a user revokes its tokens.
    let (status, _) = server.get("/user-profile", &jane).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = server.get("/users/trashed", &admin).await?;
    assert_eq!(body["data"]["users"][0]["id"], id);
    let (status, _) = server.get(&format!("/users/{}", id), &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server.send(Method::POST, &format!("/users/{}/restore", id), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted_at"], serde_json::Value::Null);

    let (status, body) = server.send(Method::POST, &format!("/users/{}/restore", id), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User is not deleted");
    Ok(())
}

#[tokio::test]
async fn role_assignment_endpoints() -> Result<()> {
    let server = common::spawn().await?;
    let admin = server.admin_token().await?;
    let (_, body) = server
        .post("/users", &admin, json!({ "username": "jane", "email": "jane@example.com", "password": "secret123" }))
        .await?;
    let id = body["data"]["id"].as_i64().unwrap();
    let roles_path = format!("/users/{}/roles", id);

    let (status, body) = server.post(&roles_path, &admin, json!({ "role": "Sales" })).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["roles"][0]["name"], "Sales");

    // Assigning twice keeps a single link.
    server.post(&roles_path, &admin, json!({ "role": "Sales" })).await?;
    let (_, body) = server.get(&roles_path, &admin).await?;
    assert_eq!(body["data"]["roles"].as_array().map(Vec::len), Some(1));

    let (_, body) = server.post(&format!("/users/{}/has-role", id), &admin, json!({ "role": "Sales" })).await?;
    assert_eq!(body["data"]["has_role"], true);
    let (_, body) = server
        .post(&format!("/users/{}/has-permission", id), &admin, json!({ "permission": "view orders" }))
        .await?;
    assert_eq!(body["data"]["has_permission"], true);

    let (status, body) = server.put(&roles_path, &admin, json!({ "roles": ["Support", "Manager"] })).await?;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]["user"]["roles"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["name"].as_str())
        .collect();
    assert_eq!(names, ["Manager", "Support"]);

    let (status, body) = server
        .send(Method::DELETE, &roles_path, Some(&admin), Some(json!({ "role": "Manager" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["roles"].as_array().map(Vec::len), Some(1));

    let (status, body) = server.post(&roles_path, &admin, json!({ "role": "Pilot" })).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["role"][0], "The selected role is invalid.");

    let (_, body) = server.get(&format!("/users/{}/permissions", id), &admin).await?;
    let permissions: Vec<&str> = body["data"]["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();
    assert!(permissions.contains(&"process orders"));
    assert!(!permissions.contains(&"view products"));
    Ok(())
}

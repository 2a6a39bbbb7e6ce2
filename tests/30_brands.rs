mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn brand_lifecycle() -> Result<()> {
    let server = common::spawn().await?;
    let admin = server.admin_token().await?;

    let (status, body) = server
        .post("/brands", &admin, json!({ "name": "Acme Outdoor", "web_url": "https://acme.example.com" }))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status_code"], 1004);
    assert_eq!(body["data"]["slug"], "acme-outdoor");
    assert_eq!(body["data"]["is_featured"], false);
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = server.get("/brands/acme-outdoor", &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id);

    let (status, body) = server.put(&format!("/brands/{}", id), &admin, json!({ "name": "Acme Trail" })).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["slug"], "acme-trail");
    assert_eq!(body["data"]["web_url"], "https://acme.example.com");

    let (status, body) = server.delete(&format!("/brands/{}", id), &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Brand deleted successfully");
    assert!(body.get("data").is_none());

    let (status, _) = server.get(&format!("/brands/{}", id), &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn brand_validation_errors() -> Result<()> {
    let server = common::spawn().await?;
    let admin = server.admin_token().await?;

    let (status, body) = server.post("/brands", &admin, json!({ "web_url": "not a url" })).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "Validation Error");
    assert!(body["errors"]["name"].is_array());
    assert!(body["errors"]["web_url"].is_array());

    server.post("/brands", &admin, json!({ "name": "Acme" })).await?;
    let (status, body) = server.post("/brands", &admin, json!({ "name": "Acme" })).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["name"][0], "The name has already been taken.");
    Ok(())
}

#[tokio::test]
async fn brand_listing_paginates_and_searches() -> Result<()> {
    let server = common::spawn().await?;
    let admin = server.admin_token().await?;
    for (index, name) in ["Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot"].iter().enumerate() {
        server
            .post("/brands", &admin, json!({ "name": name, "order": index, "is_featured": index % 2 == 0 }))
            .await?;
    }

    let (status, body) = server.get("/brands?per_page=5&page=2", &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["pagination"]["total"], 6);
    assert_eq!(body["meta"]["pagination"]["per_page"], 5);
    assert_eq!(body["meta"]["pagination"]["current_page"], 2);
    assert_eq!(body["meta"]["pagination"]["last_page"], 2);
    assert_eq!(body["data"]["brands"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"]["brands"][0]["name"], "Foxtrot");

    let (_, body) = server.get("/brands?search=rav", &admin).await?;
    assert_eq!(body["data"]["brands"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"]["brands"][0]["name"], "Bravo");

    let (_, body) = server.get("/brands?featured=true&sort_by=name&sort_direction=desc", &admin).await?;
    let names: Vec<&str> = body["data"]["brands"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|b| b["name"].as_str())
        .collect();
    assert_eq!(names, ["Echo", "Charlie", "Alpha"]);
    Ok(())
}

#[tokio::test]
async fn brand_with_products_cannot_be_deleted() -> Result<()> {
    let server = common::spawn().await?;
    let admin = server.admin_token().await?;
    let (_, brand) = server.post("/brands", &admin, json!({ "name": "Acme" })).await?;
    let (_, category) = server.post("/categories", &admin, json!({ "name": "Tents" })).await?;
    let brand_id = brand["data"]["id"].as_i64().unwrap();
    let category_id = category["data"]["id"].as_i64().unwrap();

    let (status, _) = server
        .post(
            "/products",
            &admin,
            json!({ "name": "Dome Tent", "category_id": category_id, "brand_id": brand_id, "base_price": "129.90" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = server.delete(&format!("/brands/{}", brand_id), &admin).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["products_count"], 1);

    let (status, _) = server.get(&format!("/brands/{}", brand_id), &admin).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn per_page_is_clamped() -> Result<()> {
    let server = common::spawn().await?;
    let admin = server.admin_token().await?;
    server.post("/brands", &admin, json!({ "name": "Acme" })).await?;

    let (_, body) = server.get("/brands?per_page=1000", &admin).await?;
    assert_eq!(body["meta"]["pagination"]["per_page"], 100);
    let (_, body) = server.get("/brands?per_page=0", &admin).await?;
    assert_eq!(body["meta"]["pagination"]["per_page"], 5);
    let (_, body) = server.get("/brands", &admin).await?;
    assert_eq!(body["meta"]["pagination"]["per_page"], 10);
    assert_eq!(body["meta"]["pagination"]["last_page"], 1);
    Ok(())
}

#[tokio::test]
async fn unchanged_name_keeps_slug() -> Result<()> {
    let server = common::spawn().await?;
    let admin = server.admin_token().await?;
    let (_, first) = server.post("/brands", &admin, json!({ "name": "Sale" })).await?;
    let (_, second) = server.post("/brands", &admin, json!({ "name": "Sale!" })).await?;
    let first_id = first["data"]["id"].as_i64().unwrap();
    let second_id = second["data"]["id"].as_i64().unwrap();
    let suffixed = second["data"]["slug"].as_str().unwrap().to_string();
    assert!(suffixed.starts_with("sale-"));

    // With "sale" free again, re-resolving would change the slug.
    server.delete(&format!("/brands/{}", first_id), &admin).await?;
    let (status, body) = server
        .put(&format!("/brands/{}", second_id), &admin, json!({ "name": "Sale!", "description": "Tools" }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["slug"], suffixed);
    assert_eq!(body["data"]["description"], "Tools");
    Ok(())
}

mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

struct Catalog {
    category: i64,
    brand: i64,
}

async fn catalog(server: &common::TestServer, token: &str) -> Result<Catalog> {
    let (_, category) = server.post("/categories", token, json!({ "name": "Shirts" })).await?;
    let (_, brand) = server.post("/brands", token, json!({ "name": "Acme" })).await?;
    Ok(Catalog {
        category: category["data"]["id"].as_i64().unwrap_or_default(),
        brand: brand["data"]["id"].as_i64().unwrap_or_default(),
    })
}

#[tokio::test]
async fn product_is_created_with_generated_identifiers() -> Result<()> {
    let server = common::spawn().await?;
    let admin = server.admin_token().await?;
    let catalog = catalog(&server, &admin).await?;

    let (status, body) = server
        .post(
            "/products",
            &admin,
            json!({
                "name": "Red T-Shirt",
                "category_id": catalog.category,
                "brand_id": catalog.brand,
                "base_price": "19.99",
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let product = &body["data"];
    assert_eq!(product["slug"], "red-t-shirt");
    assert!(product["sku"].as_str().unwrap().starts_with("RED-"));
    assert!(product["uuid"].as_str().is_some());
    assert_eq!(product["base_price"], "19.99");
    assert_eq!(product["is_active"], true);
    assert_eq!(product["category"]["name"], "Shirts");
    assert_eq!(product["brand"]["name"], "Acme");

    let (status, body) = server.get("/products/red-t-shirt", &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["variants"], json!([]));
    Ok(())
}

#[tokio::test]
async fn product_validation() -> Result<()> {
    let server = common::spawn().await?;
    let admin = server.admin_token().await?;
    let catalog = catalog(&server, &admin).await?;

    let (status, body) = server.post("/products", &admin, json!({ "name": "Nameless" })).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["category_id"].is_array());
    assert!(body["errors"]["brand_id"].is_array());
    assert!(body["errors"]["base_price"].is_array());

    let (status, body) = server
        .post(
            "/products",
            &admin,
            json!({ "name": "Cheap", "category_id": catalog.category, "brand_id": 999, "base_price": "-1" }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["brand_id"][0], "The selected brand id is invalid.");
    assert!(body["errors"]["base_price"].is_array());
    Ok(())
}

#[tokio::test]
async fn product_listing_filters() -> Result<()> {
    let server = common::spawn().await?;
    let admin = server.admin_token().await?;
    let catalog = catalog(&server, &admin).await?;
    let (_, other) = server.post("/brands", &admin, json!({ "name": "Globex" })).await?;
    let other_brand = other["data"]["id"].as_i64().unwrap();

    for (name, brand, active) in [("Tee", catalog.brand, true), ("Polo", catalog.brand, false), ("Hoodie", other_brand, true)] {
        let (status, _) = server
            .post(
                "/products",
                &admin,
                json!({ "name": name, "category_id": catalog.category, "brand_id": brand, "base_price": 10, "is_active": active }),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = server.get(&format!("/products?brand_id={}", catalog.brand), &admin).await?;
    assert_eq!(body["meta"]["pagination"]["total"], 2);

    let (_, body) = server.get("/products?is_active=false", &admin).await?;
    assert_eq!(body["data"]["products"][0]["name"], "Polo");

    let (_, body) = server.get("/products?search=hood", &admin).await?;
    assert_eq!(body["data"]["products"][0]["brand"]["name"], "Globex");
    Ok(())
}

#[tokio::test]
async fn variants_are_nested_under_their_product() -> Result<()> {
    let server = common::spawn().await?;
    let admin = server.admin_token().await?;
    let catalog = catalog(&server, &admin).await?;
    let (_, product) = server
        .post(
            "/products",
            &admin,
            json!({ "name": "Tee", "category_id": catalog.category, "brand_id": catalog.brand, "base_price": "10.00" }),
        )
        .await?;
    let product_id = product["data"]["id"].as_i64().unwrap();
    let (_, color) = server.post("/colors", &admin, json!({ "name": "Red", "code": "RD", "hex_code": "#FF0000" })).await?;
    let color_id = color["data"]["id"].as_i64().unwrap();

    let path = format!("/products/{}/variants", product_id);
    let (status, body) = server
        .post(&path, &admin, json!({ "sku_extension": "RD-M", "color_id": color_id, "stock_quantity": 5 }))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["product_id"], product_id);
    let variant_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = server.post(&path, &admin, json!({ "sku_extension": "X", "size_id": 42 })).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["size_id"].is_array());

    let (status, body) = server.put(&format!("{}/{}", path, variant_id), &admin, json!({ "stock_quantity": 7 })).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stock_quantity"], 7);
    assert_eq!(body["data"]["sku_extension"], "RD-M");

    let (_, body) = server.get(&path, &admin).await?;
    assert_eq!(body["data"]["variants"].as_array().map(Vec::len), Some(1));

    let (status, _) = server.delete(&format!("{}/{}", path, variant_id), &admin).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = server.delete(&format!("{}/{}", path, variant_id), &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Product variant not found");
    Ok(())
}

#[tokio::test]
async fn deleted_product_is_hidden() -> Result<()> {
    let server = common::spawn().await?;
    let admin = server.admin_token().await?;
    let catalog = catalog(&server, &admin).await?;
    let (_, product) = server
        .post(
            "/products",
            &admin,
            json!({ "name": "Tee", "category_id": catalog.category, "brand_id": catalog.brand, "base_price": 5 }),
        )
        .await?;
    let id = product["data"]["id"].as_i64().unwrap();

    let (status, _) = server.delete(&format!("/products/{}", id), &admin).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server.get(&format!("/products/{}", id), &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = server.get("/products", &admin).await?;
    assert_eq!(body["meta"]["pagination"]["total"], 0);
    Ok(())
}

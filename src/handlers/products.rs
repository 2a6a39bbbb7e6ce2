use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::common::{
    all_of, find_by_id_or_slug, parse_flag, parse_id, stamp_created, stamp_updated, to_row, Checks, ListParams,
};
use crate::api::{ApiJson, Envelope};
use crate::auth::Principal;
use crate::database::models::{Brand, Category, Product, ProductVariant};
use crate::database::{Query as StoreQuery, StoreError};
use crate::error::ApiError;
use crate::slug::{generate_sku, resolve_slug};
use crate::state::AppState;

const SORTABLE: &[&str] = &["id", "name", "sku", "base_price", "is_active", "is_featured", "created_at", "updated_at"];

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateProduct {
    #[validate(required, length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(required)]
    pub category_id: Option<i64>,
    #[validate(required)]
    pub brand_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[validate(required)]
    pub base_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 255))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<Category>,
    pub brand: Option<Brand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variants: Option<Vec<ProductVariant>>,
}

fn check_price(checks: &mut Checks, price: Option<Decimal>) {
    if price.is_some_and(|p| p < Decimal::ZERO) {
        checks.add("base_price", "The base price must be at least 0.");
    }
}

async fn with_relations(state: &AppState, product: Product, variants: bool) -> Result<ProductView, StoreError> {
    let category = match product.category_id {
        Some(id) => state.repo::<Category>().find(id).await?,
        None => None,
    };
    let brand = match product.brand_id {
        Some(id) => state.repo::<Brand>().find(id).await?,
        None => None,
    };
    let variants = if variants {
        let query = StoreQuery::filter(json!({ "product_id": product.id })).order("order asc");
        Some(state.repo::<ProductVariant>().select_any(query).await?)
    } else {
        None
    };
    Ok(ProductView { product, category, brand, variants })
}

/// GET /products
pub async fn index(State(state): State<AppState>, Query(params): Query<ListParams>) -> Result<Envelope, ApiError> {
    let mut clauses: Vec<Value> = params.search_clause(&["name", "description", "sku"]).into_iter().collect();
    if let Some(category_id) = parse_id(params.category_id.as_deref()) {
        clauses.push(json!({ "category_id": category_id }));
    }
    if let Some(brand_id) = parse_id(params.brand_id.as_deref()) {
        clauses.push(json!({ "brand_id": brand_id }));
    }
    if let Some(featured) = parse_flag(params.featured.as_deref()) {
        clauses.push(json!({ "is_featured": featured }));
    }
    if let Some(active) = parse_flag(params.is_active.as_deref()) {
        clauses.push(json!({ "is_active": active }));
    }

    let query = StoreQuery::filter(all_of(clauses)).order(params.order(SORTABLE, "created_at", "desc"));
    let page = state
        .repo::<Product>()
        .paginate(query, params.page_request(&state.config.pagination))
        .await?;

    let category_ids: Vec<i64> = page.items.iter().filter_map(|p| p.category_id).collect();
    let brand_ids: Vec<i64> = page.items.iter().filter_map(|p| p.brand_id).collect();
    let categories: HashMap<i64, Category> = state
        .repo::<Category>()
        .find_many(&category_ids)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();
    let brands: HashMap<i64, Brand> =
        state.repo::<Brand>().find_many(&brand_ids).await?.into_iter().map(|b| (b.id, b)).collect();

    let items: Vec<ProductView> = page
        .items
        .iter()
        .cloned()
        .map(|product| ProductView {
            category: product.category_id.and_then(|id| categories.get(&id).cloned()),
            brand: product.brand_id.and_then(|id| brands.get(&id).cloned()),
            variants: None,
            product,
        })
        .collect();

    Ok(Envelope::ok(json!({ "products": items }), "Products retrieved successfully").with_pagination(&page))
}

/// POST /products
pub async fn store(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(input): ApiJson<CreateProduct>,
) -> Result<Envelope, ApiError> {
    let products = state.repo::<Product>();
    let mut checks = Checks::new(&input);
    check_price(&mut checks, input.base_price);
    checks.exists(&state.repo::<Category>(), "category_id", input.category_id).await?;
    checks.exists(&state.repo::<Brand>(), "brand_id", input.brand_id).await?;
    checks.finish()?;

    let name = input.name.clone().unwrap_or_default();
    let mut row = to_row(&input)?;
    row.insert("uuid".into(), json!(Uuid::new_v4()));
    row.insert("sku".into(), json!(generate_sku(&name)));
    row.insert("slug".into(), json!(resolve_slug(&name, &products, None).await?));
    row.entry("is_active").or_insert(json!(true));
    row.entry("is_featured").or_insert(json!(false));
    stamp_created(&mut row, principal.id);

    let product = products.create(row).await?;
    let view = with_relations(&state, product, false).await?;
    Ok(Envelope::created(view, "Product created successfully"))
}

/// GET /products/:product (id or slug)
pub async fn show(State(state): State<AppState>, Path(key): Path<String>) -> Result<Envelope, ApiError> {
    let product = find_by_id_or_slug(&state.repo::<Product>(), &key)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    let view = with_relations(&state, product, true).await?;
    Ok(Envelope::ok(view, "Product retrieved successfully"))
}

/// PUT /products/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<UpdateProduct>,
) -> Result<Envelope, ApiError> {
    let products = state.repo::<Product>();
    let product = products.find(id).await?.ok_or_else(|| ApiError::not_found("Product not found"))?;

    let mut checks = Checks::new(&input);
    check_price(&mut checks, input.base_price);
    checks.exists(&state.repo::<Category>(), "category_id", input.category_id).await?;
    checks.exists(&state.repo::<Brand>(), "brand_id", input.brand_id).await?;
    checks.finish()?;

    let mut row = to_row(&input)?;
    if let Some(name) = input.name.as_deref().filter(|n| *n != product.name) {
        row.insert("slug".into(), json!(resolve_slug(name, &products, Some(id)).await?));
    }
    stamp_updated(&mut row, principal.id);

    let product = products.update(id, row).await?;
    let view = with_relations(&state, product, false).await?;
    Ok(Envelope::ok(view, "Product updated successfully"))
}

/// DELETE /products/:id
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Envelope, ApiError> {
    let products = state.repo::<Product>();
    if products.find(id).await?.is_none() {
        return Err(ApiError::not_found("Product not found"));
    }
    products.soft_delete(id, Some(principal.id)).await?;

    // Variants are retired with their product.
    let variants = state.repo::<ProductVariant>();
    for variant in variants.select_any(StoreQuery::filter(json!({ "product_id": id }))).await? {
        variants.soft_delete(variant.id, Some(principal.id)).await?;
    }
    Ok(Envelope::ok(Value::Null, "Product deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn negative_prices_are_rejected() {
        let input = UpdateProduct {
            name: None,
            category_id: None,
            brand_id: None,
            description: None,
            base_price: None,
            is_active: None,
            is_featured: None,
        };
        let mut checks = Checks::new(&input);
        check_price(&mut checks, Decimal::from_str("-0.01").ok());
        assert!(checks.has("base_price"));

        let mut checks = Checks::new(&input);
        check_price(&mut checks, Decimal::from_str("0").ok());
        check_price(&mut checks, Decimal::from_str("19.99").ok());
        assert!(checks.finish().is_ok());
    }
}

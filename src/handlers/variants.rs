use axum::extract::{Path, State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use super::common::{stamp_created, stamp_updated, to_row, Checks};
use crate::api::{ApiJson, Envelope};
use crate::auth::Principal;
use crate::database::models::{Color, Product, ProductVariant, Size};
use crate::database::Query as StoreQuery;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateVariant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_id: Option<i64>,
    #[validate(range(min = 0))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_adjustment: Option<Decimal>,
    #[validate(required, length(min = 1, max = 50))]
    pub sku_extension: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct UpdateVariant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_id: Option<i64>,
    #[validate(range(min = 0))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_adjustment: Option<Decimal>,
    #[validate(length(min = 1, max = 50))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku_extension: Option<String>,
}

async fn product_or_404(state: &AppState, product_id: i64) -> Result<Product, ApiError> {
    state
        .repo::<Product>()
        .find(product_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))
}

async fn variant_or_404(state: &AppState, product_id: i64, variant_id: i64) -> Result<ProductVariant, ApiError> {
    state
        .repo::<ProductVariant>()
        .select_one(StoreQuery::filter(json!({ "id": variant_id, "product_id": product_id })))
        .await?
        .ok_or_else(|| ApiError::not_found("Product variant not found"))
}

async fn check_references(
    state: &AppState,
    checks: &mut Checks,
    color_id: Option<i64>,
    size_id: Option<i64>,
) -> Result<(), ApiError> {
    checks.exists(&state.repo::<Color>(), "color_id", color_id).await?;
    checks.exists(&state.repo::<Size>(), "size_id", size_id).await?;
    Ok(())
}

/// GET /products/:id/variants
pub async fn index(State(state): State<AppState>, Path(product_id): Path<i64>) -> Result<Envelope, ApiError> {
    let product = product_or_404(&state, product_id).await?;
    let variants = state
        .repo::<ProductVariant>()
        .select_any(StoreQuery::filter(json!({ "product_id": product.id })).order("order asc"))
        .await?;
    Ok(Envelope::ok(json!({ "variants": variants }), "Product variants retrieved successfully"))
}

/// POST /products/:id/variants
pub async fn store(
    State(state): State<AppState>,
    principal: Principal,
    Path(product_id): Path<i64>,
    ApiJson(input): ApiJson<CreateVariant>,
) -> Result<Envelope, ApiError> {
    let product = product_or_404(&state, product_id).await?;

    let mut checks = Checks::new(&input);
    check_references(&state, &mut checks, input.color_id, input.size_id).await?;
    checks.finish()?;

    let mut row = to_row(&input)?;
    row.insert("product_id".into(), json!(product.id));
    row.entry("stock_quantity").or_insert(json!(0));
    row.entry("price_adjustment").or_insert(json!(Decimal::ZERO));
    stamp_created(&mut row, principal.id);

    let variant = state.repo::<ProductVariant>().create(row).await?;
    Ok(Envelope::created(variant, "Product variant created successfully"))
}

/// PUT /products/:id/variants/:variant_id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path((product_id, variant_id)): Path<(i64, i64)>,
    ApiJson(input): ApiJson<UpdateVariant>,
) -> Result<Envelope, ApiError> {
    product_or_404(&state, product_id).await?;
    let variant = variant_or_404(&state, product_id, variant_id).await?;

    let mut checks = Checks::new(&input);
    check_references(&state, &mut checks, input.color_id, input.size_id).await?;
    checks.finish()?;

    let mut row = to_row(&input)?;
    stamp_updated(&mut row, principal.id);
    let variant = state.repo::<ProductVariant>().update(variant.id, row).await?;
    Ok(Envelope::ok(variant, "Product variant updated successfully"))
}

/// DELETE /products/:id/variants/:variant_id
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path((product_id, variant_id)): Path<(i64, i64)>,
) -> Result<Envelope, ApiError> {
    product_or_404(&state, product_id).await?;
    let variant = variant_or_404(&state, product_id, variant_id).await?;
    state
        .repo::<ProductVariant>()
        .soft_delete(variant.id, Some(principal.id))
        .await?;
    Ok(Envelope::ok(Value::Null, "Product variant deleted successfully"))
}

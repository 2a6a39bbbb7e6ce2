use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use super::common::{
    all_of, find_by_id_or_slug, parse_flag, parse_id, stamp_created, stamp_updated, to_row, Checks,
    ListParams,
};
use crate::api::{ApiJson, Envelope};
use crate::auth::Principal;
use crate::database::models::{Brand, Product};
use crate::database::Query as StoreQuery;
use crate::error::ApiError;
use crate::slug::resolve_slug;
use crate::state::AppState;

const VALIDATION_MESSAGE: &str = "Validation Error";
const SORTABLE: &[&str] = &["id", "name", "slug", "order", "status_id", "is_featured", "created_at", "updated_at"];

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateBrand {
    #[validate(required, length(min = 1, max = 255))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[validate(url, length(max = 255))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct UpdateBrand {
    #[validate(length(min = 1, max = 255))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[validate(url, length(max = 255))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

/// GET /brands
pub async fn index(State(state): State<AppState>, Query(params): Query<ListParams>) -> Result<Envelope, ApiError> {
    let mut clauses: Vec<Value> = params.search_clause(&["name", "description"]).into_iter().collect();
    if let Some(featured) = parse_flag(params.featured.as_deref()) {
        clauses.push(json!({ "is_featured": featured }));
    }
    if let Some(status_id) = parse_id(params.status_id.as_deref()) {
        clauses.push(json!({ "status_id": status_id }));
    }

    let query = StoreQuery::filter(all_of(clauses)).order(params.order(SORTABLE, "order", "asc"));
    let page = state
        .repo::<Brand>()
        .paginate(query, params.page_request(&state.config.pagination))
        .await?;

    Ok(Envelope::ok(json!({ "brands": page.items }), "Brands retrieved successfully").with_pagination(&page))
}

/// POST /brands
pub async fn store(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(input): ApiJson<CreateBrand>,
) -> Result<Envelope, ApiError> {
    let brands = state.repo::<Brand>();
    let mut checks = Checks::new(&input).with_message(VALIDATION_MESSAGE);
    checks.unique(&brands, "name", input.name.as_deref(), None).await?;
    checks.finish()?;

    let name = input.name.clone().unwrap_or_default();
    let mut row = to_row(&input)?;
    row.insert("slug".into(), json!(resolve_slug(&name, &brands, None).await?));
    row.entry("is_featured").or_insert(json!(false));
    row.entry("status_id").or_insert(json!(1));
    row.entry("order").or_insert(json!(1));
    stamp_created(&mut row, principal.id);

    let brand = brands.create(row).await?;
    Ok(Envelope::created(brand, "Brand created successfully"))
}

/// GET /brands/:brand (id or slug)
pub async fn show(State(state): State<AppState>, Path(key): Path<String>) -> Result<Envelope, ApiError> {
    let brand = find_by_id_or_slug(&state.repo::<Brand>(), &key)
        .await?
        .ok_or_else(|| ApiError::not_found("Brand not found"))?;
    Ok(Envelope::ok(brand, "Brand details retrieved successfully"))
}

/// PUT /brands/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<UpdateBrand>,
) -> Result<Envelope, ApiError> {
    let brands = state.repo::<Brand>();
    let brand = brands.find(id).await?.ok_or_else(|| ApiError::not_found("Brand not found"))?;

    let mut checks = Checks::new(&input).with_message(VALIDATION_MESSAGE);
    checks.unique(&brands, "name", input.name.as_deref(), Some(id)).await?;
    checks.finish()?;

    let mut row = to_row(&input)?;
    if let Some(name) = input.name.as_deref().filter(|n| *n != brand.name) {
        row.insert("slug".into(), json!(resolve_slug(name, &brands, Some(id)).await?));
    }
    stamp_updated(&mut row, principal.id);

    let brand = brands.update(id, row).await?;
    Ok(Envelope::ok(brand, "Brand updated successfully"))
}

/// DELETE /brands/:id
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Envelope, ApiError> {
    let brands = state.repo::<Brand>();
    if brands.find(id).await?.is_none() {
        return Err(ApiError::not_found("Brand not found"));
    }

    let products_count = state.repo::<Product>().count(json!({ "brand_id": id })).await?;
    if products_count > 0 {
        return Err(ApiError::conflict(
            "Cannot delete brand that has products. Please delete the products first or reassign them.",
            json!({ "products_count": products_count }),
        ));
    }

    brands.soft_delete(id, Some(principal.id)).await?;
    Ok(Envelope::ok(Value::Null, "Brand deleted successfully"))
}

use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use super::common::{all_of, parse_id, stamp_created, stamp_updated, to_row, Checks, ListParams};
use crate::api::{ApiJson, Envelope};
use crate::auth::Principal;
use crate::database::models::{Color, ProductVariant};
use crate::database::Query as StoreQuery;
use crate::error::ApiError;
use crate::state::AppState;

const VALIDATION_MESSAGE: &str = "Validation Error";
const SORTABLE: &[&str] = &["id", "name", "code", "hex_code", "order", "status_id", "created_at", "updated_at"];

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateColor {
    #[validate(required, length(min = 1, max = 50))]
    pub name: Option<String>,
    #[validate(length(max = 20))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct UpdateColor {
    #[validate(length(min = 1, max = 50))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[validate(length(max = 20))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

/// `#` followed by exactly six hex digits.
pub fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(digits) => digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

fn check_hex(checks: &mut Checks, hex_code: Option<&str>) {
    if hex_code.is_some_and(|hex| !is_hex_color(hex)) {
        checks.add("hex_code", "The hex code format is invalid.");
    }
}

/// GET /colors
pub async fn index(State(state): State<AppState>, Query(params): Query<ListParams>) -> Result<Envelope, ApiError> {
    let mut clauses: Vec<Value> = params.search_clause(&["name", "code"]).into_iter().collect();
    if let Some(status_id) = parse_id(params.status_id.as_deref()) {
        clauses.push(json!({ "status_id": status_id }));
    }

    let query = StoreQuery::filter(all_of(clauses)).order(params.order(SORTABLE, "name", "asc"));
    let page = state
        .repo::<Color>()
        .paginate(query, params.page_request(&state.config.pagination))
        .await?;

    Ok(Envelope::ok(json!({ "colors": page.items }), "Colors retrieved successfully").with_pagination(&page))
}

/// POST /colors
pub async fn store(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(input): ApiJson<CreateColor>,
) -> Result<Envelope, ApiError> {
    let colors = state.repo::<Color>();
    let mut checks = Checks::new(&input).with_message(VALIDATION_MESSAGE);
    check_hex(&mut checks, input.hex_code.as_deref());
    checks.unique(&colors, "name", input.name.as_deref(), None).await?;
    checks.unique(&colors, "code", input.code.as_deref(), None).await?;
    checks.finish()?;

    let mut row = to_row(&input)?;
    row.entry("status_id").or_insert(json!(1));
    row.entry("order").or_insert(json!(1));
    stamp_created(&mut row, principal.id);

    let color = colors.create(row).await?;
    Ok(Envelope::created(color, "Color created successfully"))
}

/// GET /colors/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Envelope, ApiError> {
    let color = state
        .repo::<Color>()
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Color not found"))?;
    Ok(Envelope::ok(color, "Color details retrieved successfully"))
}

/// PUT /colors/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<UpdateColor>,
) -> Result<Envelope, ApiError> {
    let colors = state.repo::<Color>();
    if colors.find(id).await?.is_none() {
        return Err(ApiError::not_found("Color not found"));
    }

    let mut checks = Checks::new(&input).with_message(VALIDATION_MESSAGE);
    check_hex(&mut checks, input.hex_code.as_deref());
    checks.unique(&colors, "name", input.name.as_deref(), Some(id)).await?;
    checks.unique(&colors, "code", input.code.as_deref(), Some(id)).await?;
    checks.finish()?;

    let mut row = to_row(&input)?;
    stamp_updated(&mut row, principal.id);
    let color = colors.update(id, row).await?;
    Ok(Envelope::ok(color, "Color updated successfully"))
}

/// DELETE /colors/:id
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Envelope, ApiError> {
    let colors = state.repo::<Color>();
    if colors.find(id).await?.is_none() {
        return Err(ApiError::not_found("Color not found"));
    }

    let variants_count = state.repo::<ProductVariant>().count(json!({ "color_id": id })).await?;
    if variants_count > 0 {
        return Err(ApiError::conflict(
            "Cannot delete color that is used by product variants",
            json!({ "variants_count": variants_count }),
        ));
    }

    colors.soft_delete(id, Some(principal.id)).await?;
    Ok(Envelope::ok(Value::Null, "Color deleted successfully"))
}

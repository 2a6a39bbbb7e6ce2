use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use super::common::{all_of, parse_id, stamp_created, stamp_updated, to_row, Checks, ListParams};
use crate::api::{ApiJson, Envelope};
use crate::auth::Principal;
use crate::database::models::{ProductVariant, Size};
use crate::database::Query as StoreQuery;
use crate::error::ApiError;
use crate::state::AppState;

const VALIDATION_MESSAGE: &str = "Validation Error";
const SORTABLE: &[&str] = &["id", "name", "code", "order", "status_id", "created_at", "updated_at"];

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateSize {
    #[validate(required, length(min = 1, max = 50))]
    pub name: Option<String>,
    #[validate(required, length(min = 1, max = 20))]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct UpdateSize {
    #[validate(length(min = 1, max = 50))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 20))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

/// GET /sizes
pub async fn index(State(state): State<AppState>, Query(params): Query<ListParams>) -> Result<Envelope, ApiError> {
    let mut clauses: Vec<Value> = params.search_clause(&["name", "code"]).into_iter().collect();
    if let Some(status_id) = parse_id(params.status_id.as_deref()) {
        clauses.push(json!({ "status_id": status_id }));
    }

    let query = StoreQuery::filter(all_of(clauses)).order(params.order(SORTABLE, "order", "asc"));
    let page = state
        .repo::<Size>()
        .paginate(query, params.page_request(&state.config.pagination))
        .await?;

    Ok(Envelope::ok(json!({ "sizes": page.items }), "Sizes retrieved successfully").with_pagination(&page))
}

/// POST /sizes
pub async fn store(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(input): ApiJson<CreateSize>,
) -> Result<Envelope, ApiError> {
    let sizes = state.repo::<Size>();
    let mut checks = Checks::new(&input).with_message(VALIDATION_MESSAGE);
    checks.unique(&sizes, "name", input.name.as_deref(), None).await?;
    checks.unique(&sizes, "code", input.code.as_deref(), None).await?;
    checks.finish()?;

    let mut row = to_row(&input)?;
    row.entry("status_id").or_insert(json!(1));
    row.entry("order").or_insert(json!(1));
    stamp_created(&mut row, principal.id);

    let size = sizes.create(row).await?;
    Ok(Envelope::created(size, "Size created successfully"))
}

/// GET /sizes/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Envelope, ApiError> {
    let size = state
        .repo::<Size>()
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Size not found"))?;
    Ok(Envelope::ok(size, "Size details retrieved successfully"))
}

/// PUT /sizes/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<UpdateSize>,
) -> Result<Envelope, ApiError> {
    let sizes = state.repo::<Size>();
    if sizes.find(id).await?.is_none() {
        return Err(ApiError::not_found("Size not found"));
    }

    let mut checks = Checks::new(&input).with_message(VALIDATION_MESSAGE);
    checks.unique(&sizes, "name", input.name.as_deref(), Some(id)).await?;
    checks.unique(&sizes, "code", input.code.as_deref(), Some(id)).await?;
    checks.finish()?;

    let mut row = to_row(&input)?;
    stamp_updated(&mut row, principal.id);
    let size = sizes.update(id, row).await?;
    Ok(Envelope::ok(size, "Size updated successfully"))
}

/// DELETE /sizes/:id
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Envelope, ApiError> {
    let sizes = state.repo::<Size>();
    if sizes.find(id).await?.is_none() {
        return Err(ApiError::not_found("Size not found"));
    }

    let variants_count = state.repo::<ProductVariant>().count(json!({ "size_id": id })).await?;
    if variants_count > 0 {
        return Err(ApiError::conflict(
            "Cannot delete size that is used by product variants",
            json!({ "variants_count": variants_count }),
        ));
    }

    sizes.soft_delete(id, Some(principal.id)).await?;
    Ok(Envelope::ok(Value::Null, "Size deleted successfully"))
}

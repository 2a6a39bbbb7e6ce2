use std::collections::{BTreeMap, HashMap, HashSet};

use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use super::common::{
    all_of, find_by_id_or_slug, nullable, parse_flag, stamp_created, stamp_updated, to_row, Checks, ListParams,
};
use crate::api::{ApiJson, Envelope};
use crate::auth::Principal;
use crate::database::models::Category;
use crate::database::{Query as StoreQuery, Repository, StoreError};
use crate::error::ApiError;
use crate::slug::resolve_slug;
use crate::state::AppState;

const SORTABLE: &[&str] = &["id", "name", "slug", "order", "parent_id", "is_featured", "created_at", "updated_at"];

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateCategory {
    #[validate(required, length(min = 1, max = 100))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct UpdateCategory {
    #[validate(length(min = 1, max = 100))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `null` detaches the category from its parent.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
}

/// A category with its loaded relations.
#[derive(Debug, Serialize)]
pub struct CategoryView {
    #[serde(flatten)]
    pub category: Category,
    pub parent: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Category>>,
}

/// One line of the indented category picker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyEntry {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub level: usize,
    pub label: String,
}

async fn with_relations(repo: &Repository<Category>, category: Category, children: bool) -> Result<CategoryView, StoreError> {
    let parent = match category.parent_id {
        Some(parent_id) => repo.find(parent_id).await?,
        None => None,
    };
    let children = if children {
        let query = StoreQuery::filter(json!({ "parent_id": category.id })).order("order asc");
        Some(repo.select_any(query).await?)
    } else {
        None
    };
    Ok(CategoryView { category, parent, children })
}

/// GET /categories
pub async fn index(State(state): State<AppState>, Query(params): Query<ListParams>) -> Result<Envelope, ApiError> {
    let categories = state.repo::<Category>();

    let mut clauses: Vec<Value> = params.search_clause(&["name", "description"]).into_iter().collect();
    if let Some(parent) = params.parent_id.as_deref() {
        // "" and "0" select root categories
        match parent.trim().parse::<i64>() {
            Ok(id) if id != 0 => clauses.push(json!({ "parent_id": id })),
            _ => clauses.push(json!({ "parent_id": null })),
        }
    }
    if let Some(featured) = parse_flag(params.featured.as_deref()) {
        clauses.push(json!({ "is_featured": featured }));
    }

    let query = StoreQuery::filter(all_of(clauses)).order(params.order(SORTABLE, "id", "asc"));
    let page = categories
        .paginate(query, params.page_request(&state.config.pagination))
        .await?;

    let parent_ids: Vec<i64> = page.items.iter().filter_map(|c| c.parent_id).collect();
    let parents: HashMap<i64, Category> =
        categories.find_many(&parent_ids).await?.into_iter().map(|p| (p.id, p)).collect();
    let items: Vec<CategoryView> = page
        .items
        .iter()
        .cloned()
        .map(|category| {
            let parent = category.parent_id.and_then(|id| parents.get(&id).cloned());
            CategoryView { category, parent, children: None }
        })
        .collect();

    Ok(Envelope::ok(json!({ "categories": items }), "Categories retrieved successfully").with_pagination(&page))
}

/// POST /categories
pub async fn store(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(input): ApiJson<CreateCategory>,
) -> Result<Envelope, ApiError> {
    let categories = state.repo::<Category>();
    let mut checks = Checks::new(&input);
    checks.exists(&categories, "parent_id", input.parent_id).await?;
    checks.finish()?;

    let name = input.name.clone().unwrap_or_default();
    let mut row = to_row(&input)?;
    row.insert("slug".into(), json!(resolve_slug(&name, &categories, None).await?));
    row.entry("is_featured").or_insert(json!(false));
    row.insert("status_id".into(), json!(1));
    stamp_created(&mut row, principal.id);

    let category = categories.create(row).await?;
    let view = with_relations(&categories, category, false).await?;
    Ok(Envelope::created(view, "Category created successfully"))
}

/// GET /categories/:category (id or slug)
pub async fn show(State(state): State<AppState>, Path(key): Path<String>) -> Result<Envelope, ApiError> {
    let categories = state.repo::<Category>();
    let category = find_by_id_or_slug(&categories, &key)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;
    let view = with_relations(&categories, category, true).await?;
    Ok(Envelope::ok(view, "Category retrieved successfully"))
}

/// PUT /categories/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<UpdateCategory>,
) -> Result<Envelope, ApiError> {
    let categories = state.repo::<Category>();
    let category = categories
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    let mut checks = Checks::new(&input);
    checks.exists(&categories, "parent_id", input.parent_id.flatten()).await?;
    checks.finish()?;

    if input.parent_id.flatten() == Some(id) {
        return Err(ApiError::bad_request("A category cannot be its own parent"));
    }

    let mut row = to_row(&input)?;
    if let Some(name) = input.name.as_deref().filter(|n| *n != category.name) {
        row.insert("slug".into(), json!(resolve_slug(name, &categories, Some(id)).await?));
    }
    stamp_updated(&mut row, principal.id);

    let category = categories.update(id, row).await?;
    let view = with_relations(&categories, category, true).await?;
    Ok(Envelope::ok(view, "Category updated successfully"))
}

/// DELETE /categories/:id
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Envelope, ApiError> {
    let categories = state.repo::<Category>();
    if categories.find(id).await?.is_none() {
        return Err(ApiError::not_found("Category not found"));
    }

    let children_count = categories.count(json!({ "parent_id": id })).await?;
    if children_count > 0 {
        return Err(ApiError::conflict(
            "Cannot delete category with subcategories",
            json!({ "children_count": children_count }),
        ));
    }

    categories.soft_delete(id, Some(principal.id)).await?;
    Ok(Envelope::ok(Value::Null, "Category deleted successfully"))
}

/// GET /categories/hierarchy
pub async fn hierarchy(State(state): State<AppState>) -> Result<Envelope, ApiError> {
    let all = state
        .repo::<Category>()
        .select_any(StoreQuery::all().order("id asc"))
        .await?;
    Ok(Envelope::ok(
        json!({ "categories": flatten_hierarchy(&all) }),
        "Category hierarchy retrieved successfully",
    ))
}

/// Depth-first walk from the root categories. Categories whose parent is
/// not in `categories` are unreachable and left out, and a parent cycle is
/// cut at the first repeated node.
pub fn flatten_hierarchy(categories: &[Category]) -> Vec<HierarchyEntry> {
    let mut children: BTreeMap<Option<i64>, Vec<&Category>> = BTreeMap::new();
    for category in categories {
        children.entry(category.parent_id).or_default().push(category);
    }

    let mut out = Vec::with_capacity(categories.len());
    let mut seen = HashSet::new();
    let mut stack: Vec<(&Category, usize)> = children
        .get(&None)
        .map(|roots| roots.iter().rev().map(|c| (*c, 0)).collect())
        .unwrap_or_default();

    while let Some((category, level)) = stack.pop() {
        if !seen.insert(category.id) {
            continue;
        }
        out.push(HierarchyEntry {
            id: category.id,
            name: category.name.clone(),
            slug: category.slug.clone(),
            level,
            label: format!("{}{}", "— ".repeat(level), category.name),
        });
        if let Some(kids) = children.get(&Some(category.id)) {
            stack.extend(kids.iter().rev().map(|c| (*c, level + 1)));
        }
    }
    out
}

//! Pieces shared by the resource handlers: list parameters, field checks
//! and audit stamping.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use crate::config::PaginationConfig;
use crate::database::models::Entity;
use crate::database::{into_row, PageRequest, Repository, Row, StoreError};
use crate::error::{field_errors, ApiError, FieldErrors};

/// Query string of the list endpoints. Everything arrives as text so a
/// malformed value falls back to its default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub per_page: Option<String>,
    pub page: Option<String>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
    pub featured: Option<String>,
    pub status_id: Option<String>,
    pub parent_id: Option<String>,
    pub category_id: Option<String>,
    pub brand_id: Option<String>,
    pub is_active: Option<String>,
}

impl ListParams {
    pub fn page_request(&self, pagination: &PaginationConfig) -> PageRequest {
        let per_page = pagination.clamp(self.per_page.as_deref().and_then(|v| v.trim().parse().ok()));
        let page = self.page.as_deref().and_then(|v| v.trim().parse::<u32>().ok()).unwrap_or(1);
        PageRequest::new(page, per_page)
    }

    /// `$or` of case-insensitive substring matches over `columns`.
    pub fn search_clause(&self, columns: &[&str]) -> Option<Value> {
        let term = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let pattern = format!("%{}%", escape_like(term));
        let any: Vec<Value> = columns.iter().map(|c| json!({ *c: { "$ilike": pattern } })).collect();
        Some(json!({ "$or": any }))
    }

    /// `"<column> <direction>"` with the column restricted to `allowed`.
    pub fn order(&self, allowed: &[&str], default_column: &str, default_direction: &str) -> String {
        let column = self
            .sort_by
            .as_deref()
            .filter(|c| allowed.contains(c))
            .unwrap_or(default_column);
        let direction = match self.sort_direction.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("asc") => "asc",
            Some("desc") => "desc",
            _ => default_direction,
        };
        format!("{} {}", column, direction)
    }
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Boolean query flag: `1/true/yes/on` and `0/false/no/off`.
pub fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_id(value: Option<&str>) -> Option<i64> {
    value?.trim().parse().ok()
}

/// Conjunction of filter clauses; no clauses matches everything.
pub fn all_of(mut clauses: Vec<Value>) -> Value {
    match clauses.len() {
        0 => json!({}),
        1 => clauses.remove(0),
        _ => json!({ "$and": clauses }),
    }
}

/// Looks a row up by numeric id first, then by slug.
pub async fn find_by_id_or_slug<T: Entity>(repo: &Repository<T>, key: &str) -> Result<Option<T>, StoreError> {
    if let Ok(id) = key.parse::<i64>() {
        if let Some(found) = repo.find(id).await? {
            return Ok(Some(found));
        }
    }
    repo.find_by("slug", key).await
}

/// Distinguishes an absent JSON field from an explicit `null`:
/// absent is `None`, `null` is `Some(None)`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Accumulates field errors from validator rules and from checks that need
/// the store, then fails once with the whole map.
pub struct Checks {
    errors: FieldErrors,
    message: &'static str,
}

impl Checks {
    pub fn new(input: &impl Validate) -> Self {
        let errors = match input.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => field_errors(&e),
        };
        Self { errors, message: "Validation failed" }
    }

    pub fn with_message(mut self, message: &'static str) -> Self {
        self.message = message;
        self
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// `value` must not be used by another active row.
    pub async fn unique<T: Entity>(
        &mut self,
        repo: &Repository<T>,
        field: &str,
        value: Option<&str>,
        ignore_id: Option<i64>,
    ) -> Result<(), StoreError> {
        let Some(value) = value else { return Ok(()) };
        if self.has(field) {
            return Ok(());
        }
        let clause = match ignore_id {
            Some(id) => json!({ field: value, "id": { "$ne": id } }),
            None => json!({ field: value }),
        };
        if repo.exists(clause).await? {
            self.add(field, format!("The {} has already been taken.", label(field)));
        }
        Ok(())
    }

    /// `id`, when given, must reference an active row.
    pub async fn exists<T: Entity>(&mut self, repo: &Repository<T>, field: &str, id: Option<i64>) -> Result<(), StoreError> {
        let Some(id) = id else { return Ok(()) };
        if repo.find(id).await?.is_none() {
            self.add(field, format!("The selected {} is invalid.", label(field)));
        }
        Ok(())
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(ApiError::validation_error(self.message, self.errors))
    }
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

/// Columns supplied by a request body; absent fields stay absent.
pub fn to_row(input: &impl Serialize) -> Result<Row, ApiError> {
    let value = serde_json::to_value(input).map_err(|e| ApiError::internal_server_error(e.to_string()))?;
    Ok(into_row(value))
}

/// Sets `created_*` and `updated_*` to now and `actor`.
pub fn stamp_created(row: &mut Row, actor: i64) {
    let now = json!(Utc::now());
    row.insert("created_at".into(), now.clone());
    row.insert("created_by".into(), json!(actor));
    row.insert("updated_at".into(), now);
    row.insert("updated_by".into(), json!(actor));
}

pub fn stamp_updated(row: &mut Row, actor: i64) {
    row.insert("updated_at".into(), json!(Utc::now()));
    row.insert("updated_by".into(), json!(actor));
}

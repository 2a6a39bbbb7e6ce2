use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use super::models::Entity;
use super::store::{Query, Row, Store, StoreError};
use crate::filter::Scope;

/// Page window requested by a list endpoint, already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page: page.max(1), per_page: per_page.max(1) }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }
}

/// One page of results plus the counts needed for pagination metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub per_page: u32,
    pub current_page: u32,
    pub last_page: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: PageRequest) -> Self {
        let per_page = page.per_page.max(1) as i64;
        let last_page = ((total + per_page - 1) / per_page).max(1) as u32;
        Self { items, total, per_page: page.per_page, current_page: page.page, last_page }
    }
}

/// Typed access to one table through the configured [`Store`].
pub struct Repository<T> {
    store: Arc<dyn Store>,
    _phantom: PhantomData<T>,
}

impl<T: Entity> Repository<T> {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, _phantom: PhantomData }
    }

    fn decode(rows: Vec<Row>) -> Result<Vec<T>, StoreError> {
        rows.into_iter()
            .map(|row| serde_json::from_value(Value::Object(row)).map_err(StoreError::from))
            .collect()
    }

    fn decode_one(row: Row) -> Result<T, StoreError> {
        Ok(serde_json::from_value(Value::Object(row))?)
    }

    pub async fn select_any(&self, query: Query) -> Result<Vec<T>, StoreError> {
        let rows = self.store.select(&T::TABLE, &query).await?;
        Self::decode(rows)
    }

    pub async fn select_one(&self, mut query: Query) -> Result<Option<T>, StoreError> {
        query.filter.limit = Some(1);
        Ok(self.select_any(query).await?.into_iter().next())
    }

    /// Active rows only.
    pub async fn find(&self, id: i64) -> Result<Option<T>, StoreError> {
        self.select_one(Query::filter(json!({ "id": id }))).await
    }

    pub async fn find_any_scope(&self, id: i64) -> Result<Option<T>, StoreError> {
        self.select_one(Query::filter(json!({ "id": id })).scope(Scope::WithDeleted)).await
    }

    pub async fn find_by(&self, column: &str, value: impl Into<Value>) -> Result<Option<T>, StoreError> {
        let mut clause = serde_json::Map::new();
        clause.insert(column.to_string(), value.into());
        self.select_one(Query::filter(Value::Object(clause))).await
    }

    pub async fn find_many(&self, ids: &[i64]) -> Result<Vec<T>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        self.select_any(Query::filter(json!({ "id": { "$in": ids } }))).await
    }

    pub async fn count(&self, where_clause: Value) -> Result<i64, StoreError> {
        self.store.count(&T::TABLE, &Query::filter(where_clause)).await
    }

    pub async fn exists(&self, where_clause: Value) -> Result<bool, StoreError> {
        Ok(self.count(where_clause).await? > 0)
    }

    pub async fn paginate(&self, query: Query, page: PageRequest) -> Result<Paginated<T>, StoreError> {
        let total = self.store.count(&T::TABLE, &query).await?;
        let items = self
            .select_any(query.limit(page.per_page as i64, page.offset()))
            .await?;
        Ok(Paginated::new(items, total, page))
    }

    pub async fn create(&self, row: Row) -> Result<T, StoreError> {
        let stored = self.store.insert(&T::TABLE, row).await?;
        Self::decode_one(stored)
    }

    pub async fn update(&self, id: i64, changes: Row) -> Result<T, StoreError> {
        let stored = self.store.update(&T::TABLE, id, changes).await?;
        Self::decode_one(stored)
    }

    /// Flags the row deleted and records who did it.
    pub async fn soft_delete(&self, id: i64, actor: Option<i64>) -> Result<T, StoreError> {
        let changes = into_row(json!({
            "deleted_at": Utc::now(),
            "deleted_by": actor,
        }));
        self.update(id, changes).await
    }

    pub async fn restore(&self, id: i64, actor: Option<i64>) -> Result<T, StoreError> {
        let changes = into_row(json!({
            "deleted_at": null,
            "deleted_by": null,
            "updated_at": Utc::now(),
            "updated_by": actor,
        }));
        self.update(id, changes).await
    }

    pub async fn delete_where(&self, where_clause: Value) -> Result<u64, StoreError> {
        self.store.delete_where(&T::TABLE, where_clause).await
    }
}

/// Builds a [`Row`] from a `json!` object; anything else yields an empty row.
pub fn into_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

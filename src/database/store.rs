use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::filter::{FilterData, FilterError, FilterWhereOptions, Scope};

/// A stored row as the store sees it: column name to JSON value.
pub type Row = Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Record {id} not found in {table}")]
    NotFound { table: &'static str, id: i64 },

    #[error("Unique constraint violated on {table}.{column}")]
    UniqueViolation { table: String, column: String },

    #[error("Invalid query: {0}")]
    Query(#[from] FilterError),

    #[error("Row decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Static description of a table: soft-delete support and unique column groups.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub soft_delete: bool,
    /// Column groups unique among active rows.
    pub unique: &'static [&'static [&'static str]],
}

/// Filter plus the soft-delete scope it runs under.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: FilterData,
    pub scope: Scope,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filter(where_clause: Value) -> Self {
        Self { filter: FilterData::where_(where_clause), scope: Scope::Active }
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn order(mut self, order: impl Into<Value>) -> Self {
        self.filter.order = Some(order.into());
        self
    }

    pub fn limit(mut self, limit: i64, offset: i64) -> Self {
        self.filter.limit = Some(limit);
        self.filter.offset = Some(offset);
        self
    }

    pub fn options_for(&self, table: &TableSpec) -> FilterWhereOptions {
        FilterWhereOptions { soft_delete: table.soft_delete, scope: self.scope }
    }
}

/// Persistence collaborator. Backends must treat `unique` groups as
/// authoritative and report violations as [`StoreError::UniqueViolation`].
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn select(&self, table: &TableSpec, query: &Query) -> StoreResult<Vec<Row>>;

    async fn count(&self, table: &TableSpec, query: &Query) -> StoreResult<i64>;

    /// Inserts a row and returns it as stored, including its new `id`.
    async fn insert(&self, table: &TableSpec, row: Row) -> StoreResult<Row>;

    /// Applies `changes` to the row with `id` regardless of its soft-delete state.
    async fn update(&self, table: &TableSpec, id: i64, changes: Row) -> StoreResult<Row>;

    /// Physically removes matching rows. Soft deletes go through `update`.
    async fn delete_where(&self, table: &TableSpec, where_clause: Value) -> StoreResult<u64>;

    async fn health_check(&self) -> StoreResult<()>;
}

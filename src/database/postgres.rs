use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgArguments, postgres::PgPoolOptions, PgPool, Row as _};
use tracing::info;

use super::store::{Query, Row, Store, StoreError, StoreResult, TableSpec};
use crate::config::DatabaseConfig;
use crate::filter::{is_valid_identifier, Filter, FilterError, FilterWhereOptions, Scope, SqlResult};

/// Postgres backend. Reads use the JSON filter compiled to SQL; writes go
/// through `jsonb_populate_record` so the database coerces column types.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let url = config.url.as_deref().ok_or(StoreError::ConfigMissing("DATABASE_URL"))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;
        info!("Connected database pool (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn filter(table: &TableSpec, query: &Query) -> Result<Filter, FilterError> {
        let mut filter = Filter::new(table.name)?;
        filter.options(query.options_for(table)).assign(&query.filter)?;
        Ok(filter)
    }

    fn columns(table: &TableSpec, row: &Row) -> StoreResult<String> {
        let mut columns = Vec::with_capacity(row.len());
        for column in row.keys() {
            if !is_valid_identifier(column) {
                return Err(FilterError::InvalidColumn(format!("{}.{}", table.name, column)).into());
            }
            columns.push(format!("\"{}\"", column));
        }
        Ok(columns.join(", "))
    }

    async fn fetch_rows(&self, sql: SqlResult) -> StoreResult<Vec<Row>> {
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param_query(q, p);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(StoreError::Sqlx)?;
        rows.iter().map(decode_row).collect()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn select(&self, table: &TableSpec, query: &Query) -> StoreResult<Vec<Row>> {
        let sql = Self::filter(table, query)?.to_json_sql()?;
        self.fetch_rows(sql).await
    }

    async fn count(&self, table: &TableSpec, query: &Query) -> StoreResult<i64> {
        let sql = Self::filter(table, query)?.to_count_sql()?;
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param_query(q, p);
        }
        let row = q.fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    async fn insert(&self, table: &TableSpec, mut row: Row) -> StoreResult<Row> {
        row.remove("id");
        let columns = Self::columns(table, &row)?;
        let query = format!(
            "WITH inserted AS (INSERT INTO \"{0}\" ({1}) SELECT {1} FROM jsonb_populate_record(NULL::\"{0}\", $1) RETURNING *) \
             SELECT row_to_json(inserted) AS row FROM inserted",
            table.name, columns
        );
        let record = sqlx::query(&query)
            .bind(Value::Object(row))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(table, e))?;
        decode_row(&record)
    }

    async fn update(&self, table: &TableSpec, id: i64, mut changes: Row) -> StoreResult<Row> {
        changes.remove("id");
        if changes.is_empty() {
            let query = Query::filter(serde_json::json!({ "id": id })).scope(Scope::WithDeleted);
            return self
                .select(table, &query)
                .await?
                .into_iter()
                .next()
                .ok_or(StoreError::NotFound { table: table.name, id });
        }

        let columns = Self::columns(table, &changes)?;
        let query = format!(
            "WITH updated AS (UPDATE \"{0}\" SET ({1}) = (SELECT {1} FROM jsonb_populate_record(NULL::\"{0}\", $1)) \
             WHERE \"id\" = $2 RETURNING *) SELECT row_to_json(updated) AS row FROM updated",
            table.name, columns
        );
        let record = sqlx::query(&query)
            .bind(Value::Object(changes))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(table, e))?
            .ok_or(StoreError::NotFound { table: table.name, id })?;
        decode_row(&record)
    }

    async fn delete_where(&self, table: &TableSpec, where_clause: Value) -> StoreResult<u64> {
        let mut filter = Filter::new(table.name)?;
        filter
            .options(FilterWhereOptions { soft_delete: table.soft_delete, scope: Scope::WithDeleted })
            .where_clause(where_clause)?;
        let sql = filter.to_delete_sql()?;

        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param_query(q, p);
        }
        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn decode_row(record: &sqlx::postgres::PgRow) -> StoreResult<Row> {
    let value: Value = record.try_get("row")?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Decode(<serde_json::Error as serde::de::Error>::custom(format!(
            "expected JSON object row, got {}",
            other
        )))),
    }
}

/// Postgres reports unique violations as SQLSTATE 23505.
fn map_sqlx_error(table: &TableSpec, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            return StoreError::UniqueViolation {
                table: table.name.to_string(),
                column: db.constraint().map(constraint_column).unwrap_or_default(),
            };
        }
    }
    StoreError::Sqlx(err)
}

/// Indexes are named `<table>_<column>_unique` in the migrations.
fn constraint_column(constraint: &str) -> String {
    let trimmed = constraint.strip_suffix("_unique").unwrap_or(constraint);
    crate::database::schema::ALL
        .iter()
        .filter_map(|t| trimmed.strip_prefix(t.name).and_then(|rest| rest.strip_prefix('_')))
        .min_by_key(|rest| rest.len())
        .unwrap_or(trimmed)
        .to_string()
}

fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        // Arrays are expanded into individual placeholders by FilterWhere
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}

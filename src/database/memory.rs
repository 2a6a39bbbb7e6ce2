use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::store::{Query, Row, Store, StoreError, StoreResult, TableSpec};
use crate::filter::{FilterMatch, FilterWhereOptions, Scope};

#[derive(Default)]
struct MemoryTable {
    next_id: i64,
    rows: BTreeMap<i64, Row>,
}

/// Process-local store used by tests and `serve --memory`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<&'static str, MemoryTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn filtered<'a>(table: &TableSpec, rows: impl Iterator<Item = &'a Row>, query: &Query) -> StoreResult<Vec<Row>> {
        let options = query.options_for(table);
        let mut out = Vec::new();
        for row in rows {
            if FilterMatch::matches(row, query.filter.where_clause.as_ref(), &options)? {
                out.push(row.clone());
            }
        }
        Ok(out)
    }

    fn check_unique(spec: &TableSpec, table: &MemoryTable, candidate: &Row, self_id: Option<i64>) -> StoreResult<()> {
        let active = FilterWhereOptions { soft_delete: spec.soft_delete, scope: Scope::Active };
        if !FilterMatch::matches(candidate, None, &active)? {
            return Ok(());
        }
        for group in spec.unique {
            let values: Vec<&Value> = group.iter().map(|c| candidate.get(*c).unwrap_or(&Value::Null)).collect();
            // NULLs never collide, as in SQL
            if values.iter().any(|v| v.is_null()) {
                continue;
            }
            for (id, row) in &table.rows {
                if Some(*id) == self_id || !FilterMatch::matches(row, None, &active)? {
                    continue;
                }
                let same = group
                    .iter()
                    .zip(&values)
                    .all(|(c, v)| row.get(*c).map(|existing| existing == *v).unwrap_or(false));
                if same {
                    return Err(StoreError::UniqueViolation {
                        table: spec.name.to_string(),
                        column: group.join(","),
                    });
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, table: &TableSpec, query: &Query) -> StoreResult<Vec<Row>> {
        let tables = self.tables.read().await;
        let mut rows = match tables.get(table.name) {
            Some(t) => Self::filtered(table, t.rows.values(), query)?,
            None => vec![],
        };
        drop(tables);

        FilterMatch::sort(&mut rows, query.filter.order.as_ref())?;
        let offset = query.filter.offset.unwrap_or(0).max(0) as usize;
        let limit = query.filter.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, table: &TableSpec, query: &Query) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        let count = match tables.get(table.name) {
            Some(t) => Self::filtered(table, t.rows.values(), query)?.len(),
            None => 0,
        };
        Ok(count as i64)
    }

    async fn insert(&self, table: &TableSpec, mut row: Row) -> StoreResult<Row> {
        let mut tables = self.tables.write().await;
        let entry = tables.entry(table.name).or_default();

        let id = entry.next_id + 1;
        row.insert("id".to_string(), Value::from(id));
        if table.soft_delete {
            row.entry("deleted_at".to_string()).or_insert(Value::Null);
        }
        Self::check_unique(table, entry, &row, None)?;

        entry.next_id = id;
        entry.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update(&self, table: &TableSpec, id: i64, changes: Row) -> StoreResult<Row> {
        let mut tables = self.tables.write().await;
        let entry = tables
            .get_mut(table.name)
            .ok_or(StoreError::NotFound { table: table.name, id })?;
        let mut updated = entry
            .rows
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { table: table.name, id })?;

        for (column, value) in changes {
            if column != "id" {
                updated.insert(column, value);
            }
        }
        Self::check_unique(table, entry, &updated, Some(id))?;

        entry.rows.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_where(&self, table: &TableSpec, where_clause: Value) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let Some(entry) = tables.get_mut(table.name) else {
            return Ok(0);
        };
        let options = FilterWhereOptions { soft_delete: table.soft_delete, scope: Scope::WithDeleted };

        let mut doomed = Vec::new();
        for (id, row) in &entry.rows {
            if FilterMatch::matches(row, Some(&where_clause), &options)? {
                doomed.push(*id);
            }
        }
        for id in &doomed {
            entry.rows.remove(id);
        }
        Ok(doomed.len() as u64)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn assigns_sequential_ids() {
        let store = MemoryStore::new();
        let a = store.insert(&schema::SIZES, row(json!({"name": "S", "code": "S"}))).await.unwrap();
        let b = store.insert(&schema::SIZES, row(json!({"name": "M", "code": "M"}))).await.unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(b["id"], json!(2));
    }

    #[tokio::test]
    async fn unique_groups_only_consider_active_rows() {
        let store = MemoryStore::new();
        let first = store.insert(&schema::BRANDS, row(json!({"name": "Nike", "slug": "nike"}))).await.unwrap();

        let err = store
            .insert(&schema::BRANDS, row(json!({"name": "Nike", "slug": "nike-2"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { ref column, .. } if column == "name"));

        let id = first["id"].as_i64().unwrap();
        store
            .update(&schema::BRANDS, id, row(json!({"deleted_at": "2025-01-01T00:00:00Z"})))
            .await
            .unwrap();
        store.insert(&schema::BRANDS, row(json!({"name": "Nike", "slug": "nike"}))).await.unwrap();
    }

    #[tokio::test]
    async fn select_applies_scope_order_and_window() {
        let store = MemoryStore::new();
        for (name, deleted) in [("b", false), ("a", false), ("c", true)] {
            let deleted_at = if deleted { json!("2025-01-01T00:00:00Z") } else { Value::Null };
            store
                .insert(&schema::COLORS, row(json!({"name": name, "code": name, "deleted_at": deleted_at})))
                .await
                .unwrap();
        }

        let rows = store.select(&schema::COLORS, &Query::all().order("name asc")).await.unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let rows = store
            .select(&schema::COLORS, &Query::all().scope(Scope::WithDeleted).order("name asc").limit(1, 2))
            .await
            .unwrap();
        assert_eq!(rows[0]["name"], json!("c"));
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let store = MemoryStore::new();
        let err = store.update(&schema::SIZES, 9, Row::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { id: 9, .. }));
    }
}

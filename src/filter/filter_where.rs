use serde_json::Value;

use super::error::FilterError;
use super::types::{is_valid_identifier, FilterOp, FilterWhereOptions};

/// Compiles the JSON where-language into a parameterized Postgres predicate.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    pub fn generate(
        where_data: &Value,
        starting_param_index: usize,
        options: &FilterWhereOptions,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let mut sql_conditions = vec![];
        if let Some(scope) = options.scope_sql() {
            sql_conditions.push(scope.to_string());
        }
        sql_conditions.extend(filter_where.conditions(where_data)?);
        let where_clause = if sql_conditions.is_empty() { "1=1".to_string() } else { sql_conditions.join(" AND ") };
        Ok((where_clause, filter_where.param_values))
    }

    pub fn generate_empty(options: &FilterWhereOptions) -> (String, Vec<Value>) {
        let where_clause = options.scope_sql().unwrap_or("1=1").to_string();
        (where_clause, vec![])
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn conditions(&mut self, where_data: &Value) -> Result<Vec<String>, FilterError> {
        let obj = match where_data {
            Value::Null => return Ok(vec![]),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        };

        let mut out = Vec::new();
        for (key, value) in obj {
            if key.starts_with('$') {
                out.push(self.logical(key, value)?);
            } else {
                out.extend(self.field(key, value)?);
            }
        }
        Ok(out)
    }

    /// Nested clauses share this builder so placeholders keep counting up.
    fn subclause(&mut self, value: &Value) -> Result<String, FilterError> {
        let parts = self.conditions(value)?;
        Ok(if parts.is_empty() { "1=1".to_string() } else { format!("({})", parts.join(" AND ")) })
    }

    fn logical(&mut self, op: &str, value: &Value) -> Result<String, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                if arr.is_empty() {
                    return Ok(if op == "$and" { "1=1" } else { "1=0" }.to_string());
                }
                let mut sql_parts = Vec::with_capacity(arr.len());
                for v in arr {
                    sql_parts.push(self.subclause(v)?);
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(format!("({})", sql_parts.join(joiner)))
            }
            "$not" => Ok(format!("NOT {}", self.subclause(value)?)),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn field(&mut self, field: &str, value: &Value) -> Result<Vec<String>, FilterError> {
        if !is_valid_identifier(field) {
            return Err(FilterError::InvalidColumn(field.to_string()));
        }

        match value {
            Value::Object(obj) => {
                let mut out = Vec::with_capacity(obj.len());
                for (op_key, op_val) in obj {
                    let operator = FilterOp::parse(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                    out.push(self.condition(field, &operator, op_val)?);
                }
                Ok(out)
            }
            // Implicit equality: { field: value }
            _ => Ok(vec![self.condition(field, &FilterOp::Eq, value)?]),
        }
    }

    fn condition(&mut self, column: &str, operator: &FilterOp, data: &Value) -> Result<String, FilterError> {
        let quoted_column = format!("\"{}\"", column);
        Ok(match operator {
            FilterOp::Eq => {
                if data.is_null() { format!("{} IS NULL", quoted_column) }
                else { format!("{} = {}", quoted_column, self.param(data.clone())) }
            }
            FilterOp::Ne => {
                if data.is_null() { format!("{} IS NOT NULL", quoted_column) }
                else { format!("{} <> {}", quoted_column, self.param(data.clone())) }
            }
            FilterOp::Gt => format!("{} > {}", quoted_column, self.param(data.clone())),
            FilterOp::Gte => format!("{} >= {}", quoted_column, self.param(data.clone())),
            FilterOp::Lt => format!("{} < {}", quoted_column, self.param(data.clone())),
            FilterOp::Lte => format!("{} <= {}", quoted_column, self.param(data.clone())),
            FilterOp::Like => format!("{} LIKE {}", quoted_column, self.param(data.clone())),
            FilterOp::ILike => format!("{} ILIKE {}", quoted_column, self.param(data.clone())),
            FilterOp::In | FilterOp::NIn => {
                let values = match data {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                let negate = matches!(operator, FilterOp::NIn);
                if values.is_empty() {
                    return Ok(if negate { "1=1" } else { "1=0" }.to_string());
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                let keyword = if negate { "NOT IN" } else { "IN" };
                format!("{} {} ({})", quoted_column, keyword, params.join(", "))
            }
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => format!(
                    "{} BETWEEN {} AND {}",
                    quoted_column,
                    self.param(values[0].clone()),
                    self.param(values[1].clone())
                ),
                _ => {
                    return Err(FilterError::InvalidOperatorData(
                        "$between requires array with 2 values".to_string(),
                    ))
                }
            },
        })
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::Scope;
    use serde_json::json;

    fn active() -> FilterWhereOptions {
        FilterWhereOptions { soft_delete: true, scope: Scope::Active }
    }

    #[test]
    fn implicit_equality_binds_parameters() {
        let (sql, params) = FilterWhere::generate(&json!({"brand_id": 3}), 0, &active()).unwrap();
        assert_eq!(sql, "\"deleted_at\" IS NULL AND \"brand_id\" = $1");
        assert_eq!(params, vec![json!(3)]);
    }

    #[test]
    fn nested_or_keeps_placeholder_numbering() {
        let where_data = json!({
            "$or": [
                {"name": {"$ilike": "%red%"}},
                {"description": {"$ilike": "%red%"}}
            ],
            "is_featured": true
        });
        let (sql, params) = FilterWhere::generate(&where_data, 0, &active()).unwrap();
        assert_eq!(
            sql,
            "\"deleted_at\" IS NULL AND ((\"name\" ILIKE $1) OR (\"description\" ILIKE $2)) AND \"is_featured\" = $3"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn scope_is_not_applied_to_plain_tables() {
        let options = FilterWhereOptions { soft_delete: false, scope: Scope::Active };
        let (sql, _) = FilterWhere::generate_empty(&options);
        assert_eq!(sql, "1=1");
    }

    #[test]
    fn only_deleted_scope_inverts_the_filter() {
        let options = FilterWhereOptions { soft_delete: true, scope: Scope::OnlyDeleted };
        let (sql, _) = FilterWhere::generate_empty(&options);
        assert_eq!(sql, "\"deleted_at\" IS NOT NULL");
    }

    #[test]
    fn empty_in_matches_nothing() {
        let (sql, params) = FilterWhere::generate(&json!({"id": {"$in": []}}), 0, &active()).unwrap();
        assert!(sql.ends_with("1=0"));
        assert!(params.is_empty());
    }

    #[test]
    fn rejects_unsafe_column_names() {
        let err = FilterWhere::generate(&json!({"name; drop table": 1}), 0, &active()).unwrap_err();
        assert!(matches!(err, FilterError::InvalidColumn(_)));
    }

    #[test]
    fn rejects_unknown_operators() {
        let err = FilterWhere::generate(&json!({"name": {"$regex": "x"}}), 0, &active()).unwrap_err();
        assert!(matches!(err, FilterError::UnsupportedOperator(_)));
    }
}

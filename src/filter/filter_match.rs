use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::types::{is_valid_identifier, FilterOp, FilterOrderInfo, FilterWhereOptions, Scope, SortDirection};

/// Evaluates the where-language against in-memory rows with the same
/// semantics [`super::filter_where::FilterWhere`] gives Postgres.
pub struct FilterMatch;

impl FilterMatch {
    pub fn matches(row: &Map<String, Value>, where_data: Option<&Value>, options: &FilterWhereOptions) -> Result<bool, FilterError> {
        if options.soft_delete {
            let deleted = !row.get("deleted_at").map(Value::is_null).unwrap_or(true);
            let visible = match options.scope {
                Scope::Active => !deleted,
                Scope::OnlyDeleted => deleted,
                Scope::WithDeleted => true,
            };
            if !visible {
                return Ok(false);
            }
        }
        match where_data {
            None | Some(Value::Null) => Ok(true),
            Some(clause) => Self::clause(row, clause),
        }
    }

    fn clause(row: &Map<String, Value>, clause: &Value) -> Result<bool, FilterError> {
        let obj = match clause {
            Value::Null => return Ok(true),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        };

        for (key, value) in obj {
            let ok = if key.starts_with('$') {
                Self::logical(row, key, value)?
            } else {
                Self::field(row, key, value)?
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn logical(row: &Map<String, Value>, op: &str, value: &Value) -> Result<bool, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let mut results = Vec::with_capacity(arr.len());
                for v in arr {
                    results.push(Self::clause(row, v)?);
                }
                Ok(if op == "$and" { results.iter().all(|r| *r) } else { results.iter().any(|r| *r) })
            }
            "$not" => Ok(!Self::clause(row, value)?),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn field(row: &Map<String, Value>, field: &str, value: &Value) -> Result<bool, FilterError> {
        if !is_valid_identifier(field) {
            return Err(FilterError::InvalidColumn(field.to_string()));
        }
        let actual = row.get(field).unwrap_or(&Value::Null);

        match value {
            Value::Object(obj) => {
                for (op_key, op_val) in obj {
                    let operator = FilterOp::parse(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                    if !Self::condition(actual, &operator, op_val)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Self::condition(actual, &FilterOp::Eq, value),
        }
    }

    // SQL three-valued logic collapses to false here: comparisons against NULL never match.
    fn condition(actual: &Value, operator: &FilterOp, data: &Value) -> Result<bool, FilterError> {
        Ok(match operator {
            FilterOp::Eq => {
                if data.is_null() { actual.is_null() } else { compare(actual, data) == Some(Ordering::Equal) }
            }
            FilterOp::Ne => {
                if data.is_null() { !actual.is_null() }
                else { matches!(compare(actual, data), Some(Ordering::Less | Ordering::Greater)) }
            }
            FilterOp::Gt => compare(actual, data) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(compare(actual, data), Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::Lt => compare(actual, data) == Some(Ordering::Less),
            FilterOp::Lte => matches!(compare(actual, data), Some(Ordering::Less | Ordering::Equal)),
            FilterOp::Like | FilterOp::ILike => {
                let (Some(text), Some(pattern)) = (actual.as_str(), data.as_str()) else {
                    return Ok(false);
                };
                if matches!(operator, FilterOp::ILike) {
                    like(&text.to_lowercase(), &pattern.to_lowercase())
                } else {
                    like(text, pattern)
                }
            }
            FilterOp::In | FilterOp::NIn => {
                let values = match data {
                    Value::Array(values) => values.as_slice(),
                    other => std::slice::from_ref(other),
                };
                if actual.is_null() {
                    return Ok(matches!(operator, FilterOp::NIn) && values.is_empty());
                }
                let found = values.iter().any(|v| compare(actual, v) == Some(Ordering::Equal));
                if matches!(operator, FilterOp::In) { found } else { !found }
            }
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => {
                    matches!(compare(actual, &values[0]), Some(Ordering::Greater | Ordering::Equal))
                        && matches!(compare(actual, &values[1]), Some(Ordering::Less | Ordering::Equal))
                }
                _ => {
                    return Err(FilterError::InvalidOperatorData(
                        "$between requires array with 2 values".to_string(),
                    ))
                }
            },
        })
    }

    /// Sorts rows the way Postgres does: NULLs last ascending, first descending.
    pub fn sort(rows: &mut [Map<String, Value>], order: Option<&Value>) -> Result<(), FilterError> {
        let infos: Vec<FilterOrderInfo> = match order {
            Some(order) => FilterOrder::validate_and_parse(order)?,
            None => vec![],
        };
        if infos.is_empty() {
            rows.sort_by(|a, b| order_values(a.get("id"), b.get("id")));
            return Ok(());
        }
        rows.sort_by(|a, b| {
            for info in &infos {
                let ord = order_values(a.get(&info.column), b.get(&info.column));
                let ord = if info.sort == SortDirection::Desc { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            order_values(a.get("id"), b.get("id"))
        });
        Ok(())
    }
}

fn order_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

/// Compares scalars; numbers given as strings (decimals) compare numerically.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::String(y)) => x.as_f64()?.partial_cmp(&y.parse::<f64>().ok()?),
        (Value::String(x), Value::Number(y)) => x.parse::<f64>().ok()?.partial_cmp(&y.as_f64()?),
        _ => None,
    }
}

/// SQL LIKE: `%` any run, `_` any single char, backslash escapes.
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '\\' => LikeToken::Literal(chars.next().unwrap_or('\\')),
            '%' => LikeToken::AnyRun,
            '_' => LikeToken::AnyOne,
            other => LikeToken::Literal(other),
        });
    }

    // dp[j]: pattern prefix of length j matches the text consumed so far
    let mut dp = vec![false; tokens.len() + 1];
    dp[0] = true;
    for j in 1..=tokens.len() {
        dp[j] = dp[j - 1] && tokens[j - 1] == LikeToken::AnyRun;
    }
    for ch in &text {
        let mut next = vec![false; tokens.len() + 1];
        for j in 1..=tokens.len() {
            next[j] = match tokens[j - 1] {
                LikeToken::AnyRun => next[j - 1] || dp[j],
                LikeToken::AnyOne => dp[j - 1],
                LikeToken::Literal(l) => dp[j - 1] && l == *ch,
            };
        }
        dp = next;
    }
    dp[tokens.len()]
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LikeToken {
    Literal(char),
    AnyRun,
    AnyOne,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn active() -> FilterWhereOptions {
        FilterWhereOptions { soft_delete: true, scope: Scope::Active }
    }

    #[test]
    fn like_supports_wildcards_and_escapes() {
        assert!(like("red t-shirt", "%t-shirt"));
        assert!(like("red", "r_d"));
        assert!(!like("red", "r_"));
        assert!(like("50% off", "50\\% %"));
        assert!(!like("50 off", "50\\%%"));
    }

    #[test]
    fn soft_deleted_rows_are_hidden_by_default() {
        let r = row(json!({"id": 1, "deleted_at": "2025-01-01T00:00:00Z"}));
        assert!(!FilterMatch::matches(&r, None, &active()).unwrap());
        let with_deleted = FilterWhereOptions { soft_delete: true, scope: Scope::WithDeleted };
        assert!(FilterMatch::matches(&r, None, &with_deleted).unwrap());
    }

    #[test]
    fn or_search_and_filters_combine() {
        let r = row(json!({"id": 1, "name": "Nike", "description": "Sportswear", "is_featured": true}));
        let clause = json!({
            "$or": [{"name": {"$ilike": "%sport%"}}, {"description": {"$ilike": "%sport%"}}],
            "is_featured": true
        });
        assert!(FilterMatch::matches(&r, Some(&clause), &active()).unwrap());

        let clause = json!({
            "$or": [{"name": {"$ilike": "%sport%"}}, {"description": {"$ilike": "%sport%"}}],
            "is_featured": false
        });
        assert!(!FilterMatch::matches(&r, Some(&clause), &active()).unwrap());
    }

    #[test]
    fn null_comparisons_never_match() {
        let r = row(json!({"id": 1, "parent_id": null}));
        assert!(!FilterMatch::matches(&r, Some(&json!({"parent_id": 3})), &active()).unwrap());
        assert!(!FilterMatch::matches(&r, Some(&json!({"parent_id": {"$ne": 3}})), &active()).unwrap());
        assert!(FilterMatch::matches(&r, Some(&json!({"parent_id": null})), &active()).unwrap());
    }

    #[test]
    fn sorts_with_nulls_last() {
        let mut rows = vec![
            row(json!({"id": 1, "name": null})),
            row(json!({"id": 2, "name": "b"})),
            row(json!({"id": 3, "name": "a"})),
        ];
        FilterMatch::sort(&mut rows, Some(&json!("name asc"))).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }
}

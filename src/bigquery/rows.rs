//! Conversion of BigQuery's `f`/`v` row encoding into plain JSON objects.
//!
//! `jobs.query` returns every cell as a string wrapped in `{"v": ...}` plus a
//! separate schema. Handlers want `{"column": value}` objects with real JSON
//! numbers where the schema says so.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Result schema from the query response.
#[derive(Debug, Clone, Deserialize)]
pub struct TableSchema {
    /// Top-level result columns.
    pub fields: Vec<TableFieldSchema>,
}

/// A single column description.
#[derive(Debug, Clone, Deserialize)]
pub struct TableFieldSchema {
    /// Column name.
    pub name: String,
    /// BigQuery type name (INTEGER, FLOAT, RECORD, ...).
    #[serde(rename = "type")]
    pub field_type: String,
    /// NULLABLE, REQUIRED or REPEATED.
    #[serde(default)]
    pub mode: Option<String>,
    /// Nested fields for RECORD columns.
    #[serde(default)]
    pub fields: Option<Vec<TableFieldSchema>>,
}

/// One result row: a list of cells in schema order.
#[derive(Debug, Clone, Deserialize)]
pub struct TableRow {
    /// Cells, one per schema field.
    pub f: Vec<TableCell>,
}

/// One result cell.
#[derive(Debug, Clone, Deserialize)]
pub struct TableCell {
    /// Raw cell value (string, null, nested row, or repeated list).
    #[serde(default)]
    pub v: Value,
}

/// Convert rows to JSON objects keyed by column name.
///
/// Rows shorter than the schema (shouldn't happen) simply omit the missing
/// columns.
pub fn rows_to_json(schema: &TableSchema, rows: &[TableRow]) -> Vec<Map<String, Value>> {
    rows.iter()
        .map(|row| {
            schema
                .fields
                .iter()
                .zip(row.f.iter())
                .map(|(field, cell)| (field.name.clone(), cell_value(field, &cell.v)))
                .collect()
        })
        .collect()
}

/// Decode one cell according to its schema field.
fn cell_value(field: &TableFieldSchema, v: &Value) -> Value {
    if field.mode.as_deref() == Some("REPEATED") {
        // Repeated cells arrive as [{"v": ...}, ...].
        let items = match v {
            Value::Array(items) => items,
            _ => return Value::Array(Vec::new()),
        };
        return Value::Array(
            items
                .iter()
                .map(|item| scalar_value(field, item.get("v").unwrap_or(&Value::Null)))
                .collect(),
        );
    }

    scalar_value(field, v)
}

/// Decode one non-repeated value.
fn scalar_value(field: &TableFieldSchema, v: &Value) -> Value {
    if v.is_null() {
        return Value::Null;
    }

    match field.field_type.as_str() {
        "RECORD" | "STRUCT" => {
            // Nested rows arrive as {"f": [...]}.
            let nested_fields = match &field.fields {
                Some(fields) => fields,
                None => return v.clone(),
            };
            let cells = match v.get("f").and_then(Value::as_array) {
                Some(cells) => cells,
                None => return v.clone(),
            };
            let obj: Map<String, Value> = nested_fields
                .iter()
                .zip(cells.iter())
                .map(|(f, cell)| {
                    (
                        f.name.clone(),
                        cell_value(f, cell.get("v").unwrap_or(&Value::Null)),
                    )
                })
                .collect();
            Value::Object(obj)
        }
        "INTEGER" | "INT64" => v
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(|n| Value::Number(n.into()))
            .unwrap_or_else(|| v.clone()),
        // Non-finite floats (Infinity, NaN) fall back to their string form.
        "FLOAT" | "FLOAT64" => v
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| v.clone()),
        "BOOLEAN" | "BOOL" => match v.as_str() {
            Some("true") => Value::Bool(true),
            Some("false") => Value::Bool(false),
            _ => v.clone(),
        },
        // NUMERIC/BIGNUMERIC stay strings: f64 would lose precision.
        _ => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn field(name: &str, field_type: &str) -> TableFieldSchema {
        TableFieldSchema {
            name: name.to_string(),
            field_type: field_type.to_string(),
            mode: Some("NULLABLE".to_string()),
            fields: None,
        }
    }

    fn row(values: Vec<Value>) -> TableRow {
        TableRow {
            f: values.into_iter().map(|v| TableCell { v }).collect(),
        }
    }

    #[test]
    fn float_cost_row_becomes_number() {
        let schema = TableSchema {
            fields: vec![field("estimated_cost_usd", "FLOAT")],
        };
        let rows = vec![row(vec![json!("12.483921")])];

        let out = rows_to_json(&schema, &rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["estimated_cost_usd"], json!(12.483921));
    }

    #[test]
    fn null_sum_stays_null() {
        // SUM over zero jobs yields NULL, the original passed it through.
        let schema = TableSchema {
            fields: vec![field("estimated_cost_usd", "FLOAT")],
        };
        let rows = vec![row(vec![Value::Null])];

        let out = rows_to_json(&schema, &rows);
        assert_eq!(out[0]["estimated_cost_usd"], Value::Null);
    }

    #[test]
    fn integer_and_boolean_cells_decode() {
        let schema = TableSchema {
            fields: vec![field("job_count", "INTEGER"), field("cached", "BOOLEAN")],
        };
        let rows = vec![row(vec![json!("42"), json!("true")])];

        let out = rows_to_json(&schema, &rows);
        assert_eq!(out[0]["job_count"], json!(42));
        assert_eq!(out[0]["cached"], json!(true));
    }

    #[test]
    fn unparseable_number_falls_back_to_string() {
        let schema = TableSchema {
            fields: vec![field("n", "FLOAT")],
        };
        let rows = vec![row(vec![json!("not-a-number")])];

        let out = rows_to_json(&schema, &rows);
        assert_eq!(out[0]["n"], json!("not-a-number"));
    }

    #[test]
    fn numeric_is_preserved_as_string() {
        let schema = TableSchema {
            fields: vec![field("exact", "NUMERIC")],
        };
        let rows = vec![row(vec![json!("12345678901234567890.123456789")])];

        let out = rows_to_json(&schema, &rows);
        assert_eq!(out[0]["exact"], json!("12345678901234567890.123456789"));
    }

    #[test]
    fn repeated_cells_become_arrays() {
        let mut f = field("tags", "STRING");
        f.mode = Some("REPEATED".to_string());
        let schema = TableSchema { fields: vec![f] };
        let rows = vec![row(vec![json!([{"v": "a"}, {"v": "b"}])])];

        let out = rows_to_json(&schema, &rows);
        assert_eq!(out[0]["tags"], json!(["a", "b"]));
    }

    #[test]
    fn record_cells_become_objects() {
        let mut f = field("job", "RECORD");
        f.fields = Some(vec![field("id", "STRING"), field("bytes", "INTEGER")]);
        let schema = TableSchema { fields: vec![f] };
        let rows = vec![row(vec![json!({"f": [{"v": "job_1"}, {"v": "1024"}]})])];

        let out = rows_to_json(&schema, &rows);
        assert_eq!(out[0]["job"], json!({"id": "job_1", "bytes": 1024}));
    }

    #[test]
    fn short_row_omits_missing_columns() {
        let schema = TableSchema {
            fields: vec![field("a", "STRING"), field("b", "STRING")],
        };
        let rows = vec![row(vec![json!("only-a")])];

        let out = rows_to_json(&schema, &rows);
        assert_eq!(out[0].len(), 1);
        assert_eq!(out[0]["a"], json!("only-a"));
    }
}

//! Decode result rows into JSON using the catalogued column types.

use crate::config::EntityTable;
use crate::sql::builder::decodes_natively;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::Row;

/// Row as a JSON object with one key per table column.
pub fn row_to_json(row: &PgRow, table: &EntityTable) -> Result<Map<String, Value>, sqlx::Error> {
    let mut map = Map::new();
    for c in &table.columns {
        let pg_type = match c.pg_type.as_str() {
            t if decodes_natively(t) => t,
            "numeric" => "numeric",
            _ => "text",
        };
        map.insert(c.name.clone(), cell_to_value(row, &c.name, pg_type)?);
    }
    Ok(map)
}

fn cell_to_value(row: &PgRow, name: &str, pg_type: &str) -> Result<Value, sqlx::Error> {
    let v = match pg_type {
        "uuid" => row.try_get::<Option<uuid::Uuid>, _>(name)?.map(|u| Value::String(u.to_string())),
        "int2" => row.try_get::<Option<i16>, _>(name)?.map(|n| Value::Number(n.into())),
        "int4" => row.try_get::<Option<i32>, _>(name)?.map(|n| Value::Number(n.into())),
        "int8" => row.try_get::<Option<i64>, _>(name)?.map(|n| Value::Number(n.into())),
        "float4" => row
            .try_get::<Option<f32>, _>(name)?
            .and_then(|n| serde_json::Number::from_f64(n as f64))
            .map(Value::Number),
        "float8" => row
            .try_get::<Option<f64>, _>(name)?
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        "bool" => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
        "timestamptz" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
            .map(|d| Value::String(d.to_rfc3339())),
        "timestamp" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(name)?
            .map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "date" => row
            .try_get::<Option<chrono::NaiveDate>, _>(name)?
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        "json" | "jsonb" => row.try_get::<Option<Value>, _>(name)?,
        "numeric" => row.try_get::<Option<String>, _>(name)?.map(numeric_text_to_value),
        _ => row.try_get::<Option<String>, _>(name)?.map(Value::String),
    };
    Ok(v.unwrap_or(Value::Null))
}

/// Numeric columns arrive as text; surface them as JSON numbers when they fit.
fn numeric_text_to_value(s: String) -> Value {
    match s.parse::<serde_json::Number>() {
        Ok(n) => Value::Number(n),
        Err(_) => Value::String(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_text() {
        assert_eq!(numeric_text_to_value("12".into()), json!(12));
        assert_eq!(numeric_text_to_value("12.5".into()), json!(12.5));
        assert_eq!(numeric_text_to_value("NaN".into()), json!("NaN"));
    }
}

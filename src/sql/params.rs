//! Convert serde_json::Value to types that sqlx can bind.

use crate::config::{Column, ColumnType};
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

/// A value that can be bound to a PostgreSQL query. Converts from serde_json::Value.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Uuid(uuid::Uuid),
    UuidArray(Vec<uuid::Uuid>),
    Json(Value),
}

impl PgBindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PgBindValue::I64(i),
                None => PgBindValue::F64(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => PgBindValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::Json(v.clone()),
        }
    }

    /// Bind `v` for `column`, using the catalogued type where JSON alone is ambiguous.
    pub fn for_column(v: &Value, column: &Column) -> Self {
        match (column.column_type, v) {
            (_, Value::Null) => PgBindValue::Null,
            (ColumnType::Uuid, Value::String(s)) => match uuid::Uuid::parse_str(s) {
                Ok(u) => PgBindValue::Uuid(u),
                Err(_) => PgBindValue::String(s.clone()),
            },
            (ColumnType::Json, _) => PgBindValue::Json(v.clone()),
            _ => Self::from_json(v),
        }
    }
}

impl PgBindValue {
    /// Text form sent on the wire; `None` binds SQL NULL.
    pub fn to_text(&self) -> Option<String> {
        match self {
            PgBindValue::Null => None,
            PgBindValue::Bool(b) => Some(b.to_string()),
            PgBindValue::I64(n) => Some(n.to_string()),
            PgBindValue::F64(n) => Some(n.to_string()),
            PgBindValue::String(s) => Some(s.clone()),
            PgBindValue::Uuid(u) => Some(u.to_string()),
            PgBindValue::UuidArray(v) => Some(format!(
                "{{{}}}",
                v.iter().map(|u| u.to_string()).collect::<Vec<_>>().join(",")
            )),
            PgBindValue::Json(v) => Some(v.to_string()),
        }
    }
}

/// Every value travels as TEXT and is cast by its placeholder (`$1::uuid`), so a cached
/// statement always sees the same parameter types whatever the JSON value was.
impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <Option<String> as Encode<Postgres>>::encode_by_ref(&self.to_text(), buf)
    }
}

impl Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

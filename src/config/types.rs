//! Catalog types: table shapes reflected from the store plus the rows of the two control tables.

use serde::Serialize;

/// Control table describing relationships between entities.
pub const RELATIONSHIPS_TABLE: &str = "relationships";
/// Control table describing which verbs each entity exposes.
pub const OPERATIONS_TABLE: &str = "operations";
/// Soft-delete marker column (timestamp; null = active).
pub const SOFT_DELETE_COLUMN: &str = "deleted_at";
pub const ID_COLUMN: &str = "id";
pub const UPDATED_AT_COLUMN: &str = "updated_at";

pub fn is_control_table(name: &str) -> bool {
    name == RELATIONSHIPS_TABLE || name == OPERATIONS_TABLE
}

/// Semantic column type. The PostgreSQL `udt_name` is kept on [`Column`] for casts and decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Uuid,
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Json,
}

impl ColumnType {
    /// Map a PostgreSQL `udt_name` (e.g. "int4", "timestamptz") to a semantic type.
    pub fn from_udt_name(udt: &str) -> ColumnType {
        match udt {
            "uuid" => ColumnType::Uuid,
            "int2" | "int4" | "int8" => ColumnType::Integer,
            "float4" | "float8" | "numeric" => ColumnType::Float,
            "bool" => ColumnType::Boolean,
            "timestamp" | "timestamptz" => ColumnType::Timestamp,
            "json" | "jsonb" => ColumnType::Json,
            _ => ColumnType::String,
        }
    }
}

/// Server-side default of a column, as read from the store.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnDefault {
    /// Expression evaluated by the store on write (function call such as `now()`).
    Generated(String),
    /// Constant default.
    Literal(serde_json::Value),
    None,
}

impl ColumnDefault {
    /// Classify a raw `column_default` expression.
    pub fn from_expression(expr: Option<&str>) -> ColumnDefault {
        let Some(expr) = expr.map(str::trim).filter(|e| !e.is_empty()) else {
            return ColumnDefault::None;
        };
        if is_function_call(expr) {
            return ColumnDefault::Generated(expr.to_string());
        }
        let bare = strip_cast(expr);
        match bare {
            "true" => return ColumnDefault::Literal(serde_json::Value::Bool(true)),
            "false" => return ColumnDefault::Literal(serde_json::Value::Bool(false)),
            "NULL" | "null" => return ColumnDefault::None,
            _ => {}
        }
        if let Some(inner) = bare.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
            return ColumnDefault::Literal(serde_json::Value::String(inner.replace("''", "'")));
        }
        if let Ok(n) = bare.parse::<i64>() {
            return ColumnDefault::Literal(serde_json::Value::Number(n.into()));
        }
        if let Some(n) = bare.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return ColumnDefault::Literal(serde_json::Value::Number(n));
        }
        ColumnDefault::Literal(serde_json::Value::String(expr.to_string()))
    }
}

const SQL_VALUE_FUNCTIONS: &[&str] = &[
    "CURRENT_TIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "LOCALTIMESTAMP",
    "LOCALTIME",
];

fn is_function_call(expr: &str) -> bool {
    let bare = strip_cast(expr);
    if SQL_VALUE_FUNCTIONS.iter().any(|f| bare.eq_ignore_ascii_case(f)) {
        return true;
    }
    let Some(open) = bare.find('(') else {
        return false;
    };
    let ident = &bare[..open];
    !ident.is_empty()
        && !ident.starts_with(|c: char| c.is_ascii_digit())
        && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && bare.ends_with(')')
}

/// Drop a trailing `::type` cast (e.g. `'draft'::character varying` -> `'draft'`).
fn strip_cast(expr: &str) -> &str {
    let mut in_quote = false;
    let mut depth = 0usize;
    let bytes = expr.as_bytes();
    for i in 0..bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b'(' if !in_quote => depth += 1,
            b')' if !in_quote => depth = depth.saturating_sub(1),
            b':' if !in_quote && depth == 0 && bytes.get(i + 1) == Some(&b':') => return expr[..i].trim(),
            _ => {}
        }
    }
    expr
}

#[derive(Clone, Debug, Serialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    /// PostgreSQL type name used for casts and decoding (e.g. "timestamptz").
    pub pg_type: String,
    pub nullable: bool,
    pub default: ColumnDefault,
}

#[derive(Clone, Debug, Serialize)]
pub struct EntityTable {
    pub name: String,
    pub columns: Vec<Column>,
    pub has_soft_delete: bool,
}

impl EntityTable {
    pub fn new(name: String, columns: Vec<Column>) -> Self {
        let has_soft_delete = columns.iter().any(|c| c.name == SOFT_DELETE_COLUMN);
        EntityTable {
            name,
            columns,
            has_soft_delete,
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

/// One row of the `relationships` control table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelationshipDescriptor {
    pub primary_table_name: String,
    pub secondary_table_name: String,
    pub associative_table_name: Option<String>,
    /// Foreign-key column on the secondary table for one-to-many; defaults to `<primary>_id`.
    pub primary_table_alias: Option<String>,
}

impl RelationshipDescriptor {
    pub fn is_many_to_many(&self) -> bool {
        self.associative_table_name.is_some()
    }

    /// The entity on the other end when `entity` is queried as "self".
    pub fn other(&self, entity: &str) -> Option<&str> {
        if self.primary_table_name == entity {
            Some(self.secondary_table_name.as_str())
        } else if self.secondary_table_name == entity {
            Some(self.primary_table_name.as_str())
        } else {
            None
        }
    }

    /// One-to-many applies to the primary ("one") side only; many-to-many applies to both ends.
    pub fn applies_to(&self, entity: &str) -> bool {
        self.primary_table_name == entity || (self.secondary_table_name == entity && self.is_many_to_many())
    }

    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.primary_table_name == a && self.secondary_table_name == b)
            || (self.primary_table_name == b && self.secondary_table_name == a)
    }

    /// Foreign-key column on `other` that references `entity` (one-to-many).
    pub fn foreign_key_column(&self, entity: &str) -> String {
        self.primary_table_alias
            .clone()
            .unwrap_or_else(|| link_column(entity))
    }
}

/// Column name of an entity's id in an associative table or as a default foreign key.
pub fn link_column(entity: &str) -> String {
    format!("{}_id", entity)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// One row of the `operations` control table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OperationPermissions {
    pub table_name: String,
    pub read_op: bool,
    pub create_op: bool,
    pub update_op: bool,
    pub delete_op: bool,
}

impl OperationPermissions {
    pub fn all(table_name: &str) -> Self {
        OperationPermissions {
            table_name: table_name.to_string(),
            read_op: true,
            create_op: true,
            update_op: true,
            delete_op: true,
        }
    }

    pub fn none(table_name: &str) -> Self {
        OperationPermissions {
            table_name: table_name.to_string(),
            ..Default::default()
        }
    }

    pub fn allows(&self, op: Operation) -> bool {
        match op {
            Operation::Read => self.read_op,
            Operation::Create => self.create_op,
            Operation::Update => self.update_op,
            Operation::Delete => self.delete_op,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn function_defaults_are_generated() {
        for expr in ["gen_random_uuid()", "now()", "CURRENT_TIMESTAMP", "nextval('books_seq'::regclass)", "pg_catalog.now()"] {
            assert!(
                matches!(ColumnDefault::from_expression(Some(expr)), ColumnDefault::Generated(_)),
                "{expr}"
            );
        }
    }

    #[test]
    fn literal_defaults() {
        assert_eq!(ColumnDefault::from_expression(Some("true")), ColumnDefault::Literal(json!(true)));
        assert_eq!(ColumnDefault::from_expression(Some("false")), ColumnDefault::Literal(json!(false)));
        assert_eq!(
            ColumnDefault::from_expression(Some("'draft'::character varying")),
            ColumnDefault::Literal(json!("draft"))
        );
        assert_eq!(ColumnDefault::from_expression(Some("'it''s'::text")), ColumnDefault::Literal(json!("it's")));
        assert_eq!(ColumnDefault::from_expression(Some("0")), ColumnDefault::Literal(json!(0)));
        assert_eq!(ColumnDefault::from_expression(None), ColumnDefault::None);
    }

    #[test]
    fn relationship_orientation() {
        let rel = RelationshipDescriptor {
            primary_table_name: "authors".into(),
            secondary_table_name: "books".into(),
            associative_table_name: None,
            primary_table_alias: Some("written_by".into()),
        };
        assert_eq!(rel.other("authors"), Some("books"));
        assert_eq!(rel.other("books"), Some("authors"));
        assert!(rel.applies_to("authors"));
        assert!(!rel.applies_to("books"));
        assert!(rel.connects("books", "authors"));
        assert_eq!(rel.foreign_key_column("authors"), "written_by");
    }

    #[test]
    fn udt_names_map_to_semantic_types() {
        assert_eq!(ColumnType::from_udt_name("timestamptz"), ColumnType::Timestamp);
        assert_eq!(ColumnType::from_udt_name("int8"), ColumnType::Integer);
        assert_eq!(ColumnType::from_udt_name("varchar"), ColumnType::String);
        assert_eq!(ColumnType::from_udt_name("uuid"), ColumnType::Uuid);
    }
}

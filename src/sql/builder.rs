//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from catalogued entity tables.

use crate::config::{Column, EntityTable, ID_COLUMN, SOFT_DELETE_COLUMN, UPDATED_AT_COLUMN};
use crate::sql::params::PgBindValue;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, Postgres};
use uuid::Uuid;

/// Quote identifier for PostgreSQL (safe: only from the catalog).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: PgBindValue) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Placeholder for a uuid, e.g. `$2::uuid`.
    fn push_uuid(&mut self, id: Uuid) -> String {
        let n = self.push_param(PgBindValue::Uuid(id));
        format!("${}::uuid", n)
    }

    /// Placeholder for `v` bound against `column`, cast to the column type.
    fn push_column_param(&mut self, column: &Column, v: &Value) -> String {
        let n = self.push_param(PgBindValue::for_column(v, column));
        format!("${}::{}", n, column.pg_type)
    }

    /// sqlx query with every param bound in order.
    pub fn query(&self) -> sqlx::query::Query<'_, Postgres, PgArguments> {
        let mut query = sqlx::query(&self.sql);
        for p in &self.params {
            query = query.bind(p.clone());
        }
        query
    }
}

/// Types the row decoder reads directly; everything else is selected as text.
pub fn decodes_natively(pg_type: &str) -> bool {
    matches!(
        pg_type,
        "uuid"
            | "int2"
            | "int4"
            | "int8"
            | "float4"
            | "float8"
            | "bool"
            | "timestamp"
            | "timestamptz"
            | "date"
            | "json"
            | "jsonb"
            | "text"
            | "varchar"
            | "bpchar"
            | "name"
    )
}

/// SELECT list: each column as-is, except numeric and custom types (enums, domains) as col::text.
fn select_column_list(table: &EntityTable) -> String {
    table
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            if decodes_natively(&c.pg_type) {
                q
            } else {
                format!("{}::text AS {}", q, q)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn live_condition(table: &EntityTable) -> Option<String> {
    table
        .has_soft_delete
        .then(|| format!("{} IS NULL", quoted(SOFT_DELETE_COLUMN)))
}

fn where_clause(parts: Vec<String>) -> String {
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn order_clause(table: &EntityTable) -> String {
    if table.has_column(ID_COLUMN) {
        format!(" ORDER BY {}", quoted(ID_COLUMN))
    } else {
        String::new()
    }
}

/// SELECT live rows, optionally restricted to `ids`, ordered by id.
pub fn select_live(table: &EntityTable, schema: &str, ids: Option<&[Uuid]>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut parts: Vec<String> = live_condition(table).into_iter().collect();
    if let Some(ids) = ids {
        let n = q.push_param(PgBindValue::UuidArray(ids.to_vec()));
        parts.push(format!("{} = ANY(${}::uuid[])", quoted(ID_COLUMN), n));
    }
    q.sql = format!(
        "SELECT {} FROM {}{}{}",
        select_column_list(table),
        qualified_table(schema, &table.name),
        where_clause(parts),
        order_clause(table)
    );
    q
}

/// SELECT one live row by id.
pub fn select_live_by_id(table: &EntityTable, schema: &str, id: Uuid) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_uuid(id);
    let mut parts = vec![format!("{} = {}", quoted(ID_COLUMN), n)];
    parts.extend(live_condition(table));
    q.sql = format!(
        "SELECT {} FROM {}{}",
        select_column_list(table),
        qualified_table(schema, &table.name),
        where_clause(parts)
    );
    q
}

/// INSERT the given scalar fields; columns left out take their store default.
/// Keys that are not columns of the table are skipped.
pub fn insert(table: &EntityTable, schema: &str, scalars: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &table.columns {
        let Some(v) = scalars.get(&c.name) else { continue };
        placeholders.push(q.push_column_param(c, v));
        cols.push(quoted(&c.name));
    }
    let target = qualified_table(schema, &table.name);
    let returning = select_column_list(table);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", target, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            target,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE a live row by id: SET only the given columns, plus updated_at when the table has one.
/// With nothing to set this is a plain SELECT of the live row.
pub fn update(table: &EntityTable, schema: &str, id: Uuid, scalars: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in &table.columns {
        if c.name == ID_COLUMN {
            continue;
        }
        let Some(v) = scalars.get(&c.name) else { continue };
        let rhs = q.push_column_param(c, v);
        sets.push(format!("{} = {}", quoted(&c.name), rhs));
    }
    if sets.is_empty() {
        return select_live_by_id(table, schema, id);
    }
    if table.has_column(UPDATED_AT_COLUMN) && !scalars.contains_key(UPDATED_AT_COLUMN) {
        sets.push(format!("{} = NOW()", quoted(UPDATED_AT_COLUMN)));
    }
    let n = q.push_uuid(id);
    let mut parts = vec![format!("{} = {}", quoted(ID_COLUMN), n)];
    parts.extend(live_condition(table));
    q.sql = format!(
        "UPDATE {} SET {}{} RETURNING {}",
        qualified_table(schema, &table.name),
        sets.join(", "),
        where_clause(parts),
        select_column_list(table)
    );
    q
}

/// Mark a live row deleted; returns the row as it was marked.
pub fn soft_delete(table: &EntityTable, schema: &str, id: Uuid) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_uuid(id);
    let mut parts = vec![format!("{} = {}", quoted(ID_COLUMN), n)];
    parts.extend(live_condition(table));
    q.sql = format!(
        "UPDATE {} SET {} = NOW(){} RETURNING {}",
        qualified_table(schema, &table.name),
        quoted(SOFT_DELETE_COLUMN),
        where_clause(parts),
        select_column_list(table)
    );
    q
}

/// DELETE by id.
pub fn hard_delete(table: &EntityTable, schema: &str, id: Uuid) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_uuid(id);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        qualified_table(schema, &table.name),
        quoted(ID_COLUMN),
        n,
        select_column_list(table)
    );
    q
}

/// SELECT `target` from an associative table for rows whose `source` column is `id`.
pub fn select_linked_ids(schema: &str, assoc: &str, source: &str, target: &str, id: Uuid) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_uuid(id);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        quoted(target),
        qualified_table(schema, assoc),
        quoted(source),
        n
    );
    q
}

/// SELECT ids of live child rows whose foreign key `fk` is `id`.
pub fn select_child_ids(child: &EntityTable, schema: &str, fk: &str, id: Uuid) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_uuid(id);
    let mut parts = vec![format!("{} = {}", quoted(fk), n)];
    parts.extend(live_condition(child));
    q.sql = format!(
        "SELECT {} FROM {}{}{}",
        quoted(ID_COLUMN),
        qualified_table(schema, &child.name),
        where_clause(parts),
        order_clause(child)
    );
    q
}

/// INSERT one associative row linking `(self_col = self_id, other_col = other_id)`.
pub fn insert_link(schema: &str, assoc: &str, self_col: &str, other_col: &str, self_id: Uuid, other_id: Uuid) -> QueryBuf {
    let mut q = QueryBuf::new();
    let a = q.push_uuid(self_id);
    let b = q.push_uuid(other_id);
    q.sql = format!(
        "INSERT INTO {} ({}, {}) VALUES ({}, {})",
        qualified_table(schema, assoc),
        quoted(self_col),
        quoted(other_col),
        a,
        b
    );
    q
}

/// DELETE associative rows matching `(self_col = self_id, other_col = other_id)`.
pub fn delete_link(schema: &str, assoc: &str, self_col: &str, other_col: &str, self_id: Uuid, other_id: Uuid) -> QueryBuf {
    let mut q = QueryBuf::new();
    let a = q.push_uuid(self_id);
    let b = q.push_uuid(other_id);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} AND {} = {}",
        qualified_table(schema, assoc),
        quoted(self_col),
        a,
        quoted(other_col),
        b
    );
    q
}

/// DELETE every associative row whose `self_col` is `id`.
pub fn delete_links_for(schema: &str, assoc: &str, self_col: &str, id: Uuid) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_uuid(id);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        qualified_table(schema, assoc),
        quoted(self_col),
        n
    );
    q
}

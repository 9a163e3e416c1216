//! Run built queries on a connection and decode what comes back.

use crate::config::EntityTable;
use crate::sql::{row_to_json, QueryBuf};
use serde_json::{Map, Value};
use sqlx::{PgConnection, Row};
use uuid::Uuid;

pub(crate) async fn fetch_row(
    conn: &mut PgConnection,
    q: &QueryBuf,
    table: &EntityTable,
) -> Result<Option<Map<String, Value>>, sqlx::Error> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let row = q.query().fetch_optional(&mut *conn).await?;
    row.map(|r| row_to_json(&r, table)).transpose()
}

pub(crate) async fn fetch_rows(
    conn: &mut PgConnection,
    q: &QueryBuf,
    table: &EntityTable,
) -> Result<Vec<Map<String, Value>>, sqlx::Error> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let rows = q.query().fetch_all(&mut *conn).await?;
    rows.iter().map(|r| row_to_json(r, table)).collect()
}

/// First column of every row as a uuid; nulls are skipped.
pub(crate) async fn fetch_ids(conn: &mut PgConnection, q: &QueryBuf) -> Result<Vec<Uuid>, sqlx::Error> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let rows = q.query().fetch_all(&mut *conn).await?;
    let mut ids = Vec::with_capacity(rows.len());
    for row in &rows {
        if let Some(id) = row.try_get::<Option<Uuid>, _>(0)? {
            ids.push(id);
        }
    }
    Ok(ids)
}

pub(crate) async fn execute(conn: &mut PgConnection, q: &QueryBuf) -> Result<u64, sqlx::Error> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let done = q.query().execute(&mut *conn).await?;
    Ok(done.rows_affected())
}

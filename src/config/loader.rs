//! Load the catalog: reflect tables from information_schema, then read the two control tables.

use crate::config::resolved::Catalog;
use crate::config::types::*;
use crate::error::CatalogError;
use crate::sql::{qualified_table, quoted};
use sqlx::PgPool;
use std::collections::BTreeMap;

/// Build a catalog snapshot for every base table in `schema`.
pub async fn load_catalog(
    pool: &PgPool,
    schema: &str,
    suppress_abstract_table_docs: bool,
) -> Result<Catalog, CatalogError> {
    let tables = reflect_tables(pool, schema).await?;
    let find = |name: &str| tables.iter().find(|t| t.name == name);
    let rel_table = find(RELATIONSHIPS_TABLE).ok_or(CatalogError::MissingControlTable(RELATIONSHIPS_TABLE))?;
    let ops_table = find(OPERATIONS_TABLE).ok_or(CatalogError::MissingControlTable(OPERATIONS_TABLE))?;
    let relationships = load_relationships(pool, schema, rel_table).await?;
    let operations = load_operations(pool, schema, ops_table).await?;

    tracing::info!(
        schema = %schema,
        entities = tables.len(),
        relationships = relationships.len(),
        operations = operations.len(),
        "catalog loaded"
    );
    Catalog::build(schema, tables, relationships, operations, suppress_abstract_table_docs)
}

pub async fn reflect_tables(pool: &PgPool, schema: &str) -> Result<Vec<EntityTable>, CatalogError> {
    let sql = r#"
        SELECT c.table_name::text, c.column_name::text, c.udt_schema::text, c.udt_name::text,
               c.is_nullable = 'YES', c.column_default::text
        FROM information_schema.columns c
        JOIN information_schema.tables t
          ON t.table_schema = c.table_schema AND t.table_name = c.table_name
        WHERE c.table_schema = $1 AND t.table_type = 'BASE TABLE'
        ORDER BY c.table_name, c.ordinal_position
    "#;
    tracing::debug!(sql = %sql, "query");
    let rows = sqlx::query_as::<_, (String, String, String, String, bool, Option<String>)>(sql)
        .bind(schema)
        .fetch_all(pool)
        .await?;

    let mut by_table: BTreeMap<String, Vec<Column>> = BTreeMap::new();
    for (table, name, udt_schema, udt, nullable, default) in rows {
        // User-defined types (enums, domains) are cast by their qualified name.
        let pg_type = if udt_schema == "pg_catalog" {
            udt.clone()
        } else {
            format!("{}.{}", quoted(&udt_schema), quoted(&udt))
        };
        by_table.entry(table).or_default().push(Column {
            name,
            column_type: ColumnType::from_udt_name(&udt),
            pg_type,
            nullable,
            default: ColumnDefault::from_expression(default.as_deref()),
        });
    }
    Ok(by_table
        .into_iter()
        .map(|(name, columns)| EntityTable::new(name, columns))
        .collect())
}

fn live_filter(table: &EntityTable) -> &'static str {
    if table.has_soft_delete {
        " WHERE deleted_at IS NULL"
    } else {
        ""
    }
}

async fn load_relationships(
    pool: &PgPool,
    schema: &str,
    table: &EntityTable,
) -> Result<Vec<RelationshipDescriptor>, CatalogError> {
    let sql = format!(
        "SELECT primary_table_name::text, secondary_table_name::text, associative_table_name::text, primary_table_alias::text FROM {}{}",
        qualified_table(schema, RELATIONSHIPS_TABLE),
        live_filter(table)
    );
    tracing::debug!(sql = %sql, "query");
    let rows = sqlx::query_as::<_, (String, String, Option<String>, Option<String>)>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(primary, secondary, associative, alias)| RelationshipDescriptor {
            primary_table_name: primary,
            secondary_table_name: secondary,
            associative_table_name: associative.filter(|s| !s.is_empty()),
            primary_table_alias: alias.filter(|s| !s.is_empty()),
        })
        .collect())
}

async fn load_operations(
    pool: &PgPool,
    schema: &str,
    table: &EntityTable,
) -> Result<Vec<OperationPermissions>, CatalogError> {
    let sql = format!(
        "SELECT table_name::text, read_op, create_op, update_op, delete_op FROM {}{}",
        qualified_table(schema, OPERATIONS_TABLE),
        live_filter(table)
    );
    tracing::debug!(sql = %sql, "query");
    let rows = sqlx::query_as::<_, (String, Option<bool>, Option<bool>, Option<bool>, Option<bool>)>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(table_name, read, create, update, delete)| OperationPermissions {
            table_name,
            read_op: read.unwrap_or(false),
            create_op: create.unwrap_or(false),
            update_op: update.unwrap_or(false),
            delete_op: delete.unwrap_or(false),
        })
        .collect())
}

//! Generic resource execution against PostgreSQL: list, get, create, update, delete.
//!
//! Callers are expected to have checked verb permissions already. Every write runs in one
//! transaction that also carries the link changes; dropping the transaction on an error rolls
//! everything back.

use crate::config::{Catalog, EntityBundle, OperationPermissions, ID_COLUMN};
use crate::error::AppError;
use crate::service::query::{fetch_row, fetch_rows};
use crate::service::relations::{diff_links, RelationshipResolver};
use crate::sql::{hard_delete, insert, select_live, select_live_by_id, soft_delete, update};
use serde_json::{Map, Value};
use sqlx::{PgConnection, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

pub struct ResourceService;

impl ResourceService {
    /// Every live row. An empty result is `NotFound`.
    pub async fn list_all(pool: &PgPool, catalog: &Catalog, entity: &str) -> Result<Vec<Value>, AppError> {
        let bundle = catalog.entity(entity)?;
        let mut conn = pool.acquire().await?;
        let q = select_live(&bundle.table, &catalog.schema, None);
        let rows = fetch_rows(&mut conn, &q, &bundle.table).await?;
        if rows.is_empty() {
            return Err(AppError::NotFound(format!("no {} found", entity)));
        }
        Self::attach_all(&mut conn, catalog, bundle, rows).await
    }

    /// Live rows whose id is one of `ids`. Every id must be a well-formed uuid.
    pub async fn list_subset<S: AsRef<str>>(
        pool: &PgPool,
        catalog: &Catalog,
        entity: &str,
        ids: &[S],
    ) -> Result<Vec<Value>, AppError> {
        let parsed = ids
            .iter()
            .map(|s| parse_id(s.as_ref()))
            .collect::<Result<Vec<Uuid>, AppError>>()?;
        let bundle = catalog.entity(entity)?;
        require_id(bundle)?;
        let mut conn = pool.acquire().await?;
        let q = select_live(&bundle.table, &catalog.schema, Some(&parsed));
        let rows = fetch_rows(&mut conn, &q, &bundle.table).await?;
        if rows.is_empty() {
            return Err(AppError::NotFound(format!("no {} found", entity)));
        }
        Self::attach_all(&mut conn, catalog, bundle, rows).await
    }

    pub async fn get_one(pool: &PgPool, catalog: &Catalog, entity: &str, id: &str) -> Result<Value, AppError> {
        let id = parse_id(id)?;
        let bundle = catalog.entity(entity)?;
        require_id(bundle)?;
        let mut conn = pool.acquire().await?;
        let q = select_live_by_id(&bundle.table, &catalog.schema, id);
        let row = fetch_row(&mut conn, &q, &bundle.table)
            .await?
            .ok_or_else(|| not_found(entity, id))?;
        let relations = RelationshipResolver::resolve(&mut conn, catalog, bundle, id).await?;
        Ok(shape(bundle, row, relations))
    }

    /// Insert the scalar fields, then link every submitted relationship id. The returned
    /// relationship fields echo what was submitted.
    pub async fn create(pool: &PgPool, catalog: &Catalog, entity: &str, body: &Value) -> Result<Value, AppError> {
        let bundle = catalog.entity(entity)?;
        let payload = bundle.model.create_fields.validate(body)?;

        let mut tx = pool.begin().await?;
        let q = insert(&bundle.table, &catalog.schema, &payload.scalars);
        let row = fetch_row(&mut tx, &q, &bundle.table)
            .await?
            .ok_or_else(|| AppError::InternalFault(format!("insert into {} returned no row", entity)))?;

        let mut relations = BTreeMap::new();
        if !payload.links.is_empty() {
            let id = row_id(&row)?;
            for (other, ids) in payload.links {
                let rel = catalog
                    .relationship_between(entity, &other)
                    .filter(|r| r.is_many_to_many())
                    .ok_or_else(|| {
                        AppError::InvalidOperation(format!("{} cannot be linked to {} on create", other, entity))
                    })?;
                for other_id in diff_links(&[], &ids).to_create {
                    RelationshipResolver::create_link(&mut tx, catalog, rel, entity, id, other_id).await?;
                }
                relations.insert(other, ids);
            }
        }
        tx.commit().await?;

        tracing::info!(entity = %entity, id = ?row.get(ID_COLUMN), "created");
        Ok(shape(bundle, row, relations))
    }

    /// Apply a partial update and synchronize any relationship fields present. A payload that
    /// changes nothing is a `Conflict`.
    pub async fn update(
        pool: &PgPool,
        catalog: &Catalog,
        entity: &str,
        id: &str,
        body: &Value,
    ) -> Result<Value, AppError> {
        let id = parse_id(id)?;
        let bundle = catalog.entity(entity)?;
        require_id(bundle)?;
        let payload = bundle.model.update_fields.validate(body)?;
        if payload.is_empty() {
            return Err(AppError::Conflict("empty body".into()));
        }

        let mut tx = pool.begin().await?;
        // With no scalar fields this only checks the row is live.
        let q = update(&bundle.table, &catalog.schema, id, &payload.scalars);
        let row = fetch_row(&mut tx, &q, &bundle.table)
            .await?
            .ok_or_else(|| not_found(entity, id))?;
        for (other, ids) in &payload.links {
            RelationshipResolver::sync(&mut tx, catalog, entity, id, other, ids).await?;
        }
        let relations = RelationshipResolver::resolve(&mut tx, catalog, bundle, id).await?;
        tx.commit().await?;

        tracing::info!(entity = %entity, id = %id, "updated");
        Ok(shape(bundle, row, relations))
    }

    /// Soft delete when the table has `deleted_at`, hard delete otherwise. Associative links
    /// that reference the row are always physically removed, in the same transaction.
    pub async fn delete(pool: &PgPool, catalog: &Catalog, entity: &str, id: &str) -> Result<Value, AppError> {
        let id = parse_id(id)?;
        let bundle = catalog.entity(entity)?;
        require_id(bundle)?;

        let mut tx = pool.begin().await?;
        let relations = RelationshipResolver::resolve(&mut tx, catalog, bundle, id).await?;
        let removed = RelationshipResolver::delete_all_links(&mut tx, catalog, bundle, id).await?;
        let q = if bundle.table.has_soft_delete {
            soft_delete(&bundle.table, &catalog.schema, id)
        } else {
            hard_delete(&bundle.table, &catalog.schema, id)
        };
        let row = fetch_row(&mut tx, &q, &bundle.table)
            .await?
            .ok_or_else(|| not_found(entity, id))?;
        tx.commit().await?;

        tracing::info!(
            entity = %entity,
            id = %id,
            soft = bundle.table.has_soft_delete,
            links_removed = removed,
            "deleted"
        );
        Ok(shape(bundle, row, relations))
    }

    /// Permissions for `entity`; all-false when it has no operations row.
    pub fn operations(catalog: &Catalog, entity: &str) -> OperationPermissions {
        catalog.operations(entity)
    }

    async fn attach_all(
        conn: &mut PgConnection,
        catalog: &Catalog,
        bundle: &EntityBundle,
        rows: Vec<Map<String, Value>>,
    ) -> Result<Vec<Value>, AppError> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let relations = if bundle.relationships.is_empty() {
                BTreeMap::new()
            } else {
                let id = row_id(&row)?;
                RelationshipResolver::resolve(conn, catalog, bundle, id).await?
            };
            out.push(shape(bundle, row, relations));
        }
        Ok(out)
    }
}

pub fn parse_id(s: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(s).map_err(|_| AppError::InvalidArgument(format!("'{}' is not a valid uuid", s)))
}

fn require_id(bundle: &EntityBundle) -> Result<(), AppError> {
    if bundle.table.has_column(ID_COLUMN) {
        Ok(())
    } else {
        Err(AppError::InvalidOperation(format!("{} has no id column", bundle.name())))
    }
}

fn not_found(entity: &str, id: Uuid) -> AppError {
    AppError::NotFound(format!("{} {} not found", entity, id))
}

fn row_id(row: &Map<String, Value>) -> Result<Uuid, AppError> {
    row.get(ID_COLUMN)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| AppError::InternalFault("row has no uuid id".into()))
}

/// Merge relationship ids into the row and project it onto the Return field-set.
fn shape(bundle: &EntityBundle, mut row: Map<String, Value>, relations: BTreeMap<String, Vec<Uuid>>) -> Value {
    for (other, ids) in relations {
        row.insert(
            other,
            Value::Array(ids.into_iter().map(|u| Value::String(u.to_string())).collect()),
        );
    }
    bundle.model.return_fields.shape(row)
}

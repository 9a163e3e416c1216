//! Relationship resolution and link synchronization.
//!
//! Many-to-many links live in an associative table with one `<entity>_id` column per side.
//! One-to-many relationships are read from the foreign key on the child table and are never
//! written here.

use crate::config::{link_column, Catalog, EntityBundle, RelationshipDescriptor};
use crate::error::AppError;
use crate::service::query::{execute, fetch_ids};
use crate::sql::{delete_link, delete_links_for, insert_link, select_child_ids, select_linked_ids};
use sqlx::PgConnection;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

/// Links to remove and to add so that the current set becomes the desired set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkDiff {
    pub to_delete: Vec<Uuid>,
    pub to_create: Vec<Uuid>,
}

impl LinkDiff {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_create.is_empty()
    }
}

/// Plain set difference in both directions. Order follows the input lists; duplicates collapse.
pub fn diff_links(current: &[Uuid], desired: &[Uuid]) -> LinkDiff {
    let current_set: HashSet<&Uuid> = current.iter().collect();
    let desired_set: HashSet<&Uuid> = desired.iter().collect();
    let mut seen = HashSet::new();
    LinkDiff {
        to_delete: current
            .iter()
            .filter(|id| !desired_set.contains(id) && seen.insert(**id))
            .copied()
            .collect(),
        to_create: desired
            .iter()
            .filter(|id| !current_set.contains(id) && seen.insert(**id))
            .copied()
            .collect(),
    }
}

pub struct RelationshipResolver;

impl RelationshipResolver {
    /// Related ids for every relationship applicable to `entity`, keyed by the other entity.
    pub async fn resolve(
        conn: &mut PgConnection,
        catalog: &Catalog,
        entity: &EntityBundle,
        id: Uuid,
    ) -> Result<BTreeMap<String, Vec<Uuid>>, AppError> {
        let mut out = BTreeMap::new();
        for rel in &entity.relationships {
            let Some(other) = rel.other(entity.name()) else { continue };
            let ids = Self::related_ids(conn, catalog, rel, entity.name(), id).await?;
            out.insert(other.to_string(), ids);
        }
        Ok(out)
    }

    /// Ids on the far side of `rel` for the row `id` of `entity`.
    pub async fn related_ids(
        conn: &mut PgConnection,
        catalog: &Catalog,
        rel: &RelationshipDescriptor,
        entity: &str,
        id: Uuid,
    ) -> Result<Vec<Uuid>, AppError> {
        let other = rel
            .other(entity)
            .ok_or_else(|| AppError::InternalFault(format!("{} is not part of this relationship", entity)))?;
        let q = match &rel.associative_table_name {
            Some(assoc) => select_linked_ids(&catalog.schema, assoc, &link_column(entity), &link_column(other), id),
            None => {
                let child = catalog.entity(other)?;
                select_child_ids(&child.table, &catalog.schema, &rel.foreign_key_column(entity), id)
            }
        };
        Ok(fetch_ids(conn, &q).await?)
    }

    /// Make the links between `entity` row `id` and `other` equal `desired`.
    /// Runs on the caller's connection so it shares the triggering write's transaction.
    pub async fn sync(
        conn: &mut PgConnection,
        catalog: &Catalog,
        entity: &str,
        id: Uuid,
        other: &str,
        desired: &[Uuid],
    ) -> Result<LinkDiff, AppError> {
        let rel = catalog
            .relationship_between(entity, other)
            .ok_or_else(|| AppError::NotFound(format!("no relationship between {} and {}", entity, other)))?;
        let current = Self::related_ids(conn, catalog, rel, entity, id).await?;
        let diff = diff_links(&current, desired);
        for other_id in &diff.to_delete {
            Self::delete_link(conn, catalog, rel, entity, id, *other_id).await?;
        }
        for other_id in &diff.to_create {
            Self::create_link(conn, catalog, rel, entity, id, *other_id).await?;
        }
        if !diff.is_empty() {
            tracing::debug!(
                entity = %entity,
                other = %other,
                id = %id,
                created = diff.to_create.len(),
                deleted = diff.to_delete.len(),
                "links synced"
            );
        }
        Ok(diff)
    }

    pub async fn create_link(
        conn: &mut PgConnection,
        catalog: &Catalog,
        rel: &RelationshipDescriptor,
        entity: &str,
        id: Uuid,
        other_id: Uuid,
    ) -> Result<(), AppError> {
        let (assoc, self_col, other_col) = link_columns(rel, entity)?;
        execute(conn, &insert_link(&catalog.schema, assoc, &self_col, &other_col, id, other_id)).await?;
        Ok(())
    }

    pub async fn delete_link(
        conn: &mut PgConnection,
        catalog: &Catalog,
        rel: &RelationshipDescriptor,
        entity: &str,
        id: Uuid,
        other_id: Uuid,
    ) -> Result<(), AppError> {
        let (assoc, self_col, other_col) = link_columns(rel, entity)?;
        execute(conn, &delete_link(&catalog.schema, assoc, &self_col, &other_col, id, other_id)).await?;
        Ok(())
    }

    /// Physically remove every associative link that references `id`. Returns the number removed.
    pub async fn delete_all_links(
        conn: &mut PgConnection,
        catalog: &Catalog,
        entity: &EntityBundle,
        id: Uuid,
    ) -> Result<u64, AppError> {
        let mut removed = 0;
        for rel in entity.many_to_many() {
            let (assoc, self_col, _) = link_columns(rel, entity.name())?;
            removed += execute(conn, &delete_links_for(&catalog.schema, assoc, &self_col, id)).await?;
        }
        Ok(removed)
    }
}

/// Associative table and `(self, other)` link columns of `rel` seen from `entity`.
fn link_columns<'a>(rel: &'a RelationshipDescriptor, entity: &str) -> Result<(&'a str, String, String), AppError> {
    let assoc = rel.associative_table_name.as_deref().ok_or_else(|| {
        AppError::InvalidOperation(format!(
            "{} and {} are not linked through an associative table",
            rel.primary_table_name, rel.secondary_table_name
        ))
    })?;
    let other = rel
        .other(entity)
        .ok_or_else(|| AppError::InvalidOperation(format!("{} is not part of this relationship", entity)))?;
    Ok((assoc, link_column(entity), link_column(other)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::derive::tests::{books_authors, books_reviews};

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn diff_is_plain_set_difference() {
        let v = ids(3);
        let diff = diff_links(&[v[0], v[1]], &[v[1], v[2]]);
        assert_eq!(diff.to_delete, vec![v[0]]);
        assert_eq!(diff.to_create, vec![v[2]]);
    }

    #[test]
    fn diff_against_itself_is_empty() {
        let v = ids(2);
        assert!(diff_links(&v, &v).is_empty());
        let first = diff_links(&[], &v);
        assert_eq!(first.to_create, v);
        // Applying the first diff and diffing again changes nothing.
        assert!(diff_links(&first.to_create, &v).is_empty());
    }

    #[test]
    fn diff_collapses_duplicates() {
        let v = ids(1);
        let diff = diff_links(&[], &[v[0], v[0]]);
        assert_eq!(diff.to_create, vec![v[0]]);
        assert!(diff_links(&[v[0], v[0]], &[]).to_delete.len() == 1);
    }

    #[test]
    fn link_columns_follow_the_querying_side() {
        let rel = books_authors();
        let (assoc, me, other) = link_columns(&rel, "authors").unwrap();
        assert_eq!((assoc, me.as_str(), other.as_str()), ("books_authors", "authors_id", "books_id"));
    }

    #[test]
    fn one_to_many_has_no_link_table() {
        let err = link_columns(&books_reviews(), "books").unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));
    }
}

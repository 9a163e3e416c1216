//! Resolved catalog: immutable snapshot of every entity with its relationships, permissions and schema model.

use crate::config::types::*;
use crate::config::validate;
use crate::error::{AppError, CatalogError};
use crate::schema::{derive, SchemaModel};
use std::collections::HashMap;

/// Everything the engine needs about one entity, resolved once per snapshot.
#[derive(Clone, Debug)]
pub struct EntityBundle {
    pub table: EntityTable,
    /// Descriptors applicable to this entity (see [`RelationshipDescriptor::applies_to`]).
    pub relationships: Vec<RelationshipDescriptor>,
    pub permissions: OperationPermissions,
    /// Whether the `operations` control table has a row for this entity.
    pub has_operations_row: bool,
    pub model: SchemaModel,
}

impl EntityBundle {
    pub fn name(&self) -> &str {
        &self.table.name
    }

    pub fn many_to_many(&self) -> impl Iterator<Item = &RelationshipDescriptor> {
        self.relationships.iter().filter(|r| r.is_many_to_many())
    }
}

#[derive(Clone, Debug)]
pub struct Catalog {
    /// Store schema the entities live in.
    pub schema: String,
    entities: HashMap<String, EntityBundle>,
    relationships: Vec<RelationshipDescriptor>,
    suppress_abstract_table_docs: bool,
}

impl Catalog {
    /// Validate the control-table rows against the reflected tables and build every bundle.
    pub fn build(
        schema: &str,
        tables: Vec<EntityTable>,
        relationships: Vec<RelationshipDescriptor>,
        operations: Vec<OperationPermissions>,
        suppress_abstract_table_docs: bool,
    ) -> Result<Catalog, CatalogError> {
        let tables_by_name: HashMap<&str, &EntityTable> = tables.iter().map(|t| (t.name.as_str(), t)).collect();
        for control in [RELATIONSHIPS_TABLE, OPERATIONS_TABLE] {
            if !tables_by_name.contains_key(control) {
                return Err(CatalogError::MissingControlTable(control));
            }
        }
        validate(&tables_by_name, &relationships)?;

        let mut ops_by_table: HashMap<String, OperationPermissions> = HashMap::new();
        for op in operations {
            if !tables_by_name.contains_key(op.table_name.as_str()) {
                tracing::warn!(table = %op.table_name, "operations row for unknown table, skipping");
                continue;
            }
            ops_by_table.insert(op.table_name.clone(), op);
        }

        let mut entities = HashMap::with_capacity(tables.len());
        for table in tables {
            let applicable: Vec<RelationshipDescriptor> = relationships
                .iter()
                .filter(|r| r.applies_to(&table.name))
                .cloned()
                .collect();
            let row = ops_by_table.remove(&table.name);
            let has_operations_row = row.is_some();
            let permissions = if is_control_table(&table.name) {
                OperationPermissions::all(&table.name)
            } else {
                row.unwrap_or_else(|| OperationPermissions::none(&table.name))
            };
            let model = derive(&table, &applicable);
            entities.insert(
                table.name.clone(),
                EntityBundle {
                    table,
                    relationships: applicable,
                    permissions,
                    has_operations_row,
                    model,
                },
            );
        }

        Ok(Catalog {
            schema: schema.to_string(),
            entities,
            relationships,
            suppress_abstract_table_docs,
        })
    }

    pub fn lookup(&self, name: &str) -> Option<&EntityBundle> {
        self.entities.get(name)
    }

    /// Like [`lookup`](Self::lookup), failing `NotFound` for unknown names.
    pub fn entity(&self, name: &str) -> Result<&EntityBundle, AppError> {
        self.lookup(name)
            .ok_or_else(|| AppError::NotFound(format!("{} not found", name)))
    }

    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn relationships(&self) -> &[RelationshipDescriptor] {
        &self.relationships
    }

    /// The descriptor linking `a` and `b`, in either orientation.
    pub fn relationship_between(&self, a: &str, b: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|r| r.connects(a, b))
    }

    /// Verb permissions for `name`: the operations row, all-false when absent, all-true for control tables.
    pub fn operations(&self, name: &str) -> OperationPermissions {
        match self.lookup(name) {
            Some(bundle) => bundle.permissions.clone(),
            None if is_control_table(name) => OperationPermissions::all(name),
            None => OperationPermissions::none(name),
        }
    }

    pub fn model(&self, name: &str) -> Result<&SchemaModel, AppError> {
        Ok(&self.entity(name)?.model)
    }

    /// Model as published in documentation. Control tables are hidden when suppression is on,
    /// business entities without an operations row are never published.
    pub fn documented_model(&self, name: &str) -> Result<SchemaModel, AppError> {
        let bundle = self.entity(name)?;
        let hidden = if is_control_table(name) {
            self.suppress_abstract_table_docs
        } else {
            !bundle.has_operations_row
        };
        if hidden {
            Ok(SchemaModel::empty(name))
        } else {
            Ok(bundle.model.clone())
        }
    }
}

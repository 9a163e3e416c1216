//! Catalog validation: relationship rows must reference reflected tables and columns.

use crate::config::types::{link_column, EntityTable, RelationshipDescriptor, ID_COLUMN};
use crate::error::CatalogError;
use std::collections::HashMap;

pub fn validate(
    tables: &HashMap<&str, &EntityTable>,
    relationships: &[RelationshipDescriptor],
) -> Result<(), CatalogError> {
    for rel in relationships {
        let primary = table(tables, &rel.primary_table_name)?;
        let secondary = table(tables, &rel.secondary_table_name)?;
        for t in [primary, secondary] {
            if !t.has_column(ID_COLUMN) {
                return Err(CatalogError::Validation(format!(
                    "{} takes part in a relationship but has no id column",
                    t.name
                )));
            }
        }
        match &rel.associative_table_name {
            Some(assoc) => {
                let assoc = table(tables, assoc)?;
                for entity in [&rel.primary_table_name, &rel.secondary_table_name] {
                    let col = link_column(entity);
                    if !assoc.has_column(&col) {
                        return Err(CatalogError::MissingReference {
                            kind: "associative column",
                            name: format!("{}.{}", assoc.name, col),
                        });
                    }
                }
            }
            None => {
                let fk = rel.foreign_key_column(&rel.primary_table_name);
                if !secondary.has_column(&fk) {
                    return Err(CatalogError::MissingReference {
                        kind: "foreign key column",
                        name: format!("{}.{}", secondary.name, fk),
                    });
                }
            }
        }
    }
    Ok(())
}

fn table<'a>(tables: &HashMap<&str, &'a EntityTable>, name: &str) -> Result<&'a EntityTable, CatalogError> {
    tables
        .get(name)
        .copied()
        .ok_or_else(|| CatalogError::MissingReference {
            kind: "table",
            name: name.to_string(),
        })
}

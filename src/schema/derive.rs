//! Derive Return / CreatePayload / UpdatePayload field-sets from a catalogued table.

use crate::config::{Column, ColumnDefault, EntityTable, RelationshipDescriptor, ID_COLUMN};
use crate::schema::model::{snake_to_camel, FieldConstraint, FieldSet, FieldSpec, FieldType, SchemaModel};
use serde_json::Value;

/// Columns that are never accepted in a payload.
const SERVER_MANAGED: &[&str] = &["id", "created_at", "updated_at", "deleted_at"];

/// Build the three field-sets for `table`. `relationships` must already be the descriptors applicable to it.
pub fn derive(table: &EntityTable, relationships: &[RelationshipDescriptor]) -> SchemaModel {
    let camel = snake_to_camel(&table.name);
    let mut return_fields = Vec::with_capacity(table.columns.len() + relationships.len());
    let mut create_fields = Vec::new();
    let mut update_fields = Vec::new();

    for col in &table.columns {
        let spec = FieldSpec {
            name: col.name.clone(),
            field_type: field_type(col),
            nullable: col.nullable,
            constraint: default_constraint(col),
        };
        // Columns the store fills on write are never client-supplied.
        let writable = !SERVER_MANAGED.contains(&col.name.as_str()) && spec.constraint != FieldConstraint::Generated;
        if writable {
            update_fields.push(FieldSpec {
                constraint: FieldConstraint::Optional,
                ..spec.clone()
            });
            create_fields.push(spec.clone());
        }
        return_fields.push(spec);
    }

    for rel in relationships {
        let Some(other) = rel.other(&table.name) else {
            continue;
        };
        let spec = FieldSpec {
            name: other.to_string(),
            field_type: FieldType::UuidList,
            nullable: false,
            constraint: FieldConstraint::Default(Value::Array(Vec::new())),
        };
        // One-to-many ids are computed from the other side's foreign key; only junction links are writable.
        if rel.is_many_to_many() {
            create_fields.push(spec.clone());
            update_fields.push(FieldSpec {
                constraint: FieldConstraint::Optional,
                ..spec.clone()
            });
        }
        return_fields.push(spec);
    }

    SchemaModel {
        entity: table.name.clone(),
        return_fields: FieldSet {
            name: format!("{}Return", camel),
            fields: return_fields,
            deny_unknown: false,
        },
        create_fields: FieldSet {
            name: format!("{}Payload", camel),
            fields: create_fields,
            deny_unknown: true,
        },
        update_fields: FieldSet {
            name: format!("{}OptPayload", camel),
            fields: update_fields,
            deny_unknown: true,
        },
    }
}

fn field_type(col: &Column) -> FieldType {
    if col.name == ID_COLUMN {
        FieldType::Uuid
    } else {
        col.column_type.into()
    }
}

/// Server default first; then nullability decides between "defaults to null" and "required".
fn default_constraint(col: &Column) -> FieldConstraint {
    match &col.default {
        ColumnDefault::Generated(_) => FieldConstraint::Generated,
        ColumnDefault::Literal(v) => FieldConstraint::Default(v.clone()),
        ColumnDefault::None if col.nullable => FieldConstraint::Default(Value::Null),
        ColumnDefault::None => FieldConstraint::Required,
    }
}

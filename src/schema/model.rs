//! Generic schema object: an ordered list of (name, type, constraint) triples per field-set.
//! The same object drives payload validation, response shaping and the JSON Schema document.

use crate::config::ColumnType;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Uuid,
    String,
    Integer,
    Float,
    Boolean,
    /// RFC3339 string.
    Timestamp,
    Json,
    /// Related ids of a relationship field.
    UuidList,
}

impl From<ColumnType> for FieldType {
    fn from(t: ColumnType) -> Self {
        match t {
            ColumnType::Uuid => FieldType::Uuid,
            ColumnType::String => FieldType::String,
            ColumnType::Integer => FieldType::Integer,
            ColumnType::Float => FieldType::Float,
            ColumnType::Boolean => FieldType::Boolean,
            ColumnType::Timestamp => FieldType::Timestamp,
            ColumnType::Json => FieldType::Json,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldConstraint {
    /// Must be supplied on create.
    Required,
    /// Filled by the store on write when not supplied.
    Generated,
    /// May be omitted; the value the field takes when it is.
    Default(Value),
    /// May be omitted; omission leaves the stored value untouched.
    Optional,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub constraint: FieldConstraint,
}

impl FieldSpec {
    pub fn is_relationship(&self) -> bool {
        self.field_type == FieldType::UuidList
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldSet {
    /// Model name, e.g. "BooksReturn".
    pub name: String,
    pub fields: Vec<FieldSpec>,
    /// Reject fields not listed in `fields`.
    pub deny_unknown: bool,
}

impl FieldSet {
    pub fn empty(name: String) -> Self {
        FieldSet {
            name,
            fields: Vec::new(),
            deny_unknown: true,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn relationship_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.is_relationship())
    }

    /// Render as a JSON Schema object.
    pub fn json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for f in &self.fields {
            let mut prop = match f.field_type {
                FieldType::Uuid => serde_json::json!({ "type": "string", "format": "uuid" }),
                FieldType::String => serde_json::json!({ "type": "string" }),
                FieldType::Integer => serde_json::json!({ "type": "integer" }),
                FieldType::Float => serde_json::json!({ "type": "number" }),
                FieldType::Boolean => serde_json::json!({ "type": "boolean" }),
                FieldType::Timestamp => serde_json::json!({ "type": "string", "format": "date-time" }),
                FieldType::Json => serde_json::json!({}),
                FieldType::UuidList => serde_json::json!({
                    "type": "array",
                    "items": { "type": "string", "format": "uuid" }
                }),
            };
            if let Value::Object(ref mut obj) = prop {
                obj.insert("title".into(), Value::String(f.name.clone()));
                if f.nullable {
                    obj.insert("nullable".into(), Value::Bool(true));
                }
                match &f.constraint {
                    FieldConstraint::Required => required.push(Value::String(f.name.clone())),
                    FieldConstraint::Generated => {
                        obj.insert("readOnly".into(), Value::Bool(true));
                    }
                    FieldConstraint::Default(v) => {
                        obj.insert("default".into(), v.clone());
                    }
                    FieldConstraint::Optional => {}
                }
            }
            properties.insert(f.name.clone(), prop);
        }
        let mut schema = serde_json::json!({
            "title": self.name,
            "type": "object",
            "properties": properties,
        });
        if let Value::Object(ref mut obj) = schema {
            if !required.is_empty() {
                obj.insert("required".into(), Value::Array(required));
            }
            if self.deny_unknown {
                obj.insert("additionalProperties".into(), Value::Bool(false));
            }
        }
        schema
    }
}

/// The three field-sets derived for one entity.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SchemaModel {
    pub entity: String,
    pub return_fields: FieldSet,
    pub create_fields: FieldSet,
    pub update_fields: FieldSet,
}

impl SchemaModel {
    pub fn empty(entity: &str) -> Self {
        let camel = snake_to_camel(entity);
        SchemaModel {
            entity: entity.to_string(),
            return_fields: FieldSet::empty(format!("{}Return", camel)),
            create_fields: FieldSet::empty(format!("{}Payload", camel)),
            update_fields: FieldSet::empty(format!("{}OptPayload", camel)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.return_fields.is_empty()
    }

    pub fn json_schema(&self) -> Value {
        let mut schemas = serde_json::Map::new();
        for set in [&self.return_fields, &self.create_fields, &self.update_fields] {
            schemas.insert(set.name.clone(), set.json_schema());
        }
        Value::Object(schemas)
    }
}

/// "book_authors" -> "BookAuthors".
pub fn snake_to_camel(s: &str) -> String {
    s.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_model_names() {
        assert_eq!(snake_to_camel("books"), "Books");
        assert_eq!(snake_to_camel("books_authors"), "BooksAuthors");
        let m = SchemaModel::empty("books_authors");
        assert_eq!(m.update_fields.name, "BooksAuthorsOptPayload");
        assert!(m.is_empty());
    }

    #[test]
    fn json_schema_marks_required_and_closed() {
        let set = FieldSet {
            name: "BooksPayload".into(),
            fields: vec![
                FieldSpec {
                    name: "title".into(),
                    field_type: FieldType::String,
                    nullable: false,
                    constraint: FieldConstraint::Required,
                },
                FieldSpec {
                    name: "authors".into(),
                    field_type: FieldType::UuidList,
                    nullable: false,
                    constraint: FieldConstraint::Default(serde_json::json!([])),
                },
            ],
            deny_unknown: true,
        };
        let schema = set.json_schema();
        assert_eq!(schema["required"], serde_json::json!(["title"]));
        assert_eq!(schema["additionalProperties"], serde_json::json!(false));
        assert_eq!(schema["properties"]["authors"]["type"], "array");
        assert_eq!(schema["properties"]["authors"]["default"], serde_json::json!([]));
    }
}

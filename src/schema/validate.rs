//! Validate request payloads against a derived field-set, and shape rows into the Return model.

use crate::error::AppError;
use crate::schema::model::{FieldConstraint, FieldSet, FieldSpec, FieldType};
use crate::schema::timestamp::is_rfc3339;
use serde_json::{Map, Value};
use uuid::Uuid;

/// A validated payload, partitioned into column values and relationship id lists.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Payload {
    pub scalars: Map<String, Value>,
    pub links: Vec<(String, Vec<Uuid>)>,
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty() && self.links.is_empty()
    }
}

impl FieldSet {
    /// Check `body` against this set. Unknown fields, type mismatches and missing required
    /// fields fail with `InvalidArgument`. Omitted fields are left for the store to default.
    pub fn validate(&self, body: &Value) -> Result<Payload, AppError> {
        let obj = body
            .as_object()
            .ok_or_else(|| AppError::InvalidArgument("body must be a JSON object".into()))?;

        if self.deny_unknown {
            if let Some(unknown) = obj.keys().find(|k| self.field(k).is_none()) {
                return Err(AppError::InvalidArgument(format!(
                    "{}: unknown field '{}'",
                    self.name, unknown
                )));
            }
        }

        let mut payload = Payload::default();
        for spec in &self.fields {
            match obj.get(&spec.name) {
                None => {
                    if spec.constraint == FieldConstraint::Required {
                        return Err(AppError::InvalidArgument(format!("{} is required", spec.name)));
                    }
                }
                Some(v) if spec.is_relationship() => {
                    payload.links.push((spec.name.clone(), uuid_list(spec, v)?));
                }
                Some(v) => {
                    payload.scalars.insert(spec.name.clone(), check_value(spec, v)?);
                }
            }
        }
        Ok(payload)
    }

    /// Project a stored row onto this set: every listed field present, relationship fields default to `[]`.
    pub fn shape(&self, mut row: Map<String, Value>) -> Value {
        let mut out = Map::with_capacity(self.fields.len());
        for spec in &self.fields {
            let v = row.remove(&spec.name).unwrap_or_else(|| match spec.field_type {
                FieldType::UuidList => Value::Array(Vec::new()),
                _ => Value::Null,
            });
            out.insert(spec.name.clone(), v);
        }
        Value::Object(out)
    }
}

fn check_value(spec: &FieldSpec, v: &Value) -> Result<Value, AppError> {
    if v.is_null() {
        return if spec.nullable {
            Ok(Value::Null)
        } else {
            Err(AppError::InvalidArgument(format!("{} may not be null", spec.name)))
        };
    }
    let mismatch = |expected: &str| AppError::InvalidArgument(format!("{} must be {}", spec.name, expected));
    match spec.field_type {
        FieldType::Uuid => {
            let s = v.as_str().ok_or_else(|| mismatch("a uuid string"))?;
            let u = Uuid::parse_str(s).map_err(|_| mismatch("a uuid string"))?;
            Ok(Value::String(u.to_string()))
        }
        FieldType::String if v.is_string() => Ok(v.clone()),
        FieldType::String => Err(mismatch("a string")),
        FieldType::Integer if v.is_i64() => Ok(v.clone()),
        FieldType::Integer => Err(mismatch("an integer")),
        FieldType::Float if v.is_number() => Ok(v.clone()),
        FieldType::Float => Err(mismatch("a number")),
        FieldType::Boolean if v.is_boolean() => Ok(v.clone()),
        FieldType::Boolean => Err(mismatch("a boolean")),
        FieldType::Timestamp => match v.as_str() {
            Some(s) if is_rfc3339(s) => Ok(v.clone()),
            _ => Err(AppError::InvalidArgument(format!(
                "{}: invalid rfc3339 timestamp",
                spec.name
            ))),
        },
        FieldType::Json => Ok(v.clone()),
        FieldType::UuidList => Err(mismatch("a list of uuids")),
    }
}

fn uuid_list(spec: &FieldSpec, v: &Value) -> Result<Vec<Uuid>, AppError> {
    let items = v
        .as_array()
        .ok_or_else(|| AppError::InvalidArgument(format!("{} must be a list of uuids", spec.name)))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or_else(|| AppError::InvalidArgument(format!("{}: malformed uuid {}", spec.name, item)))
        })
        .collect()
}

//! Entity identity for normalized storage.
//!
//! List items are stored as references (`Typename:<key>`), never inline.
//! Most types are keyed by `id`; types with composite identity declare
//! their key fields explicitly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CacheError;

/// Property carrying the GraphQL type name of an object.
pub const TYPENAME_PROPERTY: &str = "__typename";

/// Property carrying an already-normalized reference.
pub const REF_PROPERTY: &str = "__ref";

/// Reference to a normalized entity, e.g. `Job:42`.
///
/// Serializes as `{"__ref": "Job:42"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "__ref")]
    key: String,
}

impl EntityRef {
    /// Wrap a cache key
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// The full cache key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The type name part of the key
    pub fn type_name(&self) -> &str {
        self.key.split_once(':').map_or(&self.key, |(t, _)| t)
    }

    /// JSON form (`{"__ref": ...}`)
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(REF_PROPERTY.to_string(), Value::String(self.key.clone()));
        Value::Object(obj)
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key)
    }
}

/// One field of a composite key, optionally selecting nested fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyField {
    pub name: String,
    pub nested: Vec<KeyField>,
}

impl KeyField {
    /// A scalar key field
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nested: Vec::new(),
        }
    }

    /// A key field selecting nested fields of an object
    pub fn object(name: impl Into<String>, nested: Vec<KeyField>) -> Self {
        Self {
            name: name.into(),
            nested,
        }
    }
}

/// How entities of a type are identified.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeyFields {
    /// Keyed by the `id` property
    #[default]
    Id,
    /// Keyed by a composite of fields, encoded as JSON in declared order
    Composite(Vec<KeyField>),
}

impl KeyFields {
    /// Compute the cache key for an object of the given type.
    pub fn identify(&self, type_name: &str, object: &Map<String, Value>) -> Result<EntityRef, CacheError> {
        match self {
            KeyFields::Id => {
                let id = match object.get("id") {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    _ => return Err(CacheError::missing_key_field(type_name, "id")),
                };
                Ok(EntityRef::new(format!("{type_name}:{id}")))
            }
            KeyFields::Composite(fields) => {
                let mut encoded = String::new();
                encode_fields(type_name, "", fields, object, &mut encoded)?;
                Ok(EntityRef::new(format!("{type_name}:{encoded}")))
            }
        }
    }
}

fn encode_fields(
    type_name: &str,
    prefix: &str,
    fields: &[KeyField],
    object: &Map<String, Value>,
    out: &mut String,
) -> Result<(), CacheError> {
    out.push('{');
    for (i, field) in fields.iter().enumerate() {
        let path = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{prefix}.{}", field.name)
        };
        let value = match object.get(&field.name) {
            Some(Value::Null) | None => return Err(CacheError::missing_key_field(type_name, path)),
            Some(value) => value,
        };

        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(field.name.clone()).to_string());
        out.push(':');

        if field.nested.is_empty() {
            out.push_str(&value.to_string());
        } else {
            let Value::Object(inner) = value else {
                return Err(CacheError::missing_key_field(type_name, path));
            };
            encode_fields(type_name, &path, &field.nested, inner, out)?;
        }
    }
    out.push('}');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn row_key() -> KeyFields {
        KeyFields::Composite(vec![
            KeyField::object("siloDefinition", vec![KeyField::scalar("id")]),
            KeyField::object("property", vec![KeyField::scalar("id")]),
            KeyField::object("dataSource", vec![KeyField::scalar("id")]),
        ])
    }

    #[test]
    fn test_identify_by_id() {
        let key = KeyFields::Id
            .identify("Job", &object(json!({"id": "j1", "status": "RUNNING"})))
            .unwrap();
        assert_eq!(key.key(), "Job:j1");
        assert_eq!(key.type_name(), "Job");

        let key = KeyFields::Id.identify("Job", &object(json!({"id": 7}))).unwrap();
        assert_eq!(key.key(), "Job:7");
    }

    #[test]
    fn test_identify_missing_id() {
        let err = KeyFields::Id
            .identify("Job", &object(json!({"status": "RUNNING"})))
            .unwrap_err();
        assert_eq!(err, CacheError::missing_key_field("Job", "id"));
    }

    #[test]
    fn test_identify_composite_in_declared_order() {
        let row = object(json!({
            "dataSource": {"id": "d1", "name": "users"},
            "property": {"id": "p1"},
            "siloDefinition": {"id": "s1"},
        }));
        let key = row_key().identify("DataMapRow", &row).unwrap();
        assert_eq!(
            key.key(),
            r#"DataMapRow:{"siloDefinition":{"id":"s1"},"property":{"id":"p1"},"dataSource":{"id":"d1"}}"#
        );
    }

    #[test]
    fn test_identify_composite_missing_nested() {
        let row = object(json!({
            "siloDefinition": {"id": "s1"},
            "property": {"name": "email"},
            "dataSource": {"id": "d1"},
        }));
        let err = row_key().identify("DataMapRow", &row).unwrap_err();
        assert_eq!(err, CacheError::missing_key_field("DataMapRow", "property.id"));
    }

    #[test]
    fn test_entity_ref_json() {
        let r = EntityRef::new("Request:r1");
        assert_eq!(r.to_json(), json!({"__ref": "Request:r1"}));
        assert_eq!(serde_json::to_value(&r).unwrap(), r.to_json());
        assert_eq!(r.to_string(), "Request:r1");
    }
}

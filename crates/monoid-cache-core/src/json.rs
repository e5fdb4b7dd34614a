//! JSON boundary of the field cache.
//!
//! Decodes GraphQL response payloads into [`PageResponse`]s of entity
//! references using each field's list/count property names, and encodes
//! read results back into the same shape.
//!
//! A response that omits the list or count property is accepted (the
//! query may simply not have selected it). A property that is present with
//! the wrong type is rejected.

use serde_json::{Map, Value};

use crate::error::CacheError;
use crate::identity::EntityRef;
use crate::pagination::{FieldArgs, PageResponse};
use crate::policy::{encode_list, FieldPolicy, TypePolicies};
use crate::store::{FieldCache, ReadOutcome};

/// Decode one response payload for `policy`.
///
/// `None` and JSON `null` decode to `None` (no response).
pub fn decode_response(
    policies: &TypePolicies,
    policy: &FieldPolicy,
    response: Option<&Value>,
) -> Result<Option<PageResponse<EntityRef>>, CacheError> {
    let object = match response {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(object)) => object,
        Some(other) => {
            return Err(CacheError::malformed(
                policy.field_name(),
                format!("expected an object, got {}", json_type(other)),
            ))
        }
    };

    let items = match object.get(policy.field_name()) {
        None | Some(Value::Null) => None,
        Some(Value::Array(values)) => Some(
            values
                .iter()
                .map(|item| policies.identify(item))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Some(other) => {
            return Err(CacheError::malformed(
                policy.field_name(),
                format!("expected an array, got {}", json_type(other)),
            ))
        }
    };

    let total = match object.get(policy.count_name()) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.as_u64().ok_or_else(|| {
            CacheError::malformed(
                policy.count_name(),
                format!("expected a non-negative integer, got {value}"),
            )
        })?),
    };

    let passthrough: Map<String, Value> = object
        .iter()
        .filter(|(k, _)| k.as_str() != policy.field_name() && k.as_str() != policy.count_name())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(Some(PageResponse {
        items,
        total,
        passthrough,
    }))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Field cache fed with raw GraphQL payloads.
#[derive(Debug)]
pub struct JsonFieldCache {
    inner: FieldCache<EntityRef>,
}

impl JsonFieldCache {
    /// Create a cache with the default snapshot bound
    pub fn new(policies: TypePolicies) -> Self {
        Self {
            inner: FieldCache::new(policies),
        }
    }

    /// Wrap a configured cache
    pub fn from_cache(inner: FieldCache<EntityRef>) -> Self {
        Self { inner }
    }

    /// The underlying typed cache
    pub fn cache(&self) -> &FieldCache<EntityRef> {
        &self.inner
    }

    /// Decode and merge a response payload for `type_name.field`.
    pub fn write_response(
        &self,
        type_name: &str,
        entity_id: &str,
        field: &str,
        args: &FieldArgs,
        response: Option<&Value>,
    ) -> Result<(), CacheError> {
        let policies = self.inner.policies();
        let policy = policies.require(type_name, field)?;
        let incoming = decode_response(policies, policy, response)?;
        self.inner.write(type_name, entity_id, field, args, incoming)
    }

    /// Read a window back in response shape.
    pub fn read_json(
        &self,
        type_name: &str,
        entity_id: &str,
        field: &str,
        args: &FieldArgs,
    ) -> Result<ReadOutcome<Value>, CacheError> {
        let policy = self.inner.policies().require(type_name, field)?;
        let outcome = self.inner.read(type_name, entity_id, field, args)?;
        Ok(outcome.map(|list| encode_list(policy, &list, EntityRef::to_json)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::requests_policy;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn decode(response: Value) -> Result<Option<PageResponse<EntityRef>>, CacheError> {
        let policies = TypePolicies::new();
        decode_response(&policies, &requests_policy(), Some(&response))
    }

    #[test]
    fn test_decode_full_response() {
        let decoded = decode(json!({
            "__typename": "RequestsResult",
            "requests": [
                {"__typename": "Request", "id": "r1"},
                {"__typename": "Request", "id": "r2"},
            ],
            "numRequests": 12,
        }))
        .unwrap()
        .unwrap();

        assert_eq!(
            decoded.items,
            Some(vec![EntityRef::new("Request:r1"), EntityRef::new("Request:r2")])
        );
        assert_eq!(decoded.total, Some(12));
        assert_eq!(decoded.passthrough.get("__typename"), Some(&json!("RequestsResult")));
        assert_eq!(decoded.passthrough.len(), 1);
    }

    #[test]
    fn test_decode_absent_response() {
        let policies = TypePolicies::new();
        let policy = requests_policy();
        assert_eq!(decode_response(&policies, &policy, None).unwrap(), None);
        assert_eq!(
            decode_response(&policies, &policy, Some(&Value::Null)).unwrap(),
            None
        );
    }

    #[test]
    fn test_decode_tolerates_missing_properties() {
        let decoded = decode(json!({"numRequests": 3})).unwrap().unwrap();
        assert_eq!(decoded.items, None);
        assert_eq!(decoded.total, Some(3));

        let decoded = decode(json!({"requests": []})).unwrap().unwrap();
        assert_eq!(decoded.items, Some(Vec::new()));
        assert_eq!(decoded.total, None);
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        let err = decode(json!({"requests": {"id": "r1"}})).unwrap_err();
        assert!(matches!(err, CacheError::MalformedResponse { ref property, .. } if property == "requests"));

        let err = decode(json!({"requests": [], "numRequests": "12"})).unwrap_err();
        assert!(matches!(err, CacheError::MalformedResponse { ref property, .. } if property == "numRequests"));

        let err = decode(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("expected an object"));
    }

    #[test]
    fn test_decode_rejects_unidentifiable_items() {
        let err = decode(json!({"requests": [{"id": "r1"}]})).unwrap_err();
        assert_eq!(err, CacheError::MissingTypename);
    }

    #[test]
    fn test_json_cache_round_trip_shape() {
        let cache = JsonFieldCache::new(TypePolicies::console_defaults().unwrap());
        let args = json!({"offset": 0, "limit": 2}).as_object().cloned().unwrap();

        cache
            .write_response(
                "Workspace",
                "ws1",
                "requests",
                &args,
                Some(&json!({
                    "requests": [{"__typename": "Request", "id": "r1"}],
                    "numRequests": 1,
                })),
            )
            .unwrap();

        let outcome = cache.read_json("Workspace", "ws1", "requests", &args).unwrap();
        assert_eq!(
            outcome,
            ReadOutcome::Complete(json!({
                "requests": [{"__ref": "Request:r1"}],
                "numRequests": 1,
            }))
        );
    }
}

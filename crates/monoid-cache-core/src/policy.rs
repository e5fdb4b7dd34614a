//! Field policies and the type policy registry.
//!
//! A [`FieldPolicy`] ties the pure pagination functions to one GraphQL list
//! field: which response property holds the items, which holds the total,
//! and which call arguments partition the cache into separate snapshots.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::CacheError;
use crate::identity::{EntityRef, KeyFields, REF_PROPERTY, TYPENAME_PROPERTY};
use crate::pagination::{
    merge_page, read_page, FieldArgs, PageResponse, PageWindow, PaginatedList, LIMIT_ARG,
    OFFSET_ARG,
};

/// Read/merge policy for one offset/limit paginated list field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPolicy {
    /// Response property holding the list of items
    field_name: String,
    /// Response property holding the total count
    count_name: String,
    /// Call arguments that partition snapshots
    key_args: Vec<String>,
}

impl FieldPolicy {
    /// Create a paginated policy.
    ///
    /// Validated when registered, see [`FieldPolicy::validate`].
    pub fn paginated<I, S>(
        field_name: impl Into<String>,
        count_name: impl Into<String>,
        key_args: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field_name: field_name.into(),
            count_name: count_name.into(),
            key_args: key_args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn count_name(&self) -> &str {
        &self.count_name
    }

    pub fn key_args(&self) -> &[String] {
        &self.key_args
    }

    /// Check the policy before it is attached to `type_name.field`.
    pub fn validate(&self, type_name: &str, field: &str) -> Result<(), CacheError> {
        if self.field_name.is_empty() || self.count_name.is_empty() {
            return Err(CacheError::invalid_policy(
                type_name,
                field,
                "list and count property names must not be empty",
            ));
        }
        if self.field_name == self.count_name {
            return Err(CacheError::invalid_policy(
                type_name,
                field,
                format!("list and count both use property '{}'", self.field_name),
            ));
        }
        if let Some(arg) = self
            .key_args
            .iter()
            .find(|a| a.as_str() == OFFSET_ARG || a.as_str() == LIMIT_ARG)
        {
            return Err(CacheError::invalid_policy(
                type_name,
                field,
                format!("pagination argument '{arg}' cannot be a key argument"),
            ));
        }
        Ok(())
    }

    /// Storage name of one call of `field`.
    ///
    /// `field` when the policy has no key arguments, otherwise
    /// `field:{"arg":value,...}` with the key arguments present in `args`,
    /// in declared order. Pagination arguments never contribute.
    pub fn store_field_name(&self, field: &str, args: &FieldArgs) -> String {
        if self.key_args.is_empty() {
            return field.to_string();
        }

        let parts: Vec<String> = self
            .key_args
            .iter()
            .filter_map(|name| {
                args.get(name)
                    .map(|value| format!("{}:{}", Value::String(name.clone()), value))
            })
            .collect();
        format!("{field}:{{{}}}", parts.join(","))
    }

    /// Project the window named by `args` out of a snapshot.
    pub fn read<T: Clone>(
        &self,
        existing: Option<&PaginatedList<T>>,
        args: &FieldArgs,
    ) -> Result<Option<PaginatedList<T>>, CacheError> {
        let window = PageWindow::from_args(args)?;
        Ok(read_page(existing, window))
    }

    /// Merge a page fetched with `args` into a snapshot.
    ///
    /// Fails with `WindowOverflow` when the page's end position does not fit
    /// in `usize`.
    pub fn merge<T>(
        &self,
        existing: Option<PaginatedList<T>>,
        incoming: Option<PageResponse<T>>,
        args: &FieldArgs,
    ) -> Result<Option<PaginatedList<T>>, CacheError> {
        let window = PageWindow::from_args(args)?;
        if let Some(page) = incoming.as_ref().and_then(|r| r.items.as_ref()) {
            window.page_end(page.len())?;
        }
        Ok(merge_page(existing, incoming, window))
    }
}

/// Registration seam for field policies.
pub trait FieldPolicyRegistry {
    /// Attach `policy` to `type_name.field`, replacing any previous one.
    fn register_field_policy(
        &mut self,
        type_name: &str,
        field: &str,
        policy: FieldPolicy,
    ) -> Result<(), CacheError>;
}

/// Field policies and key fields, by type name.
#[derive(Debug, Clone, Default)]
pub struct TypePolicies {
    fields: BTreeMap<(String, String), FieldPolicy>,
    key_fields: BTreeMap<String, KeyFields>,
}

impl TypePolicies {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy for `type_name.field`
    pub fn get(&self, type_name: &str, field: &str) -> Option<&FieldPolicy> {
        self.fields.get(&(type_name.to_string(), field.to_string()))
    }

    /// Policy for `type_name.field`, or a NoFieldPolicy error
    pub fn require(&self, type_name: &str, field: &str) -> Result<&FieldPolicy, CacheError> {
        self.get(type_name, field)
            .ok_or_else(|| CacheError::no_field_policy(type_name, field))
    }

    /// Iterate over `(type_name, field, policy)` in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &FieldPolicy)> {
        self.fields
            .iter()
            .map(|((t, f), p)| (t.as_str(), f.as_str(), p))
    }

    /// Number of registered field policies
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Declare how entities of `type_name` are identified
    pub fn set_key_fields(&mut self, type_name: impl Into<String>, key_fields: KeyFields) {
        self.key_fields.insert(type_name.into(), key_fields);
    }

    /// Key fields of `type_name` (`id` unless declared otherwise)
    pub fn key_fields(&self, type_name: &str) -> KeyFields {
        self.key_fields.get(type_name).cloned().unwrap_or_default()
    }

    /// Normalize a list item into an entity reference.
    ///
    /// Items that are already references (`{"__ref": ...}`) pass through.
    pub fn identify(&self, item: &Value) -> Result<EntityRef, CacheError> {
        let Value::Object(object) = item else {
            return Err(CacheError::MissingTypename);
        };
        if let Some(Value::String(key)) = object.get(REF_PROPERTY) {
            return Ok(EntityRef::new(key.clone()));
        }
        let Some(Value::String(type_name)) = object.get(TYPENAME_PROPERTY) else {
            return Err(CacheError::MissingTypename);
        };

        match self.key_fields.get(type_name) {
            Some(key_fields) => key_fields.identify(type_name, object),
            None => KeyFields::Id.identify(type_name, object),
        }
    }

    /// Merge another registry in; its entries win on conflict.
    pub fn extend(&mut self, other: TypePolicies) {
        self.fields.extend(other.fields);
        self.key_fields.extend(other.key_fields);
    }
}

impl FieldPolicyRegistry for TypePolicies {
    fn register_field_policy(
        &mut self,
        type_name: &str,
        field: &str,
        policy: FieldPolicy,
    ) -> Result<(), CacheError> {
        policy.validate(type_name, field)?;
        if self.get(type_name, field).is_some() {
            debug!("Replacing field policy for {}.{}", type_name, field);
        }
        self.fields
            .insert((type_name.to_string(), field.to_string()), policy);
        Ok(())
    }
}

/// Encode a snapshot in response shape:
/// `{ ...passthrough, <count_name>: total, <field_name>: [ref|null, ...] }`.
pub(crate) fn encode_list<T, F>(policy: &FieldPolicy, list: &PaginatedList<T>, encode: F) -> Value
where
    F: Fn(&T) -> Value,
{
    let mut obj: Map<String, Value> = list.passthrough.clone();
    if let Some(total) = list.total {
        obj.insert(policy.count_name.clone(), Value::from(total));
    }
    let items = list
        .items
        .iter()
        .map(|item| item.as_ref().map_or(Value::Null, &encode))
        .collect();
    obj.insert(policy.field_name.clone(), Value::Array(items));
    Value::Object(obj)
}

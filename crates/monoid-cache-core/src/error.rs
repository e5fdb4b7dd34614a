//! Cache error types.

use thiserror::Error;

/// Errors raised by the field cache and its JSON boundary.
///
/// The pure pagination functions never fail; these errors come from
/// argument parsing, policy lookup and response decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// No policy registered for a type/field pair
    #[error("no field policy registered for '{type_name}.{field}'")]
    NoFieldPolicy { type_name: String, field: String },

    /// Policy rejected at registration
    #[error("invalid field policy for '{type_name}.{field}': {message}")]
    InvalidPolicy {
        type_name: String,
        field: String,
        message: String,
    },

    /// Pagination argument is not a non-negative integer
    #[error("invalid pagination argument '{name}': expected a non-negative integer, got {value}")]
    InvalidArgument { name: String, value: String },

    /// Page would extend the snapshot beyond the configured bound
    #[error("page ends at position {end}, beyond the maximum of {max}")]
    WindowTooLarge { end: usize, max: usize },

    /// Page end position does not fit in `usize`
    #[error("page of {len} items at offset {offset} has no representable end position")]
    WindowOverflow { offset: usize, len: usize },

    /// Response property present with the wrong shape
    #[error("malformed response property '{property}': {message}")]
    MalformedResponse { property: String, message: String },

    /// Entity without `__typename` or `__ref`
    #[error("list item has neither '__typename' nor '__ref'")]
    MissingTypename,

    /// Entity missing one of its identity fields
    #[error("cannot identify '{type_name}' entity: missing key field '{path}'")]
    MissingKeyField { type_name: String, path: String },
}

impl CacheError {
    /// Create a new NoFieldPolicy error.
    pub fn no_field_policy(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::NoFieldPolicy {
            type_name: type_name.into(),
            field: field.into(),
        }
    }

    /// Create a new InvalidPolicy error.
    pub fn invalid_policy(
        type_name: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidPolicy {
            type_name: type_name.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new InvalidArgument error.
    pub fn invalid_argument(name: impl Into<String>, value: &serde_json::Value) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.to_string(),
        }
    }

    /// Create a new MalformedResponse error.
    pub fn malformed(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            property: property.into(),
            message: message.into(),
        }
    }

    /// Create a new MissingKeyField error.
    pub fn missing_key_field(type_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::MissingKeyField {
            type_name: type_name.into(),
            path: path.into(),
        }
    }
}

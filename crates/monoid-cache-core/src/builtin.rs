//! Field policies used by the Monoid console.
//!
//! | Type                      | Field           | Key args                             |
//! |---------------------------|-----------------|--------------------------------------|
//! | Request                   | requestStatuses | query                                |
//! | SiloDefinition, Workspace | discoveries     | query, statuses                      |
//! | Workspace                 | jobs            | resourceId, jobType, status, query   |
//! | Workspace                 | requests        | (none)                               |
//! | Workspace                 | dataMap         | query                                |

use crate::error::CacheError;
use crate::identity::{KeyField, KeyFields};
use crate::policy::{FieldPolicy, FieldPolicyRegistry, TypePolicies};

/// Request statuses of a user data request
pub fn request_status_policy() -> FieldPolicy {
    FieldPolicy::paginated("requestStatusRows", "numStatuses", ["query"])
}

/// Discoveries of a silo or workspace
pub fn discoveries_policy() -> FieldPolicy {
    FieldPolicy::paginated("discoveries", "numDiscoveries", ["query", "statuses"])
}

/// Scan/discovery jobs of a workspace
pub fn jobs_policy() -> FieldPolicy {
    FieldPolicy::paginated(
        "jobs",
        "numJobs",
        ["resourceId", "jobType", "status", "query"],
    )
}

/// User data requests of a workspace
pub fn requests_policy() -> FieldPolicy {
    FieldPolicy::paginated("requests", "numRequests", Vec::<String>::new())
}

/// Data map rows of a workspace
pub fn data_map_policy() -> FieldPolicy {
    FieldPolicy::paginated("dataMapRows", "numRows", ["query"])
}

/// Data map rows are identified by the silo, property and data source they link.
pub fn data_map_row_key_fields() -> KeyFields {
    KeyFields::Composite(vec![
        KeyField::object("siloDefinition", vec![KeyField::scalar("id")]),
        KeyField::object("property", vec![KeyField::scalar("id")]),
        KeyField::object("dataSource", vec![KeyField::scalar("id")]),
    ])
}

/// Register the console's paginated fields on any registry.
pub fn register_console_policies<R: FieldPolicyRegistry>(registry: &mut R) -> Result<(), CacheError> {
    registry.register_field_policy("Request", "requestStatuses", request_status_policy())?;
    registry.register_field_policy("SiloDefinition", "discoveries", discoveries_policy())?;
    registry.register_field_policy("Workspace", "jobs", jobs_policy())?;
    registry.register_field_policy("Workspace", "discoveries", discoveries_policy())?;
    registry.register_field_policy("Workspace", "requests", requests_policy())?;
    registry.register_field_policy("Workspace", "dataMap", data_map_policy())?;
    Ok(())
}

impl TypePolicies {
    /// Registry with every console field policy and key field declaration.
    pub fn console_defaults() -> Result<Self, CacheError> {
        let mut policies = TypePolicies::new();
        register_console_policies(&mut policies)?;
        policies.set_key_fields("DataMapRow", data_map_row_key_fields());
        Ok(policies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_console_defaults_cover_all_fields() {
        let policies = TypePolicies::console_defaults().unwrap();
        assert_eq!(policies.len(), 6);

        let expected = [
            ("Request", "requestStatuses", "requestStatusRows", "numStatuses"),
            ("SiloDefinition", "discoveries", "discoveries", "numDiscoveries"),
            ("Workspace", "discoveries", "discoveries", "numDiscoveries"),
            ("Workspace", "jobs", "jobs", "numJobs"),
            ("Workspace", "requests", "requests", "numRequests"),
            ("Workspace", "dataMap", "dataMapRows", "numRows"),
        ];
        for (type_name, field, list, count) in expected {
            let policy = policies.require(type_name, field).unwrap();
            assert_eq!(policy.field_name(), list);
            assert_eq!(policy.count_name(), count);
        }
    }

    #[test]
    fn test_key_args_per_field() {
        assert_eq!(jobs_policy().key_args(), ["resourceId", "jobType", "status", "query"]);
        assert_eq!(discoveries_policy().key_args(), ["query", "statuses"]);
        assert!(requests_policy().key_args().is_empty());
        assert_eq!(data_map_policy().key_args(), ["query"]);
        assert_eq!(request_status_policy().key_args(), ["query"]);
    }

    #[test]
    fn test_data_map_rows_use_composite_identity() {
        let policies = TypePolicies::console_defaults().unwrap();
        let row = json!({
            "__typename": "DataMapRow",
            "siloDefinition": {"id": "s1"},
            "property": {"id": "p1"},
            "dataSource": {"id": "d1"},
        });
        let key = policies.identify(&row).unwrap();
        assert!(key.key().starts_with("DataMapRow:{"));
        assert!(key.key().contains(r#""property":{"id":"p1"}"#));
    }
}

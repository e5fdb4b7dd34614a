//! Monoid Cache Core - Normalized field cache with offset/limit pagination
//!
//! This crate provides the client-side cache used for paginated list fields
//! of the Monoid console API:
//! - Pure merge/read functions over sparse list snapshots
//! - Field policies (list/count property names, key arguments)
//! - A type policy registry with the console's built-in fields
//! - Entity identity for normalized references
//! - A thread-safe, LRU-bounded snapshot store and its JSON boundary
//!
//! # Architecture
//!
//! ```text
//! JsonFieldCache            (GraphQL payload <-> entity references)
//! └── FieldCache<T>         (snapshots by type/entity/field/key args)
//!     ├── TypePolicies      (FieldPolicy per type.field, KeyFields per type)
//!     └── merge_page / read_page
//! ```

pub mod builtin;
pub mod error;
pub mod identity;
pub mod json;
pub mod pagination;
pub mod policy;
pub mod store;

// Re-exports for convenience
pub use builtin::{
    data_map_policy, data_map_row_key_fields, discoveries_policy, jobs_policy,
    register_console_policies, request_status_policy, requests_policy,
};
pub use error::CacheError;
pub use identity::{EntityRef, KeyField, KeyFields};
pub use json::{decode_response, JsonFieldCache};
pub use pagination::{
    merge_page, read_page, FieldArgs, PageResponse, PageWindow, PaginatedList, LIMIT_ARG,
    OFFSET_ARG,
};
pub use policy::{FieldPolicy, FieldPolicyRegistry, TypePolicies};
pub use store::{
    CacheMetrics, FieldCache, ReadOutcome, StoreKey, DEFAULT_MAX_SNAPSHOTS,
    DEFAULT_MAX_WINDOW_END,
};

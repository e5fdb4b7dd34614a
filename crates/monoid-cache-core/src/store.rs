//! Normalized Field Cache
//!
//! Stores one [`PaginatedList`] snapshot per
//! `(type, entity, store field name)` and routes writes and reads through
//! the registered [`FieldPolicy`].
//!
//! Snapshots are kept in an LRU bounded by a snapshot count; the least
//! recently used snapshot is dropped when the bound is exceeded.
//!
//! Thread-safe via interior mutability using parking_lot::Mutex. Each write
//! or read runs under the lock, so merges for one snapshot never interleave.

use std::fmt;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::CacheError;
use crate::pagination::{merge_page, read_page, FieldArgs, PageResponse, PageWindow, PaginatedList};
use crate::policy::{FieldPolicy, TypePolicies};

/// Default snapshot bound
pub const DEFAULT_MAX_SNAPSHOTS: usize = 4096;

/// Default bound on the end position of a merged page
pub const DEFAULT_MAX_WINDOW_END: usize = 1_000_000;

/// Location of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey {
    /// Type owning the field (e.g. `Workspace`)
    pub type_name: String,
    /// Id of the owning entity
    pub entity_id: String,
    /// Field name plus key arguments, see [`FieldPolicy::store_field_name`]
    pub store_field_name: String,
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}.{}",
            self.type_name, self.entity_id, self.store_field_name
        )
    }
}

/// Result of reading a window.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<T> {
    /// Nothing cached for this field and key arguments
    Miss,
    /// Cached, but the window contains holes or reaches past the stored
    /// positions into ones the list may still have
    Partial(T),
    /// Every position in the window is cached
    Complete(T),
}

impl<T> ReadOutcome<T> {
    /// True when the window should be fetched from the server
    pub fn needs_fetch(&self) -> bool {
        !matches!(self, ReadOutcome::Complete(_))
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ReadOutcome::Complete(_))
    }

    /// Short status name (`miss`, `partial`, `complete`)
    pub fn status(&self) -> &'static str {
        match self {
            ReadOutcome::Miss => "miss",
            ReadOutcome::Partial(_) => "partial",
            ReadOutcome::Complete(_) => "complete",
        }
    }

    /// The projected value, if any
    pub fn into_value(self) -> Option<T> {
        match self {
            ReadOutcome::Miss => None,
            ReadOutcome::Partial(v) | ReadOutcome::Complete(v) => Some(v),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ReadOutcome<U> {
        match self {
            ReadOutcome::Miss => ReadOutcome::Miss,
            ReadOutcome::Partial(v) => ReadOutcome::Partial(f(v)),
            ReadOutcome::Complete(v) => ReadOutcome::Complete(f(v)),
        }
    }
}

/// Cache metrics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    /// Reads answered completely from cache
    pub hits: u64,
    /// Reads that found a snapshot with holes in the window
    pub partial_hits: u64,
    /// Reads that found no snapshot
    pub misses: u64,
    /// Pages merged
    pub merges: u64,
    /// Writes with an absent response
    pub noop_merges: u64,
    /// Snapshots dropped by the capacity bound
    pub evictions: u64,
}

impl CacheMetrics {
    /// Get hit rate as a fraction (0.0 - 1.0); partial hits count as misses
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.partial_hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Inner state for FieldCache (protected by Mutex)
struct CacheState<T> {
    /// Snapshots, most recently used at the front
    snapshots: LruCache<StoreKey, PaginatedList<T>>,

    /// Cache metrics
    metrics: CacheMetrics,
}

/// Normalized cache of paginated field snapshots.
///
/// All methods take `&self`.
pub struct FieldCache<T> {
    /// Field policies (immutable after construction)
    policies: TypePolicies,

    /// Maximum end position a merge may reach
    max_window_end: usize,

    /// Mutable state protected by Mutex
    state: Mutex<CacheState<T>>,
}

impl<T> FieldCache<T> {
    /// Create a cache with the default snapshot bound
    pub fn new(policies: TypePolicies) -> Self {
        Self::with_capacity(policies, DEFAULT_MAX_SNAPSHOTS)
    }

    /// Create a cache holding at most `max_snapshots` snapshots (at least 1)
    pub fn with_capacity(policies: TypePolicies, max_snapshots: usize) -> Self {
        let capacity = NonZeroUsize::new(max_snapshots).unwrap_or(NonZeroUsize::MIN);
        Self {
            policies,
            max_window_end: DEFAULT_MAX_WINDOW_END,
            state: Mutex::new(CacheState {
                snapshots: LruCache::new(capacity),
                metrics: CacheMetrics::default(),
            }),
        }
    }

    /// Set the maximum end position a merged page may reach
    pub fn with_max_window_end(mut self, max_window_end: usize) -> Self {
        self.max_window_end = max_window_end;
        self
    }

    /// Registered policies
    pub fn policies(&self) -> &TypePolicies {
        &self.policies
    }

    /// Snapshot bound
    pub fn capacity(&self) -> usize {
        self.state.lock().snapshots.cap().get()
    }

    /// Get the number of snapshots currently held
    pub fn snapshot_count(&self) -> usize {
        self.state.lock().snapshots.len()
    }

    /// Get a snapshot of cache metrics
    pub fn metrics(&self) -> CacheMetrics {
        self.state.lock().metrics.clone()
    }

    /// Reset cache metrics
    pub fn reset_metrics(&self) {
        self.state.lock().metrics = CacheMetrics::default();
    }

    /// Resolve the policy and store key for one field call
    pub fn locate(
        &self,
        type_name: &str,
        entity_id: &str,
        field: &str,
        args: &FieldArgs,
    ) -> Result<(&FieldPolicy, StoreKey), CacheError> {
        let policy = self.policies.require(type_name, field)?;
        let key = StoreKey {
            type_name: type_name.to_string(),
            entity_id: entity_id.to_string(),
            store_field_name: policy.store_field_name(field, args),
        };
        Ok((policy, key))
    }

    /// Merge a fetched page into the snapshot named by `args`.
    ///
    /// An absent response changes nothing.
    pub fn write(
        &self,
        type_name: &str,
        entity_id: &str,
        field: &str,
        args: &FieldArgs,
        incoming: Option<PageResponse<T>>,
    ) -> Result<(), CacheError> {
        let (_, key) = self.locate(type_name, entity_id, field, args)?;
        let window = PageWindow::from_args(args)?;

        let Some(incoming) = incoming else {
            trace!("Skipping merge into {}: no response", key);
            self.state.lock().metrics.noop_merges += 1;
            return Ok(());
        };

        if let Some(items) = &incoming.items {
            let end = window.page_end(items.len())?;
            if end > self.max_window_end {
                return Err(CacheError::WindowTooLarge {
                    end,
                    max: self.max_window_end,
                });
            }
        }

        let mut state = self.state.lock();
        let existing = state.snapshots.pop(&key);
        let Some(merged) = merge_page(existing, Some(incoming), window) else {
            return Ok(());
        };
        debug!(
            "Merged page [{}, +{}) into {} (len {}, total {:?})",
            window.offset,
            window.limit,
            key,
            merged.len(),
            merged.total
        );

        state.metrics.merges += 1;
        if let Some((evicted, _)) = state.snapshots.push(key, merged) {
            debug!("Evicted snapshot {}", evicted);
            state.metrics.evictions += 1;
        }
        Ok(())
    }

    /// Remove the snapshot named by `args`.
    ///
    /// Returns true if a snapshot was removed.
    pub fn evict(
        &self,
        type_name: &str,
        entity_id: &str,
        field: &str,
        args: &FieldArgs,
    ) -> Result<bool, CacheError> {
        let (_, key) = self.locate(type_name, entity_id, field, args)?;
        let removed = self.state.lock().snapshots.pop(&key).is_some();
        if removed {
            debug!("Evicted snapshot {}", key);
        }
        Ok(removed)
    }

    /// Remove every snapshot owned by one entity, across fields and key args.
    ///
    /// Returns the number of snapshots removed.
    pub fn evict_entity(&self, type_name: &str, entity_id: &str) -> usize {
        let mut state = self.state.lock();
        let keys: Vec<StoreKey> = state
            .snapshots
            .iter()
            .filter(|(k, _)| k.type_name == type_name && k.entity_id == entity_id)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            state.snapshots.pop(key);
        }
        debug!(
            "Evicted {} snapshots of {}:{}",
            keys.len(),
            type_name,
            entity_id
        );
        keys.len()
    }

    /// Clear all snapshots
    pub fn clear(&self) {
        self.state.lock().snapshots.clear();
    }
}

impl<T: Clone> FieldCache<T> {
    /// Read the window named by `args`.
    pub fn read(
        &self,
        type_name: &str,
        entity_id: &str,
        field: &str,
        args: &FieldArgs,
    ) -> Result<ReadOutcome<PaginatedList<T>>, CacheError> {
        let (_, key) = self.locate(type_name, entity_id, field, args)?;
        let window = PageWindow::from_args(args)?;

        let mut state = self.state.lock();
        let snapshot = state.snapshots.get(&key);
        let missing_tail = snapshot.is_some_and(|list| list.missing_tail(window));
        let page = read_page(snapshot, window);
        let outcome = match page {
            None => {
                state.metrics.misses += 1;
                ReadOutcome::Miss
            }
            Some(page) if missing_tail || page.has_holes() => {
                state.metrics.partial_hits += 1;
                ReadOutcome::Partial(page)
            }
            Some(page) => {
                state.metrics.hits += 1;
                ReadOutcome::Complete(page)
            }
        };
        trace!("Read {} [{}, +{}): {}", key, window.offset, window.limit, outcome.status());
        Ok(outcome)
    }

    /// Whole snapshot named by `args`, without touching LRU order or metrics
    pub fn peek_snapshot(
        &self,
        type_name: &str,
        entity_id: &str,
        field: &str,
        args: &FieldArgs,
    ) -> Result<Option<PaginatedList<T>>, CacheError> {
        let (_, key) = self.locate(type_name, entity_id, field, args)?;
        Ok(self.state.lock().snapshots.peek(&key).cloned())
    }
}

impl<T> fmt::Debug for FieldCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCache")
            .field("policies", &self.policies.len())
            .field("snapshots", &self.snapshot_count())
            .field("max_window_end", &self.max_window_end)
            .finish()
    }
}

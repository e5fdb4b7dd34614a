//! Offset/limit Pagination
//!
//! Merge and read functions for a paginated list field cached as one sparse
//! sequence per set of key arguments.
//!
//! Pages are scattered into the sequence by absolute position rather than
//! appended, so a page fetched before its predecessors still lands where it
//! belongs. Positions that were never fetched are holes (`None`).
//!
//! Both functions are pure: they take the current snapshot and return the
//! next one, leaving storage and locking to the caller.

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::CacheError;

/// Name of the pagination offset argument.
pub const OFFSET_ARG: &str = "offset";

/// Name of the pagination limit argument.
pub const LIMIT_ARG: &str = "limit";

/// Call arguments of a field, as sent with the query.
pub type FieldArgs = Map<String, Value>;

/// Pagination arguments of a single fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PageWindow {
    /// Absolute position of the first item
    pub offset: usize,
    /// Number of items requested
    pub limit: usize,
}

impl PageWindow {
    /// Create a window
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    /// Exclusive end position of the window
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }

    /// Exclusive end position of a page of `len` items written at `offset`.
    pub fn page_end(&self, len: usize) -> Result<usize, CacheError> {
        self.offset
            .checked_add(len)
            .ok_or(CacheError::WindowOverflow {
                offset: self.offset,
                len,
            })
    }

    /// Extract the window from field call arguments.
    ///
    /// Missing or null `offset`/`limit` read as 0. Anything that is not a
    /// non-negative integer is rejected.
    pub fn from_args(args: &FieldArgs) -> Result<Self, CacheError> {
        Ok(Self {
            offset: window_arg(args, OFFSET_ARG)?,
            limit: window_arg(args, LIMIT_ARG)?,
        })
    }
}

fn window_arg(args: &FieldArgs, name: &str) -> Result<usize, CacheError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| CacheError::invalid_argument(name, value)),
    }
}

/// Cached state of one paginated field for one set of key arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedList<T> {
    /// Items by absolute position; `None` marks a hole
    pub items: Vec<Option<T>>,
    /// Server-reported total, as of the latest response that carried one
    pub total: Option<u64>,
    /// Other top-level properties of the latest response
    pub passthrough: Map<String, Value>,
}

impl<T> Default for PaginatedList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: None,
            passthrough: Map::new(),
        }
    }
}

impl<T> PaginatedList<T> {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of positions, holes included
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when no position has been written
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item at an absolute position, if fetched
    pub fn get(&self, position: usize) -> Option<&T> {
        self.items.get(position).and_then(Option::as_ref)
    }

    /// Number of unfetched positions below `len()`
    pub fn hole_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_none()).count()
    }

    /// True when any position below `len()` is unfetched
    pub fn has_holes(&self) -> bool {
        self.items.iter().any(Option::is_none)
    }

    /// True when `window` reaches past the stored positions into ones the
    /// list may still have.
    ///
    /// With a known total the list cannot extend beyond it; without one any
    /// position past the stored length may exist.
    pub fn missing_tail(&self, window: PageWindow) -> bool {
        let len = self.items.len();
        let end = window.end();
        if window.limit == 0 || end <= len {
            return false;
        }
        match self.total {
            Some(total) => len < end.min(usize::try_from(total).unwrap_or(usize::MAX)),
            None => true,
        }
    }

    /// Iterate over fetched items with their absolute positions
    pub fn present(&self) -> impl Iterator<Item = (usize, &T)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.as_ref().map(|item| (i, item)))
    }
}

/// One page as returned by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResponse<T> {
    /// Items of the page, `None` when the response did not select the list
    pub items: Option<Vec<T>>,
    /// Total count, `None` when the response did not carry one
    pub total: Option<u64>,
    /// Other top-level properties of the response
    pub passthrough: Map<String, Value>,
}

impl<T> PageResponse<T> {
    /// Create a response carrying a page of items and a total
    pub fn new(items: Vec<T>, total: Option<u64>) -> Self {
        Self {
            items: Some(items),
            total,
            passthrough: Map::new(),
        }
    }

    /// Create a response that only carries a total
    pub fn count_only(total: u64) -> Self {
        Self {
            items: None,
            total: Some(total),
            passthrough: Map::new(),
        }
    }

    /// Attach extra top-level properties
    pub fn with_passthrough(mut self, passthrough: Map<String, Value>) -> Self {
        self.passthrough = passthrough;
        self
    }
}

/// Project a window out of a snapshot.
///
/// Returns `None` when nothing is cached. The window is clamped to the
/// stored length, so reading past the end yields a shorter list; interior
/// holes are kept as holes.
pub fn read_page<T: Clone>(
    snapshot: Option<&PaginatedList<T>>,
    window: PageWindow,
) -> Option<PaginatedList<T>> {
    let snapshot = snapshot?;
    let len = snapshot.items.len();
    let start = window.offset.min(len);
    let end = window.end().min(len);

    Some(PaginatedList {
        items: snapshot.items[start..end].to_vec(),
        total: snapshot.total,
        passthrough: snapshot.passthrough.clone(),
    })
}

/// Merge a fetched page into a snapshot.
///
/// - An absent response leaves `existing` untouched.
/// - Items are written at `offset + j`, padding with holes where needed. An
///   empty page never extends the list.
/// - A short page (`len < limit`) ends the list: everything past
///   `offset + len` is dropped.
/// - The incoming total wins when present, otherwise the existing one is kept.
///
/// The list grows to `offset + len` positions, so callers bound the window
/// first ([`FieldPolicy::merge`](crate::FieldPolicy::merge) rejects ends that
/// overflow, [`FieldCache::write`](crate::FieldCache::write) also enforces
/// `max_window_end`). A page whose end overflows `usize` is dropped here.
pub fn merge_page<T>(
    existing: Option<PaginatedList<T>>,
    incoming: Option<PageResponse<T>>,
    window: PageWindow,
) -> Option<PaginatedList<T>> {
    let Some(incoming) = incoming else {
        return existing;
    };

    let (mut items, existing_total) = match existing {
        Some(list) => (list.items, list.total),
        None => (Vec::new(), None),
    };

    if let Some(page) = incoming.items {
        let written = page.len();
        match window.page_end(written) {
            Ok(end) => {
                if written > 0 {
                    if items.len() < end {
                        items.resize_with(end, || None);
                    }
                    for (slot, item) in items[window.offset..end].iter_mut().zip(page) {
                        *slot = Some(item);
                    }
                }
                if written < window.limit {
                    items.truncate(end);
                }
            }
            Err(err) => warn!("Dropping page: {}", err),
        }
    }

    Some(PaginatedList {
        items,
        total: incoming.total.or(existing_total),
        passthrough: incoming.passthrough,
    })
}

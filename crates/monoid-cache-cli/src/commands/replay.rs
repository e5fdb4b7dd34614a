//! Replay command - Apply recorded page fetches and reads to a fresh cache
//!
//! A script is a JSON document of steps:
//!
//! ```json
//! {
//!   "steps": [
//!     { "op": "write", "type": "Workspace", "id": "ws1", "field": "jobs",
//!       "args": { "offset": 0, "limit": 2, "jobType": "scan" },
//!       "response": { "jobs": [{ "__typename": "Job", "id": "j1" }], "numJobs": 1 } },
//!     { "op": "read", "type": "Workspace", "id": "ws1", "field": "jobs",
//!       "args": { "offset": 0, "limit": 2, "jobType": "scan" } },
//!     { "op": "evict", "type": "Workspace", "id": "ws1", "field": "jobs",
//!       "args": { "jobType": "scan" } },
//!     { "op": "clear" }
//!   ]
//! }
//! ```
//!
//! Every read prints one result line.

use std::path::PathBuf;

use anyhow::{Context, Result};
use monoid_cache_config::MonoidCacheConfig;
use monoid_cache_core::{FieldArgs, JsonFieldCache};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{build_cache, print_info};
use crate::GlobalOptions;

/// Arguments for the replay command
#[derive(clap::Args, Debug)]
pub struct ReplayArgs {
    /// Path to the replay script
    script: PathBuf,

    /// Pretty-print each read result
    #[arg(long)]
    pretty: bool,

    /// Print cache metrics after the last step
    #[arg(long)]
    stats: bool,
}

/// A replay script.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayScript {
    pub steps: Vec<ReplayStep>,
}

/// One cache operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ReplayStep {
    /// Merge a field response
    Write {
        #[serde(rename = "type")]
        type_name: String,
        id: String,
        field: String,
        #[serde(default)]
        args: FieldArgs,
        #[serde(default)]
        response: Option<Value>,
    },
    /// Read a window
    Read {
        #[serde(rename = "type")]
        type_name: String,
        id: String,
        field: String,
        #[serde(default)]
        args: FieldArgs,
    },
    /// Drop one snapshot
    Evict {
        #[serde(rename = "type")]
        type_name: String,
        id: String,
        field: String,
        #[serde(default)]
        args: FieldArgs,
    },
    /// Drop every snapshot
    Clear,
}

/// Result of one read step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadResult {
    /// Zero-based index of the step in the script
    pub step: usize,
    /// `miss`, `partial` or `complete`
    pub status: &'static str,
    /// Window in response shape, absent on a miss
    pub data: Option<Value>,
}

/// Execute the replay command
pub fn execute(args: ReplayArgs, config: MonoidCacheConfig, global: &GlobalOptions) -> Result<()> {
    let content = std::fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read script {}", args.script.display()))?;
    let script: ReplayScript = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse script {}", args.script.display()))?;

    let cache = build_cache(&config)?;
    info!(
        "Replaying {} steps from {}",
        script.steps.len(),
        args.script.display()
    );

    for result in run_script(&cache, &script)? {
        let line = if args.pretty {
            serde_json::to_string_pretty(&result)?
        } else {
            serde_json::to_string(&result)?
        };
        println!("{}", line);
    }

    if args.stats {
        let metrics = cache.cache().metrics();
        print_info(
            &format!(
                "snapshots: {}  merges: {}  noop merges: {}  hits: {}  partial: {}  misses: {}  evictions: {}  hit rate: {:.2}",
                cache.cache().snapshot_count(),
                metrics.merges,
                metrics.noop_merges,
                metrics.hits,
                metrics.partial_hits,
                metrics.misses,
                metrics.evictions,
                metrics.hit_rate()
            ),
            global.quiet,
        );
    }
    Ok(())
}

/// Apply every step in order, collecting read results.
///
/// Stops at the first failing step.
pub fn run_script(cache: &JsonFieldCache, script: &ReplayScript) -> Result<Vec<ReadResult>> {
    let mut results = Vec::new();

    for (step, op) in script.steps.iter().enumerate() {
        match op {
            ReplayStep::Write {
                type_name,
                id,
                field,
                args,
                response,
            } => {
                cache
                    .write_response(type_name, id, field, args, response.as_ref())
                    .with_context(|| format!("step {}: write {}:{}.{}", step, type_name, id, field))?;
            }
            ReplayStep::Read {
                type_name,
                id,
                field,
                args,
            } => {
                let outcome = cache
                    .read_json(type_name, id, field, args)
                    .with_context(|| format!("step {}: read {}:{}.{}", step, type_name, id, field))?;
                results.push(ReadResult {
                    step,
                    status: outcome.status(),
                    data: outcome.into_value(),
                });
            }
            ReplayStep::Evict {
                type_name,
                id,
                field,
                args,
            } => {
                let removed = cache
                    .cache()
                    .evict(type_name, id, field, args)
                    .with_context(|| format!("step {}: evict {}:{}.{}", step, type_name, id, field))?;
                debug!("step {}: evict {}:{}.{} removed={}", step, type_name, id, field, removed);
            }
            ReplayStep::Clear => cache.cache().clear(),
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use monoid_cache_core::TypePolicies;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn cache() -> JsonFieldCache {
        JsonFieldCache::new(TypePolicies::console_defaults().unwrap())
    }

    fn script(value: Value) -> ReplayScript {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_steps() {
        let parsed = script(json!({
            "steps": [
                { "op": "write", "type": "Workspace", "id": "ws1", "field": "requests",
                  "args": { "offset": 0, "limit": 1 }, "response": null },
                { "op": "read", "type": "Workspace", "id": "ws1", "field": "requests" },
                { "op": "clear" }
            ]
        }));

        assert_eq!(parsed.steps.len(), 3);
        match &parsed.steps[0] {
            ReplayStep::Write { args, response, .. } => {
                assert_eq!(args.len(), 2);
                assert!(response.is_none());
            }
            other => panic!("expected write, got {:?}", other),
        }
        match &parsed.steps[1] {
            ReplayStep::Read { args, .. } => assert!(args.is_empty()),
            other => panic!("expected read, got {:?}", other),
        }
        assert!(matches!(parsed.steps[2], ReplayStep::Clear));
    }

    #[test]
    fn test_unknown_op_rejected() {
        let result: Result<ReplayScript, _> =
            serde_json::from_value(json!({ "steps": [{ "op": "flush" }] }));
        assert!(result.is_err());
    }

    #[test]
    fn test_run_script_pages_and_reads() {
        let cache = cache();
        let parsed = script(json!({
            "steps": [
                { "op": "read", "type": "Workspace", "id": "ws1", "field": "requests",
                  "args": { "offset": 0, "limit": 2 } },
                { "op": "write", "type": "Workspace", "id": "ws1", "field": "requests",
                  "args": { "offset": 2, "limit": 2 },
                  "response": { "requests": [
                      { "__typename": "Request", "id": "r3" },
                      { "__typename": "Request", "id": "r4" }
                  ], "numRequests": 4 } },
                { "op": "read", "type": "Workspace", "id": "ws1", "field": "requests",
                  "args": { "offset": 0, "limit": 4 } },
                { "op": "write", "type": "Workspace", "id": "ws1", "field": "requests",
                  "args": { "offset": 0, "limit": 2 },
                  "response": { "requests": [
                      { "__typename": "Request", "id": "r1" },
                      { "__typename": "Request", "id": "r2" }
                  ], "numRequests": 4 } },
                { "op": "read", "type": "Workspace", "id": "ws1", "field": "requests",
                  "args": { "offset": 0, "limit": 4 } }
            ]
        }));

        let results = run_script(&cache, &parsed).unwrap();
        assert_eq!(results.len(), 3);

        assert_eq!(results[0].step, 0);
        assert_eq!(results[0].status, "miss");
        assert_eq!(results[0].data, None);

        assert_eq!(results[1].step, 2);
        assert_eq!(results[1].status, "partial");
        assert_eq!(
            results[1].data,
            Some(json!({
                "requests": [
                    null,
                    null,
                    { "__ref": "Request:r3" },
                    { "__ref": "Request:r4" }
                ],
                "numRequests": 4
            }))
        );

        assert_eq!(results[2].step, 4);
        assert_eq!(results[2].status, "complete");
    }

    #[test]
    fn test_run_script_evict_and_clear() {
        let cache = cache();
        let write = |id: &str| {
            json!({ "op": "write", "type": "Workspace", "id": id, "field": "requests",
                    "args": { "offset": 0, "limit": 1 },
                    "response": { "requests": [{ "__typename": "Request", "id": "r1" }],
                                  "numRequests": 1 } })
        };
        let read = |id: &str| {
            json!({ "op": "read", "type": "Workspace", "id": id, "field": "requests",
                    "args": { "offset": 0, "limit": 1 } })
        };
        let parsed = script(json!({
            "steps": [
                write("ws1"),
                write("ws2"),
                { "op": "evict", "type": "Workspace", "id": "ws1", "field": "requests" },
                read("ws1"),
                read("ws2"),
                { "op": "clear" },
                read("ws2")
            ]
        }));

        let statuses: Vec<&str> = run_script(&cache, &parsed)
            .unwrap()
            .iter()
            .map(|r| r.status)
            .collect();
        assert_eq!(statuses, vec!["miss", "complete", "miss"]);
    }

    #[test]
    fn test_run_script_reports_failing_step() {
        let cache = cache();
        let parsed = script(json!({
            "steps": [
                { "op": "clear" },
                { "op": "read", "type": "Workspace", "id": "ws1", "field": "silos" }
            ]
        }));

        let err = run_script(&cache, &parsed).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("step 1"));
        assert!(message.contains("Workspace.silos"));
    }
}

//! Policies command - List the effective field policies

use anyhow::Result;
use monoid_cache_config::MonoidCacheConfig;
use serde::Serialize;

use super::build_policies;

/// Arguments for the policies command
#[derive(clap::Args, Debug)]
pub struct PoliciesArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// One registered field policy
#[derive(Debug, Clone, Serialize)]
pub struct PolicyRow {
    #[serde(rename = "type")]
    pub type_name: String,
    pub field: String,
    pub field_name: String,
    pub count_name: String,
    pub key_args: Vec<String>,
}

/// Execute the policies command
pub fn execute(args: PoliciesArgs, config: MonoidCacheConfig) -> Result<()> {
    let policies = build_policies(&config)?;
    let rows: Vec<PolicyRow> = policies
        .iter()
        .map(|(type_name, field, policy)| PolicyRow {
            type_name: type_name.to_string(),
            field: field.to_string(),
            field_name: policy.field_name().to_string(),
            count_name: policy.count_name().to_string(),
            key_args: policy.key_args().to_vec(),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{:<18} {:<18} {:<20} {:<16} KEY ARGS",
        "TYPE", "FIELD", "LIST", "COUNT"
    );
    for row in &rows {
        let key_args = if row.key_args.is_empty() {
            "-".to_string()
        } else {
            row.key_args.join(",")
        };
        println!(
            "{:<18} {:<18} {:<20} {:<16} {}",
            row.type_name, row.field, row.field_name, row.count_name, key_args
        );
    }
    Ok(())
}

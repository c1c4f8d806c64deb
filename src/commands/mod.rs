pub mod groups;
pub mod run;

use anyhow::Result;

use crate::cli::{Cli, GroupingArgs};
use crate::config::Config;

/// Configuration from `--config` (or the defaults), before command-specific overrides.
fn base_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::from_json_file(path),
        None => Ok(Config::default()),
    }
}

fn apply_grouping(config: &mut Config, args: &GroupingArgs) {
    if let Some(policy) = args.policy { config.policy = policy.into() }
    if let Some(sr1) = args.sr1 { config.sr1 = sr1 }
    if let Some(sr2) = args.sr2 { config.sr2 = sr2 }
}

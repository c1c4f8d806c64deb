use anyhow::{bail, Result};

use crate::cli::{Cli, RunArgs};
use crate::config::Config;
use crate::pipeline;
use crate::report::Messages;
use crate::store::ShapefileWorkspace;

/// Configuration for a `run` invocation: the config file, overridden by the arguments.
pub fn config(cli: &Cli, args: &RunArgs) -> Result<Config> {
    let mut config = super::base_config(cli)?;
    config.workspace = args.workspace.clone();
    config.input_dir = args.input_dir.clone();
    config.csv_file = args.csv_file.clone();
    config.reference = args.reference.clone();
    if let Some(threshold) = args.y_threshold { config.y_threshold = threshold }
    if args.reference_srid.is_some() { config.reference_srid = args.reference_srid }
    super::apply_grouping(&mut config, &args.grouping);
    Ok(config)
}

pub fn run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let config = config(cli, args)?;
    if !config.y_threshold.is_finite() { bail!("[run] Y threshold must be a finite number"); }

    log::info!(
        "[run] workspace={} csv={} reference={} policy={:?}",
        config.workspace.display(),
        config.csv_path().display(),
        config.reference,
        config.policy
    );

    let mut store = ShapefileWorkspace::open(&config.workspace, config.spatial_references())?;
    let summary = pipeline::run(&mut store, &config, Messages::default())?;

    if cli.verbose > 0 {
        println!(
            "{} rows ({} skipped), {} groups, {} polygons, {} too small",
            summary.rows, summary.skipped, summary.groups, summary.build.polygons, summary.build.too_small
        );
    }
    Ok(())
}

use anyhow::Result;

use crate::cli::{Cli, GroupsArgs};
use crate::pipeline::read_groups;

pub fn run(cli: &Cli, args: &GroupsArgs) -> Result<()> {
    let mut config = super::base_config(cli)?;
    config.input_dir = args.csv.parent().map(|p| p.to_path_buf()).unwrap_or_default();
    config.csv_file = args.csv.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    if let Some(threshold) = args.y_threshold { config.y_threshold = threshold }
    super::apply_grouping(&mut config, &args.grouping);

    let grouping = read_groups(&config)?;
    for group in &grouping.groups {
        let status = if group.can_build_polygon() { "polygon" } else { "skipped" };
        println!(
            "{}\t{}\t{}\t{} point(s)\t{status}",
            group.permit,
            config.class_name(group.bucket),
            config.srid_for(group.bucket),
            group.len()
        );
    }
    println!("{} rows ({} skipped), {} groups", grouping.rows, grouping.skipped, grouping.groups.len());
    Ok(())
}

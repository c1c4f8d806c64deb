use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

use crate::config::GroupingPolicy;

/// Build mining permit polygons and report their overlap with existing authorizations
#[derive(Parser, Debug)]
#[command(name = "minepermit", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON configuration file; command-line arguments override its values
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the whole pipeline: read, group, build polygons, report overlaps
    Run(RunArgs),

    /// Read and group a CSV file without writing anything
    Groups(GroupsArgs),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
pub enum PolicyArg { Keyed, Streaming }

impl From<PolicyArg> for GroupingPolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Keyed => GroupingPolicy::KeyedBucket,
            PolicyArg::Streaming => GroupingPolicy::Streaming,
        }
    }
}

#[derive(Args, Debug)]
pub struct GroupingArgs {
    /// Grouping policy
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Spatial reference for points with Y below the threshold
    #[arg(long)]
    pub sr1: Option<u32>,

    /// Spatial reference for points with Y at or above the threshold
    #[arg(long)]
    pub sr2: Option<u32>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Workspace directory holding the feature classes (created if missing)
    #[arg(value_hint = ValueHint::DirPath)]
    pub workspace: PathBuf,

    /// Directory containing the CSV file
    #[arg(value_hint = ValueHint::DirPath)]
    pub input_dir: PathBuf,

    /// CSV file name, relative to the input directory
    pub csv_file: String,

    /// Reference authorization layer: a feature class of the workspace or a .shp path
    pub reference: String,

    /// Y coordinate separating the two spatial references
    pub y_threshold: Option<f64>,

    /// Spatial reference of the reference layer when it does not record one
    #[arg(long)]
    pub reference_srid: Option<u32>,

    #[command(flatten)]
    pub grouping: GroupingArgs,
}

#[derive(Args, Debug)]
pub struct GroupsArgs {
    /// Input CSV file
    #[arg(value_hint = ValueHint::FilePath)]
    pub csv: PathBuf,

    /// Y coordinate separating the two spatial references
    #[arg(long)]
    pub y_threshold: Option<f64>,

    #[command(flatten)]
    pub grouping: GroupingArgs,
}

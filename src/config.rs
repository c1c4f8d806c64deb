use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::geom::{SpatialReferenceDef, SpatialReferences};
use crate::permit::SpatialBucket;

/// Expected header of the boundary-point CSV file.
pub const CSV_HEADER: [&str; 4] = ["BORNE", "X", "Y", "NUM_PM"];

/// Name of the permit-number attribute on the output polygons.
pub const PERMIT_FIELD: &str = "NUM_PM";

/// How coordinate rows are turned into permit groups.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingPolicy {
    /// Group by (permit number, spatial bucket); rows may come in any order.
    #[default]
    KeyedBucket,
    /// Group contiguous runs of the same permit number under one fixed spatial reference.
    Streaming,
}

/// Run configuration, passed explicitly to every stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feature store location (a directory of shapefiles).
    pub workspace: PathBuf,
    pub input_dir: PathBuf,
    pub csv_file: String,
    /// Reference authorization layer: a feature class name in the workspace or a `.shp` path.
    pub reference: String,
    /// Spatial reference of the reference layer when it is not recorded in the workspace catalog.
    pub reference_srid: Option<u32>,
    pub y_threshold: f64,
    /// Spatial reference for points with Y below the threshold (also the streaming policy's fixed one).
    pub sr1: u32,
    /// Spatial reference for points with Y at or above the threshold.
    pub sr2: u32,
    pub policy: GroupingPolicy,
    pub base_name: String,
    pub merged_name: String,
    pub intersect_name: String,
    /// Extra spatial reference definitions on top of the built-in ones.
    pub spatial_references: Vec<SpatialReferenceDef>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("PM.gdb"),
            input_dir: PathBuf::from("."),
            csv_file: "permi.csv".to_string(),
            reference: "SSM_AUTORISATIONS".to_string(),
            reference_srid: None,
            y_threshold: 300_000.0,
            sr1: 102191,
            sr2: 102192,
            policy: GroupingPolicy::KeyedBucket,
            base_name: "minepermit".to_string(),
            merged_name: "Merged_Permits".to_string(),
            intersect_name: "SSM_INT_PERMIT".to_string(),
            spatial_references: Vec::new(),
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file; missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("[config] Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("[config] Invalid config file: {}", path.display()))
    }

    /// Full path of the input CSV file.
    pub fn csv_path(&self) -> PathBuf { self.input_dir.join(&self.csv_file) }

    /// Pick the spatial bucket for a point from its Y coordinate.
    #[inline]
    pub fn bucket_for(&self, y: f64) -> SpatialBucket {
        if y < self.y_threshold { SpatialBucket::Sr1 } else { SpatialBucket::Sr2 }
    }

    /// Spatial reference id of a bucket; `None` is the streaming policy's single class.
    pub fn srid_for(&self, bucket: Option<SpatialBucket>) -> u32 {
        match bucket {
            Some(SpatialBucket::Sr2) => self.sr2,
            Some(SpatialBucket::Sr1) | None => self.sr1,
        }
    }

    /// Output feature class name of a bucket.
    pub fn class_name(&self, bucket: Option<SpatialBucket>) -> String {
        match bucket {
            None => self.base_name.clone(),
            Some(bucket) => format!("{}_{}", self.base_name, bucket.suffix()),
        }
    }

    /// Every polygon output this configuration can produce, cleared before a run.
    pub fn polygon_outputs(&self) -> Vec<String> {
        vec![
            self.class_name(None),
            self.class_name(Some(SpatialBucket::Sr1)),
            self.class_name(Some(SpatialBucket::Sr2)),
            self.merged_name.clone(),
        ]
    }

    /// Built-in spatial references plus the configured extras.
    pub fn spatial_references(&self) -> SpatialReferences {
        let mut registry = SpatialReferences::builtin();
        for def in &self.spatial_references {
            registry.insert(def.clone());
        }
        registry
    }
}

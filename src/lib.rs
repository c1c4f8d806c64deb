#![doc = "Mining permit polygons from boundary-point CSV files"]
pub mod cli;
pub mod commands;
mod common;
pub mod config;
pub mod error;
pub mod geom;
pub mod io;
pub mod permit;
pub mod pipeline;
pub mod report;
pub mod store;

#[doc(inline)]
pub use config::{Config, GroupingPolicy};

#[doc(inline)]
pub use error::PermitError;

#[doc(inline)]
pub use permit::{PermitGroup, PermitNumber, PolygonRecord, SpatialBucket};

#[doc(inline)]
pub use store::{FeatureStore, MemoryStore, ShapefileWorkspace};

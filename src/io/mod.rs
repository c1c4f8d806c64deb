//! Format-specific reading and writing.
//!
//! - `csv` - semicolon-delimited boundary-point files
//! - `shp` - shapefiles backing the workspace and the reference layer

pub mod csv;
pub mod shp;

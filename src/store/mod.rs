//! Feature stores: the narrow interface the pipeline drives instead of a GIS toolkit.
//!
//! A store holds named feature classes. Geometry work (selection,
//! intersection, merge) is done on loaded [`Layer`]s by `crate::geom`, so a
//! store only has to create, fill, load and persist classes.

mod memory;
mod workspace;

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::config::PERMIT_FIELD;
use crate::geom::{self, AttributeValue, Field, GeometryKind, Layer, SpatialReferences};
use crate::io::shp::read_layer;
use crate::permit::PolygonRecord;

pub use memory::MemoryStore;
pub use workspace::ShapefileWorkspace;

/// Attribute values of a permit polygon for the schema of `layer`.
fn polygon_values(layer: &Layer, record: &PolygonRecord) -> Result<Vec<AttributeValue>> {
    if let Some(srid) = layer.srid {
        if srid != record.srid {
            bail!(
                "[store] polygon of permit {} is in spatial reference {}, but {} uses {}",
                record.permit, record.srid, layer.name, srid
            );
        }
    }
    Ok(layer.fields.iter()
        .map(|field| match field.name.as_str() {
            PERMIT_FIELD => AttributeValue::Number(record.permit.value()),
            _ => AttributeValue::Null,
        })
        .collect())
}

pub trait FeatureStore {
    /// Spatial references available for transformations in this store.
    fn spatial_references(&self) -> &SpatialReferences;

    fn exists(&self, name: &str) -> bool;

    /// Remove a feature class; returns whether it existed.
    fn delete(&mut self, name: &str) -> Result<bool>;

    /// Create an empty feature class, replacing any class of the same name.
    fn create_feature_class(&mut self, name: &str, kind: GeometryKind, srid: u32, fields: Vec<Field>) -> Result<()>;

    /// Append a permit polygon to a polygon class; returns the new FID.
    fn insert_polygon(&mut self, name: &str, record: &PolygonRecord) -> Result<u32>;

    fn load(&self, name: &str) -> Result<Layer>;

    /// Store a whole layer under its own name, replacing any existing class.
    fn save(&mut self, layer: Layer) -> Result<()>;

    /// Persist pending inserts.
    fn flush(&mut self) -> Result<()>;

    /// Load a layer for analysis, from a class of this store or else from a shapefile path.
    /// `srid` fills in the spatial reference when the source does not record one.
    fn make_feature_layer(&self, source: &str, srid: Option<u32>) -> Result<Layer> {
        let mut layer = if self.exists(source) {
            self.load(source)?
        } else {
            let path = Path::new(source);
            if !path.exists() {
                bail!("[store] reference layer not found: {source}");
            }
            let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or(source);
            read_layer(path, name, None, srid)
                .with_context(|| format!("[store] Failed to load reference layer {source}"))?
        };
        if layer.srid.is_none() { layer.srid = srid }
        Ok(layer)
    }

    /// Merge classes into a new class named `output`, reprojecting to the first input's reference.
    fn merge(&mut self, inputs: &[&str], output: &str) -> Result<Layer> {
        let layers = inputs.iter().map(|name| self.load(name)).collect::<Result<Vec<_>>>()?;
        let merged = geom::merge(&layers.iter().collect::<Vec<_>>(), output, self.spatial_references())?;
        self.save(merged.clone())?;
        Ok(merged)
    }

    /// Features of `input` intersecting at least one polygon of class `overlay`.
    fn select_by_location(&self, input: &Layer, overlay: &str) -> Result<Vec<usize>> {
        let overlay = self.load(overlay)?;
        geom::select_by_location(input, &overlay, self.spatial_references())
    }

    /// Point intersection of `input` with class `overlay`, saved as class `output`.
    /// Returns the number of output points.
    fn intersect(&mut self, input: &Layer, overlay: &str, output: &str) -> Result<usize> {
        let overlay = self.load(overlay)?;
        let result = geom::intersect(input, &overlay, output, self.spatial_references())?;
        let count = result.len();
        self.save(result)?;
        Ok(count)
    }
}

use std::collections::HashMap;

use anyhow::Result;

use crate::error::PermitError;
use crate::geom::{Field, GeometryKind, Layer, SpatialReferences};
use crate::permit::PolygonRecord;
use super::{polygon_values, FeatureStore};

/// Feature store kept entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    layers: HashMap<String, Layer>,
    registry: SpatialReferences,
}

impl MemoryStore {
    pub fn new(registry: SpatialReferences) -> Self {
        Self { layers: HashMap::new(), registry }
    }

    /// Names of the stored classes, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names = self.layers.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new(SpatialReferences::builtin()) }
}

impl FeatureStore for MemoryStore {
    fn spatial_references(&self) -> &SpatialReferences { &self.registry }

    fn exists(&self, name: &str) -> bool { self.layers.contains_key(name) }

    fn delete(&mut self, name: &str) -> Result<bool> {
        Ok(self.layers.remove(name).is_some())
    }

    fn create_feature_class(&mut self, name: &str, kind: GeometryKind, srid: u32, fields: Vec<Field>) -> Result<()> {
        self.layers.insert(name.to_string(), Layer::new(name, kind, Some(srid), fields));
        Ok(())
    }

    fn insert_polygon(&mut self, name: &str, record: &PolygonRecord) -> Result<u32> {
        let layer = self.layers.get_mut(name)
            .ok_or_else(|| PermitError::MissingFeatureClass(name.to_string()))?;
        let values = polygon_values(layer, record)?;
        layer.push(record.polygon.clone().into(), values)
    }

    fn load(&self, name: &str) -> Result<Layer> {
        Ok(self.layers.get(name)
            .cloned()
            .ok_or_else(|| PermitError::MissingFeatureClass(name.to_string()))?)
    }

    fn save(&mut self, layer: Layer) -> Result<()> {
        self.layers.insert(layer.name.clone(), layer);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> { Ok(()) }
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;
    use crate::config::PERMIT_FIELD;
    use crate::geom::{AttributeValue, FieldType};
    use crate::permit::PermitNumber;

    fn record(permit: f64, srid: u32) -> PolygonRecord {
        PolygonRecord {
            permit: PermitNumber::new(permit).unwrap(),
            polygon: polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)],
            srid,
        }
    }

    #[test]
    fn insert_fills_permit_field() {
        let mut store = MemoryStore::default();
        store.create_feature_class("pm", GeometryKind::Polygon, 102191, vec![Field::new(PERMIT_FIELD, FieldType::Number)]).unwrap();
        assert_eq!(store.insert_polygon("pm", &record(100.0, 102191)).unwrap(), 0);

        let layer = store.load("pm").unwrap();
        assert_eq!(layer.value(&layer.features[0], PERMIT_FIELD), Some(&AttributeValue::Number(100.0)));
    }

    #[test]
    fn insert_rejects_other_reference() {
        let mut store = MemoryStore::default();
        store.create_feature_class("pm", GeometryKind::Polygon, 102191, vec![]).unwrap();
        assert!(store.insert_polygon("pm", &record(1.0, 102192)).is_err());
    }

    #[test]
    fn insert_into_missing_class_fails() {
        let mut store = MemoryStore::default();
        let err = store.insert_polygon("nope", &record(1.0, 102191)).unwrap_err();
        assert!(matches!(err.downcast_ref::<PermitError>(), Some(PermitError::MissingFeatureClass(_))));
    }

    #[test]
    fn create_replaces_existing_class() {
        let mut store = MemoryStore::default();
        store.create_feature_class("pm", GeometryKind::Polygon, 102191, vec![]).unwrap();
        store.insert_polygon("pm", &record(1.0, 102191)).unwrap();
        store.create_feature_class("pm", GeometryKind::Polygon, 102191, vec![]).unwrap();
        assert!(store.load("pm").unwrap().is_empty());
        assert!(store.delete("pm").unwrap());
        assert!(!store.delete("pm").unwrap());
    }
}

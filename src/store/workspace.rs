use std::{collections::{BTreeMap, BTreeSet, HashMap}, fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::common::{ensure_dir_exists, write_atomic};
use crate::error::PermitError;
use crate::geom::{Field, GeometryKind, Layer, SpatialReferences};
use crate::io::shp::{delete_shapefile, read_layer, write_layer};
use crate::permit::PolygonRecord;
use super::{polygon_values, FeatureStore};

const CATALOG_FILE: &str = "catalog.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ClassEntry {
    kind: GeometryKind,
    srid: Option<u32>,
}

/// Geometry kind and spatial reference of every class, which shapefiles alone don't carry reliably.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Catalog {
    classes: BTreeMap<String, ClassEntry>,
}

/// A directory of shapefiles acting as a geodatabase.
///
/// Each class `name` lives in `<root>/<name>.shp` with its sidecars. Classes
/// being filled are held in memory and written by [`FeatureStore::flush`].
#[derive(Debug)]
pub struct ShapefileWorkspace {
    root: PathBuf,
    catalog: Catalog,
    cache: HashMap<String, Layer>,
    dirty: BTreeSet<String>,
    registry: SpatialReferences,
}

impl ShapefileWorkspace {
    /// Open (creating if needed) a workspace directory.
    pub fn open(root: &Path, registry: SpatialReferences) -> Result<Self> {
        ensure_dir_exists(root)?;

        let catalog_path = root.join(CATALOG_FILE);
        let catalog = if catalog_path.exists() {
            let text = fs::read_to_string(&catalog_path)
                .with_context(|| format!("[store::workspace] Failed to read {}", catalog_path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("[store::workspace] Corrupt catalog {}", catalog_path.display()))?
        } else {
            Catalog::default()
        };

        Ok(Self { root: root.to_path_buf(), catalog, cache: HashMap::new(), dirty: BTreeSet::new(), registry })
    }

    #[inline] pub fn root(&self) -> &Path { &self.root }

    /// Path of the `.shp` file of a class.
    pub fn class_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.shp"))
    }

    fn save_catalog(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.catalog)
            .context("[store::workspace] Failed to serialize catalog")?;
        write_atomic(&self.root.join(CATALOG_FILE), &json)
    }

    fn write_class(&self, layer: &Layer) -> Result<()> {
        let wkt = layer.srid
            .and_then(|srid| self.registry.get(srid).ok())
            .and_then(|def| def.wkt.as_deref());
        write_layer(&self.class_path(&layer.name), layer, wkt)
    }

    fn cached_mut(&mut self, name: &str) -> Result<&mut Layer> {
        if !self.cache.contains_key(name) {
            let layer = self.load(name)?;
            self.cache.insert(name.to_string(), layer);
        }
        self.cache.get_mut(name)
            .ok_or_else(|| PermitError::MissingFeatureClass(name.to_string()).into())
    }
}

impl FeatureStore for ShapefileWorkspace {
    fn spatial_references(&self) -> &SpatialReferences { &self.registry }

    fn exists(&self, name: &str) -> bool {
        self.cache.contains_key(name) || self.catalog.classes.contains_key(name) || self.class_path(name).exists()
    }

    fn delete(&mut self, name: &str) -> Result<bool> {
        let cached = self.cache.remove(name).is_some();
        self.dirty.remove(name);
        let cataloged = self.catalog.classes.remove(name).is_some();
        let on_disk = delete_shapefile(&self.class_path(name))?;
        if cataloged { self.save_catalog()? }

        let existed = cached || cataloged || on_disk;
        if existed {
            log::debug!("[store::workspace] deleted {name}");
        }
        Ok(existed)
    }

    fn create_feature_class(&mut self, name: &str, kind: GeometryKind, srid: u32, fields: Vec<Field>) -> Result<()> {
        self.delete(name)?;
        self.catalog.classes.insert(name.to_string(), ClassEntry { kind, srid: Some(srid) });
        self.save_catalog()?;
        self.cache.insert(name.to_string(), Layer::new(name, kind, Some(srid), fields));
        self.dirty.insert(name.to_string());
        log::debug!("[store::workspace] created {kind} class {name} (srid {srid})");
        Ok(())
    }

    fn insert_polygon(&mut self, name: &str, record: &PolygonRecord) -> Result<u32> {
        let layer = self.cached_mut(name)?;
        let values = polygon_values(layer, record)?;
        let fid = layer.push(record.polygon.clone().into(), values)?;
        self.dirty.insert(name.to_string());
        Ok(fid)
    }

    fn load(&self, name: &str) -> Result<Layer> {
        if let Some(layer) = self.cache.get(name) {
            return Ok(layer.clone());
        }

        let path = self.class_path(name);
        if !path.exists() {
            return Err(PermitError::MissingFeatureClass(name.to_string()).into());
        }
        let entry = self.catalog.classes.get(name);
        read_layer(&path, name, entry.map(|e| e.kind), entry.and_then(|e| e.srid))
    }

    fn save(&mut self, layer: Layer) -> Result<()> {
        let name = layer.name.clone();
        self.delete(&name)?;
        self.write_class(&layer)?;
        self.catalog.classes.insert(name.clone(), ClassEntry { kind: layer.kind, srid: layer.srid });
        self.save_catalog()?;
        self.cache.insert(name, layer);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for name in std::mem::take(&mut self.dirty) {
            if let Some(layer) = self.cache.get(&name) {
                self.write_class(layer)?;
                log::debug!("[store::workspace] wrote {} features to {}", layer.len(), self.class_path(&name).display());
            }
        }
        Ok(())
    }
}

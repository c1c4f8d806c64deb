use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use geo::{Coord, Geometry, MapCoords};
use proj4rs::{proj::Proj as Proj4, transform::transform};
use serde::{Deserialize, Serialize};

use crate::error::PermitError;
use super::Layer;

/// A coordinate system the pipeline knows how to transform and describe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialReferenceDef {
    pub srid: u32,
    pub name: String,
    /// PROJ.4 definition used for coordinate transformation.
    pub proj4: String,
    /// ESRI WKT written to `.prj` sidecar files, when known.
    #[serde(default)]
    pub wkt: Option<String>,
    /// Coordinates are lon/lat degrees rather than projected meters.
    #[serde(default)]
    pub geographic: bool,
}

const NORD_MAROC_PROJ4: &str = "+proj=lcc +lat_1=33.3 +lat_0=33.3 +lon_0=-5.4 +k_0=0.999625769 \
    +x_0=500000 +y_0=300000 +a=6378249.2 +b=6356515 +towgs84=31,146,47,0,0,0,0 +units=m +no_defs";

const SUD_MAROC_PROJ4: &str = "+proj=lcc +lat_1=29.7 +lat_0=29.7 +lon_0=-5.4 +k_0=0.999615596 \
    +x_0=500000 +y_0=300000 +a=6378249.2 +b=6356515 +towgs84=31,146,47,0,0,0,0 +units=m +no_defs";

const NORD_MAROC_WKT: &str = "PROJCS[\"Nord_Maroc_Degree\",GEOGCS[\"GCS_Merchich_Degree\",\
    DATUM[\"D_Merchich\",SPHEROID[\"Clarke_1880_IGN\",6378249.2,293.46602]],PRIMEM[\"Greenwich\",0.0],\
    UNIT[\"Degree\",0.0174532925199433]],PROJECTION[\"Lambert_Conformal_Conic\"],\
    PARAMETER[\"False_Easting\",500000.0],PARAMETER[\"False_Northing\",300000.0],\
    PARAMETER[\"Central_Meridian\",-5.4],PARAMETER[\"Standard_Parallel_1\",33.3],\
    PARAMETER[\"Scale_Factor\",0.999625769],PARAMETER[\"Latitude_Of_Origin\",33.3],UNIT[\"Meter\",1.0]]";

const SUD_MAROC_WKT: &str = "PROJCS[\"Sud_Maroc_Degree\",GEOGCS[\"GCS_Merchich_Degree\",\
    DATUM[\"D_Merchich\",SPHEROID[\"Clarke_1880_IGN\",6378249.2,293.46602]],PRIMEM[\"Greenwich\",0.0],\
    UNIT[\"Degree\",0.0174532925199433]],PROJECTION[\"Lambert_Conformal_Conic\"],\
    PARAMETER[\"False_Easting\",500000.0],PARAMETER[\"False_Northing\",300000.0],\
    PARAMETER[\"Central_Meridian\",-5.4],PARAMETER[\"Standard_Parallel_1\",29.7],\
    PARAMETER[\"Scale_Factor\",0.999615596],PARAMETER[\"Latitude_Of_Origin\",29.7],UNIT[\"Meter\",1.0]]";

const WGS84_WKT: &str = "GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",\
    SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],PRIMEM[\"Greenwich\",0.0],\
    UNIT[\"Degree\",0.0174532925199433]]";

/// Registry of spatial reference definitions, keyed by numeric id.
#[derive(Debug, Clone, Default)]
pub struct SpatialReferences {
    defs: HashMap<u32, SpatialReferenceDef>,
}

impl SpatialReferences {
    /// The regional Moroccan Lambert zones (ESRI and EPSG codes) and WGS 84.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        let projected = |srid: u32, name: &str, proj4: &str, wkt: Option<&str>| SpatialReferenceDef {
            srid,
            name: name.to_string(),
            proj4: proj4.to_string(),
            wkt: wkt.map(str::to_string),
            geographic: false,
        };
        registry.insert(projected(102191, "Nord_Maroc_Degree", NORD_MAROC_PROJ4, Some(NORD_MAROC_WKT)));
        registry.insert(projected(102192, "Sud_Maroc_Degree", SUD_MAROC_PROJ4, Some(SUD_MAROC_WKT)));
        registry.insert(projected(26191, "Merchich / Nord Maroc", NORD_MAROC_PROJ4, None));
        registry.insert(projected(26192, "Merchich / Sud Maroc", SUD_MAROC_PROJ4, None));
        registry.insert(SpatialReferenceDef {
            srid: 4326,
            name: "WGS 84".to_string(),
            proj4: "+proj=longlat +datum=WGS84 +no_defs".to_string(),
            wkt: Some(WGS84_WKT.to_string()),
            geographic: true,
        });
        registry
    }

    /// Add or replace a definition.
    pub fn insert(&mut self, def: SpatialReferenceDef) {
        self.defs.insert(def.srid, def);
    }

    pub fn get(&self, srid: u32) -> Result<&SpatialReferenceDef, PermitError> {
        self.defs.get(&srid).ok_or(PermitError::UnknownSpatialReference(srid))
    }

    /// Build a transformer between two registered spatial references.
    pub fn transformer(&self, from: u32, to: u32) -> Result<Transformer> {
        let build = |def: &SpatialReferenceDef| {
            Proj4::from_proj_string(&def.proj4)
                .with_context(|| anyhow!("failed to build PROJ.4 for {}: {}", def.srid, def.proj4))
        };
        let (from, to) = (self.get(from)?, self.get(to)?);

        Ok(Transformer {
            from: build(from)?,
            to: build(to)?,
            from_geographic: from.geographic,
            to_geographic: to.geographic,
        })
    }
}

/// Coordinate transformation between two spatial references.
pub struct Transformer {
    from: Proj4,
    to: Proj4,
    from_geographic: bool,
    to_geographic: bool,
}

impl Transformer {
    /// Transform one coordinate; geographic systems take and return degrees.
    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let mut point = if self.from_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };
        transform(&self.from, &self.to, &mut point)
            .with_context(|| format!("CRS transform failed at ({}, {})", coord.x, coord.y))?;

        Ok(if self.to_geographic {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        })
    }

    pub fn transform(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>> {
        geometry.try_map_coords(|coord| self.transform_coord(coord))
    }
}

/// Copy of `layer` expressed in `srid`. Layers with no known reference are
/// assumed to already be in `srid` and are only relabelled.
pub fn reproject_layer(layer: &Layer, srid: u32, registry: &SpatialReferences) -> Result<Layer> {
    let mut out = layer.clone();
    out.srid = Some(srid);

    let Some(from) = layer.srid.filter(|&from| from != srid) else { return Ok(out) };
    let transformer = registry.transformer(from, srid)?;
    for feature in &mut out.features {
        feature.geometry = transformer.transform(&feature.geometry)
            .with_context(|| format!("[geom::proj] failed to reproject {} feature {}", layer.name, feature.fid))?;
    }
    Ok(out)
}

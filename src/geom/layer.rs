use std::fmt;

use anyhow::{ensure, Result};
use geo::{Geometry, MultiPolygon};
use serde::{Deserialize, Serialize};

use crate::error::PermitError;

/// Geometry type shared by every feature of a feature class.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind { Point, Multipoint, Polyline, Polygon }

impl GeometryKind {
    /// Kind a geometry would be stored as, if any.
    pub fn of(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Point(_) => Some(Self::Point),
            Geometry::MultiPoint(_) => Some(Self::Multipoint),
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => Some(Self::Polyline),
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => Some(Self::Polygon),
            Geometry::GeometryCollection(_) => None,
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Point => "point",
            Self::Multipoint => "multipoint",
            Self::Polyline => "polyline",
            Self::Polygon => "polygon",
        };
        f.write_str(name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType { Text, Number, Logical }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self { name: name.into(), ty }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Text(String),
    Number(f64),
    Logical(bool),
}

impl AttributeValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub fid: u32,
    pub geometry: Geometry<f64>,
    pub values: Vec<AttributeValue>, // One per field of the owning layer
}

/// In-memory feature class: schema, spatial reference and rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub kind: GeometryKind,
    pub srid: Option<u32>,
    pub fields: Vec<Field>,
    pub features: Vec<Feature>,
}

impl Layer {
    pub fn new(name: impl Into<String>, kind: GeometryKind, srid: Option<u32>, fields: Vec<Field>) -> Self {
        Self { name: name.into(), kind, srid, fields, features: Vec::new() }
    }

    #[inline] pub fn len(&self) -> usize { self.features.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.features.is_empty() }

    /// Position of a field in the schema.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Value of a named field on a feature.
    pub fn value<'a>(&self, feature: &'a Feature, name: &str) -> Option<&'a AttributeValue> {
        feature.values.get(self.field_index(name)?)
    }

    /// Append a feature and return its FID; FIDs are sequential from 0.
    pub fn push(&mut self, geometry: Geometry<f64>, values: Vec<AttributeValue>) -> Result<u32> {
        let found = GeometryKind::of(&geometry);
        if found != Some(self.kind) {
            return Err(PermitError::GeometryMismatch {
                class: self.name.clone(),
                expected: self.kind.to_string(),
                found: found.map_or_else(|| "collection".to_string(), |kind| kind.to_string()),
            }.into());
        }
        ensure!(
            values.len() == self.fields.len(),
            "[geom::layer] {} expects {} attribute values, got {}", self.name, self.fields.len(), values.len()
        );

        let fid = self.features.len() as u32;
        self.features.push(Feature { fid, geometry, values });
        Ok(fid)
    }

    /// Polygonal features as MultiPolygons, in feature order.
    pub fn multipolygons(&self) -> Result<Vec<MultiPolygon<f64>>> {
        self.features.iter()
            .map(|feature| match &feature.geometry {
                Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon.clone()])),
                Geometry::MultiPolygon(multi) => Ok(multi.clone()),
                Geometry::Rect(rect) => Ok(MultiPolygon::new(vec![rect.to_polygon()])),
                Geometry::Triangle(triangle) => Ok(MultiPolygon::new(vec![triangle.to_polygon()])),
                _ => Err(PermitError::GeometryMismatch {
                    class: self.name.clone(),
                    expected: GeometryKind::Polygon.to_string(),
                    found: GeometryKind::of(&feature.geometry)
                        .map_or_else(|| "collection".to_string(), |kind| kind.to_string()),
                }.into()),
            })
            .collect()
    }
}

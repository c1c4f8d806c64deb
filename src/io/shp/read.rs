//! Shapefile reading operations.

use std::path::Path;

use anyhow::{bail, Context, Result};
use geo::{Geometry, LineString, MultiLineString, MultiPoint, Point};
use shapefile::{dbase::{self, FieldValue, Record}, Reader, Shape};

use crate::geom::{AttributeValue, Field, FieldType, GeometryKind, Layer};
use super::{geo_coord, shp_to_geo};

/// Read the attribute schema from the `.dbf` next to a shapefile.
fn read_fields(path: &Path) -> Result<Vec<Field>> {
    let dbf = path.with_extension("dbf");
    let reader = dbase::Reader::from_path(&dbf)
        .with_context(|| format!("[io::shp::read] Failed to open attribute table: {}", dbf.display()))?;

    Ok(reader.fields().iter()
        .map(|info| {
            let ty = match info.field_type() {
                dbase::FieldType::Logical => FieldType::Logical,
                dbase::FieldType::Numeric
                | dbase::FieldType::Float
                | dbase::FieldType::Integer
                | dbase::FieldType::Double
                | dbase::FieldType::Currency => FieldType::Number,
                _ => FieldType::Text,
            };
            Field::new(info.name(), ty)
        })
        .collect())
}

fn attribute(value: FieldValue) -> AttributeValue {
    match value {
        FieldValue::Character(Some(s)) => AttributeValue::Text(s),
        FieldValue::Memo(s) => AttributeValue::Text(s),
        FieldValue::Numeric(Some(n)) => AttributeValue::Number(n),
        FieldValue::Float(Some(f)) => AttributeValue::Number(f as f64),
        FieldValue::Integer(i) => AttributeValue::Number(i as f64),
        FieldValue::Double(d) => AttributeValue::Number(d),
        FieldValue::Currency(c) => AttributeValue::Number(c),
        FieldValue::Logical(Some(b)) => AttributeValue::Logical(b),
        FieldValue::Date(Some(d)) => AttributeValue::Text(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day())),
        _ => AttributeValue::Null,
    }
}

/// Convert a shape to a `geo` geometry; null shapes have none.
fn geometry(shape: Shape) -> Result<Option<Geometry<f64>>> {
    let point = |x: f64, y: f64| Point::new(x, y);
    Ok(Some(match shape {
        Shape::NullShape => return Ok(None),
        Shape::Point(p) => point(p.x, p.y).into(),
        Shape::PointM(p) => point(p.x, p.y).into(),
        Shape::PointZ(p) => point(p.x, p.y).into(),
        Shape::Multipoint(mp) => MultiPoint::new(mp.points().iter().map(|p| point(p.x, p.y)).collect()).into(),
        Shape::Polyline(pl) => MultiLineString::new(
            pl.parts().iter()
                .map(|part| part.iter().map(geo_coord).collect::<LineString<f64>>())
                .collect()
        ).into(),
        Shape::Polygon(p) => shp_to_geo(&p).into(),
        other => bail!("[io::shp::read] Unsupported shape type: {:?}", other.shapetype()),
    }))
}

/// Reads a shapefile into a [`Layer`].
///
/// `kind` and `srid` come from the workspace catalog when the file belongs to
/// it; otherwise the kind is taken from the first shape. Null shapes are skipped.
pub fn read_layer(path: &Path, name: &str, kind: Option<GeometryKind>, srid: Option<u32>) -> Result<Layer> {
    let fields = read_fields(path)?;
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("[io::shp::read] Failed to open shapefile: {}", path.display()))?;

    let mut items: Vec<(Geometry<f64>, Record)> = Vec::new();
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result
            .with_context(|| format!("[io::shp::read] Error reading shape+record in {}", path.display()))?;
        match geometry(shape)? {
            Some(geometry) => items.push((geometry, record)),
            None => log::warn!("[io::shp::read] skipping null shape in {}", path.display()),
        }
    }

    let kind = kind
        .or_else(|| items.first().and_then(|(geometry, _)| GeometryKind::of(geometry)))
        .unwrap_or(GeometryKind::Point);

    let mut layer = Layer::new(name, kind, srid, fields);
    for (geometry, record) in items {
        let values = layer.fields.iter()
            .map(|field| record.get(&field.name).cloned().map_or(AttributeValue::Null, attribute))
            .collect();
        layer.push(geometry, values)
            .with_context(|| format!("[io::shp::read] Invalid feature in {}", path.display()))?;
    }
    Ok(layer)
}

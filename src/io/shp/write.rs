//! Shapefile writing operations.

use std::{fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use geo::{Geometry, MultiPolygon};
use shapefile::{
    self as shp,
    dbase::{FieldName, FieldValue, Record, TableWriterBuilder},
    record::EsriShape,
    Writer,
};

use crate::geom::{AttributeValue, Field, FieldType, GeometryKind, Layer};
use super::{geo_to_shp, shp_point};

/// Sidecar files of a shapefile, beside the `.shp` itself.
pub(crate) const SIDECARS: [&str; 4] = ["shx", "dbf", "prj", "cpg"];

fn table_builder(fields: &[Field]) -> Result<TableWriterBuilder> {
    fields.iter().try_fold(TableWriterBuilder::new(), |builder, field| {
        let name = FieldName::try_from(field.name.as_str())
            .map_err(|_| anyhow!("[io::shp::write] Invalid dBase field name: {}", field.name))?;
        Ok(match field.ty {
            FieldType::Text => builder.add_character_field(name, 254),
            FieldType::Number => builder.add_numeric_field(name, 18, 6),
            FieldType::Logical => builder.add_logical_field(name),
        })
    })
}

fn record(fields: &[Field], values: &[AttributeValue]) -> Record {
    let mut record = Record::default();
    for (field, value) in fields.iter().zip(values) {
        let value = match (field.ty, value) {
            (_, AttributeValue::Text(s)) => FieldValue::Character(Some(s.clone())),
            (_, AttributeValue::Number(n)) => FieldValue::Numeric(Some(*n)),
            (_, AttributeValue::Logical(b)) => FieldValue::Logical(Some(*b)),
            (FieldType::Text, AttributeValue::Null) => FieldValue::Character(None),
            (FieldType::Number, AttributeValue::Null) => FieldValue::Numeric(None),
            (FieldType::Logical, AttributeValue::Null) => FieldValue::Logical(None),
        };
        record.insert(field.name.clone(), value);
    }
    record
}

fn write_shapes<S: EsriShape>(path: &Path, layer: &Layer, shapes: Vec<S>) -> Result<()> {
    let mut writer = Writer::from_path(path, table_builder(&layer.fields)?)
        .with_context(|| format!("[io::shp::write] Failed to create shapefile: {}", path.display()))?;
    for (shape, feature) in shapes.iter().zip(&layer.features) {
        writer.write_shape_and_record(shape, &record(&layer.fields, &feature.values))
            .with_context(|| format!("[io::shp::write] Failed to write feature {} to {}", feature.fid, path.display()))?;
    }
    Ok(())
}

fn mismatch(layer: &Layer, geometry: &Geometry<f64>) -> anyhow::Error {
    anyhow!(
        "[io::shp::write] {} layer {} holds a {:?} geometry",
        layer.kind, layer.name, GeometryKind::of(geometry)
    )
}

/// Write a layer as `<path>.shp/.shx/.dbf`, plus a `.prj` when `wkt` is given.
/// Existing files at `path` are replaced.
pub fn write_layer(path: &Path, layer: &Layer, wkt: Option<&str>) -> Result<()> {
    if path.extension().and_then(|e| e.to_str()) != Some("shp") {
        bail!("[io::shp::write] Expected a .shp path, got {}", path.display());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("[io::shp::write] Failed to create directory {}", parent.display()))?;
    }
    delete_shapefile(path)?;

    let geometries = layer.features.iter().map(|f| &f.geometry);
    match layer.kind {
        GeometryKind::Point => {
            let shapes = geometries
                .map(|g| match g {
                    Geometry::Point(p) => Ok(shp_point(p.0)),
                    other => Err(mismatch(layer, other)),
                })
                .collect::<Result<Vec<_>>>()?;
            write_shapes(path, layer, shapes)?;
        }
        GeometryKind::Multipoint => {
            let shapes = geometries
                .map(|g| match g {
                    Geometry::MultiPoint(mp) => Ok(shp::Multipoint::new(mp.iter().map(|p| shp_point(p.0)).collect())),
                    other => Err(mismatch(layer, other)),
                })
                .collect::<Result<Vec<_>>>()?;
            write_shapes(path, layer, shapes)?;
        }
        GeometryKind::Polyline => {
            let shapes = geometries
                .map(|g| {
                    let parts = match g {
                        Geometry::Line(l) => vec![vec![shp_point(l.start), shp_point(l.end)]],
                        Geometry::LineString(ls) => vec![ls.0.iter().copied().map(shp_point).collect()],
                        Geometry::MultiLineString(mls) => mls.iter()
                            .map(|ls| ls.0.iter().copied().map(shp_point).collect())
                            .collect(),
                        other => return Err(mismatch(layer, other)),
                    };
                    Ok(shp::Polyline::with_parts(parts))
                })
                .collect::<Result<Vec<_>>>()?;
            write_shapes(path, layer, shapes)?;
        }
        GeometryKind::Polygon => {
            let shapes = geometries
                .map(|g| match g {
                    Geometry::Polygon(p) => Ok(geo_to_shp(&MultiPolygon::new(vec![p.clone()]))),
                    Geometry::MultiPolygon(mp) => Ok(geo_to_shp(mp)),
                    Geometry::Rect(r) => Ok(geo_to_shp(&MultiPolygon::new(vec![r.to_polygon()]))),
                    Geometry::Triangle(t) => Ok(geo_to_shp(&MultiPolygon::new(vec![t.to_polygon()]))),
                    other => Err(mismatch(layer, other)),
                })
                .collect::<Result<Vec<_>>>()?;
            write_shapes(path, layer, shapes)?;
        }
    }

    if let Some(wkt) = wkt {
        let prj = path.with_extension("prj");
        fs::write(&prj, wkt)
            .with_context(|| format!("[io::shp::write] Failed to write projection file: {}", prj.display()))?;
    }
    Ok(())
}

/// Remove a shapefile and its sidecars. Returns whether the `.shp` existed.
pub fn delete_shapefile(path: &Path) -> Result<bool> {
    let existed = path.exists();
    for file in std::iter::once(path.to_path_buf()).chain(SIDECARS.iter().map(|ext| path.with_extension(ext))) {
        if file.exists() {
            fs::remove_file(&file)
                .with_context(|| format!("[io::shp::write] Failed to delete {}", file.display()))?;
        }
    }
    Ok(existed)
}

#[cfg(test)]
mod tests {
    use geo::{point, polygon};

    use super::*;
    use crate::io::shp::read_layer;

    #[test]
    fn polygon_layer_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minepermit_SR1.shp");

        let mut layer = Layer::new("minepermit_SR1", GeometryKind::Polygon, Some(102191), vec![Field::new("NUM_PM", FieldType::Number)]);
        let ring = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0)];
        layer.push(ring.into(), vec![AttributeValue::Number(100.0)]).unwrap();
        write_layer(&path, &layer, Some("PROJCS[\"test\"]")).unwrap();

        assert!(path.with_extension("prj").exists());
        let back = read_layer(&path, "minepermit_SR1", Some(GeometryKind::Polygon), Some(102191)).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.fields, layer.fields);
        assert_eq!(back.value(&back.features[0], "NUM_PM"), Some(&AttributeValue::Number(100.0)));
        let Geometry::MultiPolygon(mp) = &back.features[0].geometry else { panic!("expected polygons") };
        assert_eq!(mp.0[0].exterior().0.len(), 4);
    }

    #[test]
    fn point_layer_keeps_text_and_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.shp");

        let mut layer = Layer::new("auth", GeometryKind::Point, None, vec![
            Field::new("CODE", FieldType::Text),
            Field::new("AREA", FieldType::Number),
        ]);
        layer.push(point!(x: 1.0, y: 2.0).into(), vec![AttributeValue::Text("A1".into()), AttributeValue::Null]).unwrap();
        write_layer(&path, &layer, None).unwrap();

        let back = read_layer(&path, "auth", None, None).unwrap();
        assert_eq!(back.kind, GeometryKind::Point);
        assert_eq!(back.features[0].geometry, Geometry::Point(point!(x: 1.0, y: 2.0)));
        assert_eq!(back.features[0].values[0], AttributeValue::Text("A1".into()));
        assert_eq!(back.features[0].values[1], AttributeValue::Null);
    }

    #[test]
    fn delete_removes_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.shp");
        let layer = Layer::new("gone", GeometryKind::Point, None, vec![Field::new("ID", FieldType::Number)]);
        write_layer(&path, &layer, Some("GEOGCS[]")).unwrap();

        assert!(delete_shapefile(&path).unwrap());
        for ext in ["shp", "shx", "dbf", "prj"] {
            assert!(!path.with_extension(ext).exists());
        }
        assert!(!delete_shapefile(&path).unwrap());
    }
}

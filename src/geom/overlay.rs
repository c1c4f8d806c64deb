//! Overlay operations between a layer and a set of polygons: selection by
//! location, point intersection and merge.

use std::collections::HashSet;

use anyhow::{bail, Result};
use geo::{
    BooleanOps, BoundingRect, CoordsIter, Geometry, InteriorPoint, Intersects, LineString,
    MultiLineString, MultiPolygon, Point,
};

use super::{reproject_layer, AttributeValue, BoundingBox, Field, FieldType, GeometryKind, Layer, SpatialReferences};

/// dBase field names hold at most 10 characters.
const MAX_FIELD_NAME: usize = 10;

/// Bring `input` into the spatial reference of `overlay` when both are known and differ.
fn aligned(input: &Layer, overlay: &Layer, registry: &SpatialReferences) -> Result<Layer> {
    match (input.srid, overlay.srid) {
        (Some(from), Some(to)) if from != to => reproject_layer(input, to, registry),
        _ => Ok(input.clone()),
    }
}

/// Does a geometry share at least one point with a polygonal area?
fn intersects_area(geometry: &Geometry<f64>, area: &MultiPolygon<f64>) -> bool {
    match geometry {
        Geometry::Point(point) => point.intersects(area),
        Geometry::MultiPoint(points) => points.intersects(area),
        Geometry::Line(line) => line.intersects(area),
        Geometry::LineString(line) => line.intersects(area),
        Geometry::MultiLineString(lines) => lines.intersects(area),
        Geometry::Polygon(polygon) => polygon.intersects(area),
        Geometry::MultiPolygon(polygons) => polygons.intersects(area),
        Geometry::Rect(rect) => rect.to_polygon().intersects(area),
        Geometry::Triangle(triangle) => triangle.to_polygon().intersects(area),
        Geometry::GeometryCollection(collection) => collection.iter().any(|g| intersects_area(g, area)),
    }
}

/// Indices of the overlay polygons intersecting `geometry`, ascending.
fn hits(
    geometry: &Geometry<f64>,
    polygons: &[MultiPolygon<f64>],
    rtree: &rstar::RTree<BoundingBox>,
) -> Vec<usize> {
    let Some(rect) = geometry.bounding_rect() else { return Vec::new() };
    let mut found = rtree.locate_in_envelope_intersecting(&BoundingBox::envelope_of(&rect))
        .map(BoundingBox::idx)
        .filter(|&j| intersects_area(geometry, &polygons[j]))
        .collect::<Vec<_>>();
    found.sort_unstable();
    found
}

/// Select the features of `input` whose geometry intersects at least one
/// polygon of `overlay`. Returns the selected feature positions, ascending.
pub fn select_by_location(input: &Layer, overlay: &Layer, registry: &SpatialReferences) -> Result<Vec<usize>> {
    let input = aligned(input, overlay, registry)?;
    let polygons = overlay.multipolygons()?;
    let rtree = BoundingBox::index(&polygons);

    Ok(input.features.iter().enumerate()
        .filter(|(_, feature)| !hits(&feature.geometry, &polygons, &rtree).is_empty())
        .map(|(i, _)| i)
        .collect())
}

/// Representative points of the contact between a geometry and an area.
///
/// Points keep every member that falls inside; lines and polygons yield one
/// interior point of the shared part, or a shared vertex when they only touch.
fn contact_points(geometry: &Geometry<f64>, area: &MultiPolygon<f64>) -> Vec<Point<f64>> {
    match geometry {
        Geometry::Point(point) => area.intersects(point).then_some(*point).into_iter().collect(),
        Geometry::MultiPoint(points) => points.iter().filter(|p| area.intersects(*p)).copied().collect(),
        Geometry::Line(line) => {
            let lines = MultiLineString::new(vec![LineString::from(vec![line.start, line.end])]);
            contact_on_lines(&lines, area).into_iter().collect()
        }
        Geometry::LineString(line) => contact_on_lines(&MultiLineString::new(vec![line.clone()]), area).into_iter().collect(),
        Geometry::MultiLineString(lines) => contact_on_lines(lines, area).into_iter().collect(),
        Geometry::Polygon(polygon) => contact_on_areas(&MultiPolygon::new(vec![polygon.clone()]), area).into_iter().collect(),
        Geometry::MultiPolygon(polygons) => contact_on_areas(polygons, area).into_iter().collect(),
        Geometry::Rect(rect) => contact_on_areas(&MultiPolygon::new(vec![rect.to_polygon()]), area).into_iter().collect(),
        Geometry::Triangle(triangle) => contact_on_areas(&MultiPolygon::new(vec![triangle.to_polygon()]), area).into_iter().collect(),
        Geometry::GeometryCollection(collection) => collection.iter().flat_map(|g| contact_points(g, area)).collect(),
    }
}

fn contact_on_lines(lines: &MultiLineString<f64>, area: &MultiPolygon<f64>) -> Option<Point<f64>> {
    area.clip(lines, false).interior_point()
        .or_else(|| lines.coords_iter().map(Point::from).find(|p| area.intersects(p)))
        .or_else(|| area.coords_iter().map(Point::from).find(|p| lines.intersects(p)))
}

fn contact_on_areas(polygons: &MultiPolygon<f64>, area: &MultiPolygon<f64>) -> Option<Point<f64>> {
    area.intersection(polygons).interior_point()
        .or_else(|| polygons.coords_iter().map(Point::from).find(|p| area.intersects(p)))
        .or_else(|| area.coords_iter().map(Point::from).find(|p| polygons.intersects(p)))
}

/// Truncate a field name to the dBase limit and make it unique among `taken`.
fn unique_field_name(name: &str, taken: &mut HashSet<String>) -> String {
    let base: String = name.chars().take(MAX_FIELD_NAME).collect();
    let mut candidate = base.clone();
    let mut n = 1;
    while taken.contains(&candidate.to_ascii_uppercase()) {
        let suffix = format!("_{n}");
        let stem: String = base.chars().take(MAX_FIELD_NAME - suffix.len()).collect();
        candidate = format!("{stem}{suffix}");
        n += 1;
    }
    taken.insert(candidate.to_ascii_uppercase());
    candidate
}

/// Intersect `input` with the polygons of `overlay`, producing points.
///
/// One output point per contact point of every (input feature, overlay
/// polygon) pair that intersects. All attributes are joined: `FID_<input>`,
/// the input fields, `FID_<overlay>`, then the overlay fields. The output is
/// expressed in the overlay's spatial reference.
pub fn intersect(input: &Layer, overlay: &Layer, name: &str, registry: &SpatialReferences) -> Result<Layer> {
    let input = aligned(input, overlay, registry)?;
    let polygons = overlay.multipolygons()?;
    let rtree = BoundingBox::index(&polygons);

    let mut taken = HashSet::new();
    let mut fields = vec![Field::new(unique_field_name(&format!("FID_{}", input.name), &mut taken), FieldType::Number)];
    fields.extend(input.fields.iter().map(|f| Field::new(unique_field_name(&f.name, &mut taken), f.ty)));
    fields.push(Field::new(unique_field_name(&format!("FID_{}", overlay.name), &mut taken), FieldType::Number));
    fields.extend(overlay.fields.iter().map(|f| Field::new(unique_field_name(&f.name, &mut taken), f.ty)));

    let mut out = Layer::new(name, GeometryKind::Point, overlay.srid, fields);
    for feature in &input.features {
        for j in hits(&feature.geometry, &polygons, &rtree) {
            let other = &overlay.features[j];
            for point in contact_points(&feature.geometry, &polygons[j]) {
                let mut values = Vec::with_capacity(out.fields.len());
                values.push(AttributeValue::Number(feature.fid as f64));
                values.extend(feature.values.iter().cloned());
                values.push(AttributeValue::Number(other.fid as f64));
                values.extend(other.values.iter().cloned());
                out.push(point.into(), values)?;
            }
        }
    }
    Ok(out)
}

/// Merge layers of the same geometry kind into one.
///
/// Every layer is reprojected to the spatial reference of the first. The
/// schema is the union of the input fields by name, in first-seen order;
/// fields missing from a layer are null. FIDs are renumbered.
pub fn merge(layers: &[&Layer], name: &str, registry: &SpatialReferences) -> Result<Layer> {
    let Some(first) = layers.first() else { bail!("[geom::overlay] nothing to merge into {name}") };

    let mut fields: Vec<Field> = Vec::new();
    for layer in layers {
        if layer.kind != first.kind {
            bail!("[geom::overlay] cannot merge {} layer {} into {} layer {}", layer.kind, layer.name, first.kind, first.name);
        }
        for field in &layer.fields {
            if !fields.iter().any(|f| f.name == field.name) {
                fields.push(field.clone());
            }
        }
    }

    let mut out = Layer::new(name, first.kind, first.srid, fields);
    for layer in layers {
        let layer = match first.srid {
            Some(srid) => reproject_layer(layer, srid, registry)?,
            None => (*layer).clone(),
        };
        let mapping = out.fields.iter().map(|f| layer.field_index(&f.name)).collect::<Vec<_>>();
        for feature in layer.features {
            let values = mapping.iter()
                .map(|i| i.map_or(AttributeValue::Null, |i| feature.values[i].clone()))
                .collect();
            out.push(feature.geometry, values)?;
        }
    }
    Ok(out)
}

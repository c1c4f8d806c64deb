//! Shapefile format reading and writing, converting to and from `geo` types.

mod read;
mod write;

pub use read::*;
pub use write::*;

use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile as shp;

#[inline]
fn geo_coord(point: &shp::Point) -> Coord<f64> { Coord { x: point.x, y: point.y } }

#[inline]
fn shp_point(coord: Coord<f64>) -> shp::Point { shp::Point { x: coord.x, y: coord.y } }

/// Convert shapefile::Polygon to geo::MultiPolygon<f64>.
/// Each outer ring starts a polygon; the inner rings that follow are its holes.
pub(crate) fn shp_to_geo(polygon: &shp::Polygon) -> MultiPolygon<f64> {
    let mut polys: Vec<Polygon<f64>> = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes: Vec<LineString<f64>> = Vec::new();

    for ring in polygon.rings() {
        let ls = ring.points().iter().map(geo_coord).collect::<LineString<f64>>();
        match ring {
            shp::PolygonRing::Outer(_) => {
                // flush previous polygon
                if let Some(ext) = exterior.replace(ls) {
                    polys.push(Polygon::new(ext, std::mem::take(&mut holes)));
                }
            }
            shp::PolygonRing::Inner(_) => holes.push(ls),
        }
    }
    if let Some(ext) = exterior {
        polys.push(Polygon::new(ext, holes));
    }

    MultiPolygon(polys)
}

/// Convert geo::MultiPolygon<f64> to shapefile::Polygon.
///
/// Vertices are written in their stored order; the shapefile crate closes
/// open rings and winds outer rings clockwise as the format requires.
pub(crate) fn geo_to_shp(mp: &MultiPolygon<f64>) -> shp::Polygon {
    let mut rings: Vec<shp::PolygonRing<shp::Point>> = Vec::new();
    for poly in &mp.0 {
        rings.push(shp::PolygonRing::Outer(poly.exterior().0.iter().copied().map(shp_point).collect()));
        for hole in poly.interiors() {
            rings.push(shp::PolygonRing::Inner(hole.0.iter().copied().map(shp_point).collect()));
        }
    }
    shp::Polygon::with_rings(rings)
}

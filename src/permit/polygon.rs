use geo::{LineString, Polygon};

use crate::config::Config;
use super::{PermitGroup, PermitNumber};

/// Fewest vertices that make a polygon.
pub const MIN_POLYGON_POINTS: usize = 3;

/// A permit polygon ready to be inserted into its feature class.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonRecord {
    pub permit: PermitNumber,
    pub polygon: Polygon<f64>,
    pub srid: u32,
}

impl PolygonRecord {
    /// Number of distinct ring vertices (the closing vertex is not counted).
    pub fn num_vertices(&self) -> usize {
        self.polygon.exterior().0.len().saturating_sub(1)
    }
}

/// Build the polygon of a group, or `None` when it has fewer than three points.
///
/// The ring follows the group's point order as-is and is closed by repeating
/// the first point; nothing is reordered, deduplicated or validated.
pub fn build_polygon(group: &PermitGroup, config: &Config) -> Option<PolygonRecord> {
    if !group.can_build_polygon() { return None }

    Some(PolygonRecord {
        permit: group.permit,
        polygon: Polygon::new(LineString::from(group.points.clone()), vec![]),
        srid: config.srid_for(group.bucket),
    })
}

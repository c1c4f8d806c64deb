//! Permit domain: parsed coordinate rows, permit groups and polygon records.

mod group;
mod polygon;

use std::{fmt, hash::{Hash, Hasher}};

use geo::Coord;

pub use group::{group_keyed, group_rows, StreamingGroups};
pub use polygon::{build_polygon, PolygonRecord, MIN_POLYGON_POINTS};

/// A permit number (NUM_PM). Stored as a double, like the attribute it becomes.
///
/// Only finite values are representable and `-0.0` is folded into `0.0`, so
/// bitwise equality and hashing agree with numeric equality.
#[derive(Debug, Clone, Copy)]
pub struct PermitNumber(f64);

impl PermitNumber {
    pub fn new(value: f64) -> Option<Self> {
        if !value.is_finite() { return None }
        Some(Self(if value == 0.0 { 0.0 } else { value }))
    }

    #[inline] pub fn value(self) -> f64 { self.0 }
}

impl PartialEq for PermitNumber {
    fn eq(&self, other: &Self) -> bool { self.0.to_bits() == other.0.to_bits() }
}

impl Eq for PermitNumber {}

impl Hash for PermitNumber {
    fn hash<H: Hasher>(&self, state: &mut H) { self.0.to_bits().hash(state) }
}

impl fmt::Display for PermitNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fract() == 0.0 && self.0.abs() < 1e15 {
            write!(f, "{:.0}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// One of the two regional spatial references, chosen from a point's Y coordinate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpatialBucket { Sr1, Sr2 }

impl SpatialBucket {
    /// Suffix appended to the output feature class name.
    pub fn suffix(self) -> &'static str {
        match self {
            SpatialBucket::Sr1 => "SR1",
            SpatialBucket::Sr2 => "SR2",
        }
    }
}

/// A parsed boundary point.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateRow {
    pub borne: String, // Boundary marker id, kept for diagnostics only
    pub x: f64,
    pub y: f64,
    pub permit: PermitNumber,
}

impl CoordinateRow {
    #[inline] pub fn coord(&self) -> Coord<f64> { Coord { x: self.x, y: self.y } }
}

/// Ordered boundary points of one permit (within one spatial bucket, for the keyed policy).
#[derive(Debug, Clone, PartialEq)]
pub struct PermitGroup {
    pub permit: PermitNumber,
    /// `None` when the streaming policy put every group under the single fixed reference.
    pub bucket: Option<SpatialBucket>,
    pub points: Vec<Coord<f64>>,
}

impl PermitGroup {
    pub fn new(permit: PermitNumber, bucket: Option<SpatialBucket>) -> Self {
        Self { permit, bucket, points: Vec::new() }
    }

    #[inline] pub fn len(&self) -> usize { self.points.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.points.is_empty() }

    /// A group only yields a polygon when it has at least three vertices.
    #[inline] pub fn can_build_polygon(&self) -> bool { self.points.len() >= MIN_POLYGON_POINTS }
}

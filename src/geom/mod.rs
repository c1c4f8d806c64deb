mod bbox;
mod layer;
mod overlay;
mod proj;

use bbox::BoundingBox;
pub use layer::{AttributeValue, Feature, Field, FieldType, GeometryKind, Layer};
pub use overlay::{intersect, merge, select_by_location};
pub use proj::{reproject_layer, SpatialReferenceDef, SpatialReferences, Transformer};

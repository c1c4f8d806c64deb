//! The four pipeline stages: read, group, build polygons, report overlaps.

use anyhow::{Context, Result};

use crate::config::{Config, PERMIT_FIELD};
use crate::geom::{Field, FieldType, GeometryKind, Layer};
use crate::io::csv::read_coordinates;
use crate::permit::{build_polygon, group_rows, PermitGroup};
use crate::report::Messages;
use crate::store::FeatureStore;

/// Groups read from the CSV file, with row accounting.
#[derive(Debug, Clone)]
pub struct Grouping {
    pub groups: Vec<PermitGroup>,
    pub rows: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Feature classes created, in creation order.
    pub classes: Vec<String>,
    pub polygons: usize,
    /// Groups left out for having fewer than three points.
    pub too_small: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpatialOutcome {
    /// Class the reference layer was compared against (the merged set when several classes exist).
    pub overlay: Option<String>,
    /// Reference features intersecting at least one permit polygon.
    pub selected: Option<usize>,
    /// Points written to the intersection output.
    pub intersected: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub rows: usize,
    pub skipped: usize,
    pub groups: usize,
    pub build: BuildOutcome,
    pub spatial: SpatialOutcome,
    pub messages: Messages,
}

/// Stages 1 and 2: read the CSV file and group its rows with the configured policy.
/// A missing file or a wrong header is fatal.
pub fn read_groups(config: &Config) -> Result<Grouping> {
    let path = config.csv_path();
    let mut rows = read_coordinates(&path)?;
    let groups = group_rows(rows.by_ref(), config);
    let skipped = rows.skipped();
    let count = groups.iter().map(PermitGroup::len).sum();

    if skipped > 0 {
        log::debug!("[pipeline] skipped {skipped} malformed rows in {}", path.display());
    }
    Ok(Grouping { groups, rows: count, skipped })
}

/// Stage 3: replace previous outputs, create one class per bucket in use and insert the polygons.
pub fn build_polygons<S: FeatureStore + ?Sized>(
    store: &mut S,
    config: &Config,
    groups: &[PermitGroup],
    messages: &mut Messages,
) -> Result<BuildOutcome> {
    for name in config.polygon_outputs() {
        store.delete(&name)
            .with_context(|| format!("[pipeline] Failed to delete previous output {name}"))?;
    }

    let mut buckets = groups.iter().map(|g| g.bucket).collect::<Vec<_>>();
    buckets.sort_unstable();
    buckets.dedup();

    let mut outcome = BuildOutcome::default();
    for &bucket in &buckets {
        let name = config.class_name(bucket);
        store.create_feature_class(&name, GeometryKind::Polygon, config.srid_for(bucket), vec![Field::new(PERMIT_FIELD, FieldType::Number)])
            .with_context(|| format!("[pipeline] Failed to create feature class {name}"))?;
        outcome.classes.push(name);
    }

    for group in groups {
        let Some(record) = build_polygon(group, config) else {
            log::debug!("[pipeline] permit {} has {} point(s); no polygon", group.permit, group.len());
            outcome.too_small += 1;
            continue;
        };
        let name = config.class_name(group.bucket);
        store.insert_polygon(&name, &record)
            .with_context(|| format!("[pipeline] Failed to insert permit {} into {name}", group.permit))?;
        outcome.polygons += 1;
    }
    store.flush()?;

    messages.info(format!("Polygons created in: {}", outcome.classes.join(", ")));
    Ok(outcome)
}

/// Load the reference layer and pick the polygon set to compare it with,
/// merging the classes when there are several.
fn prepare_overlay<S: FeatureStore + ?Sized>(store: &mut S, config: &Config, classes: &[String]) -> Result<(Layer, String)> {
    let reference = store.make_feature_layer(&config.reference, config.reference_srid)?;
    let overlay = if classes.len() > 1 {
        let inputs = classes.iter().map(String::as_str).collect::<Vec<_>>();
        store.merge(&inputs, &config.merged_name)?;
        config.merged_name.clone()
    } else {
        classes[0].clone()
    };
    Ok((reference, overlay))
}

/// Stage 4: count reference features over the permit polygons, then write their point intersection.
///
/// Failures are reported in `messages` and never abort the run; the
/// intersection is attempted even when the selection failed.
pub fn report_overlaps<S: FeatureStore + ?Sized>(
    store: &mut S,
    config: &Config,
    classes: &[String],
    messages: &mut Messages,
) -> SpatialOutcome {
    let mut outcome = SpatialOutcome::default();
    if classes.is_empty() {
        messages.warning("No polygon feature class was produced; skipping spatial analysis");
        return outcome;
    }

    let prepared = prepare_overlay(store, config, classes);
    match &prepared {
        Ok((reference, overlay)) => {
            outcome.overlay = Some(overlay.clone());
            match store.select_by_location(reference, overlay) {
                Ok(selected) => {
                    messages.info(format!("Selected features: {}", selected.len()));
                    outcome.selected = Some(selected.len());
                }
                Err(e) => messages.error(format!("Spatial selection failed: {e:#}")),
            }
        }
        Err(e) => messages.error(format!("Spatial selection failed: {e:#}")),
    }

    if let Err(e) = store.delete(&config.intersect_name) {
        log::warn!("[pipeline] could not remove previous {}: {e:#}", config.intersect_name);
    }
    let intersected = match &prepared {
        Ok((reference, overlay)) => store.intersect(reference, overlay, &config.intersect_name),
        Err(_) => Err(anyhow::anyhow!("reference layer or permit polygons unavailable")),
    };
    match intersected {
        Ok(count) => {
            messages.info(format!("Intersection succeeded: {count} point(s) written to {}", config.intersect_name));
            outcome.intersected = Some(count);
        }
        Err(e) => messages.error(format!("Intersection failed: {e:#}")),
    }

    outcome
}

/// Run the whole pipeline against `store`.
pub fn run<S: FeatureStore + ?Sized>(store: &mut S, config: &Config, mut messages: Messages) -> Result<RunSummary> {
    let grouping = read_groups(config)?;
    log::info!(
        "[pipeline] {} rows in {} groups ({} malformed rows skipped)",
        grouping.rows, grouping.groups.len(), grouping.skipped
    );

    let build = build_polygons(store, config, &grouping.groups, &mut messages)?;
    let spatial = report_overlaps(store, config, &build.classes, &mut messages);

    Ok(RunSummary {
        rows: grouping.rows,
        skipped: grouping.skipped,
        groups: grouping.groups.len(),
        build,
        spatial,
        messages,
    })
}

#[cfg(test)]
mod tests {
    use geo::{point, polygon, Geometry};

    use super::*;
    use crate::config::GroupingPolicy;
    use crate::permit::{PermitNumber, SpatialBucket};
    use crate::store::MemoryStore;

    fn group(permit: f64, bucket: Option<SpatialBucket>, points: &[(f64, f64)]) -> PermitGroup {
        let mut group = PermitGroup::new(PermitNumber::new(permit).unwrap(), bucket);
        group.points = points.iter().map(|&(x, y)| geo::Coord { x, y }).collect();
        group
    }

    fn reference_layer(srid: u32, points: &[(f64, f64)]) -> Layer {
        let mut layer = Layer::new("SSM_AUTORISATIONS", GeometryKind::Point, Some(srid), vec![Field::new("CODE", FieldType::Text)]);
        for (i, &(x, y)) in points.iter().enumerate() {
            layer.push(Geometry::Point(point!(x: x, y: y)), vec![crate::geom::AttributeValue::Text(format!("A{i}"))]).unwrap();
        }
        layer
    }

    #[test]
    fn build_skips_groups_below_three_points() {
        let config = Config::default();
        let mut store = MemoryStore::default();
        let mut messages = Messages::quiet();
        let groups = vec![
            group(1.0, Some(SpatialBucket::Sr1), &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]),
            group(2.0, Some(SpatialBucket::Sr1), &[(0.0, 0.0), (1.0, 1.0)]),
        ];

        let outcome = build_polygons(&mut store, &config, &groups, &mut messages).unwrap();
        assert_eq!(outcome.classes, vec!["minepermit_SR1".to_string()]);
        assert_eq!(outcome.polygons, 1);
        assert_eq!(outcome.too_small, 1);
        assert_eq!(store.load("minepermit_SR1").unwrap().len(), 1);
        assert_eq!(messages.all()[0].text, "Polygons created in: minepermit_SR1");
    }

    #[test]
    fn build_clears_outputs_of_previous_runs() {
        let mut config = Config::default();
        let mut store = MemoryStore::default();
        let mut messages = Messages::quiet();
        let keyed = vec![
            group(1.0, Some(SpatialBucket::Sr1), &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]),
            group(2.0, Some(SpatialBucket::Sr2), &[(0.0, 4e5), (10.0, 4e5), (10.0, 4.1e5)]),
        ];
        build_polygons(&mut store, &config, &keyed, &mut messages).unwrap();
        store.save(Layer::new("Merged_Permits", GeometryKind::Polygon, Some(102191), vec![])).unwrap();

        config.policy = GroupingPolicy::Streaming;
        let streamed = vec![group(1.0, None, &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)])];
        let outcome = build_polygons(&mut store, &config, &streamed, &mut messages).unwrap();

        assert_eq!(outcome.classes, vec!["minepermit".to_string()]);
        assert_eq!(store.names(), vec!["minepermit"]);
        assert_eq!(store.load("minepermit").unwrap().srid, Some(102191));
    }

    #[test]
    fn overlaps_are_counted_and_intersected() {
        let config = Config::default();
        let mut store = MemoryStore::default();
        let mut messages = Messages::quiet();
        let groups = vec![group(1.0, Some(SpatialBucket::Sr1), &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)])];
        let build = build_polygons(&mut store, &config, &groups, &mut messages).unwrap();
        store.save(reference_layer(102191, &[(5.0, 5.0), (50.0, 50.0)])).unwrap();

        let outcome = report_overlaps(&mut store, &config, &build.classes, &mut messages);
        assert_eq!(outcome.overlay.as_deref(), Some("minepermit_SR1"));
        assert_eq!(outcome.selected, Some(1));
        assert_eq!(outcome.intersected, Some(1));
        assert_eq!(messages.errors().count(), 0);
        assert!(messages.all().iter().any(|m| m.text == "Selected features: 1"));
        assert_eq!(store.load("SSM_INT_PERMIT").unwrap().kind, GeometryKind::Point);
    }

    #[test]
    fn two_buckets_are_merged_before_overlay() {
        let config = Config::default();
        let mut store = MemoryStore::default();
        let mut messages = Messages::quiet();
        let groups = vec![
            group(1.0, Some(SpatialBucket::Sr1), &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]),
            group(2.0, Some(SpatialBucket::Sr2), &[(0.0, 4e5), (10.0, 4e5), (10.0, 4.1e5)]),
        ];
        let build = build_polygons(&mut store, &config, &groups, &mut messages).unwrap();
        store.save(reference_layer(102191, &[(8.0, 1.0)])).unwrap();

        let outcome = report_overlaps(&mut store, &config, &build.classes, &mut messages);
        assert_eq!(outcome.overlay.as_deref(), Some("Merged_Permits"));
        assert_eq!(store.load("Merged_Permits").unwrap().len(), 2);
        assert_eq!(outcome.selected, Some(1));
    }

    #[test]
    fn missing_reference_is_reported_not_fatal() {
        let config = Config { reference: "no/such/layer.shp".to_string(), ..Config::default() };
        let mut store = MemoryStore::default();
        store.create_feature_class("minepermit_SR1", GeometryKind::Polygon, 102191, vec![]).unwrap();
        let mut messages = Messages::quiet();

        let outcome = report_overlaps(&mut store, &config, &["minepermit_SR1".to_string()], &mut messages);
        assert_eq!(outcome, SpatialOutcome::default());
        let errors = messages.errors().map(|m| m.text.clone()).collect::<Vec<_>>();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("Spatial selection failed"));
        assert!(errors[1].starts_with("Intersection failed"));
    }

    #[test]
    fn no_classes_skips_spatial_stage() {
        let mut store = MemoryStore::default();
        let mut messages = Messages::quiet();
        let outcome = report_overlaps(&mut store, &Config::default(), &[], &mut messages);
        assert_eq!(outcome, SpatialOutcome::default());
        assert_eq!(messages.all()[0].level, crate::report::Level::Warning);
    }

    #[test]
    fn polygon_reference_overlaps_permit() {
        let config = Config::default();
        let mut store = MemoryStore::default();
        let mut messages = Messages::quiet();
        let groups = vec![group(1.0, Some(SpatialBucket::Sr1), &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)])];
        let build = build_polygons(&mut store, &config, &groups, &mut messages).unwrap();

        let mut reference = Layer::new("SSM_AUTORISATIONS", GeometryKind::Polygon, Some(102191), vec![]);
        reference.push(Geometry::Polygon(polygon![(x: 5.0, y: 5.0), (x: 20.0, y: 5.0), (x: 20.0, y: 20.0)]), vec![]).unwrap();
        store.save(reference).unwrap();

        let outcome = report_overlaps(&mut store, &config, &build.classes, &mut messages);
        assert_eq!(outcome.selected, Some(1));
        assert_eq!(outcome.intersected, Some(1));
    }
}

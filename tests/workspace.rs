use geo::{point, Geometry};
use tempfile::TempDir;

use minepermit::geom::{AttributeValue, Field, FieldType, GeometryKind, Layer};
use minepermit::io::shp::{read_layer, write_layer};
use minepermit::pipeline;
use minepermit::report::Messages;
use minepermit::{Config, FeatureStore, ShapefileWorkspace};

fn write_inputs(dir: &TempDir) -> Config {
    std::fs::write(
        dir.path().join("permi.csv"),
        "BORNE;X;Y;NUM_PM\n1;0;0;100\n2;10;0;100\n3;10;10;100\n4;0;10;100\n5;50;50;200\n",
    ).unwrap();

    let mut reference = Layer::new("SSM_AUTORISATIONS", GeometryKind::Point, None, vec![Field::new("CODE", FieldType::Text)]);
    for (x, y, code) in [(5.0, 5.0, "A"), (50.0, 50.0, "B"), (2.0, 8.0, "C")] {
        reference.push(Geometry::Point(point!(x: x, y: y)), vec![AttributeValue::Text(code.to_string())]).unwrap();
    }
    let reference_path = dir.path().join("SSM_AUTORISATIONS.shp");
    write_layer(&reference_path, &reference, None).unwrap();

    Config {
        workspace: dir.path().join("PM.gdb"),
        input_dir: dir.path().to_path_buf(),
        reference: reference_path.to_string_lossy().into_owned(),
        reference_srid: Some(102191),
        ..Config::default()
    }
}

#[test]
fn pipeline_writes_shapefiles_to_workspace() {
    let dir = TempDir::new().unwrap();
    let config = write_inputs(&dir);

    let mut store = ShapefileWorkspace::open(&config.workspace, config.spatial_references()).unwrap();
    let summary = pipeline::run(&mut store, &config, Messages::quiet()).unwrap();
    assert_eq!(summary.build.polygons, 1);
    assert_eq!(summary.spatial.selected, Some(2));
    assert_eq!(summary.spatial.intersected, Some(2));

    for file in ["minepermit_SR1.shp", "minepermit_SR1.dbf", "minepermit_SR1.prj", "SSM_INT_PERMIT.shp", "catalog.json"] {
        assert!(config.workspace.join(file).exists(), "missing {file}");
    }

    let polygons = read_layer(&config.workspace.join("minepermit_SR1.shp"), "minepermit_SR1", Some(GeometryKind::Polygon), None).unwrap();
    assert_eq!(polygons.len(), 1);
    assert_eq!(polygons.value(&polygons.features[0], "NUM_PM").and_then(AttributeValue::as_number), Some(100.0));

    let joined = ShapefileWorkspace::open(&config.workspace, config.spatial_references()).unwrap()
        .load("SSM_INT_PERMIT").unwrap();
    assert_eq!(joined.kind, GeometryKind::Point);
    assert_eq!(joined.srid, Some(102191));
    assert_eq!(joined.len(), 2);
}

#[test]
fn rerun_against_same_workspace_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = write_inputs(&dir);

    for _ in 0..2 {
        let mut store = ShapefileWorkspace::open(&config.workspace, config.spatial_references()).unwrap();
        pipeline::run(&mut store, &config, Messages::quiet()).unwrap();
    }

    let store = ShapefileWorkspace::open(&config.workspace, config.spatial_references()).unwrap();
    assert_eq!(store.load("minepermit_SR1").unwrap().len(), 1);
    assert_eq!(store.load("SSM_INT_PERMIT").unwrap().len(), 2);
    assert!(!store.exists("Merged_Permits"));
}

#[test]
fn both_buckets_persist_and_reload() {
    let dir = TempDir::new().unwrap();
    let config = write_inputs(&dir);
    std::fs::write(
        dir.path().join("permi.csv"),
        "BORNE;X;Y;NUM_PM\n1;0;0;100\n2;10;0;100\n3;10;10;100\n4;0;10;100\n5;0;400000;300\n",
    ).unwrap();

    let mut store = ShapefileWorkspace::open(&config.workspace, config.spatial_references()).unwrap();
    let first = pipeline::run(&mut store, &config, Messages::quiet()).unwrap();
    assert_eq!(first.build.classes, vec!["minepermit_SR1".to_string(), "minepermit_SR2".to_string()]);
    assert_eq!(first.build.too_small, 1);
    assert_eq!(first.spatial.overlay.as_deref(), Some("Merged_Permits"));
    assert_eq!((first.spatial.selected, first.spatial.intersected), (Some(2), Some(2)));
    drop(store);

    let store = ShapefileWorkspace::open(&config.workspace, config.spatial_references()).unwrap();
    let sud = store.load("minepermit_SR2").unwrap();
    assert!(sud.is_empty());
    assert_eq!(sud.srid, Some(102192));
    let merged = store.load("Merged_Permits").unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged.srid, Some(102191));
    drop(store);

    let mut store = ShapefileWorkspace::open(&config.workspace, config.spatial_references()).unwrap();
    let second = pipeline::run(&mut store, &config, Messages::quiet()).unwrap();
    assert_eq!(second.spatial, first.spatial);
}

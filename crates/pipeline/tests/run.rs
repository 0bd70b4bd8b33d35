use engine::testing::{ScriptedEngine, ScriptedRow};
use engine::{Cell, EngineError};
use pipeline::{
    DatasetSource, DiscoveryError, FilterRange, InvalidGeometryPolicy, MaterializeError,
    PipelineConfig, PipelineError, run_pipeline,
};
use pretty_assertions::assert_eq;

fn square(x: f64) -> String {
    format!(
        r#"{{"type":"Polygon","coordinates":[[[{x},0],[{x1},0],[{x1},1],[{x},0]]]}}"#,
        x1 = x + 1.0
    )
}

/// Ten rows: classes 1..=8, two unclassified, one without geometry.
fn dataset() -> ScriptedEngine {
    let mut rows: Vec<ScriptedRow> = (1..=8)
        .map(|c| ScriptedRow::new(Some(square(c as f64).as_str()), Some(c)))
        .collect();
    rows.insert(3, ScriptedRow::new(Some(square(100.0).as_str()), None));
    rows.push(ScriptedRow::new(Some(square(200.0).as_str()), None));
    rows.push(ScriptedRow::new(None, Some(4)));
    ScriptedEngine::new(&[("GEOM", "WKB_BLOB"), ("Class_Id", "INTEGER")], rows)
}

fn config() -> PipelineConfig {
    PipelineConfig::new(DatasetSource::new("https://example.test/landcover.parquet"))
}

fn classes(m: &pipeline::Materialized) -> Vec<Option<i32>> {
    m.collection.features.iter().map(|f| f.class_val).collect()
}

#[tokio::test]
async fn keeps_in_range_and_unclassified_rows_in_source_order() {
    let engine = dataset();
    let out = run_pipeline(&engine, &config(), FilterRange::new(2, 5))
        .await
        .expect("run");
    assert_eq!(
        classes(&out),
        vec![Some(2), Some(3), None, Some(4), Some(5), None]
    );
    assert_eq!(out.skipped, 0);
}

#[tokio::test]
async fn inverted_range_keeps_only_unclassified_rows() {
    let engine = dataset();
    let out = run_pipeline(&engine, &config(), FilterRange::new(10, 5))
        .await
        .expect("run");
    assert_eq!(classes(&out), vec![None, None]);
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let engine = dataset();
    let first = run_pipeline(&engine, &config(), FilterRange::new(1, 25))
        .await
        .expect("first");
    let second = run_pipeline(&engine, &config(), FilterRange::new(1, 25))
        .await
        .expect("second");
    assert_eq!(first, second);
    assert_eq!(first.collection.len(), 10);

    let registrations = engine
        .statements()
        .iter()
        .filter(|s| s.starts_with("CREATE OR REPLACE VIEW"))
        .count();
    assert_eq!(registrations, 2);
}

#[tokio::test]
async fn discovery_and_query_follow_the_resolved_roles() {
    let engine = dataset();
    run_pipeline(&engine, &config(), FilterRange::new(5, 10))
        .await
        .expect("run");
    let statements = engine.statements();
    assert_eq!(
        &statements[..4],
        &["INSTALL httpfs", "LOAD httpfs", "INSTALL spatial", "LOAD spatial"]
    );
    let feature_sql = statements.last().expect("feature query");
    assert!(feature_sql.contains("ST_GeomFromWKB(\"geom\")"));
    assert!(feature_sql.contains("TRY_CAST(\"class_id\" AS INTEGER)"));
    assert!(feature_sql.contains("class_val IS NULL OR class_val BETWEEN 5 AND 10"));
}

#[tokio::test]
async fn connection_is_closed_after_success_and_failure() {
    let engine = dataset();
    run_pipeline(&engine, &config(), FilterRange::new(1, 2))
        .await
        .expect("run");
    assert_eq!((engine.opened(), engine.closed()), (1, 1));

    engine.fail_on("ST_AsGeoJSON");
    let err = run_pipeline(&engine, &config(), FilterRange::new(1, 2))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Query(EngineError::Statement { .. })));
    assert_eq!((engine.opened(), engine.closed()), (2, 2));
}

#[tokio::test]
async fn unmatched_columns_fail_at_execution_not_discovery() {
    let engine = ScriptedEngine::new(
        &[("shape", "GEOMETRY"), ("landcover", "INTEGER")],
        vec![ScriptedRow::new(Some(square(0.0).as_str()), Some(1))],
    );
    let err = run_pipeline(&engine, &config(), FilterRange::new(1, 25))
        .await
        .unwrap_err();
    let PipelineError::Query(EngineError::Statement { message, .. }) = err else {
        panic!("expected query failure, got {err:?}");
    };
    assert!(message.contains("\"geometry\""));
    assert_eq!(engine.closed(), 1);
}

#[tokio::test]
async fn remote_registration_failure_is_a_discovery_error() {
    let engine = dataset();
    engine.fail_on("CREATE OR REPLACE VIEW");
    let err = run_pipeline(&engine, &config(), FilterRange::new(1, 25))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Discovery(DiscoveryError::RegisterView { .. })
    ));
    assert_eq!(engine.closed(), 1);
}

#[tokio::test]
async fn metadata_cache_failure_is_tolerated() {
    let engine = dataset();
    engine.fail_on("enable_http_metadata_cache");
    let out = run_pipeline(&engine, &config(), FilterRange::new(1, 1))
        .await
        .expect("run");
    assert_eq!(classes(&out), vec![Some(1), None, None]);
}

#[tokio::test]
async fn invalid_geometry_follows_policy() {
    let rows = vec![
        ScriptedRow::new(Some("{broken"), Some(3)),
        ScriptedRow::new(Some(square(0.0).as_str()), Some(4)),
    ];
    let engine = ScriptedEngine::new(&[("geometry", "GEOMETRY"), ("class", "INTEGER")], rows);

    let out = run_pipeline(&engine, &config(), FilterRange::new(1, 25))
        .await
        .expect("skip policy");
    assert_eq!((classes(&out), out.skipped), (vec![Some(4)], 1));

    let mut abort = config();
    abort.invalid_geometry = InvalidGeometryPolicy::Abort;
    let err = run_pipeline(&engine, &abort, FilterRange::new(1, 25))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Materialize(MaterializeError::Geometry { row: 0, .. })
    ));
    assert_eq!(engine.closed(), 2);
}

#[tokio::test]
async fn non_integer_class_cells_are_rejected() {
    let engine = ScriptedEngine::new(
        &[("geometry", "GEOMETRY"), ("class", "VARCHAR")],
        vec![ScriptedRow {
            geojson: Some(square(0.0)),
            class_val: Cell::from("forest"),
        }],
    );
    let err = run_pipeline(&engine, &config(), FilterRange::new(1, 25))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Materialize(MaterializeError::Shape(_))));
}

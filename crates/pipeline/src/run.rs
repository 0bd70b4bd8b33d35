use engine::{Connection, Engine};
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::materialize::{InvalidGeometryPolicy, Materialized, materialize};
use crate::query::{FilterRange, build_query};
use crate::schema::{DatasetSource, RoleCandidates, discover};

/// Everything a run needs besides the engine and the filter range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub source: DatasetSource,
    pub candidates: RoleCandidates,
    pub invalid_geometry: InvalidGeometryPolicy,
}

impl PipelineConfig {
    pub fn new(source: DatasetSource) -> Self {
        Self {
            source,
            candidates: RoleCandidates::default(),
            invalid_geometry: InvalidGeometryPolicy::default(),
        }
    }
}

/// One pipeline run: connect, discover, build, execute, materialize, close.
///
/// The connection is closed on every path out of the run. A failure to close
/// is logged; it never replaces the run's own outcome.
pub async fn run_pipeline(
    engine: &dyn Engine,
    config: &PipelineConfig,
    range: FilterRange,
) -> Result<Materialized, PipelineError> {
    let mut conn = engine.connect().await.map_err(PipelineError::Connect)?;
    let conn_id = conn.id();
    debug!(conn_id, ?range, "pipeline run started");

    let outcome = run_on_connection(conn.as_mut(), config, range).await;

    if let Err(err) = conn.close().await {
        warn!(conn_id, "failed to close connection: {err}");
    }

    match &outcome {
        Ok(m) => info!(
            conn_id,
            features = m.collection.len(),
            skipped = m.skipped,
            "pipeline run finished"
        ),
        Err(err) => warn!(conn_id, "pipeline run failed: {err}"),
    }
    outcome
}

async fn run_on_connection(
    conn: &mut dyn Connection,
    config: &PipelineConfig,
    range: FilterRange,
) -> Result<Materialized, PipelineError> {
    let schema = discover(conn, &config.source).await?;
    let roles = config.candidates.resolve(&schema);
    let query = build_query(&config.source.view_name, &roles, range);
    materialize(conn, &query, config.invalid_geometry).await
}

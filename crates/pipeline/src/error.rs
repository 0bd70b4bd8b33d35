use engine::EngineError;
use formats::GeoJsonError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("failed to load engine extension {name}: {source}")]
    Capability { name: String, source: EngineError },

    #[error("failed to register view {view}: {source}")]
    RegisterView { view: String, source: EngineError },

    #[error("failed to introspect view {view}: {source}")]
    Introspect { view: String, source: EngineError },

    #[error("view {0} has no columns")]
    EmptySchema(String),

    #[error("unexpected information schema shape: {0}")]
    Shape(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MaterializeError {
    #[error("unexpected result shape: {0}")]
    Shape(String),

    #[error("invalid geometry in row {row}: {source}")]
    Geometry { row: usize, source: GeoJsonError },
}

/// Failure of one pipeline run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("engine connection failed: {0}")]
    Connect(EngineError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("query failed: {0}")]
    Query(EngineError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

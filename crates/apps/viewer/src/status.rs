use std::fmt;

use pipeline::PipelineError;

/// User-facing status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Initializing,
    EngineReady,
    Querying,
    Loaded { features: usize, skipped: usize },
    EngineFailed(String),
    DiscoveryFailed(String),
    QueryFailed(String),
    MaterializeFailed(String),
}

impl Status {
    pub fn from_pipeline_error(err: &PipelineError) -> Self {
        match err {
            PipelineError::Connect(e) => Status::EngineFailed(e.to_string()),
            PipelineError::Discovery(e) => Status::DiscoveryFailed(e.to_string()),
            PipelineError::Query(e) => Status::QueryFailed(e.to_string()),
            PipelineError::Materialize(e) => Status::MaterializeFailed(e.to_string()),
        }
    }

    /// No further change is expected without new input.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Status::Initializing | Status::EngineReady | Status::Querying
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Status::EngineFailed(_)
                | Status::DiscoveryFailed(_)
                | Status::QueryFailed(_)
                | Status::MaterializeFailed(_)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Initializing => write!(f, "initializing"),
            Status::EngineReady => write!(f, "engine ready"),
            Status::Querying => write!(f, "querying"),
            Status::Loaded {
                features,
                skipped: 0,
            } => write!(f, "loaded {features} features"),
            Status::Loaded { features, skipped } => {
                write!(f, "loaded {features} features ({skipped} skipped)")
            }
            Status::EngineFailed(msg) => write!(f, "engine error: {msg}"),
            Status::DiscoveryFailed(msg) => write!(f, "dataset discovery failed: {msg}"),
            Status::QueryFailed(msg) => write!(f, "query failed: {msg}"),
            Status::MaterializeFailed(msg) => write!(f, "could not build features: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Status;
    use engine::EngineError;
    use pipeline::{DiscoveryError, MaterializeError, PipelineError};

    #[test]
    fn renders_lifecycle_messages() {
        assert_eq!(Status::Initializing.to_string(), "initializing");
        assert_eq!(Status::EngineReady.to_string(), "engine ready");
        assert_eq!(Status::Querying.to_string(), "querying");
        assert_eq!(
            Status::Loaded {
                features: 12,
                skipped: 0
            }
            .to_string(),
            "loaded 12 features"
        );
        assert_eq!(
            Status::Loaded {
                features: 12,
                skipped: 2
            }
            .to_string(),
            "loaded 12 features (2 skipped)"
        );
    }

    #[test]
    fn each_failure_class_has_its_own_status() {
        let engine = EngineError::WorkerGone;
        let cases = [
            PipelineError::Connect(engine.clone()),
            PipelineError::Discovery(DiscoveryError::EmptySchema("features".to_string())),
            PipelineError::Query(engine),
            PipelineError::Materialize(MaterializeError::Shape("x".to_string())),
        ];
        let statuses: Vec<Status> = cases.iter().map(Status::from_pipeline_error).collect();
        assert!(matches!(statuses[0], Status::EngineFailed(_)));
        assert!(matches!(statuses[1], Status::DiscoveryFailed(_)));
        assert!(matches!(statuses[2], Status::QueryFailed(_)));
        assert!(matches!(statuses[3], Status::MaterializeFailed(_)));
        assert!(statuses.iter().all(|s| s.is_failure() && s.is_terminal()));
        assert!(!Status::Querying.is_terminal());
    }
}

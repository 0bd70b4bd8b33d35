//! Reactive controller: owns the viewer state and re-runs the pipeline when
//! the filter range or the engine changes.
//!
//! Every run gets a [`RunId`]. A finished run is applied only if its id is
//! still the latest one issued, so results of superseded runs are dropped no
//! matter in which order runs complete. In-flight runs are never aborted; the
//! engine work finishes and its result is discarded.

use std::sync::Arc;

use engine::{Bootstrap, EngineHandle};
use formats::FeatureCollection;
use parking_lot::Mutex;
use pipeline::{FilterRange, Materialized, PipelineConfig, PipelineError, run_pipeline};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::status::Status;

/// Identity of a pipeline run; strictly increasing per controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(pub u64);

struct State {
    engine: Option<EngineHandle>,
    range: FilterRange,
    latest: RunId,
    shut_down: bool,
}

struct Inner {
    config: Arc<PipelineConfig>,
    state: Mutex<State>,
    status: watch::Sender<Status>,
    collection: watch::Sender<Option<Arc<FeatureCollection>>>,
}

/// Cheap to clone; clones share state.
///
/// Methods that start runs spawn tokio tasks and must be called from within a
/// tokio runtime.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

impl Controller {
    pub fn new(config: PipelineConfig, range: FilterRange) -> Self {
        let (status, _) = watch::channel(Status::Initializing);
        let (collection, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                config: Arc::new(config),
                state: Mutex::new(State {
                    engine: None,
                    range,
                    latest: RunId(0),
                    shut_down: false,
                }),
                status,
                collection,
            }),
        }
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Status> {
        self.inner.status.subscribe()
    }

    pub fn subscribe_collection(&self) -> watch::Receiver<Option<Arc<FeatureCollection>>> {
        self.inner.collection.subscribe()
    }

    pub fn status(&self) -> Status {
        self.inner.status.borrow().clone()
    }

    pub fn collection(&self) -> Option<Arc<FeatureCollection>> {
        self.inner.collection.borrow().clone()
    }

    pub fn filter(&self) -> FilterRange {
        self.inner.state.lock().range
    }

    pub fn latest_run(&self) -> RunId {
        self.inner.state.lock().latest
    }

    /// Bootstrap the engine in the background. Attempted once, no retry.
    pub fn start(&self, bootstrap: Box<dyn Bootstrap>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            match bootstrap.initialize().await {
                Ok(engine) => {
                    this.engine_ready(engine);
                }
                Err(err) => {
                    error!("engine initialization failed: {err}");
                    this.inner
                        .status
                        .send_replace(Status::EngineFailed(err.to_string()));
                }
            }
        })
    }

    /// Publish a ready engine and run the pipeline for the current range.
    pub fn engine_ready(&self, engine: EngineHandle) -> Option<RunId> {
        let mut state = self.inner.state.lock();
        if state.shut_down {
            return None;
        }
        state.engine = Some(engine);
        info!("engine ready");
        self.inner.status.send_replace(Status::EngineReady);
        self.trigger(&mut state)
    }

    /// Change the filter range. An unchanged range does not start a run.
    pub fn set_filter(&self, range: FilterRange) -> Option<RunId> {
        let mut state = self.inner.state.lock();
        if state.range == range {
            return None;
        }
        state.range = range;
        self.trigger(&mut state)
    }

    /// Stop publishing; results of runs still in flight are discarded.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        state.shut_down = true;
        state.latest = RunId(state.latest.0 + 1);
    }

    fn trigger(&self, state: &mut State) -> Option<RunId> {
        if state.shut_down {
            return None;
        }
        let engine = state.engine.clone()?;
        let run = RunId(state.latest.0 + 1);
        state.latest = run;
        let range = state.range;
        self.inner.status.send_replace(Status::Querying);
        debug!(run = run.0, ?range, "starting pipeline run");

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let outcome = run_pipeline(engine.as_ref(), &inner.config, range).await;
            inner.complete(run, outcome);
        });
        Some(run)
    }
}

impl Inner {
    fn complete(&self, run: RunId, outcome: Result<Materialized, PipelineError>) {
        let state = self.state.lock();
        if state.shut_down || run != state.latest {
            debug!(
                run = run.0,
                latest = state.latest.0,
                "discarding result of superseded run"
            );
            return;
        }

        match outcome {
            Ok(Materialized {
                collection,
                skipped,
            }) => {
                let features = collection.len();
                self.collection.send_replace(Some(Arc::new(collection)));
                self.status.send_replace(Status::Loaded { features, skipped });
            }
            Err(err) => {
                // The previous collection stays published.
                self.status.send_replace(Status::from_pipeline_error(&err));
            }
        }
    }
}

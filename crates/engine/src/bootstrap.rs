use std::future::Future;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;

use tracing::{error, info};

use crate::connection::{BoxFuture, EngineHandle};
use crate::error::EngineError;
use crate::worker::{self, Backend};

/// Runtime flavour the engine is instantiated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeBundle {
    SingleThreaded,
    Threaded { threads: usize },
}

impl RuntimeBundle {
    pub fn threads(&self) -> usize {
        match self {
            RuntimeBundle::SingleThreaded => 1,
            RuntimeBundle::Threaded { threads } => *threads,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineSettings {
    /// Forces a thread count instead of detecting one from the host.
    pub threads: Option<usize>,
    /// Engine memory limit, e.g. `"2GB"`.
    pub memory_limit: Option<String>,
}

/// Pick a runtime bundle from the host's parallelism, honouring overrides.
pub fn select_bundle(
    settings: &EngineSettings,
    host_parallelism: Option<NonZeroUsize>,
) -> RuntimeBundle {
    let threads = settings
        .threads
        .or_else(|| host_parallelism.map(NonZeroUsize::get))
        .unwrap_or(1);
    if threads <= 1 {
        RuntimeBundle::SingleThreaded
    } else {
        RuntimeBundle::Threaded { threads }
    }
}

/// Something that can produce an engine handle exactly once.
pub trait Bootstrap: Send {
    fn initialize(self: Box<Self>) -> BoxFuture<'static, Result<EngineHandle, EngineError>>;
}

/// Starts a worker-thread engine for backend `B`.
pub struct EngineBootstrapper<B> {
    settings: EngineSettings,
    _backend: PhantomData<fn() -> B>,
}

impl<B: Backend> EngineBootstrapper<B> {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            _backend: PhantomData,
        }
    }

    pub async fn initialize(self) -> Result<EngineHandle, EngineError> {
        let bundle = select_bundle(&self.settings, thread::available_parallelism().ok());
        info!(?bundle, "selected engine runtime bundle");

        match worker::spawn::<B>(bundle, self.settings).await {
            Ok(engine) => {
                info!(threads = bundle.threads(), "engine instantiated");
                Ok(Arc::new(engine) as EngineHandle)
            }
            Err(err) => {
                error!("engine bootstrap failed: {err}");
                Err(err)
            }
        }
    }
}

impl<B: Backend> Bootstrap for EngineBootstrapper<B> {
    fn initialize(self: Box<Self>) -> BoxFuture<'static, Result<EngineHandle, EngineError>> {
        Box::pin(EngineBootstrapper::initialize(*self))
    }
}

/// Adapts any future producing a handle into a [`Bootstrap`].
pub struct FnBootstrap<F>(pub F);

impl<F, Fut> Bootstrap for FnBootstrap<F>
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<EngineHandle, EngineError>> + Send + 'static,
{
    fn initialize(self: Box<Self>) -> BoxFuture<'static, Result<EngineHandle, EngineError>> {
        let FnBootstrap(init) = *self;
        Box::pin(init())
    }
}

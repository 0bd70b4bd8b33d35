use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::EngineError;
use crate::result::ResultTable;

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Shared, read-only handle to an initialized engine.
pub type EngineHandle = Arc<dyn Engine>;

/// An initialized analytic engine.
///
/// Implementations must be `Send + Sync`; every pipeline run holds a clone of
/// the handle and opens its own [`Connection`].
pub trait Engine: Send + Sync {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, EngineError>>;
}

/// A scoped connection owned by exactly one pipeline run.
///
/// Callers are expected to finish with [`Connection::close`]. Dropping an
/// unclosed connection still releases it, but without reporting errors.
pub trait Connection: Send {
    /// Identifier used in logs.
    fn id(&self) -> u64;

    /// Run a statement whose result is not needed.
    fn execute<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<(), EngineError>>;

    /// Run a query and return its columnar result.
    fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<ResultTable, EngineError>>;

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), EngineError>>;
}

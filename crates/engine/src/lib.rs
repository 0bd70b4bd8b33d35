//! Query-engine seam for the viewer pipeline.
//!
//! The pipeline only ever talks to an [`Engine`] through boxed futures so the
//! concrete backend (DuckDB on a worker thread, or the scripted engine used in
//! tests) stays swappable.

pub mod bootstrap;
pub mod connection;
pub mod error;
pub mod result;
pub mod worker;

#[cfg(feature = "duckdb")]
pub mod duckdb_backend;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bootstrap::*;
pub use connection::*;
pub use error::*;
pub use result::*;

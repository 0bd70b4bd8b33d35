//! Data-acquisition pipeline: discover a remote dataset's columns, build a
//! normalizing query against it and materialize the result as features.

pub mod error;
pub mod materialize;
pub mod query;
pub mod run;
pub mod schema;

pub use error::*;
pub use materialize::*;
pub use query::*;
pub use run::*;
pub use schema::*;

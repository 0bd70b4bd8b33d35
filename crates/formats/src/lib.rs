pub mod collection;
pub mod geometry;

pub use collection::*;
pub use geometry::*;

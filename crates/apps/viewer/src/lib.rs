pub mod config;
pub mod controller;
pub mod controls;
pub mod status;
pub mod symbology;

pub use controller::*;
pub use status::*;

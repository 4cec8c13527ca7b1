pub mod analysis;
pub mod data;
pub mod errors;
pub mod evaluation;
pub mod ingest;
pub mod models;
pub mod modules;
pub mod utils;

pub use errors::{Result, TrajectoryError};

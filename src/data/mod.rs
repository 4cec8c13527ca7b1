pub mod batchitem;
pub mod normalization;
pub mod trajectoryitem;

/// Sequence of (lat, lon) points of one flight.
pub type Trajectory = Vec<[f32; 2]>;

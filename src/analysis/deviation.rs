use serde::Serialize;
use std::fmt;

use crate::data::Trajectory;
use crate::errors::{shape_error, Result};

/// Compares model predictions and the filed flight plans against the flown track.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DeviationReport {
    pub trajectories: usize,
    pub improved: usize,
    /// share of trajectories the model moved closer to the flown track
    pub improved_fraction: f64,
    /// `1 - var(model) / var(plan)` over the improved trajectories, `None` if that
    /// subset is empty or its flight plan deviation has no variance
    pub variance_reduction: Option<f64>,
}

impl fmt::Display for DeviationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "l2-norm: {:.4} of tracks is reduced ({}/{}), ",
            self.improved_fraction, self.improved, self.trajectories
        )?;
        match self.variance_reduction {
            Some(reduction) => write!(f, "variance is reduced by {:.2}%", reduction * 100.0),
            None => write!(f, "variance reduction n/a"),
        }
    }
}

/// Per-trajectory sum of squared coordinate differences.
pub fn squared_deviation(reference: &[Trajectory], other: &[Trajectory]) -> Result<Vec<f64>> {
    if reference.len() != other.len() {
        return Err(shape_error!("{} trajectories compared to {}", reference.len(), other.len()));
    }

    reference
        .iter()
        .zip(other)
        .enumerate()
        .map(|(i, (a, b))| {
            if a.len() != b.len() {
                return Err(shape_error!("trajectory {} has {} and {} points", i, a.len(), b.len()));
            }
            Ok(a.iter()
                .zip(b)
                .map(|(p, q)| {
                    let d_lat = (p[0] - q[0]) as f64;
                    let d_lon = (p[1] - q[1]) as f64;
                    d_lat * d_lat + d_lon * d_lon
                })
                .sum())
        })
        .collect()
}

fn variance(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

/// A trajectory counts as improved if its model deviation is strictly below the
/// flight plan deviation, so zero-deviation flight plans never count.
pub fn deviation_reduction(original: &[f64], model: &[f64]) -> DeviationReport {
    let (improved_original, improved_model): (Vec<f64>, Vec<f64>) = original
        .iter()
        .zip(model)
        .filter(|(o, m)| m < o)
        .map(|(o, m)| (*o, *m))
        .unzip();

    let trajectories = original.len().min(model.len());
    let improved = improved_original.len();

    let improved_fraction = if trajectories > 0 {
        improved as f64 / trajectories as f64
    } else {
        0.0
    };

    let variance_reduction = if improved > 0 {
        let baseline = variance(&improved_original);
        if baseline > 0.0 {
            Some(1.0 - variance(&improved_model) / baseline)
        } else {
            None
        }
    } else {
        None
    };

    DeviationReport {
        trajectories,
        improved,
        improved_fraction,
        variance_reduction,
    }
}

/// All trajectories in degrees, `[N][T]` points each.
pub fn analyze(
    predicted: &[Trajectory],
    truth: &[Trajectory],
    flight_plan: &[Trajectory],
) -> Result<DeviationReport> {
    let original = squared_deviation(truth, flight_plan)?;
    let model = squared_deviation(truth, predicted)?;

    Ok(deviation_reduction(&original, &model))
}

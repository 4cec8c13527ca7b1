use burn::config::Config;
use burn::data::dataloader::DataLoaderBuilder;
use burn::data::dataset::InMemDataset;
use burn::module::Module;
use burn::record::{CompactRecorder, Recorder};
use burn::tensor::backend::Backend;
use burn::tensor::ElementConversion;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analysis::deviation::{analyze, DeviationReport};
use crate::data::normalization::RegionBounds;
use crate::data::trajectoryitem::{TrajectoryBatcher, TrajectoryStore};
use crate::data::Trajectory;
use crate::errors::{self, config_error, TrajectoryError};
use crate::models::convlstm::model::{TrajectoryModel, TrajectoryModelConfig};
use crate::utils::{sequence_loss, tensor_to_trajectories};

const CHECKPOINT_PREFIX: &str = "model-";

#[derive(Config, Debug)]
pub struct EvaluationConfig {
    /// root of the `<T>/{flight_plan,trajectory,weather}` directories
    pub data_dir: String,

    /// directory holding `model-<epoch>` records
    pub checkpoint_dir: String,

    pub model: TrajectoryModelConfig,

    #[config(default = 50)]
    pub trajectory_length: usize,

    #[config(default = "RegionBounds::new()")]
    pub bounds: RegionBounds,

    #[config(default = 64)]
    pub batch_size: usize,

    /// if set, predicted, true and flight plan trajectories are written here
    #[config(default = "None")]
    pub output_dir: Option<String>,
}

/// Results in degrees, ordered like `names`.
#[derive(Serialize, Debug)]
pub struct Evaluation {
    pub names: Vec<String>,
    pub predicted: Vec<Trajectory>,
    pub truth: Vec<Trajectory>,
    pub flight_plan: Vec<Trajectory>,
    /// mean point distance on normalized coordinates
    pub loss: f64,
    pub report: DeviationReport,
}

/// The record with the highest epoch number, without its file extension as the
/// recorder expects it.
pub fn latest_checkpoint<P: AsRef<Path>>(dir: P) -> errors::Result<PathBuf> {
    let dir = dir.as_ref();
    let mut latest: Option<(usize, PathBuf)> = None;

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(rest) = file_name.strip_prefix(CHECKPOINT_PREFIX) else {
            continue;
        };

        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() || !rest[digits.len()..].starts_with('.') {
            continue;
        }

        if let Ok(epoch) = digits.parse::<usize>() {
            if latest.as_ref().map_or(true, |(e, _)| epoch > *e) {
                latest = Some((epoch, dir.join(format!("{CHECKPOINT_PREFIX}{epoch}"))));
            }
        }
    }

    latest
        .map(|(_, path)| path)
        .ok_or_else(|| TrajectoryError::MissingCheckpoint(dir.display().to_string()))
}

pub fn restore_model<B: Backend>(
    config: &EvaluationConfig,
    device: &B::Device,
) -> errors::Result<TrajectoryModel<B>> {
    let checkpoint = latest_checkpoint(&config.checkpoint_dir)?;
    info!("restoring model from {}", checkpoint.display());

    let record = CompactRecorder::new().load(checkpoint)?;
    let model = config.model.init::<B>()?.load_record(record);

    Ok(model.to_device(device))
}

/// Runs `model` over every stored flight and compares the result with the flight plans.
pub fn evaluate_model<B: Backend>(
    config: &EvaluationConfig,
    model: &TrajectoryModel<B>,
    device: B::Device,
) -> errors::Result<Evaluation> {
    if config.trajectory_length < 2 {
        return Err(config_error!(
            "trajectory length {} leaves nothing to predict",
            config.trajectory_length
        ));
    }

    let store = TrajectoryStore::new(
        &config.data_dir,
        config.trajectory_length,
        config.model.encoder.cube_size,
    );
    let items = store.load(&config.bounds)?;
    let total = items.len();

    let loader = DataLoaderBuilder::new(TrajectoryBatcher::<B>::new(device))
        .batch_size(config.batch_size)
        .build(InMemDataset::new(items));

    let mut names = Vec::with_capacity(total);
    let mut predicted = Vec::with_capacity(total);
    let mut truth = Vec::with_capacity(total);
    let mut flight_plan = Vec::with_capacity(total);
    let mut loss_sum = 0.0;

    for batch in loader.iter() {
        let n = batch.names.len();
        let pred = model.predict(&batch);
        let loss: f64 = sequence_loss(pred.clone(), batch.trajectory.clone())
            .into_scalar()
            .elem();
        loss_sum += loss * n as f64;

        let denormalize = |trajectories: Vec<Trajectory>| -> Vec<Trajectory> {
            trajectories
                .iter()
                .map(|t| config.bounds.denormalize_trajectory(t))
                .collect()
        };

        predicted.extend(denormalize(tensor_to_trajectories(pred)));
        truth.extend(denormalize(tensor_to_trajectories(batch.trajectory)));
        flight_plan.extend(denormalize(tensor_to_trajectories(batch.flight_plan)));
        names.extend(batch.names);
    }

    let loss = if total > 0 { loss_sum / total as f64 } else { 0.0 };
    let report = analyze(&predicted, &truth, &flight_plan)?;
    info!("evaluated {total} trajectories, loss {loss:.6}");

    Ok(Evaluation {
        names,
        predicted,
        truth,
        flight_plan,
        loss,
        report,
    })
}

pub fn evaluate<B: Backend>(
    config: &EvaluationConfig,
    device: B::Device,
) -> errors::Result<Evaluation> {
    let model = restore_model::<B>(config, &device)?;
    let evaluation = evaluate_model(config, &model, device)?;

    if let Some(dir) = &config.output_dir {
        save_arrays(dir, &evaluation)?;
    }

    Ok(evaluation)
}

#[derive(Serialize)]
struct NamedTrajectories<'a> {
    names: &'a [String],
    trajectories: &'a [Trajectory],
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> errors::Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, value)?;
    Ok(())
}

/// Writes `y_pred.json`, `y_true.json` and `flight_plan.json` into `dir`.
pub fn save_arrays<P: AsRef<Path>>(dir: P, evaluation: &Evaluation) -> errors::Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    for (file, trajectories) in [
        ("y_pred.json", &evaluation.predicted),
        ("y_true.json", &evaluation.truth),
        ("flight_plan.json", &evaluation.flight_plan),
    ] {
        let named = NamedTrajectories {
            names: &evaluation.names,
            trajectories,
        };
        write_json(&dir.join(file), &named)?;
    }

    info!("saved trajectories to {}", dir.display());
    Ok(())
}

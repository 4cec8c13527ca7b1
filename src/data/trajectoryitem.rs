use burn::data::dataloader::batcher::Batcher;
use burn::tensor::backend::Backend;
use burn::tensor::{Data, Shape, Tensor};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::data::batchitem::TrajectoryBatch;
use crate::data::normalization::RegionBounds;
use crate::data::Trajectory;
use crate::errors::{shape_error, Result};
use crate::utils::trajectories_to_tensor;

pub const FLIGHT_PLAN_DIR: &str = "flight_plan";
pub const TRAJECTORY_DIR: &str = "trajectory";
pub const WEATHER_DIR: &str = "weather";

/// One flight with normalized positions. `weather` holds `T - 1` cubes of
/// `cube_size * cube_size` values, row major.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TrajectoryItem {
    pub name: String,
    pub flight_plan: Trajectory,
    pub trajectory: Trajectory,
    pub cube_size: usize,
    pub weather: Vec<f32>,
}

/// Per-flight files below `<data_dir>/<T>/{flight_plan,trajectory,weather}/<name>.json`.
pub struct TrajectoryStore {
    dir: PathBuf,
    trajectory_length: usize,
    cube_size: usize,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn to_points(rows: Vec<Vec<f32>>, expected: usize, path: &Path) -> Result<Trajectory> {
    if rows.len() != expected {
        return Err(shape_error!(
            "{} has {} points, expected {}",
            path.display(),
            rows.len(),
            expected
        ));
    }

    // only lat/lon are used, altitude and other columns are ignored
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| match row.as_slice() {
            [lat, lon, ..] => Ok([*lat, *lon]),
            _ => Err(shape_error!("{} point {} has {} values", path.display(), i, row.len())),
        })
        .collect()
}

fn to_cubes(cubes: Vec<Vec<Vec<f32>>>, steps: usize, size: usize, path: &Path) -> Result<Vec<f32>> {
    if cubes.len() != steps {
        return Err(shape_error!(
            "{} has {} weather cubes, expected {}",
            path.display(),
            cubes.len(),
            steps
        ));
    }

    let mut values = Vec::with_capacity(steps * size * size);
    for (t, cube) in cubes.into_iter().enumerate() {
        if cube.len() != size || cube.iter().any(|row| row.len() != size) {
            return Err(shape_error!(
                "{} weather cube {} is not {}x{}",
                path.display(),
                t,
                size,
                size
            ));
        }
        values.extend(cube.into_iter().flatten());
    }

    Ok(values)
}

impl TrajectoryStore {
    pub fn new<P: AsRef<Path>>(data_dir: P, trajectory_length: usize, cube_size: usize) -> Self {
        TrajectoryStore {
            dir: data_dir.as_ref().join(trajectory_length.to_string()),
            trajectory_length,
            cube_size,
        }
    }

    pub fn category_dir(&self, category: &str) -> PathBuf {
        self.dir.join(category)
    }

    fn file(&self, category: &str, name: &str) -> PathBuf {
        self.category_dir(category).join(format!("{name}.json"))
    }

    /// Sorted flight names, taken from the weather directory.
    pub fn file_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in fs::read_dir(self.category_dir(WEATHER_DIR))? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    pub fn load_item(&self, name: &str, bounds: &RegionBounds) -> Result<TrajectoryItem> {
        let path = self.file(FLIGHT_PLAN_DIR, name);
        let flight_plan = to_points(read_json(&path)?, self.trajectory_length, &path)?;

        let path = self.file(TRAJECTORY_DIR, name);
        let trajectory = to_points(read_json(&path)?, self.trajectory_length, &path)?;

        let path = self.file(WEATHER_DIR, name);
        let steps = self.trajectory_length.saturating_sub(1);
        let weather = to_cubes(read_json(&path)?, steps, self.cube_size, &path)?;

        let flight_plan = bounds.normalize_trajectory(&flight_plan);
        let trajectory = bounds.normalize_trajectory(&trajectory);

        let outside = flight_plan
            .iter()
            .chain(trajectory.iter())
            .filter(|p| !RegionBounds::is_normalized(**p))
            .count();
        if outside > 0 {
            warn!("{name}: {outside} points outside of the configured region");
        }

        Ok(TrajectoryItem {
            name: name.to_string(),
            flight_plan,
            trajectory,
            cube_size: self.cube_size,
            weather,
        })
    }

    /// Loads every flight and normalizes the weather cubes over the whole set.
    pub fn load(&self, bounds: &RegionBounds) -> Result<Vec<TrajectoryItem>> {
        info!("loading trajectories from {}", self.dir.display());

        let mut items = self
            .file_names()?
            .iter()
            .map(|name| {
                debug!("loading {name}");
                self.load_item(name, bounds)
            })
            .collect::<Result<Vec<_>>>()?;

        let max = normalize_weather(&mut items);
        info!("loaded {} trajectories, weather maximum {}", items.len(), max);

        Ok(items)
    }
}

/// Clips negative weather values to zero and divides by the maximum across all
/// items. Returns that maximum. An all-zero set is left at zero.
pub fn normalize_weather(items: &mut [TrajectoryItem]) -> f32 {
    let max = items
        .iter()
        .flat_map(|item| item.weather.iter())
        .fold(0.0f32, |max, v| max.max(*v));

    if max <= 0.0 {
        warn!("weather maximum is zero, cubes are left unscaled");
    }

    for value in items.iter_mut().flat_map(|item| item.weather.iter_mut()) {
        *value = if *value > 0.0 && max > 0.0 { *value / max } else { 0.0 };
    }

    max
}

pub struct TrajectoryBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> TrajectoryBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<TrajectoryItem, TrajectoryBatch<B>> for TrajectoryBatcher<B> {
    fn batch(&self, items: Vec<TrajectoryItem>) -> TrajectoryBatch<B> {
        let batch_size = items.len();
        let steps = items.first().map_or(0, |item| item.trajectory.len());
        let cube_size = items.first().map_or(0, |item| item.cube_size);

        let flight_plans: Vec<Trajectory> =
            items.iter().map(|item| item.flight_plan.clone()).collect();
        let trajectories: Vec<Trajectory> =
            items.iter().map(|item| item.trajectory.clone()).collect();

        let weather: Vec<f32> = items
            .iter()
            .flat_map(|item| item.weather.iter().copied())
            .collect();
        let data = Data::new(
            weather,
            Shape::new([batch_size, steps.saturating_sub(1), cube_size, cube_size]),
        );
        let weather: Tensor<B, 4> = Tensor::from_data(data.convert());

        TrajectoryBatch {
            names: items.into_iter().map(|item| item.name).collect(),
            flight_plan: trajectories_to_tensor::<B>(&flight_plans).to_device(&self.device),
            trajectory: trajectories_to_tensor::<B>(&trajectories).to_device(&self.device),
            weather: weather.to_device(&self.device),
        }
    }
}

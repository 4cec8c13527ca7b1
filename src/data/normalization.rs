use burn::config::Config;

use super::Trajectory;

/// Geographic box that maps latitude and longitude into `[0, 1]`. The defaults
/// cover the continental US airspace of the JFK -> LAX data set.
#[derive(Config, Debug)]
pub struct RegionBounds {
    #[config(default = 19.35598953632181)]
    pub lat_min: f64,

    #[config(default = 53.8742945085336)]
    pub lat_max: f64,

    #[config(default = -134.3486134307298)]
    pub lon_min: f64,

    #[config(default = -61.65138656927017)]
    pub lon_max: f64,
}

impl RegionBounds {
    pub fn normalize(&self, point: [f32; 2]) -> [f32; 2] {
        let lat = (point[0] as f64 - self.lat_min) / (self.lat_max - self.lat_min);
        let lon = (point[1] as f64 - self.lon_min) / (self.lon_max - self.lon_min);
        [lat as f32, lon as f32]
    }

    pub fn denormalize(&self, point: [f32; 2]) -> [f32; 2] {
        let lat = point[0] as f64 * (self.lat_max - self.lat_min) + self.lat_min;
        let lon = point[1] as f64 * (self.lon_max - self.lon_min) + self.lon_min;
        [lat as f32, lon as f32]
    }

    pub fn normalize_trajectory(&self, trajectory: &[[f32; 2]]) -> Trajectory {
        trajectory.iter().map(|p| self.normalize(*p)).collect()
    }

    pub fn denormalize_trajectory(&self, trajectory: &[[f32; 2]]) -> Trajectory {
        trajectory.iter().map(|p| self.denormalize(*p)).collect()
    }

    /// true if a normalized point lies inside the unit square
    pub fn is_normalized(point: [f32; 2]) -> bool {
        point.iter().all(|v| (0.0..=1.0).contains(v))
    }
}

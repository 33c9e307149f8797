// src/config.rs
use crate::error::{PoseError, Result};
use crate::joints::NETWORK_JOINTS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub frames: FrameConfig,
}

/// Memory order of the network's output volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeLayout {
    /// `heat[j][z][y][x]`, `offset[axis][j][z][y][x]`
    #[default]
    JointMajor,
    /// `heat[y][x][j][z]`, `offset[y][x][axis * J + j][z]`
    ChannelsLast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Cells per axis of the heat map cube.
    #[serde(default = "default_resolution")]
    pub resolution: usize,
    /// Joints emitted by the network.
    #[serde(default = "default_joint_count")]
    pub joint_count: usize,
    /// Side of the square input image in pixels.
    #[serde(default = "default_image_size")]
    pub image_size: usize,
    /// Voxel index treated as depth zero.
    #[serde(default = "default_depth_bias")]
    pub depth_bias: f32,
    /// Negate y so that up is positive.
    #[serde(default)]
    pub flip_y: bool,
    #[serde(default)]
    pub layout: VolumeLayout,
}

fn default_resolution() -> usize {
    28
}

fn default_joint_count() -> usize {
    NETWORK_JOINTS
}

fn default_image_size() -> usize {
    448
}

fn default_depth_bias() -> f32 {
    14.0
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            joint_count: default_joint_count(),
            image_size: default_image_size(),
            depth_bias: default_depth_bias(),
            flip_y: false,
            layout: VolumeLayout::default(),
        }
    }
}

impl GridConfig {
    pub fn voxels_per_joint(&self) -> usize {
        self.resolution * self.resolution * self.resolution
    }

    pub fn heatmap_len(&self) -> usize {
        self.joint_count * self.voxels_per_joint()
    }

    pub fn offset_len(&self) -> usize {
        self.heatmap_len() * 3
    }

    /// Pixels covered by one voxel edge.
    pub fn voxel_scale(&self) -> f32 {
        self.image_size as f32 / self.resolution as f32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_kalman_q")]
    pub kalman_q: f32,
    #[serde(default = "default_kalman_r")]
    pub kalman_r: f32,
    #[serde(default = "default_initial_covariance")]
    pub initial_covariance: f32,
    #[serde(default = "default_use_low_pass")]
    pub use_low_pass: bool,
    /// Weight of the newer stage in each low-pass step. 1.0 disables smoothing.
    #[serde(default = "default_low_pass_alpha")]
    pub low_pass_alpha: f32,
    #[serde(default = "default_history_len")]
    pub history_len: usize,
}

fn default_kalman_q() -> f32 {
    0.001
}

fn default_kalman_r() -> f32 {
    0.0015
}

fn default_initial_covariance() -> f32 {
    0.01
}

fn default_use_low_pass() -> bool {
    true
}

fn default_low_pass_alpha() -> f32 {
    0.9
}

fn default_history_len() -> usize {
    6
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            kalman_q: default_kalman_q(),
            kalman_r: default_kalman_r(),
            initial_covariance: default_initial_covariance(),
            use_low_pass: default_use_low_pass(),
            low_pass_alpha: default_low_pass_alpha(),
            history_len: default_history_len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_suffix")]
    pub suffix: String,
    /// Where track files live. Defaults to the source's own directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Half-width in seconds of the denoising cluster.
    #[serde(default = "default_denoise_window")]
    pub denoise_window: f64,
}

fn default_suffix() -> String {
    ".cache".to_string()
}

fn default_denoise_window() -> f64 {
    0.1
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
            directory: None,
            denoise_window: default_denoise_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Minimum real-time spacing between the three buffered frames.
    #[serde(default = "default_min_gap_secs")]
    pub min_gap_secs: f64,
}

fn default_min_gap_secs() -> f64 {
    0.05
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            min_gap_secs: default_min_gap_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let grid = &self.grid;
        if grid.resolution == 0 {
            return Err(invalid("grid.resolution must be positive"));
        }
        if grid.image_size == 0 {
            return Err(invalid("grid.image_size must be positive"));
        }
        if grid.joint_count != NETWORK_JOINTS {
            return Err(invalid(format!(
                "grid.joint_count is {}, the skeleton expects {}",
                grid.joint_count, NETWORK_JOINTS
            )));
        }
        if !grid.depth_bias.is_finite() {
            return Err(invalid("grid.depth_bias must be finite"));
        }

        let filter = &self.filter;
        if !(filter.kalman_q > 0.0 && filter.kalman_r > 0.0) {
            return Err(invalid("filter.kalman_q and filter.kalman_r must be positive"));
        }
        if !(filter.initial_covariance > 0.0) {
            return Err(invalid("filter.initial_covariance must be positive"));
        }
        if !(0.0..=1.0).contains(&filter.low_pass_alpha) {
            return Err(invalid("filter.low_pass_alpha must lie in [0, 1]"));
        }
        if filter.history_len == 0 {
            return Err(invalid("filter.history_len must be at least 1"));
        }

        if !(self.cache.denoise_window > 0.0) {
            return Err(invalid("cache.denoise_window must be positive"));
        }
        if self.cache.suffix.is_empty() {
            return Err(invalid("cache.suffix must not be empty"));
        }
        if !(self.frames.min_gap_secs >= 0.0) {
            return Err(invalid("frames.min_gap_secs must not be negative"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> PoseError {
    PoseError::InvalidConfig(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grid.heatmap_len(), 24 * 28 * 28 * 28);
        assert_eq!(config.grid.offset_len(), 3 * 24 * 28 * 28 * 28);
        assert!((config.grid.voxel_scale() - 16.0).abs() < 1e-6);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "grid": { "resolution": 4, "flip_y": true }, "filter": { "use_low_pass": false } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.grid.resolution, 4);
        assert!(config.grid.flip_y);
        assert_eq!(config.grid.joint_count, 24);
        assert!(!config.filter.use_low_pass);
        assert_eq!(config.filter.history_len, 6);
        assert_eq!(config.cache.suffix, ".cache");
        assert!((config.frames.min_gap_secs - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_layout_names() {
        let json = r#"{ "grid": { "layout": "channels_last" } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.grid.layout, VolumeLayout::ChannelsLast);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.grid.joint_count = 17;
        assert!(matches!(config.validate(), Err(PoseError::InvalidConfig(_))));

        let mut config = PipelineConfig::default();
        config.filter.low_pass_alpha = 1.5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.filter.initial_covariance = 0.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.grid.resolution = 0;
        assert!(config.validate().is_err());
    }
}

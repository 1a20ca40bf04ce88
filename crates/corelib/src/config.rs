//! Engine-wide settings with defaults; the binary overrides them from CLI flags.

use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub window_width: u32,
    pub window_height: u32,
    pub z_near: f32,
    pub z_far: f32,
    /// Directory `map_Kd` filenames are resolved against.
    pub images_dir: PathBuf,
    pub obj_path: PathBuf,
    pub mtl_path: PathBuf,
    /// Demo spin applied to every transform, degrees per second on each axis.
    pub spin_degrees_per_sec: [f32; 3],
    /// Draw unit X/Y/Z axis lines at the origin.
    pub show_axes: bool,
}

impl EngineConfig {
    /// Fixed projection aspect, taken from the configured window size rather
    /// than the live framebuffer.
    #[inline]
    pub fn aspect_ratio(&self) -> f32 {
        self.window_width.max(1) as f32 / self.window_height.max(1) as f32
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_width: 800,
            window_height: 600,
            z_near: 0.1,
            z_far: 100.0,
            images_dir: PathBuf::from("assets/images"),
            obj_path: PathBuf::from("assets/models/test.obj"),
            mtl_path: PathBuf::from("assets/models/test.mtl"),
            spin_degrees_per_sec: [25.0, 50.0, 0.0],
            show_axes: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_aspect_is_four_by_three() {
        let cfg = EngineConfig::default();
        assert!((cfg.aspect_ratio() - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn zero_height_does_not_divide_by_zero() {
        let cfg = EngineConfig {
            window_height: 0,
            ..EngineConfig::default()
        };
        assert!(cfg.aspect_ratio().is_finite());
    }
}

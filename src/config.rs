//! Engine configuration
//!
//! Stored as RON, the same text format the engine uses for level files.
//! Every field has a default so partial files load.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rasterizer::{FrameContext, Light, Mat4, StarField, Viewport, HEIGHT, WIDTH};

/// Largest accepted framebuffer edge in pixels
pub const MAX_DIMENSION: usize = 16_384;

/// Which backend renders the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendKind {
    /// Per-pixel writes straight into the framebuffer, in submission order
    #[default]
    Scalar,
    /// Batched tiles dispatched on a worker pool at end of frame
    Compute,
}

/// Perspective camera parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 60.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl CameraConfig {
    /// `aspect` is height / width
    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::projection(self.fov, aspect, self.far, self.near)
    }
}

pub type LightConfig = Light;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub width: usize,
    pub height: usize,
    pub backend: BackendKind,
    /// Compute worker threads, 0 = one per core
    pub worker_threads: usize,
    /// Use the scalar backend if the compute pool cannot be built
    pub fallback_to_scalar: bool,
    /// Packed ARGB written by `begin_frame`
    pub clear_color: u32,
    /// Truncate screen coordinates to whole pixels (PS1 jitter)
    pub vertex_snap: bool,
    pub camera: CameraConfig,
    pub light: LightConfig,
    /// Shade fragments with their UV instead of the texture
    pub uv_debug: bool,
    /// Draw a star field behind the scene instead of `clear_color`
    pub star_field: Option<StarField>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: WIDTH,
            height: HEIGHT,
            backend: BackendKind::Scalar,
            worker_threads: 0,
            fallback_to_scalar: true,
            clear_color: 0xFF000000,
            vertex_snap: true,
            camera: CameraConfig::default(),
            light: Light::default(),
            uv_debug: false,
            star_field: None,
        }
    }
}

impl EngineConfig {
    pub fn from_ron_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = ron::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .indentor("  ".to_string());
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_dimensions(self.width, self.height)?;
        let cam = &self.camera;
        if !(cam.near > 0.0) {
            return Err(ConfigError::Invalid(format!("near plane must be positive, got {}", cam.near)));
        }
        if !(cam.far > cam.near) {
            return Err(ConfigError::Invalid(format!(
                "far plane ({}) must be beyond near plane ({})",
                cam.far, cam.near
            )));
        }
        if !(cam.fov > 0.0 && cam.fov < 180.0) {
            return Err(ConfigError::Invalid(format!("fov must be in (0, 180), got {}", cam.fov)));
        }
        Ok(())
    }

    /// Height over width, the aspect convention `Mat4::projection` expects
    pub fn aspect(&self) -> f32 {
        self.height as f32 / self.width as f32
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
            snap: self.vertex_snap,
        }
    }

    /// Context with this config's projection, light and debug flags
    pub fn frame_context(&self, view: Mat4) -> FrameContext {
        let mut ctx = FrameContext::new(view, self.camera.projection(self.aspect()), self.camera.near)
            .with_light(self.light);
        ctx.uv_debug = self.uv_debug;
        ctx
    }
}

/// Framebuffer size must be non-empty, at most [`MAX_DIMENSION`] per edge,
/// and its pixel count must fit in `usize`
pub fn check_dimensions(width: usize, height: usize) -> Result<(), ConfigError> {
    if width == 0 || height == 0 {
        return Err(ConfigError::Invalid(format!(
            "framebuffer must be non-empty, got {}x{}",
            width, height
        )));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION || width.checked_mul(height).is_none() {
        return Err(ConfigError::Invalid(format!(
            "framebuffer {}x{} exceeds {} pixels per edge",
            width, height, MAX_DIMENSION
        )));
    }
    Ok(())
}

/// Load a config from a RON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    EngineConfig::from_ron_str(&contents)
}

/// Save a config to a RON file
pub fn save_config<P: AsRef<Path>>(config: &EngineConfig, path: P) -> Result<(), ConfigError> {
    fs::write(path, config.to_ron_string()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = EngineConfig::from_ron_str("(width: 640, backend: Compute)").unwrap();
        assert_eq!(config.width, 640);
        assert_eq!(config.height, HEIGHT);
        assert_eq!(config.backend, BackendKind::Compute);
        assert!(config.fallback_to_scalar);
        assert_eq!(config.light, Light::default());
    }

    #[test]
    fn test_string_round_trip() {
        let mut config = EngineConfig::default();
        config.camera.fov = 75.0;
        config.uv_debug = true;
        let text = config.to_ron_string().unwrap();
        assert_eq!(EngineConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_planes() {
        let err = EngineConfig::from_ron_str("(camera: (near: 5.0, far: 1.0))").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_ron_str("(camera: (near: 0.0))").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_empty_framebuffer() {
        assert!(matches!(
            EngineConfig::from_ron_str("(width: 0)"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_framebuffer() {
        let huge = format!("(width: {}, height: {})", usize::MAX / 2, 3);
        assert!(matches!(EngineConfig::from_ron_str(&huge), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            EngineConfig::from_ron_str("(width: 20000, height: 2)"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(check_dimensions(MAX_DIMENSION, MAX_DIMENSION).is_ok());
        assert!(check_dimensions(usize::MAX, usize::MAX).is_err());
    }

    #[test]
    fn test_star_field_section() {
        let config = EngineConfig::from_ron_str("(star_field: Some((seed: 9)))").unwrap();
        let field = config.star_field.unwrap();
        assert_eq!(field.seed, 9);
        assert_eq!(field.count, StarField::default().count);

        let text = config.to_ron_string().unwrap();
        assert_eq!(EngineConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert!(matches!(EngineConfig::from_ron_str("(width: "), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("sunraster_config_{}.ron", std::process::id()));
        let config = EngineConfig {
            backend: BackendKind::Compute,
            worker_threads: 2,
            ..EngineConfig::default()
        };
        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_frame_context_uses_camera() {
        let config = EngineConfig::default();
        let ctx = config.frame_context(Mat4::IDENTITY);
        assert_eq!(ctx.near, config.camera.near);
        assert_eq!(ctx.projection, config.camera.projection(config.aspect()));
    }
}

//! Startup constants for the sample program
//!
//! The program takes no command-line arguments. Everything it needs is
//! collected here, with defaults matching the reference scene, and checked once
//! before any GPU work starts.

use std::path::PathBuf;

use cgmath::{InnerSpace, Vector3};

use crate::error::{Result, SampleError};
use crate::gfx::camera::{arcball::ray_gen_basis, CameraState, Viewport};
use crate::scene::SphereScene;

#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub title: String,
    /// Resolution of the traced frame buffer and of the window.
    pub frame_size: Viewport,
    /// Where the last frame is written when the program exits.
    pub output_path: PathBuf,
    pub camera: CameraState,
    /// Cosine of the half vertical field of view.
    pub cos_fovy: f32,
    /// Checkerboard colours of the miss program.
    pub miss_colors: [[f32; 3]; 2],
    pub scene: SphereScene,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            title: "Sample Program".to_string(),
            frame_size: Viewport::new(1400, 460),
            output_path: PathBuf::from("sample_program.png"),
            camera: CameraState::new(
                Vector3::new(0.5, 0.0, 0.6),
                Vector3::new(0.5, 0.0, 0.0),
                Vector3::new(0.0, -1.0, 0.0),
            ),
            cos_fovy: 0.66,
            miss_colors: [[0.1, 0.1, 0.1], [0.0, 0.0, 0.0]],
            scene: SphereScene::default(),
        }
    }
}

impl SampleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frame_size.width == 0 || self.frame_size.height == 0 {
            return Err(SampleError::InvalidConfig(format!(
                "frame size must be non-zero, got {}x{}",
                self.frame_size.width, self.frame_size.height
            )));
        }

        if (self.camera.up.magnitude() - 1.0).abs() > 1e-3 {
            return Err(SampleError::InvalidConfig(format!(
                "up vector must be unit length, got {:?}",
                self.camera.up
            )));
        }

        if !(self.cos_fovy > 0.0) {
            return Err(SampleError::InvalidConfig(format!(
                "cos_fovy must be positive, got {}",
                self.cos_fovy
            )));
        }

        // The initial view has to produce a basis, otherwise the first frame has nothing to trace with.
        ray_gen_basis(&self.camera, self.cos_fovy, self.frame_size.aspect())?;

        self.scene.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SampleConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.output_path, PathBuf::from("sample_program.png"));
        assert_eq!(config.scene.len(), 11);
    }

    #[test]
    fn test_zero_frame_size_rejected() {
        let config = SampleConfig {
            frame_size: Viewport::new(0, 460),
            ..SampleConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SampleError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_eye_on_pivot_rejected() {
        let mut config = SampleConfig::default();
        config.camera.eye = config.camera.pivot;
        assert!(matches!(config.validate(), Err(SampleError::Camera(_))));
    }

    #[test]
    fn test_non_unit_up_rejected() {
        let mut config = SampleConfig::default();
        config.camera.up = Vector3::new(0.0, -2.0, 0.0);
        assert!(matches!(
            config.validate(),
            Err(SampleError::InvalidConfig(_))
        ));
    }
}

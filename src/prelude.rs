//! # Prelude
//!
//! Commonly used types, for driving the sample program against a backend
//! without a long list of imports.
//!
//! ```rust
//! use aabb_sample::prelude::*;
//! ```

pub use crate::config::SampleConfig;
pub use crate::error::{Result, SampleError};
pub use crate::gfx::backend::{
    AccelHandle, BufferHandle, BufferInit, GeomHandle, RayTracingBackend, SbtScope,
};
pub use crate::gfx::camera::{CameraError, CameraManager, CameraState, RayGenCamera, Viewport};
pub use crate::scene::{FrameInput, SampleProgram, SphereScene, TraversalMode};

// Re-export commonly used external types
pub use cgmath::Vector3;
pub use imgui::Ui;

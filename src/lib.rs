// src/lib.rs
//! AABB Sample
//!
//! Ray traces a row of spheres described as user-defined bounding-box
//! geometry, with an arcball camera and a small ImGui overlay, on wgpu and winit.

pub mod app;
pub mod config;
pub mod error;
pub mod gfx;
pub mod prelude;
pub mod scene;
pub mod ui;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::SampleApp;
pub use config::SampleConfig;
pub use error::{Result, SampleError};

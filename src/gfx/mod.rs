//! # Graphics Module
//!
//! Everything that touches the GPU or the camera.
//!
//! ## Architecture Overview
//!
//! - **Camera System** ([`camera`]) - Arcball orbit math and per-frame input handling
//! - **Backend** ([`backend`]) - The ray-tracing API the sample is written against,
//!   plus its wgpu implementation
//! - **Context** ([`context`]) - Device, queue and window surface creation
//! - **Rendering** ([`rendering`]) - Presenting the traced frame buffer
//!
//! ## Usage
//!
//! The sample drives the backend through [`SampleProgram`], which only needs a
//! [`RayTracingBackend`]:
//!
//! ```no_run
//! use aabb_sample::{gfx::backend::RayTracingBackend, scene::SampleProgram, SampleConfig};
//!
//! fn trace_once<B: RayTracingBackend>(backend: &mut B) -> aabb_sample::Result<()> {
//!     let mut program = SampleProgram::setup(backend, &SampleConfig::default())?;
//!     program.frame(backend, Default::default())?;
//!     program.finish(backend)
//! }
//! ```
//!
//! [`SampleProgram`]: crate::scene::SampleProgram
//! [`RayTracingBackend`]: backend::RayTracingBackend

pub mod backend;
pub mod camera;
pub mod context;
pub mod rendering;

// Re-export commonly used types
pub use backend::WgpuBackend;
pub use context::GpuContext;
pub use rendering::PresentPass;

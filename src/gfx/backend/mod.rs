//! # Ray-Tracing Backend
//!
//! The seam between the sample's orchestration and whatever executes its GPU
//! programs. The sample only ever talks to [`RayTracingBackend`]: it creates
//! buffers, geometry and acceleration structures, stages per-program parameter
//! records, commits them with a shader-binding-table build and launches the
//! bounds and ray-generation programs.
//!
//! ## Parameter staging
//!
//! `set_*_params` calls only stage a record. Launches read the records that
//! were *committed* by the most recent [`RayTracingBackend::build_shader_binding_table`]
//! covering that program, so a frame that changes parameters must rebuild the
//! table before launching.
//!
//! [`WgpuBackend`] is the shipped implementation. It traverses a flat list of
//! primitives in compute shaders rather than building a hierarchy.

pub mod wgpu_backend;

#[cfg(test)]
pub(crate) mod recording;

use std::path::Path;

use crate::error::Result;
use crate::gfx::camera::RayGenCamera;

pub use wgpu_backend::WgpuBackend;

/// Device buffer owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u32);

/// AABB geometry owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeomHandle(pub(crate) u32);

/// Bottom- or top-level acceleration structure owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccelHandle(pub(crate) u32);

/// Bytes per primitive in an AABB buffer (two `vec3<f32>` corners).
pub const AABB_STRIDE: u64 = 6 * 4;
/// Bytes per sphere center in a vertex buffer.
pub const VERTEX_STRIDE: u64 = 3 * 4;
/// Bytes per packed RGBA8 pixel in a frame buffer.
pub const PIXEL_STRIDE: u64 = 4;

/// Initial contents of a device buffer.
#[derive(Debug, Clone, Copy)]
pub enum BufferInit<'a> {
    Data(&'a [u8]),
    Zeroed(u64),
}

impl BufferInit<'_> {
    pub fn size(&self) -> u64 {
        match self {
            BufferInit::Data(bytes) => bytes.len() as u64,
            BufferInit::Zeroed(size) => *size,
        }
    }
}

/// Which parameter records a shader-binding-table build commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbtScope {
    /// Compute programs only.
    Compute,
    /// Every program: compute, ray generation, miss and hit groups.
    All,
}

impl SbtScope {
    pub fn includes_ray_tracing(&self) -> bool {
        matches!(self, SbtScope::All)
    }
}

/// Parameters of the sphere bounds compute program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereBoundsParams {
    pub vertex: BufferHandle,
    pub radius: BufferHandle,
    /// Output, two `vec3` corners per primitive.
    pub aabbs: BufferHandle,
}

/// Per-geometry parameters of the sphere hit group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereGeomParams {
    pub vertex: BufferHandle,
    pub radius: BufferHandle,
    /// Stop traversal at the first accepted hit instead of searching for the closest.
    pub terminate_early: bool,
}

/// Parameters of the ray-generation program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayGenParams {
    pub frame_buffer: BufferHandle,
    pub world: AccelHandle,
    pub camera: RayGenCamera,
}

/// Checkerboard colours of the miss program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissParams {
    pub color0: [f32; 3],
    pub color1: [f32; 3],
}

/// GPU ray-tracing operations the sample is written against.
pub trait RayTracingBackend {
    fn create_buffer(&mut self, label: &str, init: BufferInit<'_>) -> Result<BufferHandle>;

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> Result<()>;

    fn set_bounds_params(&mut self, params: SphereBoundsParams) -> Result<()>;

    /// Runs the bounds program over `count` primitives.
    fn launch_bounds(&mut self, count: u32) -> Result<()>;

    /// Creates geometry over `count` boxes stored in `aabbs`.
    fn create_aabb_geom(&mut self, aabbs: BufferHandle, count: u32) -> Result<GeomHandle>;

    fn set_geom_params(&mut self, geom: GeomHandle, params: SphereGeomParams) -> Result<()>;

    fn destroy_geom(&mut self, geom: GeomHandle) -> Result<()>;

    fn create_aabb_accel(&mut self, geoms: &[GeomHandle]) -> Result<AccelHandle>;

    fn create_instance_accel(&mut self, instances: &[AccelHandle]) -> Result<AccelHandle>;

    fn build_accel(&mut self, accel: AccelHandle) -> Result<()>;

    fn destroy_accel(&mut self, accel: AccelHandle) -> Result<()>;

    fn set_raygen_params(&mut self, params: RayGenParams) -> Result<()>;

    fn set_miss_params(&mut self, params: MissParams) -> Result<()>;

    /// Commits staged parameter records for the programs in `scope`.
    fn build_shader_binding_table(&mut self, scope: SbtScope) -> Result<()>;

    /// Traces one `width` x `height` frame into the committed frame buffer.
    fn launch_raygen(&mut self, width: u32, height: u32) -> Result<()>;

    /// Reads back `buffer` as packed RGBA8 pixels and writes it as a PNG.
    fn save_image(
        &mut self,
        buffer: BufferHandle,
        width: u32,
        height: u32,
        path: &Path,
    ) -> Result<()>;
}

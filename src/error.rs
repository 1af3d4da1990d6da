//! Error types for the sample program

use thiserror::Error;

use crate::gfx::camera::CameraError;

pub type Result<T> = std::result::Result<T, SampleError>;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown {kind} handle #{id}")]
    InvalidHandle { kind: &'static str, id: u32 },

    #[error("acceleration structure #{0} has not been built")]
    AccelNotBuilt(u32),

    #[error("{0} parameters have not been committed to the shader binding table")]
    MissingParams(&'static str),

    #[error("buffer #{id} holds {size} bytes but {required} are required")]
    BufferTooSmall { id: u32, size: u64, required: u64 },

    #[error("not supported by this backend: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("failed to create a rendering surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("failed to request a GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to request a GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("failed to acquire the next swap-chain frame: {0}")]
    Frame(#[from] wgpu::SurfaceError),

    #[error("GPU readback failed: {0}")]
    Readback(String),

    #[error("GUI error: {0}")]
    Gui(String),

    #[error("failed to create the window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

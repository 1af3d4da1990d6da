pub mod arcball;
pub mod camera_controller;
pub mod camera_utils;

// Re-export main types
pub use arcball::{CameraError, CameraState, PointerDelta, RayGenBasis, Viewport};
pub use camera_controller::CameraController;
pub use camera_utils::{CameraManager, RayGenCamera};

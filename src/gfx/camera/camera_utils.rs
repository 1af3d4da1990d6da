use cgmath::Vector3;
use winit::event::WindowEvent;

use super::{
    arcball::{CameraState, RayGenBasis},
    camera_controller::CameraController,
};

pub struct CameraManager {
    pub camera: CameraState,
    pub controller: CameraController,
}

impl CameraManager {
    pub fn new(camera: CameraState, controller: CameraController) -> Self {
        Self { camera, controller }
    }

    pub fn process_event(&mut self, event: &WindowEvent) {
        self.controller.process_events(event);
    }

    /// Runs the controller for one frame against the owned camera
    pub fn tick(&mut self, gui_wants_pointer: bool) -> Option<RayGenCamera> {
        self.controller
            .tick(&mut self.camera, gui_wants_pointer)
            .map(|basis| RayGenCamera::from(&basis))
    }
}

/// GPU layout of the ray-generation camera.
///
/// Each vector is padded to 16 bytes to satisfy uniform buffer alignment.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Debug, Default, PartialEq)]
pub struct RayGenCamera {
    pub pos: [f32; 4],
    pub dir_00: [f32; 4],
    pub dir_du: [f32; 4],
    pub dir_dv: [f32; 4],
}

impl From<&RayGenBasis> for RayGenCamera {
    fn from(basis: &RayGenBasis) -> Self {
        Self {
            pos: pad_vector(basis.origin, 1.0),
            dir_00: pad_vector(basis.corner_dir, 0.0),
            dir_du: pad_vector(basis.du_axis, 0.0),
            dir_dv: pad_vector(basis.dv_axis, 0.0),
        }
    }
}

fn pad_vector(v: Vector3<f32>, w: f32) -> [f32; 4] {
    [v.x, v.y, v.z, w]
}

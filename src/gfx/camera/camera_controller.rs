use log::{debug, warn};
use winit::event::{ElementState, MouseButton, WindowEvent};

use super::arcball::{ray_gen_basis, CameraState, PointerDelta, RayGenBasis, Viewport};

/// Turns sampled pointer input into camera rotations, once per frame.
///
/// The cursor is sampled on every frame whether or not a drag is active, so the
/// delta applied on a drag frame is always the movement since the previous frame.
pub struct CameraController {
    pub cos_fovy: f32,
    viewport: Viewport,
    cursor: [f64; 2],
    previous_sample: [f64; 2],
    is_mouse_pressed: bool,
    first_frame: bool,
}

impl CameraController {
    pub fn new(viewport: Viewport, cos_fovy: f32) -> Self {
        Self {
            cos_fovy,
            viewport,
            cursor: [0.0; 2],
            previous_sample: [0.0; 2],
            is_mouse_pressed: false,
            first_frame: true,
        }
    }

    pub fn process_events(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.set_cursor([position.x, position.y]);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.set_primary_pressed(*state == ElementState::Pressed);
            }
            _ => (),
        }
    }

    pub fn set_cursor(&mut self, position: [f64; 2]) {
        self.cursor = position;
    }

    pub fn set_primary_pressed(&mut self, pressed: bool) {
        self.is_mouse_pressed = pressed;
    }

    /// Returns true if a drag should rotate the camera this frame
    pub fn is_rotating(&self, gui_wants_pointer: bool) -> bool {
        (self.is_mouse_pressed && !gui_wants_pointer) || self.first_frame
    }

    pub fn is_first_frame(&self) -> bool {
        self.first_frame
    }

    /// Samples the cursor and, on drag frames, orbits the camera.
    ///
    /// Returns the new ray-generation basis, or `None` when the camera was left
    /// alone and the previously committed basis stays valid.
    pub fn tick(
        &mut self,
        camera: &mut CameraState,
        gui_wants_pointer: bool,
    ) -> Option<RayGenBasis> {
        let current = self.cursor;
        let last = if self.first_frame {
            current
        } else {
            self.previous_sample
        };
        self.previous_sample = current;

        if !self.is_rotating(gui_wants_pointer) {
            return None;
        }
        self.first_frame = false;

        camera.orbit(&PointerDelta::new(last, current), self.viewport);

        match ray_gen_basis(camera, self.cos_fovy, self.viewport.aspect()) {
            Ok(basis) => {
                debug!("camera eye moved to {:?}", camera.eye);
                Some(basis)
            }
            Err(err) => {
                warn!("keeping previous ray-generation basis: {}", err);
                None
            }
        }
    }
}

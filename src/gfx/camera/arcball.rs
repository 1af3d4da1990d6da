//! Arcball-style orbit math for the ray-generation camera
//!
//! A pointer drag becomes two sequential single-axis rotations of the eye about
//! a fixed pivot. The first rotation is about the fixed `up` vector. The second
//! is about the "right" axis recomputed after the first. The ray-generation
//! basis is then rebuilt from scratch out of `eye`, `pivot` and `up`.
//!
//! Everything here is a pure function of its inputs. Degenerate geometry (eye on
//! the pivot, or a view direction parallel to `up`) never produces NaN. The
//! affected rotation is skipped, and basis construction reports
//! [`CameraError::DegenerateView`].

use cgmath::{InnerSpace, Quaternion, Rad, Rotation, Rotation3, Vector3};
use thiserror::Error;

/// Vectors shorter than this are treated as having no direction.
pub const DEGENERATE_EPSILON: f32 = 1e-6;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CameraError {
    #[error("view direction is undefined: eye coincides with pivot or looks along up")]
    DegenerateView,
}

/// Eye, look-at pivot and the fixed up vector of the orbit camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub eye: Vector3<f32>,
    pub pivot: Vector3<f32>,
    /// Rotation axis of the horizontal drag. Never re-derived from eye/pivot.
    pub up: Vector3<f32>,
}

impl CameraState {
    pub fn new(eye: Vector3<f32>, pivot: Vector3<f32>, up: Vector3<f32>) -> Self {
        Self { eye, pivot, up }
    }

    /// Unit vector from the eye towards the pivot, if one exists.
    pub fn forward(&self) -> Option<Vector3<f32>> {
        normalize_checked(self.pivot - self.eye)
    }

    /// Applies one frame of drag input, moving `eye` around `pivot`.
    pub fn orbit(&mut self, delta: &PointerDelta, viewport: Viewport) {
        self.eye = orbit(self, delta, viewport);
    }
}

/// Size of the traced image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Previous and current cursor samples, in window pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerDelta {
    pub last: [f64; 2],
    pub current: [f64; 2],
}

impl PointerDelta {
    pub fn new(last: [f64; 2], current: [f64; 2]) -> Self {
        Self { last, current }
    }

    /// A delta with no movement, anchored at `position`.
    pub fn stationary(position: [f64; 2]) -> Self {
        Self::new(position, position)
    }

    /// Rotation angles for this delta.
    ///
    /// Dragging across the full viewport width is a full turn (2π). Dragging
    /// across the full height is a half turn (π).
    pub fn angles(&self, viewport: Viewport) -> (Rad<f32>, Rad<f32>) {
        use std::f64::consts::PI;

        let per_pixel_x = 2.0 * PI / f64::from(viewport.width.max(1));
        let per_pixel_y = PI / f64::from(viewport.height.max(1));
        let angle_x = (self.last[0] - self.current[0]) * per_pixel_x;
        let angle_y = (self.last[1] - self.current[1]) * per_pixel_y;
        (Rad(angle_x as f32), Rad(angle_y as f32))
    }
}

/// The origin plus the three vectors a per-pixel ray direction is interpolated from.
///
/// The direction through normalized image coordinates `(u, v)` is
/// `corner_dir + u * du_axis + v * dv_axis`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayGenBasis {
    pub origin: Vector3<f32>,
    pub corner_dir: Vector3<f32>,
    pub du_axis: Vector3<f32>,
    pub dv_axis: Vector3<f32>,
}

impl RayGenBasis {
    pub fn direction(&self, u: f32, v: f32) -> Vector3<f32> {
        self.corner_dir + self.du_axis * u + self.dv_axis * v
    }

    /// Direction through the image center, equal to the unit forward vector.
    pub fn center_direction(&self) -> Vector3<f32> {
        self.direction(0.5, 0.5)
    }
}

/// Returns the eye position after applying one frame's drag.
pub fn orbit(camera: &CameraState, delta: &PointerDelta, viewport: Viewport) -> Vector3<f32> {
    let (angle_x, angle_y) = delta.angles(viewport);

    let offset = rotate_about(camera.eye - camera.pivot, camera.up, angle_x);

    // The second axis needs a view direction. With none, the vertical step is a no-op.
    let Some(to_pivot) = normalize_checked(-offset) else {
        return camera.pivot + offset;
    };
    let Some(right) = normalize_checked(camera.up.cross(to_pivot)) else {
        return camera.pivot + offset;
    };

    camera.pivot + rotate_about(offset, right, angle_y)
}

/// Builds the ray-generation basis for the current camera.
///
/// `cos_fovy` scales the image plane vertically. `aspect` additionally scales it
/// horizontally.
pub fn ray_gen_basis(
    camera: &CameraState,
    cos_fovy: f32,
    aspect: f32,
) -> Result<RayGenBasis, CameraError> {
    let forward = camera.forward().ok_or(CameraError::DegenerateView)?;
    let side = normalize_checked(forward.cross(camera.up)).ok_or(CameraError::DegenerateView)?;

    let du_axis = side * (cos_fovy * aspect);
    let dv_axis = du_axis.cross(forward).normalize() * cos_fovy;
    let corner_dir = forward - du_axis * 0.5 - dv_axis * 0.5;

    Ok(RayGenBasis {
        origin: camera.eye,
        corner_dir,
        du_axis,
        dv_axis,
    })
}

fn rotate_about(offset: Vector3<f32>, axis: Vector3<f32>, angle: Rad<f32>) -> Vector3<f32> {
    Quaternion::from_axis_angle(axis, angle).rotate_vector(offset)
}

fn normalize_checked(v: Vector3<f32>) -> Option<Vector3<f32>> {
    if v.magnitude2() < DEGENERATE_EPSILON * DEGENERATE_EPSILON {
        None
    } else {
        Some(v.normalize())
    }
}

//! # Sample Scene
//!
//! Sphere data, the traversal toggle, and [`SampleProgram`], which sequences
//! every backend call the sample makes: one-time setup, the per-frame
//! controller/commit/launch cycle, and shutdown with image export.
//!
//! ## Frame contract
//!
//! Every frame stages the geometry parameters with the selected
//! [`TraversalMode`], rebuilds the shader binding table and launches ray
//! generation, whether or not anything changed. The ray-generation camera is
//! re-staged only on frames where the controller moved it.

use std::path::PathBuf;

use log::info;
use winit::event::WindowEvent;

use crate::config::SampleConfig;
use crate::error::{Result, SampleError};
use crate::gfx::backend::{
    AccelHandle, BufferHandle, BufferInit, GeomHandle, MissParams, RayGenParams,
    RayTracingBackend, SbtScope, SphereBoundsParams, SphereGeomParams, AABB_STRIDE, PIXEL_STRIDE,
};
use crate::gfx::camera::{CameraController, CameraManager, RayGenCamera, Viewport};

/// Sphere centers and radii traced by the sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereScene {
    pub vertices: Vec<[f32; 3]>,
    pub radii: Vec<f32>,
}

impl Default for SphereScene {
    /// Eleven spheres along the x axis, growing towards the middle.
    fn default() -> Self {
        let vertices = (0..11).map(|i| [i as f32 * 0.1, 0.0, 0.0]).collect();
        let radii = vec![
            0.015, 0.025, 0.035, 0.045, 0.055, 0.065, 0.055, 0.045, 0.035, 0.025, 0.015,
        ];
        Self { vertices, radii }
    }
}

impl SphereScene {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(SampleError::InvalidConfig(
                "scene has no spheres".to_string(),
            ));
        }
        if self.vertices.len() != self.radii.len() {
            return Err(SampleError::InvalidConfig(format!(
                "{} sphere centers but {} radii",
                self.vertices.len(),
                self.radii.len()
            )));
        }
        if let Some(radius) = self.radii.iter().find(|r| !(**r > 0.0)) {
            return Err(SampleError::InvalidConfig(format!(
                "sphere radius must be positive, got {radius}"
            )));
        }
        Ok(())
    }

    pub fn primitive_count(&self) -> u32 {
        self.vertices.len() as u32
    }
}

/// The GUI's binary choice, forwarded to the hit group every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalMode {
    /// Keep traversing and report the closest hit.
    #[default]
    Complete,
    /// Stop at the first accepted hit.
    TerminateEarly,
}

impl TraversalMode {
    pub fn terminates_early(&self) -> bool {
        matches!(self, TraversalMode::TerminateEarly)
    }
}

/// Per-frame input gathered by the frame loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInput {
    /// The GUI captured the pointer on its last frame.
    pub gui_wants_pointer: bool,
    pub traversal: TraversalMode,
}

/// Backend resources created by [`SampleProgram::setup`].
#[derive(Debug, Clone, Copy)]
struct SceneResources {
    vertex_buffer: BufferHandle,
    radius_buffer: BufferHandle,
    aabb_buffer: BufferHandle,
    frame_buffer: BufferHandle,
    geom: GeomHandle,
    blas: AccelHandle,
    world: AccelHandle,
}

pub struct SampleProgram {
    pub camera_manager: CameraManager,
    frame_size: Viewport,
    output_path: PathBuf,
    resources: SceneResources,
    raygen: RayGenParams,
    frames: u64,
}

impl SampleProgram {
    /// Uploads the scene, computes its bounds, builds both acceleration levels
    /// and commits the initial shader binding table.
    pub fn setup<B: RayTracingBackend>(backend: &mut B, config: &SampleConfig) -> Result<Self> {
        config.validate()?;

        let scene = &config.scene;
        let count = scene.primitive_count();

        let vertex_buffer = backend.create_buffer(
            "Sphere Vertices",
            BufferInit::Data(bytemuck::cast_slice(&scene.vertices)),
        )?;
        let radius_buffer = backend.create_buffer(
            "Sphere Radii",
            BufferInit::Data(bytemuck::cast_slice(&scene.radii)),
        )?;
        let aabb_buffer = backend.create_buffer(
            "Sphere AABBs",
            BufferInit::Zeroed(u64::from(count) * AABB_STRIDE),
        )?;

        let geom = backend.create_aabb_geom(aabb_buffer, count)?;
        backend.set_geom_params(
            geom,
            SphereGeomParams {
                vertex: vertex_buffer,
                radius: radius_buffer,
                terminate_early: false,
            },
        )?;

        backend.set_bounds_params(SphereBoundsParams {
            vertex: vertex_buffer,
            radius: radius_buffer,
            aabbs: aabb_buffer,
        })?;

        // Bounds must exist before the bottom level can be built over them.
        backend.build_shader_binding_table(SbtScope::Compute)?;
        backend.launch_bounds(count)?;

        let blas = backend.create_aabb_accel(&[geom])?;
        backend.build_accel(blas)?;
        let world = backend.create_instance_accel(&[blas])?;
        backend.build_accel(world)?;

        let frame_size = config.frame_size;
        let frame_buffer = backend.create_buffer(
            "Frame Buffer",
            BufferInit::Zeroed(frame_size.pixel_count() * PIXEL_STRIDE),
        )?;

        let raygen = RayGenParams {
            frame_buffer,
            world,
            camera: RayGenCamera::default(),
        };
        backend.set_raygen_params(raygen)?;
        backend.set_miss_params(MissParams {
            color0: config.miss_colors[0],
            color1: config.miss_colors[1],
        })?;
        backend.build_shader_binding_table(SbtScope::All)?;

        info!("launching ...");

        let controller = CameraController::new(frame_size, config.cos_fovy);
        Ok(Self {
            camera_manager: CameraManager::new(config.camera, controller),
            frame_size,
            output_path: config.output_path.clone(),
            resources: SceneResources {
                vertex_buffer,
                radius_buffer,
                aabb_buffer,
                frame_buffer,
                geom,
                blas,
                world,
            },
            raygen,
            frames: 0,
        })
    }

    /// Feeds a window event to the camera controller.
    pub fn process_event(&mut self, event: &WindowEvent) {
        self.camera_manager.process_event(event);
    }

    /// Runs one frame: camera update, parameter commit and ray generation.
    pub fn frame<B: RayTracingBackend>(&mut self, backend: &mut B, input: FrameInput) -> Result<()> {
        if let Some(camera) = self.camera_manager.tick(input.gui_wants_pointer) {
            self.raygen.camera = camera;
            backend.set_raygen_params(self.raygen)?;
        }

        backend.set_geom_params(
            self.resources.geom,
            SphereGeomParams {
                vertex: self.resources.vertex_buffer,
                radius: self.resources.radius_buffer,
                terminate_early: input.traversal.terminates_early(),
            },
        )?;

        backend.build_shader_binding_table(SbtScope::All)?;
        backend.launch_raygen(self.frame_size.width, self.frame_size.height)?;

        self.frames += 1;
        Ok(())
    }

    pub fn frame_buffer(&self) -> BufferHandle {
        self.resources.frame_buffer
    }

    pub fn frame_size(&self) -> Viewport {
        self.frame_size
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// Saves the last frame and releases every backend resource, newest first.
    pub fn finish<B: RayTracingBackend>(self, backend: &mut B) -> Result<()> {
        let resources = self.resources;
        backend.save_image(
            resources.frame_buffer,
            self.frame_size.width,
            self.frame_size.height,
            &self.output_path,
        )?;

        // Reverse of creation order.
        backend.destroy_buffer(resources.frame_buffer)?;
        backend.destroy_accel(resources.world)?;
        backend.destroy_accel(resources.blas)?;
        backend.destroy_geom(resources.geom)?;
        backend.destroy_buffer(resources.aabb_buffer)?;
        backend.destroy_buffer(resources.radius_buffer)?;
        backend.destroy_buffer(resources.vertex_buffer)?;

        info!(
            "finished after {} frames, image written to {}",
            self.frames,
            self.output_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::recording::{Call, RecordingBackend};
    use cgmath::{InnerSpace, Vector3};

    fn setup() -> (RecordingBackend, SampleProgram) {
        let mut backend = RecordingBackend::new();
        let program = SampleProgram::setup(&mut backend, &SampleConfig::default()).unwrap();
        (backend, program)
    }

    #[test]
    fn test_default_scene_matches_reference_data() {
        let scene = SphereScene::default();
        assert_eq!(scene.len(), 11);
        assert_eq!(scene.vertices[5], [0.5, 0.0, 0.0]);
        assert!((scene.vertices[10][0] - 1.0).abs() < 1e-6);
        assert_eq!(scene.radii[5], 0.065);
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn test_mismatched_radii_rejected() {
        let mut scene = SphereScene::default();
        scene.radii.pop();
        assert!(matches!(scene.validate(), Err(SampleError::InvalidConfig(_))));
    }

    #[test]
    fn test_setup_sequence() {
        let (backend, _program) = setup();

        let expected = vec![
            Call::CreateBuffer {
                label: "Sphere Vertices".to_string(),
                size: 11 * 12,
            },
            Call::CreateBuffer {
                label: "Sphere Radii".to_string(),
                size: 11 * 4,
            },
            Call::CreateBuffer {
                label: "Sphere AABBs".to_string(),
                size: 11 * 24,
            },
            Call::CreateAabbGeom { count: 11 },
            Call::SetGeomParams {
                terminate_early: false,
            },
            Call::SetBoundsParams,
            Call::BuildSbt(SbtScope::Compute),
            Call::LaunchBounds(11),
            Call::CreateAabbAccel,
        ];
        assert_eq!(&backend.calls[..expected.len()], expected.as_slice());

        let tail = &backend.calls[expected.len()..];
        assert!(matches!(tail[0], Call::BuildAccel(_)));
        assert_eq!(tail[1], Call::CreateInstanceAccel);
        assert!(matches!(tail[2], Call::BuildAccel(_)));
        assert_eq!(
            tail[3],
            Call::CreateBuffer {
                label: "Frame Buffer".to_string(),
                size: 1400 * 460 * 4,
            }
        );
        assert_eq!(
            &tail[4..],
            &[
                Call::SetRayGenParams,
                Call::SetMissParams,
                Call::BuildSbt(SbtScope::All),
            ]
        );

        let miss = backend.committed_miss.unwrap();
        assert_eq!(miss.color0, [0.1, 0.1, 0.1]);
        assert_eq!(miss.color1, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_first_frame_commits_camera_before_launch() {
        let (mut backend, mut program) = setup();

        program.frame(&mut backend, FrameInput::default()).unwrap();

        let (params, _) = backend.launched_with[0];
        assert_eq!(params.camera.pos, [0.5, 0.0, 0.6, 1.0]);
        assert_ne!(params.camera.dir_du, [0.0; 4]);
        assert_eq!(
            backend.calls.last(),
            Some(&Call::LaunchRayGen {
                width: 1400,
                height: 460
            })
        );
    }

    #[test]
    fn test_sbt_rebuilt_every_frame() {
        let (mut backend, mut program) = setup();
        let before = backend.count(|call| *call == Call::BuildSbt(SbtScope::All));

        for _ in 0..5 {
            program.frame(&mut backend, FrameInput::default()).unwrap();
        }

        let after = backend.count(|call| *call == Call::BuildSbt(SbtScope::All));
        assert_eq!(after - before, 5);
        assert_eq!(backend.launched_with.len(), 5);
        // Only the first frame moved the camera.
        assert_eq!(backend.count(|call| *call == Call::SetRayGenParams), 2);
        assert_eq!(program.frames_rendered(), 5);
    }

    #[test]
    fn test_traversal_choice_forwarded_each_frame() {
        let (mut backend, mut program) = setup();

        program.frame(&mut backend, FrameInput::default()).unwrap();
        program
            .frame(
                &mut backend,
                FrameInput {
                    gui_wants_pointer: false,
                    traversal: TraversalMode::TerminateEarly,
                },
            )
            .unwrap();
        program.frame(&mut backend, FrameInput::default()).unwrap();

        let flags: Vec<bool> = backend.launched_with.iter().map(|(_, early)| *early).collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn test_drag_updates_committed_camera() {
        let (mut backend, mut program) = setup();
        program.frame(&mut backend, FrameInput::default()).unwrap();

        let controller = &mut program.camera_manager.controller;
        controller.set_primary_pressed(true);
        controller.set_cursor([-700.0, 0.0]);
        program.frame(&mut backend, FrameInput::default()).unwrap();

        let eye = program.camera_manager.camera.eye;
        assert!((eye - Vector3::new(0.5, 0.0, -0.6)).magnitude() < 1e-5);

        let (params, _) = backend.launched_with[1];
        assert!((params.camera.pos[2] + 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_gui_capture_keeps_stale_camera() {
        let (mut backend, mut program) = setup();
        program.frame(&mut backend, FrameInput::default()).unwrap();

        let controller = &mut program.camera_manager.controller;
        controller.set_primary_pressed(true);
        controller.set_cursor([300.0, 40.0]);
        program
            .frame(
                &mut backend,
                FrameInput {
                    gui_wants_pointer: true,
                    traversal: TraversalMode::Complete,
                },
            )
            .unwrap();

        assert_eq!(backend.launched_with[0].0, backend.launched_with[1].0);
    }

    #[test]
    fn test_finish_saves_image_and_releases_resources() {
        let (mut backend, mut program) = setup();
        program.frame(&mut backend, FrameInput::default()).unwrap();
        assert_eq!(backend.live_resources(), 7);

        program.finish(&mut backend).unwrap();

        assert!(backend.calls.contains(&Call::SaveImage {
            path: PathBuf::from("sample_program.png"),
        }));
        assert_eq!(backend.live_resources(), 0);
    }

    #[test]
    fn test_finish_releases_in_reverse_creation_order() {
        let (mut backend, mut program) = setup();
        program.frame(&mut backend, FrameInput::default()).unwrap();
        let r = program.resources;

        program.finish(&mut backend).unwrap();

        let released: Vec<Call> = backend
            .calls
            .iter()
            .skip_while(|call| !matches!(call, Call::SaveImage { .. }))
            .skip(1)
            .cloned()
            .collect();
        assert_eq!(
            released,
            vec![
                Call::DestroyBuffer(r.frame_buffer),
                Call::DestroyAccel(r.world),
                Call::DestroyAccel(r.blas),
                Call::DestroyGeom(r.geom),
                Call::DestroyBuffer(r.aabb_buffer),
                Call::DestroyBuffer(r.radius_buffer),
                Call::DestroyBuffer(r.vertex_buffer),
            ]
        );
    }

    #[test]
    fn test_invalid_config_fails_before_backend_calls() {
        let mut backend = RecordingBackend::new();
        let mut config = SampleConfig::default();
        config.scene.radii.clear();

        assert!(SampleProgram::setup(&mut backend, &config).is_err());
        assert!(backend.calls.is_empty());
    }
}

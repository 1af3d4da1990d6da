//! wgpu implementation of [`RayTracingBackend`]
//!
//! Programs run as compute shaders. Acceleration structures are flat: building
//! one resolves which AABB geometry it covers, and the ray-generation kernel
//! tests every primitive of that geometry. Only one AABB geometry per world is
//! supported.

use std::{collections::HashMap, path::Path, sync::Arc};

use log::{debug, info};
use wgpu::util::DeviceExt;
use wgpu::{BindGroup, BindGroupLayout, ComputePipeline, Device, Queue};

use super::{
    AccelHandle, BufferHandle, BufferInit, GeomHandle, MissParams, RayGenParams,
    RayTracingBackend, SbtScope, SphereBoundsParams, SphereGeomParams, AABB_STRIDE, PIXEL_STRIDE,
    VERTEX_STRIDE,
};
use crate::error::{Result, SampleError};
use crate::gfx::camera::RayGenCamera;
use crate::wgpu_utils::{
    binding_types::{compute_entries, storage_buffer_read_only, storage_buffer_read_write, uniform},
    UniformBuffer,
};

const BOUNDS_WORKGROUP: u32 = 64;
const RAYGEN_WORKGROUP: (u32, u32) = (8, 8);

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct BoundsLaunchUniform {
    count: u32,
    _padding: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct RayGenUniform {
    camera: RayGenCamera,
    prim_count: u32,
    terminate_early: u32,
    _padding: [u32; 2],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct MissUniform {
    color0: [f32; 4],
    color1: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct LaunchDimsUniform {
    width: u32,
    height: u32,
    _padding: [u32; 2],
}

struct ComputeProgram {
    pipeline: ComputePipeline,
    layout: BindGroupLayout,
}

impl ComputeProgram {
    fn new(
        device: &Device,
        label: &str,
        source: &str,
        entry_point: &str,
        bindings: &[wgpu::BindingType],
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label} Layout")),
            entries: &compute_entries(bindings),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} Pipeline Layout")),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some(entry_point),
            compilation_options: Default::default(),
            cache: None,
        });

        Self { pipeline, layout }
    }
}

struct GeomRecord {
    aabbs: BufferHandle,
    count: u32,
    staged: Option<SphereGeomParams>,
    committed: Option<SphereGeomParams>,
}

enum AccelKind {
    Aabb(Vec<GeomHandle>),
    Instance(Vec<AccelHandle>),
}

struct AccelRecord {
    kind: AccelKind,
    /// Geometry the flat structure resolved to, set by a build.
    resolved: Option<GeomHandle>,
}

struct RayGenBinding {
    bind_group: BindGroup,
    frame_buffer: BufferHandle,
}

#[derive(Default)]
struct StagedParams {
    bounds: Option<SphereBoundsParams>,
    raygen: Option<RayGenParams>,
    miss: Option<MissParams>,
}

pub struct WgpuBackend {
    device: Arc<Device>,
    queue: Arc<Queue>,
    next_id: u32,

    buffers: HashMap<u32, wgpu::Buffer>,
    geoms: HashMap<u32, GeomRecord>,
    accels: HashMap<u32, AccelRecord>,

    bounds_program: ComputeProgram,
    raygen_program: ComputeProgram,

    staged: StagedParams,
    committed_bounds: Option<SphereBoundsParams>,
    committed_miss: Option<MissParams>,

    bounds_launch: UniformBuffer<BoundsLaunchUniform>,
    raygen_uniform: UniformBuffer<RayGenUniform>,
    miss_uniform: UniformBuffer<MissUniform>,
    launch_dims: UniformBuffer<LaunchDimsUniform>,

    bounds_bind_group: Option<BindGroup>,
    raygen_binding: Option<RayGenBinding>,
}

impl WgpuBackend {
    pub fn new(device: Arc<Device>, queue: Arc<Queue>) -> Self {
        let bounds_program = ComputeProgram::new(
            &device,
            "Sphere Bounds",
            include_str!("shaders/sphere_bounds.wgsl"),
            "sphere_bounds",
            &[
                storage_buffer_read_only(),
                storage_buffer_read_only(),
                storage_buffer_read_write(),
                uniform(),
            ],
        );

        let raygen_program = ComputeProgram::new(
            &device,
            "Sphere RayGen",
            include_str!("shaders/sphere_raygen.wgsl"),
            "sample_raygen",
            &[
                storage_buffer_read_only(),
                storage_buffer_read_only(),
                storage_buffer_read_only(),
                storage_buffer_read_write(),
                uniform(),
                uniform(),
                uniform(),
            ],
        );

        Self {
            bounds_launch: UniformBuffer::new(&device),
            raygen_uniform: UniformBuffer::new(&device),
            miss_uniform: UniformBuffer::new(&device),
            launch_dims: UniformBuffer::new(&device),
            device,
            queue,
            next_id: 0,
            buffers: HashMap::new(),
            geoms: HashMap::new(),
            accels: HashMap::new(),
            bounds_program,
            raygen_program,
            staged: StagedParams::default(),
            committed_bounds: None,
            committed_miss: None,
            bounds_bind_group: None,
            raygen_binding: None,
        }
    }

    /// The wgpu buffer behind `handle`
    pub fn buffer(&self, handle: BufferHandle) -> Result<&wgpu::Buffer> {
        self.buffers
            .get(&handle.0)
            .ok_or(SampleError::InvalidHandle {
                kind: "buffer",
                id: handle.0,
            })
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn geom(&self, handle: GeomHandle) -> Result<&GeomRecord> {
        self.geoms.get(&handle.0).ok_or(SampleError::InvalidHandle {
            kind: "geometry",
            id: handle.0,
        })
    }

    fn accel(&self, handle: AccelHandle) -> Result<&AccelRecord> {
        self.accels.get(&handle.0).ok_or(SampleError::InvalidHandle {
            kind: "acceleration structure",
            id: handle.0,
        })
    }

    fn require_size(&self, handle: BufferHandle, required: u64) -> Result<()> {
        let size = self.buffer(handle)?.size();
        if size < required {
            return Err(SampleError::BufferTooSmall {
                id: handle.0,
                size,
                required,
            });
        }
        Ok(())
    }

    /// Resolves the single AABB geometry reachable from `accel`.
    fn resolve_geometry(&self, accel: AccelHandle) -> Result<GeomHandle> {
        let mut found = Vec::new();
        match &self.accel(accel)?.kind {
            AccelKind::Aabb(geoms) => {
                for geom in geoms {
                    self.geom(*geom)?;
                    found.push(*geom);
                }
            }
            AccelKind::Instance(instances) => {
                for instance in instances {
                    let record = self.accel(*instance)?;
                    if matches!(record.kind, AccelKind::Instance(_)) {
                        return Err(SampleError::Unsupported(
                            "instance structures must reference bottom-level structures".to_string(),
                        ));
                    }
                    found.push(record.resolved.ok_or(SampleError::AccelNotBuilt(instance.0))?);
                }
            }
        }

        match found.as_slice() {
            [geom] => Ok(*geom),
            _ => Err(SampleError::Unsupported(format!(
                "flat traversal needs exactly one AABB geometry per world, found {}",
                found.len()
            ))),
        }
    }

    fn commit_bounds(&mut self) -> Result<()> {
        let Some(params) = self.staged.bounds else {
            return Ok(());
        };

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sphere Bounds Bind Group"),
            layout: &self.bounds_program.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.buffer(params.vertex)?.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.buffer(params.radius)?.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.buffer(params.aabbs)?.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.bounds_launch.binding_resource(),
                },
            ],
        });

        self.bounds_bind_group = Some(bind_group);
        self.committed_bounds = Some(params);
        Ok(())
    }

    fn commit_ray_tracing(&mut self) -> Result<()> {
        for geom in self.geoms.values_mut() {
            if let Some(params) = geom.staged {
                geom.committed = Some(params);
            }
        }

        if let Some(miss) = self.staged.miss {
            self.miss_uniform.update_content(
                &self.queue,
                MissUniform {
                    color0: [miss.color0[0], miss.color0[1], miss.color0[2], 1.0],
                    color1: [miss.color1[0], miss.color1[1], miss.color1[2], 1.0],
                },
            );
            self.committed_miss = Some(miss);
        }

        let Some(params) = self.staged.raygen else {
            return Ok(());
        };
        if self.committed_miss.is_none() {
            return Err(SampleError::MissingParams("miss"));
        }

        let geom_handle = self
            .accel(params.world)?
            .resolved
            .ok_or(SampleError::AccelNotBuilt(params.world.0))?;
        let (aabbs, count, geom_params) = {
            let geom = self.geom(geom_handle)?;
            let geom_params = geom.committed.ok_or(SampleError::MissingParams("geometry"))?;
            (geom.aabbs, geom.count, geom_params)
        };

        self.raygen_uniform.update_content(
            &self.queue,
            RayGenUniform {
                camera: params.camera,
                prim_count: count,
                terminate_early: u32::from(geom_params.terminate_early),
                _padding: [0; 2],
            },
        );

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sphere RayGen Bind Group"),
            layout: &self.raygen_program.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.buffer(aabbs)?.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.buffer(geom_params.vertex)?.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.buffer(geom_params.radius)?.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.buffer(params.frame_buffer)?.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: self.raygen_uniform.binding_resource(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: self.miss_uniform.binding_resource(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: self.launch_dims.binding_resource(),
                },
            ],
        });

        self.raygen_binding = Some(RayGenBinding {
            bind_group,
            frame_buffer: params.frame_buffer,
        });
        Ok(())
    }

    fn invalidate_bindings(&mut self) {
        self.bounds_bind_group = None;
        self.committed_bounds = None;
        self.raygen_binding = None;
    }

    fn dispatch(
        &self,
        label: &str,
        pipeline: &ComputePipeline,
        bind_group: &BindGroup,
        workgroups: (u32, u32),
    ) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });

            compute_pass.set_pipeline(pipeline);
            compute_pass.set_bind_group(0, bind_group, &[]);
            compute_pass.dispatch_workgroups(workgroups.0, workgroups.1, 1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn read_buffer(&self, handle: BufferHandle, size: u64) -> Result<Vec<u8>> {
        let source = self.buffer(handle)?;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| SampleError::Readback(err.to_string()))?;

        receiver
            .recv()
            .map_err(|err| SampleError::Readback(err.to_string()))?
            .map_err(|err| SampleError::Readback(err.to_string()))?;

        let bytes = buffer_slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }
}

impl RayTracingBackend for WgpuBackend {
    fn create_buffer(&mut self, label: &str, init: BufferInit<'_>) -> Result<BufferHandle> {
        if init.size() == 0 {
            return Err(SampleError::Unsupported(format!(
                "buffer '{label}' would be empty"
            )));
        }

        let usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;
        let buffer = match init {
            BufferInit::Data(contents) => {
                self.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(label),
                        contents,
                        usage,
                    })
            }
            BufferInit::Zeroed(size) => self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
                usage,
                mapped_at_creation: false,
            }),
        };

        let id = self.allocate_id();
        debug!("created buffer #{} '{}' ({} bytes)", id, label, buffer.size());
        self.buffers.insert(id, buffer);
        Ok(BufferHandle(id))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> Result<()> {
        let removed = self.buffers.remove(&buffer.0).ok_or(SampleError::InvalidHandle {
            kind: "buffer",
            id: buffer.0,
        })?;
        removed.destroy();
        self.invalidate_bindings();
        Ok(())
    }

    fn set_bounds_params(&mut self, params: SphereBoundsParams) -> Result<()> {
        self.staged.bounds = Some(params);
        Ok(())
    }

    fn launch_bounds(&mut self, count: u32) -> Result<()> {
        let params = self
            .committed_bounds
            .ok_or(SampleError::MissingParams("bounds"))?;

        let count_bytes = u64::from(count);
        self.require_size(params.vertex, count_bytes * VERTEX_STRIDE)?;
        self.require_size(params.radius, count_bytes * 4)?;
        self.require_size(params.aabbs, count_bytes * AABB_STRIDE)?;

        self.bounds_launch.update_content(
            &self.queue,
            BoundsLaunchUniform {
                count,
                _padding: [0; 3],
            },
        );

        let bind_group = self
            .bounds_bind_group
            .as_ref()
            .ok_or(SampleError::MissingParams("bounds"))?;
        self.dispatch(
            "Sphere Bounds Launch",
            &self.bounds_program.pipeline,
            bind_group,
            (count.div_ceil(BOUNDS_WORKGROUP), 1),
        );
        debug!("launched bounds program over {} primitives", count);
        Ok(())
    }

    fn create_aabb_geom(&mut self, aabbs: BufferHandle, count: u32) -> Result<GeomHandle> {
        self.require_size(aabbs, u64::from(count) * AABB_STRIDE)?;

        let id = self.allocate_id();
        self.geoms.insert(
            id,
            GeomRecord {
                aabbs,
                count,
                staged: None,
                committed: None,
            },
        );
        Ok(GeomHandle(id))
    }

    fn set_geom_params(&mut self, geom: GeomHandle, params: SphereGeomParams) -> Result<()> {
        let record = self.geoms.get_mut(&geom.0).ok_or(SampleError::InvalidHandle {
            kind: "geometry",
            id: geom.0,
        })?;
        record.staged = Some(params);
        Ok(())
    }

    fn destroy_geom(&mut self, geom: GeomHandle) -> Result<()> {
        self.geoms
            .remove(&geom.0)
            .ok_or(SampleError::InvalidHandle {
                kind: "geometry",
                id: geom.0,
            })?;
        self.invalidate_bindings();
        Ok(())
    }

    fn create_aabb_accel(&mut self, geoms: &[GeomHandle]) -> Result<AccelHandle> {
        for geom in geoms {
            self.geom(*geom)?;
        }

        let id = self.allocate_id();
        self.accels.insert(
            id,
            AccelRecord {
                kind: AccelKind::Aabb(geoms.to_vec()),
                resolved: None,
            },
        );
        Ok(AccelHandle(id))
    }

    fn create_instance_accel(&mut self, instances: &[AccelHandle]) -> Result<AccelHandle> {
        for instance in instances {
            self.accel(*instance)?;
        }

        let id = self.allocate_id();
        self.accels.insert(
            id,
            AccelRecord {
                kind: AccelKind::Instance(instances.to_vec()),
                resolved: None,
            },
        );
        Ok(AccelHandle(id))
    }

    fn build_accel(&mut self, accel: AccelHandle) -> Result<()> {
        let geom = self.resolve_geometry(accel)?;
        let count = self.geom(geom)?.count;

        if let Some(record) = self.accels.get_mut(&accel.0) {
            record.resolved = Some(geom);
        }
        info!(
            "built acceleration structure #{} over {} primitives",
            accel.0, count
        );
        Ok(())
    }

    fn destroy_accel(&mut self, accel: AccelHandle) -> Result<()> {
        self.accels
            .remove(&accel.0)
            .ok_or(SampleError::InvalidHandle {
                kind: "acceleration structure",
                id: accel.0,
            })?;
        self.invalidate_bindings();
        Ok(())
    }

    fn set_raygen_params(&mut self, params: RayGenParams) -> Result<()> {
        self.staged.raygen = Some(params);
        Ok(())
    }

    fn set_miss_params(&mut self, params: MissParams) -> Result<()> {
        self.staged.miss = Some(params);
        Ok(())
    }

    fn build_shader_binding_table(&mut self, scope: SbtScope) -> Result<()> {
        self.commit_bounds()?;
        if scope.includes_ray_tracing() {
            self.commit_ray_tracing()?;
        }
        Ok(())
    }

    fn launch_raygen(&mut self, width: u32, height: u32) -> Result<()> {
        let binding = self
            .raygen_binding
            .as_ref()
            .ok_or(SampleError::MissingParams("ray generation"))?;
        self.require_size(
            binding.frame_buffer,
            u64::from(width) * u64::from(height) * PIXEL_STRIDE,
        )?;

        self.launch_dims.update_content(
            &self.queue,
            LaunchDimsUniform {
                width,
                height,
                _padding: [0; 2],
            },
        );

        self.dispatch(
            "Sphere RayGen Launch",
            &self.raygen_program.pipeline,
            &binding.bind_group,
            (
                width.div_ceil(RAYGEN_WORKGROUP.0),
                height.div_ceil(RAYGEN_WORKGROUP.1),
            ),
        );
        Ok(())
    }

    fn save_image(
        &mut self,
        buffer: BufferHandle,
        width: u32,
        height: u32,
        path: &Path,
    ) -> Result<()> {
        let size = u64::from(width) * u64::from(height) * PIXEL_STRIDE;
        self.require_size(buffer, size)?;

        let pixels = self.read_buffer(buffer, size)?;
        let image = image::RgbaImage::from_raw(width, height, pixels).ok_or_else(|| {
            SampleError::Readback(format!("buffer does not hold a {width}x{height} image"))
        })?;
        image.save_with_format(path, image::ImageFormat::Png)?;

        info!("saved frame to {}", path.display());
        Ok(())
    }
}

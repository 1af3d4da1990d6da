//! In-memory backend that records every call, for sequencing tests

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{
    AccelHandle, BufferHandle, BufferInit, GeomHandle, MissParams, RayGenParams,
    RayTracingBackend, SbtScope, SphereBoundsParams, SphereGeomParams, PIXEL_STRIDE,
};
use crate::error::{Result, SampleError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateBuffer { label: String, size: u64 },
    DestroyBuffer(BufferHandle),
    SetBoundsParams,
    LaunchBounds(u32),
    CreateAabbGeom { count: u32 },
    SetGeomParams { terminate_early: bool },
    DestroyGeom(GeomHandle),
    CreateAabbAccel,
    CreateInstanceAccel,
    BuildAccel(AccelHandle),
    DestroyAccel(AccelHandle),
    SetRayGenParams,
    SetMissParams,
    BuildSbt(SbtScope),
    LaunchRayGen { width: u32, height: u32 },
    SaveImage { path: PathBuf },
}

enum AccelKind {
    Aabb(Vec<GeomHandle>),
    Instance(Vec<AccelHandle>),
}

struct AccelRecord {
    kind: AccelKind,
    built: bool,
}

#[derive(Default)]
pub(crate) struct RecordingBackend {
    pub(crate) calls: Vec<Call>,
    next_id: u32,
    buffers: HashMap<u32, u64>,
    geoms: HashMap<u32, Option<SphereGeomParams>>,
    accels: HashMap<u32, AccelRecord>,

    staged_bounds: Option<SphereBoundsParams>,
    staged_raygen: Option<RayGenParams>,
    staged_miss: Option<MissParams>,
    staged_geoms: HashMap<u32, SphereGeomParams>,

    pub(crate) committed_bounds: Option<SphereBoundsParams>,
    pub(crate) committed_raygen: Option<RayGenParams>,
    pub(crate) committed_miss: Option<MissParams>,
    /// Raygen parameters seen by each ray-generation launch, in order.
    pub(crate) launched_with: Vec<(RayGenParams, bool)>,
}

impl RecordingBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn live_resources(&self) -> usize {
        self.buffers.len() + self.geoms.len() + self.accels.len()
    }

    pub(crate) fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check_buffer(&self, handle: BufferHandle) -> Result<u64> {
        self.buffers
            .get(&handle.0)
            .copied()
            .ok_or(SampleError::InvalidHandle {
                kind: "buffer",
                id: handle.0,
            })
    }

    fn check_geom(&self, handle: GeomHandle) -> Result<()> {
        if self.geoms.contains_key(&handle.0) {
            Ok(())
        } else {
            Err(SampleError::InvalidHandle {
                kind: "geometry",
                id: handle.0,
            })
        }
    }

    fn accel(&self, handle: AccelHandle) -> Result<&AccelRecord> {
        self.accels.get(&handle.0).ok_or(SampleError::InvalidHandle {
            kind: "acceleration structure",
            id: handle.0,
        })
    }

    fn committed_geom(&self) -> Option<SphereGeomParams> {
        self.geoms.values().find_map(|params| *params)
    }
}

impl RayTracingBackend for RecordingBackend {
    fn create_buffer(&mut self, label: &str, init: BufferInit<'_>) -> Result<BufferHandle> {
        let id = self.allocate_id();
        self.buffers.insert(id, init.size());
        self.calls.push(Call::CreateBuffer {
            label: label.to_string(),
            size: init.size(),
        });
        Ok(BufferHandle(id))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> Result<()> {
        self.check_buffer(buffer)?;
        self.buffers.remove(&buffer.0);
        self.calls.push(Call::DestroyBuffer(buffer));
        Ok(())
    }

    fn set_bounds_params(&mut self, params: SphereBoundsParams) -> Result<()> {
        self.staged_bounds = Some(params);
        self.calls.push(Call::SetBoundsParams);
        Ok(())
    }

    fn launch_bounds(&mut self, count: u32) -> Result<()> {
        let params = self
            .committed_bounds
            .ok_or(SampleError::MissingParams("bounds"))?;
        self.check_buffer(params.aabbs)?;
        self.calls.push(Call::LaunchBounds(count));
        Ok(())
    }

    fn create_aabb_geom(&mut self, aabbs: BufferHandle, count: u32) -> Result<GeomHandle> {
        self.check_buffer(aabbs)?;
        let id = self.allocate_id();
        self.geoms.insert(id, None);
        self.calls.push(Call::CreateAabbGeom { count });
        Ok(GeomHandle(id))
    }

    fn set_geom_params(&mut self, geom: GeomHandle, params: SphereGeomParams) -> Result<()> {
        self.check_geom(geom)?;
        self.staged_geoms.insert(geom.0, params);
        self.calls.push(Call::SetGeomParams {
            terminate_early: params.terminate_early,
        });
        Ok(())
    }

    fn destroy_geom(&mut self, geom: GeomHandle) -> Result<()> {
        self.geoms.remove(&geom.0).ok_or(SampleError::InvalidHandle {
            kind: "geometry",
            id: geom.0,
        })?;
        self.calls.push(Call::DestroyGeom(geom));
        Ok(())
    }

    fn create_aabb_accel(&mut self, geoms: &[GeomHandle]) -> Result<AccelHandle> {
        for geom in geoms {
            self.check_geom(*geom)?;
        }
        let id = self.allocate_id();
        self.accels.insert(
            id,
            AccelRecord {
                kind: AccelKind::Aabb(geoms.to_vec()),
                built: false,
            },
        );
        self.calls.push(Call::CreateAabbAccel);
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
                built: false,
            },
        );
        self.calls.push(Call::CreateInstanceAccel);
        Ok(AccelHandle(id))
    }

    fn build_accel(&mut self, accel: AccelHandle) -> Result<()> {
        match &self.accel(accel)?.kind {
            AccelKind::Aabb(geoms) => {
                for geom in geoms {
                    self.check_geom(*geom)?;
                }
            }
            AccelKind::Instance(instances) => {
                for instance in instances {
                    if !self.accel(*instance)?.built {
                        return Err(SampleError::AccelNotBuilt(instance.0));
                    }
                }
            }
        }
        if let Some(record) = self.accels.get_mut(&accel.0) {
            record.built = true;
        }
        self.calls.push(Call::BuildAccel(accel));
        Ok(())
    }

    fn destroy_accel(&mut self, accel: AccelHandle) -> Result<()> {
        self.accels.remove(&accel.0).ok_or(SampleError::InvalidHandle {
            kind: "acceleration structure",
            id: accel.0,
        })?;
        self.calls.push(Call::DestroyAccel(accel));
        Ok(())
    }

    fn set_raygen_params(&mut self, params: RayGenParams) -> Result<()> {
        self.staged_raygen = Some(params);
        self.calls.push(Call::SetRayGenParams);
        Ok(())
    }

    fn set_miss_params(&mut self, params: MissParams) -> Result<()> {
        self.staged_miss = Some(params);
        self.calls.push(Call::SetMissParams);
        Ok(())
    }

    fn build_shader_binding_table(&mut self, scope: SbtScope) -> Result<()> {
        if self.staged_bounds.is_some() {
            self.committed_bounds = self.staged_bounds;
        }
        if scope.includes_ray_tracing() {
            for (id, params) in &self.staged_geoms {
                if let Some(committed) = self.geoms.get_mut(id) {
                    *committed = Some(*params);
                }
            }
            if self.staged_miss.is_some() {
                self.committed_miss = self.staged_miss;
            }
            if let Some(params) = self.staged_raygen {
                if self.committed_miss.is_none() {
                    return Err(SampleError::MissingParams("miss"));
                }
                if !self.accel(params.world)?.built {
                    return Err(SampleError::AccelNotBuilt(params.world.0));
                }
                self.committed_raygen = Some(params);
            }
        }
        self.calls.push(Call::BuildSbt(scope));
        Ok(())
    }

    fn launch_raygen(&mut self, width: u32, height: u32) -> Result<()> {
        let params = self
            .committed_raygen
            .ok_or(SampleError::MissingParams("ray generation"))?;
        let size = self.check_buffer(params.frame_buffer)?;
        let required = u64::from(width) * u64::from(height) * PIXEL_STRIDE;
        if size < required {
            return Err(SampleError::BufferTooSmall {
                id: params.frame_buffer.0,
                size,
                required,
            });
        }

        let terminate_early = self
            .committed_geom()
            .map(|geom| geom.terminate_early)
            .unwrap_or(false);
        self.launched_with.push((params, terminate_early));
        self.calls.push(Call::LaunchRayGen { width, height });
        Ok(())
    }

    fn save_image(
        &mut self,
        buffer: BufferHandle,
        _width: u32,
        _height: u32,
        path: &Path,
    ) -> Result<()> {
        self.check_buffer(buffer)?;
        self.calls.push(Call::SaveImage {
            path: path.to_path_buf(),
        });
        Ok(())
    }
}

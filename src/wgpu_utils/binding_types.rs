// src/wgpu_utils/binding_types.rs
//! WGPU binding type utilities

pub fn buffer(read_only: bool) -> wgpu::BindingType {
    wgpu::BindingType::Buffer {
        ty: wgpu::BufferBindingType::Storage { read_only },
        has_dynamic_offset: false,
        min_binding_size: None,
    }
}

pub fn storage_buffer_read_write() -> wgpu::BindingType {
    buffer(false)
}

pub fn storage_buffer_read_only() -> wgpu::BindingType {
    buffer(true)
}

pub fn uniform() -> wgpu::BindingType {
    wgpu::BindingType::Buffer {
        ty: wgpu::BufferBindingType::Uniform,
        has_dynamic_offset: false,
        min_binding_size: None,
    }
}

/// Layout entry for `binding` visible to `visibility`
pub fn entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    ty: wgpu::BindingType,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty,
        count: None,
    }
}

/// Layout entries for a compute program, one per binding type, numbered from zero
pub fn compute_entries(types: &[wgpu::BindingType]) -> Vec<wgpu::BindGroupLayoutEntry> {
    types
        .iter()
        .enumerate()
        .map(|(binding, ty)| entry(binding as u32, wgpu::ShaderStages::COMPUTE, *ty))
        .collect()
}

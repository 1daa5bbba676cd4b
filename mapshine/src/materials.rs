//! GPU side of a [`UniformSet`]: one uniform buffer and group-0 bind group
//! per material, plus a keyed cache for the group-1 texture bind groups.

use std::hash::{Hash, Hasher};

use bytemuck::Pod;
use hashbrown::HashMap;
use mapshine_common::uniforms::{MaterialId, UniformSet};
use wgpu::util::DeviceExt;

use crate::textures::GpuTexture;

struct MaterialBinding {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Uniform records of one pass mirrored into GPU buffers.
pub struct GpuMaterialSet<U: Pod> {
    pub set: UniformSet<U>,
    layout: wgpu::BindGroupLayout,
    bindings: HashMap<MaterialId, MaterialBinding>,
    label: &'static str,
}

impl<U: Pod> GpuMaterialSet<U> {
    pub fn new(device: &wgpu::Device, label: &'static str) -> Self {
        Self {
            set: UniformSet::new(),
            layout: uniform_layout(device, label),
            bindings: HashMap::new(),
            label,
        }
    }

    /// Layout of the group-0 uniform binding.
    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn create(&mut self, device: &wgpu::Device, initial: U) -> MaterialId {
        let id = self.set.create(initial);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(self.label),
            contents: bytemuck::bytes_of(&initial),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        self.bindings
            .insert(id, MaterialBinding { buffer, bind_group });
        id
    }

    pub fn dispose(&mut self, id: MaterialId) -> bool {
        if let Some(binding) = self.bindings.remove(&id) {
            binding.buffer.destroy();
        }
        self.set.dispose(id)
    }

    pub fn clear(&mut self) {
        for (_, binding) in self.bindings.drain() {
            binding.buffer.destroy();
        }
        self.set.clear();
    }

    /// Writes every dirty record. Returns how many were uploaded.
    pub fn upload(&mut self, queue: &wgpu::Queue) -> usize {
        let dirty = self.set.take_dirty();
        let mut written = 0;
        for id in dirty {
            if let (Some(binding), Some(value)) = (self.bindings.get(&id), self.set.get(id)) {
                queue.write_buffer(&binding.buffer, 0, bytemuck::bytes_of(value));
                written += 1;
            }
        }
        written
    }

    pub fn bind_group(&self, id: MaterialId) -> Option<&wgpu::BindGroup> {
        self.bindings.get(&id).map(|b| &b.bind_group)
    }
}

fn uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// Group-1 layout entry for a filterable 2D float texture.
pub fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

pub fn depth_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Depth,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

pub fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Linear clamp-to-edge sampler shared by every pass.
pub fn linear_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Mapshine Linear Sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// Key for detecting when a texture bind group needs recreation.
///
/// Texture ids change whenever a texture is replaced; mask generations
/// change on every publish, including republishing the same id.
#[derive(Hash, PartialEq, Eq, Default)]
pub struct TextureBindKey {
    pub texture_ids: Vec<u64>,
    pub generations: Vec<u64>,
}

impl TextureBindKey {
    pub fn new(textures: &[&GpuTexture], generations: Vec<u64>) -> Self {
        Self {
            texture_ids: textures.iter().map(|t| t.id).collect(),
            generations,
        }
    }

    pub fn hash_value(&self) -> u64 {
        let mut hasher = xxhash_rust::xxh3::Xxh3::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Frames an unused bind group survives. Two covers ping-pong targets
/// that alternate every frame.
const KEEP_FRAMES: u64 = 2;

/// Texture bind groups keyed by [`TextureBindKey`] hash.
///
/// Entries not requested for [`KEEP_FRAMES`] calls of [`Self::end_frame`]
/// are dropped, so replaced textures are released.
#[derive(Default)]
pub struct BindGroupCache {
    groups: HashMap<u64, (wgpu::BindGroup, u64)>,
    frame: u64,
}

impl BindGroupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(
        &mut self,
        key: &TextureBindKey,
        create: impl FnOnce() -> wgpu::BindGroup,
    ) -> wgpu::BindGroup {
        let hash = key.hash_value();
        let frame = self.frame;
        let entry = self.groups.entry(hash).or_insert_with(|| {
            tracing::trace!(key = hash, "texture bind group created");
            (create(), frame)
        });
        entry.1 = frame;
        entry.0.clone()
    }

    pub fn end_frame(&mut self) {
        self.frame += 1;
        let frame = self.frame;
        self.groups
            .retain(|_, (_, last_used)| frame - *last_used <= KEEP_FRAMES);
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

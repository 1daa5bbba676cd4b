//! GPU textures, fallbacks and the runtime mask registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use half::f16;
use mapshine_common::masks::FAR_DISTANCE_PX;
use mapshine_common::{
    ColorSpace, CoverageSpace, EffectError, EffectResult, FallbackKind, MaskEntry, MaskId,
    MaskRegistry,
};
use wgpu::util::DeviceExt;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// A sampled texture plus the id used in bind group cache keys.
#[derive(Debug)]
pub struct GpuTexture {
    pub id: u64,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl GpuTexture {
    fn wrap(texture: wgpu::Texture) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            width: texture.width(),
            height: texture.height(),
            format: texture.format(),
            texture,
            view,
        }
    }

    /// Uploads tightly packed texels of `format`.
    pub fn from_texels(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        texels: &[u8],
    ) -> EffectResult<Self> {
        let bytes_per_texel = format.block_copy_size(None).unwrap_or(4) as usize;
        let expected = width as usize * height as usize * bytes_per_texel;
        if width == 0 || height == 0 || texels.len() != expected {
            return Err(EffectError::InvalidImage {
                id: label.to_owned(),
                expected,
                actual: texels.len(),
            });
        }
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            texels,
        );
        tracing::debug!(label, width, height, ?format, "texture uploaded");
        Ok(Self::wrap(texture))
    }

    /// RGBA8 texels; sRGB sources are decoded by the sampler.
    pub fn rgba8(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
        color_space: ColorSpace,
    ) -> EffectResult<Self> {
        let format = match color_space {
            ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
        };
        Self::from_texels(device, queue, label, width, height, format, rgba)
    }

    /// Single-channel half float texels.
    pub fn r16f(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        values: &[f16],
    ) -> EffectResult<Self> {
        Self::from_texels(
            device,
            queue,
            label,
            width,
            height,
            wgpu::TextureFormat::R16Float,
            bytemuck::cast_slice(values),
        )
    }

    /// Render target that later passes sample.
    pub fn render_target(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        tracing::debug!(label, width, height, ?format, "render target created");
        Self::wrap(texture)
    }
}

/// 1×1 stand-ins for every [`FallbackKind`].
pub struct FallbackTextures {
    white: Arc<GpuTexture>,
    black: Arc<GpuTexture>,
    transparent: Arc<GpuTexture>,
    flat_normal: Arc<GpuTexture>,
    neutral_flow: Arc<GpuTexture>,
    far_distance: Arc<GpuTexture>,
}

impl FallbackTextures {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> EffectResult<Self> {
        let texel = |kind: FallbackKind| -> EffectResult<Arc<GpuTexture>> {
            GpuTexture::rgba8(
                device,
                queue,
                &format!("Fallback {kind:?}"),
                1,
                1,
                &kind.rgba8(),
                ColorSpace::Linear,
            )
            .map(Arc::new)
        };
        let far = GpuTexture::r16f(
            device,
            queue,
            "Fallback FarDistance",
            1,
            1,
            &[f16::from_f32(FAR_DISTANCE_PX)],
        )?;
        Ok(Self {
            white: texel(FallbackKind::White)?,
            black: texel(FallbackKind::Black)?,
            transparent: texel(FallbackKind::Transparent)?,
            flat_normal: texel(FallbackKind::FlatNormal)?,
            neutral_flow: texel(FallbackKind::NeutralFlow)?,
            far_distance: Arc::new(far),
        })
    }

    pub fn get(&self, kind: FallbackKind) -> &Arc<GpuTexture> {
        match kind {
            FallbackKind::White => &self.white,
            FallbackKind::Black => &self.black,
            FallbackKind::Transparent => &self.transparent,
            FallbackKind::FlatNormal => &self.flat_normal,
            FallbackKind::NeutralFlow => &self.neutral_flow,
            FallbackKind::FarDistance => &self.far_distance,
        }
    }
}

/// Mask registry holding GPU textures.
pub type GpuMaskRegistry = MaskRegistry<Arc<GpuTexture>>;

/// Mask resolution shared by every pass: registry first, fallback second.
pub struct MaskTextures {
    pub registry: GpuMaskRegistry,
    pub fallbacks: FallbackTextures,
}

impl MaskTextures {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> EffectResult<Self> {
        Ok(Self {
            registry: GpuMaskRegistry::new(),
            fallbacks: FallbackTextures::new(device, queue)?,
        })
    }

    pub fn is_present(&self, id: &MaskId) -> bool {
        self.registry.texture(id).is_some()
    }

    /// The published texture, or the documented fallback. Missing masks are
    /// logged once per scene.
    pub fn resolve(&mut self, id: &MaskId) -> Arc<GpuTexture> {
        if let Some(texture) = self.registry.texture(id) {
            return texture.clone();
        }
        self.registry.report_missing(id);
        self.fallbacks.get(id.fallback()).clone()
    }

    /// Like [`Self::resolve`] but silent; for optional derived masks that
    /// are absent in normal operation.
    pub fn resolve_quiet(&self, id: &MaskId) -> Arc<GpuTexture> {
        self.registry
            .texture(id)
            .cloned()
            .unwrap_or_else(|| self.fallbacks.get(id.fallback()).clone())
    }

    /// Publishes a texture under `id`; the color space follows the format.
    pub fn publish(&mut self, id: MaskId, texture: Arc<GpuTexture>, coverage: CoverageSpace) {
        let color_space = if texture.format.is_srgb() {
            ColorSpace::Srgb
        } else {
            ColorSpace::Linear
        };
        self.publish_encoded(id, texture, color_space, coverage);
    }

    /// Publishes texels whose encoding the sampler does not decode, such as
    /// sRGB albedo stored in a unorm texture and linearized in the shader.
    pub fn publish_encoded(
        &mut self,
        id: MaskId,
        texture: Arc<GpuTexture>,
        color_space: ColorSpace,
        coverage: CoverageSpace,
    ) {
        let (width, height) = (texture.width, texture.height);
        self.registry.publish(
            MaskEntry::new(id, Some(texture), width, height)
                .with_color_space(color_space)
                .with_coverage(coverage),
        );
    }

    pub fn unpublish(&mut self, id: &MaskId) {
        self.registry.unpublish(id);
    }

    /// Generations of `ids`, mixed into bind group cache keys.
    pub fn generations(&self, ids: &[MaskId]) -> Vec<u64> {
        ids.iter().map(|id| self.registry.generation(id)).collect()
    }
}

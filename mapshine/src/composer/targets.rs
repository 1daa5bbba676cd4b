//! Ping-pong color targets and the shared depth buffer.

use std::sync::Arc;

use glam::UVec2;

use crate::textures::GpuTexture;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Two scene-color targets plus depth, all at drawing-buffer size.
///
/// `read` always holds the current scene color. Surface passes draw into
/// it; post passes sample it and write `write`, then the two swap.
pub struct SceneTargets {
    read: Arc<GpuTexture>,
    write: Arc<GpuTexture>,
    #[allow(dead_code)] // Keeps the texture alive for depth_view
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    size: UVec2,
}

impl SceneTargets {
    pub fn new(device: &wgpu::Device, size: UVec2, format: wgpu::TextureFormat) -> Self {
        let size = size.max(UVec2::ONE);
        let (depth_texture, depth_view) = create_depth_texture(device, size);
        Self {
            read: Arc::new(GpuTexture::render_target(
                device,
                "Scene Color A",
                size.x,
                size.y,
                format,
            )),
            write: Arc::new(GpuTexture::render_target(
                device,
                "Scene Color B",
                size.x,
                size.y,
                format,
            )),
            depth_texture,
            depth_view,
            format,
            size,
        }
    }

    /// Recreates every target when the size changed. Returns true if it did.
    pub fn resize(&mut self, device: &wgpu::Device, size: UVec2) -> bool {
        let size = size.max(UVec2::ONE);
        if size == self.size {
            return false;
        }
        tracing::debug!(width = size.x, height = size.y, "resizing scene targets");
        *self = Self::new(device, size, self.format);
        true
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.read, &mut self.write);
    }

    pub fn read(&self) -> &Arc<GpuTexture> {
        &self.read
    }

    pub fn write(&self) -> &Arc<GpuTexture> {
        &self.write
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    /// Clears `read` to transparent black and depth to 1.
    pub fn clear(&self, encoder: &mut wgpu::CommandEncoder) {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.read.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }
}

fn create_depth_texture(device: &wgpu::Device, size: UVec2) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Scene Depth"),
        size: wgpu::Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

//! Present: copies the composed scene color into an output view.

use crate::materials::{BindGroupCache, TextureBindKey, linear_sampler, sampler_entry, texture_entry};
use crate::pipeline::{PipelineSpec, clear_attachment, color_target, create_pipeline};
use crate::shaders::{ShaderKind, create_module};
use crate::textures::GpuTexture;

/// Fullscreen blit into a fixed output format.
pub struct Presenter {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    bind_groups: BindGroupCache,
    format: wgpu::TextureFormat,
}

impl Presenter {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let module = create_module(device, ShaderKind::Blit);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blit Bind Group Layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });
        let pipeline = create_pipeline(
            device,
            &PipelineSpec {
                label: "Blit Pipeline",
                module: &module,
                bind_group_layouts: &[&layout],
                targets: &[color_target(format, None, wgpu::ColorWrites::ALL)],
                depth: None,
            },
        );
        Self {
            pipeline,
            layout,
            sampler: linear_sampler(device),
            bind_groups: BindGroupCache::new(),
            format,
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Draws `source` over the whole of `view`.
    pub fn blit(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        source: &GpuTexture,
        view: &wgpu::TextureView,
    ) {
        let key = TextureBindKey::new(&[source], Vec::new());
        let bind_group = self.bind_groups.get_or_create(&key, || {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Blit Bind Group"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&source.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            })
        });

        let mut blit_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Blit Pass"),
            color_attachments: &[clear_attachment(view, wgpu::Color::BLACK)],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        blit_pass.set_pipeline(&self.pipeline);
        blit_pass.set_bind_group(0, &bind_group, &[]);
        blit_pass.draw(0..3, 0..1);
    }

    pub fn end_frame(&mut self) {
        self.bind_groups.end_frame();
    }
}

//! Screen-space `windowLight.screen` target.
//!
//! Same pool shading as the additive overlay, written premultiplied with
//! `alpha = brightness` into a transparent screen-size target so roof
//! overlays can show light spilling through their gaps.

use std::sync::Arc;

use glam::UVec2;
use mapshine_common::uniforms::{MaterialId, WindowLightMaterial};
use mapshine_common::{CoverageSpace, MaskId};

use super::super::{ensure_published, withdraw};
use crate::materials::GpuMaterialSet;
use crate::pipeline::{PipelineSpec, clear_attachment, color_target, create_pipeline};
use crate::textures::{GpuTexture, MaskTextures};

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

pub(super) struct LightOnlyTarget {
    pub material: MaterialId,
    pipeline: wgpu::RenderPipeline,
    texture: Arc<GpuTexture>,
}

impl LightOnlyTarget {
    pub fn new(
        device: &wgpu::Device,
        module: &wgpu::ShaderModule,
        materials: &mut GpuMaterialSet<WindowLightMaterial>,
        texture_layout: &wgpu::BindGroupLayout,
        initial: WindowLightMaterial,
        size: UVec2,
    ) -> Self {
        let mut initial = initial;
        initial.pass.set_output_mode(true);
        let material = materials.create(device, initial);
        let pipeline = create_pipeline(
            device,
            &PipelineSpec {
                label: "Window Light-Only Pipeline",
                module,
                bind_group_layouts: &[materials.layout(), texture_layout],
                targets: &[color_target(FORMAT, None, wgpu::ColorWrites::ALL)],
                depth: None,
            },
        );
        Self {
            material,
            pipeline,
            texture: create_texture(device, size),
        }
    }

    pub fn texture(&self) -> &Arc<GpuTexture> {
        &self.texture
    }

    pub fn publish(&self, masks: &mut MaskTextures) {
        ensure_published(
            masks,
            &MaskId::WINDOW_LIGHT_SCREEN,
            &self.texture,
            CoverageSpace::ScreenUv,
        );
    }

    pub fn withdraw(&self, masks: &mut MaskTextures) {
        withdraw(masks, &MaskId::WINDOW_LIGHT_SCREEN, &self.texture);
    }

    pub fn resize(&mut self, device: &wgpu::Device, masks: &mut MaskTextures, size: UVec2) {
        self.withdraw(masks);
        self.texture = create_texture(device, size);
    }

    /// Clears the target and, when `bind_groups` is given, draws the pools.
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind_groups: Option<(&wgpu::BindGroup, &wgpu::BindGroup)>,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Window Light-Only Pass"),
            color_attachments: &[clear_attachment(
                &self.texture.view,
                wgpu::Color::TRANSPARENT,
            )],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        let Some((material, textures)) = bind_groups else {
            return;
        };
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, material, &[]);
        pass.set_bind_group(1, textures, &[]);
        pass.draw(0..6, 0..1);
    }
}

fn create_texture(device: &wgpu::Device, size: UVec2) -> Arc<GpuTexture> {
    Arc::new(GpuTexture::render_target(
        device,
        MaskId::WINDOW_LIGHT_SCREEN.as_str(),
        size.x,
        size.y,
        FORMAT,
    ))
}

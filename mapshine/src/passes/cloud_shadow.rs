//! Screen-space cloud shadows.
//!
//! Renders two R8 targets every frame before any consumer runs:
//! `cloudShadow.screen` (shaped light, 1 = lit) and
//! `cloudShadowRaw.screen` (raw coverage, 1 = covered). Both are in
//! screen UV.

use std::any::Any;
use std::sync::Arc;

use glam::UVec2;
use mapshine_common::uniforms::{CloudShadowBlock, CloudShadowMaterial, MaterialId};
use mapshine_common::{
    CloudShadowParams, ControlSchema, CoverageSpace, EffectError, EffectResult, MaskId, PassParams,
    ScaledClock, WindAccumulator,
};

use super::{ensure_published, withdraw};
use crate::materials::GpuMaterialSet;
use crate::pass::{EffectPass, PassContext, PassLayer, PassTargets};
use crate::pipeline::{PipelineSpec, clear_attachment, color_target, create_pipeline};
use crate::shaders::{ShaderKind, create_module};
use crate::textures::{GpuTexture, MaskTextures};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// Noise-space units per second at wind speed 1.
const WIND_DRIFT: f32 = 0.02;

pub struct CloudShadowPass {
    params: CloudShadowParams,
    enabled: bool,
    materials: GpuMaterialSet<CloudShadowMaterial>,
    material: MaterialId,
    pipeline: wgpu::RenderPipeline,
    shaped: Arc<GpuTexture>,
    raw: Arc<GpuTexture>,
    wind: WindAccumulator,
    evolution: ScaledClock,
}

impl CloudShadowPass {
    pub fn new(device: &wgpu::Device, params: CloudShadowParams, size: UVec2) -> Self {
        let params = params.sanitized();
        let mut materials = GpuMaterialSet::new(device, "Cloud Shadow Material");
        let material = materials.create(
            device,
            CloudShadowMaterial {
                pass: CloudShadowBlock::from_params(&params),
                ..Default::default()
            },
        );
        let module = create_module(device, ShaderKind::CloudShadow);
        let pipeline = create_pipeline(
            device,
            &PipelineSpec {
                label: "Cloud Shadow Pipeline",
                module: &module,
                bind_group_layouts: &[materials.layout()],
                targets: &[
                    color_target(TARGET_FORMAT, None, wgpu::ColorWrites::ALL),
                    color_target(TARGET_FORMAT, None, wgpu::ColorWrites::ALL),
                ],
                depth: None,
            },
        );
        let (shaped, raw) = create_targets(device, size);
        Self {
            params,
            enabled: true,
            materials,
            material,
            pipeline,
            shaped,
            raw,
            wind: WindAccumulator::default(),
            evolution: ScaledClock::default(),
        }
    }

    pub fn params(&self) -> &CloudShadowParams {
        &self.params
    }

    pub fn set_params(&mut self, params: CloudShadowParams) {
        self.params = params.sanitized();
    }

    fn withdraw_all(&self, masks: &mut MaskTextures) {
        withdraw(masks, &MaskId::CLOUD_SHADOW_SCREEN, &self.shaped);
        withdraw(masks, &MaskId::CLOUD_SHADOW_RAW_SCREEN, &self.raw);
    }
}

fn create_targets(device: &wgpu::Device, size: UVec2) -> (Arc<GpuTexture>, Arc<GpuTexture>) {
    let shaped = GpuTexture::render_target(
        device,
        MaskId::CLOUD_SHADOW_SCREEN.as_str(),
        size.x,
        size.y,
        TARGET_FORMAT,
    );
    let raw = GpuTexture::render_target(
        device,
        MaskId::CLOUD_SHADOW_RAW_SCREEN.as_str(),
        size.x,
        size.y,
        TARGET_FORMAT,
    );
    (Arc::new(shaped), Arc::new(raw))
}

impl EffectPass for CloudShadowPass {
    fn name(&self) -> &'static str {
        "cloudShadow"
    }

    fn layer(&self) -> PassLayer {
        PassLayer::Material
    }

    fn priority(&self) -> i32 {
        0
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn update(&mut self, ctx: &mut PassContext<'_>) -> EffectResult<()> {
        let frame = ctx.frame;
        let env = &frame.environment;
        let delta = frame.time.delta;

        self.wind.advance(
            env.wind_direction,
            env.wind_speed * self.params.wind_influence,
            delta,
            WIND_DRIFT,
        );
        self.evolution.advance(self.params.evolution_speed, delta);

        // Consumers fall back to "no clouds" while the pass is off.
        if self.enabled {
            ensure_published(
                ctx.masks,
                &MaskId::CLOUD_SHADOW_SCREEN,
                &self.shaped,
                CoverageSpace::ScreenUv,
            );
            ensure_published(
                ctx.masks,
                &MaskId::CLOUD_SHADOW_RAW_SCREEN,
                &self.raw,
                CoverageSpace::ScreenUv,
            );
        } else {
            self.withdraw_all(ctx.masks);
        }

        let params = &self.params;
        let wind = self.wind.offset;
        let evolution = self.evolution.time;
        self.materials.set.update(self.material, |m| {
            m.view = frame.view_block;
            m.env = frame.env_block;
            m.pass.apply_params(params);
            m.pass.set_motion(wind, evolution);
            Ok(())
        })
    }

    fn render(
        &mut self,
        ctx: &mut PassContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        _targets: &PassTargets<'_>,
    ) -> EffectResult<()> {
        self.materials.upload(ctx.queue);
        let Some(bind_group) = self.materials.bind_group(self.material) else {
            return Err(EffectError::HostNotReady("cloud material"));
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Cloud Shadow Pass"),
            color_attachments: &[
                clear_attachment(&self.shaped.view, wgpu::Color::WHITE),
                clear_attachment(&self.raw.view, wgpu::Color::BLACK),
            ],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }

    fn on_resize(&mut self, device: &wgpu::Device, masks: &mut MaskTextures, size: UVec2) {
        self.withdraw_all(masks);
        let (shaped, raw) = create_targets(device, size);
        self.shaped = shaped;
        self.raw = raw;
    }

    fn dispose(&mut self, masks: &mut MaskTextures) {
        self.withdraw_all(masks);
        self.materials.clear();
    }

    fn control_schema(&self) -> ControlSchema {
        CloudShadowParams::control_schema()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

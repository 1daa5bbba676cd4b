//! Window light pools over the base plane.
//!
//! Two draws of the same shader per frame: the light-only target first
//! (published as `windowLight.screen`), then the additive pool overlay into
//! the scene. Without a windows mask neither draws and nothing is
//! published.

mod light_only;

use std::any::Any;

use glam::UVec2;
use mapshine_common::uniforms::{MaterialId, WindowLightBlock, WindowLightMaterial};
use mapshine_common::{
    ControlSchema, EffectError, EffectResult, MaskId, PassParams, WindowLightParams,
};

use crate::materials::{
    BindGroupCache, GpuMaterialSet, TextureBindKey, linear_sampler, sampler_entry, texture_entry,
};
use crate::pass::{EffectPass, PassContext, PassLayer, PassTargets};
use crate::pipeline::{
    ADDITIVE, DepthPolicy, PipelineSpec, color_target, create_pipeline, load_attachment,
    load_depth,
};
use crate::shaders::{ShaderKind, create_module};
use crate::textures::{GpuTexture, MaskTextures};
use light_only::LightOnlyTarget;

/// Group-1 inputs in binding order.
const MASKS: [MaskId; 7] = [
    MaskId::WINDOWS,
    MaskId::OUTDOORS,
    MaskId::SPECULAR,
    MaskId::CLOUD_SHADOW_SCREEN,
    MaskId::ROOF_ALPHA_SCREEN,
    MaskId::RAIN_FLOW_MAP,
    MaskId::SPLASH_ATLAS,
];

pub struct WindowLightPass {
    params: WindowLightParams,
    enabled: bool,
    materials: GpuMaterialSet<WindowLightMaterial>,
    pool: MaterialId,
    texture_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,
    light_only: LightOnlyTarget,
    sampler: wgpu::Sampler,
    bind_groups: BindGroupCache,
    has_windows: bool,
}

impl WindowLightPass {
    pub fn new(
        device: &wgpu::Device,
        params: WindowLightParams,
        format: wgpu::TextureFormat,
        size: UVec2,
    ) -> Self {
        let params = params.sanitized();
        let mut materials = GpuMaterialSet::new(device, "Window Light Material");
        let initial = WindowLightMaterial {
            pass: WindowLightBlock::from_params(&params, 0.0),
            ..Default::default()
        };
        let pool = materials.create(device, initial);
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Window Light Textures"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                texture_entry(4),
                texture_entry(5),
                texture_entry(6),
                sampler_entry(7),
            ],
        });
        let module = create_module(device, ShaderKind::WindowLight);
        let pipeline = create_pipeline(
            device,
            &PipelineSpec {
                label: "Window Light Pipeline",
                module: &module,
                bind_group_layouts: &[materials.layout(), &texture_layout],
                targets: &[color_target(format, Some(ADDITIVE), wgpu::ColorWrites::ALL)],
                depth: Some(DepthPolicy::new(wgpu::CompareFunction::LessEqual, false)),
            },
        );
        let light_only = LightOnlyTarget::new(
            device,
            &module,
            &mut materials,
            &texture_layout,
            initial,
            size,
        );
        Self {
            params,
            enabled: true,
            materials,
            pool,
            texture_layout,
            pipeline,
            light_only,
            sampler: linear_sampler(device),
            bind_groups: BindGroupCache::new(),
            has_windows: false,
        }
    }

    pub fn params(&self) -> &WindowLightParams {
        &self.params
    }

    pub fn set_params(&mut self, params: WindowLightParams) {
        self.params = params.sanitized();
    }

    /// The pool overlay record as it will be uploaded.
    pub fn material(&self) -> Option<&WindowLightMaterial> {
        self.materials.set.get(self.pool)
    }

    /// The light-only target, published while a windows mask is present.
    pub fn light_only_texture(&self) -> &std::sync::Arc<GpuTexture> {
        self.light_only.texture()
    }

    fn publishes_light_only(&self) -> bool {
        self.enabled && self.has_windows && self.params.light_only_enabled
    }
}

impl EffectPass for WindowLightPass {
    fn name(&self) -> &'static str {
        "windowLight"
    }

    fn layer(&self) -> PassLayer {
        PassLayer::SurfaceEffects
    }

    fn priority(&self) -> i32 {
        10
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn update(&mut self, ctx: &mut PassContext<'_>) -> EffectResult<()> {
        let frame = ctx.frame;
        let precipitation = frame.environment.precipitation;
        let has_flow = ctx.masks.is_present(&MaskId::RAIN_FLOW_MAP);
        let flow_dir = frame.flow_default_direction;

        let was_present = self.has_windows;
        self.has_windows = ctx.masks.is_present(&MaskId::WINDOWS);
        if was_present != self.has_windows {
            tracing::info!(present = self.has_windows, "window mask changed");
        }
        if self.publishes_light_only() {
            self.light_only.publish(ctx.masks);
        } else {
            self.light_only.withdraw(ctx.masks);
        }

        let p = &self.params;
        let set = &mut self.materials.set;
        set.broadcast_view(&frame.view_block);
        set.broadcast_environment(&frame.env_block);
        let failed = set.broadcast(|m| {
            m.pass.apply_params(p, precipitation);
            m.pass.set_flow(flow_dir, has_flow);
            Ok(())
        });
        match failed.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }

    fn render(
        &mut self,
        ctx: &mut PassContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        targets: &PassTargets<'_>,
    ) -> EffectResult<()> {
        if !self.has_windows {
            return Ok(());
        }
        self.materials.upload(ctx.queue);
        let device = ctx.device;
        let masks = &mut *ctx.masks;

        let windows = masks.resolve(&MaskId::WINDOWS);
        let outdoors = masks.resolve(&MaskId::OUTDOORS);
        let specular = masks.resolve(&MaskId::SPECULAR);
        let cloud = masks.resolve_quiet(&MaskId::CLOUD_SHADOW_SCREEN);
        let roof_alpha = masks.resolve_quiet(&MaskId::ROOF_ALPHA_SCREEN);
        let flow = masks.resolve_quiet(&MaskId::RAIN_FLOW_MAP);
        let splash = masks.resolve_quiet(&MaskId::SPLASH_ATLAS);
        let inputs: [&GpuTexture; 7] = [
            &windows,
            &outdoors,
            &specular,
            &cloud,
            &roof_alpha,
            &flow,
            &splash,
        ];
        let key = TextureBindKey::new(&inputs, masks.generations(&MASKS));
        let textures = self.bind_groups.get_or_create(&key, || {
            let mut entries: Vec<wgpu::BindGroupEntry<'_>> = inputs
                .iter()
                .enumerate()
                .map(|(i, t)| wgpu::BindGroupEntry {
                    binding: i as u32,
                    resource: wgpu::BindingResource::TextureView(&t.view),
                })
                .collect();
            entries.push(wgpu::BindGroupEntry {
                binding: inputs.len() as u32,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Window Light Textures"),
                layout: &self.texture_layout,
                entries: &entries,
            })
        });
        self.bind_groups.end_frame();

        let pool = self
            .materials
            .bind_group(self.pool)
            .ok_or(EffectError::HostNotReady("window light material"))?;

        if self.params.light_only_enabled {
            let light_only = self
                .materials
                .bind_group(self.light_only.material)
                .ok_or(EffectError::HostNotReady("window light-only material"))?;
            self.light_only
                .render(encoder, Some((light_only, &textures)));
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Window Light Pass"),
            color_attachments: &[load_attachment(&targets.scene.view)],
            depth_stencil_attachment: load_depth(targets.depth),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, pool, &[]);
        pass.set_bind_group(1, &textures, &[]);
        pass.draw(0..6, 0..1);
        Ok(())
    }

    fn on_resize(&mut self, device: &wgpu::Device, masks: &mut MaskTextures, size: UVec2) {
        self.light_only.resize(device, masks, size);
    }

    fn dispose(&mut self, masks: &mut MaskTextures) {
        self.light_only.withdraw(masks);
        self.bind_groups.clear();
        self.materials.clear();
    }

    fn control_schema(&self) -> ControlSchema {
        WindowLightParams::control_schema()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

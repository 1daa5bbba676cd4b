//! Atmospheric fog post pass.

use std::any::Any;

use mapshine_common::uniforms::{FogBlock, FogMaterial, MaterialId};
use mapshine_common::{
    ControlSchema, EffectError, EffectResult, FogParams, MaskId, PassParams, ScaledClock,
    SmoothedWind, WindAccumulator,
};

use crate::materials::{
    BindGroupCache, GpuMaterialSet, TextureBindKey, depth_texture_entry, linear_sampler,
    sampler_entry, texture_entry,
};
use crate::pass::{EffectPass, PassContext, PassLayer, PassTargets};
use crate::pipeline::{PipelineSpec, color_target, create_pipeline, load_attachment};
use crate::shaders::{ShaderKind, create_module};
use crate::textures::MaskTextures;

/// Noise-space units per second at full smoothed wind.
const WIND_DRIFT: f32 = 0.03;

const MASKS: [MaskId; 2] = [MaskId::OUTDOORS, MaskId::ROOF_DISTANCE];

pub struct FogPass {
    params: FogParams,
    enabled: bool,
    materials: GpuMaterialSet<FogMaterial>,
    material: MaterialId,
    texture_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    bind_groups: BindGroupCache,
    wind: SmoothedWind,
    scroll: WindAccumulator,
    evolution: ScaledClock,
    cutout: ScaledClock,
}

impl FogPass {
    pub fn new(device: &wgpu::Device, params: FogParams, format: wgpu::TextureFormat) -> Self {
        let params = params.sanitized();
        let mut materials = GpuMaterialSet::new(device, "Fog Material");
        let material = materials.create(
            device,
            FogMaterial {
                pass: FogBlock::from_params(&params),
                ..Default::default()
            },
        );
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Fog Textures"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                depth_texture_entry(3),
                sampler_entry(4),
            ],
        });
        let module = create_module(device, ShaderKind::Fog);
        let pipeline = create_pipeline(
            device,
            &PipelineSpec {
                label: "Fog Pipeline",
                module: &module,
                bind_group_layouts: &[materials.layout(), &texture_layout],
                targets: &[color_target(format, None, wgpu::ColorWrites::ALL)],
                depth: None,
            },
        );
        Self {
            params,
            enabled: true,
            materials,
            material,
            texture_layout,
            pipeline,
            sampler: linear_sampler(device),
            bind_groups: BindGroupCache::new(),
            wind: SmoothedWind::default(),
            scroll: WindAccumulator::default(),
            evolution: ScaledClock::default(),
            cutout: ScaledClock::default(),
        }
    }

    pub fn params(&self) -> &FogParams {
        &self.params
    }

    pub fn set_params(&mut self, params: FogParams) {
        self.params = params.sanitized();
    }

    /// The uniform record as it will be uploaded.
    pub fn material(&self) -> Option<&FogMaterial> {
        self.materials.set.get(self.material)
    }
}

impl EffectPass for FogPass {
    fn name(&self) -> &'static str {
        "fog"
    }

    fn layer(&self) -> PassLayer {
        PassLayer::PostProcessing
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
        let env = &frame.environment;
        let delta = frame.time.delta;
        let p = &self.params;

        let target = env.wind_direction * env.wind_speed * p.wind_influence;
        self.wind.advance(target, p.wind_smoothing, delta);
        let smoothed = self.wind.value;
        self.scroll
            .advance(smoothed, smoothed.length(), delta, WIND_DRIFT);
        self.evolution.advance(p.evolution_speed, delta);
        self.cutout.advance(p.cutout_speed, delta);

        let (near, far) = frame.view.camera.near_far();
        let scroll = self.scroll.offset;
        let evolution = self.evolution.time;
        let cutout = self.cutout.time;
        self.materials.set.update(self.material, |m| {
            m.view = frame.view_block;
            m.env = frame.env_block;
            m.pass.apply_params(p);
            m.pass.set_motion(scroll, evolution, cutout);
            m.pass.set_depth_range(near, far);
            m.pass.set_roof_distance_scale(frame.roof_distance_scale);
            m.pass.set_density(env.fog_density);
            Ok(())
        })
    }

    fn render(
        &mut self,
        ctx: &mut PassContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        targets: &PassTargets<'_>,
    ) -> EffectResult<()> {
        let output = targets
            .output
            .ok_or(EffectError::HostNotReady("fog output target"))?;
        self.materials.upload(ctx.queue);
        let material = self
            .materials
            .bind_group(self.material)
            .ok_or(EffectError::HostNotReady("fog material"))?;

        let outdoors = ctx.masks.resolve(&MaskId::OUTDOORS);
        let roof_distance = ctx.masks.resolve_quiet(&MaskId::ROOF_DISTANCE);
        let key = TextureBindKey::new(
            &[targets.scene, &outdoors, &roof_distance],
            ctx.masks.generations(&MASKS),
        );
        let device = ctx.device;
        let textures = self.bind_groups.get_or_create(&key, || {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Fog Textures"),
                layout: &self.texture_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&targets.scene.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&outdoors.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&roof_distance.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(targets.depth),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            })
        });
        self.bind_groups.end_frame();

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Fog Pass"),
            color_attachments: &[load_attachment(&output.view)],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, material, &[]);
        pass.set_bind_group(1, &textures, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }

    fn dispose(&mut self, _masks: &mut MaskTextures) {
        self.bind_groups.clear();
        self.materials.clear();
    }

    fn control_schema(&self) -> ControlSchema {
        FogParams::control_schema()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

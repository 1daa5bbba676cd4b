//! Base plane material and per-tile specular overlays.
//!
//! One render pass, in order:
//! 1. the base plane over the scene rect (depth `LessEqual`, writes depth),
//! 2. tile occluders in band order (depth only, alpha-clipped),
//! 3. tile color overlays in band order (depth `Equal`, additive).
//!
//! The color overlay only lands where its own occluder won the depth test,
//! so a higher tile hides the specular of anything beneath it.

mod tiles;

use std::any::Any;

use glam::{Mat4, Vec3};
use mapshine_common::uniforms::{MaterialId, SpecularBlock, SpecularMaterial};
use mapshine_common::{
    BindOutcome, ControlSchema, EffectError, EffectResult, FallbackKind, MaskId, OverlayState,
    PassParams, SceneDimensions, SpecularParams, SpriteSnapshot, TileBinding, WindAccumulator,
};

use crate::materials::{
    BindGroupCache, GpuMaterialSet, TextureBindKey, linear_sampler, sampler_entry, texture_entry,
};
use crate::pass::{EffectPass, PassContext, PassLayer, PassTargets};
use crate::pipeline::{
    ADDITIVE_ALPHA, DepthPolicy, PipelineSpec, color_target, create_pipeline, load_attachment,
    load_depth,
};
use crate::shaders::{ShaderKind, create_module};
use crate::textures::{GpuTexture, MaskTextures};
use tiles::TileOverlays;

pub use tiles::TileTextures;

/// Scene masks whose generations key the texture bind groups.
const SCENE_MASKS: [MaskId; 7] = [
    MaskId::ALBEDO,
    MaskId::SPECULAR,
    MaskId::ROUGHNESS,
    MaskId::NORMAL,
    MaskId::OUTDOORS,
    MaskId::CLOUD_SHADOW_RAW_SCREEN,
    MaskId::BUILDING_SHADOW,
];

/// Views bound at group 1, in binding order.
struct MaterialTextures<'a> {
    albedo: &'a GpuTexture,
    specular: &'a GpuTexture,
    roughness: &'a GpuTexture,
    normal: &'a GpuTexture,
    outdoors: &'a GpuTexture,
    cloud_raw: &'a GpuTexture,
    building_shadow: &'a GpuTexture,
}

impl MaterialTextures<'_> {
    fn key(&self, generations: Vec<u64>) -> TextureBindKey {
        TextureBindKey::new(
            &[
                self.albedo,
                self.specular,
                self.roughness,
                self.normal,
                self.outdoors,
                self.cloud_raw,
                self.building_shadow,
            ],
            generations,
        )
    }

    fn bind_group(
        &self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        let views = [
            &self.albedo.view,
            &self.specular.view,
            &self.roughness.view,
            &self.normal.view,
            &self.outdoors.view,
            &self.cloud_raw.view,
            &self.building_shadow.view,
        ];
        let mut entries: Vec<wgpu::BindGroupEntry<'_>> = views
            .iter()
            .enumerate()
            .map(|(i, view)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: views.len() as u32,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Specular Textures"),
            layout,
            entries: &entries,
        })
    }
}

/// Bind groups of one tile draw, resolved before the render pass opens.
struct TileGroups {
    material: MaterialId,
    group: wgpu::BindGroup,
    depth_write: bool,
}

pub struct SpecularPass {
    params: SpecularParams,
    materials: GpuMaterialSet<SpecularMaterial>,
    base: MaterialId,
    texture_layout: wgpu::BindGroupLayout,
    occluder_layout: wgpu::BindGroupLayout,
    base_pipeline: wgpu::RenderPipeline,
    /// Indexed by `depth_write as usize`.
    occluder_pipelines: [wgpu::RenderPipeline; 2],
    color_pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    bind_groups: BindGroupCache,
    occluder_groups: BindGroupCache,
    wind: WindAccumulator,
    tiles: TileOverlays,
}

impl SpecularPass {
    pub fn new(device: &wgpu::Device, params: SpecularParams, format: wgpu::TextureFormat) -> Self {
        let params = params.sanitized();
        let mut materials = GpuMaterialSet::new(device, "Specular Material");
        let base = materials.create(
            device,
            SpecularMaterial {
                pass: SpecularBlock::from_params(&params),
                ..Default::default()
            },
        );
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Specular Textures"),
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
        let occluder_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Tile Occluder Textures"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });

        let specular = create_module(device, ShaderKind::Specular);
        let occluder = create_module(device, ShaderKind::TileOccluder);
        let base_pipeline = create_pipeline(
            device,
            &PipelineSpec {
                label: "Specular Base Pipeline",
                module: &specular,
                bind_group_layouts: &[materials.layout(), &texture_layout],
                targets: &[color_target(format, None, wgpu::ColorWrites::ALL)],
                depth: Some(DepthPolicy::new(wgpu::CompareFunction::LessEqual, true)),
            },
        );
        let occluder_pipeline = |label, write| {
            create_pipeline(
                device,
                &PipelineSpec {
                    label,
                    module: &occluder,
                    bind_group_layouts: &[materials.layout(), &occluder_layout],
                    targets: &[color_target(format, None, wgpu::ColorWrites::empty())],
                    depth: Some(DepthPolicy::new(wgpu::CompareFunction::LessEqual, write)),
                },
            )
        };
        let occluder_pipelines = [
            occluder_pipeline("Tile Occluder Pipeline (no depth write)", false),
            occluder_pipeline("Tile Occluder Pipeline", true),
        ];
        let color_pipeline = create_pipeline(
            device,
            &PipelineSpec {
                label: "Tile Specular Pipeline",
                module: &specular,
                bind_group_layouts: &[materials.layout(), &texture_layout],
                targets: &[color_target(
                    format,
                    Some(ADDITIVE_ALPHA),
                    wgpu::ColorWrites::ALL,
                )],
                depth: Some(DepthPolicy::new(wgpu::CompareFunction::Equal, false)),
            },
        );

        Self {
            params,
            materials,
            base,
            texture_layout,
            occluder_layout,
            base_pipeline,
            occluder_pipelines,
            color_pipeline,
            sampler: linear_sampler(device),
            bind_groups: BindGroupCache::new(),
            occluder_groups: BindGroupCache::new(),
            wind: WindAccumulator::default(),
            tiles: TileOverlays::default(),
        }
    }

    pub fn params(&self) -> &SpecularParams {
        &self.params
    }

    pub fn set_params(&mut self, params: SpecularParams) {
        self.params = params.sanitized();
    }

    /// The base plane record as it will be uploaded.
    pub fn base_material(&self) -> Option<&SpecularMaterial> {
        self.materials.set.get(self.base)
    }

    /// Creates (or refreshes) the overlay of a tile sprite.
    pub fn bind_tile_sprite(
        &mut self,
        device: &wgpu::Device,
        binding: TileBinding,
        textures: TileTextures,
    ) -> BindOutcome {
        let template = self
            .materials
            .set
            .get(self.base)
            .copied()
            .unwrap_or_default();
        let id = binding.id.clone();
        let outcome = self
            .tiles
            .bind(device, &mut self.materials, &template, binding, textures);
        tracing::debug!(tile = %id, ?outcome, "tile sprite bound");
        outcome
    }

    /// Removes a tile's overlay. Returns false for unknown tiles.
    pub fn unbind_tile_sprite(&mut self, id: &str) -> bool {
        self.tiles.unbind(&mut self.materials, id).is_some()
    }

    /// Copies the sprite's transform, visibility and sort onto the overlay.
    /// `None` when the tile is not bound.
    pub fn sync_tile_sprite_transform(
        &mut self,
        id: &str,
        sprite: &SpriteSnapshot,
    ) -> Option<BindOutcome> {
        self.tiles.sync(id, sprite)
    }

    /// Supplies textures after a sprite's texture changed.
    pub fn set_tile_textures(&mut self, id: &str, textures: TileTextures) -> bool {
        self.tiles.set_textures(id, textures)
    }

    pub fn tile_state(&self, id: &str) -> OverlayState {
        self.tiles.state(id)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn clear_tiles(&mut self) {
        self.tiles.clear(&mut self.materials);
    }
}

/// Model matrix stretching the unit quad over the scene rect at z = 0.
pub fn base_model(scene: &SceneDimensions) -> Mat4 {
    let (_, size) = scene.scene_bounds_world();
    let center = scene.scene_center_world();
    Mat4::from_translation(center.extend(0.0)) * Mat4::from_scale(Vec3::new(size.x, size.y, 1.0))
}

impl EffectPass for SpecularPass {
    fn name(&self) -> &'static str {
        "specular"
    }

    fn layer(&self) -> PassLayer {
        PassLayer::Material
    }

    fn priority(&self) -> i32 {
        10
    }

    fn enabled(&self) -> bool {
        self.params.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.params.enabled = enabled;
    }

    /// The base plane is this pass's geometry; disabled, it draws
    /// ambient-lit albedo and tiles contribute nothing.
    fn always_renders(&self) -> bool {
        true
    }

    fn update(&mut self, ctx: &mut PassContext<'_>) -> EffectResult<()> {
        let frame = ctx.frame;
        let env = &frame.environment;
        let p = &self.params;
        self.wind.advance(
            env.wind_direction,
            env.wind_speed,
            frame.time.delta,
            p.wind_scale,
        );
        let offset = self.wind.offset;

        let set = &mut self.materials.set;
        set.broadcast_view(&frame.view_block);
        set.broadcast_environment(&frame.env_block);
        set.broadcast_lights(&frame.lights);
        let failed = set.broadcast(|m| {
            m.pass.apply_params(p);
            m.pass.set_wind_offset(offset);
            Ok(())
        });
        if let Some((_, err)) = failed.into_iter().next() {
            return Err(err);
        }

        let model = base_model(&frame.view.scene);
        let presence = (
            ctx.masks.is_present(&MaskId::SPECULAR),
            ctx.masks.is_present(&MaskId::ROUGHNESS),
            ctx.masks.is_present(&MaskId::NORMAL),
        );
        set.update(self.base, |m| {
            m.pass.set_model(model);
            m.pass.set_mask_presence(presence.0, presence.1, presence.2);
            Ok(())
        })?;
        self.tiles.write_materials(set)
    }

    fn render(
        &mut self,
        ctx: &mut PassContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        targets: &PassTargets<'_>,
    ) -> EffectResult<()> {
        self.materials.upload(ctx.queue);
        let device = ctx.device;
        let masks = &mut *ctx.masks;

        let albedo = masks.resolve(&MaskId::ALBEDO);
        let specular = masks.resolve(&MaskId::SPECULAR);
        let outdoors = masks.resolve(&MaskId::OUTDOORS);
        let roughness = masks.resolve_quiet(&MaskId::ROUGHNESS);
        let normal = masks.resolve_quiet(&MaskId::NORMAL);
        let cloud_raw = masks.resolve_quiet(&MaskId::CLOUD_SHADOW_RAW_SCREEN);
        let building_shadow = masks.resolve_quiet(&MaskId::BUILDING_SHADOW);
        let generations = masks.generations(&SCENE_MASKS);

        let base_textures = MaterialTextures {
            albedo: &albedo,
            specular: &specular,
            roughness: &roughness,
            normal: &normal,
            outdoors: &outdoors,
            cloud_raw: &cloud_raw,
            building_shadow: &building_shadow,
        };
        let base_group = self
            .bind_groups
            .get_or_create(&base_textures.key(generations.clone()), || {
                base_textures.bind_group(device, &self.texture_layout, &self.sampler)
            });

        // Tiles sample their own albedo and specular in sprite uv; the
        // scene masks are shared.
        let black = masks.fallbacks.get(FallbackKind::Black).clone();
        let white = masks.fallbacks.get(FallbackKind::White).clone();
        let flat = masks.fallbacks.get(FallbackKind::FlatNormal).clone();

        let mut occluders = Vec::new();
        for draw in self.tiles.occluder_draws() {
            let albedo = &draw.textures.albedo;
            let key = TextureBindKey::new(&[&**albedo], Vec::new());
            let group = self.occluder_groups.get_or_create(&key, || {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Tile Occluder Textures"),
                    layout: &self.occluder_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&albedo.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ],
                })
            });
            occluders.push(TileGroups {
                material: draw.material,
                group,
                depth_write: draw.depth_write,
            });
        }

        let mut colors = Vec::new();
        for draw in self.tiles.color_draws() {
            let textures = MaterialTextures {
                albedo: &draw.textures.albedo,
                specular: draw.textures.specular.as_deref().unwrap_or(&*black),
                roughness: &white,
                normal: &flat,
                outdoors: &outdoors,
                cloud_raw: &cloud_raw,
                building_shadow: &building_shadow,
            };
            let group = self
                .bind_groups
                .get_or_create(&textures.key(generations.clone()), || {
                    textures.bind_group(device, &self.texture_layout, &self.sampler)
                });
            colors.push(TileGroups {
                material: draw.material,
                group,
                depth_write: false,
            });
        }
        self.bind_groups.end_frame();
        self.occluder_groups.end_frame();

        let base_material = self
            .materials
            .bind_group(self.base)
            .ok_or(EffectError::HostNotReady("specular base material"))?;

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Specular Pass"),
            color_attachments: &[load_attachment(&targets.scene.view)],
            depth_stencil_attachment: load_depth(targets.depth),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.base_pipeline);
        pass.set_bind_group(0, base_material, &[]);
        pass.set_bind_group(1, &base_group, &[]);
        pass.draw(0..6, 0..1);

        for tile in &occluders {
            let Some(material) = self.materials.bind_group(tile.material) else {
                continue;
            };
            pass.set_pipeline(&self.occluder_pipelines[tile.depth_write as usize]);
            pass.set_bind_group(0, material, &[]);
            pass.set_bind_group(1, &tile.group, &[]);
            pass.draw(0..6, 0..1);
        }

        pass.set_pipeline(&self.color_pipeline);
        for tile in &colors {
            let Some(material) = self.materials.bind_group(tile.material) else {
                continue;
            };
            pass.set_bind_group(0, material, &[]);
            pass.set_bind_group(1, &tile.group, &[]);
            pass.draw(0..6, 0..1);
        }
        Ok(())
    }

    fn dispose(&mut self, _masks: &mut MaskTextures) {
        self.tiles.clear(&mut self.materials);
        self.bind_groups.clear();
        self.occluder_groups.clear();
        self.materials.clear();
    }

    fn control_schema(&self) -> ControlSchema {
        SpecularParams::control_schema()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

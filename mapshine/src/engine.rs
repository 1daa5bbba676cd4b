//! Host-facing facade: owns the device, the mask registry and the composer,
//! and turns host callbacks into per-frame state.
//!
//! The host drives it in this order every frame: environment and camera
//! setters, tile transform syncs, then [`MapshineEngine::frame`], then
//! [`MapshineEngine::present`] or [`MapshineEngine::read_output`].

use std::sync::Arc;

use glam::UVec2;
use mapshine_common::uniforms::{EnvironmentBlock, FrameTime, LightBlock, ViewBlock};
use mapshine_common::{
    AddOutcome, BindOutcome, Camera, CloudShadowParams, ColorSpace, ControlSchema, CoverageSpace,
    EffectError, EffectResult, EnhancementStore, EnvironmentSnapshot, FogParams, LightRegistry,
    LogThrottle, MaskId, OverlayState, SceneDimensions, SourceMask, SpecularParams,
    SpriteSnapshot, TileBinding, ViewState, WindowLightParams,
};
use serde_json::Value;

use crate::composer::Composer;
use crate::config::EngineConfig;
use crate::derived::DerivedMasks;
use crate::gpu::{GpuContext, validated};
use crate::pass::FrameState;
use crate::passes::{CloudShadowPass, FogPass, SpecularPass, TileTextures, WindowLightPass};
use crate::textures::{GpuTexture, MaskTextures};

/// Camera height used until the host supplies one.
const DEFAULT_CAMERA_HEIGHT: f32 = 1000.0;

pub struct MapshineEngine {
    gpu: GpuContext,
    config: EngineConfig,
    masks: MaskTextures,
    composer: Composer,
    derived: DerivedMasks,
    lights: LightRegistry,
    environment: EnvironmentSnapshot,
    scene: SceneDimensions,
    camera: Camera,
    screen: UVec2,
    camera_throttle: LogThrottle,
    derived_throttle: LogThrottle,
}

impl MapshineEngine {
    /// Builds the pass stack for a scene rendered at `screen` pixels.
    pub fn new(
        gpu: GpuContext,
        config: EngineConfig,
        scene: SceneDimensions,
        screen: UVec2,
    ) -> EffectResult<Self> {
        scene.validate()?;
        let config = config.sanitized();
        let screen = screen.max(UVec2::ONE);
        let format = config.engine.target_format.to_wgpu();
        let device = &gpu.device;

        // Adapters that reject a pass pipeline fail here rather than
        // panicking on the first frame.
        let (masks, composer) = validated(device, || {
            let masks = MaskTextures::new(device, &gpu.queue)?;
            let mut composer = Composer::new(device, screen, format);
            composer.add_pass(Box::new(CloudShadowPass::new(
                device,
                config.cloud_shadow.clone(),
                screen,
            )));
            composer.add_pass(Box::new(SpecularPass::new(
                device,
                config.specular.clone(),
                format,
            )));
            composer.add_pass(Box::new(WindowLightPass::new(
                device,
                config.window_light.clone(),
                format,
                screen,
            )));
            composer.add_pass(Box::new(FogPass::new(device, config.fog.clone(), format)));
            Ok::<_, EffectError>((masks, composer))
        })??;

        let camera = fitted_camera(&scene);
        tracing::info!(
            passes = ?composer.pass_names(),
            width = screen.x,
            height = screen.y,
            ?format,
            "mapshine engine ready"
        );

        Ok(Self {
            derived: DerivedMasks::new(config.engine.flow_field.clone()),
            lights: LightRegistry::new(config.engine.max_lights, scene),
            gpu,
            config,
            masks,
            composer,
            environment: EnvironmentSnapshot::default(),
            scene,
            camera,
            screen,
            camera_throttle: LogThrottle::default(),
            derived_throttle: LogThrottle::default(),
        })
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn masks(&self) -> &MaskTextures {
        &self.masks
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn scene(&self) -> &SceneDimensions {
        &self.scene
    }

    pub fn lights(&self) -> &LightRegistry {
        &self.lights
    }

    // ========================================================================
    // Scene, camera and environment
    // ========================================================================

    /// Switches to a new scene. Masks, tiles and lights of the old scene
    /// are dropped; missing-asset warnings are re-armed.
    pub fn set_scene(&mut self, scene: SceneDimensions) -> EffectResult<()> {
        scene.validate()?;
        self.scene = scene;
        self.masks.registry.clear();
        self.lights.clear();
        self.lights.set_scene(scene);
        self.derived.set_source("", None);
        if let Some(specular) = self.composer.pass_mut::<SpecularPass>() {
            specular.clear_tiles();
        }
        self.camera = fitted_camera(&scene);
        tracing::info!(
            width = scene.scene_width,
            height = scene.scene_height,
            "scene changed"
        );
        Ok(())
    }

    /// Scene dimensions from the host's camelCase JSON.
    pub fn set_scene_json(&mut self, value: &Value) -> EffectResult<()> {
        let scene: SceneDimensions =
            serde_json::from_value(value.clone()).map_err(|e| EffectError::InvalidDocument {
                what: "scene dimensions",
                reason: e.to_string(),
            })?;
        self.set_scene(scene)
    }

    pub fn environment(&self) -> &EnvironmentSnapshot {
        &self.environment
    }

    /// Replaces the environment. Out-of-range values are clamped.
    pub fn set_environment(&mut self, environment: EnvironmentSnapshot) {
        self.environment = environment.sanitized();
    }

    /// Applies the host's ambient color document.
    pub fn apply_host_colors(&mut self, colors: &Value) {
        self.environment.apply_host_colors(colors);
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Replaces the camera. A non-finite position is repaired and logged.
    pub fn set_camera(&mut self, camera: Camera) {
        let (camera, err) = camera.sanitized();
        if let Some(err) = err {
            self.camera_throttle.warn("camera", &err);
        }
        self.camera = camera;
    }

    /// Resizes the drawing buffer. Screen-space targets are recreated and
    /// republished on the next frame.
    pub fn resize(&mut self, screen: UVec2) {
        let screen = screen.max(UVec2::ONE);
        if screen == self.screen {
            return;
        }
        self.screen = screen;
        self.composer
            .on_resize(&self.gpu.device, &mut self.masks, screen);
        tracing::debug!(width = screen.x, height = screen.y, "engine resized");
    }

    // ========================================================================
    // Masks
    // ========================================================================

    /// Uploads a scene-UV mask and publishes it.
    ///
    /// Albedo keeps its sRGB bytes in a unorm texture and is linearized in
    /// the shader. The outdoors mask also feeds the derived flow field.
    pub fn load_mask(
        &mut self,
        id: MaskId,
        width: u32,
        height: u32,
        rgba: &[u8],
        color_space: ColorSpace,
    ) -> EffectResult<()> {
        let device = &self.gpu.device;
        let queue = &self.gpu.queue;
        if id == MaskId::ALBEDO {
            let texture = GpuTexture::rgba8(
                device,
                queue,
                id.as_str(),
                width,
                height,
                rgba,
                ColorSpace::Linear,
            )?;
            self.masks
                .publish_encoded(id, Arc::new(texture), color_space, CoverageSpace::SceneUv);
            return Ok(());
        }

        let texture = Arc::new(GpuTexture::rgba8(
            device,
            queue,
            id.as_str(),
            width,
            height,
            rgba,
            color_space,
        )?);
        if id == MaskId::OUTDOORS {
            let source = SourceMask::from_rgba8(width, height, rgba)?;
            self.derived
                .set_source(format!("outdoors:{}", texture.id), Some(source));
        }
        self.masks.publish(id, texture, CoverageSpace::SceneUv);
        Ok(())
    }

    /// Withdraws a mask; consumers fall back on their next frame.
    pub fn unload_mask(&mut self, id: &MaskId) {
        self.masks.unpublish(id);
        if *id == MaskId::OUTDOORS {
            self.derived.set_source("", None);
        }
    }

    // ========================================================================
    // Lights
    // ========================================================================

    pub fn on_create_ambient_light(&mut self, doc: &Value) -> AddOutcome {
        let outcome = self.lights.add_light(doc);
        log_light_outcome(&outcome);
        outcome
    }

    pub fn on_update_ambient_light(&mut self, id: &str, changes: &Value) -> AddOutcome {
        let outcome = self.lights.update_light(id, changes);
        log_light_outcome(&outcome);
        outcome
    }

    pub fn on_delete_ambient_light(&mut self, id: &str) -> bool {
        self.lights.remove_light(id)
    }

    /// Applies per-light output gains from the persisted enhancement data.
    pub fn set_enhancement_store(&mut self, store: &EnhancementStore) {
        self.lights.set_output_gains(store.output_gains());
    }

    // ========================================================================
    // Tiles
    // ========================================================================

    /// Uploads a tile's albedo and optional specular mask.
    pub fn upload_tile_textures(
        &self,
        id: &str,
        width: u32,
        height: u32,
        albedo: &[u8],
        specular: Option<&[u8]>,
    ) -> EffectResult<TileTextures> {
        let device = &self.gpu.device;
        let queue = &self.gpu.queue;
        let albedo = GpuTexture::rgba8(
            device,
            queue,
            &format!("tile:{id}:albedo"),
            width,
            height,
            albedo,
            ColorSpace::Linear,
        )?;
        let specular = specular
            .map(|rgba| {
                GpuTexture::rgba8(
                    device,
                    queue,
                    &format!("tile:{id}:specular"),
                    width,
                    height,
                    rgba,
                    ColorSpace::Linear,
                )
            })
            .transpose()?;
        Ok(TileTextures {
            albedo: Arc::new(albedo),
            specular: specular.map(Arc::new),
        })
    }

    pub fn bind_tile_sprite(
        &mut self,
        binding: TileBinding,
        textures: TileTextures,
    ) -> Option<BindOutcome> {
        let device = &self.gpu.device;
        let specular = self.composer.pass_mut::<SpecularPass>()?;
        Some(specular.bind_tile_sprite(device, binding, textures))
    }

    pub fn unbind_tile_sprite(&mut self, id: &str) -> bool {
        self.composer
            .pass_mut::<SpecularPass>()
            .is_some_and(|s| s.unbind_tile_sprite(id))
    }

    pub fn sync_tile_sprite_transform(
        &mut self,
        id: &str,
        sprite: &SpriteSnapshot,
    ) -> Option<BindOutcome> {
        self.composer
            .pass_mut::<SpecularPass>()?
            .sync_tile_sprite_transform(id, sprite)
    }

    pub fn set_tile_textures(&mut self, id: &str, textures: TileTextures) -> bool {
        self.composer
            .pass_mut::<SpecularPass>()
            .is_some_and(|s| s.set_tile_textures(id, textures))
    }

    pub fn tile_state(&mut self, id: &str) -> OverlayState {
        self.composer
            .pass_mut::<SpecularPass>()
            .map_or(OverlayState::Unbound, |s| s.tile_state(id))
    }

    // ========================================================================
    // Passes
    // ========================================================================

    pub fn set_pass_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let found = self.composer.set_enabled(name, enabled);
        if !found {
            tracing::warn!(pass = name, "no such pass");
        }
        found
    }

    pub fn control_schemas(&self) -> Vec<ControlSchema> {
        self.composer.control_schemas()
    }

    pub fn set_specular_params(&mut self, params: SpecularParams) {
        if let Some(pass) = self.composer.pass_mut::<SpecularPass>() {
            pass.set_params(params);
        }
    }

    pub fn set_window_light_params(&mut self, params: WindowLightParams) {
        if let Some(pass) = self.composer.pass_mut::<WindowLightPass>() {
            pass.set_params(params);
        }
    }

    pub fn set_fog_params(&mut self, params: FogParams) {
        if let Some(pass) = self.composer.pass_mut::<FogPass>() {
            pass.set_params(params);
        }
    }

    pub fn set_cloud_shadow_params(&mut self, params: CloudShadowParams) {
        if let Some(pass) = self.composer.pass_mut::<CloudShadowPass>() {
            pass.set_params(params);
        }
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// The per-frame state passes read, as the next frame will see it.
    pub fn frame_state(&self, time: FrameTime) -> FrameState {
        let view = ViewState::new(self.camera, self.screen, self.scene);
        let environment = self.environment;
        FrameState {
            time,
            view,
            view_block: ViewBlock::new(&view, time),
            environment,
            env_block: EnvironmentBlock::from_snapshot(&environment),
            lights: LightBlock::from_arrays(&self.lights.uniform_arrays()),
            roof_distance_scale: self.derived.roof_distance_scale(),
            flow_default_direction: self.derived.default_direction(),
        }
    }

    /// Refreshes derived masks and renders one frame of every pass.
    pub fn frame(&mut self, time: FrameTime) {
        let device = &self.gpu.device;
        let queue = &self.gpu.queue;
        if let Err(err) = self
            .derived
            .refresh(device, queue, &mut self.masks, &self.scene)
        {
            self.derived_throttle.warn("derived", &err);
        }
        let state = self.frame_state(time);
        self.composer
            .frame(&self.gpu.device, &self.gpu.queue, &mut self.masks, &state);
    }

    /// Blits the composed frame into a host view of
    /// [`crate::composer::OUTPUT_FORMAT`].
    pub fn present(&mut self, view: &wgpu::TextureView) {
        self.composer
            .present(&self.gpu.device, &self.gpu.queue, view);
    }

    /// The composed frame as sRGB RGBA8 rows.
    pub fn read_output(&mut self) -> EffectResult<Vec<u8>> {
        self.composer.read_output(&self.gpu.device, &self.gpu.queue)
    }

    /// Disposes every pass and withdraws every mask.
    pub fn dispose(&mut self) {
        self.composer.dispose(&mut self.masks);
        self.masks.registry.clear();
        self.lights.clear();
        tracing::info!("mapshine engine disposed");
    }
}

/// Orthographic camera framing the whole padded canvas.
fn fitted_camera(scene: &SceneDimensions) -> Camera {
    Camera::orthographic(
        scene.scene_center_world(),
        scene.width,
        scene.height,
        DEFAULT_CAMERA_HEIGHT,
    )
}

fn log_light_outcome(outcome: &AddOutcome) {
    match outcome {
        AddOutcome::Added | AddOutcome::Hidden => {}
        AddOutcome::RejectedZeroRadius => tracing::debug!("light rejected: zero radius"),
        AddOutcome::DroppedAtCapacity => tracing::warn!("light dropped: registry at capacity"),
        AddOutcome::Invalid(err) => tracing::warn!("light rejected: {err}"),
    }
}

//! Producer of the derived scene masks: `rainFlowMap.scene` and
//! `roofDistance`.
//!
//! The CPU builder in `mapshine_common::flow_field` does the work; this
//! module uploads the result and publishes it. Rebuilds only happen when
//! the source id or a generator parameter changes.

use std::sync::Arc;

use glam::Vec2;
use mapshine_common::{
    CoverageSpace, EffectResult, FlowField, FlowFieldCache, FlowFieldKey, FlowFieldParams,
    MaskId, SceneDimensions, SourceMask,
};

use crate::textures::{GpuTexture, MaskTextures};

pub struct DerivedMasks {
    cache: FlowFieldCache,
    params: FlowFieldParams,
    source_id: String,
    source: Option<SourceMask>,
    published: Option<FlowFieldKey>,
    /// Scene pixels per source pixel of the published distance.
    roof_distance_scale: f32,
    dirty: bool,
}

impl DerivedMasks {
    pub fn new(params: FlowFieldParams) -> Self {
        Self {
            cache: FlowFieldCache::new(),
            params: params.sanitized(),
            source_id: String::new(),
            source: None,
            published: None,
            roof_distance_scale: 1.0,
            dirty: true,
        }
    }

    /// Sets the obstacle source. `source_id` identifies the asset; the
    /// cache rebuilds when it changes.
    pub fn set_source(&mut self, source_id: impl Into<String>, source: Option<SourceMask>) {
        self.source_id = source_id.into();
        self.source = source;
        self.dirty = true;
    }

    pub fn set_params(&mut self, params: FlowFieldParams) {
        let params = params.sanitized();
        if params != self.params {
            self.params = params;
            self.dirty = true;
        }
    }

    /// Forces the next refresh to re-run, e.g. after the scene size changed.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn params(&self) -> &FlowFieldParams {
        &self.params
    }

    /// Direction rain flows where no flow map texel applies.
    pub fn default_direction(&self) -> Vec2 {
        self.params.default_direction
    }

    pub fn roof_distance_scale(&self) -> f32 {
        self.roof_distance_scale
    }

    /// Number of generator runs so far.
    pub fn builds(&self) -> u64 {
        self.cache.builds()
    }

    /// Rebuilds and republishes when inputs changed since the last call.
    pub fn refresh(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        masks: &mut MaskTextures,
        scene: &SceneDimensions,
    ) -> EffectResult<()> {
        if !self.dirty {
            return Ok(());
        }
        self.dirty = false;

        let field = self
            .cache
            .get_or_build(&self.source_id, self.source.as_ref(), &self.params);

        let Some(field) = field else {
            if self.published.take().is_some() || masks.is_present(&MaskId::RAIN_FLOW_MAP) {
                tracing::info!(source = %self.source_id, "no flow source, derived masks withdrawn");
            }
            masks.unpublish(&MaskId::RAIN_FLOW_MAP);
            masks.unpublish(&MaskId::ROOF_DISTANCE);
            return Ok(());
        };

        let source_width = self.source.as_ref().map_or(field.width, |s| s.width);
        self.roof_distance_scale = scene.scene_width.max(1.0) / source_width.max(1) as f32;

        if self.published == Some(field.key) {
            return Ok(());
        }
        self.publish(device, queue, masks, &field)?;
        self.published = Some(field.key);
        Ok(())
    }

    fn publish(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        masks: &mut MaskTextures,
        field: &FlowField,
    ) -> EffectResult<()> {
        let flow = GpuTexture::from_texels(
            device,
            queue,
            MaskId::RAIN_FLOW_MAP.as_str(),
            field.width,
            field.height,
            wgpu::TextureFormat::Rgba8Unorm,
            &field.rgba,
        )?;
        let distance = GpuTexture::r16f(
            device,
            queue,
            MaskId::ROOF_DISTANCE.as_str(),
            field.width,
            field.height,
            &field.distance_f16(),
        )?;
        masks.publish(MaskId::RAIN_FLOW_MAP, Arc::new(flow), CoverageSpace::SceneUv);
        masks.publish(MaskId::ROOF_DISTANCE, Arc::new(distance), CoverageSpace::SceneUv);
        tracing::info!(
            width = field.width,
            height = field.height,
            source = %self.source_id,
            "derived masks published"
        );
        Ok(())
    }
}

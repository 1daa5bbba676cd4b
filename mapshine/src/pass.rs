//! The pass contract shared by every effect.

use std::any::Any;

use glam::{UVec2, Vec2};
use mapshine_common::uniforms::{EnvironmentBlock, FrameTime, LightBlock, ViewBlock};
use mapshine_common::{ControlSchema, EffectResult, EnvironmentSnapshot, ViewState};

use crate::textures::{GpuTexture, MaskTextures};

/// Coarse ordering bucket; passes sort by `(layer, priority)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PassLayer {
    /// Replaces or feeds the base plane material.
    Material,
    /// Additive surface overlays drawn into the scene target.
    SurfaceEffects,
    /// Fullscreen passes reading one color target and writing the other.
    PostProcessing,
}

impl PassLayer {
    pub fn is_post(self) -> bool {
        matches!(self, PassLayer::PostProcessing)
    }
}

/// Everything a pass reads during one frame. Built once per frame by the
/// engine and never mutated by passes.
#[derive(Debug, Clone, Copy)]
pub struct FrameState {
    pub time: FrameTime,
    pub view: ViewState,
    pub view_block: ViewBlock,
    /// Sanitized environment snapshot.
    pub environment: EnvironmentSnapshot,
    pub env_block: EnvironmentBlock,
    pub lights: LightBlock,
    /// Scene pixels per source pixel of the published `roofDistance`.
    pub roof_distance_scale: f32,
    /// Rain flow direction where the flow map has no tangent.
    pub flow_default_direction: Vec2,
}

/// Device access plus the mask registry for one pass call.
pub struct PassContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub masks: &'a mut MaskTextures,
    pub frame: &'a FrameState,
}

/// Color and depth targets handed to `render`.
pub struct PassTargets<'a> {
    /// Surface passes draw into this; post passes sample it.
    pub scene: &'a GpuTexture,
    /// Post passes write here.
    pub output: Option<&'a GpuTexture>,
    pub depth: &'a wgpu::TextureView,
    pub size: UVec2,
}

/// One stage of the effect pipeline.
///
/// `update` runs every frame whether or not the pass is enabled so that
/// uniforms track the environment and re-enabling is instant. `render`
/// only runs for enabled passes. Errors are reported to the composer,
/// which logs them throttled; a failing pass never stops the frame.
pub trait EffectPass: Any {
    fn name(&self) -> &'static str;

    fn layer(&self) -> PassLayer;

    fn priority(&self) -> i32 {
        0
    }

    fn enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    /// Passes that own scene geometry keep rendering while disabled and
    /// draw their pass-through path instead.
    fn always_renders(&self) -> bool {
        false
    }

    fn update(&mut self, ctx: &mut PassContext<'_>) -> EffectResult<()>;

    fn render(
        &mut self,
        ctx: &mut PassContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        targets: &PassTargets<'_>,
    ) -> EffectResult<()>;

    fn on_resize(&mut self, _device: &wgpu::Device, _masks: &mut MaskTextures, _size: UVec2) {}

    /// Releases GPU resources and withdraws published masks.
    fn dispose(&mut self, _masks: &mut MaskTextures) {}

    fn control_schema(&self) -> ControlSchema;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layers_order() {
        let mut layers = vec![
            PassLayer::PostProcessing,
            PassLayer::Material,
            PassLayer::SurfaceEffects,
        ];
        layers.sort();
        assert_eq!(
            layers,
            vec![
                PassLayer::Material,
                PassLayer::SurfaceEffects,
                PassLayer::PostProcessing
            ]
        );
        assert!(PassLayer::PostProcessing.is_post());
        assert!(!PassLayer::Material.is_post());
    }
}

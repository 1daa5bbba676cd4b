//! Per-pass uniform blocks and the full per-material records.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2};

use super::{EnvironmentBlock, LightBlock, ViewBlock};
use crate::params::{
    CloudShadowParams, FogParams, SpecularParams, StripeLayerParams, WindowLightParams,
};

/// Specular output routing.
pub mod output_mode {
    /// Base plane: tone-mapped lit albedo plus specular.
    pub const BASE: f32 = 0.0;
    /// Tile overlay: tone-mapped specular only.
    pub const TILE_OVERLAY: f32 = 1.0;
}

fn flag(b: bool) -> f32 {
    if b { 1.0 } else { 0.0 }
}

// ============================================================================
// Specular
// ============================================================================

/// One stripe layer (48 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct StripeLayerBlock {
    /// frequency, speed, angle (radians), width
    pub a: [f32; 4],
    /// parallax, wave, gaps, softness
    pub b: [f32; 4],
    /// intensity (0 when disabled), unused x3
    pub c: [f32; 4],
}

impl StripeLayerBlock {
    pub fn from_params(p: &StripeLayerParams) -> Self {
        Self {
            a: [p.frequency, p.speed, p.angle.to_radians(), p.width],
            b: [p.parallax, p.wave, p.gaps, p.softness],
            c: [if p.enabled { p.intensity } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }
}

/// Specular pass parameters (384 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SpecularBlock {
    pub model: [[f32; 4]; 4],
    /// output mode, tile alpha clip, effect enabled, unused
    pub instance: [f32; 4],
    /// intensity, roughness, dynamic light intensity, light tint strength
    pub material: [f32; 4],
    /// rgb: global tint, a: lightning boost
    pub tint: [f32; 4],
    /// stripes enabled, blend mode, mask threshold, outdoor stripe blend
    pub stripe_global: [f32; 4],
    pub layers: [StripeLayerBlock; 3],
    /// intensity (0 when disabled), cell size, speed, density
    pub sparkle: [f32; 4],
    /// intensity (0 when disabled), black point, white point, contrast
    pub wet: [f32; 4],
    /// brightness, input gamma, output gamma, output max
    pub wet2: [f32; 4],
    /// wind offset xy, ripple strength, ripple scale
    pub wind_ripple: [f32; 4],
    /// rgb: frost tint, a: intensity (0 when disabled)
    pub frost: [f32; 4],
    /// threshold, specular mask present, unused x2
    pub frost2: [f32; 4],
    /// cloud specular intensity (0 when disabled), shadow suppression,
    /// roughness map present, normal map present
    pub cloud: [f32; 4],
}

const _: () = assert!(core::mem::size_of::<SpecularBlock>() == 384);

impl Default for SpecularBlock {
    fn default() -> Self {
        Self::from_params(&SpecularParams::default())
    }
}

impl SpecularBlock {
    pub fn from_params(p: &SpecularParams) -> Self {
        let mut block = Self::zeroed();
        block.model = Mat4::IDENTITY.to_cols_array_2d();
        block.instance = [output_mode::BASE, p.tile_alpha_clip, 1.0, 0.0];
        block.apply_params(p);
        block
    }

    /// Writes every parameter-derived row; leaves model, instance mode, mask
    /// presence and wind offset alone.
    pub fn apply_params(&mut self, p: &SpecularParams) {
        self.instance[1] = p.tile_alpha_clip;
        self.instance[2] = flag(p.enabled);
        self.material = [
            p.intensity,
            p.roughness,
            p.dynamic_light_intensity,
            p.light_tint_strength,
        ];
        self.tint = p.tint.extend(p.lightning_boost).to_array();
        self.stripe_global = [
            flag(p.stripes_enabled),
            p.stripe_blend_mode.as_u32() as f32,
            p.stripe_mask_threshold,
            p.outdoor_stripe_blend,
        ];
        for (dst, src) in self.layers.iter_mut().zip(p.layers.iter()) {
            *dst = StripeLayerBlock::from_params(src);
        }
        self.sparkle = [
            if p.sparkle_enabled {
                p.sparkle_intensity
            } else {
                0.0
            },
            p.sparkle_scale,
            p.sparkle_speed,
            p.sparkle_density,
        ];
        self.wet = [
            if p.wet_enabled { p.wet_intensity } else { 0.0 },
            p.wet_black_point,
            p.wet_white_point,
            p.wet_contrast,
        ];
        self.wet2 = [
            p.wet_brightness,
            p.wet_gamma,
            p.wet_output_gamma,
            p.wet_output_max,
        ];
        self.wind_ripple[2] = p.wet_ripple_strength;
        self.wind_ripple[3] = p.wet_ripple_scale;
        self.frost = p
            .frost_tint
            .extend(if p.frost_enabled {
                p.frost_intensity
            } else {
                0.0
            })
            .to_array();
        self.frost2[0] = p.frost_threshold;
        self.cloud[0] = if p.cloud_specular_enabled {
            p.cloud_specular_intensity
        } else {
            0.0
        };
        self.cloud[1] = p.building_shadow_suppression;
    }

    /// Which optional masks are bound for this material.
    pub fn set_mask_presence(&mut self, specular: bool, roughness: bool, normal: bool) {
        self.frost2[1] = flag(specular);
        self.cloud[2] = flag(roughness);
        self.cloud[3] = flag(normal);
    }

    pub fn set_wind_offset(&mut self, offset: Vec2) {
        self.wind_ripple[0] = offset.x;
        self.wind_ripple[1] = offset.y;
    }

    pub fn set_model(&mut self, model: Mat4) {
        self.model = model.to_cols_array_2d();
    }

    pub fn output_mode(&self) -> f32 {
        self.instance[0]
    }
}

/// Full record bound per specular material (base plane or tile overlay).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SpecularMaterial {
    pub view: ViewBlock,
    pub env: EnvironmentBlock,
    pub pass: SpecularBlock,
    pub lights: LightBlock,
}

const _: () = assert!(core::mem::size_of::<SpecularMaterial>() == 160 + 112 + 384 + 3088);

// ============================================================================
// Window light
// ============================================================================

/// Window-light parameters (192 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct WindowLightBlock {
    /// rgb: light color, a: intensity (0 when disabled)
    pub light: [f32; 4],
    /// falloff, rgb split px, split angle (radians), specular boost
    pub shape: [f32; 4],
    /// lightning contrast boost, flash strength, roof suppression, night dimming
    pub env_mod: [f32; 4],
    /// rgb: sky color, a: sky tint strength
    pub sky: [f32; 4],
    /// influence, bias, gamma, contrast
    pub cloud: [f32; 4],
    /// min light, fog dimming, light-only brightness, output mode (0 pool, 1 light-only)
    pub cloud2: [f32; 4],
    /// sun tracking, sun offset length px, unused x2
    pub sun: [f32; 4],
    /// rainK, flow width, flow dead zone, rivulet scale
    pub rain: [f32; 4],
    /// rivulet aspect, rivulet speed, rivulet threshold, max offset px
    pub rain2: [f32; 4],
    /// edge hi, darken strength, darken gamma, rain specular
    pub rain3: [f32; 4],
    /// intensity (0 when disabled), cell size px, rate, use atlas
    pub splash: [f32; 4],
    /// default flow direction xy (world, y up), flow map present weight, unused
    pub flow: [f32; 4],
}

const _: () = assert!(core::mem::size_of::<WindowLightBlock>() == 192);

impl Default for WindowLightBlock {
    fn default() -> Self {
        Self::from_params(&WindowLightParams::default(), 0.0)
    }
}

impl WindowLightBlock {
    pub fn from_params(p: &WindowLightParams, precipitation: f32) -> Self {
        let mut block = Self::zeroed();
        block.apply_params(p, precipitation);
        block.flow = [0.0, -1.0, 0.0, 0.0];
        block
    }

    pub fn apply_params(&mut self, p: &WindowLightParams, precipitation: f32) {
        let mode = self.cloud2[3];
        self.light = p
            .color
            .extend(if p.enabled { p.intensity } else { 0.0 })
            .to_array();
        self.shape = [
            p.falloff,
            p.rgb_split,
            p.rgb_split_angle.to_radians(),
            p.specular_boost,
        ];
        self.env_mod = [
            p.lightning_contrast_boost,
            p.flash_strength,
            p.roof_suppression,
            p.night_dimming,
        ];
        self.sky = p.sky_color.extend(p.sky_tint_strength).to_array();
        self.cloud = [p.cloud_influence, p.cloud_bias, p.cloud_gamma, p.cloud_contrast];
        self.cloud2 = [
            p.cloud_min_light,
            flag(p.fog_dimming),
            p.light_only_brightness,
            mode,
        ];
        self.sun = [flag(p.sun_tracking), p.sun_light_length, 0.0, 0.0];
        self.rain = [
            p.rain_k(precipitation),
            p.flow_width,
            p.flow_dead_zone,
            p.rivulet_scale,
        ];
        self.rain2 = [
            p.rivulet_aspect,
            p.rivulet_speed,
            p.rivulet_threshold,
            p.max_offset_px,
        ];
        self.rain3 = [
            p.edge_hi,
            p.darken_strength,
            p.darken_gamma,
            p.rain_specular,
        ];
        self.splash = [
            if p.splash_enabled {
                p.splash_intensity
            } else {
                0.0
            },
            p.splash_scale,
            p.splash_rate,
            flag(p.splash_use_atlas),
        ];
    }

    /// 0 for the additive pool, 1 for the light-only target.
    pub fn set_output_mode(&mut self, light_only: bool) {
        self.cloud2[3] = flag(light_only);
    }

    /// Default flow direction and whether a real flow map is bound.
    ///
    /// `default_dir` is in flow-texel space (scene uv, v down), like the
    /// tangents it disambiguates; it is stored flipped into world space.
    pub fn set_flow(&mut self, default_dir: Vec2, has_flow_map: bool) {
        self.flow = [default_dir.x, -default_dir.y, flag(has_flow_map), 0.0];
    }

    pub fn rain_k(&self) -> f32 {
        self.rain[0]
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct WindowLightMaterial {
    pub view: ViewBlock,
    pub env: EnvironmentBlock,
    pub pass: WindowLightBlock,
}

const _: () = assert!(core::mem::size_of::<WindowLightMaterial>() == 160 + 112 + 192);

// ============================================================================
// Fog
// ============================================================================

/// Fog parameters (144 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FogBlock {
    /// rgb: fog color, a: max opacity
    pub color: [f32; 4],
    /// falloff start, falloff end, noise scale, noise contrast
    pub falloff: [f32; 4],
    /// warp, evolution time, cutout time, cutout strength
    pub noise: [f32; 4],
    /// wind scroll xy, cutout scale, unused
    pub wind: [f32; 4],
    /// indoor reduction, buffer px, softness px, depth fog strength
    pub buildings: [f32; 4],
    /// use depth, near, far, roof distance scale (scene px per source px)
    pub depth: [f32; 4],
    /// rgb: night color, a: night strength
    pub night: [f32; 4],
    /// rgb: sky color, a: sky lerp
    pub sky: [f32; 4],
    /// sky multiply, color min, fog density, enabled
    pub extra: [f32; 4],
}

const _: () = assert!(core::mem::size_of::<FogBlock>() == 144);

impl Default for FogBlock {
    fn default() -> Self {
        Self::from_params(&FogParams::default())
    }
}

impl FogBlock {
    pub fn from_params(p: &FogParams) -> Self {
        let mut block = Self::zeroed();
        block.depth = [0.0, 0.1, 10_000.0, 1.0];
        block.apply_params(p);
        block
    }

    pub fn apply_params(&mut self, p: &FogParams) {
        self.color = p.color.extend(p.max_opacity).to_array();
        self.falloff = [
            p.falloff_start,
            p.falloff_end,
            p.noise_scale,
            p.noise_contrast,
        ];
        self.noise[0] = p.noise_warp;
        self.noise[3] = p.cutout_strength;
        self.wind[2] = p.cutout_scale;
        self.buildings = [
            p.indoor_reduction,
            p.building_buffer_px,
            p.building_softness_px,
            p.depth_fog_strength,
        ];
        self.depth[0] = flag(p.use_depth);
        self.night = p.night_color.extend(p.night_strength).to_array();
        self.sky = p.sky_color.extend(p.sky_lerp).to_array();
        self.extra[0] = p.sky_multiply;
        self.extra[1] = p.color_min;
        self.extra[3] = flag(p.enabled);
    }

    /// Per-frame motion: integrated wind scroll and both clocks.
    pub fn set_motion(&mut self, wind_scroll: Vec2, evolution: f32, cutout: f32) {
        self.wind[0] = wind_scroll.x;
        self.wind[1] = wind_scroll.y;
        self.noise[1] = evolution;
        self.noise[2] = cutout;
    }

    pub fn set_depth_range(&mut self, near: f32, far: f32) {
        self.depth[1] = near;
        self.depth[2] = far;
    }

    pub fn set_roof_distance_scale(&mut self, scene_px_per_source_px: f32) {
        self.depth[3] = scene_px_per_source_px;
    }

    pub fn set_density(&mut self, density: f32) {
        self.extra[2] = density.clamp(0.0, 1.0);
    }

    pub fn density(&self) -> f32 {
        self.extra[2]
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FogMaterial {
    pub view: ViewBlock,
    pub env: EnvironmentBlock,
    pub pass: FogBlock,
}

const _: () = assert!(core::mem::size_of::<FogMaterial>() == 160 + 112 + 144);

// ============================================================================
// Cloud shadow
// ============================================================================

/// Cloud shadow parameters (32 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CloudShadowBlock {
    /// scale, softness, shadow strength, coverage bias
    pub shape: [f32; 4],
    /// wind offset xy, evolution time, enabled
    pub motion: [f32; 4],
}

const _: () = assert!(core::mem::size_of::<CloudShadowBlock>() == 32);

impl Default for CloudShadowBlock {
    fn default() -> Self {
        Self::from_params(&CloudShadowParams::default())
    }
}

impl CloudShadowBlock {
    pub fn from_params(p: &CloudShadowParams) -> Self {
        let mut block = Self::zeroed();
        block.apply_params(p);
        block
    }

    pub fn apply_params(&mut self, p: &CloudShadowParams) {
        self.shape = [p.scale, p.softness, p.shadow_strength, p.coverage_bias];
        self.motion[3] = flag(p.enabled);
    }

    pub fn set_motion(&mut self, wind_offset: Vec2, evolution: f32) {
        self.motion[0] = wind_offset.x;
        self.motion[1] = wind_offset.y;
        self.motion[2] = evolution;
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CloudShadowMaterial {
    pub view: ViewBlock,
    pub env: EnvironmentBlock,
    pub pass: CloudShadowBlock,
}

const _: () = assert!(core::mem::size_of::<CloudShadowMaterial>() == 160 + 112 + 32);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_field::{FlowFieldParams, SourceMask, build_flow_field};
    use crate::params::{PassParams, StripeBlendMode};

    #[test]
    fn test_specular_disabled_features_zero_intensity() {
        let p = SpecularParams {
            sparkle_enabled: false,
            wet_enabled: false,
            frost_enabled: false,
            cloud_specular_enabled: false,
            stripe_blend_mode: StripeBlendMode::Overlay,
            ..Default::default()
        };
        let b = SpecularBlock::from_params(&p);
        assert_eq!(b.sparkle[0], 0.0);
        assert_eq!(b.wet[0], 0.0);
        assert_eq!(b.frost[3], 0.0);
        assert_eq!(b.cloud[0], 0.0);
        assert_eq!(b.stripe_global[1], 3.0);
        // Layer 3 is off by default.
        assert_eq!(b.layers[2].c[0], 0.0);
        assert!(b.layers[0].c[0] > 0.0);
    }

    #[test]
    fn test_apply_params_keeps_instance_state() {
        let mut b = SpecularBlock::default();
        b.instance[0] = output_mode::TILE_OVERLAY;
        b.set_wind_offset(Vec2::new(3.0, 4.0));
        b.set_model(Mat4::from_translation(glam::Vec3::X));
        let p = SpecularParams {
            intensity: 2.0,
            ..Default::default()
        }
        .sanitized();
        b.apply_params(&p);
        assert_eq!(b.output_mode(), output_mode::TILE_OVERLAY);
        assert_eq!(b.wind_ripple[..2], [3.0, 4.0]);
        assert_eq!(b.model[3][0], 1.0);
        assert_eq!(b.material[0], 2.0);
    }

    #[test]
    fn test_rain_fallback_agrees_with_flow_tangent() {
        let size = 256u32;
        let texels = (0..size * size)
            .map(|i| {
                let (x, y) = (i % size, i / size);
                let roof = (120..136).contains(&x) && (120..136).contains(&y);
                if roof { 0 } else { 255 }
            })
            .collect();
        let mask = SourceMask::new(size, size, texels).expect("mask");
        let params = FlowFieldParams::default();
        let field = build_flow_field(&mask, &params, "block").expect("field");

        // East of the block the wall runs vertically. The shader flips
        // texel tangents into world space the same way.
        let t = field.tangent_at(140, 128);
        let world = Vec2::new(t.x, -t.y).normalize();

        let mut b = WindowLightBlock::default();
        b.set_flow(params.default_direction, true);
        let fallback = Vec2::new(b.flow[0], b.flow[1]);
        assert!(world.dot(fallback) > 0.9, "tangent {world:?} fallback {fallback:?}");

        let initial = WindowLightBlock::default();
        assert_eq!(initial.flow[..2], b.flow[..2]);
    }

    #[test]
    fn test_window_light_mode_survives_params() {
        let mut b = WindowLightBlock::default();
        b.set_output_mode(true);
        b.apply_params(&WindowLightParams::default(), 0.5);
        assert_eq!(b.cloud2[3], 1.0);
        assert_eq!(b.rain_k(), 0.5);
    }
}

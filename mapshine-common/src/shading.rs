//! CPU reference of the per-fragment math shared with the WGSL passes.
//!
//! These functions mirror `shaders/common/*.wgsl` and the pass shaders
//! closely enough that tests can pin scenario values without a GPU.

use glam::{Vec2, Vec3};

use crate::environment::EnvironmentSnapshot;
use crate::lights::LightRecord;
use crate::math::{exp_ease, luminance, mix, reinhard_jodie, saturate, smoothstep};
use crate::params::{FogParams, SpecularParams, WindowLightParams};

// ============================================================================
// Dynamic lights
// ============================================================================

/// Contribution of one light at a world position.
pub fn light_contribution(light: &LightRecord, world: Vec2) -> Vec3 {
    if light.radius_px <= 0.0 {
        return Vec3::ZERO;
    }
    let d = world.distance(light.position) / light.radius_px;
    if d >= 1.0 {
        return Vec3::ZERO;
    }
    let inner = (light.bright_px / light.radius_px).clamp(0.0, 0.999);
    let falloff = 1.0 - smoothstep(inner, 1.0, d);
    let radial = mix(1.0 - d, 1.0 - d * d, saturate(light.attenuation));
    light.color * radial * falloff
}

/// Summed dynamic light plus the hue of the brightest contributor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightAccumulation {
    pub total: Vec3,
    /// Max-normalized color of the brightest contributor.
    pub dominant_hue: Vec3,
    /// Luminance of that contributor; 0 when nothing reaches the point.
    pub dominant_weight: f32,
}

pub fn accumulate_lights<'a>(
    lights: impl IntoIterator<Item = &'a LightRecord>,
    world: Vec2,
) -> LightAccumulation {
    let mut acc = LightAccumulation {
        total: Vec3::ZERO,
        dominant_hue: Vec3::ONE,
        dominant_weight: 0.0,
    };
    for light in lights {
        let c = light_contribution(light, world);
        acc.total += c;
        let weight = luminance(c);
        if weight > acc.dominant_weight {
            acc.dominant_weight = weight;
            acc.dominant_hue = c / c.max_element().max(1e-4);
        }
    }
    acc
}

/// `mix(globalTint, dominantHue, strength)` when a dominant light exists.
pub fn effective_light_color(global_tint: Vec3, acc: &LightAccumulation, strength: f32) -> Vec3 {
    if acc.dominant_weight <= 0.0 {
        return global_tint;
    }
    global_tint.lerp(acc.dominant_hue, saturate(strength * saturate(acc.dominant_weight)))
}

// ============================================================================
// Specular
// ============================================================================

/// Rain wet mask from albedo, gated by outdoor coverage and wetness.
pub fn wet_mask(albedo: Vec3, p: &SpecularParams, outdoor: f32, wetness: f32) -> f32 {
    let mut x = luminance(albedo) + p.wet_brightness;
    x = saturate(x).powf(p.wet_gamma.max(0.01));
    x = (x - 0.5) * p.wet_contrast + 0.5;
    smoothstep(p.wet_black_point, p.wet_white_point, x) * saturate(outdoor) * saturate(wetness)
}

/// `smoothstep(threshold, 1, freeze)`.
pub fn frost_level(freeze: f32, threshold: f32) -> f32 {
    smoothstep(threshold.min(0.999), 1.0, saturate(freeze))
}

/// `mix(1, shadow, suppression)`, shadow 1 = lit.
pub fn building_shadow_factor(shadow: f32, suppression: f32) -> f32 {
    mix(1.0, saturate(shadow), saturate(suppression))
}

/// Stripe attenuation outdoors: `mix(1, outdoorBlend, outdoor)`.
pub fn outdoor_stripe_factor(outdoor: f32, outdoor_blend: f32) -> f32 {
    mix(1.0, outdoor_blend, saturate(outdoor))
}

/// Base-plane output (`outputMode = 0`).
///
/// Lit albedo is linear; only the specular sum is tone mapped so a dry,
/// unlit frame reproduces `albedo * ambient` exactly.
pub fn base_output(
    albedo: Vec3,
    env: &EnvironmentSnapshot,
    dynamic: Vec3,
    specular: Vec3,
    effect_enabled: bool,
) -> Vec3 {
    let env = env.sanitized();
    let tint = env.ambient_tint();
    if !effect_enabled {
        return albedo * tint;
    }
    let lit = albedo * (tint * env.light_level() + dynamic);
    lit + reinhard_jodie(specular.max(Vec3::ZERO))
}

/// Tile-overlay output (`outputMode = 1`): `None` when clipped.
pub fn overlay_output(albedo_alpha: f32, specular: Vec3, alpha_clip: f32) -> Option<Vec3> {
    (albedo_alpha > alpha_clip).then(|| reinhard_jodie(specular.max(Vec3::ZERO)))
}

// ============================================================================
// Window light
// ============================================================================

/// Per-channel falloff with the lightning contrast boost.
pub fn window_shape(mask: f32, falloff: f32, flash: f32, contrast_boost: f32) -> f32 {
    let x = saturate(mask).powf(falloff.max(0.01));
    x.powf(1.0 / (1.0 + saturate(flash) * contrast_boost.max(0.0)))
}

/// Shapes the cloud-shadow sample (1 = lit) into a light multiplier.
pub fn window_cloud_factor(cloud: f32, p: &WindowLightParams) -> f32 {
    let mut c = saturate(cloud + p.cloud_bias);
    c = c.powf(p.cloud_gamma.max(0.01));
    c = saturate((c - 0.5) * p.cloud_contrast + 0.5);
    mix(1.0, c.max(p.cloud_min_light), saturate(p.cloud_influence))
}

/// Linear dimming to 0.3 at full fog.
pub fn window_fog_dim(fog_density: f32, enabled: bool) -> f32 {
    if enabled {
        mix(1.0, 0.3, saturate(fog_density))
    } else {
        1.0
    }
}

pub fn window_darkness_dim(darkness: f32, night_dimming: f32) -> f32 {
    (1.0 - saturate(darkness) * saturate(night_dimming)).max(0.0)
}

// ============================================================================
// Fog
// ============================================================================

/// Radial base haze: `mix(0.25, 1, smoothstep(start, end, r))`.
pub fn fog_radial(r: f32, start: f32, end: f32) -> f32 {
    mix(0.25, 1.0, smoothstep(start, end.max(start + 1e-3), r))
}

/// Density response; zero density yields zero strength.
pub fn fog_strength(density: f32, radial: f32, noise_shape: f32) -> f32 {
    let d = saturate(density);
    (1.0 - (-d * 2.25 * radial).exp()) * mix(0.65, 1.35, saturate(noise_shape))
}

/// Large-scale cutout, strongest at low density.
pub fn fog_cutout(density: f32, cutout_strength: f32, cutout_noise: f32) -> f32 {
    let fade = (1.0 - saturate(density)).powf(1.35);
    1.0 - saturate(cutout_strength) * fade * smoothstep(0.35, 0.75, cutout_noise)
}

/// Indoor reduction from the roof distance field (source pixels).
pub fn fog_outdoor_factor(distance_px: f32, p: &FogParams) -> f32 {
    let far = smoothstep(
        p.building_buffer_px,
        p.building_buffer_px + p.building_softness_px.max(1.0),
        distance_px,
    );
    1.0 - saturate(p.indoor_reduction) * (1.0 - far)
}

/// Elevated geometry (closer than the ground plane) receives less fog.
pub fn fog_depth_modulation(linear_depth: f32, ground_distance: f32, strength: f32) -> f32 {
    if ground_distance <= 0.0 {
        return 1.0;
    }
    let ratio = linear_depth / ground_distance;
    mix(1.0, smoothstep(0.990, 1.001, ratio), saturate(strength))
}

/// Fog color after night, sky and darkness shading.
///
/// The darkening term uses `max(darkness, cloudCover)` so overcast noon
/// fog reads as grey rather than bright haze.
pub fn fog_color(p: &FogParams, env: &EnvironmentSnapshot) -> Vec3 {
    let env = env.sanitized();
    let night = exp_ease(saturate(env.darkness_level * p.night_strength), 3.0);
    let mut color = p.color.lerp(p.night_color, saturate(night));
    let sky = env.sky_factor() * (1.0 - env.darkness_level);
    let sky_lerp = exp_ease(sky, 2.0) * p.sky_lerp;
    let sky_mul = exp_ease(sky, 2.0) * p.sky_multiply;
    color = color.lerp(p.sky_color, saturate(sky_lerp));
    color *= Vec3::ONE.lerp(p.sky_color, saturate(sky_mul));
    let dark = env.darkness_level.max(env.cloud_cover);
    color * fog_shade(dark, p.color_min)
}

/// `1 - dark * (1 - colorMin)`.
pub fn fog_shade(dark: f32, color_min: f32) -> f32 {
    1.0 - saturate(dark) * (1.0 - saturate(color_min))
}

/// Final opacity, never above `max_opacity`.
pub fn fog_amount(strength: f32, p: &FogParams, outdoor: f32, depth_mod: f32) -> f32 {
    (strength * p.max_opacity * outdoor * depth_mod).clamp(0.0, p.max_opacity)
}

pub fn apply_fog(scene: Vec3, fog: Vec3, amount: f32) -> Vec3 {
    scene.lerp(fog, saturate(amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PassParams;

    fn scenario_light() -> LightRecord {
        LightRecord {
            position: Vec2::new(500.0, 500.0),
            color: Vec3::new(2.0, 1.0, 0.4),
            radius_px: 200.0,
            bright_px: 100.0,
            attenuation: 0.5,
        }
    }

    fn close(a: Vec3, b: Vec3, eps: f32) -> bool {
        (a - b).abs().max_element() < eps
    }

    #[test]
    fn test_single_light_center_and_falloff() {
        let light = scenario_light();
        let center = light_contribution(&light, Vec2::new(500.0, 500.0));
        assert!(close(center, Vec3::new(2.0, 1.0, 0.4), 1e-6));

        let edge = light_contribution(&light, Vec2::new(500.0, 650.0));
        assert!(close(edge, Vec3::new(0.34375, 0.171875, 0.06875), 1e-5), "{edge}");

        assert_eq!(
            light_contribution(&light, Vec2::new(500.0, 700.0)),
            Vec3::ZERO
        );
    }

    #[test]
    fn test_no_lights_no_dynamic_contribution() {
        let acc = accumulate_lights(std::iter::empty(), Vec2::ZERO);
        assert_eq!(acc.total, Vec3::ZERO);
        assert_eq!(acc.dominant_weight, 0.0);
        let tint = Vec3::new(1.0, 0.9, 0.8);
        assert_eq!(effective_light_color(tint, &acc, 1.0), tint);
    }

    #[test]
    fn test_dominant_hue_tracks_brightest() {
        let warm = scenario_light();
        let cool = LightRecord {
            position: Vec2::new(520.0, 500.0),
            color: Vec3::new(0.1, 0.1, 0.3),
            ..scenario_light()
        };
        let acc = accumulate_lights([&cool, &warm], Vec2::new(505.0, 500.0));
        assert!(close(acc.dominant_hue, Vec3::new(1.0, 0.5, 0.2), 1e-3));
    }

    #[test]
    fn test_wet_mask_rain_scenario() {
        let p = SpecularParams::default();
        // Grey albedo with luminance 0.7.
        let albedo = Vec3::splat(0.7);
        let m = wet_mask(albedo, &p, 1.0, 1.0);
        assert!((m - 1.0).abs() < 1e-6, "{m}");
        assert_eq!(wet_mask(albedo, &p, 0.0, 1.0), 0.0);
        assert_eq!(wet_mask(albedo, &p, 1.0, 0.0), 0.0);
    }

    #[test]
    fn test_darkness_floor_in_base_output() {
        for i in 0..=10 {
            let env = EnvironmentSnapshot {
                darkness_level: i as f32 / 10.0,
                ambient_daylight: Vec3::ONE,
                ambient_darkness: Vec3::ONE,
                ..Default::default()
            };
            assert!(env.light_level() >= 0.25);
            let out = base_output(Vec3::ONE, &env, Vec3::ZERO, Vec3::ZERO, true);
            assert!(out.min_element() >= 0.25 - 1e-6, "{out}");
        }
    }

    #[test]
    fn test_dry_unlit_base_is_albedo_times_daylight() {
        let env = EnvironmentSnapshot {
            ambient_daylight: Vec3::new(0.9, 0.95, 1.0),
            ..Default::default()
        };
        let albedo = Vec3::new(0.5, 0.25, 0.75);
        let out = base_output(albedo, &env, Vec3::ZERO, Vec3::ZERO, true);
        assert!(close(out, albedo * env.ambient_daylight, 1.0 / 255.0));
        let off = base_output(albedo, &env, Vec3::ZERO, Vec3::splat(3.0), false);
        assert!(close(off, albedo * env.ambient_tint(), 1e-6));
    }

    #[test]
    fn test_overlay_alpha_clip() {
        assert!(overlay_output(0.05, Vec3::ONE, 0.1).is_none());
        assert!(overlay_output(0.5, Vec3::ONE, 0.1).is_some());
    }

    #[test]
    fn test_fog_zero_density_is_identity() {
        let p = FogParams::default();
        let env = EnvironmentSnapshot::default();
        let scene = Vec3::new(0.2, 0.4, 0.6);
        for noise in [0.0, 0.5, 1.0] {
            let strength = fog_strength(0.0, fog_radial(0.7, p.falloff_start, p.falloff_end), noise);
            let amount = fog_amount(strength * fog_cutout(0.0, p.cutout_strength, 0.9), &p, 1.0, 1.0);
            assert_eq!(amount, 0.0);
            assert_eq!(apply_fog(scene, fog_color(&p, &env), amount), scene);
        }
    }

    #[test]
    fn test_fog_full_cover_darkens_to_color_min() {
        let p = FogParams {
            sky_lerp: 0.0,
            sky_multiply: 0.0,
            ..Default::default()
        }
        .sanitized();
        let clear = fog_color(&p, &EnvironmentSnapshot::default());
        let overcast = fog_color(
            &p,
            &EnvironmentSnapshot {
                cloud_cover: 1.0,
                fog_density: 1.0,
                ..Default::default()
            },
        );
        assert!(close(overcast, clear * 0.3, 1e-5));
    }

    #[test]
    fn test_fog_amount_capped() {
        let p = FogParams::default();
        let s = fog_strength(1.0, 1.0, 1.0);
        assert!(s > 1.0);
        assert_eq!(fog_amount(s, &p, 1.0, 1.0), p.max_opacity);
    }

    #[test]
    fn test_fog_indoor_reduction() {
        let p = FogParams::default();
        assert!((fog_outdoor_factor(0.0, &p) - (1.0 - p.indoor_reduction)).abs() < 1e-6);
        assert_eq!(fog_outdoor_factor(10_000.0, &p), 1.0);
    }

    #[test]
    fn test_fog_depth_modulation() {
        assert_eq!(fog_depth_modulation(501.0, 500.0, 1.0), 1.0);
        assert_eq!(fog_depth_modulation(400.0, 500.0, 1.0), 0.0);
        assert_eq!(fog_depth_modulation(400.0, 500.0, 0.0), 1.0);
    }

    #[test]
    fn test_window_dimming_terms() {
        assert!((window_fog_dim(1.0, true) - 0.3).abs() < 1e-6);
        assert_eq!(window_fog_dim(1.0, false), 1.0);
        assert_eq!(window_darkness_dim(1.0, 1.0), 0.0);
        assert!(window_shape(0.5, 2.0, 1.0, 1.0) > window_shape(0.5, 2.0, 0.0, 1.0));
    }

    #[test]
    fn test_frost_threshold() {
        assert_eq!(frost_level(0.2, 0.3), 0.0);
        assert_eq!(frost_level(1.0, 0.3), 1.0);
    }
}

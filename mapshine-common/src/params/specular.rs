use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{ControlSchema, ParamGroup, ParamSpec, PassParams, default_true, sanitize_color};

/// How the stripe layers combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StripeBlendMode {
    #[default]
    Add,
    Multiply,
    Screen,
    Overlay,
}

impl StripeBlendMode {
    pub fn as_u32(self) -> u32 {
        match self {
            StripeBlendMode::Add => 0,
            StripeBlendMode::Multiply => 1,
            StripeBlendMode::Screen => 2,
            StripeBlendMode::Overlay => 3,
        }
    }

    /// CPU mirror of the shader's layer blend.
    pub fn blend(self, base: f32, layer: f32) -> f32 {
        match self {
            StripeBlendMode::Add => base + layer,
            StripeBlendMode::Multiply => base * layer,
            StripeBlendMode::Screen => 1.0 - (1.0 - base) * (1.0 - layer),
            StripeBlendMode::Overlay => {
                if base < 0.5 {
                    2.0 * base * layer
                } else {
                    1.0 - 2.0 * (1.0 - base) * (1.0 - layer)
                }
            }
        }
    }
}

/// One animated stripe layer. Coordinates are world-space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StripeLayerParams {
    pub enabled: bool,
    /// Stripes per 1000 world pixels.
    pub frequency: f32,
    pub speed: f32,
    /// Degrees.
    pub angle: f32,
    pub width: f32,
    /// Camera parallax factor.
    pub parallax: f32,
    /// Simplex UV warp amount.
    pub wave: f32,
    /// Simplex-gated cutout amount.
    pub gaps: f32,
    pub softness: f32,
    pub intensity: f32,
}

impl Default for StripeLayerParams {
    fn default() -> Self {
        SpecularParams::default_layers()[0]
    }
}

const LAYER_IDS: [[&str; 9]; 3] = [
    [
        "stripe1Frequency",
        "stripe1Speed",
        "stripe1Angle",
        "stripe1Width",
        "stripe1Parallax",
        "stripe1Wave",
        "stripe1Gaps",
        "stripe1Softness",
        "stripe1Intensity",
    ],
    [
        "stripe2Frequency",
        "stripe2Speed",
        "stripe2Angle",
        "stripe2Width",
        "stripe2Parallax",
        "stripe2Wave",
        "stripe2Gaps",
        "stripe2Softness",
        "stripe2Intensity",
    ],
    [
        "stripe3Frequency",
        "stripe3Speed",
        "stripe3Angle",
        "stripe3Width",
        "stripe3Parallax",
        "stripe3Wave",
        "stripe3Gaps",
        "stripe3Softness",
        "stripe3Intensity",
    ],
];

const LAYER_LABELS: [&str; 9] = [
    "Frequency",
    "Speed",
    "Angle",
    "Width",
    "Parallax",
    "Wave",
    "Gaps",
    "Softness",
    "Intensity",
];

const LAYER_RANGES: [(f32, f32, f32); 9] = [
    (0.1, 100.0, 0.1),
    (-5.0, 5.0, 0.01),
    (0.0, 360.0, 1.0),
    (0.0, 1.0, 0.01),
    (-1.0, 1.0, 0.01),
    (0.0, 2.0, 0.01),
    (0.0, 1.0, 0.01),
    (0.0, 1.0, 0.01),
    (0.0, 4.0, 0.01),
];

impl StripeLayerParams {
    fn numbers_mut(&mut self) -> [&mut f32; 9] {
        [
            &mut self.frequency,
            &mut self.speed,
            &mut self.angle,
            &mut self.width,
            &mut self.parallax,
            &mut self.wave,
            &mut self.gaps,
            &mut self.softness,
            &mut self.intensity,
        ]
    }
}

/// Specular/PBR surface parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecularParams {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub intensity: f32,
    /// Constant roughness, multiplied by the roughness map.
    pub roughness: f32,
    pub tint: Vec3,

    pub stripes_enabled: bool,
    pub stripe_blend_mode: StripeBlendMode,
    /// Specular-mask luminance gate for the mask path only.
    pub stripe_mask_threshold: f32,
    pub layers: [StripeLayerParams; 3],

    pub sparkle_enabled: bool,
    pub sparkle_intensity: f32,
    /// Cell size in world pixels.
    pub sparkle_scale: f32,
    pub sparkle_speed: f32,
    pub sparkle_density: f32,

    pub wet_enabled: bool,
    pub wet_intensity: f32,
    pub wet_black_point: f32,
    pub wet_white_point: f32,
    pub wet_contrast: f32,
    pub wet_brightness: f32,
    pub wet_gamma: f32,
    pub wet_output_gamma: f32,
    pub wet_output_max: f32,
    pub wet_ripple_strength: f32,
    pub wet_ripple_scale: f32,
    /// Scale of the CPU-integrated wind offset.
    pub wind_scale: f32,

    pub frost_enabled: bool,
    pub frost_intensity: f32,
    pub frost_threshold: f32,
    pub frost_tint: Vec3,

    pub cloud_specular_enabled: bool,
    pub cloud_specular_intensity: f32,
    pub outdoor_stripe_blend: f32,

    pub building_shadow_suppression: f32,
    pub light_tint_strength: f32,
    pub dynamic_light_intensity: f32,
    pub lightning_boost: f32,
    pub tile_alpha_clip: f32,
}

impl Default for SpecularParams {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: 0.53,
            roughness: 0.5,
            tint: Vec3::ONE,
            stripes_enabled: true,
            stripe_blend_mode: StripeBlendMode::Add,
            stripe_mask_threshold: 0.1,
            layers: Self::default_layers(),
            sparkle_enabled: true,
            sparkle_intensity: 0.3,
            sparkle_scale: 24.0,
            sparkle_speed: 1.2,
            sparkle_density: 0.08,
            wet_enabled: true,
            wet_intensity: 1.0,
            wet_black_point: 0.2,
            wet_white_point: 1.0,
            wet_contrast: 3.0,
            wet_brightness: 0.0,
            wet_gamma: 1.0,
            wet_output_gamma: 1.0,
            wet_output_max: 1.5,
            wet_ripple_strength: 0.4,
            wet_ripple_scale: 1.0,
            wind_scale: 1.0,
            frost_enabled: true,
            frost_intensity: 0.6,
            frost_threshold: 0.3,
            frost_tint: Vec3::new(0.85, 0.92, 1.0),
            cloud_specular_enabled: true,
            cloud_specular_intensity: 0.5,
            outdoor_stripe_blend: 0.35,
            building_shadow_suppression: 0.8,
            light_tint_strength: 0.5,
            dynamic_light_intensity: 1.0,
            lightning_boost: 1.5,
            tile_alpha_clip: 0.1,
        }
    }
}

impl SpecularParams {
    pub fn default_layers() -> [StripeLayerParams; 3] {
        [
            StripeLayerParams {
                enabled: true,
                frequency: 11.0,
                speed: 0.2,
                angle: 115.0,
                width: 0.2,
                parallax: 0.2,
                wave: 0.5,
                gaps: 0.3,
                softness: 0.1,
                intensity: 1.0,
            },
            StripeLayerParams {
                enabled: true,
                frequency: 15.0,
                speed: 0.35,
                angle: 111.0,
                width: 0.4,
                parallax: 0.1,
                wave: 0.3,
                gaps: 0.5,
                softness: 0.2,
                intensity: 0.5,
            },
            StripeLayerParams {
                enabled: false,
                frequency: 5.0,
                speed: 0.1,
                angle: 125.0,
                width: 0.1,
                parallax: 0.4,
                wave: 0.8,
                gaps: 0.2,
                softness: 0.3,
                intensity: 0.3,
            },
        ]
    }
}

impl PassParams for SpecularParams {
    fn control_schema() -> ControlSchema {
        let d = Self::default();
        let mut groups = vec![
            ParamGroup {
                name: "material",
                label: "Material",
                params: vec![
                    ParamSpec::new("intensity", "Intensity", 0.0, 3.0, 0.01, d.intensity),
                    ParamSpec::new("roughness", "Roughness", 0.0, 1.0, 0.01, d.roughness),
                    ParamSpec::new(
                        "dynamicLightIntensity",
                        "Dynamic Lights",
                        0.0,
                        4.0,
                        0.01,
                        d.dynamic_light_intensity,
                    ),
                    ParamSpec::new(
                        "lightTintStrength",
                        "Light Tint",
                        0.0,
                        1.0,
                        0.01,
                        d.light_tint_strength,
                    ),
                    ParamSpec::new(
                        "lightningBoost",
                        "Lightning Boost",
                        0.0,
                        8.0,
                        0.01,
                        d.lightning_boost,
                    ),
                    ParamSpec::new(
                        "tileAlphaClip",
                        "Tile Alpha Clip",
                        0.0,
                        1.0,
                        0.01,
                        d.tile_alpha_clip,
                    ),
                ],
            },
            ParamGroup {
                name: "stripes",
                label: "Stripes",
                params: vec![ParamSpec::new(
                    "stripeMaskThreshold",
                    "Mask Threshold",
                    0.0,
                    1.0,
                    0.01,
                    d.stripe_mask_threshold,
                )],
            },
        ];
        for (i, layer) in d.layers.iter().enumerate() {
            let mut layer = *layer;
            let values = layer.numbers_mut().map(|v| *v);
            let params = (0..9)
                .map(|f| {
                    let (min, max, step) = LAYER_RANGES[f];
                    ParamSpec::new(LAYER_IDS[i][f], LAYER_LABELS[f], min, max, step, values[f])
                })
                .collect();
            groups.push(ParamGroup {
                name: ["stripe1", "stripe2", "stripe3"][i],
                label: ["Stripe Layer 1", "Stripe Layer 2", "Stripe Layer 3"][i],
                params,
            });
        }
        groups.extend([
            ParamGroup {
                name: "sparkle",
                label: "Sparkle",
                params: vec![
                    ParamSpec::new("sparkleIntensity", "Intensity", 0.0, 2.0, 0.01, d.sparkle_intensity),
                    ParamSpec::new("sparkleScale", "Cell Size", 2.0, 500.0, 1.0, d.sparkle_scale),
                    ParamSpec::new("sparkleSpeed", "Speed", 0.0, 10.0, 0.01, d.sparkle_speed),
                    ParamSpec::new("sparkleDensity", "Density", 0.0, 1.0, 0.01, d.sparkle_density),
                ],
            },
            ParamGroup {
                name: "wet",
                label: "Wet Surface",
                params: vec![
                    ParamSpec::new("wetIntensity", "Intensity", 0.0, 4.0, 0.01, d.wet_intensity),
                    ParamSpec::new("wetBlackPoint", "Black Point", 0.0, 1.0, 0.01, d.wet_black_point),
                    ParamSpec::new("wetWhitePoint", "White Point", 0.0, 1.0, 0.01, d.wet_white_point),
                    ParamSpec::new("wetContrast", "Contrast", 0.1, 10.0, 0.01, d.wet_contrast),
                    ParamSpec::new("wetBrightness", "Brightness", -1.0, 1.0, 0.01, d.wet_brightness),
                    ParamSpec::new("wetGamma", "Input Gamma", 0.1, 4.0, 0.01, d.wet_gamma),
                    ParamSpec::new(
                        "wetOutputGamma",
                        "Output Gamma",
                        0.1,
                        4.0,
                        0.01,
                        d.wet_output_gamma,
                    ),
                    ParamSpec::new("wetOutputMax", "Output Max", 0.0, 8.0, 0.01, d.wet_output_max),
                    ParamSpec::new(
                        "wetRippleStrength",
                        "Ripple Strength",
                        0.0,
                        2.0,
                        0.01,
                        d.wet_ripple_strength,
                    ),
                    ParamSpec::new(
                        "wetRippleScale",
                        "Ripple Scale",
                        0.1,
                        10.0,
                        0.01,
                        d.wet_ripple_scale,
                    ),
                    ParamSpec::new("windScale", "Wind Scale", 0.0, 10.0, 0.01, d.wind_scale),
                ],
            },
            ParamGroup {
                name: "frost",
                label: "Frost",
                params: vec![
                    ParamSpec::new("frostIntensity", "Intensity", 0.0, 4.0, 0.01, d.frost_intensity),
                    ParamSpec::new("frostThreshold", "Threshold", 0.0, 1.0, 0.01, d.frost_threshold),
                ],
            },
            ParamGroup {
                name: "outdoor",
                label: "Outdoor",
                params: vec![
                    ParamSpec::new(
                        "cloudSpecularIntensity",
                        "Cloud Specular",
                        0.0,
                        4.0,
                        0.01,
                        d.cloud_specular_intensity,
                    ),
                    ParamSpec::new(
                        "outdoorStripeBlend",
                        "Outdoor Stripe Blend",
                        0.0,
                        1.0,
                        0.01,
                        d.outdoor_stripe_blend,
                    ),
                    ParamSpec::new(
                        "buildingShadowSuppression",
                        "Building Shadow Suppression",
                        0.0,
                        1.0,
                        0.01,
                        d.building_shadow_suppression,
                    ),
                ],
            },
        ]);
        ControlSchema {
            pass: "specular",
            groups,
        }
    }

    fn visit_numbers(&mut self, visit: &mut dyn FnMut(&'static str, &mut f32)) {
        visit("intensity", &mut self.intensity);
        visit("roughness", &mut self.roughness);
        visit("dynamicLightIntensity", &mut self.dynamic_light_intensity);
        visit("lightTintStrength", &mut self.light_tint_strength);
        visit("lightningBoost", &mut self.lightning_boost);
        visit("tileAlphaClip", &mut self.tile_alpha_clip);
        visit("stripeMaskThreshold", &mut self.stripe_mask_threshold);
        for (i, layer) in self.layers.iter_mut().enumerate() {
            for (f, value) in layer.numbers_mut().into_iter().enumerate() {
                visit(LAYER_IDS[i][f], value);
            }
        }
        visit("sparkleIntensity", &mut self.sparkle_intensity);
        visit("sparkleScale", &mut self.sparkle_scale);
        visit("sparkleSpeed", &mut self.sparkle_speed);
        visit("sparkleDensity", &mut self.sparkle_density);
        visit("wetIntensity", &mut self.wet_intensity);
        visit("wetBlackPoint", &mut self.wet_black_point);
        visit("wetWhitePoint", &mut self.wet_white_point);
        visit("wetContrast", &mut self.wet_contrast);
        visit("wetBrightness", &mut self.wet_brightness);
        visit("wetGamma", &mut self.wet_gamma);
        visit("wetOutputGamma", &mut self.wet_output_gamma);
        visit("wetOutputMax", &mut self.wet_output_max);
        visit("wetRippleStrength", &mut self.wet_ripple_strength);
        visit("wetRippleScale", &mut self.wet_ripple_scale);
        visit("windScale", &mut self.wind_scale);
        visit("frostIntensity", &mut self.frost_intensity);
        visit("frostThreshold", &mut self.frost_threshold);
        visit("cloudSpecularIntensity", &mut self.cloud_specular_intensity);
        visit("outdoorStripeBlend", &mut self.outdoor_stripe_blend);
        visit(
            "buildingShadowSuppression",
            &mut self.building_shadow_suppression,
        );
    }

    fn sanitize_extra(&mut self) {
        self.tint = sanitize_color(self.tint, Vec3::ONE);
        self.frost_tint = sanitize_color(self.frost_tint, Vec3::new(0.85, 0.92, 1.0));
        if self.wet_white_point <= self.wet_black_point {
            self.wet_white_point = (self.wet_black_point + 0.01).min(1.0);
            self.wet_black_point = self.wet_black_point.min(self.wet_white_point - 0.01);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_modes() {
        assert_eq!(StripeBlendMode::Add.blend(0.25, 0.5), 0.75);
        assert_eq!(StripeBlendMode::Multiply.blend(0.25, 0.5), 0.125);
        assert_eq!(StripeBlendMode::Screen.blend(0.5, 0.5), 0.75);
        assert_eq!(StripeBlendMode::Overlay.blend(0.25, 0.5), 0.25);
        assert_eq!(StripeBlendMode::Overlay.blend(0.75, 0.5), 0.75);
    }

    #[test]
    fn test_deserialize_partial() {
        let p: SpecularParams = serde_json::from_str(
            r#"{"intensity": 0.75, "stripeBlendMode": "screen", "wetEnabled": false}"#,
        )
        .unwrap();
        assert_eq!(p.intensity, 0.75);
        assert_eq!(p.stripe_blend_mode, StripeBlendMode::Screen);
        assert!(!p.wet_enabled);
        assert!(p.enabled);
        assert_eq!(p.layers, SpecularParams::default_layers());
    }

    #[test]
    fn test_inverted_wet_points_repaired() {
        let p = SpecularParams {
            wet_black_point: 0.8,
            wet_white_point: 0.2,
            ..Default::default()
        }
        .sanitized();
        assert!(p.wet_white_point > p.wet_black_point);
    }
}

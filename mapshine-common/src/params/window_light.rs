use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{ControlSchema, ParamGroup, ParamSpec, PassParams, sanitize_color};

/// Window-light pool, rain-on-glass and light-only target parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WindowLightParams {
    pub enabled: bool,
    pub intensity: f32,
    pub color: Vec3,
    /// Per-channel `pow(mask, falloff)`.
    pub falloff: f32,
    /// RGB split distance in screen pixels.
    pub rgb_split: f32,
    /// Degrees.
    pub rgb_split_angle: f32,
    pub lightning_contrast_boost: f32,
    pub flash_strength: f32,
    pub roof_suppression: f32,
    pub night_dimming: f32,
    pub fog_dimming: bool,
    pub sky_tint_strength: f32,
    pub sky_color: Vec3,
    pub specular_boost: f32,

    pub cloud_influence: f32,
    pub cloud_bias: f32,
    pub cloud_gamma: f32,
    pub cloud_contrast: f32,
    pub cloud_min_light: f32,

    pub sun_tracking: bool,
    /// Offset length in scene pixels.
    pub sun_light_length: f32,

    pub rain_enabled: bool,
    pub rain_intensity: f32,
    /// Normalized distance-to-wall band where the flow tangent rules.
    pub flow_width: f32,
    pub flow_dead_zone: f32,
    pub rivulet_scale: f32,
    pub rivulet_aspect: f32,
    pub rivulet_speed: f32,
    pub rivulet_threshold: f32,
    pub max_offset_px: f32,
    pub edge_hi: f32,
    pub darken_strength: f32,
    pub darken_gamma: f32,
    pub rain_specular: f32,

    pub splash_enabled: bool,
    pub splash_intensity: f32,
    /// Cell size in screen pixels.
    pub splash_scale: f32,
    pub splash_rate: f32,
    pub splash_use_atlas: bool,

    pub light_only_enabled: bool,
    pub light_only_brightness: f32,
}

impl Default for WindowLightParams {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: 1.2,
            color: Vec3::new(1.0, 0.82, 0.55),
            falloff: 2.0,
            rgb_split: 0.0,
            rgb_split_angle: 0.0,
            lightning_contrast_boost: 0.5,
            flash_strength: 1.0,
            roof_suppression: 1.0,
            night_dimming: 0.0,
            fog_dimming: true,
            sky_tint_strength: 0.3,
            sky_color: Vec3::new(0.6, 0.7, 1.0),
            specular_boost: 0.5,
            cloud_influence: 1.0,
            cloud_bias: 0.0,
            cloud_gamma: 1.0,
            cloud_contrast: 1.0,
            cloud_min_light: 0.2,
            sun_tracking: false,
            sun_light_length: 40.0,
            rain_enabled: true,
            rain_intensity: 1.0,
            flow_width: 0.15,
            flow_dead_zone: 0.1,
            rivulet_scale: 6.0,
            rivulet_aspect: 3.0,
            rivulet_speed: 0.4,
            rivulet_threshold: 0.55,
            max_offset_px: 6.0,
            edge_hi: 0.15,
            darken_strength: 0.25,
            darken_gamma: 1.5,
            rain_specular: 0.3,
            splash_enabled: true,
            splash_intensity: 0.5,
            splash_scale: 48.0,
            splash_rate: 1.5,
            splash_use_atlas: false,
            light_only_enabled: true,
            light_only_brightness: 1.0,
        }
    }
}

impl PassParams for WindowLightParams {
    fn control_schema() -> ControlSchema {
        let d = Self::default();
        ControlSchema {
            pass: "windowLight",
            groups: vec![
                ParamGroup {
                    name: "light",
                    label: "Light",
                    params: vec![
                        ParamSpec::new("intensity", "Intensity", 0.0, 8.0, 0.01, d.intensity),
                        ParamSpec::new("falloff", "Falloff", 0.1, 8.0, 0.01, d.falloff),
                        ParamSpec::new("rgbSplit", "RGB Split", 0.0, 32.0, 0.1, d.rgb_split),
                        ParamSpec::new(
                            "rgbSplitAngle",
                            "RGB Split Angle",
                            0.0,
                            360.0,
                            1.0,
                            d.rgb_split_angle,
                        ),
                        ParamSpec::new(
                            "specularBoost",
                            "Specular Glint",
                            0.0,
                            4.0,
                            0.01,
                            d.specular_boost,
                        ),
                        ParamSpec::new(
                            "sunLightLength",
                            "Sun Offset",
                            0.0,
                            500.0,
                            1.0,
                            d.sun_light_length,
                        ),
                    ],
                },
                ParamGroup {
                    name: "environment",
                    label: "Environment",
                    params: vec![
                        ParamSpec::new(
                            "lightningContrastBoost",
                            "Lightning Contrast",
                            0.0,
                            4.0,
                            0.01,
                            d.lightning_contrast_boost,
                        ),
                        ParamSpec::new(
                            "flashStrength",
                            "Lightning Flash",
                            0.0,
                            8.0,
                            0.01,
                            d.flash_strength,
                        ),
                        ParamSpec::new(
                            "roofSuppression",
                            "Roof Suppression",
                            0.0,
                            1.0,
                            0.01,
                            d.roof_suppression,
                        ),
                        ParamSpec::new(
                            "nightDimming",
                            "Night Dimming",
                            0.0,
                            1.0,
                            0.01,
                            d.night_dimming,
                        ),
                        ParamSpec::new(
                            "skyTintStrength",
                            "Sky Tint",
                            0.0,
                            1.0,
                            0.01,
                            d.sky_tint_strength,
                        ),
                        ParamSpec::new(
                            "cloudInfluence",
                            "Cloud Influence",
                            0.0,
                            1.0,
                            0.01,
                            d.cloud_influence,
                        ),
                        ParamSpec::new("cloudBias", "Cloud Bias", -1.0, 1.0, 0.01, d.cloud_bias),
                        ParamSpec::new("cloudGamma", "Cloud Gamma", 0.1, 4.0, 0.01, d.cloud_gamma),
                        ParamSpec::new(
                            "cloudContrast",
                            "Cloud Contrast",
                            0.0,
                            4.0,
                            0.01,
                            d.cloud_contrast,
                        ),
                        ParamSpec::new(
                            "cloudMinLight",
                            "Cloud Min Light",
                            0.0,
                            1.0,
                            0.01,
                            d.cloud_min_light,
                        ),
                    ],
                },
                ParamGroup {
                    name: "rain",
                    label: "Rain On Glass",
                    params: vec![
                        ParamSpec::new(
                            "rainIntensity",
                            "Intensity",
                            0.0,
                            2.0,
                            0.01,
                            d.rain_intensity,
                        ),
                        ParamSpec::new("flowWidth", "Flow Band", 0.0, 1.0, 0.01, d.flow_width),
                        ParamSpec::new(
                            "flowDeadZone",
                            "Flow Dead Zone",
                            0.0,
                            1.0,
                            0.01,
                            d.flow_dead_zone,
                        ),
                        ParamSpec::new(
                            "rivuletScale",
                            "Rivulet Scale",
                            0.1,
                            64.0,
                            0.1,
                            d.rivulet_scale,
                        ),
                        ParamSpec::new(
                            "rivuletAspect",
                            "Rivulet Aspect",
                            1.0,
                            16.0,
                            0.1,
                            d.rivulet_aspect,
                        ),
                        ParamSpec::new(
                            "rivuletSpeed",
                            "Rivulet Speed",
                            0.0,
                            5.0,
                            0.01,
                            d.rivulet_speed,
                        ),
                        ParamSpec::new(
                            "rivuletThreshold",
                            "Rivulet Threshold",
                            0.0,
                            1.0,
                            0.01,
                            d.rivulet_threshold,
                        ),
                        ParamSpec::new(
                            "maxOffsetPx",
                            "Max Distortion",
                            0.0,
                            64.0,
                            0.1,
                            d.max_offset_px,
                        ),
                        ParamSpec::new("edgeHi", "Edge Guard", 0.001, 1.0, 0.001, d.edge_hi),
                        ParamSpec::new(
                            "darkenStrength",
                            "Wet Darkening",
                            0.0,
                            1.0,
                            0.01,
                            d.darken_strength,
                        ),
                        ParamSpec::new(
                            "darkenGamma",
                            "Darkening Gamma",
                            0.1,
                            8.0,
                            0.01,
                            d.darken_gamma,
                        ),
                        ParamSpec::new(
                            "rainSpecular",
                            "Rain Specular",
                            0.0,
                            4.0,
                            0.01,
                            d.rain_specular,
                        ),
                    ],
                },
                ParamGroup {
                    name: "splash",
                    label: "Splashes",
                    params: vec![
                        ParamSpec::new(
                            "splashIntensity",
                            "Intensity",
                            0.0,
                            4.0,
                            0.01,
                            d.splash_intensity,
                        ),
                        ParamSpec::new("splashScale", "Cell Size", 4.0, 512.0, 1.0, d.splash_scale),
                        ParamSpec::new("splashRate", "Rate", 0.0, 10.0, 0.01, d.splash_rate),
                    ],
                },
                ParamGroup {
                    name: "lightOnly",
                    label: "Roof Light Target",
                    params: vec![ParamSpec::new(
                        "lightOnlyBrightness",
                        "Brightness",
                        0.0,
                        8.0,
                        0.01,
                        d.light_only_brightness,
                    )],
                },
            ],
        }
    }

    fn visit_numbers(&mut self, visit: &mut dyn FnMut(&'static str, &mut f32)) {
        visit("intensity", &mut self.intensity);
        visit("falloff", &mut self.falloff);
        visit("rgbSplit", &mut self.rgb_split);
        visit("rgbSplitAngle", &mut self.rgb_split_angle);
        visit("specularBoost", &mut self.specular_boost);
        visit("sunLightLength", &mut self.sun_light_length);
        visit("lightningContrastBoost", &mut self.lightning_contrast_boost);
        visit("flashStrength", &mut self.flash_strength);
        visit("roofSuppression", &mut self.roof_suppression);
        visit("nightDimming", &mut self.night_dimming);
        visit("skyTintStrength", &mut self.sky_tint_strength);
        visit("cloudInfluence", &mut self.cloud_influence);
        visit("cloudBias", &mut self.cloud_bias);
        visit("cloudGamma", &mut self.cloud_gamma);
        visit("cloudContrast", &mut self.cloud_contrast);
        visit("cloudMinLight", &mut self.cloud_min_light);
        visit("rainIntensity", &mut self.rain_intensity);
        visit("flowWidth", &mut self.flow_width);
        visit("flowDeadZone", &mut self.flow_dead_zone);
        visit("rivuletScale", &mut self.rivulet_scale);
        visit("rivuletAspect", &mut self.rivulet_aspect);
        visit("rivuletSpeed", &mut self.rivulet_speed);
        visit("rivuletThreshold", &mut self.rivulet_threshold);
        visit("maxOffsetPx", &mut self.max_offset_px);
        visit("edgeHi", &mut self.edge_hi);
        visit("darkenStrength", &mut self.darken_strength);
        visit("darkenGamma", &mut self.darken_gamma);
        visit("rainSpecular", &mut self.rain_specular);
        visit("splashIntensity", &mut self.splash_intensity);
        visit("splashScale", &mut self.splash_scale);
        visit("splashRate", &mut self.splash_rate);
        visit("lightOnlyBrightness", &mut self.light_only_brightness);
    }

    fn sanitize_extra(&mut self) {
        self.color = sanitize_color(self.color, Vec3::new(1.0, 0.82, 0.55));
        self.sky_color = sanitize_color(self.sky_color, Vec3::new(0.6, 0.7, 1.0));
    }
}

impl WindowLightParams {
    /// Effective rain strength: `precipitation · rainIntensity`, zero when
    /// rain is disabled.
    pub fn rain_k(&self, precipitation: f32) -> f32 {
        if self.rain_enabled {
            (precipitation.clamp(0.0, 1.0) * self.rain_intensity).max(0.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rain_k() {
        let p = WindowLightParams::default();
        assert_eq!(p.rain_k(0.0), 0.0);
        assert_eq!(p.rain_k(1.0), 1.0);
        assert_eq!(p.rain_k(5.0), 1.0);
        let off = WindowLightParams {
            rain_enabled: false,
            ..Default::default()
        };
        assert_eq!(off.rain_k(1.0), 0.0);
    }
}

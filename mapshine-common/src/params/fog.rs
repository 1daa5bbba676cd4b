use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{ControlSchema, ParamGroup, ParamSpec, PassParams, sanitize_color};

/// Atmospheric fog post-pass parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FogParams {
    pub enabled: bool,
    pub color: Vec3,
    pub max_opacity: f32,
    pub falloff_start: f32,
    pub falloff_end: f32,

    pub noise_scale: f32,
    pub noise_contrast: f32,
    pub noise_warp: f32,
    pub wind_influence: f32,
    /// Exponential smoothing rate of the wind vector (1/s).
    pub wind_smoothing: f32,
    pub evolution_speed: f32,

    pub cutout_strength: f32,
    pub cutout_scale: f32,
    pub cutout_speed: f32,

    pub indoor_reduction: f32,
    pub building_buffer_px: f32,
    pub building_softness_px: f32,

    pub use_depth: bool,
    pub depth_fog_strength: f32,

    pub night_color: Vec3,
    pub night_strength: f32,
    pub sky_color: Vec3,
    pub sky_lerp: f32,
    pub sky_multiply: f32,
    pub color_min: f32,
}

impl Default for FogParams {
    fn default() -> Self {
        Self {
            enabled: true,
            color: Vec3::new(0.78, 0.8, 0.84),
            max_opacity: 0.85,
            falloff_start: 0.1,
            falloff_end: 0.9,
            noise_scale: 1.0,
            noise_contrast: 1.2,
            noise_warp: 0.5,
            wind_influence: 1.0,
            wind_smoothing: 1.5,
            evolution_speed: 0.05,
            cutout_strength: 0.6,
            cutout_scale: 0.35,
            cutout_speed: 0.02,
            indoor_reduction: 0.9,
            building_buffer_px: 20.0,
            building_softness_px: 80.0,
            use_depth: true,
            depth_fog_strength: 0.6,
            night_color: Vec3::new(0.05, 0.06, 0.1),
            night_strength: 1.0,
            sky_color: Vec3::new(1.0, 0.72, 0.5),
            sky_lerp: 0.25,
            sky_multiply: 0.15,
            color_min: 0.3,
        }
    }
}

impl PassParams for FogParams {
    fn control_schema() -> ControlSchema {
        let d = Self::default();
        ControlSchema {
            pass: "fog",
            groups: vec![
                ParamGroup {
                    name: "shape",
                    label: "Shape",
                    params: vec![
                        ParamSpec::new("maxOpacity", "Max Opacity", 0.0, 1.0, 0.01, d.max_opacity),
                        ParamSpec::new(
                            "falloffStart",
                            "Falloff Start",
                            0.0,
                            1.5,
                            0.01,
                            d.falloff_start,
                        ),
                        ParamSpec::new("falloffEnd", "Falloff End", 0.0, 2.0, 0.01, d.falloff_end),
                    ],
                },
                ParamGroup {
                    name: "noise",
                    label: "Noise",
                    params: vec![
                        ParamSpec::new("noiseScale", "Scale", 0.05, 20.0, 0.01, d.noise_scale),
                        ParamSpec::new(
                            "noiseContrast",
                            "Contrast",
                            0.1,
                            4.0,
                            0.01,
                            d.noise_contrast,
                        ),
                        ParamSpec::new("noiseWarp", "Warp", 0.0, 2.0, 0.01, d.noise_warp),
                        ParamSpec::new(
                            "windInfluence",
                            "Wind Influence",
                            0.0,
                            10.0,
                            0.01,
                            d.wind_influence,
                        ),
                        ParamSpec::new(
                            "windSmoothing",
                            "Wind Smoothing",
                            0.01,
                            20.0,
                            0.01,
                            d.wind_smoothing,
                        ),
                        ParamSpec::new(
                            "evolutionSpeed",
                            "Evolution Speed",
                            0.0,
                            2.0,
                            0.001,
                            d.evolution_speed,
                        ),
                    ],
                },
                ParamGroup {
                    name: "cutout",
                    label: "Cutout",
                    params: vec![
                        ParamSpec::new(
                            "cutoutStrength",
                            "Strength",
                            0.0,
                            1.0,
                            0.01,
                            d.cutout_strength,
                        ),
                        ParamSpec::new("cutoutScale", "Scale", 0.01, 10.0, 0.01, d.cutout_scale),
                        ParamSpec::new("cutoutSpeed", "Speed", 0.0, 1.0, 0.001, d.cutout_speed),
                    ],
                },
                ParamGroup {
                    name: "buildings",
                    label: "Buildings",
                    params: vec![
                        ParamSpec::new(
                            "indoorReduction",
                            "Indoor Reduction",
                            0.0,
                            1.0,
                            0.01,
                            d.indoor_reduction,
                        ),
                        ParamSpec::new(
                            "buildingBufferPx",
                            "Buffer",
                            0.0,
                            1000.0,
                            1.0,
                            d.building_buffer_px,
                        ),
                        ParamSpec::new(
                            "buildingSoftnessPx",
                            "Softness",
                            1.0,
                            2000.0,
                            1.0,
                            d.building_softness_px,
                        ),
                        ParamSpec::new(
                            "depthFogStrength",
                            "Depth Fog",
                            0.0,
                            1.0,
                            0.01,
                            d.depth_fog_strength,
                        ),
                    ],
                },
                ParamGroup {
                    name: "color",
                    label: "Color",
                    params: vec![
                        ParamSpec::new(
                            "nightStrength",
                            "Night Strength",
                            0.0,
                            4.0,
                            0.01,
                            d.night_strength,
                        ),
                        ParamSpec::new("skyLerp", "Sky Blend", 0.0, 1.0, 0.01, d.sky_lerp),
                        ParamSpec::new(
                            "skyMultiply",
                            "Sky Multiply",
                            0.0,
                            1.0,
                            0.01,
                            d.sky_multiply,
                        ),
                        ParamSpec::new("colorMin", "Color Floor", 0.0, 1.0, 0.01, d.color_min),
                    ],
                },
            ],
        }
    }

    fn visit_numbers(&mut self, visit: &mut dyn FnMut(&'static str, &mut f32)) {
        visit("maxOpacity", &mut self.max_opacity);
        visit("falloffStart", &mut self.falloff_start);
        visit("falloffEnd", &mut self.falloff_end);
        visit("noiseScale", &mut self.noise_scale);
        visit("noiseContrast", &mut self.noise_contrast);
        visit("noiseWarp", &mut self.noise_warp);
        visit("windInfluence", &mut self.wind_influence);
        visit("windSmoothing", &mut self.wind_smoothing);
        visit("evolutionSpeed", &mut self.evolution_speed);
        visit("cutoutStrength", &mut self.cutout_strength);
        visit("cutoutScale", &mut self.cutout_scale);
        visit("cutoutSpeed", &mut self.cutout_speed);
        visit("indoorReduction", &mut self.indoor_reduction);
        visit("buildingBufferPx", &mut self.building_buffer_px);
        visit("buildingSoftnessPx", &mut self.building_softness_px);
        visit("depthFogStrength", &mut self.depth_fog_strength);
        visit("nightStrength", &mut self.night_strength);
        visit("skyLerp", &mut self.sky_lerp);
        visit("skyMultiply", &mut self.sky_multiply);
        visit("colorMin", &mut self.color_min);
    }

    fn sanitize_extra(&mut self) {
        let d = Self::default();
        self.color = sanitize_color(self.color, d.color);
        self.night_color = sanitize_color(self.night_color, d.night_color);
        self.sky_color = sanitize_color(self.sky_color, d.sky_color);
        if self.falloff_end <= self.falloff_start {
            self.falloff_end = self.falloff_start + 0.01;
        }
    }
}

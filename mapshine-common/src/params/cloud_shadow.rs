use serde::{Deserialize, Serialize};

use super::{ControlSchema, ParamGroup, ParamSpec, PassParams};

/// Screen-space cloud shadow parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudShadowParams {
    pub enabled: bool,
    /// Cloud feature scale; larger is bigger clouds.
    pub scale: f32,
    pub softness: f32,
    /// Darkness of a fully covered texel (`1 - min lit`).
    pub shadow_strength: f32,
    pub coverage_bias: f32,
    pub wind_influence: f32,
    pub evolution_speed: f32,
}

impl Default for CloudShadowParams {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: 1.0,
            softness: 0.2,
            shadow_strength: 0.6,
            coverage_bias: 0.0,
            wind_influence: 1.0,
            evolution_speed: 0.02,
        }
    }
}

impl PassParams for CloudShadowParams {
    fn control_schema() -> ControlSchema {
        let d = Self::default();
        ControlSchema {
            pass: "cloudShadow",
            groups: vec![ParamGroup {
                name: "clouds",
                label: "Clouds",
                params: vec![
                    ParamSpec::new("scale", "Scale", 0.05, 20.0, 0.01, d.scale),
                    ParamSpec::new("softness", "Softness", 0.01, 1.0, 0.01, d.softness),
                    ParamSpec::new(
                        "shadowStrength",
                        "Shadow Strength",
                        0.0,
                        1.0,
                        0.01,
                        d.shadow_strength,
                    ),
                    ParamSpec::new(
                        "coverageBias",
                        "Coverage Bias",
                        -1.0,
                        1.0,
                        0.01,
                        d.coverage_bias,
                    ),
                    ParamSpec::new(
                        "windInfluence",
                        "Wind Influence",
                        0.0,
                        10.0,
                        0.01,
                        d.wind_influence,
                    ),
                    ParamSpec::new(
                        "evolutionSpeed",
                        "Evolution Speed",
                        0.0,
                        1.0,
                        0.001,
                        d.evolution_speed,
                    ),
                ],
            }],
        }
    }

    fn visit_numbers(&mut self, visit: &mut dyn FnMut(&'static str, &mut f32)) {
        visit("scale", &mut self.scale);
        visit("softness", &mut self.softness);
        visit("shadowStrength", &mut self.shadow_strength);
        visit("coverageBias", &mut self.coverage_bias);
        visit("windInfluence", &mut self.wind_influence);
        visit("evolutionSpeed", &mut self.evolution_speed);
    }
}

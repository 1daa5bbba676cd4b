//! Engine configuration (`mapshine.toml`).
//!
//! Every section is optional and every field falls back to its default, so
//! a partial file only overrides what it names. Pass sections use the same
//! camelCase keys as the host's control documents.

use std::path::Path;

use anyhow::{Context, Result};
use mapshine_common::{
    CloudShadowParams, FlowFieldParams, FogParams, MAX_LIGHTS, PassParams, SpecularParams,
    WindowLightParams,
};
use serde::{Deserialize, Serialize};

/// Format of the ping-pong scene color targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TargetFormat {
    /// Half-float targets; additive passes never clip before the blit.
    #[default]
    Rgba16Float,
    Rgba8Unorm,
}

impl TargetFormat {
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TargetFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TargetFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSection {
    /// Light registry capacity; clamped to the uniform array size.
    pub max_lights: usize,
    pub target_format: TargetFormat,
    pub flow_field: FlowFieldParams,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_lights: MAX_LIGHTS,
            target_format: TargetFormat::default(),
            flow_field: FlowFieldParams::default(),
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub specular: SpecularParams,
    #[serde(default)]
    pub window_light: WindowLightParams,
    #[serde(default)]
    pub fog: FogParams,
    #[serde(default)]
    pub cloud_shadow: CloudShadowParams,
}

impl EngineConfig {
    /// Reads and sanitizes a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        Ok(config.sanitized())
    }

    /// Defaults plus environment overrides:
    /// - `MAPSHINE_MAX_LIGHTS`
    /// - `MAPSHINE_FLOW_MAX_SIZE`
    /// - `MAPSHINE_FLOW_MIN_SIZE`
    ///
    /// Invalid values are ignored.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies the environment overrides on top of `self`.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse_u32 = |var: &str| lookup(var)?.trim().parse::<u32>().ok();

        if let Some(v) = parse_u32("MAPSHINE_MAX_LIGHTS") {
            self.engine.max_lights = v as usize;
        }
        if let Some(v) = parse_u32("MAPSHINE_FLOW_MAX_SIZE") {
            self.engine.flow_field.max_size = v;
        }
        if let Some(v) = parse_u32("MAPSHINE_FLOW_MIN_SIZE") {
            self.engine.flow_field.min_size = v;
        }
        self.sanitized()
    }

    /// Clamps every section into its documented range.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.engine.max_lights = self.engine.max_lights.clamp(1, MAX_LIGHTS);
        self.engine.flow_field = self.engine.flow_field.sanitized();
        self.specular = self.specular.sanitized();
        self.window_light = self.window_light.sanitized();
        self.fog = self.fog.sanitized();
        self.cloud_shadow = self.cloud_shadow.sanitized();
        self
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [fog]
            maxOpacity = 0.4

            [engine]
            maxLights = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.fog.max_opacity, 0.4);
        assert_eq!(config.engine.max_lights, 8);
        assert_eq!(config.specular, SpecularParams::default());
        assert_eq!(config.engine.flow_field, FlowFieldParams::default());
    }

    #[test]
    fn test_load_clamps_out_of_range() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\nmaxLights = 500\n\n[fog]\nmaxOpacity = 7.0").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.engine.max_lights, MAX_LIGHTS);
        assert_eq!(config.fog.max_opacity, 1.0);
    }

    #[test]
    fn test_load_missing_file_has_context() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("nope.toml"));
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::default().with_overrides(|var| match var {
            "MAPSHINE_MAX_LIGHTS" => Some("12".into()),
            "MAPSHINE_FLOW_MAX_SIZE" => Some("2048".into()),
            "MAPSHINE_FLOW_MIN_SIZE" => Some("not a number".into()),
            _ => None,
        });
        assert_eq!(config.engine.max_lights, 12);
        assert_eq!(config.engine.flow_field.max_size, 2048);
        assert_eq!(
            config.engine.flow_field.min_size,
            FlowFieldParams::default().min_size
        );
    }

    #[test]
    fn test_round_trips_through_toml() {
        let mut config = EngineConfig::default();
        config.engine.target_format = TargetFormat::Rgba8Unorm;
        config.window_light.intensity = 2.0;
        let text = config.to_toml().unwrap();
        assert_eq!(EngineConfig::from_toml(&text).unwrap(), config);
    }
}

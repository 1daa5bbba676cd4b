//! Per-pass parameter records and their control schemas.
//!
//! The schema is the single source of ranges: `sanitized()` clamps every
//! numeric field against the same `ParamSpec` the UI would bind to.

mod cloud_shadow;
mod fog;
mod specular;
mod window_light;

use glam::Vec3;
use serde::Serialize;

use crate::error::EffectError;

pub use cloud_shadow::CloudShadowParams;
pub use fog::FogParams;
pub use specular::{SpecularParams, StripeBlendMode, StripeLayerParams};
pub use window_light::WindowLightParams;

/// One numeric control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub default: f32,
}

impl ParamSpec {
    pub const fn new(
        id: &'static str,
        label: &'static str,
        min: f32,
        max: f32,
        step: f32,
        default: f32,
    ) -> Self {
        Self {
            id,
            label,
            min,
            max,
            step,
            default,
        }
    }

    /// Clamps `value` into range; NaN/Inf become the default.
    pub fn clamp(&self, value: f32) -> (f32, Option<EffectError>) {
        if !value.is_finite() {
            return (
                self.default,
                Some(EffectError::InvalidConfig {
                    name: self.id.to_owned(),
                    value: value as f64,
                }),
            );
        }
        let clamped = value.clamp(self.min, self.max);
        let err = (clamped != value).then(|| EffectError::InvalidConfig {
            name: self.id.to_owned(),
            value: value as f64,
        });
        (clamped, err)
    }
}

/// Named group of controls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamGroup {
    pub name: &'static str,
    pub label: &'static str,
    pub params: Vec<ParamSpec>,
}

/// Full control surface of one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlSchema {
    pub pass: &'static str,
    pub groups: Vec<ParamGroup>,
}

impl ControlSchema {
    pub fn find(&self, id: &str) -> Option<&ParamSpec> {
        self.groups
            .iter()
            .flat_map(|g| g.params.iter())
            .find(|p| p.id == id)
    }

    pub fn params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.groups.iter().flat_map(|g| g.params.iter())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Implemented by every pass parameter record.
pub trait PassParams: Default + Clone {
    fn control_schema() -> ControlSchema;

    /// Visits every numeric field with its schema id.
    fn visit_numbers(&mut self, visit: &mut dyn FnMut(&'static str, &mut f32));

    /// Clamps non-numeric fields (colors, directions).
    fn sanitize_extra(&mut self) {}

    /// Clamps every field and returns the recovered config errors.
    fn sanitize_report(&mut self) -> Vec<EffectError> {
        let schema = Self::control_schema();
        let mut errors = Vec::new();
        self.visit_numbers(&mut |id, value| {
            if let Some(spec) = schema.find(id) {
                let (clamped, err) = spec.clamp(*value);
                *value = clamped;
                errors.extend(err);
            }
        });
        self.sanitize_extra();
        errors
    }

    /// Clamps every field into its documented range.
    #[must_use]
    fn sanitized(mut self) -> Self {
        let errors = self.sanitize_report();
        for err in &errors {
            tracing::debug!("{err}, clamped");
        }
        self
    }
}

/// Linear color deserialized from `[r, g, b]`.
pub(crate) fn sanitize_color(c: Vec3, fallback: Vec3) -> Vec3 {
    if c.is_finite() {
        c.clamp(Vec3::ZERO, Vec3::splat(16.0))
    } else {
        fallback
    }
}

/// Serde default helper for `true`.
pub(crate) fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_schema<P: PassParams>() {
        let schema = P::control_schema();
        let mut defaults = P::default();
        let mut seen = Vec::new();
        defaults.visit_numbers(&mut |id, value| {
            let spec = schema
                .find(id)
                .unwrap_or_else(|| panic!("{id} missing from {} schema", schema.pass));
            assert!(spec.min <= spec.max, "{id}");
            assert!(spec.step > 0.0, "{id}");
            assert_eq!(spec.default, *value, "{id} default disagrees with schema");
            assert!(*value >= spec.min && *value <= spec.max, "{id}");
            seen.push(id);
        });
        assert_eq!(seen.len(), schema.params().count(), "{}", schema.pass);
    }

    #[test]
    fn test_schemas_match_defaults() {
        check_schema::<SpecularParams>();
        check_schema::<WindowLightParams>();
        check_schema::<FogParams>();
        check_schema::<CloudShadowParams>();
    }

    #[test]
    fn test_clamp_reports() {
        let spec = ParamSpec::new("x", "X", 0.0, 1.0, 0.01, 0.5);
        assert_eq!(spec.clamp(0.25), (0.25, None));
        let (v, err) = spec.clamp(3.0);
        assert_eq!(v, 1.0);
        assert!(matches!(err, Some(EffectError::InvalidConfig { .. })));
        assert_eq!(spec.clamp(f32::NAN).0, 0.5);
    }

    #[test]
    fn test_sanitize_clamps_out_of_range() {
        let mut fog = FogParams {
            max_opacity: 4.0,
            falloff_start: -1.0,
            ..Default::default()
        };
        let errors = fog.sanitize_report();
        assert_eq!(errors.len(), 2);
        assert_eq!(fog.max_opacity, 1.0);
        assert_eq!(fog.falloff_start, 0.0);
    }

    #[test]
    fn test_schema_serializes() {
        let json = SpecularParams::control_schema().to_json();
        assert_eq!(json["pass"], "specular");
        assert!(json["groups"].as_array().is_some_and(|g| !g.is_empty()));
    }
}

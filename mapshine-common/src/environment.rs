//! Shared environment state.
//!
//! One snapshot per process, written by an external weather/time driver
//! between frames and read by every pass. Every consumer clamps again on
//! read; the snapshot is untrusted across pass boundaries.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::color::parse_color;
use crate::math::{mix, safe_normalize, saturate};

/// Minimum light level applied to surface shading so interiors stay visible.
pub const DARKNESS_LIGHT_FLOOR: f32 = 0.25;

/// Default wind direction (scene-UV space, +y is down the map).
pub const DEFAULT_WIND_DIRECTION: Vec2 = Vec2::new(0.0, 1.0);

/// Snapshot of weather, time of day and lighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvironmentSnapshot {
    pub darkness_level: f32,
    pub cloud_cover: f32,
    pub fog_density: f32,
    pub precipitation: f32,
    /// Slow-tracked surface wetness, opaque input from the weather driver.
    pub wetness: f32,
    pub freeze_level: f32,
    pub wind_direction: Vec2,
    pub wind_speed: f32,
    pub lightning_flash: f32,
    /// Hours, `[0, 24)`.
    pub time_of_day: f32,
    pub ambient_daylight: Vec3,
    pub ambient_darkness: Vec3,
    pub ambient_brightest: Vec3,
}

impl Default for EnvironmentSnapshot {
    fn default() -> Self {
        Self {
            darkness_level: 0.0,
            cloud_cover: 0.0,
            fog_density: 0.0,
            precipitation: 0.0,
            wetness: 0.0,
            freeze_level: 0.0,
            wind_direction: DEFAULT_WIND_DIRECTION,
            wind_speed: 0.0,
            lightning_flash: 0.0,
            time_of_day: 12.0,
            ambient_daylight: Vec3::ONE,
            ambient_darkness: Vec3::new(0.033, 0.044, 0.125),
            ambient_brightest: Vec3::ONE,
        }
    }
}

impl EnvironmentSnapshot {
    /// Clamp every field into its documented range.
    ///
    /// NaN scalars fall back to the default value for that field.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        let unit = |v: f32, fallback: f32| if v.is_nan() { fallback } else { saturate(v) };
        let color = |v: Vec3, fallback: Vec3| {
            if v.is_finite() {
                v.max(Vec3::ZERO)
            } else {
                fallback
            }
        };

        let wind_direction = if self.wind_direction.is_finite()
            && self.wind_direction.length_squared() > 1e-8
        {
            safe_normalize(self.wind_direction)
        } else {
            d.wind_direction
        };

        let time_of_day = if self.time_of_day.is_finite() {
            self.time_of_day.rem_euclid(24.0)
        } else {
            d.time_of_day
        };

        Self {
            darkness_level: unit(self.darkness_level, d.darkness_level),
            cloud_cover: unit(self.cloud_cover, d.cloud_cover),
            fog_density: unit(self.fog_density, d.fog_density),
            precipitation: unit(self.precipitation, d.precipitation),
            wetness: unit(self.wetness, d.wetness),
            freeze_level: unit(self.freeze_level, d.freeze_level),
            wind_direction,
            wind_speed: unit(self.wind_speed, d.wind_speed),
            lightning_flash: unit(self.lightning_flash, d.lightning_flash),
            time_of_day,
            ambient_daylight: color(self.ambient_daylight, d.ambient_daylight),
            ambient_darkness: color(self.ambient_darkness, d.ambient_darkness),
            ambient_brightest: color(self.ambient_brightest, d.ambient_brightest),
        }
    }

    /// Surface light level, never below [`DARKNESS_LIGHT_FLOOR`].
    pub fn light_level(&self) -> f32 {
        (1.0 - saturate(self.darkness_level)).max(DARKNESS_LIGHT_FLOOR)
    }

    /// `mix(daylight, darkness, darkness_level)`.
    pub fn ambient_tint(&self) -> Vec3 {
        self.ambient_daylight
            .lerp(self.ambient_darkness, saturate(self.darkness_level))
    }

    /// Projected sun direction in scene-UV space (y down).
    ///
    /// Morning light travels west, evening light travels east, noon light
    /// travels up the map.
    pub fn sun_direction(&self) -> Vec2 {
        let angle = (self.time_of_day - 12.0) / 12.0 * std::f32::consts::PI;
        Vec2::new(angle.sin(), -angle.cos())
    }

    /// Sky tint strength from time of day: 0 at noon, 1 at midnight,
    /// warm ramps near dawn and dusk.
    pub fn sky_factor(&self) -> f32 {
        let from_noon = ((self.time_of_day - 12.0).abs() / 12.0).clamp(0.0, 1.0);
        from_noon * from_noon
    }

    /// Applies the host's ambient colors (`canvas.environment.colors`).
    ///
    /// Missing or unparsable entries keep their previous value.
    pub fn apply_host_colors(&mut self, colors: &Value) {
        if let Some(c) = colors.get("ambientDaylight").and_then(parse_color) {
            self.ambient_daylight = c;
        }
        if let Some(c) = colors.get("ambientDarkness").and_then(parse_color) {
            self.ambient_darkness = c;
        }
        if let Some(c) = colors.get("ambientBrightest").and_then(parse_color) {
            self.ambient_brightest = c;
        }
    }
}

/// CPU-integrated wind displacement.
///
/// Integrates `direction * speed * delta * scale` every frame; the
/// projection on the wind direction therefore never decreases while
/// `speed >= 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindAccumulator {
    pub offset: Vec2,
}

impl WindAccumulator {
    /// Advances by one frame. Non-finite or negative input is ignored.
    pub fn advance(&mut self, direction: Vec2, speed: f32, delta: f32, scale: f32) {
        if !(speed.is_finite() && delta.is_finite() && scale.is_finite()) {
            return;
        }
        let step = speed.max(0.0) * delta.max(0.0) * scale.max(0.0);
        let dir = safe_normalize(direction);
        self.offset += dir * step;
    }
}

/// Exponentially smoothed wind vector (`dir * speed`).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SmoothedWind {
    pub value: Vec2,
}

impl SmoothedWind {
    /// Moves toward `target` with time constant `1 / rate` seconds.
    pub fn advance(&mut self, target: Vec2, rate: f32, delta: f32) {
        if !target.is_finite() || !delta.is_finite() {
            return;
        }
        let k = 1.0 - (-rate.max(0.0) * delta.max(0.0)).exp();
        self.value = self.value.lerp(target, k);
    }
}

/// Time accumulator driven by its own speed (fog evolution, cloud drift).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScaledClock {
    pub time: f32,
}

impl ScaledClock {
    pub fn advance(&mut self, speed: f32, delta: f32) {
        if speed.is_finite() && delta.is_finite() {
            self.time += speed * delta.max(0.0);
            if self.time.abs() > 1.0e5 {
                self.time %= 1.0e5;
            }
        }
    }
}

/// Lightning flash multiplier used by surface passes.
pub fn flash_multiplier(flash: f32, strength: f32) -> f32 {
    mix(1.0, 1.0 + strength.max(0.0), saturate(flash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_darkness_floor_holds_for_all_levels() {
        for i in 0..=100 {
            let env = EnvironmentSnapshot {
                darkness_level: i as f32 / 100.0,
                ..Default::default()
            };
            assert!(env.light_level() >= DARKNESS_LIGHT_FLOOR);
        }
        let out_of_range = EnvironmentSnapshot {
            darkness_level: 7.0,
            ..Default::default()
        };
        assert_eq!(out_of_range.light_level(), DARKNESS_LIGHT_FLOOR);
    }

    #[test]
    fn test_sanitized_clamps_and_repairs() {
        let env = EnvironmentSnapshot {
            cloud_cover: 3.0,
            fog_density: -1.0,
            wetness: f32::NAN,
            wind_direction: Vec2::ZERO,
            time_of_day: 25.5,
            ambient_daylight: Vec3::new(f32::INFINITY, 0.0, 0.0),
            ..Default::default()
        }
        .sanitized();
        assert_eq!(env.cloud_cover, 1.0);
        assert_eq!(env.fog_density, 0.0);
        assert_eq!(env.wetness, 0.0);
        assert_eq!(env.wind_direction, DEFAULT_WIND_DIRECTION);
        assert!((env.time_of_day - 1.5).abs() < 1e-5);
        assert_eq!(env.ambient_daylight, Vec3::ONE);
    }

    #[test]
    fn test_ambient_tint_endpoints() {
        let mut env = EnvironmentSnapshot::default();
        assert_eq!(env.ambient_tint(), env.ambient_daylight);
        env.darkness_level = 1.0;
        assert!((env.ambient_tint() - env.ambient_darkness).abs().max_element() < 1e-6);
    }

    #[test]
    fn test_wind_accumulation_monotonic() {
        let mut acc = WindAccumulator::default();
        let dir = Vec2::new(0.8, 0.6);
        let mut last = 0.0;
        for frame in 0..500 {
            let speed = (frame % 7) as f32 / 7.0;
            acc.advance(dir, speed, 1.0 / 60.0, 3.0);
            let proj = acc.offset.dot(dir);
            assert!(proj >= last);
            last = proj;
        }
        assert!(last > 0.0);
        // x grows with the direction's x sign.
        assert!(acc.offset.x > 0.0);
    }

    #[test]
    fn test_wind_ignores_bad_input() {
        let mut acc = WindAccumulator::default();
        acc.advance(Vec2::X, f32::NAN, 0.016, 1.0);
        acc.advance(Vec2::X, -1.0, 0.016, 1.0);
        assert_eq!(acc.offset, Vec2::ZERO);
    }

    #[test]
    fn test_sun_direction_quadrants() {
        let at = |h: f32| {
            EnvironmentSnapshot {
                time_of_day: h,
                ..Default::default()
            }
            .sun_direction()
        };
        assert!((at(6.0) - Vec2::new(-1.0, 0.0)).length() < 1e-5);
        assert!((at(12.0) - Vec2::new(0.0, -1.0)).length() < 1e-5);
        assert!((at(18.0) - Vec2::new(1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_host_colors() {
        let mut env = EnvironmentSnapshot::default();
        env.apply_host_colors(&json!({
            "ambientDaylight": [0.9, 0.9, 1.0],
            "ambientDarkness": {"r": 0.1, "g": 0.1, "b": 0.2},
            "ambientBrightest": "not a color"
        }));
        assert_eq!(env.ambient_daylight, Vec3::new(0.9, 0.9, 1.0));
        assert_eq!(env.ambient_darkness, Vec3::new(0.1, 0.1, 0.2));
        assert_eq!(env.ambient_brightest, Vec3::ONE);
    }

    #[test]
    fn test_smoothed_wind_converges() {
        let mut w = SmoothedWind::default();
        for _ in 0..600 {
            w.advance(Vec2::new(1.0, 0.0), 2.0, 1.0 / 60.0);
        }
        assert!((w.value.x - 1.0).abs() < 1e-3);
    }
}

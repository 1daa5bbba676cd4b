//! Scalar/vector helpers mirrored by the WGSL `color.wgsl` and `noise.wgsl` snippets.
//!
//! Keeping the CPU copies bit-for-bit equivalent in formula (not in float
//! rounding) lets tests reason about what the shaders compute.

use glam::{Vec2, Vec3};

/// Length floor for vector normalization.
pub const NORMALIZE_EPSILON: f32 = 1e-4;

/// Rec. 709 luma weights (linear RGB).
pub const LUMA: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

#[inline]
pub fn saturate(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

#[inline]
pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// GLSL/WGSL `smoothstep`. Degenerate edges behave like a step at `e0`.
#[inline]
pub fn smoothstep(e0: f32, e1: f32, x: f32) -> f32 {
    if (e1 - e0).abs() < f32::EPSILON {
        return if x < e0 { 0.0 } else { 1.0 };
    }
    let t = saturate((x - e0) / (e1 - e0));
    t * t * (3.0 - 2.0 * t)
}

#[inline]
pub fn luminance(c: Vec3) -> f32 {
    c.dot(LUMA)
}

/// Normalizes with a length floor so zero vectors never produce NaN.
#[inline]
pub fn safe_normalize(v: Vec2) -> Vec2 {
    v / v.length().max(NORMALIZE_EPSILON)
}

/// Reinhard-Jodie: per-channel Reinhard blended toward the luminance
/// variant by the per-channel compressed value.
pub fn reinhard_jodie(c: Vec3) -> Vec3 {
    let l = luminance(c);
    let tc = c / (Vec3::ONE + c);
    let lc = c / (1.0 + l);
    lc + (tc - lc) * tc
}

/// `1 - exp(-k x)` normalised so that `x = 1` maps to 1.
#[inline]
pub fn exp_ease(x: f32, k: f32) -> f32 {
    if k.abs() < 1e-5 {
        return saturate(x);
    }
    (1.0 - (-k * saturate(x)).exp()) / (1.0 - (-k).exp())
}

#[inline]
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
pub fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Rotates a 2D vector by +90 degrees.
#[inline]
pub fn perp(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// Clamps a value and reports whether it was out of range.
#[inline]
pub fn clamp_report(x: f32, lo: f32, hi: f32) -> (f32, bool) {
    if x.is_nan() {
        return (lo, true);
    }
    let c = x.clamp(lo, hi);
    (c, c != x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothstep_edges() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert!((smoothstep(0.5, 1.0, 0.75) - 0.5).abs() < 1e-6);
        assert_eq!(smoothstep(0.3, 0.3, 0.2), 0.0);
        assert_eq!(smoothstep(0.3, 0.3, 0.4), 1.0);
    }

    #[test]
    fn test_reinhard_jodie_black_and_grey() {
        assert_eq!(reinhard_jodie(Vec3::ZERO), Vec3::ZERO);
        // Grey input: both variants agree at c / (1 + c).
        let g = reinhard_jodie(Vec3::splat(1.0));
        assert!((g - Vec3::splat(0.5)).abs().max_element() < 1e-5);
        // Strong highlights are compressed to roughly unit range.
        let hi = reinhard_jodie(Vec3::new(50.0, 2.0, 0.1));
        assert!(hi.x < 1.1);
        assert!(hi.z < 0.1);
    }

    #[test]
    fn test_safe_normalize_zero() {
        assert_eq!(safe_normalize(Vec2::ZERO), Vec2::ZERO);
        let n = safe_normalize(Vec2::new(3.0, 4.0));
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_exp_ease_endpoints() {
        assert!(exp_ease(0.0, 3.0).abs() < 1e-6);
        assert!((exp_ease(1.0, 3.0) - 1.0).abs() < 1e-6);
        assert!(exp_ease(0.5, 3.0) > 0.5);
    }

    #[test]
    fn test_srgb_roundtrip() {
        for i in 0..=10 {
            let c = i as f32 / 10.0;
            assert!((linear_to_srgb(srgb_to_linear(c)) - c).abs() < 1e-5);
        }
    }
}

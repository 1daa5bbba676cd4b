//! Box-kernel relaxation of the tangent/distance field.

use glam::Vec2;
use rayon::prelude::*;

use crate::math::safe_normalize;

/// One texel of the working field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowTexel {
    pub tangent: Vec2,
    /// Normalized distance in `[0, 1]`.
    pub distance: f32,
}

/// Runs `iterations` passes of `(2k+1)²` averaging with ping-pong buffers.
///
/// Each pass replaces a texel with `normalize(mix(prev, normalize(avg), mix))`
/// for the tangent and `mix(prev, avg, mix)` for the distance.
pub fn relax(
    field: Vec<FlowTexel>,
    width: usize,
    height: usize,
    iterations: u32,
    kernel_radius: u32,
    relax_mix: f32,
) -> Vec<FlowTexel> {
    if iterations == 0 || kernel_radius == 0 || width == 0 || height == 0 {
        return field;
    }
    let k = kernel_radius as isize;
    let mut src = field;
    let mut dst = src.clone();

    for _ in 0..iterations {
        dst.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let mut sum_t = Vec2::ZERO;
                let mut sum_d = 0.0f32;
                let mut n = 0u32;
                for dy in -k..=k {
                    let sy = (y as isize + dy).clamp(0, height as isize - 1) as usize;
                    for dx in -k..=k {
                        let sx = (x as isize + dx).clamp(0, width as isize - 1) as usize;
                        let t = src[sy * width + sx];
                        sum_t += t.tangent;
                        sum_d += t.distance;
                        n += 1;
                    }
                }
                let prev = src[y * width + x];
                let avg_t = safe_normalize(sum_t);
                let avg_d = sum_d / n as f32;
                let mixed = prev.tangent.lerp(avg_t, relax_mix);
                let tangent = if mixed.length_squared() > 1e-8 {
                    safe_normalize(mixed)
                } else {
                    prev.tangent
                };
                *out = FlowTexel {
                    tangent,
                    distance: prev.distance + (avg_d - prev.distance) * relax_mix,
                };
            }
        });
        std::mem::swap(&mut src, &mut dst);
    }
    src
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_field_is_fixed_point() {
        let t = FlowTexel {
            tangent: Vec2::new(0.6, 0.8),
            distance: 0.5,
        };
        let out = relax(vec![t; 64], 8, 8, 4, 1, 0.7);
        for texel in out {
            assert!((texel.tangent - t.tangent).length() < 1e-5);
            assert!((texel.distance - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_zero_mix_is_identity() {
        let field: Vec<FlowTexel> = (0..16)
            .map(|i| FlowTexel {
                tangent: if i % 2 == 0 { Vec2::X } else { Vec2::Y },
                distance: i as f32 / 16.0,
            })
            .collect();
        let out = relax(field.clone(), 4, 4, 3, 1, 0.0);
        assert_eq!(out, field);
    }

    #[test]
    fn test_relaxation_smooths_outlier() {
        let mut field = vec![
            FlowTexel {
                tangent: Vec2::X,
                distance: 1.0,
            };
            25
        ];
        field[12].tangent = Vec2::Y;
        let out = relax(field, 5, 5, 1, 1, 1.0);
        // 8 neighbours pointing +x dominate the centre.
        assert!(out[12].tangent.x > 0.9);
        assert!((out[12].tangent.length() - 1.0).abs() < 1e-5);
    }
}

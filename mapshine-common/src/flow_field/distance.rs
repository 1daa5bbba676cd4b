//! Exact squared Euclidean distance transform.
//!
//! Separable: a 1D lower-envelope transform down every column, then along
//! every row on the column result (Felzenszwalb & Huttenlocher).

use rayon::prelude::*;

/// Distance assigned to texels with no obstacle in their line before the
/// second pass.
pub const EDT_INF: f64 = 1.0e9;

/// Euclidean distance (in texels) from every texel to the nearest obstacle.
///
/// `obstacle` is row-major `width * height`. Obstacle texels get 0.
pub fn distance_field(obstacle: &[bool], width: usize, height: usize) -> Vec<f32> {
    debug_assert_eq!(obstacle.len(), width * height);

    // Column pass, stored column-major.
    let mut columns = vec![0.0f64; width * height];
    columns
        .par_chunks_mut(height)
        .enumerate()
        .for_each_init(
            || Envelope::new(height),
            |env, (x, col)| {
                let f: Vec<f64> = (0..height)
                    .map(|y| if obstacle[y * width + x] { 0.0 } else { EDT_INF })
                    .collect();
                env.transform(&f, col);
            },
        );

    // Row pass, stored row-major.
    let mut out = vec![0.0f32; width * height];
    out.par_chunks_mut(width)
        .enumerate()
        .for_each_init(
            || (Envelope::new(width), vec![0.0f64; width], vec![0.0f64; width]),
            |(env, f, d), (y, row)| {
                for (x, v) in f.iter_mut().enumerate() {
                    *v = columns[x * height + y];
                }
                env.transform(f, d);
                for (o, v) in row.iter_mut().zip(d.iter()) {
                    *o = v.sqrt() as f32;
                }
            },
        );
    out
}

/// Scratch space for the 1D transform.
struct Envelope {
    v: Vec<usize>,
    z: Vec<f64>,
}

impl Envelope {
    fn new(n: usize) -> Self {
        Self {
            v: vec![0; n.max(1)],
            z: vec![0.0; n.max(1) + 1],
        }
    }

    /// `d[q] = min_p (q - p)² + f[p]`.
    fn transform(&mut self, f: &[f64], d: &mut [f64]) {
        let n = f.len();
        if n == 0 {
            return;
        }
        let v = &mut self.v;
        let z = &mut self.z;
        let mut k = 0usize;
        v[0] = 0;
        z[0] = f64::NEG_INFINITY;
        z[1] = f64::INFINITY;

        let intersect = |q: usize, p: usize| -> f64 {
            let (qf, pf) = (q as f64, p as f64);
            ((f[q] + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf)
        };

        for q in 1..n {
            let mut s = intersect(q, v[k]);
            while s <= z[k] {
                k -= 1;
                s = intersect(q, v[k]);
            }
            k += 1;
            v[k] = q;
            z[k] = s;
            z[k + 1] = f64::INFINITY;
        }

        k = 0;
        for (q, out) in d.iter_mut().enumerate().take(n) {
            while z[k + 1] < q as f64 {
                k += 1;
            }
            let dq = q as f64 - v[k] as f64;
            *out = dq * dq + f[v[k]];
        }
    }
}

/// Central-difference gradient of `field`, clamped at the borders.
pub fn gradient(field: &[f32], width: usize, height: usize) -> Vec<[f32; 2]> {
    let mut out = vec![[0.0f32; 2]; width * height];
    out.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        let ym = y.saturating_sub(1);
        let yp = (y + 1).min(height - 1);
        for (x, g) in row.iter_mut().enumerate() {
            let xm = x.saturating_sub(1);
            let xp = (x + 1).min(width - 1);
            let dx = (field[y * width + xp] - field[y * width + xm]) / (xp - xm).max(1) as f32;
            let dy = (field[yp * width + x] - field[ym * width + x]) / (yp - ym).max(1) as f32;
            *g = [dx, dy];
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(obstacle: &[bool], w: usize, h: usize) -> Vec<f32> {
        let mut out = vec![0.0; w * h];
        for y in 0..h {
            for x in 0..w {
                let mut best = f64::INFINITY;
                for oy in 0..h {
                    for ox in 0..w {
                        if obstacle[oy * w + ox] {
                            let dx = x as f64 - ox as f64;
                            let dy = y as f64 - oy as f64;
                            best = best.min(dx * dx + dy * dy);
                        }
                    }
                }
                out[y * w + x] = best.sqrt() as f32;
            }
        }
        out
    }

    #[test]
    fn test_matches_brute_force() {
        let (w, h) = (23, 17);
        let obstacle: Vec<bool> = (0..w * h)
            .map(|i| {
                let (x, y) = (i % w, i / w);
                (x * 7 + y * 13) % 29 == 0 || (x == 11 && y > 4 && y < 12)
            })
            .collect();
        let fast = distance_field(&obstacle, w, h);
        let slow = brute_force(&obstacle, w, h);
        for (a, b) in fast.iter().zip(slow.iter()) {
            assert!((a - b).abs() < 1e-4, "{a} vs {b}");
        }
    }

    #[test]
    fn test_no_obstacles_is_large() {
        let field = distance_field(&[false; 16], 4, 4);
        assert!(field.iter().all(|d| *d > 30000.0));
    }

    #[test]
    fn test_gradient_points_away_from_obstacle() {
        let (w, h) = (9, 9);
        let mut obstacle = vec![false; w * h];
        obstacle[4 * w] = true;
        let field = distance_field(&obstacle, w, h);
        let g = gradient(&field, w, h);
        assert!(g[4 * w + 5][0] > 0.9);
        assert!(g[4 * w + 5][1].abs() < 1e-4);
    }
}

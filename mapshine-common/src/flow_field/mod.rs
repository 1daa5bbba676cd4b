//! Derived-mask builders: roof distance field and boundary flow field.
//!
//! Both derive from one binary obstacle mask (roofs, taken from the
//! outdoors mask by default). The flow field packs a unit tangent parallel
//! to the nearest obstacle boundary plus a shaped distance into RGBA8;
//! texel space is scene UV.

mod distance;
mod relax;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Vec2;
use half::f16;
use serde::{Deserialize, Serialize};

use crate::error::{EffectError, EffectResult};
use crate::math::{perp, safe_normalize, smoothstep};

pub use distance::{EDT_INF, distance_field, gradient};
pub use relax::{FlowTexel, relax};

/// Single-channel 8-bit source mask, row-major, row 0 at the top.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMask {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<u8>,
}

impl SourceMask {
    pub fn new(width: u32, height: u32, texels: Vec<u8>) -> EffectResult<Self> {
        let expected = width as usize * height as usize;
        if texels.len() != expected {
            return Err(EffectError::InvalidImage {
                id: "flow source".into(),
                expected,
                actual: texels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    /// Luminance of an RGBA8 image, alpha-weighted.
    pub fn from_rgba8(width: u32, height: u32, rgba: &[u8]) -> EffectResult<Self> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(EffectError::InvalidImage {
                id: "flow source".into(),
                expected,
                actual: rgba.len(),
            });
        }
        let texels = rgba
            .chunks_exact(4)
            .map(|p| {
                let l = 0.2126 * p[0] as f32 + 0.7152 * p[1] as f32 + 0.0722 * p[2] as f32;
                (l * p[3] as f32 / 255.0).round().clamp(0.0, 255.0) as u8
            })
            .collect();
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Nearest-neighbour sample at texel center `(x, y)` of a `w x h` grid.
    fn sample_nearest(&self, x: usize, y: usize, w: usize, h: usize) -> u8 {
        let sx = ((x as f32 + 0.5) * self.width as f32 / w as f32) as usize;
        let sy = ((y as f32 + 0.5) * self.height as f32 / h as f32) as usize;
        let sx = sx.min(self.width as usize - 1);
        let sy = sy.min(self.height as usize - 1);
        self.texels[sy * self.width as usize + sx]
    }
}

/// Generator parameters. Every field participates in the config key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowFieldParams {
    pub min_size: u32,
    pub max_size: u32,
    /// Obstacle threshold on the normalized source value.
    pub threshold: f32,
    /// Outdoors masks are white outdoors; roofs are the dark texels.
    pub invert: bool,
    /// Distance (source pixels) mapped to B = 1 before gamma.
    pub max_distance_px: f32,
    pub distance_gamma: f32,
    pub distance_scale: f32,
    pub iterations: u32,
    pub kernel_radius: u32,
    pub relax_mix: f32,
    /// Used where the field is undefined and for the ±90° disambiguation.
    pub default_direction: Vec2,
    /// Alignment dead zone for the tangent flip.
    pub dead_zone: f32,
    pub plateau_strength: f32,
    pub plateau_start: f32,
    pub plateau_feather: f32,
}

impl Default for FlowFieldParams {
    fn default() -> Self {
        Self {
            min_size: 256,
            max_size: 1024,
            threshold: 0.5,
            invert: true,
            max_distance_px: 256.0,
            distance_gamma: 1.0,
            distance_scale: 1.0,
            iterations: 4,
            kernel_radius: 1,
            relax_mix: 0.5,
            default_direction: Vec2::new(0.0, 1.0),
            dead_zone: 0.05,
            plateau_strength: 0.0,
            plateau_start: 0.6,
            plateau_feather: 0.2,
        }
    }
}

impl FlowFieldParams {
    /// Clamp every parameter into its documented range.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        let finite = |v: f32, fallback: f32| if v.is_finite() { v } else { fallback };
        let min_size = self.min_size.clamp(16, 4096);
        Self {
            min_size,
            max_size: self.max_size.clamp(min_size, 4096),
            threshold: finite(self.threshold, d.threshold).clamp(0.0, 1.0),
            invert: self.invert,
            max_distance_px: finite(self.max_distance_px, d.max_distance_px).clamp(1.0, 8192.0),
            distance_gamma: finite(self.distance_gamma, d.distance_gamma).clamp(0.05, 8.0),
            distance_scale: finite(self.distance_scale, d.distance_scale).clamp(0.0, 4.0),
            iterations: self.iterations.min(64),
            kernel_radius: self.kernel_radius.min(8),
            relax_mix: finite(self.relax_mix, d.relax_mix).clamp(0.0, 1.0),
            default_direction: if self.default_direction.is_finite()
                && self.default_direction.length_squared() > 1e-8
            {
                safe_normalize(self.default_direction)
            } else {
                d.default_direction
            },
            dead_zone: finite(self.dead_zone, d.dead_zone).clamp(0.0, 1.0),
            plateau_strength: finite(self.plateau_strength, d.plateau_strength).clamp(0.0, 1.0),
            plateau_start: finite(self.plateau_start, d.plateau_start).clamp(0.0, 1.0),
            plateau_feather: finite(self.plateau_feather, d.plateau_feather).clamp(0.001, 1.0),
        }
    }

    /// Canonical `key=value;` serialization, sorted by key.
    ///
    /// Floats are written as their bit patterns so the string is exact and
    /// does not depend on float formatting.
    pub fn canonical_string(&self) -> String {
        let mut fields: BTreeMap<&'static str, String> = BTreeMap::new();
        let bits = |v: f32| format!("{:08x}", v.to_bits());
        fields.insert("minSize", self.min_size.to_string());
        fields.insert("maxSize", self.max_size.to_string());
        fields.insert("threshold", bits(self.threshold));
        fields.insert("invert", self.invert.to_string());
        fields.insert("maxDistancePx", bits(self.max_distance_px));
        fields.insert("distanceGamma", bits(self.distance_gamma));
        fields.insert("distanceScale", bits(self.distance_scale));
        fields.insert("iterations", self.iterations.to_string());
        fields.insert("kernelRadius", self.kernel_radius.to_string());
        fields.insert("relaxMix", bits(self.relax_mix));
        fields.insert(
            "defaultDirection",
            format!(
                "{},{}",
                bits(self.default_direction.x),
                bits(self.default_direction.y)
            ),
        );
        fields.insert("deadZone", bits(self.dead_zone));
        fields.insert("plateauStrength", bits(self.plateau_strength));
        fields.insert("plateauStart", bits(self.plateau_start));
        fields.insert("plateauFeather", bits(self.plateau_feather));

        let mut out = String::new();
        for (k, v) in fields {
            out.push_str(k);
            out.push('=');
            out.push_str(&v);
            out.push(';');
        }
        out
    }

    /// Cache key for a given source texture identity.
    pub fn config_key(&self, source_id: &str) -> FlowFieldKey {
        let canonical = format!("source={source_id};{}", self.canonical_string());
        FlowFieldKey(xxhash_rust::xxh3::xxh3_64(canonical.as_bytes()))
    }

    /// Output grid for a source of `width x height`: longest side clamped
    /// into `[min_size, max_size]`, aspect preserved.
    pub fn output_size(&self, width: u32, height: u32) -> (u32, u32) {
        let longest = width.max(height).max(1);
        let target = longest.clamp(self.min_size.max(1), self.max_size.max(1));
        let scale = target as f64 / longest as f64;
        let w = ((width as f64 * scale).round() as u32).max(1);
        let h = ((height as f64 * scale).round() as u32).max(1);
        (w, h)
    }
}

/// Hash of the source identity plus every generator parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowFieldKey(pub u64);

/// Generated textures.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowField {
    pub width: u32,
    pub height: u32,
    /// RGBA8: tangent (×0.5+0.5), shaped distance, 1.
    pub rgba: Vec<u8>,
    /// Raw distance to the nearest obstacle in source pixels.
    pub distance_px: Vec<f32>,
    /// Source pixels per output texel.
    pub source_px_per_texel: f32,
    pub key: FlowFieldKey,
}

impl FlowField {
    /// Distance field as R16Float texels for upload.
    pub fn distance_f16(&self) -> Vec<f16> {
        self.distance_px.iter().map(|d| f16::from_f32(*d)).collect()
    }

    /// Unpacked tangent at texel `(x, y)`.
    pub fn tangent_at(&self, x: u32, y: u32) -> Vec2 {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        unpack_tangent([self.rgba[i], self.rgba[i + 1]])
    }

    /// Shaped distance (B channel) at texel `(x, y)` in `[0, 1]`.
    pub fn shaped_distance_at(&self, x: u32, y: u32) -> f32 {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.rgba[i + 2] as f32 / 255.0
    }
}

/// Packs a unit tangent as `(t·0.5+0.5)·255`.
pub fn pack_tangent(t: Vec2) -> [u8; 2] {
    let enc = |c: f32| ((c.clamp(-1.0, 1.0) * 0.5 + 0.5) * 255.0).round() as u8;
    [enc(t.x), enc(t.y)]
}

pub fn unpack_tangent(rg: [u8; 2]) -> Vec2 {
    Vec2::new(rg[0] as f32 / 255.0 * 2.0 - 1.0, rg[1] as f32 / 255.0 * 2.0 - 1.0)
}

/// `pow(n, gamma) · scale` of a normalized distance `n = d / max`,
/// clamped to `[0, 1]`.
pub fn shape_distance(normalized: f32, params: &FlowFieldParams) -> f32 {
    let n = normalized.clamp(0.0, 1.0);
    (n.powf(params.distance_gamma) * params.distance_scale).clamp(0.0, 1.0)
}

/// Tangent from an outward normal: `perp(normal)`, flipped toward
/// `default_dir` when alignment is outside the dead zone.
pub fn orient_tangent(normal: Vec2, default_dir: Vec2, dead_zone: f32) -> Vec2 {
    if normal.length_squared() < 1e-8 {
        return default_dir;
    }
    let t = perp(safe_normalize(normal));
    if t.dot(default_dir) < -dead_zone { -t } else { t }
}

/// Builds the flow field. Returns `None` for an empty source.
pub fn build_flow_field(
    source: &SourceMask,
    params: &FlowFieldParams,
    source_id: &str,
) -> Option<FlowField> {
    if source.is_empty() {
        return None;
    }
    let params = params.sanitized();
    let (w, h) = params.output_size(source.width, source.height);
    let (w, h) = (w as usize, h as usize);
    let px_per_texel = source.width as f32 / w as f32;

    // 1. classify
    let threshold = (params.threshold * 255.0).round() as i32;
    let obstacle: Vec<bool> = (0..w * h)
        .map(|i| {
            let v = source.sample_nearest(i % w, i / w, w, h) as i32;
            let high = v >= threshold;
            high != params.invert
        })
        .collect();

    // 2. distance, in source pixels
    let dist_texels = distance_field(&obstacle, w, h);
    let distance_px: Vec<f32> = dist_texels.iter().map(|d| d * px_per_texel).collect();

    // 3-4. gradient and oriented tangent
    let grads = gradient(&dist_texels, w, h);
    let field: Vec<FlowTexel> = grads
        .iter()
        .zip(distance_px.iter())
        .zip(obstacle.iter())
        .map(|((g, d), blocked)| {
            let normal = Vec2::new(g[0], g[1]);
            let tangent = if *blocked {
                params.default_direction
            } else {
                orient_tangent(normal, params.default_direction, params.dead_zone)
            };
            FlowTexel {
                tangent,
                distance: (d / params.max_distance_px).clamp(0.0, 1.0),
            }
        })
        .collect();

    // 5. relaxation
    let field = relax(
        field,
        w,
        h,
        params.iterations,
        params.kernel_radius,
        params.relax_mix,
    );

    // 6-7. plateau remap and pack
    let mut rgba = vec![0u8; w * h * 4];
    for (i, texel) in field.iter().enumerate() {
        let mut tangent = texel.tangent;
        if params.plateau_strength > 0.0 && texel.distance > params.plateau_start {
            let k = params.plateau_strength
                * smoothstep(
                    params.plateau_start,
                    params.plateau_start + params.plateau_feather,
                    texel.distance,
                );
            let blended = tangent.lerp(params.default_direction, k);
            tangent = if blended.length_squared() > 1e-8 {
                safe_normalize(blended)
            } else {
                params.default_direction
            };
        }
        let [r, g] = pack_tangent(tangent);
        // B carries the relaxed distance; `distance_px` stays sharp for
        // the roof distance texture.
        let b = (shape_distance(texel.distance, &params) * 255.0).round() as u8;
        rgba[i * 4..i * 4 + 4].copy_from_slice(&[r, g, b, 255]);
    }

    tracing::debug!(
        width = w,
        height = h,
        iterations = params.iterations,
        "flow field built"
    );

    Some(FlowField {
        width: w as u32,
        height: h as u32,
        rgba,
        distance_px,
        source_px_per_texel: px_per_texel,
        key: params.config_key(source_id),
    })
}

/// Single-entry cache keyed by source identity and generator parameters.
#[derive(Debug, Default)]
pub struct FlowFieldCache {
    current: Option<(FlowFieldKey, Option<Arc<FlowField>>)>,
    builds: u64,
}

impl FlowFieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached field when `(source_id, params)` is unchanged,
    /// otherwise rebuilds. A missing source yields `None` and is cached
    /// like any other result.
    pub fn get_or_build(
        &mut self,
        source_id: &str,
        source: Option<&SourceMask>,
        params: &FlowFieldParams,
    ) -> Option<Arc<FlowField>> {
        let params = params.sanitized();
        let key = params.config_key(source_id);
        if let Some((cached_key, field)) = &self.current
            && *cached_key == key
        {
            return field.clone();
        }
        let field = source
            .and_then(|s| build_flow_field(s, &params, source_id))
            .map(Arc::new);
        self.builds += 1;
        tracing::debug!(source = source_id, built = field.is_some(), "flow field cache rebuild");
        self.current = Some((key, field.clone()));
        field
    }

    pub fn invalidate(&mut self) {
        self.current = None;
    }

    /// Number of times the generator actually ran.
    pub fn builds(&self) -> u64 {
        self.builds
    }
}

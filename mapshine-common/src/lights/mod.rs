//! Dynamic point-light registry.
//!
//! Holds the host's ambient-light documents, converts them to pixel-space
//! records and marshals them into the parallel uniform arrays every tracked
//! material receives.

mod document;

use glam::{Vec2, Vec3};
use hashbrown::HashMap;
use serde_json::Value;

use crate::color::parse_color;
use crate::error::EffectError;
use crate::scene::SceneDimensions;

pub use document::{deep_merge, document_id, expand_dotted};

/// Hard cap on lights uploaded to the shaders.
pub const MAX_LIGHTS: usize = 64;

/// Color gain applied at the host's default luminosity.
pub const LUMINOSITY_GAIN: f32 = 2.0;

/// Host default luminosity; the gain scales linearly around it.
pub const DEFAULT_LUMINOSITY: f32 = 0.5;

pub const DEFAULT_ATTENUATION: f32 = 0.5;

/// One light in pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRecord {
    /// World position (y up).
    pub position: Vec2,
    /// Linear RGB, luminosity and output gain applied.
    pub color: Vec3,
    /// Outer radius in pixels.
    pub radius_px: f32,
    /// Inner (full-brightness) radius in pixels.
    pub bright_px: f32,
    pub attenuation: f32,
}

/// Result of adding a light document.
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added,
    /// Zero or negative radius.
    RejectedZeroRadius,
    Hidden,
    /// Registry already holds `max_lights` records.
    DroppedAtCapacity,
    /// Missing id or position.
    Invalid(EffectError),
}

/// Converts a host light document to a record.
///
/// `dim` and `bright` are grid-distance radii; the outer radius is the
/// larger one and the inner radius the smaller one. Non-finite colors fall
/// back to white and are reported alongside the record.
pub fn record_from_document(
    doc: &Value,
    scene: &SceneDimensions,
    output_gain: f32,
) -> Result<(LightRecord, Option<EffectError>), AddOutcome> {
    let x = number(doc, "x").ok_or(AddOutcome::Invalid(EffectError::InvalidUniform {
        name: "light.x",
    }))?;
    let y = number(doc, "y").ok_or(AddOutcome::Invalid(EffectError::InvalidUniform {
        name: "light.y",
    }))?;
    if doc.get("hidden").and_then(Value::as_bool) == Some(true) {
        return Err(AddOutcome::Hidden);
    }
    let config = doc.get("config").unwrap_or(&Value::Null);
    let dim = number(config, "dim").unwrap_or(0.0).max(0.0);
    let bright = number(config, "bright").unwrap_or(0.0).max(0.0);
    let ppu = scene.pixels_per_unit();
    let radius_px = dim.max(bright) * ppu;
    if radius_px <= 0.0 {
        return Err(AddOutcome::RejectedZeroRadius);
    }
    let bright_px = dim.min(bright) * ppu;

    let mut warning = None;
    let color = match config.get("color") {
        None | Some(Value::Null) => Vec3::ONE,
        Some(v) => parse_color(v).unwrap_or_else(|| {
            warning = Some(EffectError::InvalidUniform { name: "light.color" });
            Vec3::ONE
        }),
    };
    let luminosity = number(config, "luminosity")
        .unwrap_or(DEFAULT_LUMINOSITY)
        .clamp(0.0, 1.0);
    let gain = if output_gain.is_finite() {
        output_gain.max(0.0)
    } else {
        1.0
    };
    let color = color * LUMINOSITY_GAIN * (luminosity / DEFAULT_LUMINOSITY) * gain;

    let attenuation = number(config, "attenuation")
        .unwrap_or(DEFAULT_ATTENUATION)
        .clamp(0.0, 1.0);

    Ok((
        LightRecord {
            position: scene.host_to_world(Vec2::new(x, y)),
            color,
            radius_px,
            bright_px,
            attenuation,
        },
        warning,
    ))
}

fn number(v: &Value, key: &str) -> Option<f32> {
    v.get(key)
        .and_then(Value::as_f64)
        .map(|n| n as f32)
        .filter(|n| n.is_finite())
}

/// Parallel arrays in upload layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightUniformArrays {
    pub count: u32,
    /// `3N`: x, y, elevation.
    pub position: Vec<f32>,
    /// `3N`: linear RGB.
    pub color: Vec<f32>,
    /// `4N`: radius px, bright px, attenuation, unused.
    pub config: Vec<f32>,
}

/// Keyed light collection bounded by `max_lights`.
#[derive(Debug, Clone)]
pub struct LightRegistry {
    max_lights: usize,
    scene: SceneDimensions,
    /// Last full document per id, including rejected ones, so partial
    /// updates can complete them.
    docs: HashMap<String, Value>,
    records: HashMap<String, LightRecord>,
    /// Upload order.
    order: Vec<String>,
    output_gains: HashMap<String, f32>,
    generation: u64,
}

impl LightRegistry {
    pub fn new(max_lights: usize, scene: SceneDimensions) -> Self {
        Self {
            max_lights: max_lights.min(MAX_LIGHTS),
            scene,
            docs: HashMap::new(),
            records: HashMap::new(),
            order: Vec::new(),
            output_gains: HashMap::new(),
            generation: 0,
        }
    }

    pub fn max_lights(&self) -> usize {
        self.max_lights
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Bumped on every change that affects uploaded data.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, id: &str) -> Option<&LightRecord> {
        self.records.get(id)
    }

    /// Records in upload order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LightRecord)> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| (id.as_str(), r)))
    }

    pub fn add_light(&mut self, doc: &Value) -> AddOutcome {
        let Some(id) = document_id(doc).map(str::to_owned) else {
            return AddOutcome::Invalid(EffectError::InvalidUniform { name: "light.id" });
        };
        self.docs.insert(id.clone(), doc.clone());
        self.insert_record(id, doc)
    }

    pub fn remove_light(&mut self, id: &str) -> bool {
        self.docs.remove(id);
        self.remove_record(id)
    }

    /// Applies a partial update: expand dotted keys, deep-merge onto the
    /// stored document, then remove and re-add.
    pub fn update_light(&mut self, id: &str, changes: &Value) -> AddOutcome {
        let mut merged = self
            .docs
            .get(id)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({ "_id": id }));
        deep_merge(&mut merged, &expand_dotted(changes));
        self.remove_light(id);
        self.add_light(&merged)
    }

    /// Replaces scene dimensions and rebuilds every record.
    pub fn set_scene(&mut self, scene: SceneDimensions) {
        self.scene = scene;
        self.rebuild();
    }

    /// Per-light `outputGain` from the enhancement store.
    pub fn set_output_gains(&mut self, gains: impl IntoIterator<Item = (String, f32)>) {
        self.output_gains = gains.into_iter().collect();
        self.rebuild();
    }

    pub fn clear(&mut self) {
        self.docs.clear();
        self.records.clear();
        self.order.clear();
        self.generation += 1;
    }

    /// Marshals records into the `3N/3N/4N` arrays.
    pub fn uniform_arrays(&self) -> LightUniformArrays {
        let mut out = LightUniformArrays::default();
        for (_, r) in self.iter().take(self.max_lights) {
            out.position.extend_from_slice(&[r.position.x, r.position.y, 0.0]);
            out.color.extend_from_slice(&r.color.to_array());
            out.config
                .extend_from_slice(&[r.radius_px, r.bright_px, r.attenuation, 0.0]);
            out.count += 1;
        }
        out
    }

    fn insert_record(&mut self, id: String, doc: &Value) -> AddOutcome {
        if !self.records.contains_key(&id) && self.records.len() >= self.max_lights {
            tracing::debug!(light = %id, max = self.max_lights, "light dropped at capacity");
            return AddOutcome::DroppedAtCapacity;
        }
        let gain = self.output_gains.get(&id).copied().unwrap_or(1.0);
        match record_from_document(doc, &self.scene, gain) {
            Ok((record, warning)) => {
                if let Some(err) = warning {
                    tracing::warn!(light = %id, "{err}");
                }
                if self.records.insert(id.clone(), record).is_none() {
                    self.order.push(id);
                }
                self.generation += 1;
                AddOutcome::Added
            }
            Err(outcome) => {
                tracing::debug!(light = %id, ?outcome, "light not registered");
                outcome
            }
        }
    }

    fn remove_record(&mut self, id: &str) -> bool {
        if self.records.remove(id).is_some() {
            self.order.retain(|o| o != id);
            self.generation += 1;
            true
        } else {
            false
        }
    }

    fn rebuild(&mut self) {
        let docs: Vec<(String, Value)> = {
            let mut ordered: Vec<(String, Value)> = self
                .order
                .iter()
                .filter_map(|id| self.docs.get(id).map(|d| (id.clone(), d.clone())))
                .collect();
            // Previously rejected documents may become valid (e.g. new grid).
            let mut rest: Vec<(String, Value)> = self
                .docs
                .iter()
                .filter(|(id, _)| !self.records.contains_key(*id))
                .map(|(id, d)| (id.clone(), d.clone()))
                .collect();
            rest.sort_by(|a, b| a.0.cmp(&b.0));
            ordered.extend(rest);
            ordered
        };
        self.records.clear();
        self.order.clear();
        for (id, doc) in docs {
            self.insert_record(id, &doc);
        }
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scene() -> SceneDimensions {
        // 100px grid, 5 units per cell: 20 px per unit.
        SceneDimensions::from_scene_size(2000.0, 2000.0, 0.0)
    }

    fn light(id: &str, x: f32, y: f32, dim: f32, bright: f32) -> Value {
        json!({
            "_id": id, "x": x, "y": y,
            "config": {"dim": dim, "bright": bright, "color": [1.0, 0.5, 0.2], "attenuation": 0.5}
        })
    }

    #[test]
    fn test_record_conversion() {
        let mut reg = LightRegistry::new(8, scene());
        assert_eq!(reg.add_light(&light("a", 500.0, 500.0, 10.0, 5.0)), AddOutcome::Added);
        let r = reg.get("a").unwrap();
        assert_eq!(r.radius_px, 200.0);
        assert_eq!(r.bright_px, 100.0);
        assert_eq!(r.position, Vec2::new(500.0, 1500.0));
        // Default luminosity doubles the color.
        assert_eq!(r.color, Vec3::new(2.0, 1.0, 0.4));
    }

    #[test]
    fn test_zero_radius_rejected() {
        let mut reg = LightRegistry::new(8, scene());
        assert_eq!(
            reg.add_light(&light("z", 0.0, 0.0, 0.0, 0.0)),
            AddOutcome::RejectedZeroRadius
        );
        assert!(reg.is_empty());
        // A later update can still complete it.
        assert_eq!(reg.update_light("z", &json!({"config.dim": 4})), AddOutcome::Added);
        assert_eq!(reg.get("z").unwrap().radius_px, 80.0);
    }

    #[test]
    fn test_capacity_drops_silently() {
        let mut reg = LightRegistry::new(2, scene());
        reg.add_light(&light("a", 0.0, 0.0, 1.0, 0.0));
        reg.add_light(&light("b", 0.0, 0.0, 1.0, 0.0));
        assert_eq!(
            reg.add_light(&light("c", 0.0, 0.0, 1.0, 0.0)),
            AddOutcome::DroppedAtCapacity
        );
        assert_eq!(reg.len(), 2);
        // Re-adding an existing id is an update, not a new slot.
        assert_eq!(reg.add_light(&light("a", 9.0, 0.0, 1.0, 0.0)), AddOutcome::Added);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_uniform_arrays_match_records() {
        let mut reg = LightRegistry::new(8, scene());
        reg.add_light(&light("a", 500.0, 500.0, 10.0, 5.0));
        reg.add_light(&light("b", 100.0, 200.0, 2.0, 1.0));
        let arrays = reg.uniform_arrays();
        assert_eq!(arrays.count, 2);
        assert_eq!(arrays.position.len(), 6);
        assert_eq!(arrays.color.len(), 6);
        assert_eq!(arrays.config.len(), 8);
        assert_eq!(&arrays.position[0..3], &[500.0, 1500.0, 0.0]);
        assert_eq!(&arrays.color[0..3], &[2.0, 1.0, 0.4]);
        assert_eq!(&arrays.config[0..4], &[200.0, 100.0, 0.5, 0.0]);
        assert_eq!(&arrays.position[3..6], &[100.0, 1800.0, 0.0]);
    }

    #[test]
    fn test_partial_update_merges() {
        let mut reg = LightRegistry::new(8, scene());
        reg.add_light(&light("a", 500.0, 500.0, 10.0, 5.0));
        let gen_before = reg.generation();
        reg.update_light("a", &json!({"config.color": "#ffffff", "x": 600.0}));
        let r = reg.get("a").unwrap();
        assert_eq!(r.position.x, 600.0);
        assert_eq!(r.radius_px, 200.0);
        assert_eq!(r.color, Vec3::splat(2.0));
        assert!(reg.generation() > gen_before);
    }

    #[test]
    fn test_invalid_color_falls_back_to_white() {
        let doc = json!({"_id": "c", "x": 0.0, "y": 0.0, "config": {"dim": 1.0, "color": "nope"}});
        let (record, warning) = record_from_document(&doc, &scene(), 1.0).unwrap();
        assert_eq!(record.color, Vec3::splat(LUMINOSITY_GAIN));
        assert!(warning.is_some());
    }

    #[test]
    fn test_output_gain_and_luminosity() {
        let mut reg = LightRegistry::new(8, scene());
        let mut doc = light("a", 0.0, 0.0, 1.0, 0.0);
        doc["config"]["luminosity"] = json!(0.25);
        reg.add_light(&doc);
        assert_eq!(reg.get("a").unwrap().color, Vec3::new(1.0, 0.5, 0.2));
        reg.set_output_gains([("a".to_owned(), 3.0)]);
        let c = reg.get("a").unwrap().color;
        assert!((c - Vec3::new(3.0, 1.5, 0.6)).length() < 1e-5);
    }

    #[test]
    fn test_remove_and_hidden() {
        let mut reg = LightRegistry::new(8, scene());
        reg.add_light(&light("a", 0.0, 0.0, 1.0, 0.0));
        assert!(reg.remove_light("a"));
        assert!(!reg.remove_light("a"));
        let mut hidden = light("h", 0.0, 0.0, 1.0, 0.0);
        hidden["hidden"] = json!(true);
        assert_eq!(reg.add_light(&hidden), AddOutcome::Hidden);
        assert_eq!(reg.uniform_arrays().count, 0);
    }
}

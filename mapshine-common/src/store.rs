//! Read-only view of the persisted per-scene enhancement data.
//!
//! The host owns the document (`{ version: 1, lights: [...] }`); the engine
//! only reads it, currently for per-light `outputGain`.

use std::path::Path;

use glam::Vec3;
use hashbrown::HashMap;
use serde::Deserialize;
use serde_json::Value;

use crate::color::parse_color;
use crate::error::{EffectError, EffectResult};

/// Only document version understood.
pub const STORE_VERSION: u32 = 1;

/// Per-light enhancement config. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LightEnhancement {
    pub cookie_texture: Option<String>,
    pub cookie_strength: Option<f32>,
    pub cookie_contrast: Option<f32>,
    pub cookie_gamma: Option<f32>,
    pub cookie_tint: Option<Value>,
    pub output_gain: Option<f32>,
    pub outer_weight: Option<f32>,
    pub inner_weight: Option<f32>,
}

impl LightEnhancement {
    pub fn cookie_tint(&self) -> Option<Vec3> {
        self.cookie_tint.as_ref().and_then(parse_color)
    }
}

#[derive(Deserialize)]
struct StoredLight {
    id: String,
    #[serde(default)]
    config: LightEnhancement,
}

#[derive(Deserialize)]
struct StoreDocument {
    version: u32,
    #[serde(default)]
    lights: Vec<StoredLight>,
}

/// Parsed enhancement store.
#[derive(Debug, Clone, Default)]
pub struct EnhancementStore {
    lights: HashMap<String, LightEnhancement>,
}

impl EnhancementStore {
    pub fn from_value(value: Value) -> EffectResult<Self> {
        let doc: StoreDocument =
            serde_json::from_value(value).map_err(|e| EffectError::InvalidDocument {
                what: "enhancement store",
                reason: e.to_string(),
            })?;
        if doc.version != STORE_VERSION {
            return Err(EffectError::InvalidDocument {
                what: "enhancement store",
                reason: format!("unsupported version {}", doc.version),
            });
        }
        let lights = doc
            .lights
            .into_iter()
            .map(|l| (l.id, l.config))
            .collect::<HashMap<_, _>>();
        tracing::debug!(lights = lights.len(), "enhancement store parsed");
        Ok(Self { lights })
    }

    pub fn from_json(text: &str) -> EffectResult<Self> {
        let value = serde_json::from_str(text).map_err(|e| EffectError::InvalidDocument {
            what: "enhancement store",
            reason: e.to_string(),
        })?;
        Self::from_value(value)
    }

    pub fn load(path: &Path) -> EffectResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| EffectError::InvalidDocument {
            what: "enhancement store",
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_json(&text)
    }

    pub fn get(&self, light_id: &str) -> Option<&LightEnhancement> {
        self.lights.get(light_id)
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// `(id, gain)` for every light with a finite, non-negative gain.
    pub fn output_gains(&self) -> Vec<(String, f32)> {
        let mut gains: Vec<_> = self
            .lights
            .iter()
            .filter_map(|(id, cfg)| {
                cfg.output_gain
                    .filter(|g| g.is_finite() && *g >= 0.0)
                    .map(|g| (id.clone(), g))
            })
            .collect();
        gains.sort_by(|a, b| a.0.cmp(&b.0));
        gains
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DOC: &str = r#"{
        "version": 1,
        "lights": [
            { "id": "a", "config": { "outputGain": 1.5, "cookieTexture": "c.png", "cookieTint": [1, 0.5, 0] } },
            { "id": "b", "config": { "cookieStrength": 0.4 } },
            { "id": "c" }
        ]
    }"#;

    #[test]
    fn test_parse_store() {
        let store = EnhancementStore::from_json(DOC).expect("parse");
        assert_eq!(store.len(), 3);
        let a = store.get("a").expect("a");
        assert_eq!(a.output_gain, Some(1.5));
        assert_eq!(a.cookie_texture.as_deref(), Some("c.png"));
        assert_eq!(a.cookie_tint(), Some(Vec3::new(1.0, 0.5, 0.0)));
        assert_eq!(store.get("b").and_then(|b| b.cookie_strength), Some(0.4));
        assert_eq!(store.get("c"), Some(&LightEnhancement::default()));
        assert_eq!(store.output_gains(), vec![("a".to_owned(), 1.5)]);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = EnhancementStore::from_json(r#"{"version": 2, "lights": []}"#);
        assert!(matches!(err, Err(EffectError::InvalidDocument { .. })));
        assert!(EnhancementStore::from_json("not json").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(DOC.as_bytes()).expect("write");
        let store = EnhancementStore::load(file.path()).expect("load");
        assert_eq!(store.len(), 3);

        let missing = EnhancementStore::load(Path::new("/nonexistent/mapshine-store.json"));
        assert!(missing.is_err());
    }
}

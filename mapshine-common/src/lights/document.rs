//! Partial-update handling for host light documents.

use serde_json::{Map, Value};

/// Expands `{"config.dim": 30}` into `{"config": {"dim": 30}}`.
///
/// Nested objects are expanded recursively; later keys win on conflict.
pub fn expand_dotted(changes: &Value) -> Value {
    let Value::Object(map) = changes else {
        return changes.clone();
    };
    let mut out = Value::Object(Map::new());
    for (key, value) in map {
        let parts: Vec<&str> = key.split('.').filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            continue;
        }
        let mut nested = expand_dotted(value);
        for part in parts.iter().rev() {
            let mut obj = Map::new();
            obj.insert((*part).to_owned(), nested);
            nested = Value::Object(obj);
        }
        deep_merge(&mut out, &nested);
    }
    out
}

/// Recursively merges `patch` into `target`. Objects merge key by key;
/// everything else (arrays included) replaces.
pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(t), Value::Object(p)) => {
            for (key, value) in p {
                match t.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        t.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Document id (`_id` or `id`).
pub fn document_id(doc: &Value) -> Option<&str> {
    doc.get("_id")
        .or_else(|| doc.get("id"))
        .and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expand_dotted_keys() {
        let expanded = expand_dotted(&json!({
            "x": 10,
            "config.dim": 30,
            "config.color": "#ff0000",
            "flags.mapshine.gain": 2.0
        }));
        assert_eq!(
            expanded,
            json!({
                "x": 10,
                "config": {"dim": 30, "color": "#ff0000"},
                "flags": {"mapshine": {"gain": 2.0}}
            })
        );
    }

    #[test]
    fn test_dotted_and_nested_combine() {
        let expanded = expand_dotted(&json!({
            "config": {"bright": 5},
            "config.dim": 10
        }));
        assert_eq!(expanded, json!({"config": {"bright": 5, "dim": 10}}));
    }

    #[test]
    fn test_deep_merge_keeps_untouched_fields() {
        let mut doc = json!({
            "_id": "a",
            "x": 1, "y": 2,
            "config": {"dim": 20, "bright": 10, "color": "#ffffff"}
        });
        deep_merge(&mut doc, &expand_dotted(&json!({"config.dim": 40, "y": 5})));
        assert_eq!(doc["config"]["dim"], 40);
        assert_eq!(doc["config"]["bright"], 10);
        assert_eq!(doc["config"]["color"], "#ffffff");
        assert_eq!(doc["y"], 5);
        assert_eq!(document_id(&doc), Some("a"));
    }

    #[test]
    fn test_arrays_replace() {
        let mut doc = json!({"config": {"color": [1.0, 0.0, 0.0]}});
        deep_merge(&mut doc, &json!({"config": {"color": [0.0, 1.0]}}));
        assert_eq!(doc["config"]["color"], json!([0.0, 1.0]));
    }
}

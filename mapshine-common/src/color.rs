//! Host color parsing.
//!
//! Host documents carry colors in several shapes. Hex strings and packed
//! integers are sRGB and are converted to linear; object and array shapes
//! are taken as linear already.

use glam::Vec3;
use serde_json::Value;

use crate::math::srgb_to_linear;

/// Parses any supported color shape into linear RGB.
///
/// Accepted:
/// - `{ "r": .., "g": .., "b": .. }` (linear, 0-1)
/// - `{ "rgb": [r, g, b] }` (linear, 0-1)
/// - `[r, g, b]` (linear, 0-1)
/// - `"#rrggbb"`, `"rrggbb"`, `"0xrrggbb"` (sRGB)
/// - `0xRRGGBB` as a JSON integer (sRGB)
pub fn parse_color(value: &Value) -> Option<Vec3> {
    match value {
        Value::Object(map) => {
            if let Some(rgb) = map.get("rgb") {
                return parse_array(rgb);
            }
            let r = map.get("r")?.as_f64()?;
            let g = map.get("g")?.as_f64()?;
            let b = map.get("b")?.as_f64()?;
            finite(Vec3::new(r as f32, g as f32, b as f32))
        }
        Value::Array(_) => parse_array(value),
        Value::String(s) => parse_hex(s),
        Value::Number(n) => {
            let packed = n.as_u64()?;
            if packed > 0xFF_FFFF {
                return None;
            }
            Some(unpack_srgb(packed as u32))
        }
        _ => None,
    }
}

/// Parses a color, substituting white for anything unusable.
pub fn parse_color_or_white(value: Option<&Value>) -> Vec3 {
    value.and_then(parse_color).unwrap_or(Vec3::ONE)
}

fn parse_array(value: &Value) -> Option<Vec3> {
    let arr = value.as_array()?;
    if arr.len() < 3 {
        return None;
    }
    let r = arr[0].as_f64()?;
    let g = arr[1].as_f64()?;
    let b = arr[2].as_f64()?;
    finite(Vec3::new(r as f32, g as f32, b as f32))
}

fn parse_hex(s: &str) -> Option<Vec3> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix('#')
        .or_else(|| trimmed.strip_prefix("0x"))
        .unwrap_or(trimmed);
    if digits.len() != 6 {
        return None;
    }
    let packed = u32::from_str_radix(digits, 16).ok()?;
    Some(unpack_srgb(packed))
}

fn unpack_srgb(packed: u32) -> Vec3 {
    let r = ((packed >> 16) & 0xFF) as f32 / 255.0;
    let g = ((packed >> 8) & 0xFF) as f32 / 255.0;
    let b = (packed & 0xFF) as f32 / 255.0;
    Vec3::new(srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b))
}

fn finite(v: Vec3) -> Option<Vec3> {
    v.is_finite().then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_shapes() {
        assert_eq!(
            parse_color(&json!({"r": 1.0, "g": 0.5, "b": 0.2})),
            Some(Vec3::new(1.0, 0.5, 0.2))
        );
        assert_eq!(
            parse_color(&json!({"rgb": [0.1, 0.2, 0.3]})),
            Some(Vec3::new(0.1, 0.2, 0.3))
        );
        assert_eq!(parse_color(&json!([0.0, 1.0, 0.0])), Some(Vec3::Y));
    }

    #[test]
    fn test_hex_and_integer_agree() {
        let a = parse_color(&json!("#ff8000")).unwrap();
        let b = parse_color(&json!("0xff8000")).unwrap();
        let c = parse_color(&json!(0xff8000)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.x, 1.0);
        assert_eq!(a.z, 0.0);
        // 0x80 in sRGB is ~0.216 linear.
        assert!((a.y - 0.2158).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_color(&json!("#abc")), None);
        assert_eq!(parse_color(&json!(null)), None);
        assert_eq!(parse_color(&json!({"r": 1.0})), None);
        assert_eq!(parse_color(&json!(0x1_000_000u64)), None);
        assert_eq!(parse_color_or_white(None), Vec3::ONE);
    }
}

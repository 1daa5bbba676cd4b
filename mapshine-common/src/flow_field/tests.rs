//! Tests for the flow field builder

use super::*;

/// Outdoors-style mask: white outdoors, black disc (roof) in the middle.
fn disc_mask(size: u32, radius: f32) -> SourceMask {
    let c = size as f32 * 0.5;
    let texels = (0..size * size)
        .map(|i| {
            let x = (i % size) as f32 + 0.5;
            let y = (i / size) as f32 + 0.5;
            let inside = (x - c).powi(2) + (y - c).powi(2) <= radius * radius;
            if inside { 0 } else { 255 }
        })
        .collect();
    SourceMask::new(size, size, texels).unwrap()
}

fn disc_params() -> FlowFieldParams {
    FlowFieldParams {
        min_size: 256,
        max_size: 512,
        iterations: 4,
        kernel_radius: 1,
        ..Default::default()
    }
}

fn angle_to_radial(field: &FlowField, x: u32, y: u32, center: f32) -> f32 {
    let radial = Vec2::new(x as f32 + 0.5 - center, y as f32 + 0.5 - center).normalize();
    let t = field.tangent_at(x, y).normalize();
    t.dot(radial).abs().clamp(0.0, 1.0).acos().to_degrees()
}

#[test]
fn test_disc_tangent_is_perpendicular_to_radius() {
    let mask = disc_mask(512, 100.0);
    let field = build_flow_field(&mask, &disc_params(), "disc").unwrap();
    assert_eq!((field.width, field.height), (512, 512));

    // 50px outside the boundary, east and south-east.
    let east = angle_to_radial(&field, 406, 255, 256.0);
    assert!((east - 90.0).abs() < 5.0, "east angle {east}");

    let off = (150.0f32 / std::f32::consts::SQRT_2) as u32;
    let south_east = angle_to_radial(&field, 256 + off, 256 + off, 256.0);
    assert!((south_east - 90.0).abs() < 5.0, "south-east angle {south_east}");
}

#[test]
fn test_full_size_disc_is_downsampled_and_still_perpendicular() {
    let mask = disc_mask(2048, 100.0);
    let params = FlowFieldParams {
        iterations: 4,
        kernel_radius: 1,
        ..Default::default()
    };
    let field = build_flow_field(&mask, &params, "disc-2048").unwrap();
    assert_eq!((field.width, field.height), (1024, 1024));
    assert_eq!(field.source_px_per_texel, 2.0);

    // 50 source px outside the boundary is 25 texels at half resolution.
    let east = angle_to_radial(&field, 587, 511, 512.0);
    assert!((east - 90.0).abs() < 5.0, "east angle {east}");
    let d = field.distance_px[511 * 1024 + 587];
    assert!((d - 50.0).abs() < 4.0, "distance {d}");
}

#[test]
fn test_tangent_biased_toward_default_direction() {
    let mask = disc_mask(512, 100.0);
    let field = build_flow_field(&mask, &disc_params(), "disc").unwrap();
    // East of the disc the boundary runs vertically; default is +y.
    assert!(field.tangent_at(406, 255).y > 0.9);
    // West of the disc too.
    assert!(field.tangent_at(105, 255).y > 0.9);
}

#[test]
fn test_unit_tangent_where_distance_positive() {
    let mask = disc_mask(128, 20.0);
    let params = FlowFieldParams {
        min_size: 128,
        max_size: 128,
        max_distance_px: 64.0,
        ..Default::default()
    };
    let field = build_flow_field(&mask, &params, "small").unwrap();
    for y in 0..field.height {
        for x in 0..field.width {
            if field.shaped_distance_at(x, y) > 0.0 {
                let len = field.tangent_at(x, y).length();
                assert!((len - 1.0).abs() < 0.02, "len {len} at {x},{y}");
            }
        }
    }
    // Roof interior has zero distance.
    assert_eq!(field.shaped_distance_at(64, 64), 0.0);
    assert_eq!(field.distance_px[64 * 128 + 64], 0.0);
}

#[test]
fn test_packed_distance_is_relaxed() {
    let mask = disc_mask(128, 20.0);
    let params = FlowFieldParams {
        min_size: 128,
        max_size: 128,
        max_distance_px: 8.0,
        ..Default::default()
    };
    let sharp = build_flow_field(
        &mask,
        &FlowFieldParams {
            iterations: 0,
            ..params
        },
        "edge",
    )
    .unwrap();
    let relaxed = build_flow_field(&mask, &params, "edge").unwrap();

    // (83, 64) is the last roof texel before the east edge.
    let i = 64 * 128 + 83;
    assert_eq!(sharp.distance_px[i], 0.0);
    assert_eq!(relaxed.distance_px[i], 0.0);
    assert_eq!(sharp.shaped_distance_at(83, 64), 0.0);
    assert!(relaxed.shaped_distance_at(83, 64) > 0.0);
}

#[test]
fn test_build_is_deterministic() {
    let mask = disc_mask(128, 30.0);
    let params = FlowFieldParams {
        min_size: 64,
        max_size: 128,
        ..Default::default()
    };
    let a = build_flow_field(&mask, &params, "m").unwrap();
    let b = build_flow_field(&mask, &params, "m").unwrap();
    assert_eq!(a.rgba, b.rgba);
    assert_eq!(a.key, b.key);
}

#[test]
fn test_downsampled_distance_in_source_pixels() {
    let mask = disc_mask(256, 40.0);
    let params = FlowFieldParams {
        min_size: 64,
        max_size: 128,
        iterations: 0,
        ..Default::default()
    };
    let field = build_flow_field(&mask, &params, "m").unwrap();
    assert_eq!((field.width, field.height), (128, 128));
    assert_eq!(field.source_px_per_texel, 2.0);
    // Output texel (100, 64) is source pixel ~200, 72px right of the center,
    // about 32px outside the disc.
    let d = field.distance_px[64 * 128 + 100];
    assert!((d - 32.0).abs() < 4.0, "distance {d}");
}

#[test]
fn test_plateau_pulls_far_field_to_default() {
    let mask = disc_mask(256, 20.0);
    let params = FlowFieldParams {
        min_size: 256,
        max_size: 256,
        max_distance_px: 50.0,
        plateau_strength: 1.0,
        plateau_start: 0.2,
        plateau_feather: 0.2,
        ..Default::default()
    };
    let field = build_flow_field(&mask, &params, "plateau").unwrap();
    // 80px right of the disc edge: normalized distance 1.
    let t = field.tangent_at(228, 100);
    assert!((t - Vec2::new(0.0, 1.0)).length() < 0.02, "{t:?}");
}

#[test]
fn test_empty_source_yields_none() {
    let empty = SourceMask::new(0, 0, Vec::new()).unwrap();
    assert!(build_flow_field(&empty, &FlowFieldParams::default(), "x").is_none());

    let mut cache = FlowFieldCache::new();
    assert!(
        cache
            .get_or_build("missing", None, &FlowFieldParams::default())
            .is_none()
    );
}

#[test]
fn test_pack_unpack_within_one_step() {
    for i in 0..360 {
        let a = (i as f32).to_radians();
        let t = Vec2::new(a.cos(), a.sin());
        let back = unpack_tangent(pack_tangent(t));
        assert!((back - t).abs().max_element() <= 1.0 / 255.0 + 1e-6);
    }
}

#[test]
fn test_config_key_order_independent() {
    let a: FlowFieldParams =
        serde_json::from_str(r#"{"iterations": 6, "relaxMix": 0.25, "invert": false}"#).unwrap();
    let b: FlowFieldParams =
        serde_json::from_str(r#"{"invert": false, "iterations": 6, "relaxMix": 0.25}"#).unwrap();
    assert_eq!(a.config_key("uuid-1"), b.config_key("uuid-1"));
    assert_eq!(a.canonical_string(), b.canonical_string());
    assert_ne!(a.config_key("uuid-1"), a.config_key("uuid-2"));
}

#[test]
fn test_canonical_string_is_sorted_and_exact() {
    let s = FlowFieldParams::default().canonical_string();
    let keys: Vec<&str> = s
        .split(';')
        .filter(|p| !p.is_empty())
        .map(|p| p.split('=').next().unwrap())
        .collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(keys, sorted);
    assert_eq!(keys.len(), 15);
    // 0.5f32 is 0x3f000000.
    assert!(s.contains("threshold=3f000000;"));
}

#[test]
fn test_every_parameter_changes_key() {
    let base = FlowFieldParams::default();
    let variants = [
        FlowFieldParams { min_size: 128, ..base },
        FlowFieldParams { max_size: 2048, ..base },
        FlowFieldParams { threshold: 0.4, ..base },
        FlowFieldParams { invert: false, ..base },
        FlowFieldParams { max_distance_px: 100.0, ..base },
        FlowFieldParams { distance_gamma: 2.0, ..base },
        FlowFieldParams { distance_scale: 0.5, ..base },
        FlowFieldParams { iterations: 8, ..base },
        FlowFieldParams { kernel_radius: 2, ..base },
        FlowFieldParams { relax_mix: 0.9, ..base },
        FlowFieldParams { default_direction: Vec2::new(1.0, 0.0), ..base },
        FlowFieldParams { dead_zone: 0.2, ..base },
        FlowFieldParams { plateau_strength: 0.5, ..base },
        FlowFieldParams { plateau_start: 0.3, ..base },
        FlowFieldParams { plateau_feather: 0.4, ..base },
    ];
    let base_key = base.config_key("s");
    let mut seen = hashbrown::HashSet::new();
    for v in variants {
        let key = v.config_key("s");
        assert_ne!(key, base_key, "{v:?}");
        assert!(seen.insert(key));
    }
}

#[test]
fn test_cache_reuses_until_key_changes() {
    let mask = disc_mask(64, 10.0);
    let params = FlowFieldParams {
        min_size: 32,
        max_size: 64,
        ..Default::default()
    };
    let mut cache = FlowFieldCache::new();
    let a = cache.get_or_build("m", Some(&mask), &params).unwrap();
    let b = cache.get_or_build("m", Some(&mask), &params).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cache.builds(), 1);

    let changed = FlowFieldParams {
        relax_mix: 0.8,
        ..params
    };
    cache.get_or_build("m", Some(&mask), &changed);
    assert_eq!(cache.builds(), 2);
    cache.get_or_build("other", Some(&mask), &changed);
    assert_eq!(cache.builds(), 3);
}

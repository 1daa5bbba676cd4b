//! End-to-end frames on a real adapter. Skipped when the machine has none.

use glam::{UVec2, Vec2};
use mapshine::{EngineConfig, GpuContext, MapshineEngine};
use mapshine_common::math::{linear_to_srgb, srgb_to_linear};
use mapshine_common::uniforms::FrameTime;
use mapshine_common::{
    ColorSpace, EnvironmentSnapshot, MaskId, SceneDimensions, SpecularParams, TileBinding,
};
use serde_json::json;

const SIZE: u32 = 32;

fn engine() -> Option<MapshineEngine> {
    let gpu = match GpuContext::headless() {
        Ok(gpu) => gpu,
        Err(e) => {
            eprintln!("no GPU adapter, skipping: {e:#}");
            return None;
        }
    };
    let scene = SceneDimensions::from_scene_size(SIZE as f32, SIZE as f32, 0.0);
    let engine = MapshineEngine::new(gpu, EngineConfig::default(), scene, UVec2::splat(SIZE))
        .expect("engine builds");
    Some(engine)
}

fn solid(rgba: [u8; 4]) -> Vec<u8> {
    rgba.repeat((SIZE * SIZE) as usize)
}

fn run_frames(engine: &mut MapshineEngine, frames: u64) {
    for frame in 0..frames {
        engine.frame(FrameTime {
            elapsed: frame as f32 / 60.0,
            delta: 1.0 / 60.0,
            frame,
        });
    }
}

/// Builds an engine, lets `setup` configure it, renders three frames and
/// reads the output back.
fn render_with(setup: impl FnOnce(&mut MapshineEngine)) -> Option<Vec<u8>> {
    let mut engine = engine()?;
    setup(&mut engine);
    run_frames(&mut engine, 3);
    Some(engine.read_output().unwrap())
}

fn assert_pixels_close(actual: &[u8], expected: &[u8], tolerance: u8) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            a.abs_diff(*e) <= tolerance,
            "byte {i} (pixel {}): {a} vs {e}",
            i / 4
        );
    }
}

/// sRGB byte of `albedo` lit by the ambient of `env` alone.
fn ambient_lit(albedo: u8, env: &EnvironmentSnapshot, channel: usize) -> u8 {
    let linear = srgb_to_linear(albedo as f32 / 255.0);
    let lit = linear * env.ambient_tint()[channel] * env.light_level();
    (linear_to_srgb(lit.clamp(0.0, 1.0)) * 255.0).round() as u8
}

#[test]
fn test_pass_order() {
    let Some(engine) = engine() else {
        return;
    };
    assert_eq!(
        engine.composer().pass_names(),
        vec!["cloudShadow", "specular", "windowLight", "fog"]
    );
}

#[test]
fn test_frame_reads_back_full_image() {
    let Some(mut engine) = engine() else {
        return;
    };
    engine
        .load_mask(MaskId::ALBEDO, SIZE, SIZE, &solid([128, 128, 128, 255]), ColorSpace::Srgb)
        .unwrap();
    run_frames(&mut engine, 3);

    let pixels = engine.read_output().unwrap();
    assert_eq!(pixels.len(), (SIZE * SIZE * 4) as usize);
    // Midday, no weather: the albedo shows through.
    assert!(pixels.chunks(4).all(|p| p[0] > 0 && p[3] == 255));
}

#[test]
fn test_cloud_pass_publishes_screen_masks() {
    let Some(mut engine) = engine() else {
        return;
    };
    run_frames(&mut engine, 1);
    assert!(engine.masks().is_present(&MaskId::CLOUD_SHADOW_SCREEN));
    assert!(engine.masks().is_present(&MaskId::CLOUD_SHADOW_RAW_SCREEN));

    assert!(engine.set_pass_enabled("cloudShadow", false));
    run_frames(&mut engine, 1);
    assert!(!engine.masks().is_present(&MaskId::CLOUD_SHADOW_SCREEN));
}

#[test]
fn test_window_light_needs_windows_mask() {
    let Some(mut engine) = engine() else {
        return;
    };
    run_frames(&mut engine, 1);
    assert!(!engine.masks().is_present(&MaskId::WINDOW_LIGHT_SCREEN));

    engine
        .load_mask(MaskId::WINDOWS, SIZE, SIZE, &solid([255, 220, 160, 255]), ColorSpace::Srgb)
        .unwrap();
    run_frames(&mut engine, 1);
    assert!(engine.masks().is_present(&MaskId::WINDOW_LIGHT_SCREEN));

    engine.unload_mask(&MaskId::WINDOWS);
    run_frames(&mut engine, 1);
    assert!(!engine.masks().is_present(&MaskId::WINDOW_LIGHT_SCREEN));
}

#[test]
fn test_outdoors_mask_derives_flow_and_distance() {
    let Some(mut engine) = engine() else {
        return;
    };
    // Left half indoors, right half outdoors.
    let mut outdoors = Vec::new();
    for _y in 0..SIZE {
        for x in 0..SIZE {
            let v = if x < SIZE / 2 { 0 } else { 255 };
            outdoors.extend_from_slice(&[v, v, v, 255]);
        }
    }
    engine
        .load_mask(MaskId::OUTDOORS, SIZE, SIZE, &outdoors, ColorSpace::Linear)
        .unwrap();
    run_frames(&mut engine, 1);
    assert!(engine.masks().is_present(&MaskId::RAIN_FLOW_MAP));
    assert!(engine.masks().is_present(&MaskId::ROOF_DISTANCE));

    engine.unload_mask(&MaskId::OUTDOORS);
    run_frames(&mut engine, 1);
    assert!(!engine.masks().is_present(&MaskId::RAIN_FLOW_MAP));
}

#[test]
fn test_weather_frame_and_resize() {
    let Some(mut engine) = engine() else {
        return;
    };
    engine
        .load_mask(MaskId::ALBEDO, SIZE, SIZE, &solid([90, 120, 60, 255]), ColorSpace::Srgb)
        .unwrap();
    engine.set_environment(EnvironmentSnapshot {
        darkness_level: 0.7,
        cloud_cover: 0.8,
        fog_density: 0.5,
        precipitation: 0.6,
        wetness: 0.6,
        wind_direction: Vec2::new(1.0, 0.0),
        wind_speed: 0.5,
        ..Default::default()
    });
    engine.on_create_ambient_light(&json!({
        "_id": "torch",
        "x": 16.0,
        "y": 16.0,
        "config": { "bright": 4.0, "dim": 8.0, "color": "#ff8800" }
    }));
    run_frames(&mut engine, 2);

    engine.resize(UVec2::new(SIZE * 2, SIZE));
    run_frames(&mut engine, 1);
    let pixels = engine.read_output().unwrap();
    assert_eq!(pixels.len(), (SIZE * 2 * SIZE * 4) as usize);
}

#[test]
fn test_tile_overlay_lifecycle() {
    let Some(mut engine) = engine() else {
        return;
    };
    let textures = engine
        .upload_tile_textures(
            "roof",
            4,
            4,
            &[200u8, 200, 200, 255].repeat(16),
            Some(&[255u8, 255, 255, 255].repeat(16)),
        )
        .unwrap();
    let binding = TileBinding {
        id: "roof".into(),
        texture_id: "roof.png".into(),
        sort: 1.0,
        has_specular_mask: true,
        emit_specular: true,
    };
    assert!(engine.bind_tile_sprite(binding, textures).is_some());
    run_frames(&mut engine, 1);
    assert!(engine.unbind_tile_sprite("roof"));
    assert!(!engine.unbind_tile_sprite("roof"));
    run_frames(&mut engine, 1);
}

#[test]
fn test_dry_scene_without_lights_shows_albedo() {
    let albedo = [128u8, 64, 200, 255];
    let Some(pixels) = render_with(|engine| {
        engine
            .load_mask(MaskId::ALBEDO, SIZE, SIZE, &solid(albedo), ColorSpace::Srgb)
            .unwrap();
    }) else {
        return;
    };
    assert_pixels_close(&pixels, &solid(albedo), 1);
}

#[test]
fn test_zero_fog_density_leaves_scene_unchanged() {
    let env = EnvironmentSnapshot {
        darkness_level: 0.4,
        cloud_cover: 1.0,
        fog_density: 0.0,
        ..Default::default()
    };
    let setup = |fog: bool| {
        move |engine: &mut MapshineEngine| {
            engine
                .load_mask(MaskId::ALBEDO, SIZE, SIZE, &solid([90, 150, 60, 255]), ColorSpace::Srgb)
                .unwrap();
            engine.set_environment(env);
            assert!(engine.set_pass_enabled("fog", fog));
        }
    };
    let Some(with_fog) = render_with(setup(true)) else {
        return;
    };
    let Some(without_fog) = render_with(setup(false)) else {
        return;
    };
    assert_pixels_close(&with_fog, &without_fog, 1);
}

#[test]
fn test_full_cloud_cover_removes_cloud_specular() {
    let setup = |cloud_specular_enabled: bool| {
        move |engine: &mut MapshineEngine| {
            let albedo = solid([100, 100, 100, 255]);
            engine
                .load_mask(MaskId::ALBEDO, SIZE, SIZE, &albedo, ColorSpace::Srgb)
                .unwrap();
            engine
                .load_mask(MaskId::SPECULAR, SIZE, SIZE, &solid([255; 4]), ColorSpace::Linear)
                .unwrap();
            engine
                .load_mask(MaskId::OUTDOORS, SIZE, SIZE, &solid([255; 4]), ColorSpace::Linear)
                .unwrap();
            engine.set_environment(EnvironmentSnapshot {
                cloud_cover: 1.0,
                fog_density: 1.0,
                ..Default::default()
            });
            engine.set_specular_params(SpecularParams {
                cloud_specular_enabled,
                cloud_specular_intensity: 1.0,
                ..Default::default()
            });
        }
    };
    let Some(with_cloud_specular) = render_with(setup(true)) else {
        return;
    };
    let Some(without_cloud_specular) = render_with(setup(false)) else {
        return;
    };
    assert_pixels_close(&with_cloud_specular, &without_cloud_specular, 1);
}

#[test]
fn test_no_lights_gives_ambient_only() {
    let albedo = [128u8, 128, 128, 255];
    let env = EnvironmentSnapshot {
        darkness_level: 0.6,
        ..Default::default()
    };
    let Some(mut engine) = engine() else {
        return;
    };
    engine
        .load_mask(MaskId::ALBEDO, SIZE, SIZE, &solid(albedo), ColorSpace::Srgb)
        .unwrap();
    engine.set_environment(env);
    run_frames(&mut engine, 2);
    let ambient = engine.read_output().unwrap();

    let expected: Vec<u8> = (0..SIZE * SIZE)
        .flat_map(|_| {
            [
                ambient_lit(albedo[0], &env, 0),
                ambient_lit(albedo[1], &env, 1),
                ambient_lit(albedo[2], &env, 2),
                255,
            ]
        })
        .collect();
    assert_pixels_close(&ambient, &expected, 1);

    engine.on_create_ambient_light(&json!({
        "_id": "lamp",
        "x": 16.0,
        "y": 16.0,
        "config": { "bright": 8.0, "dim": 16.0, "color": "#ffffff" }
    }));
    run_frames(&mut engine, 2);
    let lit = engine.read_output().unwrap();
    let center = ((16 * SIZE + 16) * 4) as usize;
    assert!(lit[center] > ambient[center]);

    assert!(engine.on_delete_ambient_light("lamp"));
    run_frames(&mut engine, 2);
    assert_pixels_close(&engine.read_output().unwrap(), &ambient, 1);
}

#[test]
fn test_invalid_shader_is_reported_not_panicked() {
    let gpu = match GpuContext::headless() {
        Ok(gpu) => gpu,
        Err(e) => {
            eprintln!("no GPU adapter, skipping: {e:#}");
            return;
        }
    };
    let result = mapshine::gpu::validated(&gpu.device, || {
        gpu.device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("broken"),
                source: wgpu::ShaderSource::Wgsl("fn fs( -> {".into()),
            })
    });
    assert!(result.is_err());

    let fine = mapshine::gpu::validated(&gpu.device, || 7);
    assert_eq!(fine.unwrap(), 7);
}

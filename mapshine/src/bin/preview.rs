//! Mapshine Preview - headless renderer
//!
//! Renders a map from an albedo image and optional masks, runs the effect
//! stack for a number of frames and writes the last one as a PNG.
//!
//! # Usage
//!
//! ```bash
//! mapshine-preview map.png -o out.png
//! mapshine-preview map.png --outdoors map_Outdoors.png --windows map_Windows.png
//! mapshine-preview map.png --config mapshine.toml --frames 120 --darkness 0.8 --rain 0.6
//! ```
//!
//! `MAPSHINE_*` environment variables override config values.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use glam::{UVec2, Vec2};
use mapshine::{EngineConfig, GpuContext, MapshineEngine};
use mapshine_common::uniforms::FrameTime;
use mapshine_common::{ColorSpace, EnhancementStore, EnvironmentSnapshot, MaskId, SceneDimensions};

#[derive(Parser)]
#[command(name = "mapshine-preview")]
#[command(author, version, about = "Mapshine - headless battlemap effect preview")]
struct Args {
    /// Albedo image of the map
    albedo: PathBuf,

    /// Output PNG
    #[arg(long, short = 'o', default_value = "mapshine.png")]
    output: PathBuf,

    /// Engine configuration (TOML)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    #[arg(long)]
    outdoors: Option<PathBuf>,

    #[arg(long)]
    windows: Option<PathBuf>,

    #[arg(long)]
    specular: Option<PathBuf>,

    #[arg(long)]
    roughness: Option<PathBuf>,

    #[arg(long)]
    normal: Option<PathBuf>,

    /// Persisted enhancement data (JSON) for light output gains
    #[arg(long)]
    enhancements: Option<PathBuf>,

    /// Frames to simulate before capturing
    #[arg(long, short = 'n', default_value = "60")]
    frames: u32,

    /// Simulated frame rate
    #[arg(long, default_value = "60")]
    fps: f32,

    // === Environment ===
    #[arg(long, default_value = "0.0")]
    darkness: f32,

    #[arg(long, default_value = "0.0")]
    clouds: f32,

    #[arg(long, default_value = "0.0")]
    fog: f32,

    #[arg(long, default_value = "0.0")]
    rain: f32,

    #[arg(long, default_value = "0.0")]
    wind: f32,

    /// Hours, 0-24
    #[arg(long, default_value = "12.0")]
    time_of_day: f32,
}

/// RGBA8 pixels of an image file.
fn load_rgba(path: &Path) -> Result<(u32, u32, Vec<u8>)> {
    let img = image::open(path)
        .with_context(|| format!("Failed to load image: {}", path.display()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    Ok((width, height, img.into_raw()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?.with_env_overrides(),
        None => EngineConfig::from_env(),
    };

    let (width, height, albedo) = load_rgba(&args.albedo)?;
    let scene = SceneDimensions::from_scene_size(width as f32, height as f32, 0.0);
    let gpu = GpuContext::headless()?;
    let mut engine = MapshineEngine::new(gpu, config, scene, UVec2::new(width, height))?;

    engine.load_mask(MaskId::ALBEDO, width, height, &albedo, ColorSpace::Srgb)?;
    let masks = [
        (MaskId::OUTDOORS, &args.outdoors, ColorSpace::Linear),
        (MaskId::WINDOWS, &args.windows, ColorSpace::Srgb),
        (MaskId::SPECULAR, &args.specular, ColorSpace::Linear),
        (MaskId::ROUGHNESS, &args.roughness, ColorSpace::Linear),
        (MaskId::NORMAL, &args.normal, ColorSpace::Linear),
    ];
    for (id, path, color_space) in masks {
        let Some(path) = path else {
            continue;
        };
        let (w, h, rgba) = load_rgba(path)?;
        engine
            .load_mask(id.clone(), w, h, &rgba, color_space)
            .with_context(|| format!("Failed to load mask {id}"))?;
    }

    if let Some(path) = &args.enhancements {
        let store = EnhancementStore::load(path)?;
        tracing::info!(lights = store.len(), "enhancement store loaded");
        engine.set_enhancement_store(&store);
    }

    engine.set_environment(EnvironmentSnapshot {
        darkness_level: args.darkness,
        cloud_cover: args.clouds,
        fog_density: args.fog,
        precipitation: args.rain,
        wetness: args.rain,
        wind_direction: Vec2::new(1.0, 0.0),
        wind_speed: args.wind,
        time_of_day: args.time_of_day,
        ..Default::default()
    });

    let delta = 1.0 / args.fps.max(1.0);
    for frame in 0..args.frames.max(1) {
        engine.frame(FrameTime {
            elapsed: frame as f32 * delta,
            delta,
            frame: frame as u64,
        });
    }

    let pixels = engine.read_output()?;
    image::save_buffer(
        &args.output,
        &pixels,
        width,
        height,
        image::ExtendedColorType::Rgba8,
    )
    .with_context(|| format!("Failed to write {}", args.output.display()))?;
    tracing::info!(
        frames = args.frames,
        output = %args.output.display(),
        "preview written"
    );
    engine.dispose();
    Ok(())
}

//! Mapshine - wgpu effect pipeline for 2.5D battlemaps
//!
//! Layers specular highlights, window light, cloud shadows and fog over a
//! flat map built from an albedo texture and a set of masks. The host feeds
//! environment, camera, lights and tile sprites; [`MapshineEngine`] renders
//! one composed frame per call.
//!
//! The GPU-free half (masks, flow fields, lights, params, uniform layouts)
//! lives in `mapshine-common`.

pub mod composer;
pub mod config;
pub mod derived;
pub mod engine;
pub mod gpu;
pub mod materials;
pub mod pass;
pub mod passes;
pub mod pipeline;
pub mod shaders;
pub mod textures;

pub use composer::{Composer, OUTPUT_FORMAT};
pub use config::{EngineConfig, TargetFormat};
pub use engine::MapshineEngine;
pub use gpu::GpuContext;
pub use pass::{EffectPass, FrameState, PassContext, PassLayer, PassTargets};
pub use passes::TileTextures;

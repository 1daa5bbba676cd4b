//! GPU uniform layouts shared by every pass.
//!
//! Every block is built from `vec4` rows only (`[f32; 4]`/`[u32; 4]`), so
//! the Rust `#[repr(C)]` layout and the WGSL uniform layout agree without
//! padding fields. The WGSL mirrors live in `shaders/common/blocks.wgsl`.

mod passes;
mod set;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec2};

use crate::environment::EnvironmentSnapshot;
use crate::lights::{LightUniformArrays, MAX_LIGHTS};
use crate::scene::{Camera, ViewState};

pub use passes::{
    CloudShadowBlock, CloudShadowMaterial, FogBlock, FogMaterial, SpecularBlock,
    SpecularMaterial, StripeLayerBlock, WindowLightBlock, WindowLightMaterial, output_mode,
};
pub use set::{MaterialId, UniformSet, WithEnvironment, WithLights, WithView};

/// Per-frame timing as uploaded to shaders.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTime {
    pub elapsed: f32,
    pub delta: f32,
    pub frame: u64,
}

// ============================================================================
// View
// ============================================================================

/// Camera, view bounds and scene bounds (160 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ViewBlock {
    pub view_proj: [[f32; 4]; 4],
    /// xyz: camera position, w: zoom
    pub camera: [f32; 4],
    /// Visible ground rect: min.xy, max.xy (world)
    pub view_bounds: [f32; 4],
    /// Scene rect: min.xy, size.xy (world, y up)
    pub scene_bounds: [f32; 4],
    /// canvas width, canvas height, pixels per grid unit, ground distance
    pub canvas: [f32; 4],
    /// width, height, 1/width, 1/height
    pub screen: [f32; 4],
    /// elapsed, delta, frame (wrapped), 1 for perspective projection
    pub time: [f32; 4],
}

const _: () = assert!(core::mem::size_of::<ViewBlock>() == 160);

impl Default for ViewBlock {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            camera: [0.0, 0.0, 100.0, 1.0],
            view_bounds: [0.0, 0.0, 1.0, 1.0],
            scene_bounds: [0.0, 0.0, 1.0, 1.0],
            canvas: [1.0, 1.0, 1.0, 100.0],
            screen: [1.0, 1.0, 1.0, 1.0],
            time: [0.0; 4],
        }
    }
}

impl ViewBlock {
    pub fn new(view: &ViewState, time: FrameTime) -> Self {
        let cam = view.camera;
        let (vmin, vmax) = cam.ground_bounds();
        let (smin, ssize) = view.scene.scene_bounds_world();
        let screen = view.screen.max(UVec2::ONE).as_vec2();
        let pos = cam.position();
        Self {
            view_proj: cam.view_projection().to_cols_array_2d(),
            camera: [pos.x, pos.y, pos.z, cam.zoom()],
            view_bounds: [vmin.x, vmin.y, vmax.x, vmax.y],
            scene_bounds: [smin.x, smin.y, ssize.x, ssize.y],
            canvas: [
                view.scene.width,
                view.scene.height,
                view.scene.pixels_per_unit(),
                cam.ground_distance(),
            ],
            screen: [screen.x, screen.y, 1.0 / screen.x, 1.0 / screen.y],
            time: [
                time.elapsed,
                time.delta,
                (time.frame % 1_000_000) as f32,
                if matches!(cam, Camera::Perspective { .. }) {
                    1.0
                } else {
                    0.0
                },
            ],
        }
    }

    pub fn view_min(&self) -> Vec2 {
        Vec2::new(self.view_bounds[0], self.view_bounds[1])
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Shared environment (112 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct EnvironmentBlock {
    /// rgb: ambient daylight, a: darkness level
    pub daylight: [f32; 4],
    /// rgb: ambient darkness, a: time of day (hours)
    pub darkness: [f32; 4],
    /// rgb: ambient brightest, a: lightning flash
    pub brightest: [f32; 4],
    /// cloud cover, fog density, precipitation, wetness
    pub weather: [f32; 4],
    /// wind dir xy, wind speed, freeze level
    pub wind: [f32; 4],
    /// rgb: ambient tint, a: light level (floored)
    pub ambient: [f32; 4],
    /// sun dir xy (scene UV), sky factor, unused
    pub sun: [f32; 4],
}

const _: () = assert!(core::mem::size_of::<EnvironmentBlock>() == 112);

impl Default for EnvironmentBlock {
    fn default() -> Self {
        Self::from_snapshot(&EnvironmentSnapshot::default())
    }
}

impl EnvironmentBlock {
    /// Packs a snapshot; the snapshot is sanitized first.
    pub fn from_snapshot(env: &EnvironmentSnapshot) -> Self {
        let e = env.sanitized();
        let tint = e.ambient_tint();
        let sun = e.sun_direction();
        Self {
            daylight: e.ambient_daylight.extend(e.darkness_level).to_array(),
            darkness: e.ambient_darkness.extend(e.time_of_day).to_array(),
            brightest: e.ambient_brightest.extend(e.lightning_flash).to_array(),
            weather: [e.cloud_cover, e.fog_density, e.precipitation, e.wetness],
            wind: [
                e.wind_direction.x,
                e.wind_direction.y,
                e.wind_speed,
                e.freeze_level,
            ],
            ambient: tint.extend(e.light_level()).to_array(),
            sun: [sun.x, sun.y, e.sky_factor(), 0.0],
        }
    }

    pub fn darkness_level(&self) -> f32 {
        self.daylight[3]
    }

    pub fn light_level(&self) -> f32 {
        self.ambient[3]
    }
}

// ============================================================================
// Lights
// ============================================================================

/// Dynamic lights (16 + 3·64·16 = 3088 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LightBlock {
    /// x: light count
    pub count: [u32; 4],
    /// xy: world position, z: elevation
    pub position: [[f32; 4]; MAX_LIGHTS],
    /// rgb: linear color (luminosity applied)
    pub color: [[f32; 4]; MAX_LIGHTS],
    /// radius px, bright px, attenuation, unused
    pub config: [[f32; 4]; MAX_LIGHTS],
}

const _: () = assert!(core::mem::size_of::<LightBlock>() == 16 + 3 * MAX_LIGHTS * 16);

impl Default for LightBlock {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl LightBlock {
    /// Fans the `3N/3N/4N` arrays out into `vec4` rows.
    pub fn from_arrays(arrays: &LightUniformArrays) -> Self {
        let mut block = Self::zeroed();
        let n = (arrays.count as usize)
            .min(MAX_LIGHTS)
            .min(arrays.position.len() / 3)
            .min(arrays.color.len() / 3)
            .min(arrays.config.len() / 4);
        for i in 0..n {
            let p = &arrays.position[i * 3..i * 3 + 3];
            let c = &arrays.color[i * 3..i * 3 + 3];
            let k = &arrays.config[i * 4..i * 4 + 4];
            block.position[i] = [p[0], p[1], p[2], 0.0];
            block.color[i] = [c[0], c[1], c[2], 1.0];
            block.config[i] = [k[0], k[1], k[2], k[3]];
        }
        block.count = [n as u32, 0, 0, 0];
        block
    }

    pub fn count(&self) -> usize {
        self.count[0] as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneDimensions;
    use glam::Vec3;

    #[test]
    fn test_light_block_fan_out() {
        let arrays = LightUniformArrays {
            count: 2,
            position: vec![500.0, 1500.0, 0.0, 10.0, 20.0, 0.0],
            color: vec![2.0, 1.0, 0.4, 1.0, 1.0, 1.0],
            config: vec![200.0, 100.0, 0.5, 0.0, 50.0, 0.0, 1.0, 0.0],
        };
        let block = LightBlock::from_arrays(&arrays);
        assert_eq!(block.count(), 2);
        assert_eq!(block.position[0][..3], [500.0, 1500.0, 0.0]);
        assert_eq!(block.color[0][..3], [2.0, 1.0, 0.4]);
        assert_eq!(block.config[0], [200.0, 100.0, 0.5, 0.0]);
        assert_eq!(block.config[1], [50.0, 0.0, 1.0, 0.0]);
        assert_eq!(block.position[2], [0.0; 4]);
    }

    #[test]
    fn test_light_block_truncates_short_arrays() {
        let arrays = LightUniformArrays {
            count: 5,
            position: vec![1.0, 2.0, 0.0],
            color: vec![1.0, 1.0, 1.0],
            config: vec![10.0, 5.0, 0.5, 0.0],
        };
        assert_eq!(LightBlock::from_arrays(&arrays).count(), 1);
    }

    #[test]
    fn test_environment_block_floor_and_tint() {
        let env = EnvironmentSnapshot {
            darkness_level: 1.0,
            ambient_darkness: Vec3::new(0.1, 0.1, 0.3),
            ..Default::default()
        };
        let block = EnvironmentBlock::from_snapshot(&env);
        assert_eq!(block.light_level(), 0.25);
        let tint = Vec3::from_slice(&block.ambient[..3]);
        assert!((tint - Vec3::new(0.1, 0.1, 0.3)).abs().max_element() < 1e-6);
        assert_eq!(block.darkness_level(), 1.0);
    }

    #[test]
    fn test_view_block_bounds() {
        let scene = SceneDimensions::from_scene_size(2000.0, 2000.0, 0.0);
        let cam = Camera::orthographic(Vec2::new(1000.0, 1000.0), 1920.0, 1080.0, 500.0);
        let view = ViewState::new(cam, UVec2::new(1920, 1080), scene);
        let block = ViewBlock::new(
            &view,
            FrameTime {
                elapsed: 2.0,
                delta: 0.016,
                frame: 120,
            },
        );
        assert_eq!(block.view_bounds, [40.0, 460.0, 1960.0, 1540.0]);
        assert_eq!(block.scene_bounds, [0.0, 0.0, 2000.0, 2000.0]);
        assert_eq!(block.screen[0], 1920.0);
        assert_eq!(block.time[2], 120.0);
        assert_eq!(block.canvas[3], 500.0);
    }
}

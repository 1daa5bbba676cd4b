//! Scene dimensions, camera and view bounds.
//!
//! # Coordinate spaces
//!
//! - **Host space**: canvas pixels, origin top-left, +y down.
//! - **World space**: canvas pixels, origin bottom-left, +y up, +z toward
//!   the camera. `world.y = canvas.height - host.y`.
//! - **Scene UV**: `[0,1]²` over the scene rect, +v down (host orientation),
//!   the space every scene-coverage mask is authored in.
//! - **Screen UV**: `[0,1]²` over the drawing buffer, +v down.

use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::{EffectError, EffectResult, ensure_finite};

/// Camera position substituted when the host reports NaN/Inf.
pub const FALLBACK_CAMERA_POSITION: Vec3 = Vec3::new(0.0, 0.0, 100.0);

/// Rectangle in host space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Grid cell size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridInfo {
    pub size_x: f32,
    pub size_y: f32,
}

impl Default for GridInfo {
    fn default() -> Self {
        Self {
            size_x: 100.0,
            size_y: 100.0,
        }
    }
}

/// Host canvas dimensions (`canvas.dimensions` plus `canvas.grid`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDimensions {
    pub scene_x: f32,
    pub scene_y: f32,
    pub scene_width: f32,
    pub scene_height: f32,
    /// Full canvas width including padding.
    pub width: f32,
    /// Full canvas height including padding.
    pub height: f32,
    /// Grid size in pixels.
    pub size: f32,
    /// Grid distance in scene units (feet, metres...).
    pub distance: f32,
    pub scene_rect: SceneRect,
    #[serde(default)]
    pub grid: GridInfo,
}

impl Default for SceneDimensions {
    fn default() -> Self {
        Self::from_scene_size(2000.0, 2000.0, 0.0)
    }
}

impl SceneDimensions {
    /// Builds dimensions for a scene of the given size with uniform padding.
    pub fn from_scene_size(width: f32, height: f32, padding: f32) -> Self {
        Self {
            scene_x: padding,
            scene_y: padding,
            scene_width: width,
            scene_height: height,
            width: width + 2.0 * padding,
            height: height + 2.0 * padding,
            size: 100.0,
            distance: 5.0,
            scene_rect: SceneRect {
                x: padding,
                y: padding,
                width,
                height,
            },
            grid: GridInfo::default(),
        }
    }

    /// Rejects zero-area or non-finite dimensions.
    pub fn validate(&self) -> EffectResult<()> {
        for (name, v) in [
            ("scene.sceneWidth", self.scene_width),
            ("scene.sceneHeight", self.scene_height),
            ("scene.width", self.width),
            ("scene.height", self.height),
        ] {
            ensure_finite(name, v)?;
            if v <= 0.0 {
                return Err(EffectError::HostNotReady("scene dimensions"));
            }
        }
        Ok(())
    }

    /// Pixels per grid distance unit: `((sizeX + sizeY) / 2) / distance`.
    pub fn pixels_per_unit(&self) -> f32 {
        let grid = (self.grid.size_x + self.grid.size_y) * 0.5;
        let grid = if grid > 0.0 { grid } else { self.size };
        if self.distance > 0.0 {
            grid / self.distance
        } else {
            grid
        }
    }

    /// Host point to world point.
    pub fn host_to_world(&self, host: Vec2) -> Vec2 {
        Vec2::new(host.x, self.height - host.y)
    }

    /// Scene rect in world space as `(min, size)`.
    pub fn scene_bounds_world(&self) -> (Vec2, Vec2) {
        let min = Vec2::new(self.scene_x, self.height - (self.scene_y + self.scene_height));
        (min, Vec2::new(self.scene_width, self.scene_height))
    }

    /// World point to scene UV (+v down, host orientation).
    pub fn world_to_scene_uv(&self, world: Vec2) -> Vec2 {
        let (min, size) = self.scene_bounds_world();
        let uv = (world - min) / size.max(Vec2::splat(1.0));
        Vec2::new(uv.x, 1.0 - uv.y)
    }

    /// World-space center of the scene rect.
    pub fn scene_center_world(&self) -> Vec2 {
        let (min, size) = self.scene_bounds_world();
        min + size * 0.5
    }
}

/// Host camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Camera {
    /// Orthographic top-down camera; frustum extents are in world units at zoom 1.
    #[serde(rename_all = "camelCase")]
    Orthographic {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        zoom: f32,
        position: Vec3,
        near: f32,
        far: f32,
    },
    /// Perspective camera looking straight down -Z.
    #[serde(rename_all = "camelCase")]
    Perspective {
        /// Vertical field of view in degrees.
        fov: f32,
        aspect: f32,
        position: Vec3,
        near: f32,
        far: f32,
    },
}

impl Camera {
    /// Orthographic camera centered on `center` showing `width x height` world units.
    pub fn orthographic(center: Vec2, width: f32, height: f32, height_above: f32) -> Self {
        Camera::Orthographic {
            left: -width * 0.5,
            right: width * 0.5,
            top: height * 0.5,
            bottom: -height * 0.5,
            zoom: 1.0,
            position: center.extend(height_above),
            near: 0.1,
            far: height_above * 2.0 + 1000.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        match *self {
            Camera::Orthographic { position, .. } | Camera::Perspective { position, .. } => {
                position
            }
        }
    }

    pub fn zoom(&self) -> f32 {
        match *self {
            Camera::Orthographic { zoom, .. } => zoom,
            Camera::Perspective { .. } => 1.0,
        }
    }

    pub fn near_far(&self) -> (f32, f32) {
        match *self {
            Camera::Orthographic { near, far, .. } | Camera::Perspective { near, far, .. } => {
                (near, far)
            }
        }
    }

    /// Replaces a non-finite position with [`FALLBACK_CAMERA_POSITION`] and
    /// repairs degenerate zoom/fov/aspect.
    ///
    /// Returns the repaired camera and the error that was recovered, if any.
    pub fn sanitized(self) -> (Self, Option<EffectError>) {
        let mut err = None;
        let fix_pos = |p: Vec3, err: &mut Option<EffectError>| {
            if p.is_finite() {
                p
            } else {
                *err = Some(EffectError::InvalidUniform {
                    name: "camera.position",
                });
                FALLBACK_CAMERA_POSITION
            }
        };
        let cam = match self {
            Camera::Orthographic {
                left,
                right,
                top,
                bottom,
                zoom,
                position,
                near,
                far,
            } => {
                let extents_ok = [left, right, top, bottom].iter().all(|v| v.is_finite())
                    && right > left
                    && top > bottom;
                let (left, right, top, bottom) = if extents_ok {
                    (left, right, top, bottom)
                } else {
                    err = Some(EffectError::InvalidUniform {
                        name: "camera.frustum",
                    });
                    (-1.0, 1.0, 1.0, -1.0)
                };
                Camera::Orthographic {
                    left,
                    right,
                    top,
                    bottom,
                    zoom: if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 },
                    position: fix_pos(position, &mut err),
                    near,
                    far,
                }
            }
            Camera::Perspective {
                fov,
                aspect,
                position,
                near,
                far,
            } => Camera::Perspective {
                fov: if fov.is_finite() && fov > 1.0 && fov < 179.0 {
                    fov
                } else {
                    45.0
                },
                aspect: if aspect.is_finite() && aspect > 0.0 {
                    aspect
                } else {
                    1.0
                },
                position: fix_pos(position, &mut err),
                near,
                far,
            },
        };
        let cam = cam.with_sane_clip();
        (cam, err)
    }

    fn with_sane_clip(self) -> Self {
        let fix = |near: f32, far: f32| {
            let near = if near.is_finite() && near > 0.0 { near } else { 0.1 };
            let far = if far.is_finite() && far > near + 1e-3 {
                far
            } else {
                near + 10_000.0
            };
            (near, far)
        };
        match self {
            Camera::Orthographic {
                left,
                right,
                top,
                bottom,
                zoom,
                position,
                near,
                far,
            } => {
                let (near, far) = fix(near, far);
                Camera::Orthographic {
                    left,
                    right,
                    top,
                    bottom,
                    zoom,
                    position,
                    near,
                    far,
                }
            }
            Camera::Perspective {
                fov,
                aspect,
                position,
                near,
                far,
            } => {
                let (near, far) = fix(near, far);
                Camera::Perspective {
                    fov,
                    aspect,
                    position,
                    near,
                    far,
                }
            }
        }
    }

    /// View matrix looking straight down -Z with +Y up.
    pub fn view(&self) -> Mat4 {
        let eye = self.position();
        Mat4::look_at_rh(eye, eye - Vec3::Z, Vec3::Y)
    }

    /// Projection matrix with wgpu depth range `[0, 1]`.
    pub fn projection(&self) -> Mat4 {
        match *self {
            Camera::Orthographic {
                left,
                right,
                top,
                bottom,
                zoom,
                near,
                far,
                ..
            } => {
                let z = zoom.max(1e-4);
                Mat4::orthographic_rh(left / z, right / z, bottom / z, top / z, near, far)
            }
            Camera::Perspective {
                fov,
                aspect,
                near,
                far,
                ..
            } => Mat4::perspective_rh(fov.to_radians(), aspect, near, far),
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Visible world rectangle on the ground plane (z = 0) as `(min, max)`.
    pub fn ground_bounds(&self) -> (Vec2, Vec2) {
        let center = self.position().truncate();
        let half = match *self {
            Camera::Orthographic {
                left,
                right,
                top,
                bottom,
                zoom,
                ..
            } => {
                let z = zoom.max(1e-4);
                Vec2::new((right - left) * 0.5 / z, (top - bottom) * 0.5 / z)
            }
            Camera::Perspective {
                fov,
                aspect,
                position,
                ..
            } => {
                let half_h = (fov.to_radians() * 0.5).tan() * position.z.abs();
                Vec2::new(half_h * aspect, half_h)
            }
        };
        (center - half, center + half)
    }

    /// Distance from the camera to the ground plane along the view axis.
    pub fn ground_distance(&self) -> f32 {
        self.position().z.abs().max(1e-3)
    }
}

/// Camera, drawing buffer and scene combined for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub camera: Camera,
    pub screen: UVec2,
    pub scene: SceneDimensions,
}

impl ViewState {
    pub fn new(camera: Camera, screen: UVec2, scene: SceneDimensions) -> Self {
        Self {
            camera,
            screen: screen.max(UVec2::ONE),
            scene,
        }
    }

    /// Screen UV (+v down) to world position on the ground plane.
    pub fn screen_uv_to_world(&self, uv: Vec2) -> Vec2 {
        let (min, max) = self.camera.ground_bounds();
        Vec2::new(
            min.x + (max.x - min.x) * uv.x,
            max.y - (max.y - min.y) * uv.y,
        )
    }

    /// World position to screen UV (+v down) via the full projection.
    pub fn world_to_screen_uv(&self, world: Vec3) -> Vec2 {
        let clip = self.camera.view_projection() * Vec4::new(world.x, world.y, world.z, 1.0);
        let ndc = clip.truncate().truncate() / clip.w.max(1e-6);
        Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_host_dimensions() {
        let dims: SceneDimensions = serde_json::from_value(json!({
            "sceneX": 250.0, "sceneY": 250.0,
            "sceneWidth": 2000.0, "sceneHeight": 1500.0,
            "width": 2500.0, "height": 2000.0,
            "size": 100.0, "distance": 5.0,
            "sceneRect": {"x": 250.0, "y": 250.0, "width": 2000.0, "height": 1500.0},
            "grid": {"sizeX": 100.0, "sizeY": 100.0}
        }))
        .unwrap();
        assert!(dims.validate().is_ok());
        assert_eq!(dims.pixels_per_unit(), 20.0);
        let (min, size) = dims.scene_bounds_world();
        assert_eq!(min, Vec2::new(250.0, 250.0));
        assert_eq!(size, Vec2::new(2000.0, 1500.0));
    }

    #[test]
    fn test_scene_uv_is_host_oriented() {
        let dims = SceneDimensions::from_scene_size(1000.0, 1000.0, 0.0);
        // Host top-left corner of the scene is scene UV (0, 0).
        let world = dims.host_to_world(Vec2::new(0.0, 0.0));
        assert_eq!(dims.world_to_scene_uv(world), Vec2::new(0.0, 0.0));
        let world = dims.host_to_world(Vec2::new(1000.0, 250.0));
        assert_eq!(dims.world_to_scene_uv(world), Vec2::new(1.0, 0.25));
    }

    #[test]
    fn test_zero_area_scene_not_ready() {
        let dims = SceneDimensions::from_scene_size(0.0, 100.0, 0.0);
        assert_eq!(
            dims.validate(),
            Err(EffectError::HostNotReady("scene dimensions"))
        );
    }

    #[test]
    fn test_nan_camera_substituted() {
        let cam = Camera::Perspective {
            fov: 60.0,
            aspect: 16.0 / 9.0,
            position: Vec3::new(f32::NAN, 1.0, 2.0),
            near: 1.0,
            far: 5000.0,
        };
        let (fixed, err) = cam.sanitized();
        assert_eq!(fixed.position(), FALLBACK_CAMERA_POSITION);
        assert!(matches!(err, Some(EffectError::InvalidUniform { .. })));
    }

    #[test]
    fn test_orthographic_ground_bounds_and_zoom() {
        let cam = Camera::orthographic(Vec2::new(1000.0, 1000.0), 1920.0, 1080.0, 500.0);
        let (min, max) = cam.ground_bounds();
        assert_eq!(min, Vec2::new(40.0, 460.0));
        assert_eq!(max, Vec2::new(1960.0, 1540.0));

        let zoomed = match cam {
            Camera::Orthographic {
                left,
                right,
                top,
                bottom,
                position,
                near,
                far,
                ..
            } => Camera::Orthographic {
                left,
                right,
                top,
                bottom,
                zoom: 2.0,
                position,
                near,
                far,
            },
            other => other,
        };
        let (min, max) = zoomed.ground_bounds();
        assert_eq!(max - min, Vec2::new(960.0, 540.0));
    }

    #[test]
    fn test_screen_world_roundtrip() {
        let dims = SceneDimensions::default();
        let cam = Camera::orthographic(Vec2::new(1000.0, 1000.0), 1920.0, 1080.0, 500.0);
        let view = ViewState::new(cam, UVec2::new(1920, 1080), dims);
        let world = view.screen_uv_to_world(Vec2::new(0.25, 0.75));
        let uv = view.world_to_screen_uv(world.extend(0.0));
        assert!((uv - Vec2::new(0.25, 0.75)).length() < 1e-4);
    }
}

//! Per-tile specular overlay bookkeeping.
//!
//! Every bound tile sprite gets an occluder mesh (depth only) and, when it
//! has a specular mask or emits specular, an additive color mesh drawn with
//! an equal depth test. Occluders all render in a band strictly before all
//! color meshes, so a higher tile's depth always gates lower tiles' color.

use glam::{Mat4, Quat, Vec3};
use hashbrown::HashMap;

/// First render order of the occluder band.
pub const OCCLUDER_BAND: f64 = 6000.0;
/// First render order of the color band.
pub const COLOR_BAND: f64 = 7000.0;
/// Width of each band.
pub const BAND_WIDTH: f64 = 999.0;
/// Per-sort offset inside a band. Render orders are f64 so this survives
/// next to the band base.
pub const SORT_ORDER_STEP: f64 = 1e-5;

/// Opacity below which a sprite counts as hidden (hover-hide).
pub const MIN_VISIBLE_OPACITY: f32 = 0.01;

/// Render order of a tile inside `band`, preserving host sort order.
pub fn band_order(band: f64, sort: f32) -> f64 {
    let sort = if sort.is_finite() { f64::from(sort) } else { 0.0 };
    let offset = (BAND_WIDTH * 0.5 - sort * SORT_ORDER_STEP).clamp(0.0, BAND_WIDTH);
    band + offset
}

/// Z lift applied to overlay meshes so higher tiles sit strictly in front.
///
/// `base + sort · per_sort` inside `[knee_low, knee_high]`. Outside that
/// range the lift is compressed toward `0` and `max` without reaching
/// them, so the map stays strictly increasing for every sort.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileLift {
    pub base: f32,
    pub per_sort: f32,
    pub max: f32,
}

/// Share of `max` where the upper compression starts.
const LIFT_UPPER_KNEE: f32 = 0.8;

impl Default for TileLift {
    fn default() -> Self {
        Self {
            base: 1.0,
            per_sort: 0.01,
            max: 250.0,
        }
    }
}

impl TileLift {
    pub fn lift(&self, sort: f32) -> f32 {
        let sort = if sort.is_finite() { sort } else { 0.0 };
        let linear = self.base + sort * self.per_sort.max(0.0);
        let (low, high) = self.knees();
        if linear > high {
            // Slope 1 at the knee, approaching `max` as 1/excess.
            let room = self.max.max(1e-3) - high;
            let excess = linear - high;
            high + room * excess / (excess + room)
        } else if linear < low {
            let deficit = low - linear;
            low * low / (low + deficit)
        } else {
            linear
        }
    }

    fn knees(&self) -> (f32, f32) {
        let high = self.max.max(1e-3) * LIFT_UPPER_KNEE;
        let low = (self.base * 0.5).max(1e-3).min(high);
        (low, high)
    }
}

/// What the host tells us when a tile is bound.
#[derive(Debug, Clone, PartialEq)]
pub struct TileBinding {
    pub id: String,
    pub texture_id: String,
    pub sort: f32,
    pub has_specular_mask: bool,
    pub emit_specular: bool,
}

/// Per-frame state of the host sprite.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteSnapshot {
    pub texture_id: String,
    /// Sprite world matrix.
    pub transform: Mat4,
    /// Extra rotation of the sprite's material around Z (radians).
    pub material_rotation: f32,
    pub visible: bool,
    pub opacity: f32,
    pub depth_write: bool,
    pub sort: f32,
}

impl Default for SpriteSnapshot {
    fn default() -> Self {
        Self {
            texture_id: String::new(),
            transform: Mat4::IDENTITY,
            material_rotation: 0.0,
            visible: true,
            opacity: 1.0,
            depth_write: true,
            sort: 0.0,
        }
    }
}

/// Overlay lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Unbound,
    /// `has_color` is false for occluder-only overlays.
    Bound { has_color: bool },
    Disposed,
}

/// Mirrored state of one overlay mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayMesh {
    pub transform: Mat4,
    pub visible: bool,
    pub depth_write: bool,
    pub render_order: f64,
}

impl OverlayMesh {
    fn new(render_order: f64) -> Self {
        Self {
            transform: Mat4::IDENTITY,
            visible: false,
            depth_write: true,
            render_order,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileOverlay {
    pub binding: TileBinding,
    pub state: OverlayState,
    pub occluder: OverlayMesh,
    pub color: Option<OverlayMesh>,
    /// Incremented on every transparent rebuild.
    pub rebinds: u32,
}

impl TileOverlay {
    fn wants_color(binding: &TileBinding) -> bool {
        binding.has_specular_mask || binding.emit_specular
    }

    fn build(binding: TileBinding, rebinds: u32) -> Self {
        let has_color = Self::wants_color(&binding);
        Self {
            occluder: OverlayMesh::new(band_order(OCCLUDER_BAND, binding.sort)),
            color: has_color.then(|| OverlayMesh::new(band_order(COLOR_BAND, binding.sort))),
            state: OverlayState::Bound { has_color },
            binding,
            rebinds,
        }
    }
}

/// What a bind or sync call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Bound,
    /// Meshes were rebuilt (emit flag or texture changed).
    Rebound,
    Unchanged,
}

/// All tile overlays, keyed by tile id.
#[derive(Debug, Clone, Default)]
pub struct TileOverlayBook {
    overlays: HashMap<String, TileOverlay>,
    lift: TileLift,
}

impl TileOverlayBook {
    pub fn new(lift: TileLift) -> Self {
        Self {
            overlays: HashMap::new(),
            lift,
        }
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TileOverlay> {
        self.overlays.get(id)
    }

    pub fn state(&self, id: &str) -> OverlayState {
        self.overlays
            .get(id)
            .map_or(OverlayState::Unbound, |o| o.state)
    }

    /// Binds a tile, or rebuilds it in place when its emit flag or texture
    /// changed since the last bind.
    pub fn bind(&mut self, binding: TileBinding) -> BindOutcome {
        match self.overlays.get_mut(&binding.id) {
            Some(existing) => {
                let needs_rebuild = existing.binding.emit_specular != binding.emit_specular
                    || existing.binding.texture_id != binding.texture_id
                    || existing.binding.has_specular_mask != binding.has_specular_mask;
                if !needs_rebuild {
                    existing.binding.sort = binding.sort;
                    return BindOutcome::Unchanged;
                }
                let rebinds = existing.rebinds + 1;
                tracing::debug!(tile = %binding.id, rebinds, "tile overlay rebound");
                *existing = TileOverlay::build(binding, rebinds);
                BindOutcome::Rebound
            }
            None => {
                tracing::debug!(tile = %binding.id, "tile overlay bound");
                self.overlays
                    .insert(binding.id.clone(), TileOverlay::build(binding, 0));
                BindOutcome::Bound
            }
        }
    }

    /// Disposes and forgets a tile. Returns the final overlay state.
    pub fn unbind(&mut self, id: &str) -> Option<TileOverlay> {
        self.overlays.remove(id).map(|mut o| {
            o.state = OverlayState::Disposed;
            o.occluder.visible = false;
            if let Some(c) = o.color.as_mut() {
                c.visible = false;
            }
            o
        })
    }

    /// Mirrors transform, visibility and depth policy from the sprite.
    ///
    /// A texture swap triggers a rebind first.
    pub fn sync(&mut self, id: &str, sprite: &SpriteSnapshot) -> Option<BindOutcome> {
        let mut outcome = BindOutcome::Unchanged;
        let current = self.overlays.get(id)?;
        if current.binding.texture_id != sprite.texture_id && !sprite.texture_id.is_empty() {
            let binding = TileBinding {
                texture_id: sprite.texture_id.clone(),
                sort: sprite.sort,
                ..current.binding.clone()
            };
            outcome = self.bind(binding);
        }

        let lift = self.lift;
        let overlay = self.overlays.get_mut(id)?;
        overlay.binding.sort = sprite.sort;
        let transform = overlay_transform(sprite, lift.lift(sprite.sort));
        let visible = sprite_visible(sprite);

        overlay.occluder.transform = transform;
        overlay.occluder.visible = visible;
        overlay.occluder.depth_write = sprite.depth_write;
        overlay.occluder.render_order = band_order(OCCLUDER_BAND, sprite.sort);
        if let Some(color) = overlay.color.as_mut() {
            color.transform = transform;
            color.visible = visible;
            color.depth_write = false;
            color.render_order = band_order(COLOR_BAND, sprite.sort);
        }
        Some(outcome)
    }

    /// Visible occluders sorted by render order.
    pub fn occluder_draws(&self) -> Vec<(&str, &OverlayMesh)> {
        let mut draws: Vec<_> = self
            .overlays
            .iter()
            .filter(|(_, o)| o.occluder.visible)
            .map(|(id, o)| (id.as_str(), &o.occluder))
            .collect();
        draws.sort_by(|a, b| a.1.render_order.total_cmp(&b.1.render_order).then(a.0.cmp(b.0)));
        draws
    }

    /// Visible color meshes sorted by render order.
    pub fn color_draws(&self) -> Vec<(&str, &OverlayMesh)> {
        let mut draws: Vec<_> = self
            .overlays
            .iter()
            .filter_map(|(id, o)| o.color.as_ref().map(|c| (id.as_str(), c)))
            .filter(|(_, c)| c.visible)
            .collect();
        draws.sort_by(|a, b| a.1.render_order.total_cmp(&b.1.render_order).then(a.0.cmp(b.0)));
        draws
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.overlays.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.overlays.clear();
    }
}

/// `visible && opacity >= 0.01`.
pub fn sprite_visible(sprite: &SpriteSnapshot) -> bool {
    sprite.visible && sprite.opacity.is_finite() && sprite.opacity >= MIN_VISIBLE_OPACITY
}

/// Decomposes the sprite matrix and recomposes `T·R·Rz(material)·S` with
/// the Z lift added to the translation.
pub fn overlay_transform(sprite: &SpriteSnapshot, lift: f32) -> Mat4 {
    let (scale, rotation, translation) = sprite.transform.to_scale_rotation_translation();
    let (scale, rotation, translation) =
        if scale.is_finite() && rotation.is_finite() && translation.is_finite() {
            (scale, rotation, translation)
        } else {
            (Vec3::ONE, Quat::IDENTITY, Vec3::ZERO)
        };
    let material = if sprite.material_rotation.is_finite() {
        Quat::from_rotation_z(sprite.material_rotation)
    } else {
        Quat::IDENTITY
    };
    Mat4::from_translation(translation + Vec3::Z * lift)
        * Mat4::from_quat(rotation)
        * Mat4::from_quat(material)
        * Mat4::from_scale(scale)
}

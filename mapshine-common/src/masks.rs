//! Named texture registry with synchronous publish/subscribe.
//!
//! Generic over the texture handle so the bookkeeping stays GPU-free; the
//! runtime instantiates it with its own texture type.

use std::borrow::Cow;
use std::fmt;

use hashbrown::{HashMap, HashSet};

/// Mask identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaskId(pub Cow<'static, str>);

impl MaskId {
    pub const ALBEDO: MaskId = MaskId::from_static("albedo");
    pub const OUTDOORS: MaskId = MaskId::from_static("outdoors");
    pub const WINDOWS: MaskId = MaskId::from_static("windows");
    pub const SPECULAR: MaskId = MaskId::from_static("specular");
    pub const ROUGHNESS: MaskId = MaskId::from_static("roughness");
    pub const NORMAL: MaskId = MaskId::from_static("normal");
    pub const CLOUD_SHADOW_SCREEN: MaskId = MaskId::from_static("cloudShadow.screen");
    pub const CLOUD_SHADOW_RAW_SCREEN: MaskId = MaskId::from_static("cloudShadowRaw.screen");
    pub const WINDOW_LIGHT_SCREEN: MaskId = MaskId::from_static("windowLight.screen");
    pub const RAIN_FLOW_MAP: MaskId = MaskId::from_static("rainFlowMap.scene");
    pub const ROOF_DISTANCE: MaskId = MaskId::from_static("roofDistance");
    pub const ROOF_ALPHA_SCREEN: MaskId = MaskId::from_static("roofAlpha.screen");
    pub const BUILDING_SHADOW: MaskId = MaskId::from_static("buildingShadow.scene");
    pub const SPLASH_ATLAS: MaskId = MaskId::from_static("splashAtlas");

    pub const fn from_static(id: &'static str) -> Self {
        MaskId(Cow::Borrowed(id))
    }

    pub fn new(id: impl Into<String>) -> Self {
        MaskId(Cow::Owned(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant substituted when this mask is absent.
    pub fn fallback(&self) -> FallbackKind {
        match self.as_str() {
            "albedo" | "outdoors" | "roughness" | "cloudShadow.screen"
            | "buildingShadow.scene" => FallbackKind::White,
            "normal" => FallbackKind::FlatNormal,
            "windowLight.screen" | "roofAlpha.screen" => FallbackKind::Transparent,
            "rainFlowMap.scene" => FallbackKind::NeutralFlow,
            "roofDistance" => FallbackKind::FarDistance,
            _ => FallbackKind::Black,
        }
    }
}

impl fmt::Display for MaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for MaskId {
    fn from(id: &'static str) -> Self {
        MaskId::from_static(id)
    }
}

/// How texel values are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    #[default]
    Linear,
    Srgb,
}

/// Which space the texture's UVs cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoverageSpace {
    /// `[0,1]²` over the scene rect, +v down.
    #[default]
    SceneUv,
    /// `[0,1]²` over the drawing buffer, +v down.
    ScreenUv,
    /// The visible world rect at render time.
    Viewport,
}

/// 1×1 texture substituted for a missing mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    White,
    Black,
    Transparent,
    /// `(0.5, 0.5, 1.0)` tangent-space up.
    FlatNormal,
    /// `(0.5, 0.5, 0, 1)`: zero tangent, zero distance.
    NeutralFlow,
    /// Large single-channel distance so everything counts as far from roofs.
    FarDistance,
}

impl FallbackKind {
    /// RGBA8 texel for 8-bit fallbacks.
    pub fn rgba8(self) -> [u8; 4] {
        match self {
            FallbackKind::White | FallbackKind::FarDistance => [255, 255, 255, 255],
            FallbackKind::Black => [0, 0, 0, 255],
            FallbackKind::Transparent => [0, 0, 0, 0],
            FallbackKind::FlatNormal => [128, 128, 255, 255],
            FallbackKind::NeutralFlow => [128, 128, 0, 255],
        }
    }

    /// Value of the fallback in shader space, as the shader reads it.
    pub fn value(self) -> [f32; 4] {
        match self {
            FallbackKind::FarDistance => [FAR_DISTANCE_PX, 0.0, 0.0, 1.0],
            other => other.rgba8().map(|c| c as f32 / 255.0),
        }
    }
}

/// Distance (source pixels) reported by the roof-distance fallback.
pub const FAR_DISTANCE_PX: f32 = 60000.0;

/// Registry entry.
#[derive(Debug, Clone)]
pub struct MaskEntry<T> {
    pub id: MaskId,
    pub texture: Option<T>,
    pub color_space: ColorSpace,
    pub width: u32,
    pub height: u32,
    pub flip_y: bool,
    pub coverage: CoverageSpace,
    /// Bumped on every publish of this id.
    pub generation: u64,
}

impl<T> MaskEntry<T> {
    pub fn new(id: MaskId, texture: Option<T>, width: u32, height: u32) -> Self {
        Self {
            id,
            texture,
            color_space: ColorSpace::Linear,
            width,
            height,
            flip_y: false,
            coverage: CoverageSpace::SceneUv,
            generation: 0,
        }
    }

    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    pub fn with_coverage(mut self, coverage: CoverageSpace) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn with_flip_y(mut self, flip_y: bool) -> Self {
        self.flip_y = flip_y;
        self
    }

    pub fn is_present(&self) -> bool {
        self.texture.is_some() && self.width > 0 && self.height > 0
    }
}

/// Subscription handle returned by [`MaskRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber<T> = Box<dyn FnMut(&MaskEntry<T>)>;

/// Publish/subscribe store of named masks.
pub struct MaskRegistry<T> {
    entries: HashMap<MaskId, MaskEntry<T>>,
    subscribers: HashMap<MaskId, Vec<(SubscriptionId, Subscriber<T>)>>,
    next_subscription: u64,
    /// Ids already reported missing since the last scene load.
    reported_missing: HashSet<MaskId>,
}

impl<T> Default for MaskRegistry<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            subscribers: HashMap::new(),
            next_subscription: 0,
            reported_missing: HashSet::new(),
        }
    }
}

impl<T> fmt::Debug for MaskRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaskRegistry")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<T> MaskRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `entry`, bumping its generation, then notifies subscribers in
    /// registration order.
    pub fn publish(&mut self, mut entry: MaskEntry<T>) {
        let id = entry.id.clone();
        entry.generation = self
            .entries
            .get(&id)
            .map_or(1, |prev| prev.generation + 1);
        if entry.is_present() {
            self.reported_missing.remove(&id);
        }
        tracing::debug!(
            mask = %id,
            width = entry.width,
            height = entry.height,
            present = entry.is_present(),
            "mask published"
        );
        self.entries.insert(id.clone(), entry);
        self.notify(&id);
    }

    /// Publishes a null texture for `id`.
    pub fn unpublish(&mut self, id: &MaskId) {
        if self.entries.contains_key(id) {
            self.publish(MaskEntry::new(id.clone(), None, 0, 0));
        }
    }

    pub fn get(&self, id: &MaskId) -> Option<&MaskEntry<T>> {
        self.entries.get(id)
    }

    /// The texture for `id` when present.
    pub fn texture(&self, id: &MaskId) -> Option<&T> {
        self.entries
            .get(id)
            .filter(|e| e.is_present())
            .and_then(|e| e.texture.as_ref())
    }

    pub fn generation(&self, id: &MaskId) -> u64 {
        self.entries.get(id).map_or(0, |e| e.generation)
    }

    /// Registers a callback invoked synchronously on every publish of `id`.
    pub fn subscribe(
        &mut self,
        id: MaskId,
        callback: impl FnMut(&MaskEntry<T>) + 'static,
    ) -> SubscriptionId {
        self.next_subscription += 1;
        let sub = SubscriptionId(self.next_subscription);
        self.subscribers
            .entry(id)
            .or_default()
            .push((sub, Box::new(callback)));
        sub
    }

    /// Removes a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, sub: SubscriptionId) -> bool {
        for list in self.subscribers.values_mut() {
            if let Some(pos) = list.iter().position(|(s, _)| *s == sub) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.values().map(Vec::len).sum()
    }

    /// Returns true the first time `id` is reported missing since the last
    /// [`Self::clear`] or successful publish.
    pub fn report_missing(&mut self, id: &MaskId) -> bool {
        let first = self.reported_missing.insert(id.clone());
        if first {
            tracing::warn!(mask = %id, fallback = ?id.fallback(), "missing asset, using fallback");
        }
        first
    }

    /// Drops every entry (scene unload). Subscriptions survive.
    pub fn clear(&mut self) {
        let ids: Vec<MaskId> = self.entries.keys().cloned().collect();
        for id in &ids {
            self.unpublish(id);
        }
        self.entries.clear();
        self.reported_missing.clear();
    }

    fn notify(&mut self, id: &MaskId) {
        let Some(entry) = self.entries.get(id) else {
            return;
        };
        if let Some(list) = self.subscribers.get_mut(id) {
            for (_, callback) in list.iter_mut() {
                callback(entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_fallback_mapping() {
        assert_eq!(MaskId::ALBEDO.fallback(), FallbackKind::White);
        assert_eq!(MaskId::SPECULAR.fallback(), FallbackKind::Black);
        assert_eq!(MaskId::OUTDOORS.fallback(), FallbackKind::White);
        assert_eq!(MaskId::WINDOWS.fallback(), FallbackKind::Black);
        assert_eq!(MaskId::NORMAL.fallback(), FallbackKind::FlatNormal);
        assert_eq!(MaskId::CLOUD_SHADOW_SCREEN.fallback(), FallbackKind::White);
        assert_eq!(
            MaskId::WINDOW_LIGHT_SCREEN.fallback(),
            FallbackKind::Transparent
        );
        assert_eq!(MaskId::RAIN_FLOW_MAP.fallback(), FallbackKind::NeutralFlow);
        assert_eq!(MaskId::new("custom").fallback(), FallbackKind::Black);
        assert_eq!(FallbackKind::White.value(), [1.0; 4]);
        assert_eq!(FallbackKind::Black.value(), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(FallbackKind::FarDistance.value()[0], FAR_DISTANCE_PX);
    }

    #[test]
    fn test_publish_notifies_and_bumps_generation() {
        let mut reg: MaskRegistry<u32> = MaskRegistry::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        reg.subscribe(MaskId::OUTDOORS, move |e| {
            sink.borrow_mut().push((e.texture, e.generation))
        });

        reg.publish(MaskEntry::new(MaskId::OUTDOORS, Some(7), 64, 64));
        reg.publish(MaskEntry::new(MaskId::OUTDOORS, Some(8), 64, 64));
        reg.publish(MaskEntry::new(MaskId::WINDOWS, Some(9), 64, 64));

        assert_eq!(*seen.borrow(), vec![(Some(7), 1), (Some(8), 2)]);
        assert_eq!(reg.texture(&MaskId::OUTDOORS), Some(&8));
        assert_eq!(reg.generation(&MaskId::OUTDOORS), 2);
    }

    #[test]
    fn test_unsubscribe_stops_callbacks() {
        let mut reg: MaskRegistry<u32> = MaskRegistry::new();
        let hits = Rc::new(RefCell::new(0));
        let sink = hits.clone();
        let sub = reg.subscribe(MaskId::WINDOWS, move |_| *sink.borrow_mut() += 1);
        reg.publish(MaskEntry::new(MaskId::WINDOWS, Some(1), 1, 1));
        assert!(reg.unsubscribe(sub));
        assert!(!reg.unsubscribe(sub));
        reg.publish(MaskEntry::new(MaskId::WINDOWS, Some(2), 1, 1));
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(reg.subscriber_count(), 0);
    }

    #[test]
    fn test_null_publish_is_absent() {
        let mut reg: MaskRegistry<u32> = MaskRegistry::new();
        reg.publish(MaskEntry::new(MaskId::RAIN_FLOW_MAP, Some(3), 16, 16));
        reg.unpublish(&MaskId::RAIN_FLOW_MAP);
        assert!(reg.texture(&MaskId::RAIN_FLOW_MAP).is_none());
        assert!(reg.get(&MaskId::RAIN_FLOW_MAP).is_some());
        // Zero-area entries count as missing too.
        reg.publish(MaskEntry::new(MaskId::SPECULAR, Some(4), 0, 16));
        assert!(reg.texture(&MaskId::SPECULAR).is_none());
    }

    #[test]
    fn test_missing_reported_once_per_scene() {
        let mut reg: MaskRegistry<u32> = MaskRegistry::new();
        assert!(reg.report_missing(&MaskId::SPECULAR));
        assert!(!reg.report_missing(&MaskId::SPECULAR));
        reg.clear();
        assert!(reg.report_missing(&MaskId::SPECULAR));
    }
}

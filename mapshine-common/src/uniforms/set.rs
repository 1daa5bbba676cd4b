//! Per-pass material sets.
//!
//! Every material a pass creates (base plane, each tile overlay, the
//! light-only target) registers here. Environment, view and light updates
//! broadcast over the whole set; the GPU side drains the dirty list and
//! uploads only what changed.

use bytemuck::Pod;

use super::{
    CloudShadowMaterial, EnvironmentBlock, FogMaterial, LightBlock, SpecularMaterial, ViewBlock,
    WindowLightMaterial,
};
use crate::error::{EffectError, EffectResult};

/// Handle to one material in a [`UniformSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(u32);

impl MaterialId {
    pub fn index(self) -> u32 {
        self.0
    }
}

struct Slot<U> {
    id: MaterialId,
    value: U,
    dirty: bool,
}

/// Dense set of uniform records keyed by [`MaterialId`].
pub struct UniformSet<U: Pod> {
    slots: Vec<Slot<U>>,
    next_id: u32,
}

impl<U: Pod> Default for UniformSet<U> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            next_id: 0,
        }
    }
}

impl<U: Pod> UniformSet<U> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new material; it starts dirty.
    pub fn create(&mut self, initial: U) -> MaterialId {
        let id = MaterialId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.slots.push(Slot {
            id,
            value: initial,
            dirty: true,
        });
        id
    }

    pub fn dispose(&mut self, id: MaterialId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|s| s.id != id);
        self.slots.len() != before
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: MaterialId) -> bool {
        self.slots.iter().any(|s| s.id == id)
    }

    pub fn get(&self, id: MaterialId) -> Option<&U> {
        self.slots.iter().find(|s| s.id == id).map(|s| &s.value)
    }

    pub fn ids(&self) -> impl Iterator<Item = MaterialId> + '_ {
        self.slots.iter().map(|s| s.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MaterialId, &U)> {
        self.slots.iter().map(|s| (s.id, &s.value))
    }

    /// Mutates one material. On error the previous value is kept.
    pub fn update(
        &mut self,
        id: MaterialId,
        f: impl FnOnce(&mut U) -> EffectResult<()>,
    ) -> EffectResult<()> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(EffectError::HostNotReady("material"))?;
        let mut next = slot.value;
        f(&mut next)?;
        if bytemuck::bytes_of(&next) != bytemuck::bytes_of(&slot.value) {
            slot.value = next;
            slot.dirty = true;
        }
        Ok(())
    }

    /// Applies `f` to every material. Each material commits independently;
    /// failed ones keep their previous values and are returned.
    pub fn broadcast(
        &mut self,
        mut f: impl FnMut(&mut U) -> EffectResult<()>,
    ) -> Vec<(MaterialId, EffectError)> {
        let mut failed = Vec::new();
        for slot in &mut self.slots {
            let mut next = slot.value;
            match f(&mut next) {
                Ok(()) => {
                    if bytemuck::bytes_of(&next) != bytemuck::bytes_of(&slot.value) {
                        slot.value = next;
                        slot.dirty = true;
                    }
                }
                Err(err) => failed.push((slot.id, err)),
            }
        }
        failed
    }

    /// Returns and clears the ids whose records changed since the last drain.
    pub fn take_dirty(&mut self) -> Vec<MaterialId> {
        self.slots
            .iter_mut()
            .filter(|s| s.dirty)
            .map(|s| {
                s.dirty = false;
                s.id
            })
            .collect()
    }

    pub fn mark_all_dirty(&mut self) {
        for slot in &mut self.slots {
            slot.dirty = true;
        }
    }
}

/// Material records that carry the shared environment block.
pub trait WithEnvironment {
    fn environment_mut(&mut self) -> &mut EnvironmentBlock;
}

/// Material records that carry the shared view block.
pub trait WithView {
    fn view_mut(&mut self) -> &mut ViewBlock;
}

/// Material records that carry the dynamic light block.
pub trait WithLights {
    fn lights_mut(&mut self) -> &mut LightBlock;
}

macro_rules! impl_shared_blocks {
    ($($ty:ty),*) => {
        $(
            impl WithEnvironment for $ty {
                fn environment_mut(&mut self) -> &mut EnvironmentBlock {
                    &mut self.env
                }
            }

            impl WithView for $ty {
                fn view_mut(&mut self) -> &mut ViewBlock {
                    &mut self.view
                }
            }
        )*
    };
}

impl_shared_blocks!(
    SpecularMaterial,
    WindowLightMaterial,
    FogMaterial,
    CloudShadowMaterial
);

impl WithLights for SpecularMaterial {
    fn lights_mut(&mut self) -> &mut LightBlock {
        &mut self.lights
    }
}

impl<U: Pod + WithEnvironment> UniformSet<U> {
    pub fn broadcast_environment(&mut self, env: &EnvironmentBlock) {
        let failed = self.broadcast(|m| {
            *m.environment_mut() = *env;
            Ok(())
        });
        debug_assert!(failed.is_empty());
    }
}

impl<U: Pod + WithView> UniformSet<U> {
    pub fn broadcast_view(&mut self, view: &ViewBlock) {
        let failed = self.broadcast(|m| {
            *m.view_mut() = *view;
            Ok(())
        });
        debug_assert!(failed.is_empty());
    }
}

impl<U: Pod + WithLights> UniformSet<U> {
    pub fn broadcast_lights(&mut self, lights: &LightBlock) {
        let failed = self.broadcast(|m| {
            *m.lights_mut() = *lights;
            Ok(())
        });
        debug_assert!(failed.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lights::LightUniformArrays;
    use crate::uniforms::output_mode;

    #[test]
    fn test_create_dispose() {
        let mut set = UniformSet::<SpecularMaterial>::new();
        let a = set.create(SpecularMaterial::default());
        let b = set.create(SpecularMaterial::default());
        assert_ne!(a, b);
        assert_eq!(set.len(), 2);
        assert!(set.dispose(a));
        assert!(!set.dispose(a));
        assert!(set.get(a).is_none());
        assert!(set.contains(b));
    }

    #[test]
    fn test_light_fan_out_reaches_every_material() {
        let mut set = UniformSet::<SpecularMaterial>::new();
        let base = set.create(SpecularMaterial::default());
        let mut overlay = SpecularMaterial::default();
        overlay.pass.instance[0] = output_mode::TILE_OVERLAY;
        let tile = set.create(overlay);
        set.take_dirty();

        let arrays = LightUniformArrays {
            count: 1,
            position: vec![500.0, 1500.0, 0.0],
            color: vec![2.0, 1.0, 0.4],
            config: vec![200.0, 100.0, 0.5, 0.0],
        };
        set.broadcast_lights(&LightBlock::from_arrays(&arrays));

        for id in [base, tile] {
            let m = set.get(id).expect("material");
            assert_eq!(m.lights.count(), 1);
            assert_eq!(m.lights.position[0][..2], [500.0, 1500.0]);
            assert_eq!(m.lights.color[0][..3], [2.0, 1.0, 0.4]);
            assert_eq!(m.lights.config[0][..3], [200.0, 100.0, 0.5]);
        }
        // Overlay keeps its own routing.
        assert_eq!(
            set.get(tile).map(|m| m.pass.output_mode()),
            Some(output_mode::TILE_OVERLAY)
        );
        assert_eq!(set.take_dirty().len(), 2);
    }

    #[test]
    fn test_failed_broadcast_preserves_previous_values() {
        let mut set = UniformSet::<FogMaterial>::new();
        let a = set.create(FogMaterial::default());
        let b = set.create(FogMaterial::default());
        set.take_dirty();

        let failed = set.broadcast(|m| {
            m.pass.set_density(0.9);
            if m.pass.color[3] > 0.0 {
                m.pass.color[0] = f32::NAN;
                return Err(EffectError::InvalidUniform { name: "fogColor" });
            }
            Ok(())
        });
        assert_eq!(failed.len(), 2);
        for id in [a, b] {
            let m = set.get(id).expect("material");
            assert_eq!(m.pass.density(), 0.0);
            assert!(m.pass.color[0].is_finite());
        }
        assert!(set.take_dirty().is_empty());
    }

    #[test]
    fn test_unchanged_update_stays_clean() {
        let mut set = UniformSet::<CloudShadowMaterial>::new();
        let id = set.create(CloudShadowMaterial::default());
        set.take_dirty();
        set.broadcast_environment(&EnvironmentBlock::default());
        assert!(set.take_dirty().is_empty());
        set.update(id, |m| {
            m.pass.shape[0] = 3.0;
            Ok(())
        })
        .expect("update");
        assert_eq!(set.take_dirty(), vec![id]);
    }
}

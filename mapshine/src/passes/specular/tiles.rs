//! GPU state of per-tile specular overlays.
//!
//! [`TileOverlayBook`] owns the lifecycle, bands and transform sync; this
//! module adds one specular material and the tile's textures per overlay.
//! The occluder and the color mesh of a tile share the material, so both
//! resolve identical clip positions.

use std::sync::Arc;

use hashbrown::HashMap;
use mapshine_common::tiles::{OverlayMesh, OverlayState, TileOverlay};
use mapshine_common::uniforms::{MaterialId, SpecularMaterial, UniformSet, output_mode};
use mapshine_common::{BindOutcome, EffectResult, SpriteSnapshot, TileBinding, TileOverlayBook};

use crate::materials::GpuMaterialSet;
use crate::textures::GpuTexture;

/// Textures of a tile sprite.
#[derive(Debug, Clone)]
pub struct TileTextures {
    pub albedo: Arc<GpuTexture>,
    /// Tile-space specular mask; black fallback when absent.
    pub specular: Option<Arc<GpuTexture>>,
}

struct TileGpu {
    material: MaterialId,
    /// Cleared when the sprite's texture is swapped until the host
    /// supplies the new textures; the tile is not drawn meanwhile.
    textures: Option<TileTextures>,
}

/// A tile ready to draw this frame.
pub(super) struct TileDraw<'a> {
    pub material: MaterialId,
    pub textures: &'a TileTextures,
    pub depth_write: bool,
}

#[derive(Default)]
pub(super) struct TileOverlays {
    book: TileOverlayBook,
    gpu: HashMap<String, TileGpu>,
}

impl TileOverlays {
    pub fn bind(
        &mut self,
        device: &wgpu::Device,
        materials: &mut GpuMaterialSet<SpecularMaterial>,
        template: &SpecularMaterial,
        binding: TileBinding,
        textures: TileTextures,
    ) -> BindOutcome {
        let id = binding.id.clone();
        let outcome = self.book.bind(binding);
        let gpu = self.gpu.entry(id).or_insert_with(|| {
            let mut initial = *template;
            initial.pass.instance[0] = output_mode::TILE_OVERLAY;
            TileGpu {
                material: materials.create(device, initial),
                textures: None,
            }
        });
        gpu.textures = Some(textures);
        outcome
    }

    pub fn unbind(
        &mut self,
        materials: &mut GpuMaterialSet<SpecularMaterial>,
        id: &str,
    ) -> Option<TileOverlay> {
        if let Some(gpu) = self.gpu.remove(id) {
            materials.dispose(gpu.material);
        }
        self.book.unbind(id)
    }

    pub fn sync(&mut self, id: &str, sprite: &SpriteSnapshot) -> Option<BindOutcome> {
        let outcome = self.book.sync(id, sprite)?;
        if outcome == BindOutcome::Rebound
            && let Some(gpu) = self.gpu.get_mut(id)
        {
            tracing::debug!(tile = id, "tile texture swapped, awaiting new textures");
            gpu.textures = None;
        }
        Some(outcome)
    }

    /// Replaces a tile's textures. Returns false for unknown tiles.
    pub fn set_textures(&mut self, id: &str, textures: TileTextures) -> bool {
        match self.gpu.get_mut(id) {
            Some(gpu) => {
                gpu.textures = Some(textures);
                true
            }
            None => false,
        }
    }

    /// Writes each tile's transform, output mode and mask presence into its
    /// material. Tiles bind no roughness or normal map.
    pub fn write_materials(&self, set: &mut UniformSet<SpecularMaterial>) -> EffectResult<()> {
        for (id, gpu) in &self.gpu {
            let Some(overlay) = self.book.get(id) else {
                continue;
            };
            let has_specular = overlay.binding.has_specular_mask
                && gpu.textures.as_ref().is_some_and(|t| t.specular.is_some());
            let model = overlay.occluder.transform;
            set.update(gpu.material, |m| {
                m.pass.set_model(model);
                m.pass.instance[0] = output_mode::TILE_OVERLAY;
                m.pass.set_mask_presence(has_specular, false, false);
                Ok(())
            })?;
        }
        Ok(())
    }

    pub fn state(&self, id: &str) -> OverlayState {
        self.book.state(id)
    }

    /// Visible occluders in band order, skipping tiles without textures.
    pub fn occluder_draws(&self) -> Vec<TileDraw<'_>> {
        self.draws(self.book.occluder_draws())
    }

    /// Visible color meshes in band order, skipping tiles without textures.
    pub fn color_draws(&self) -> Vec<TileDraw<'_>> {
        self.draws(self.book.color_draws())
    }

    fn draws<'a>(
        &'a self,
        meshes: Vec<(&'a str, &'a OverlayMesh)>,
    ) -> Vec<TileDraw<'a>> {
        meshes
            .into_iter()
            .filter_map(|(id, mesh)| {
                let gpu = self.gpu.get(id)?;
                Some(TileDraw {
                    material: gpu.material,
                    textures: gpu.textures.as_ref()?,
                    depth_write: mesh.depth_write,
                })
            })
            .collect()
    }

    pub fn clear(&mut self, materials: &mut GpuMaterialSet<SpecularMaterial>) {
        for (_, gpu) in self.gpu.drain() {
            materials.dispose(gpu.material);
        }
        self.book.clear();
    }

    pub fn len(&self) -> usize {
        self.gpu.len()
    }
}

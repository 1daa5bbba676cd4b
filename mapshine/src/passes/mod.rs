//! The effect passes, in execution order:
//!
//! | pass | layer | priority |
//! |---|---|---|
//! | [`CloudShadowPass`] | Material | 0 |
//! | [`SpecularPass`] | Material | 10 |
//! | [`WindowLightPass`] | SurfaceEffects | 10 |
//! | [`FogPass`] | PostProcessing | 10 |

mod cloud_shadow;
mod fog;
mod specular;
mod window_light;

use std::sync::Arc;

use mapshine_common::{CoverageSpace, MaskId};

use crate::textures::{GpuTexture, MaskTextures};

pub use cloud_shadow::CloudShadowPass;
pub use fog::FogPass;
pub use specular::{SpecularPass, TileTextures};
pub use window_light::WindowLightPass;

/// Publishes `texture` under `id` unless the registry already holds it.
/// Republishing bumps the generation, so this only fires after creation,
/// resize or a registry clear.
fn ensure_published(
    masks: &mut MaskTextures,
    id: &MaskId,
    texture: &Arc<GpuTexture>,
    coverage: CoverageSpace,
) {
    let current = masks.registry.texture(id).map(|t| t.id);
    if current != Some(texture.id) {
        masks.publish(id.clone(), texture.clone(), coverage);
    }
}

/// Withdraws `id` if it still points at `texture`.
fn withdraw(masks: &mut MaskTextures, id: &MaskId, texture: &GpuTexture) {
    if masks.registry.texture(id).map(|t| t.id) == Some(texture.id) {
        masks.unpublish(id);
    }
}

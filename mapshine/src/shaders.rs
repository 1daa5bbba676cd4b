//! WGSL sources.
//!
//! Every pass shader is compiled as `common blocks + helpers + pass`, so
//! the shared structs and functions are defined exactly once.

const BLOCKS: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/shaders/common/blocks.wgsl"
));
const COLOR: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/shaders/common/color.wgsl"
));
const NOISE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/shaders/common/noise.wgsl"
));
const QUAD: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/shaders/common/quad.wgsl"
));

const SPECULAR: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/specular.wgsl"));
const TILE_OCCLUDER: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/shaders/tile_occluder.wgsl"
));
const WINDOW_LIGHT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/shaders/window_light.wgsl"
));
const FOG: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/fog.wgsl"));
const CLOUD_SHADOW: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/shaders/cloud_shadow.wgsl"
));
const BLIT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/blit.wgsl"));

/// Shader programs known to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Specular,
    TileOccluder,
    WindowLight,
    Fog,
    CloudShadow,
    Blit,
}

impl ShaderKind {
    pub const ALL: [ShaderKind; 6] = [
        ShaderKind::Specular,
        ShaderKind::TileOccluder,
        ShaderKind::WindowLight,
        ShaderKind::Fog,
        ShaderKind::CloudShadow,
        ShaderKind::Blit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ShaderKind::Specular => "Specular Shader",
            ShaderKind::TileOccluder => "Tile Occluder Shader",
            ShaderKind::WindowLight => "Window Light Shader",
            ShaderKind::Fog => "Fog Shader",
            ShaderKind::CloudShadow => "Cloud Shadow Shader",
            ShaderKind::Blit => "Blit Shader",
        }
    }

    /// Complete WGSL for this program.
    pub fn source(self) -> String {
        match self {
            ShaderKind::Specular => with_common(SPECULAR),
            ShaderKind::TileOccluder => with_common(TILE_OCCLUDER),
            ShaderKind::WindowLight => with_common(WINDOW_LIGHT),
            ShaderKind::Fog => with_common(FOG),
            ShaderKind::CloudShadow => with_common(CLOUD_SHADOW),
            // The blit has no uniforms; only the fullscreen helpers.
            ShaderKind::Blit => format!("{QUAD}\n{BLIT}"),
        }
    }
}

fn with_common(pass: &str) -> String {
    format!("{BLOCKS}\n{COLOR}\n{NOISE}\n{QUAD}\n{pass}")
}

/// Compiles `kind` into a shader module.
pub fn create_module(device: &wgpu::Device, kind: ShaderKind) -> wgpu::ShaderModule {
    tracing::debug!(shader = kind.label(), "compiling shader");
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(kind.label()),
        source: wgpu::ShaderSource::Wgsl(kind.source().into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_pass_sees_common_blocks() {
        for kind in ShaderKind::ALL {
            let src = kind.source();
            assert!(src.contains("fn fullscreen_clip"), "{kind:?}");
            if kind != ShaderKind::Blit {
                assert!(src.contains("struct ViewBlock"), "{kind:?}");
            }
        }
    }
}

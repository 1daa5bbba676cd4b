//! GPU-free core of the mapshine effect pipeline.
//!
//! Shared by the `mapshine` wgpu runtime and by tools that only need the
//! CPU side (derived-mask baking, config validation).
//!
//! # Modules
//!
//! - [`environment`] - weather/time snapshot and per-frame integrators
//! - [`scene`] - scene dimensions, cameras, coordinate conversions
//! - [`masks`] - named texture registry with publish/subscribe
//! - [`flow_field`] - distance field and relaxed flow field builders
//! - [`lights`] - dynamic light registry and host document merge
//! - [`tiles`] - per-tile specular overlay bookkeeping
//! - [`params`] - per-pass parameters and control schemas
//! - [`uniforms`] - GPU uniform layouts and material sets
//! - [`shading`] - CPU reference of the shader math
//! - [`store`] - persisted per-scene enhancement data (read only)

pub mod color;
pub mod environment;
pub mod error;
pub mod flow_field;
pub mod lights;
pub mod masks;
pub mod math;
pub mod params;
pub mod scene;
pub mod shading;
pub mod store;
pub mod tiles;
pub mod uniforms;

pub use environment::{EnvironmentSnapshot, ScaledClock, SmoothedWind, WindAccumulator};
pub use error::{EffectError, EffectResult, LogThrottle};
pub use flow_field::{FlowField, FlowFieldCache, FlowFieldKey, FlowFieldParams, SourceMask};
pub use lights::{AddOutcome, LightRecord, LightRegistry, LightUniformArrays, MAX_LIGHTS};
pub use masks::{
    ColorSpace, CoverageSpace, FallbackKind, MaskEntry, MaskId, MaskRegistry, SubscriptionId,
};
pub use params::{
    CloudShadowParams, ControlSchema, FogParams, ParamGroup, ParamSpec, PassParams,
    SpecularParams, StripeBlendMode, WindowLightParams,
};
pub use scene::{Camera, SceneDimensions, ViewState};
pub use store::EnhancementStore;
pub use tiles::{BindOutcome, OverlayState, SpriteSnapshot, TileBinding, TileOverlayBook};

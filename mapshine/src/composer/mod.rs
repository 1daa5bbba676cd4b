//! Pipeline composer: owns the scene targets and runs every pass in
//! `(layer, priority)` order.
//!
//! Each frame:
//! 1. Clear the current scene target and depth.
//! 2. For every registered pass, in order, call `update`; if the pass is
//!    enabled (or always renders), call `render`.
//! 3. Material and surface passes draw into the current target; each
//!    post-processing pass reads it, writes the other target, and the two
//!    swap.
//! 4. Submit once.

pub mod blit;
pub mod targets;

use std::sync::Arc;

use glam::UVec2;
use hashbrown::HashMap;
use mapshine_common::{ControlSchema, EffectResult, LogThrottle};

use crate::gpu::read_rgba8;
use crate::pass::{EffectPass, FrameState, PassContext, PassTargets};
use crate::textures::{GpuTexture, MaskTextures};
use blit::Presenter;
use targets::SceneTargets;

/// Format of the readback output; the blit encodes to sRGB.
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

pub struct Composer {
    passes: Vec<Box<dyn EffectPass>>,
    targets: SceneTargets,
    presenter: Presenter,
    output: Option<Arc<GpuTexture>>,
    throttles: HashMap<&'static str, LogThrottle>,
    frames: u64,
}

impl Composer {
    pub fn new(device: &wgpu::Device, size: UVec2, format: wgpu::TextureFormat) -> Self {
        Self {
            passes: Vec::new(),
            targets: SceneTargets::new(device, size, format),
            presenter: Presenter::new(device, OUTPUT_FORMAT),
            output: None,
            throttles: HashMap::new(),
            frames: 0,
        }
    }

    /// Registers a pass. Ties on `(layer, priority)` keep registration order.
    pub fn add_pass(&mut self, pass: Box<dyn EffectPass>) {
        let key = (pass.layer(), pass.priority());
        let index = self
            .passes
            .partition_point(|p| (p.layer(), p.priority()) <= key);
        tracing::info!(
            pass = pass.name(),
            layer = ?key.0,
            priority = key.1,
            "pass registered"
        );
        self.passes.insert(index, pass);
    }

    /// Pass names in execution order.
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn pass_mut<T: EffectPass>(&mut self) -> Option<&mut T> {
        self.passes
            .iter_mut()
            .find_map(|p| p.as_any_mut().downcast_mut::<T>())
    }

    /// Enables or disables a pass by name. Returns false if no pass matched.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.passes.iter_mut().find(|p| p.name() == name) {
            Some(pass) => {
                pass.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.passes
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.enabled())
    }

    pub fn control_schemas(&self) -> Vec<ControlSchema> {
        self.passes.iter().map(|p| p.control_schema()).collect()
    }

    pub fn size(&self) -> UVec2 {
        self.targets.size()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn on_resize(&mut self, device: &wgpu::Device, masks: &mut MaskTextures, size: UVec2) {
        if !self.targets.resize(device, size) {
            return;
        }
        self.output = None;
        for pass in &mut self.passes {
            pass.on_resize(device, masks, self.targets.size());
        }
    }

    /// Runs one frame of the whole stack.
    pub fn frame(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        masks: &mut MaskTextures,
        frame: &FrameState,
    ) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Mapshine Frame Encoder"),
        });
        self.targets.clear(&mut encoder);
        let size = self.targets.size();

        for pass in &mut self.passes {
            let name = pass.name();
            let mut ctx = PassContext {
                device,
                queue,
                masks: &mut *masks,
                frame,
            };

            if let Err(err) = pass.update(&mut ctx) {
                self.throttles.entry(name).or_default().warn(name, &err);
            }
            if !pass.enabled() && !pass.always_renders() {
                continue;
            }

            let post = pass.layer().is_post();
            let read = self.targets.read().clone();
            let write = self.targets.write().clone();
            let targets = PassTargets {
                scene: &read,
                output: post.then_some(&*write),
                depth: self.targets.depth_view(),
                size,
            };
            match pass.render(&mut ctx, &mut encoder, &targets) {
                Ok(()) if post => self.targets.swap(),
                Ok(()) => {}
                Err(err) => self.throttles.entry(name).or_default().warn(name, &err),
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
        self.frames += 1;
    }

    /// The target holding the composed frame.
    pub fn scene_color(&self) -> &Arc<GpuTexture> {
        self.targets.read()
    }

    /// Blits the composed frame into a host view of the presenter format.
    pub fn present(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, view: &wgpu::TextureView) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Mapshine Present Encoder"),
        });
        let source = self.targets.read().clone();
        self.presenter.blit(device, &mut encoder, &source, view);
        queue.submit(std::iter::once(encoder.finish()));
        self.presenter.end_frame();
    }

    /// Presents into an internal sRGB texture and reads it back as
    /// tightly packed RGBA8 rows.
    pub fn read_output(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> EffectResult<Vec<u8>> {
        let size = self.targets.size();
        let output = self
            .output
            .get_or_insert_with(|| {
                Arc::new(GpuTexture::render_target(
                    device,
                    "Mapshine Output",
                    size.x,
                    size.y,
                    OUTPUT_FORMAT,
                ))
            })
            .clone();
        self.present(device, queue, &output.view);
        read_rgba8(device, queue, &output.texture)
    }

    /// Disposes every pass; published masks are withdrawn.
    pub fn dispose(&mut self, masks: &mut MaskTextures) {
        for pass in &mut self.passes {
            pass.dispose(masks);
        }
        self.passes.clear();
        self.output = None;
    }
}

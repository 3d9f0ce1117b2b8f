//! Frame orchestration.
//!
//! [`FrameRenderer`] runs one dispatch → accumulate → present cycle.
//! [`PathTracer`] wires it to the registry, scene buffers, accumulation
//! controller and parameter binder, and owns the activation lifecycle:
//!
//! ```text
//! activate()           reset samples, scatter spheres
//! frame(inputs, out)   camera/reset checks → rebuild_if_dirty → bind → render
//! deactivate()         release geometry buffers and render targets
//! ```

use glam::Mat4;

use crate::accumulation::{AccumulationController, ResetReason};
use crate::gpu::ComputeBackend;
use crate::params::{CameraState, DirectionalLight, Lens, ParameterBinder};
use crate::scene::{RegistryHandle, ScatterParams, SceneBufferManager, SceneObjectRegistry, SceneVariant};
use crate::settings::TracerSettings;
use crate::Result;

/// What happened during one [`FrameRenderer::render_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub width: u32,
    pub height: u32,
    pub groups: (u32, u32, u32),
    /// Weight the working target was blended with.
    pub weight: f32,
    /// Sample count after this frame.
    pub sample_count: u32,
    pub targets_recreated: bool,
}

/// Dispatches the tracing program and composites its output.
#[derive(Debug, Default)]
pub struct FrameRenderer {
    frames_rendered: u64,
}

impl FrameRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Render one frame into `surface`.
    ///
    /// Returns `None` for a zero-sized surface (e.g. minimized window);
    /// nothing is dispatched then.
    pub fn render_frame<K: ComputeBackend>(
        &mut self,
        backend: &mut K,
        accumulation: &mut AccumulationController<K::Target>,
        surface: &K::Surface,
    ) -> Result<Option<FrameStats>> {
        let (width, height) = backend.surface_size(surface);
        if width == 0 || height == 0 {
            return Ok(None);
        }

        let targets_recreated = accumulation.ensure_targets(backend, width, height)?;
        let weight = accumulation.blend_weight();
        let groups = trace_layout::dispatch_groups(width, height);
        {
            let (working, converged) = accumulation
                .targets()
                .ok_or(crate::Error::MissingResource("render targets"))?;
            backend.dispatch(&working.target, groups)?;
            backend.accumulate(&working.target, &converged.target, weight)?;
            backend.present(&converged.target, surface)?;
        }
        backend.submit()?;
        accumulation.advance();
        self.frames_rendered += 1;

        Ok(Some(FrameStats {
            width,
            height,
            groups,
            weight,
            sample_count: accumulation.sample_count(),
            targets_recreated,
        }))
    }
}

/// Per-frame inputs supplied by the host application.
pub struct FrameInputs<'a, T> {
    pub camera: &'a CameraState,
    pub light: &'a DirectionalLight,
    pub lens: &'a Lens,
    pub skybox: &'a T,
}

/// Complete progressive path tracer over a [`ComputeBackend`].
pub struct PathTracer<K: ComputeBackend> {
    backend: K,
    registry: RegistryHandle,
    buffers: SceneBufferManager<K::Buffer>,
    accumulation: AccumulationController<K::Target>,
    binder: ParameterBinder,
    renderer: FrameRenderer,
    scatter: ScatterParams,
    active: bool,
}

impl<K: ComputeBackend> PathTracer<K> {
    pub fn new(backend: K, settings: &TracerSettings) -> Self {
        Self::with_binder(backend, settings, ParameterBinder::new(settings.variant))
    }

    /// Use a specific binder, e.g. one with a fixed jitter seed.
    pub fn with_binder(backend: K, settings: &TracerSettings, binder: ParameterBinder) -> Self {
        Self {
            backend,
            registry: SceneObjectRegistry::shared(),
            buffers: SceneBufferManager::new(settings.variant),
            accumulation: AccumulationController::new(settings.temporal_average),
            binder,
            renderer: FrameRenderer::new(),
            scatter: settings.scatter_params(),
            active: false,
        }
    }

    /// Scene activation: reset accumulation and scatter the spheres.
    pub fn activate(&mut self) -> Result<usize> {
        self.accumulation.reset_samples(ResetReason::Activated);
        let placed = self.buffers.set_up_scene(&mut self.backend, &self.scatter)?;
        self.active = true;
        Ok(placed)
    }

    /// Scene deactivation: release every GPU resource this tracer owns.
    pub fn deactivate(&mut self) {
        self.buffers.release(&mut self.backend);
        self.accumulation.release(&mut self.backend);
        // Registered meshes survive; rebuild them on the next activation.
        self.registry.lock().mark_dirty();
        self.active = false;
        tracing::info!("tracer deactivated, GPU resources released");
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Run one full frame.
    pub fn frame(&mut self, inputs: &FrameInputs<'_, K::Texture>, surface: &K::Surface) -> Result<Option<FrameStats>> {
        if !self.active {
            self.activate()?;
        }
        self.accumulation.begin_frame(&inputs.camera.camera_to_world);

        let rebuilt = {
            let mut registry = self.registry.lock();
            self.buffers.rebuild_if_dirty(&mut self.backend, &mut registry)?
        };
        if rebuilt {
            self.accumulation.reset_samples(ResetReason::SceneRebuilt);
        }

        self.binder.bind_frame_parameters(
            &mut self.backend,
            inputs.camera,
            inputs.light,
            inputs.lens,
            inputs.skybox,
            &self.buffers,
        );

        self.renderer.render_frame(&mut self.backend, &mut self.accumulation, surface)
    }

    /// One-shot accumulation reset on the next frame.
    pub fn request_reset(&mut self) {
        self.accumulation.request_reset();
    }

    pub fn set_temporal_average(&mut self, enabled: bool) {
        self.accumulation.set_temporal_average(enabled);
    }

    /// Detect camera motion outside of `frame` (resets immediately).
    pub fn observe_camera(&mut self, camera_to_world: &Mat4) -> bool {
        self.accumulation.observe_camera(camera_to_world)
    }

    pub fn sample_count(&self) -> u32 {
        self.accumulation.sample_count()
    }

    /// Shared registry; clone it to register meshes from other threads.
    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    pub fn buffers(&self) -> &SceneBufferManager<K::Buffer> {
        &self.buffers
    }

    pub fn accumulation(&self) -> &AccumulationController<K::Target> {
        &self.accumulation
    }

    pub fn variant(&self) -> SceneVariant {
        self.buffers.variant()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.renderer.frames_rendered()
    }

    pub fn backend(&self) -> &K {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut K {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::{Event, RecordedSurface, RecordedTexture, RecordingBackend};

    #[test]
    fn test_render_frame_event_order() {
        let mut backend = RecordingBackend::new();
        let mut acc = AccumulationController::new(true);
        let mut renderer = FrameRenderer::new();
        backend.bind_texture(&RecordedTexture::default());

        let stats = renderer
            .render_frame(&mut backend, &mut acc, &RecordedSurface::new(20, 10))
            .unwrap()
            .unwrap();
        assert_eq!(stats.groups, (3, 2, 1));
        assert_eq!(stats.weight, 1.0);
        assert_eq!(stats.sample_count, 1);
        assert!(stats.targets_recreated);

        let tail: Vec<_> = backend
            .events()
            .iter()
            .filter(|e| !matches!(e, Event::CreateTarget { .. }))
            .cloned()
            .collect();
        assert!(matches!(tail[0], Event::Dispatch { groups: (3, 2, 1), .. }));
        assert_eq!(tail[1], Event::Accumulate { weight: 1.0 });
        assert_eq!(tail[2], Event::Present { width: 20, height: 10 });
        assert_eq!(tail[3], Event::Submit);
    }

    #[test]
    fn test_zero_size_surface_skips() {
        let mut backend = RecordingBackend::new();
        let mut acc = AccumulationController::new(true);
        let mut renderer = FrameRenderer::new();
        let out = renderer
            .render_frame(&mut backend, &mut acc, &RecordedSurface::new(0, 600))
            .unwrap();
        assert!(out.is_none());
        assert!(backend.events().is_empty());
    }

    #[test]
    fn test_weights_follow_running_average() {
        let mut backend = RecordingBackend::new();
        let mut acc = AccumulationController::new(true);
        let mut renderer = FrameRenderer::new();
        backend.bind_texture(&RecordedTexture::default());
        let surface = RecordedSurface::new(16, 16);
        for _ in 0..4 {
            renderer.render_frame(&mut backend, &mut acc, &surface).unwrap();
        }
        assert_eq!(backend.accumulate_weights(), vec![1.0, 0.5, 1.0 / 3.0, 0.25]);
    }
}

//! # Progressive Tracer
//!
//! Host side of a GPU progressive path tracer. The tracing itself runs in a
//! compute program; this crate packs the scene into storage buffers, binds
//! the per-frame parameters, dispatches the program over 8×8 tiles and
//! keeps a running average of the frames so the image converges while the
//! camera holds still.
//!
//! ## Modules
//!
//! - [`scene`] - Object registry, sphere scattering and scene buffers
//! - [`accumulation`] - Sample counter, reset triggers and render targets
//! - [`params`] - Camera, light and lens parameters bound each frame
//! - [`renderer`] - Frame loop and the [`PathTracer`] orchestrator
//! - [`gpu`] - Backend seam with wgpu and CPU recording implementations
//! - [`environment`] - Skybox image loading
//! - [`settings`] - Persistent settings
//!
//! ## Example
//!
//! ```ignore
//! use progressive_tracer::prelude::*;
//!
//! let (device, queue) = request_headless_device()?;
//! let backend = WgpuBackend::new(device, queue, &program_wgsl, wgpu::TextureFormat::Rgba8Unorm);
//! let mut tracer = PathTracer::new(backend, &TracerSettings::default());
//! tracer.registry().lock().register(Arc::new(RenderableMesh::cube("box", Mat4::IDENTITY)));
//!
//! for _ in 0..64 {
//!     tracer.frame(&inputs, &surface)?;
//! }
//! ```

pub mod accumulation;
pub mod environment;
pub mod error;
pub mod gpu;
pub mod params;
pub mod renderer;
pub mod scene;
pub mod settings;

pub use error::{Error, Result};
pub use renderer::{FrameInputs, FrameRenderer, FrameStats, PathTracer};
pub use settings::TracerSettings;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::accumulation::{AccumulationController, AccumulationState, ResetReason};
    pub use crate::environment::SkyboxTexture;
    pub use crate::gpu::recording::{RecordedSurface, RecordedTexture, RecordingBackend};
    pub use crate::gpu::wgpu_backend::{request_headless_device, OutputSurface, WgpuBackend};
    pub use crate::gpu::{BufferBinding, ComputeBackend};
    pub use crate::params::{CameraState, DirectionalLight, Lens, ParameterBinder};
    pub use crate::renderer::{FrameInputs, FrameStats, PathTracer};
    pub use crate::scene::{Renderable, RenderableMesh, ScatterParams, SceneObjectRegistry, SceneVariant};
    pub use crate::settings::TracerSettings;
    pub use crate::{Error, Result};
}

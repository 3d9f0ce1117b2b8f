//! Progressive accumulation state.
//!
//! Owns the working target (written by the tracing program) and the
//! converged target (running average), and the sample counter that weights
//! each new frame by `1 / (samples + 1)`.

use glam::Mat4;

use crate::gpu::{ComputeBackend, TargetRole};
use crate::Result;

/// Largest per-element camera matrix delta treated as "not moved".
const CAMERA_EPS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulationState {
    /// No targets allocated yet (or released).
    Uninitialized,
    /// Both targets exist at the current output size.
    Ready,
}

/// Why the sample counter went back to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    CameraMoved,
    Requested,
    TemporalAverageOff,
    TargetsRecreated,
    SceneRebuilt,
    Activated,
}

/// A render target with the size it was allocated at.
#[derive(Debug)]
pub struct RenderTarget<T> {
    pub target: T,
    pub width: u32,
    pub height: u32,
}

pub struct AccumulationController<T> {
    working: Option<RenderTarget<T>>,
    converged: Option<RenderTarget<T>>,
    sample_count: u32,
    temporal_average: bool,
    reset_requested: bool,
    last_camera: Option<Mat4>,
}

impl<T> AccumulationController<T> {
    pub fn new(temporal_average: bool) -> Self {
        Self {
            working: None,
            converged: None,
            sample_count: 0,
            temporal_average,
            reset_requested: false,
            last_camera: None,
        }
    }

    pub fn state(&self) -> AccumulationState {
        if self.working.is_some() && self.converged.is_some() {
            AccumulationState::Ready
        } else {
            AccumulationState::Uninitialized
        }
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Blend weight of the next composited frame.
    pub fn blend_weight(&self) -> f32 {
        1.0 / (self.sample_count as f32 + 1.0)
    }

    pub fn temporal_average(&self) -> bool {
        self.temporal_average
    }

    /// Enable/disable temporal averaging. Disabling resets immediately.
    pub fn set_temporal_average(&mut self, enabled: bool) {
        self.temporal_average = enabled;
        if !enabled {
            self.reset_samples(ResetReason::TemporalAverageOff);
        }
    }

    pub fn reset_samples(&mut self, reason: ResetReason) {
        if self.sample_count != 0 {
            tracing::debug!("accumulation reset after {} samples ({reason:?})", self.sample_count);
        }
        self.sample_count = 0;
    }

    /// Ask for a one-shot reset at the start of the next frame.
    pub fn request_reset(&mut self) {
        self.reset_requested = true;
    }

    /// Reset immediately if the camera transform moved since the last call.
    ///
    /// Returns true if a change was detected.
    pub fn observe_camera(&mut self, camera_to_world: &Mat4) -> bool {
        let changed = match &self.last_camera {
            Some(prev) => !prev.abs_diff_eq(*camera_to_world, CAMERA_EPS),
            None => true,
        };
        self.last_camera = Some(*camera_to_world);
        if changed {
            self.reset_samples(ResetReason::CameraMoved);
        }
        changed
    }

    /// Per-frame bookkeeping before rendering: camera check, pending reset
    /// requests, and the disabled-averaging hold.
    pub fn begin_frame(&mut self, camera_to_world: &Mat4) {
        self.observe_camera(camera_to_world);
        if std::mem::take(&mut self.reset_requested) {
            self.reset_samples(ResetReason::Requested);
        }
        if !self.temporal_average {
            self.reset_samples(ResetReason::TemporalAverageOff);
        }
    }

    /// Count one composited frame.
    pub fn advance(&mut self) {
        if self.temporal_average {
            self.sample_count = self.sample_count.saturating_add(1);
        }
    }

    /// Make both targets match `width × height`, recreating stale ones.
    ///
    /// Returns true if anything was (re)allocated; samples are reset then.
    pub fn ensure_targets<K>(&mut self, backend: &mut K, width: u32, height: u32) -> Result<bool>
    where
        K: ComputeBackend<Target = T>,
    {
        let recreated_working = ensure_target(backend, &mut self.working, TargetRole::Working, width, height)?;
        let recreated_converged = ensure_target(backend, &mut self.converged, TargetRole::Converged, width, height)?;
        let recreated = recreated_working || recreated_converged;
        if recreated {
            tracing::info!("render targets (re)created at {width}x{height}");
            self.reset_samples(ResetReason::TargetsRecreated);
        }
        Ok(recreated)
    }

    pub fn working(&self) -> Option<&RenderTarget<T>> {
        self.working.as_ref()
    }

    pub fn converged(&self) -> Option<&RenderTarget<T>> {
        self.converged.as_ref()
    }

    /// Both targets, if allocated.
    pub fn targets(&self) -> Option<(&RenderTarget<T>, &RenderTarget<T>)> {
        self.working.as_ref().zip(self.converged.as_ref())
    }

    /// Release both targets (teardown).
    pub fn release<K>(&mut self, backend: &mut K)
    where
        K: ComputeBackend<Target = T>,
    {
        if let Some(rt) = self.working.take() {
            backend.release_target(TargetRole::Working, rt.target);
        }
        if let Some(rt) = self.converged.take() {
            backend.release_target(TargetRole::Converged, rt.target);
        }
        self.sample_count = 0;
        self.last_camera = None;
    }
}

fn ensure_target<K: ComputeBackend>(
    backend: &mut K,
    slot: &mut Option<RenderTarget<K::Target>>,
    role: TargetRole,
    width: u32,
    height: u32,
) -> Result<bool> {
    let needs_recreate = match slot {
        Some(rt) => (rt.width, rt.height) != (width, height),
        None => true,
    };
    if !needs_recreate {
        return Ok(false);
    }
    if let Some(stale) = slot.take() {
        backend.release_target(role, stale.target);
    }
    let target = backend.create_target(role, width, height)?;
    *slot = Some(RenderTarget { target, width, height });
    Ok(true)
}

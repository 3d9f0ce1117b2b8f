//! Per-frame parameters for the tracing program.

use glam::{Mat4, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trace_layout::FrameUniform;

use crate::gpu::{BufferBinding, ComputeBackend};
use crate::scene::{SceneBufferManager, SceneVariant};

/// Aperture range accepted by the lens model.
pub const APERTURE_RANGE: (f32, f32) = (1.0, 16.0);
/// Focus distance range accepted by the lens model.
pub const FOCUS_DISTANCE_RANGE: (f32, f32) = (0.0, 20.0);

/// Camera pose and projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub camera_to_world: Mat4,
    pub projection: Mat4,
}

impl CameraState {
    /// Right-handed camera at `eye` looking at `target`.
    pub fn look_at(eye: Vec3, target: Vec3, fov_y_degrees: f32, aspect: f32) -> Self {
        let view = Mat4::look_at_rh(eye, target, Vec3::Y);
        Self {
            camera_to_world: view.inverse(),
            projection: Mat4::perspective_rh(fov_y_degrees.to_radians(), aspect, 0.3, 1000.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels in.
    pub forward: Vec3,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            forward: Vec3::new(-0.3, -1.0, 0.4).normalize(),
            intensity: 1.0,
        }
    }
}

impl DirectionalLight {
    /// `_DirectionalLight` packing: xyz = forward, w = intensity.
    pub fn packed(&self) -> [f32; 4] {
        self.forward.extend(self.intensity).to_array()
    }
}

/// Depth-of-field lens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lens {
    pub aperture: f32,
    pub focus_distance: f32,
}

impl Default for Lens {
    fn default() -> Self {
        Self {
            aperture: 16.0,
            focus_distance: 5.0,
        }
    }
}

impl Lens {
    pub fn new(aperture: f32, focus_distance: f32) -> Self {
        Self {
            aperture: aperture.clamp(APERTURE_RANGE.0, APERTURE_RANGE.1),
            focus_distance: focus_distance.clamp(FOCUS_DISTANCE_RANGE.0, FOCUS_DISTANCE_RANGE.1),
        }
    }
}

/// Gathers camera/light/lens state and pushes it to the program each frame.
pub struct ParameterBinder {
    rng: StdRng,
    variant: SceneVariant,
}

impl ParameterBinder {
    pub fn new(variant: SceneVariant) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            variant,
        }
    }

    /// Binder with a reproducible jitter/seed stream.
    pub fn with_seed(variant: SceneVariant, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            variant,
        }
    }

    /// Push all frame parameters and (re)bind the geometry buffers.
    ///
    /// Absent buffers are unbound so the program sees a zero primitive count
    /// for them. Returns the uniform block that was uploaded.
    pub fn bind_frame_parameters<K: ComputeBackend>(
        &mut self,
        backend: &mut K,
        camera: &CameraState,
        light: &DirectionalLight,
        lens: &Lens,
        skybox: &K::Texture,
        buffers: &SceneBufferManager<K::Buffer>,
    ) -> FrameUniform {
        let (aperture, focus_distance) = if self.variant.has_lens() {
            (lens.aperture, lens.focus_distance)
        } else {
            (0.0, 0.0)
        };

        let uniform = FrameUniform {
            camera_to_world: camera.camera_to_world.to_cols_array_2d(),
            camera_inverse_projection: camera.projection.inverse().to_cols_array_2d(),
            directional_light: light.packed(),
            pixel_offset: [self.rng.gen(), self.rng.gen()],
            seed: self.rng.gen(),
            aperture,
            focus_distance,
            sphere_count: buffers.slot(BufferBinding::Spheres).count() as u32,
            mesh_object_count: buffers.slot(BufferBinding::MeshObjects).count() as u32,
            _pad: 0,
        };

        backend.set_uniform(&uniform);
        backend.bind_texture(skybox);
        for binding in BufferBinding::ALL {
            match buffers.slot(binding).buffer() {
                Some(buffer) => backend.bind_buffer(binding, buffer),
                None => backend.unbind_buffer(binding),
            }
        }
        uniform
    }
}

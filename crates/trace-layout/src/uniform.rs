//! Per-frame uniform block.

use bytemuck::{Pod, Zeroable};

/// Frame parameters read by the tracing program (176 bytes).
///
/// Names follow the program's parameter names: `_CameraToWorld`,
/// `_CameraInverseProjection`, `_DirectionalLight`, `_PixelOffset`, `_Seed`,
/// `_Aperature`, `_FocusDist`. The primitive counts let the program skip
/// geometry whose buffer is absent (a placeholder is bound instead).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameUniform {
    pub camera_to_world: [[f32; 4]; 4],
    pub camera_inverse_projection: [[f32; 4]; 4],
    /// xyz = light forward direction, w = intensity
    pub directional_light: [f32; 4],
    /// Subpixel jitter in [0, 1)
    pub pixel_offset: [f32; 2],
    pub seed: f32,
    pub aperture: f32,
    pub focus_distance: f32,
    pub sphere_count: u32,
    pub mesh_object_count: u32,
    pub _pad: u32,
}

impl Default for FrameUniform {
    fn default() -> Self {
        Self {
            camera_to_world: glam::Mat4::IDENTITY.to_cols_array_2d(),
            camera_inverse_projection: glam::Mat4::IDENTITY.to_cols_array_2d(),
            directional_light: [0.0, -1.0, 0.0, 1.0],
            pixel_offset: [0.5, 0.5],
            seed: 0.0,
            aperture: 0.0,
            focus_distance: 0.0,
            sphere_count: 0,
            mesh_object_count: 0,
            _pad: 0,
        }
    }
}

/// Weight of the running-average pass (16 bytes, uniform-aligned).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BlendUniform {
    pub weight: f32,
    pub _pad: [f32; 3],
}

impl BlendUniform {
    pub fn new(weight: f32) -> Self {
        Self { weight, _pad: [0.0; 3] }
    }
}

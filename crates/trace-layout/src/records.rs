//! Storage buffer element types.
//!
//! All fields are scalar `f32`/`i32` arrays so the structs stay tightly
//! packed (no vec3 padding). The compute program reads them as flat scalar
//! arrays with the same strides.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Sphere primitive with smoothness and emission (56 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SphereRecord {
    pub position: [f32; 3],
    pub radius: f32,
    /// Diffuse reflectance
    pub albedo: [f32; 3],
    /// Specular reflectance (F0)
    pub specular: [f32; 3],
    /// 0 = rough, 1 = mirror
    pub smoothness: f32,
    /// Emitted radiance
    pub emissive: [f32; 3],
}

impl SphereRecord {
    pub fn center(&self) -> Vec3 {
        Vec3::from(self.position)
    }

    /// True if the two spheres intersect (touching does not count).
    pub fn overlaps(&self, other: &SphereRecord) -> bool {
        let min_dist = self.radius + other.radius;
        self.center().distance_squared(other.center()) < min_dist * min_dist
    }

    /// Drop smoothness and emission for the 40-byte layout.
    pub fn to_basic(&self) -> BasicSphereRecord {
        BasicSphereRecord {
            position: self.position,
            radius: self.radius,
            albedo: self.albedo,
            specular: self.specular,
        }
    }
}

/// Sphere primitive of the simpler program variant (40 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BasicSphereRecord {
    pub position: [f32; 3],
    pub radius: f32,
    pub albedo: [f32; 3],
    pub specular: [f32; 3],
}

/// One registered mesh: object-to-world transform plus its slice of the
/// shared index pool (72 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshObjectRecord {
    /// Column-major object-to-world matrix.
    pub local_to_world: [[f32; 4]; 4],
    pub indices_offset: i32,
    pub indices_count: i32,
}

impl MeshObjectRecord {
    pub fn new(local_to_world: Mat4, indices_offset: usize, indices_count: usize) -> Self {
        Self {
            local_to_world: local_to_world.to_cols_array_2d(),
            indices_offset: indices_offset as i32,
            indices_count: indices_count as i32,
        }
    }

    /// Index sub-range this object owns in the shared pool.
    pub fn index_range(&self) -> std::ops::Range<usize> {
        let start = self.indices_offset as usize;
        start..start + self.indices_count as usize
    }
}

/// Object-space vertex position (12 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VertexRecord {
    pub position: [f32; 3],
}

impl From<Vec3> for VertexRecord {
    fn from(v: Vec3) -> Self {
        Self { position: v.to_array() }
    }
}

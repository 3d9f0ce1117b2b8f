//! Scene data: registered meshes, scattered spheres and their GPU buffers.

mod buffers;
pub mod registry;
pub mod spheres;

use serde::{Deserialize, Serialize};

pub use buffers::SceneBufferManager;
pub use registry::{MaterialId, ObjectHandle, RegistryHandle, Renderable, RenderableMesh, SceneObjectRegistry};
pub use spheres::{scatter_spheres, ScatterParams};

/// Which compute program ABI the scene is packed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SceneVariant {
    /// 56-byte spheres (smoothness + emission), lens parameters bound.
    #[default]
    DepthOfField,
    /// 40-byte spheres, no lens parameters.
    Basic,
}

impl SceneVariant {
    pub fn sphere_stride(self) -> usize {
        match self {
            SceneVariant::DepthOfField => trace_layout::SPHERE_STRIDE,
            SceneVariant::Basic => trace_layout::BASIC_SPHERE_STRIDE,
        }
    }

    pub fn has_lens(self) -> bool {
        matches!(self, SceneVariant::DepthOfField)
    }
}

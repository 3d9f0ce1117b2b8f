//! Scene data → GPU storage buffers.
//!
//! Owns the four geometry buffers of the tracing program. Mesh pools are
//! recomputed from scratch whenever the registry is dirty; indices of object
//! N are biased by the vertex count of objects 0..N-1 so every index range
//! is valid against the shared vertex pool.

use trace_layout::{BasicSphereRecord, MeshObjectRecord, SphereRecord, VertexRecord};

use super::registry::{Renderable, SceneObjectRegistry};
use super::spheres::{scatter_spheres, ScatterParams};
use super::SceneVariant;
use crate::gpu::{BufferBinding, BufferSlot, ComputeBackend};
use crate::Result;

/// Geometry buffers plus the CPU pools they were uploaded from.
pub struct SceneBufferManager<B> {
    variant: SceneVariant,
    spheres: Vec<SphereRecord>,
    mesh_objects: Vec<MeshObjectRecord>,
    vertices: Vec<VertexRecord>,
    indices: Vec<u32>,

    sphere_buffer: BufferSlot<B>,
    mesh_object_buffer: BufferSlot<B>,
    vertex_buffer: BufferSlot<B>,
    index_buffer: BufferSlot<B>,
}

impl<B> SceneBufferManager<B> {
    pub fn new(variant: SceneVariant) -> Self {
        Self {
            variant,
            spheres: Vec::new(),
            mesh_objects: Vec::new(),
            vertices: Vec::new(),
            indices: Vec::new(),
            sphere_buffer: BufferSlot::Absent,
            mesh_object_buffer: BufferSlot::Absent,
            vertex_buffer: BufferSlot::Absent,
            index_buffer: BufferSlot::Absent,
        }
    }

    pub fn variant(&self) -> SceneVariant {
        self.variant
    }

    /// Scatter spheres from `params` and upload them into a fresh buffer.
    ///
    /// Returns the number of accepted spheres.
    pub fn set_up_scene<K>(&mut self, backend: &mut K, params: &ScatterParams) -> Result<usize>
    where
        K: ComputeBackend<Buffer = B>,
    {
        self.spheres = scatter_spheres(params);
        self.sphere_buffer.release(backend, BufferBinding::Spheres);

        match self.variant {
            SceneVariant::DepthOfField => {
                self.sphere_buffer.upload(backend, BufferBinding::Spheres, &self.spheres)?;
            }
            SceneVariant::Basic => {
                let basic: Vec<BasicSphereRecord> = self.spheres.iter().map(SphereRecord::to_basic).collect();
                self.sphere_buffer.upload(backend, BufferBinding::Spheres, &basic)?;
            }
        }

        tracing::info!(
            "scene set up: {} spheres from {} candidates (seed {})",
            self.spheres.len(),
            params.count,
            params.seed
        );
        Ok(self.spheres.len())
    }

    /// Rebuild mesh pools and buffers if the registry changed.
    ///
    /// Returns true when a rebuild happened; accumulated samples are stale
    /// afterwards.
    #[tracing::instrument(skip_all, fields(objects = registry.len()))]
    pub fn rebuild_if_dirty<K>(&mut self, backend: &mut K, registry: &mut SceneObjectRegistry) -> Result<bool>
    where
        K: ComputeBackend<Buffer = B>,
    {
        if !registry.take_dirty() {
            return Ok(false);
        }

        self.mesh_objects.clear();
        self.vertices.clear();
        self.indices.clear();

        for obj in registry.iter() {
            if let Err(reason) = validate(obj.as_ref()) {
                tracing::warn!("skipping renderable '{}': {reason}", obj.name());
                continue;
            }

            let first_vertex = self.vertices.len() as u32;
            self.vertices.extend(obj.vertices().iter().copied().map(VertexRecord::from));

            let first_index = self.indices.len();
            let indices = obj.indices();
            self.indices.extend(indices.iter().map(|&i| i + first_vertex));

            self.mesh_objects.push(MeshObjectRecord::new(obj.world_transform(), first_index, indices.len()));
        }

        self.mesh_object_buffer.upload(backend, BufferBinding::MeshObjects, &self.mesh_objects)?;
        self.vertex_buffer.upload(backend, BufferBinding::Vertices, &self.vertices)?;
        self.index_buffer.upload(backend, BufferBinding::Indices, &self.indices)?;

        tracing::debug!(
            "mesh pools rebuilt: {} objects, {} vertices, {} indices",
            self.mesh_objects.len(),
            self.vertices.len(),
            self.indices.len()
        );
        Ok(true)
    }

    /// Release every buffer (scene deactivation).
    pub fn release<K>(&mut self, backend: &mut K)
    where
        K: ComputeBackend<Buffer = B>,
    {
        self.sphere_buffer.release(backend, BufferBinding::Spheres);
        self.mesh_object_buffer.release(backend, BufferBinding::MeshObjects);
        self.vertex_buffer.release(backend, BufferBinding::Vertices);
        self.index_buffer.release(backend, BufferBinding::Indices);
    }

    pub fn slot(&self, binding: BufferBinding) -> &BufferSlot<B> {
        match binding {
            BufferBinding::Spheres => &self.sphere_buffer,
            BufferBinding::MeshObjects => &self.mesh_object_buffer,
            BufferBinding::Vertices => &self.vertex_buffer,
            BufferBinding::Indices => &self.index_buffer,
        }
    }

    pub fn spheres(&self) -> &[SphereRecord] {
        &self.spheres
    }

    pub fn mesh_objects(&self) -> &[MeshObjectRecord] {
        &self.mesh_objects
    }

    pub fn vertices(&self) -> &[VertexRecord] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

/// Reject geometry whose indices would escape its own vertex range.
fn validate(obj: &dyn Renderable) -> std::result::Result<(), String> {
    let indices = obj.indices();
    if indices.len() % 3 != 0 {
        return Err(format!("index count {} is not a multiple of 3", indices.len()));
    }
    let vertex_count = obj.vertices().len();
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
        return Err(format!("index {bad} out of range (vertices: {vertex_count})"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::{Mat4, Vec3};

    use super::*;
    use crate::gpu::recording::RecordingBackend;
    use crate::scene::RenderableMesh;

    fn triangle_fan(name: &str, vertex_count: u32) -> RenderableMesh {
        let vertices = (0..vertex_count).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        let indices = (1..vertex_count - 1).flat_map(|i| [0, i, i + 1]).collect();
        RenderableMesh::new(name, Mat4::IDENTITY, vertices, indices)
    }

    #[test]
    fn test_clean_registry_is_noop() {
        let mut backend = RecordingBackend::new();
        let mut reg = SceneObjectRegistry::new();
        let mut mgr = SceneBufferManager::new(SceneVariant::DepthOfField);
        assert!(!mgr.rebuild_if_dirty(&mut backend, &mut reg).unwrap());
        assert!(backend.events().is_empty());
    }

    #[test]
    fn test_index_bias() {
        let mut backend = RecordingBackend::new();
        let mut reg = SceneObjectRegistry::new();
        reg.register(Arc::new(triangle_fan("a", 4)));
        reg.register(Arc::new(triangle_fan("b", 3)));
        let mut mgr = SceneBufferManager::new(SceneVariant::DepthOfField);
        assert!(mgr.rebuild_if_dirty(&mut backend, &mut reg).unwrap());

        assert_eq!(mgr.vertices().len(), 7);
        assert_eq!(mgr.mesh_objects()[1].indices_offset, 6);
        assert_eq!(&mgr.indices()[6..], &[4, 5, 6]);
        assert!(!reg.is_dirty());
    }

    #[test]
    fn test_invalid_renderable_skipped() {
        let mut backend = RecordingBackend::new();
        let mut reg = SceneObjectRegistry::new();
        let broken = RenderableMesh::new("broken", Mat4::IDENTITY, vec![Vec3::ZERO; 3], vec![0, 1, 5]);
        reg.register(Arc::new(broken));
        reg.register(Arc::new(triangle_fan("ok", 3)));
        let mut mgr = SceneBufferManager::new(SceneVariant::DepthOfField);
        mgr.rebuild_if_dirty(&mut backend, &mut reg).unwrap();

        assert_eq!(mgr.mesh_objects().len(), 1);
        assert_eq!(mgr.indices(), &[0, 1, 2]);
    }

    #[test]
    fn test_emptied_registry_releases_buffers() {
        let mut backend = RecordingBackend::new();
        let mut reg = SceneObjectRegistry::new();
        let h = reg.register(Arc::new(triangle_fan("a", 4)));
        let mut mgr = SceneBufferManager::new(SceneVariant::DepthOfField);
        mgr.rebuild_if_dirty(&mut backend, &mut reg).unwrap();
        assert_eq!(backend.live_buffers(), 3);

        reg.unregister(h);
        assert!(mgr.rebuild_if_dirty(&mut backend, &mut reg).unwrap());
        assert_eq!(backend.live_buffers(), 0);
        for binding in [BufferBinding::MeshObjects, BufferBinding::Vertices, BufferBinding::Indices] {
            assert!(!mgr.slot(binding).is_present());
        }
    }

    #[test]
    fn test_set_up_scene_recreates_sphere_buffer() {
        let mut backend = RecordingBackend::new();
        let mut mgr = SceneBufferManager::new(SceneVariant::DepthOfField);
        let n = mgr.set_up_scene(&mut backend, &ScatterParams::default()).unwrap();
        assert!(n > 0);
        mgr.set_up_scene(&mut backend, &ScatterParams::default()).unwrap();

        let stats = backend.stats();
        assert_eq!(stats.buffers_created, 2);
        assert_eq!(stats.buffers_released, 1);
        assert_eq!(mgr.slot(BufferBinding::Spheres).count(), n);
        assert_eq!(mgr.slot(BufferBinding::Spheres).stride(), Some(56));
    }

    #[test]
    fn test_basic_variant_uses_compact_spheres() {
        let mut backend = RecordingBackend::new();
        let mut mgr = SceneBufferManager::new(SceneVariant::Basic);
        mgr.set_up_scene(&mut backend, &ScatterParams::default()).unwrap();
        assert_eq!(mgr.slot(BufferBinding::Spheres).stride(), Some(40));
    }

    #[test]
    fn test_zero_spheres_leaves_slot_absent() {
        let mut backend = RecordingBackend::new();
        let mut mgr = SceneBufferManager::new(SceneVariant::DepthOfField);
        let params = ScatterParams { count: 0, ..Default::default() };
        assert_eq!(mgr.set_up_scene(&mut backend, &params).unwrap(), 0);
        assert!(!mgr.slot(BufferBinding::Spheres).is_present());
        assert_eq!(backend.stats().buffers_created, 0);
    }
}

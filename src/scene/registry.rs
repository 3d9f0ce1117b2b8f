//! Live set of mesh renderables.
//!
//! Membership changes only flip a dirty flag; the pools are rebuilt on the
//! render thread by [`SceneBufferManager`](super::SceneBufferManager).
//! Registration order is insertion order and decides index offsets.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use parking_lot::Mutex;

/// Opaque material reference, consumed by shading only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u32);

/// A mesh-bearing entity that contributes triangles to the scene.
pub trait Renderable: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;
    /// Object-to-world transform.
    fn world_transform(&self) -> Mat4;
    /// Object-space vertex positions.
    fn vertices(&self) -> &[Vec3];
    /// Triangle list indices into [`vertices`](Self::vertices).
    fn indices(&self) -> &[u32];
    fn material(&self) -> Option<MaterialId> {
        None
    }
}

/// Handle returned by [`SceneObjectRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(u64);

/// Ordered set of registered renderables plus the rebuild flag.
#[derive(Default)]
pub struct SceneObjectRegistry {
    objects: Vec<(ObjectHandle, Arc<dyn Renderable>)>,
    next_handle: u64,
    needs_rebuild: bool,
}

/// Shared registry for membership events raised off the render thread.
pub type RegistryHandle = Arc<Mutex<SceneObjectRegistry>>;

impl SceneObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> RegistryHandle {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Append `obj` to the live set.
    pub fn register(&mut self, obj: Arc<dyn Renderable>) -> ObjectHandle {
        let handle = ObjectHandle(self.next_handle);
        self.next_handle += 1;
        tracing::debug!("register '{}' as {:?}", obj.name(), handle);
        self.objects.push((handle, obj));
        self.needs_rebuild = true;
        handle
    }

    /// Remove a previously registered object. Returns false if unknown.
    pub fn unregister(&mut self, handle: ObjectHandle) -> bool {
        let Some(pos) = self.objects.iter().position(|(h, _)| *h == handle) else {
            return false;
        };
        let (_, obj) = self.objects.remove(pos);
        tracing::debug!("unregister '{}' ({:?})", obj.name(), handle);
        self.needs_rebuild = true;
        true
    }

    /// Force a rebuild, e.g. after a registered object moved.
    pub fn mark_dirty(&mut self) {
        self.needs_rebuild = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.needs_rebuild
    }

    /// Consume the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.needs_rebuild, false)
    }

    /// Drop every registration (scene teardown).
    pub fn clear(&mut self) {
        if !self.objects.is_empty() {
            self.objects.clear();
            self.needs_rebuild = true;
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Registered objects in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Renderable>> {
        self.objects.iter().map(|(_, obj)| obj)
    }

    pub fn handles(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.objects.iter().map(|(h, _)| *h)
    }
}

/// Plain owned mesh implementing [`Renderable`].
#[derive(Debug, Clone)]
pub struct RenderableMesh {
    pub name: String,
    pub transform: Mat4,
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub material: Option<MaterialId>,
}

impl RenderableMesh {
    pub fn new(name: impl Into<String>, transform: Mat4, vertices: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            transform,
            vertices,
            indices,
            material: None,
        }
    }

    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = Some(material);
        self
    }

    /// Unit quad in the XZ plane, facing +Y (4 vertices, 2 triangles).
    pub fn quad(name: impl Into<String>, transform: Mat4) -> Self {
        let vertices = vec![
            Vec3::new(-0.5, 0.0, -0.5),
            Vec3::new(0.5, 0.0, -0.5),
            Vec3::new(0.5, 0.0, 0.5),
            Vec3::new(-0.5, 0.0, 0.5),
        ];
        Self::new(name, transform, vertices, vec![0, 2, 1, 0, 3, 2])
    }

    /// Unit cube centered at the origin (8 vertices, 12 triangles).
    pub fn cube(name: impl Into<String>, transform: Mat4) -> Self {
        let vertices = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 == 0 { -0.5 } else { 0.5 },
                    if i & 2 == 0 { -0.5 } else { 0.5 },
                    if i & 4 == 0 { -0.5 } else { 0.5 },
                )
            })
            .collect();
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 1, 2, 3, // -z
            4, 5, 6, 5, 7, 6, // +z
            0, 1, 4, 1, 5, 4, // -y
            2, 6, 3, 3, 6, 7, // +y
            0, 4, 2, 2, 4, 6, // -x
            1, 3, 5, 3, 7, 5, // +x
        ];
        Self::new(name, transform, vertices, indices)
    }
}

impl Renderable for RenderableMesh {
    fn name(&self) -> &str {
        &self.name
    }

    fn world_transform(&self) -> Mat4 {
        self.transform
    }

    fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    fn indices(&self) -> &[u32] {
        &self.indices
    }

    fn material(&self) -> Option<MaterialId> {
        self.material
    }
}

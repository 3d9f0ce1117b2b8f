//! Host side of the compute program ABI.
//!
//! [`ComputeBackend`] is the seam between the scene/accumulation logic and
//! the device. [`wgpu_backend::WgpuBackend`] drives a real adapter;
//! [`recording::RecordingBackend`] keeps everything on the CPU and records
//! the resource traffic instead.
//!
//! ## Frame contract
//! ```text
//! set_uniform / bind_texture / bind_buffer   (parameters for the next dispatch)
//! dispatch(working)                          (tracing program, 8×8 tiles)
//! accumulate(working → converged, 1/(n+1))   (running average)
//! present(converged → surface)
//! submit()
//! ```

pub mod recording;
pub mod wgpu_backend;

use trace_layout::FrameUniform;

use crate::Result;

/// Storage buffer parameters of the tracing program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferBinding {
    Spheres,
    MeshObjects,
    Vertices,
    Indices,
}

impl BufferBinding {
    pub const ALL: [BufferBinding; 4] = [
        BufferBinding::Spheres,
        BufferBinding::MeshObjects,
        BufferBinding::Vertices,
        BufferBinding::Indices,
    ];

    /// Parameter name in the compute program.
    pub fn name(self) -> &'static str {
        match self {
            BufferBinding::Spheres => "_Spheres",
            BufferBinding::MeshObjects => "_MeshObjects",
            BufferBinding::Vertices => "_Vertices",
            BufferBinding::Indices => "_Indices",
        }
    }

    /// `@binding` index in group 0.
    pub fn binding_index(self) -> u32 {
        match self {
            BufferBinding::Spheres => 4,
            BufferBinding::MeshObjects => 5,
            BufferBinding::Vertices => 6,
            BufferBinding::Indices => 7,
        }
    }

    /// Position in fixed-size binding tables.
    pub fn slot(self) -> usize {
        self.binding_index() as usize - 4
    }
}

/// The two render targets owned by the accumulation controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetRole {
    /// Written by the tracing program each frame (`Result`).
    Working,
    /// Running average of all frames since the last reset.
    Converged,
}

impl TargetRole {
    pub fn label(self) -> &'static str {
        match self {
            TargetRole::Working => "pt_working_target",
            TargetRole::Converged => "pt_converged_target",
        }
    }
}

/// Device operations needed by the tracer.
///
/// Resources are owned values: whoever holds a `Buffer` or `Target` is its
/// single owner and hands it back through `release_*` when done. Releasing a
/// buffer also clears its binding, so a released buffer is never read by a
/// later dispatch.
pub trait ComputeBackend {
    type Buffer;
    type Target;
    /// Sampled environment texture (`_SkyboxTexture`).
    type Texture;
    /// Presentation destination.
    type Surface;

    fn create_buffer(&mut self, binding: BufferBinding, count: usize, stride: usize) -> Result<Self::Buffer>;
    fn write_buffer(&mut self, buffer: &Self::Buffer, bytes: &[u8]) -> Result<()>;
    fn release_buffer(&mut self, binding: BufferBinding, buffer: Self::Buffer);

    fn create_target(&mut self, role: TargetRole, width: u32, height: u32) -> Result<Self::Target>;
    fn release_target(&mut self, role: TargetRole, target: Self::Target);
    fn surface_size(&self, surface: &Self::Surface) -> (u32, u32);

    fn set_uniform(&mut self, uniform: &FrameUniform);
    fn bind_texture(&mut self, skybox: &Self::Texture);
    fn bind_buffer(&mut self, binding: BufferBinding, buffer: &Self::Buffer);
    /// Fall back to the empty placeholder for `binding`.
    fn unbind_buffer(&mut self, binding: BufferBinding);

    /// Run the tracing program into `result` over `groups` workgroups.
    fn dispatch(&mut self, result: &Self::Target, groups: (u32, u32, u32)) -> Result<()>;
    /// `converged = converged + (working - converged) * weight`
    fn accumulate(&mut self, working: &Self::Target, converged: &Self::Target, weight: f32) -> Result<()>;
    fn present(&mut self, converged: &Self::Target, surface: &Self::Surface) -> Result<()>;
    /// Submit recorded work and wait for it.
    fn submit(&mut self) -> Result<()>;
}

/// A GPU buffer that may or may not exist.
///
/// Transitions:
/// - `Absent` + non-empty data → allocate, upload → `Present`
/// - `Present` + same count/stride → upload in place
/// - `Present` + different count/stride → release, allocate, upload
/// - `Present` + empty data → release → `Absent`
#[derive(Debug)]
pub enum BufferSlot<B> {
    Absent,
    Present { buffer: B, count: usize, stride: usize },
}

impl<B> Default for BufferSlot<B> {
    fn default() -> Self {
        BufferSlot::Absent
    }
}

impl<B> BufferSlot<B> {
    /// Upload `data` with stride `size_of::<T>()`, reshaping the buffer if needed.
    pub fn upload<T, K>(&mut self, backend: &mut K, binding: BufferBinding, data: &[T]) -> Result<()>
    where
        T: bytemuck::Pod,
        K: ComputeBackend<Buffer = B>,
    {
        let count = data.len();
        let stride = std::mem::size_of::<T>();

        let mismatch = match self {
            BufferSlot::Present { count: c, stride: s, .. } => count == 0 || *c != count || *s != stride,
            BufferSlot::Absent => false,
        };
        if mismatch {
            self.release(backend, binding);
        }

        if count == 0 {
            return Ok(());
        }

        if let BufferSlot::Absent = self {
            let buffer = backend.create_buffer(binding, count, stride)?;
            tracing::debug!("{}: allocated {count} x {stride}B", binding.name());
            *self = BufferSlot::Present { buffer, count, stride };
        }

        if let BufferSlot::Present { buffer, .. } = self {
            backend.write_buffer(buffer, bytemuck::cast_slice(data))?;
        }
        Ok(())
    }

    /// Release the buffer (if any) back to the backend.
    pub fn release<K>(&mut self, backend: &mut K, binding: BufferBinding)
    where
        K: ComputeBackend<Buffer = B>,
    {
        if let BufferSlot::Present { buffer, count, stride } = std::mem::take(self) {
            tracing::debug!("{}: released {count} x {stride}B", binding.name());
            backend.release_buffer(binding, buffer);
        }
    }

    pub fn buffer(&self) -> Option<&B> {
        match self {
            BufferSlot::Present { buffer, .. } => Some(buffer),
            BufferSlot::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, BufferSlot::Present { .. })
    }

    /// Element count (0 when absent).
    pub fn count(&self) -> usize {
        match self {
            BufferSlot::Present { count, .. } => *count,
            BufferSlot::Absent => 0,
        }
    }

    /// Element stride in bytes, if present.
    pub fn stride(&self) -> Option<usize> {
        match self {
            BufferSlot::Present { stride, .. } => Some(*stride),
            BufferSlot::Absent => None,
        }
    }
}

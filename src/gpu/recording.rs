//! CPU-only backend that records resource traffic.
//!
//! Nothing is traced; every call is logged as a [`Event`] and the backend
//! tracks which buffers/targets are alive and what is bound. Targets carry
//! CPU pixels: `dispatch` fills the working target with a fixed color (see
//! [`RecordingBackend::set_trace_output`]), `accumulate` applies the running
//! average and `present` copies the converged pixels out. Used by the test
//! suite and by `tracer --dry-run`.

use std::collections::HashMap;

use trace_layout::FrameUniform;

use super::{BufferBinding, ComputeBackend, TargetRole};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    CreateBuffer { id: u64, binding: BufferBinding, count: usize, stride: usize },
    WriteBuffer { id: u64, len: usize },
    ReleaseBuffer { id: u64, binding: BufferBinding },
    CreateTarget { id: u64, role: TargetRole, width: u32, height: u32 },
    ReleaseTarget { id: u64, role: TargetRole },
    Dispatch { target: u64, groups: (u32, u32, u32) },
    Accumulate { weight: f32 },
    Present { width: u32, height: u32 },
    Submit,
}

/// Counters derived from the event log.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecordingStats {
    pub buffers_created: usize,
    pub buffers_released: usize,
    pub buffer_writes: usize,
    pub targets_created: usize,
    pub targets_released: usize,
    pub dispatches: usize,
    pub presents: usize,
}

#[derive(Debug)]
pub struct RecordedBuffer {
    pub id: u64,
    pub count: usize,
    pub stride: usize,
}

#[derive(Debug)]
pub struct RecordedTarget {
    pub id: u64,
    pub role: TargetRole,
    pub width: u32,
    pub height: u32,
}

/// Stand-in for the environment texture.
#[derive(Debug, Clone, Default)]
pub struct RecordedTexture {
    pub label: String,
}

/// Stand-in for a presentation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedSurface {
    pub width: u32,
    pub height: u32,
}

impl RecordedSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u64,
    events: Vec<Event>,
    stats: RecordingStats,
    live_buffers: HashMap<u64, BufferBinding>,
    live_targets: HashMap<u64, TargetRole>,
    contents: HashMap<u64, Vec<u8>>,
    bindings: [Option<u64>; 4],
    skybox: Option<String>,
    uniform: Option<FrameUniform>,
    trace_output: [f32; 4],
    pixels: HashMap<u64, Vec<[f32; 4]>>,
    presented: Vec<[f32; 4]>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn stats(&self) -> RecordingStats {
        self.stats
    }

    pub fn live_buffers(&self) -> usize {
        self.live_buffers.len()
    }

    pub fn live_targets(&self) -> usize {
        self.live_targets.len()
    }

    /// Last uniform block pushed with `set_uniform`.
    pub fn uniform(&self) -> Option<&FrameUniform> {
        self.uniform.as_ref()
    }

    /// Id of the buffer currently bound at `binding`.
    pub fn bound(&self, binding: BufferBinding) -> Option<u64> {
        self.bindings[binding.slot()]
    }

    /// Bytes last written into buffer `id`.
    pub fn contents(&self, id: u64) -> Option<&[u8]> {
        self.contents.get(&id).map(Vec::as_slice)
    }

    /// Color every pixel of the next dispatches is traced as.
    pub fn set_trace_output(&mut self, rgba: [f32; 4]) {
        self.trace_output = rgba;
    }

    /// Pixels of a live target, row-major.
    pub fn target_pixels(&self, id: u64) -> Option<&[[f32; 4]]> {
        self.pixels.get(&id).map(Vec::as_slice)
    }

    /// Pixels copied out by the last `present`.
    pub fn presented(&self) -> &[[f32; 4]] {
        &self.presented
    }

    /// Weights of every accumulate call, in order.
    pub fn accumulate_weights(&self) -> Vec<f32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Accumulate { weight } => Some(*weight),
                _ => None,
            })
            .collect()
    }
}

impl ComputeBackend for RecordingBackend {
    type Buffer = RecordedBuffer;
    type Target = RecordedTarget;
    type Texture = RecordedTexture;
    type Surface = RecordedSurface;

    fn create_buffer(&mut self, binding: BufferBinding, count: usize, stride: usize) -> Result<RecordedBuffer> {
        if count == 0 || stride == 0 {
            return Err(Error::gpu(format!("{}: zero-sized buffer", binding.name())));
        }
        let id = self.alloc_id();
        self.live_buffers.insert(id, binding);
        self.stats.buffers_created += 1;
        self.events.push(Event::CreateBuffer { id, binding, count, stride });
        Ok(RecordedBuffer { id, count, stride })
    }

    fn write_buffer(&mut self, buffer: &RecordedBuffer, bytes: &[u8]) -> Result<()> {
        if !self.live_buffers.contains_key(&buffer.id) {
            return Err(Error::gpu(format!("write to released buffer {}", buffer.id)));
        }
        if bytes.len() != buffer.count * buffer.stride {
            return Err(Error::gpu(format!(
                "buffer {} holds {} bytes, got {}",
                buffer.id,
                buffer.count * buffer.stride,
                bytes.len()
            )));
        }
        self.contents.insert(buffer.id, bytes.to_vec());
        self.stats.buffer_writes += 1;
        self.events.push(Event::WriteBuffer { id: buffer.id, len: bytes.len() });
        Ok(())
    }

    fn release_buffer(&mut self, binding: BufferBinding, buffer: RecordedBuffer) {
        self.live_buffers.remove(&buffer.id);
        self.contents.remove(&buffer.id);
        if self.bindings[binding.slot()] == Some(buffer.id) {
            self.bindings[binding.slot()] = None;
        }
        self.stats.buffers_released += 1;
        self.events.push(Event::ReleaseBuffer { id: buffer.id, binding });
    }

    fn create_target(&mut self, role: TargetRole, width: u32, height: u32) -> Result<RecordedTarget> {
        let id = self.alloc_id();
        self.live_targets.insert(id, role);
        self.pixels.insert(id, vec![[0.0; 4]; (width * height) as usize]);
        self.stats.targets_created += 1;
        self.events.push(Event::CreateTarget { id, role, width, height });
        Ok(RecordedTarget { id, role, width, height })
    }

    fn release_target(&mut self, role: TargetRole, target: RecordedTarget) {
        self.live_targets.remove(&target.id);
        self.pixels.remove(&target.id);
        self.stats.targets_released += 1;
        self.events.push(Event::ReleaseTarget { id: target.id, role });
    }

    fn surface_size(&self, surface: &RecordedSurface) -> (u32, u32) {
        (surface.width, surface.height)
    }

    fn set_uniform(&mut self, uniform: &FrameUniform) {
        self.uniform = Some(*uniform);
    }

    fn bind_texture(&mut self, skybox: &RecordedTexture) {
        self.skybox = Some(skybox.label.clone());
    }

    fn bind_buffer(&mut self, binding: BufferBinding, buffer: &RecordedBuffer) {
        self.bindings[binding.slot()] = Some(buffer.id);
    }

    fn unbind_buffer(&mut self, binding: BufferBinding) {
        self.bindings[binding.slot()] = None;
    }

    fn dispatch(&mut self, result: &RecordedTarget, groups: (u32, u32, u32)) -> Result<()> {
        if self.skybox.is_none() {
            return Err(Error::MissingResource("_SkyboxTexture"));
        }
        if !self.live_targets.contains_key(&result.id) {
            return Err(Error::gpu("dispatch into released target"));
        }
        for binding in BufferBinding::ALL {
            if let Some(id) = self.bindings[binding.slot()] {
                if !self.live_buffers.contains_key(&id) {
                    return Err(Error::gpu(format!("{} bound to released buffer {id}", binding.name())));
                }
            }
        }
        let output = self.trace_output;
        if let Some(pixels) = self.pixels.get_mut(&result.id) {
            pixels.fill(output);
        }
        self.stats.dispatches += 1;
        self.events.push(Event::Dispatch { target: result.id, groups });
        Ok(())
    }

    fn accumulate(&mut self, working: &RecordedTarget, converged: &RecordedTarget, weight: f32) -> Result<()> {
        if (working.width, working.height) != (converged.width, converged.height) {
            return Err(Error::gpu("working/converged size mismatch"));
        }
        let mut average = self
            .pixels
            .remove(&converged.id)
            .ok_or_else(|| Error::gpu("accumulate into released target"))?;
        let Some(sample) = self.pixels.get(&working.id) else {
            self.pixels.insert(converged.id, average);
            return Err(Error::gpu("accumulate from released target"));
        };
        for (avg, px) in average.iter_mut().zip(sample) {
            for c in 0..4 {
                avg[c] += (px[c] - avg[c]) * weight;
            }
        }
        self.pixels.insert(converged.id, average);
        self.events.push(Event::Accumulate { weight });
        Ok(())
    }

    fn present(&mut self, converged: &RecordedTarget, surface: &RecordedSurface) -> Result<()> {
        if (converged.width, converged.height) != (surface.width, surface.height) {
            return Err(Error::gpu("converged target does not match surface"));
        }
        self.presented.clear();
        if let Some(pixels) = self.pixels.get(&converged.id) {
            self.presented.extend_from_slice(pixels);
        }
        self.stats.presents += 1;
        self.events.push(Event::Present { width: surface.width, height: surface.height });
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        self.events.push(Event::Submit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_without_skybox_fails() {
        let mut backend = RecordingBackend::new();
        let target = backend.create_target(TargetRole::Working, 8, 8).unwrap();
        let err = backend.dispatch(&target, (1, 1, 1)).unwrap_err();
        assert!(matches!(err, Error::MissingResource("_SkyboxTexture")));
    }

    #[test]
    fn test_release_clears_binding() {
        let mut backend = RecordingBackend::new();
        let buf = backend.create_buffer(BufferBinding::Vertices, 3, 12).unwrap();
        let id = buf.id;
        backend.bind_buffer(BufferBinding::Vertices, &buf);
        assert_eq!(backend.bound(BufferBinding::Vertices), Some(id));
        backend.release_buffer(BufferBinding::Vertices, buf);
        assert_eq!(backend.bound(BufferBinding::Vertices), None);
    }

    #[test]
    fn test_write_size_checked() {
        let mut backend = RecordingBackend::new();
        let buf = backend.create_buffer(BufferBinding::Indices, 3, 4).unwrap();
        assert!(backend.write_buffer(&buf, &[0u8; 12]).is_ok());
        assert!(backend.write_buffer(&buf, &[0u8; 8]).is_err());
    }

    #[test]
    fn test_accumulate_applies_running_average() {
        let mut backend = RecordingBackend::new();
        backend.bind_texture(&RecordedTexture::default());
        let working = backend.create_target(TargetRole::Working, 2, 1).unwrap();
        let converged = backend.create_target(TargetRole::Converged, 2, 1).unwrap();

        backend.set_trace_output([1.0, 2.0, 4.0, 1.0]);
        backend.dispatch(&working, (1, 1, 1)).unwrap();
        backend.accumulate(&working, &converged, 1.0).unwrap();
        backend.set_trace_output([3.0, 0.0, 0.0, 1.0]);
        backend.dispatch(&working, (1, 1, 1)).unwrap();
        backend.accumulate(&working, &converged, 0.5).unwrap();

        let avg = backend.target_pixels(converged.id).unwrap().to_vec();
        assert_eq!(avg, &[[2.0, 1.0, 2.0, 1.0]; 2]);

        let surface = RecordedSurface::new(2, 1);
        backend.present(&converged, &surface).unwrap();
        assert_eq!(backend.presented(), avg);
    }

    #[test]
    fn test_released_target_drops_pixels() {
        let mut backend = RecordingBackend::new();
        let target = backend.create_target(TargetRole::Working, 4, 4).unwrap();
        let id = target.id;
        assert_eq!(backend.target_pixels(id).map(<[_]>::len), Some(16));
        backend.release_target(TargetRole::Working, target);
        assert!(backend.target_pixels(id).is_none());
    }
}

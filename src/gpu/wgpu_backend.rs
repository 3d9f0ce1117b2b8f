//! wgpu implementation of [`ComputeBackend`].
//!
//! ## Bind group 0 of the tracing program
//! ```text
//! 0  Result          texture_storage_2d<rgba32float, write>
//! 1  _SkyboxTexture  texture_2d<f32>
//! 2  sampler         sampler
//! 3  frame           uniform FrameUniform
//! 4  _Spheres        storage, read
//! 5  _MeshObjects    storage, read
//! 6  _Vertices       storage, read
//! 7  _Indices        storage, read
//! ```
//! Unbound storage slots get a zeroed placeholder; the matching count in
//! the uniform is 0 so the program never reads it.

use trace_layout::{BlendUniform, FrameUniform, ACCUMULATE_SHADER_SOURCE, PRESENT_SHADER_SOURCE};

use super::{BufferBinding, ComputeBackend, TargetRole};
use crate::environment::SkyboxTexture;
use crate::{Error, Result};

/// Format of the per-frame trace output.
pub const WORKING_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
/// Format of the running average. Half floats stall once `1/(n+1)` drops
/// below their precision, so the average is kept in full floats.
pub const CONVERGED_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

const PLACEHOLDER_SIZE: u64 = 256;

/// Render target texture with its view.
pub struct GpuTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: (u32, u32),
    /// Converged only: written by the accumulate pass, then copied over `texture`.
    scratch: Option<(wgpu::Texture, wgpu::TextureView)>,
}

fn create_target_texture(
    device: &wgpu::Device,
    label: &str,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
    width: u32,
    height: u32,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Destination of `present`: an offscreen texture or a swapchain frame.
pub struct OutputSurface {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub size: (u32, u32),
}

impl OutputSurface {
    /// Wrap an existing texture (e.g. a swapchain frame).
    pub fn from_texture(texture: wgpu::Texture) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let size = (texture.width(), texture.height());
        let format = texture.format();
        Self { texture, view, format, size }
    }

    /// Offscreen Rgba8 target that can be read back.
    pub fn offscreen(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("pt_output_surface"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        Self::from_texture(texture)
    }

    /// Copy the surface back to the CPU as tightly packed RGBA8 rows.
    pub fn read_rgba8(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Vec<u8>> {
        if !matches!(
            self.format,
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb
        ) {
            return Err(Error::gpu(format!("cannot read back {:?}", self.format)));
        }
        let (width, height) = self.size;
        let row_bytes = width * 4;
        // bytes_per_row must be aligned to COPY_BYTES_PER_ROW_ALIGNMENT
        let padded_row = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pt_readback"),
            size: padded_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("pt_readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        slice.map_async(wgpu::MapMode::Read, |_| {});
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| Error::gpu(format!("readback poll: {e}")))?;

        let mut pixels = Vec::with_capacity((row_bytes * height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded_row as usize) {
                pixels.extend_from_slice(&row[..row_bytes as usize]);
            }
        }
        staging.unmap();
        Ok(pixels)
    }
}

/// Create a device without a window.
pub fn request_headless_device() -> Result<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .map_err(|e| Error::gpu(format!("no adapter: {e}")))?;
    log::info!("adapter: {}", adapter.get_info().name);

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("tracer_device"),
        ..Default::default()
    }))
    .map_err(|e| Error::gpu(format!("request_device: {e}")))?;
    Ok((device, queue))
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,

    trace_pipeline: wgpu::ComputePipeline,
    trace_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    placeholder: wgpu::Buffer,

    accumulate_layout: wgpu::BindGroupLayout,
    accumulate_pipeline: wgpu::ComputePipeline,
    blend_buffer: wgpu::Buffer,

    present_layout: wgpu::BindGroupLayout,
    present_pipeline: wgpu::RenderPipeline,

    // Current bindings
    skybox: Option<(wgpu::TextureView, wgpu::Sampler)>,
    buffers: [Option<wgpu::Buffer>; 4],

    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuBackend {
    /// Build pipelines for `program_wgsl` (entry point `main`) presenting
    /// into `output_format`.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        program_wgsl: &str,
        output_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pt_trace_program"),
            source: wgpu::ShaderSource::Wgsl(program_wgsl.into()),
        });

        let storage_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let trace_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pt_bind_group_layout"),
            entries: &[
                // @binding(0) Result
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: WORKING_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                // @binding(1) _SkyboxTexture
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // @binding(2) skybox sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // @binding(3) frame uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(BufferBinding::Spheres.binding_index()),
                storage_entry(BufferBinding::MeshObjects.binding_index()),
                storage_entry(BufferBinding::Vertices.binding_index()),
                storage_entry(BufferBinding::Indices.binding_index()),
            ],
        });

        let trace_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pt_pipeline_layout"),
            bind_group_layouts: &[&trace_layout],
            push_constant_ranges: &[],
        });

        let trace_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("pt_compute_pipeline"),
            layout: Some(&trace_pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pt_frame_uniform"),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Zero-filled at creation
        let placeholder = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pt_placeholder"),
            size: PLACEHOLDER_SIZE,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        // Running average: working + converged -> scratch, copied back into converged
        let accumulate_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pt_accumulate_shader"),
            source: wgpu::ShaderSource::Wgsl(ACCUMULATE_SHADER_SOURCE.into()),
        });

        let float_texture_entry = |binding: u32, visibility: wgpu::ShaderStages| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
            },
            count: None,
        };

        let accumulate_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pt_accumulate_bgl"),
            entries: &[
                float_texture_entry(0, wgpu::ShaderStages::COMPUTE),
                float_texture_entry(1, wgpu::ShaderStages::COMPUTE),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: CONVERGED_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let accumulate_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pt_accumulate_pl"),
            bind_group_layouts: &[&accumulate_layout],
            push_constant_ranges: &[],
        });

        let accumulate_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("pt_accumulate_pipeline"),
            layout: Some(&accumulate_pipeline_layout),
            module: &accumulate_shader,
            entry_point: Some("accumulate"),
            compilation_options: Default::default(),
            cache: None,
        });

        let blend_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pt_blend_uniform"),
            size: std::mem::size_of::<BlendUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Present: converged -> output surface
        let present_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pt_present_shader"),
            source: wgpu::ShaderSource::Wgsl(PRESENT_SHADER_SOURCE.into()),
        });

        let present_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pt_present_bgl"),
            entries: &[float_texture_entry(0, wgpu::ShaderStages::FRAGMENT)],
        });

        let present_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pt_present_pl"),
            bind_group_layouts: &[&present_layout],
            push_constant_ranges: &[],
        });

        let present_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("pt_present_pipeline"),
            layout: Some(&present_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &present_shader,
                entry_point: Some("vs_fullscreen"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &present_shader,
                entry_point: Some("fs_present"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: output_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            device,
            queue,
            trace_pipeline,
            trace_layout,
            uniform_buffer,
            placeholder,
            accumulate_layout,
            accumulate_pipeline,
            blend_buffer,
            present_layout,
            present_pipeline,
            skybox: None,
            buffers: Default::default(),
            encoder: None,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pt_frame_encoder"),
            })
        })
    }
}

impl ComputeBackend for WgpuBackend {
    type Buffer = wgpu::Buffer;
    type Target = GpuTarget;
    type Texture = SkyboxTexture;
    type Surface = OutputSurface;

    fn create_buffer(&mut self, binding: BufferBinding, count: usize, stride: usize) -> Result<wgpu::Buffer> {
        let size = (count * stride) as u64;
        if size == 0 {
            return Err(Error::gpu(format!("{}: zero-sized buffer", binding.name())));
        }
        log::debug!("create {} ({count} x {stride}B)", binding.name());
        Ok(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(binding.name()),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }))
    }

    fn write_buffer(&mut self, buffer: &wgpu::Buffer, bytes: &[u8]) -> Result<()> {
        if bytes.len() as u64 != buffer.size() {
            return Err(Error::gpu(format!(
                "buffer holds {} bytes, got {}",
                buffer.size(),
                bytes.len()
            )));
        }
        self.queue.write_buffer(buffer, 0, bytes);
        Ok(())
    }

    fn release_buffer(&mut self, binding: BufferBinding, buffer: wgpu::Buffer) {
        let slot = &mut self.buffers[binding.slot()];
        if slot.as_ref() == Some(&buffer) {
            *slot = None;
        }
        buffer.destroy();
    }

    fn create_target(&mut self, role: TargetRole, width: u32, height: u32) -> Result<GpuTarget> {
        if width == 0 || height == 0 {
            return Err(Error::gpu(format!("{}: zero-sized target", role.label())));
        }
        let target = match role {
            TargetRole::Working => {
                let (texture, view) = create_target_texture(
                    &self.device,
                    role.label(),
                    WORKING_FORMAT,
                    wgpu::TextureUsages::STORAGE_BINDING
                        | wgpu::TextureUsages::TEXTURE_BINDING
                        | wgpu::TextureUsages::COPY_SRC,
                    width,
                    height,
                );
                GpuTarget {
                    texture,
                    view,
                    size: (width, height),
                    scratch: None,
                }
            }
            TargetRole::Converged => {
                let (texture, view) = create_target_texture(
                    &self.device,
                    role.label(),
                    CONVERGED_FORMAT,
                    wgpu::TextureUsages::TEXTURE_BINDING
                        | wgpu::TextureUsages::COPY_DST
                        | wgpu::TextureUsages::COPY_SRC,
                    width,
                    height,
                );
                let scratch = create_target_texture(
                    &self.device,
                    "pt_converged_scratch",
                    CONVERGED_FORMAT,
                    wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
                    width,
                    height,
                );
                GpuTarget {
                    texture,
                    view,
                    size: (width, height),
                    scratch: Some(scratch),
                }
            }
        };
        Ok(target)
    }

    fn release_target(&mut self, _role: TargetRole, target: GpuTarget) {
        target.texture.destroy();
        if let Some((scratch, _)) = target.scratch {
            scratch.destroy();
        }
    }

    fn surface_size(&self, surface: &OutputSurface) -> (u32, u32) {
        surface.size
    }

    fn set_uniform(&mut self, uniform: &FrameUniform) {
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniform));
    }

    fn bind_texture(&mut self, skybox: &SkyboxTexture) {
        self.skybox = Some((skybox.view.clone(), skybox.sampler.clone()));
    }

    fn bind_buffer(&mut self, binding: BufferBinding, buffer: &wgpu::Buffer) {
        self.buffers[binding.slot()] = Some(buffer.clone());
    }

    fn unbind_buffer(&mut self, binding: BufferBinding) {
        self.buffers[binding.slot()] = None;
    }

    fn dispatch(&mut self, result: &GpuTarget, groups: (u32, u32, u32)) -> Result<()> {
        let (skybox_view, sampler) = self.skybox.as_ref().ok_or(Error::MissingResource("_SkyboxTexture"))?;

        let storage = |binding: BufferBinding| wgpu::BindGroupEntry {
            binding: binding.binding_index(),
            resource: self.buffers[binding.slot()]
                .as_ref()
                .unwrap_or(&self.placeholder)
                .as_entire_binding(),
        };

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pt_bind_group"),
            layout: &self.trace_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&result.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(skybox_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                storage(BufferBinding::Spheres),
                storage(BufferBinding::MeshObjects),
                storage(BufferBinding::Vertices),
                storage(BufferBinding::Indices),
            ],
        });

        let pipeline = self.trace_pipeline.clone();
        let encoder = self.encoder();
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("pt_compute_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(groups.0, groups.1, groups.2);
        Ok(())
    }

    fn accumulate(&mut self, working: &GpuTarget, converged: &GpuTarget, weight: f32) -> Result<()> {
        if working.size != converged.size {
            return Err(Error::gpu(format!(
                "target size mismatch: {:?} vs {:?}",
                working.size, converged.size
            )));
        }
        let (scratch, scratch_view) = converged
            .scratch
            .as_ref()
            .ok_or_else(|| Error::gpu("accumulate into a target without scratch texture"))?;

        // Staged before this frame's commands; one accumulate per submit.
        self.queue
            .write_buffer(&self.blend_buffer, 0, bytemuck::bytes_of(&BlendUniform::new(weight)));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pt_accumulate_bg"),
            layout: &self.accumulate_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&working.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&converged.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(scratch_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.blend_buffer.as_entire_binding(),
                },
            ],
        });

        let (width, height) = converged.size;
        let (gx, gy, gz) = trace_layout::dispatch_groups(width, height);
        let pipeline = self.accumulate_pipeline.clone();
        let encoder = self.encoder();
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("pt_accumulate_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(gx, gy, gz);
        }
        encoder.copy_texture_to_texture(
            scratch.as_image_copy(),
            converged.texture.as_image_copy(),
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn present(&mut self, converged: &GpuTarget, surface: &OutputSurface) -> Result<()> {
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pt_present_bg"),
            layout: &self.present_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&converged.view),
            }],
        });
        let pipeline = self.present_pipeline.clone();
        let encoder = self.encoder();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("pt_present_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &surface.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1); // fullscreen triangle
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| Error::gpu(format!("poll: {e}")))?;
        Ok(())
    }
}

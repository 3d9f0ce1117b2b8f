//! Skybox loading: HDR/EXR/PNG images into a filterable Rgba16Float texture.

use std::path::Path;

use half::f16;
use wgpu::util::DeviceExt;

use crate::Result;

/// Environment texture bound as `_SkyboxTexture`.
pub struct SkyboxTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub size: (u32, u32),
}

/// Decoded RGBA pixels, one `f16` per channel.
#[derive(Debug, Clone)]
pub struct SkyboxPixels {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f16>,
}

/// Decode an image file (format guessed from contents) into f16 RGBA.
pub fn decode_skybox(path: &Path) -> Result<SkyboxPixels> {
    use image::{GenericImageView, ImageReader};

    let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let (width, height) = img.dimensions();
    let data = img.to_rgba32f().as_raw().iter().map(|&v| f16::from_f32(v)).collect();
    Ok(SkyboxPixels { width, height, data })
}

impl SkyboxPixels {
    /// 1×1 image of a single color.
    pub fn solid(color: [f32; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            data: color.iter().map(|&v| f16::from_f32(v)).collect(),
        }
    }
}

impl SkyboxTexture {
    /// Load a skybox image and upload it.
    #[tracing::instrument(skip(device, queue))]
    pub fn load(device: &wgpu::Device, queue: &wgpu::Queue, path: &Path) -> Result<Self> {
        let pixels = decode_skybox(path)?;
        log::info!("skybox {}: {}x{}", path.display(), pixels.width, pixels.height);
        Ok(Self::from_pixels(device, queue, &pixels))
    }

    /// Uniform-color skybox, used when no image is given.
    pub fn solid(device: &wgpu::Device, queue: &wgpu::Queue, color: [f32; 4]) -> Self {
        Self::from_pixels(device, queue, &SkyboxPixels::solid(color))
    }

    pub fn from_pixels(device: &wgpu::Device, queue: &wgpu::Queue, pixels: &SkyboxPixels) -> Self {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("skybox_texture"),
                size: wgpu::Extent3d {
                    width: pixels.width,
                    height: pixels.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba16Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            bytemuck::cast_slice(&pixels.data),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Equirectangular: wrap horizontally, clamp at the poles
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("skybox_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            size: (pixels.width, pixels.height),
        }
    }
}

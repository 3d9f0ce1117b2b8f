//! tracer - headless progressive path tracing.
//!
//! Renders `--frames` progressive samples of a demo scene (scattered spheres,
//! a cube and a ground quad) offscreen and writes the converged image as PNG.
//! `--dry-run` drives the same frame loop on the recording backend and
//! prints resource statistics instead.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use glam::{Mat4, Quat, Vec3};

use progressive_tracer::gpu::recording::{RecordedSurface, RecordedTexture, RecordingBackend};
use progressive_tracer::gpu::wgpu_backend::{request_headless_device, OutputSurface, WgpuBackend};
use progressive_tracer::gpu::ComputeBackend;
use progressive_tracer::params::{CameraState, DirectionalLight};
use progressive_tracer::scene::{RenderableMesh, SceneVariant};
use progressive_tracer::{environment::SkyboxTexture, FrameInputs, PathTracer, TracerSettings};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TRACER_BUILD_DATE"), ")");

#[derive(Parser, Debug)]
#[command(name = "tracer", version = VERSION, about = "Progressive GPU path tracer")]
struct Args {
    /// Environment image (HDR/EXR/PNG); defaults to the last one used
    #[arg(long)]
    skybox: Option<PathBuf>,

    /// WGSL tracing program (entry point `main`)
    #[arg(long, required_unless_present = "dry_run")]
    shader: Option<PathBuf>,

    /// Number of progressive frames to accumulate
    #[arg(long, default_value_t = 64)]
    frames: u32,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Sphere scattering seed
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum number of spheres to place
    #[arg(long)]
    spheres: Option<u32>,

    #[arg(short, long, default_value = "tracer.png")]
    output: PathBuf,

    /// Run on the CPU recording backend and print statistics
    #[arg(long)]
    dry_run: bool,

    /// Disable temporal averaging (every frame starts over)
    #[arg(long)]
    no_temporal: bool,

    /// Use the basic program layout (40-byte spheres, no lens)
    #[arg(long)]
    basic: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let _trace_guard = init_tracing();

    let args = Args::parse();
    let settings = resolve_settings(&args)?;
    log::info!(
        "{}x{}, {} frames, {:?}, seed {}",
        settings.width,
        settings.height,
        args.frames,
        settings.variant,
        settings.sphere_seed
    );

    if args.dry_run {
        dry_run(&settings, args.frames)
    } else {
        render(&args, &settings)
    }
}

/// Saved settings with command line overrides applied.
fn resolve_settings(args: &Args) -> anyhow::Result<TracerSettings> {
    let mut settings = TracerSettings::load();
    if let Some(w) = args.width {
        settings.width = w;
    }
    if let Some(h) = args.height {
        settings.height = h;
    }
    if let Some(seed) = args.seed {
        settings.sphere_seed = seed;
    }
    if let Some(n) = args.spheres {
        settings.spheres_max = n;
    }
    if args.no_temporal {
        settings.temporal_average = false;
    }
    if args.basic {
        settings.variant = SceneVariant::Basic;
    }
    if args.skybox.is_some() {
        settings.last_skybox = args.skybox.clone();
    }
    settings.validate()?;
    Ok(settings)
}

fn demo_camera(settings: &TracerSettings) -> CameraState {
    let aspect = settings.width as f32 / settings.height as f32;
    CameraState::look_at(Vec3::new(0.0, 12.0, -32.0), Vec3::new(0.0, 1.0, 0.0), 60.0, aspect)
}

fn register_demo_meshes<K: ComputeBackend>(tracer: &PathTracer<K>) {
    let mut registry = tracer.registry().lock();
    registry.register(Arc::new(RenderableMesh::cube(
        "cube",
        Mat4::from_scale_rotation_translation(
            Vec3::splat(4.0),
            Quat::from_rotation_y(0.6),
            Vec3::new(0.0, 2.0, 0.0),
        ),
    )));
    registry.register(Arc::new(RenderableMesh::quad(
        "ground",
        Mat4::from_scale(Vec3::new(80.0, 1.0, 80.0)),
    )));
}

fn run_frames<K: ComputeBackend>(
    tracer: &mut PathTracer<K>,
    inputs: &FrameInputs<'_, K::Texture>,
    surface: &K::Surface,
    frames: u32,
) -> anyhow::Result<()> {
    for i in 0..frames {
        let _span = tracing::info_span!("frame", index = i).entered();
        if tracer.frame(inputs, surface)?.is_none() {
            log::warn!("zero-sized output, frame {i} skipped");
        }
    }
    Ok(())
}

fn dry_run(settings: &TracerSettings, frames: u32) -> anyhow::Result<()> {
    let mut tracer = PathTracer::new(RecordingBackend::new(), settings);
    register_demo_meshes(&tracer);

    let camera = demo_camera(settings);
    let light = DirectionalLight::default();
    let lens = settings.lens();
    let skybox = RecordedTexture {
        label: "dry-run skybox".into(),
    };
    let inputs = FrameInputs {
        camera: &camera,
        light: &light,
        lens: &lens,
        skybox: &skybox,
    };
    let surface = RecordedSurface::new(settings.width, settings.height);

    run_frames(&mut tracer, &inputs, &surface, frames)?;

    let buffers = tracer.buffers();
    println!("spheres:      {}", buffers.spheres().len());
    println!("mesh objects: {}", buffers.mesh_objects().len());
    println!("vertices:     {}", buffers.vertices().len());
    println!("indices:      {}", buffers.indices().len());
    println!("samples:      {}", tracer.sample_count());

    tracer.deactivate();
    let stats = tracer.backend().stats();
    println!("{stats:#?}");
    println!(
        "live after teardown: {} buffers, {} targets",
        tracer.backend().live_buffers(),
        tracer.backend().live_targets()
    );
    Ok(())
}

fn render(args: &Args, settings: &TracerSettings) -> anyhow::Result<()> {
    let shader_path = args.shader.as_ref().ok_or_else(|| anyhow!("--shader is required"))?;
    let program = std::fs::read_to_string(shader_path)
        .with_context(|| format!("reading {}", shader_path.display()))?;

    let (device, queue) = request_headless_device()?;
    let backend = WgpuBackend::new(device, queue, &program, wgpu::TextureFormat::Rgba8Unorm);

    let skybox = match &settings.last_skybox {
        Some(path) => SkyboxTexture::load(backend.device(), backend.queue(), path)
            .with_context(|| format!("loading skybox {}", path.display()))?,
        None => {
            log::info!("no skybox given, using a flat sky");
            SkyboxTexture::solid(backend.device(), backend.queue(), [0.6, 0.7, 0.9, 1.0])
        }
    };
    let surface = OutputSurface::offscreen(backend.device(), settings.width, settings.height);

    let mut tracer = PathTracer::new(backend, settings);
    register_demo_meshes(&tracer);

    let camera = demo_camera(settings);
    let light = DirectionalLight::default();
    let lens = settings.lens();
    let inputs = FrameInputs {
        camera: &camera,
        light: &light,
        lens: &lens,
        skybox: &skybox,
    };

    let start = std::time::Instant::now();
    run_frames(&mut tracer, &inputs, &surface, args.frames)?;
    log::info!(
        "{} samples in {:.2}s",
        tracer.sample_count(),
        start.elapsed().as_secs_f32()
    );

    let pixels = surface.read_rgba8(tracer.backend().device(), tracer.backend().queue())?;
    let (width, height) = surface.size;
    let image = image::RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow!("readback size mismatch"))?;
    image
        .save(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!("wrote {}", args.output.display());

    tracer.deactivate();
    settings.save();
    Ok(())
}

/// Console span output filtered by `RUST_LOG`; with the `chrome-trace`
/// feature and `TRACER_TRACE=1`, also write `trace.json`.
#[cfg(feature = "chrome-trace")]
fn init_tracing() -> Option<tracing_chrome::FlushGuard> {
    use tracing_subscriber::prelude::*;

    let fmt = tracing_subscriber::fmt::layer().with_filter(tracing_subscriber::EnvFilter::from_default_env());
    if std::env::var("TRACER_TRACE").ok().as_deref() != Some("1") {
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry().with(fmt));
        return None;
    }

    let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .file("trace.json")
        .build();
    let subscriber = tracing_subscriber::registry().with(fmt).with(chrome_layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    Some(guard)
}

#[cfg(not(feature = "chrome-trace"))]
fn init_tracing() -> Option<()> {
    use tracing_subscriber::prelude::*;

    let fmt = tracing_subscriber::fmt::layer().with_filter(tracing_subscriber::EnvFilter::from_default_env());
    let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry().with(fmt));
    None
}

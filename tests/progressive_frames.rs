//! Frame loop behavior on the recording backend: accumulation weights,
//! reset triggers, resizing and teardown.

use glam::{Mat4, Vec3};
use std::sync::Arc;

use progressive_tracer::gpu::recording::{Event, RecordedSurface, RecordedTexture, RecordingBackend};
use progressive_tracer::gpu::BufferBinding;
use progressive_tracer::params::{CameraState, DirectionalLight, Lens, ParameterBinder};
use progressive_tracer::scene::{RenderableMesh, SceneVariant};
use progressive_tracer::{FrameInputs, PathTracer, TracerSettings};

struct Inputs {
    camera: CameraState,
    light: DirectionalLight,
    lens: Lens,
    skybox: RecordedTexture,
}

impl Inputs {
    fn new() -> Self {
        Self::looking_from(Vec3::new(0.0, 8.0, -25.0))
    }

    fn looking_from(eye: Vec3) -> Self {
        Self {
            camera: CameraState::look_at(eye, Vec3::ZERO, 60.0, 4.0 / 3.0),
            light: DirectionalLight::default(),
            lens: Lens::default(),
            skybox: RecordedTexture::default(),
        }
    }

    fn frame(&self) -> FrameInputs<'_, RecordedTexture> {
        FrameInputs {
            camera: &self.camera,
            light: &self.light,
            lens: &self.lens,
            skybox: &self.skybox,
        }
    }
}

fn tracer(settings: &TracerSettings) -> PathTracer<RecordingBackend> {
    PathTracer::with_binder(
        RecordingBackend::new(),
        settings,
        ParameterBinder::with_seed(settings.variant, 7),
    )
}

#[test]
fn test_static_camera_converges() {
    let mut pt = tracer(&TracerSettings::default());
    let inputs = Inputs::new();
    let surface = RecordedSurface::new(800, 600);

    for _ in 0..4 {
        pt.frame(&inputs.frame(), &surface).unwrap();
    }
    assert_eq!(pt.backend().accumulate_weights(), vec![1.0, 0.5, 1.0 / 3.0, 0.25]);
    assert_eq!(pt.sample_count(), 4);
}

#[test]
fn test_sample_count_grows_by_one() {
    let mut pt = tracer(&TracerSettings::default());
    let inputs = Inputs::new();
    let surface = RecordedSurface::new(64, 64);

    let mut prev = pt.sample_count();
    for _ in 0..10 {
        let stats = pt.frame(&inputs.frame(), &surface).unwrap().unwrap();
        assert_eq!(stats.sample_count, prev + 1);
        prev = stats.sample_count;
    }
}

#[test]
fn test_camera_move_resets() {
    let mut pt = tracer(&TracerSettings::default());
    let a = Inputs::new();
    let b = Inputs::looking_from(Vec3::new(3.0, 8.0, -25.0));
    let surface = RecordedSurface::new(64, 64);

    pt.frame(&a.frame(), &surface).unwrap();
    pt.frame(&a.frame(), &surface).unwrap();
    pt.frame(&b.frame(), &surface).unwrap();
    pt.frame(&b.frame(), &surface).unwrap();

    assert_eq!(pt.backend().accumulate_weights(), vec![1.0, 0.5, 1.0, 0.5]);
}

#[test]
fn test_request_reset_is_one_shot() {
    let mut pt = tracer(&TracerSettings::default());
    let inputs = Inputs::new();
    let surface = RecordedSurface::new(64, 64);

    pt.frame(&inputs.frame(), &surface).unwrap();
    pt.frame(&inputs.frame(), &surface).unwrap();
    pt.request_reset();
    pt.frame(&inputs.frame(), &surface).unwrap();
    pt.frame(&inputs.frame(), &surface).unwrap();

    assert_eq!(pt.backend().accumulate_weights(), vec![1.0, 0.5, 1.0, 0.5]);
}

#[test]
fn test_temporal_average_off_holds_at_zero() {
    let settings = TracerSettings {
        temporal_average: false,
        ..Default::default()
    };
    let mut pt = tracer(&settings);
    let inputs = Inputs::new();
    let surface = RecordedSurface::new(64, 64);

    for _ in 0..3 {
        pt.frame(&inputs.frame(), &surface).unwrap();
    }
    assert_eq!(pt.backend().accumulate_weights(), vec![1.0; 3]);
    assert_eq!(pt.sample_count(), 0);

    pt.set_temporal_average(true);
    pt.frame(&inputs.frame(), &surface).unwrap();
    pt.frame(&inputs.frame(), &surface).unwrap();
    assert_eq!(pt.sample_count(), 2);
}

#[test]
fn test_resize_recreates_targets() {
    let mut pt = tracer(&TracerSettings::default());
    let inputs = Inputs::new();

    pt.frame(&inputs.frame(), &RecordedSurface::new(800, 600)).unwrap();
    pt.frame(&inputs.frame(), &RecordedSurface::new(800, 600)).unwrap();
    assert_eq!(pt.sample_count(), 2);

    let stats = pt
        .frame(&inputs.frame(), &RecordedSurface::new(1920, 1080))
        .unwrap()
        .unwrap();
    assert!(stats.targets_recreated);
    assert_eq!(stats.groups, (240, 135, 1));
    assert_eq!(stats.weight, 1.0);
    assert_eq!(stats.sample_count, 1);

    let backend = pt.backend();
    assert_eq!(backend.stats().targets_created, 4);
    assert_eq!(backend.stats().targets_released, 2);
    assert_eq!(backend.live_targets(), 2);
    let sizes: Vec<_> = backend
        .events()
        .iter()
        .filter_map(|e| match e {
            Event::CreateTarget { width, height, .. } => Some((*width, *height)),
            _ => None,
        })
        .collect();
    assert_eq!(sizes, vec![(800, 600), (800, 600), (1920, 1080), (1920, 1080)]);
}

#[test]
fn test_zero_size_surface_skips_frame() {
    let mut pt = tracer(&TracerSettings::default());
    let inputs = Inputs::new();

    assert!(pt.frame(&inputs.frame(), &RecordedSurface::new(0, 600)).unwrap().is_none());
    assert_eq!(pt.backend().stats().dispatches, 0);
    assert_eq!(pt.backend().live_targets(), 0);
    assert_eq!(pt.sample_count(), 0);
}

#[test]
fn test_dispatch_covers_odd_sizes() {
    let mut pt = tracer(&TracerSettings::default());
    let inputs = Inputs::new();

    let stats = pt
        .frame(&inputs.frame(), &RecordedSurface::new(801, 599))
        .unwrap()
        .unwrap();
    assert_eq!(stats.groups, (101, 75, 1));
}

#[test]
fn test_frame_event_order() {
    let mut pt = tracer(&TracerSettings::default());
    let inputs = Inputs::new();
    let surface = RecordedSurface::new(64, 64);

    pt.frame(&inputs.frame(), &surface).unwrap();
    let tail: Vec<_> = pt
        .backend()
        .events()
        .iter()
        .filter(|e| {
            matches!(
                e,
                Event::Dispatch { .. } | Event::Accumulate { .. } | Event::Present { .. } | Event::Submit
            )
        })
        .cloned()
        .collect();
    assert_eq!(tail.len(), 4);
    assert!(matches!(tail[0], Event::Dispatch { groups: (8, 8, 1), .. }));
    assert_eq!(tail[1], Event::Accumulate { weight: 1.0 });
    assert_eq!(tail[2], Event::Present { width: 64, height: 64 });
    assert_eq!(tail[3], Event::Submit);
}

#[test]
fn test_teardown_releases_everything() {
    let mut pt = tracer(&TracerSettings::default());
    pt.registry()
        .lock()
        .register(Arc::new(RenderableMesh::cube("cube", Mat4::IDENTITY)));
    let inputs = Inputs::new();
    let surface = RecordedSurface::new(64, 64);

    pt.frame(&inputs.frame(), &surface).unwrap();
    assert!(pt.backend().live_buffers() > 0);

    pt.deactivate();
    assert!(!pt.is_active());
    assert_eq!(pt.backend().live_buffers(), 0);
    assert_eq!(pt.backend().live_targets(), 0);
    for binding in BufferBinding::ALL {
        assert_eq!(pt.backend().bound(binding), None);
    }

    // Reactivation rebuilds the registered meshes
    let stats = pt.frame(&inputs.frame(), &surface).unwrap().unwrap();
    assert_eq!(stats.sample_count, 1);
    assert_eq!(pt.buffers().mesh_objects().len(), 1);
    assert_eq!(pt.backend().live_buffers(), 4);
}

#[test]
fn test_basic_variant_binds_no_lens() {
    let settings = TracerSettings {
        variant: SceneVariant::Basic,
        ..Default::default()
    };
    let mut pt = tracer(&settings);
    let inputs = Inputs::new();
    pt.frame(&inputs.frame(), &RecordedSurface::new(32, 32)).unwrap();

    let uniform = pt.backend().uniform().unwrap();
    assert_eq!(uniform.aperture, 0.0);
    assert_eq!(uniform.focus_distance, 0.0);
    assert_eq!(
        pt.buffers().slot(BufferBinding::Spheres).stride(),
        Some(trace_layout::BASIC_SPHERE_STRIDE)
    );
}

#[test]
fn test_missing_skybox_is_error() {
    use progressive_tracer::accumulation::AccumulationController;
    use progressive_tracer::renderer::FrameRenderer;

    let mut backend = RecordingBackend::new();
    let mut acc = AccumulationController::new(true);
    let err = FrameRenderer::new()
        .render_frame(&mut backend, &mut acc, &RecordedSurface::new(16, 16))
        .unwrap_err();
    assert!(matches!(err, progressive_tracer::Error::MissingResource("_SkyboxTexture")));
    assert_eq!(backend.stats().presents, 0);
}

fn presented_red(pt: &PathTracer<RecordingBackend>) -> f32 {
    pt.backend().presented()[0][0]
}

fn trace_value(pt: &mut PathTracer<RecordingBackend>, inputs: &Inputs, surface: &RecordedSurface, v: f32) {
    pt.backend_mut().set_trace_output([v, v, v, 1.0]);
    pt.frame(&inputs.frame(), surface).unwrap();
}

#[test]
fn test_converged_pixel_is_mean_of_frames() {
    let mut pt = tracer(&TracerSettings::default());
    let inputs = Inputs::new();
    let surface = RecordedSurface::new(4, 3);

    for v in [1.0, 2.0, 3.0, 4.0] {
        trace_value(&mut pt, &inputs, &surface, v);
    }
    let presented = pt.backend().presented();
    assert_eq!(presented.len(), 12);
    for px in presented {
        assert!((px[0] - 2.5).abs() < 1e-6, "pixel {px:?}");
        assert_eq!(px[3], 1.0);
    }
}

#[test]
fn test_long_run_keeps_converging() {
    let mut pt = tracer(&TracerSettings::default());
    let inputs = Inputs::new();
    let surface = RecordedSurface::new(1, 1);

    for _ in 0..3000 {
        trace_value(&mut pt, &inputs, &surface, 0.1);
    }
    for _ in 0..17000 {
        trace_value(&mut pt, &inputs, &surface, 0.9);
    }
    assert_eq!(pt.sample_count(), 20000);
    // (3000 * 0.1 + 17000 * 0.9) / 20000
    let avg = presented_red(&pt);
    assert!((avg - 0.78).abs() < 1e-3, "average stalled at {avg}");
}

#[test]
fn test_reset_restarts_average() {
    let mut pt = tracer(&TracerSettings::default());
    let inputs = Inputs::new();
    let surface = RecordedSurface::new(2, 2);

    for _ in 0..5 {
        trace_value(&mut pt, &inputs, &surface, 1.0);
    }
    pt.request_reset();
    trace_value(&mut pt, &inputs, &surface, 5.0);
    assert_eq!(presented_red(&pt), 5.0);
    trace_value(&mut pt, &inputs, &surface, 3.0);
    assert_eq!(presented_red(&pt), 4.0);
}

#[test]
fn test_camera_move_restarts_average() {
    let mut pt = tracer(&TracerSettings::default());
    let a = Inputs::new();
    let b = Inputs::looking_from(Vec3::new(0.0, 9.0, -25.0));
    let surface = RecordedSurface::new(2, 2);

    trace_value(&mut pt, &a, &surface, 1.0);
    trace_value(&mut pt, &a, &surface, 3.0);
    assert_eq!(presented_red(&pt), 2.0);
    trace_value(&mut pt, &b, &surface, 7.0);
    assert_eq!(presented_red(&pt), 7.0);
}

#[test]
fn test_resize_restarts_average() {
    let mut pt = tracer(&TracerSettings::default());
    let inputs = Inputs::new();

    trace_value(&mut pt, &inputs, &RecordedSurface::new(8, 6), 1.0);
    trace_value(&mut pt, &inputs, &RecordedSurface::new(8, 6), 3.0);
    assert_eq!(presented_red(&pt), 2.0);

    trace_value(&mut pt, &inputs, &RecordedSurface::new(16, 12), 6.0);
    assert_eq!(pt.backend().presented().len(), 16 * 12);
    assert!(pt.backend().presented().iter().all(|px| px[0] == 6.0));
}

#[test]
fn test_temporal_average_off_shows_latest_frame() {
    let settings = TracerSettings {
        temporal_average: false,
        ..Default::default()
    };
    let mut pt = tracer(&settings);
    let inputs = Inputs::new();
    let surface = RecordedSurface::new(2, 2);

    for v in [1.0, 8.0, 2.0] {
        trace_value(&mut pt, &inputs, &surface, v);
        assert_eq!(presented_red(&pt), v);
    }

    pt.set_temporal_average(true);
    trace_value(&mut pt, &inputs, &surface, 4.0);
    assert_eq!(presented_red(&pt), 4.0);
    trace_value(&mut pt, &inputs, &surface, 6.0);
    assert_eq!(presented_red(&pt), 5.0);
}

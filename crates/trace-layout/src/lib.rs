//! GPU record layouts for the progressive path tracer.
//!
//! Every type here is `#[repr(C)]` + `Pod` and is uploaded verbatim into a
//! storage or uniform buffer. Strides are fixed by the compute program, so
//! the size tests at the bottom of this file are the contract.
//!
//! ## Usage
//!
//! ```ignore
//! use trace_layout::{SphereRecord, SPHERE_STRIDE};
//!
//! let spheres: Vec<SphereRecord> = scatter();
//! let bytes: &[u8] = bytemuck::cast_slice(&spheres);
//! assert_eq!(bytes.len(), spheres.len() * SPHERE_STRIDE);
//! ```

mod records;
mod uniform;

pub use records::{BasicSphereRecord, MeshObjectRecord, SphereRecord, VertexRecord};
pub use uniform::{BlendUniform, FrameUniform};

/// Byte stride of [`SphereRecord`] (depth-of-field variant).
pub const SPHERE_STRIDE: usize = 56;
/// Byte stride of [`BasicSphereRecord`] (no smoothness/emission).
pub const BASIC_SPHERE_STRIDE: usize = 40;
/// Byte stride of [`MeshObjectRecord`].
pub const MESH_OBJECT_STRIDE: usize = 72;
/// Byte stride of one vertex position.
pub const VERTEX_STRIDE: usize = 12;
/// Byte stride of one index.
pub const INDEX_STRIDE: usize = 4;

/// Workgroup tile edge of the tracing program (`@workgroup_size(8, 8, 1)`).
pub const TILE_SIZE: u32 = 8;

/// Running-average compute pass.
///
/// Reads the frame just traced (`working`) and the current average
/// (`converged`), writes `avg + (sample - avg) * weight` into a scratch
/// `rgba32float` target which the host then copies back over `converged`.
/// Everything stays in 32-bit floats so late samples still move the average.
pub const ACCUMULATE_SHADER_SOURCE: &str = r#"
struct Blend {
    weight: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
}

@group(0) @binding(0) var working: texture_2d<f32>;
@group(0) @binding(1) var converged: texture_2d<f32>;
@group(0) @binding(2) var next_avg: texture_storage_2d<rgba32float, write>;
@group(0) @binding(3) var<uniform> blend: Blend;

@compute @workgroup_size(8, 8, 1)
fn accumulate(@builtin(global_invocation_id) id: vec3<u32>) {
    let size = textureDimensions(next_avg);
    if (id.x >= size.x || id.y >= size.y) {
        return;
    }
    let texel = vec2<i32>(id.xy);
    let avg = textureLoad(converged, texel, 0);
    let sample = textureLoad(working, texel, 0);
    textureStore(next_avg, texel, avg + (sample - avg) * blend.weight);
}
"#;

/// Fullscreen pass copying the converged target to the output surface.
pub const PRESENT_SHADER_SOURCE: &str = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
}

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> VsOut {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0)
    );
    var out: VsOut;
    out.pos = vec4<f32>(positions[index], 0.0, 1.0);
    return out;
}

@group(0) @binding(0) var source_tex: texture_2d<f32>;

@fragment
fn fs_present(in: VsOut) -> @location(0) vec4<f32> {
    let texel = vec2<i32>(in.pos.xy);
    return vec4<f32>(textureLoad(source_tex, texel, 0).rgb, 1.0);
}
"#;

/// Number of workgroups needed to cover `width × height` pixels.
pub fn dispatch_groups(width: u32, height: u32) -> (u32, u32, u32) {
    (width.div_ceil(TILE_SIZE), height.div_ceil(TILE_SIZE), 1)
}

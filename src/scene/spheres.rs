//! Procedural sphere scattering.
//!
//! Spheres rest on the ground plane (`y = radius`) at positions drawn inside
//! a disk. Candidates that intersect an already accepted sphere are dropped,
//! not retried, so dense requests simply yield fewer spheres.

use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trace_layout::SphereRecord;

/// Specular reflectance of non-metal spheres.
const DIELECTRIC_SPECULAR: f32 = 0.04;

/// Inputs of one scattering pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterParams {
    pub seed: u64,
    /// Number of candidates, not a guaranteed sphere count.
    pub count: u32,
    /// (min, max) radius
    pub radius: (f32, f32),
    pub placement_radius: f32,
}

impl Default for ScatterParams {
    fn default() -> Self {
        Self {
            seed: 1_223_832_719,
            count: 100,
            radius: (1.0, 3.0),
            placement_radius: 20.0,
        }
    }
}

impl ScatterParams {
    /// Radii ordered and non-negative, placement radius finite and
    /// non-negative. Non-finite values become 0.
    pub fn normalized(&self) -> Self {
        let clean = |v: f32| if v.is_finite() { v.max(0.0) } else { 0.0 };
        let (a, b) = (clean(self.radius.0), clean(self.radius.1));
        Self {
            radius: (a.min(b), a.max(b)),
            placement_radius: clean(self.placement_radius),
            ..*self
        }
    }
}

/// Generate the sphere list for `params`. Same params, same list.
#[tracing::instrument(skip_all, fields(seed = params.seed, count = params.count))]
pub fn scatter_spheres(params: &ScatterParams) -> Vec<SphereRecord> {
    let params = &params.normalized();
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut spheres: Vec<SphereRecord> = Vec::new();
    let (min_r, max_r) = params.radius;

    for _ in 0..params.count {
        let radius = min_r + rng.gen::<f32>() * (max_r - min_r);
        let planar = inside_unit_circle(&mut rng) * params.placement_radius;

        let mut sphere = SphereRecord {
            position: [planar.x, radius, planar.y],
            radius,
            ..Default::default()
        };

        if spheres.iter().any(|other| sphere.overlaps(other)) {
            continue;
        }

        let color = random_color_hsv(&mut rng).to_array();
        let metal = rng.gen::<f32>() < 0.5;
        let dielectric = [DIELECTRIC_SPECULAR; 3];
        sphere.albedo = if metal { [0.0; 3] } else { color };
        sphere.specular = if metal { color } else { dielectric };
        // Coin flip overrides the default of 0, independent of `metal`.
        if rng.gen::<f32>() < 0.5 {
            sphere.smoothness = 1.0;
        }
        sphere.emissive = if metal { color } else { dielectric };

        spheres.push(sphere);
    }

    tracing::debug!("accepted {} of {} candidates", spheres.len(), params.count);
    spheres
}

/// Uniform point inside the unit disk.
fn inside_unit_circle(rng: &mut impl Rng) -> Vec2 {
    let angle = rng.gen::<f32>() * std::f32::consts::TAU;
    let r = rng.gen::<f32>().sqrt();
    Vec2::new(angle.cos(), angle.sin()) * r
}

/// Random color with hue, saturation and value each uniform in [0, 1].
fn random_color_hsv(rng: &mut impl Rng) -> Vec3 {
    let h = rng.gen::<f32>();
    let s = rng.gen::<f32>();
    let v = rng.gen::<f32>();
    hsv_to_rgb(h, s, v)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    if s <= 0.0 {
        return Vec3::splat(v);
    }
    let h6 = (h.fract() * 6.0).min(5.999_999);
    let sector = h6.floor();
    let f = h6 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match sector as u32 {
        0 => Vec3::new(v, t, p),
        1 => Vec3::new(q, v, p),
        2 => Vec3::new(p, v, t),
        3 => Vec3::new(p, q, v),
        4 => Vec3::new(t, p, v),
        _ => Vec3::new(v, p, q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let params = ScatterParams::default();
        let a = scatter_spheres(&params);
        let b = scatter_spheres(&params);
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_changes_layout() {
        let a = scatter_spheres(&ScatterParams::default());
        let b = scatter_spheres(&ScatterParams { seed: 7, ..Default::default() });
        assert_ne!(a, b);
    }

    #[test]
    fn test_no_overlap() {
        let spheres = scatter_spheres(&ScatterParams::default());
        assert!(spheres.len() <= 100);
        for (i, a) in spheres.iter().enumerate() {
            for b in &spheres[i + 1..] {
                let min_dist = a.radius + b.radius;
                assert!(a.center().distance_squared(b.center()) >= min_dist * min_dist);
            }
        }
    }

    #[test]
    fn test_spheres_rest_on_ground_inside_disk() {
        let params = ScatterParams::default();
        for s in scatter_spheres(&params) {
            assert!(s.radius >= 1.0 && s.radius <= 3.0);
            assert_eq!(s.position[1], s.radius);
            let planar = Vec2::new(s.position[0], s.position[2]);
            assert!(planar.length() <= params.placement_radius + 1e-4);
        }
    }

    #[test]
    fn test_material_classification() {
        for s in scatter_spheres(&ScatterParams::default()) {
            let metal = s.albedo == [0.0; 3] && s.specular != [DIELECTRIC_SPECULAR; 3];
            if metal {
                assert_eq!(s.emissive, s.specular);
            } else {
                assert_eq!(s.specular, [DIELECTRIC_SPECULAR; 3]);
                assert_eq!(s.emissive, [DIELECTRIC_SPECULAR; 3]);
            }
            assert!(s.smoothness == 0.0 || s.smoothness == 1.0);
        }
    }

    #[test]
    fn test_dense_request_rejects() {
        // Far more volume than the disk can hold
        let params = ScatterParams {
            count: 500,
            radius: (3.0, 3.0),
            placement_radius: 5.0,
            ..Default::default()
        };
        let spheres = scatter_spheres(&params);
        assert!(!spheres.is_empty());
        assert!(spheres.len() < 500);
    }

    #[test]
    fn test_zero_count() {
        let params = ScatterParams { count: 0, ..Default::default() };
        assert!(scatter_spheres(&params).is_empty());
    }

    #[test]
    fn test_reversed_radius_is_ordered() {
        let forward = scatter_spheres(&ScatterParams::default());
        let reversed = scatter_spheres(&ScatterParams {
            radius: (3.0, 1.0),
            ..Default::default()
        });
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_bad_ranges_are_clamped() {
        let params = ScatterParams {
            radius: (-2.0, f32::INFINITY),
            placement_radius: f32::NAN,
            count: 10,
            ..Default::default()
        };
        let n = params.normalized();
        assert_eq!(n.radius, (0.0, 0.0));
        assert_eq!(n.placement_radius, 0.0);

        for s in scatter_spheres(&params) {
            assert!(s.radius >= 0.0);
            assert!(s.position.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(hsv_to_rgb(0.0, 0.0, 0.5), Vec3::splat(0.5));
        let green = hsv_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!((green - Vec3::new(0.0, 1.0, 0.0)).abs().max_element() < 1e-5);
    }
}

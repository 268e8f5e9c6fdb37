use glam::DVec3;
use rayon::prelude::*;

use crate::enums::Interpolation;
use crate::interpolator::Interpolator;
use crate::render::camera::OrbitCamera;
use crate::render::lut::TransferFunction;
use crate::volume::Volume;

/// Stop marching once accumulated opacity reaches this value.
const OPACITY_CUTOFF: f32 = 0.95;

/// Front-to-back compositing ray caster with an orthographic projection.
#[derive(Debug, Clone)]
pub struct RayCaster {
    pub max_samples: u32,
    pub background: [f32; 3],
}

/// One scalar field with its transfer function.
pub struct Subject<'a> {
    pub volume: &'a Volume<i16>,
    pub transfer: &'a TransferFunction,
    pub interpolation: Interpolation,
}

impl RayCaster {
    /// Renders `subjects` (sharing one geometry) into `width * height` RGBA
    /// pixels, row-major from the top.
    pub fn render(
        &self,
        subjects: &[Subject<'_>],
        camera: &OrbitCamera,
        width: u32,
        height: u32,
    ) -> Vec<[u8; 4]> {
        let Some(first) = subjects.first() else {
            return vec![to_rgba(self.background); (width * height) as usize];
        };
        let geometry = first.volume.geometry();
        let (lower, upper) = geometry.bounds();
        let (lower, upper) = (DVec3::from(lower), DVec3::from(upper));
        let center = (lower + upper) * 0.5;
        let half_diagonal = (0.5 * lower.distance(upper)).max(f64::EPSILON);

        let (right, up, forward) = camera.basis();
        let field = 2.0 * half_diagonal / camera.zoom;
        let pixel = field / width.min(height).max(1) as f64;
        let step = (2.0 * half_diagonal / self.max_samples.max(1) as f64).max(geometry.min_spacing() * 0.5);

        (0..height)
            .into_par_iter()
            .flat_map_iter(|row| {
                (0..width).map(move |column| {
                    let sx = (column as f64 + 0.5 - width as f64 / 2.0) * pixel;
                    let sy = (height as f64 / 2.0 - row as f64 - 0.5) * pixel;
                    let origin = center + right * sx + up * sy - forward * (2.0 * half_diagonal);
                    let color = match intersect(origin, forward, lower, upper) {
                        Some((t0, t1)) => self.march(subjects, origin, forward, t0, t1, step),
                        None => self.background,
                    };
                    to_rgba(color)
                })
            })
            .collect()
    }

    fn march(
        &self,
        subjects: &[Subject<'_>],
        origin: DVec3,
        direction: DVec3,
        t0: f64,
        t1: f64,
        step: f64,
    ) -> [f32; 3] {
        let mut color = [0.0f32; 3];
        let mut alpha = 0.0f32;
        let mut t = t0;

        while t <= t1 && alpha < OPACITY_CUTOFF {
            let point = (origin + direction * t).to_array();
            for subject in subjects {
                let index = subject.volume.geometry().physical_to_array(point);
                let Some(value) = Interpolator::sample(subject.volume.data(), index, subject.interpolation)
                else {
                    continue;
                };
                let (rgb, a) = subject.transfer.classify(value);
                if a <= 0.0 {
                    continue;
                }
                let weight = (1.0 - alpha) * a;
                for c in 0..3 {
                    color[c] += weight * rgb[c];
                }
                alpha += weight;
            }
            t += step;
        }

        [0, 1, 2].map(|c| color[c] + (1.0 - alpha) * self.background[c])
    }
}

/// Slab test against an axis-aligned box; returns the entry/exit parameters.
fn intersect(origin: DVec3, direction: DVec3, lower: DVec3, upper: DVec3) -> Option<(f64, f64)> {
    let parallel = direction.abs().cmplt(DVec3::splat(1e-12));
    if (parallel & (origin.cmplt(lower) | origin.cmpgt(upper))).any() {
        return None;
    }
    let a = DVec3::select(parallel, DVec3::NEG_INFINITY, (lower - origin) / direction);
    let b = DVec3::select(parallel, DVec3::INFINITY, (upper - origin) / direction);
    let t_near = a.min(b).max_element();
    let t_far = a.max(b).min_element();
    (t_near <= t_far && t_far >= 0.0).then_some((t_near.max(0.0), t_far))
}

pub(crate) fn to_rgba(rgb: [f32; 3]) -> [u8; 4] {
    let [r, g, b] = rgb.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
    [r, g, b, 255]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{Extent, Geometry};

    fn cube() -> Volume<i16> {
        let g = Geometry::new(Extent::from_dims([16, 16, 16]), [1.0; 3], [0.0; 3]);
        Volume::from_fn(g, |p| {
            if p.iter().all(|c| (4..12).contains(c)) { 1000 } else { 0 }
        })
        .unwrap()
    }

    #[test]
    fn slab_test_hits_and_misses() {
        let (lower, upper) = (DVec3::ZERO, DVec3::ONE);
        assert_eq!(intersect(DVec3::new(-1.0, 0.5, 0.5), DVec3::X, lower, upper), Some((1.0, 2.0)));
        assert_eq!(intersect(DVec3::new(-1.0, 2.0, 0.5), DVec3::X, lower, upper), None);
        assert_eq!(intersect(DVec3::new(0.5, 0.5, 3.0), DVec3::NEG_Z, lower, upper), Some((2.0, 3.0)));
        assert_eq!(intersect(DVec3::new(0.5, 0.5, 3.0), DVec3::Z, lower, upper), None);
    }

    #[test]
    fn opaque_center_is_brighter_than_the_corners() {
        let volume = cube();
        let tf = TransferFunction::background_suppressing(0.0, 1000.0, 0.1, 0.5);
        let caster = RayCaster {
            max_samples: 128,
            background: [0.0, 0.0, 0.0],
        };
        let pixels = caster.render(
            &[Subject {
                volume: &volume,
                transfer: &tf,
                interpolation: Interpolation::Nearest,
            }],
            &OrbitCamera::default(),
            32,
            32,
        );
        assert_eq!(pixels.len(), 32 * 32);
        let center = pixels[16 * 32 + 16];
        let corner = pixels[0];
        assert!(center[0] > 100, "{center:?}");
        assert_eq!(corner, [0, 0, 0, 255]);
    }

    #[test]
    fn no_subjects_render_background() {
        let caster = RayCaster {
            max_samples: 16,
            background: [0.0, 0.01, 0.05],
        };
        let pixels = caster.render(&[], &OrbitCamera::default(), 4, 4);
        assert!(pixels.iter().all(|p| *p == to_rgba([0.0, 0.01, 0.05])));
    }
}

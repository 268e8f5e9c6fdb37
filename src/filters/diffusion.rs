use ndarray::{Array3, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::volume::Volume;

/// Spatial dimensionality the diffusion stability bound is derived for.
const DIMENSION: i32 = 3;

/// Gradient anisotropic diffusion parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionParams {
    pub iterations: u32,
    pub conductance: f64,
    pub time_step: f64,
}

impl Default for DiffusionParams {
    fn default() -> Self {
        Self {
            iterations: 20,
            conductance: 3.0,
            time_step: 0.04,
        }
    }
}

impl DiffusionParams {
    /// Largest stable explicit time step for an N-dimensional grid: `1 / 2^(N+1)`.
    pub fn stability_limit() -> f64 {
        1.0 / 2f64.powi(DIMENSION + 1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::invalid("iterations", "must be at least 1"));
        }
        if !(self.conductance.is_finite() && self.conductance > 0.0) {
            return Err(Error::invalid(
                "conductance",
                format!("must be positive, got {}", self.conductance),
            ));
        }
        let limit = Self::stability_limit();
        if !(self.time_step > 0.0 && self.time_step <= limit) {
            return Err(Error::invalid(
                "time_step",
                format!("must lie in (0, {limit}], got {}", self.time_step),
            ));
        }
        Ok(())
    }
}

/// Edge-preserving smoothing (Perona-Malik with exponential conductance).
///
/// The conductance constant is rescaled each iteration by the mean squared
/// gradient magnitude, so `conductance` is unitless. Borders are zero-flux.
pub fn anisotropic_diffusion(volume: &Volume<f32>, params: &DiffusionParams) -> Result<Volume<f32>> {
    params.validate()?;
    let spacing = volume.spacing();
    let mut current = volume.data().clone();

    for iteration in 0..params.iterations {
        let mean_sq = mean_squared_gradient(&current, spacing);
        if mean_sq <= f64::EPSILON {
            tracing::debug!(iteration, "diffusion reached a flat field");
            break;
        }
        let k = 2.0 * mean_sq * params.conductance * params.conductance;
        current = diffusion_step(&current, spacing, k, params.time_step);
    }

    Ok(volume.with_data(current))
}

fn mean_squared_gradient(data: &Array3<f32>, spacing: [f64; 3]) -> f64 {
    let (depth, height, width) = data.dim();
    let total: f64 = Zip::indexed(data)
        .par_map_collect(|(z, y, x), _| {
            let mut sum = 0.0;
            for (axis, h) in spacing.iter().enumerate() {
                let (lo, hi) = neighbours((z, y, x), (depth, height, width), axis);
                let span = (hi.index(axis) - lo.index(axis)) as f64;
                if span > 0.0 {
                    let d = (data[hi.tuple()] as f64 - data[lo.tuple()] as f64) / (span * h);
                    sum += d * d;
                }
            }
            sum
        })
        .sum();
    total / data.len().max(1) as f64
}

fn diffusion_step(data: &Array3<f32>, spacing: [f64; 3], k: f64, time_step: f64) -> Array3<f32> {
    let (depth, height, width) = data.dim();
    let conduct = |d: f64| (-(d * d) / k).exp();

    Zip::indexed(data).par_map_collect(|(z, y, x), &value| {
        let center = value as f64;
        let mut update = 0.0;
        for (axis, h) in spacing.iter().enumerate() {
            let (lo, hi) = neighbours((z, y, x), (depth, height, width), axis);
            let forward = if hi.index(axis) != Idx(z, y, x).index(axis) {
                (data[hi.tuple()] as f64 - center) / h
            } else {
                0.0
            };
            let backward = if lo.index(axis) != Idx(z, y, x).index(axis) {
                (center - data[lo.tuple()] as f64) / h
            } else {
                0.0
            };
            update += (conduct(forward) * forward - conduct(backward) * backward) / h;
        }
        (center + time_step * update) as f32
    })
}

#[derive(Clone, Copy)]
struct Idx(usize, usize, usize);

impl Idx {
    fn tuple(self) -> (usize, usize, usize) {
        (self.0, self.1, self.2)
    }

    /// Coordinate along a `(x, y, z)` axis.
    fn index(self, axis: usize) -> usize {
        match axis {
            0 => self.2,
            1 => self.1,
            _ => self.0,
        }
    }
}

/// Clamped previous/next neighbours along a `(x, y, z)` axis.
fn neighbours(
    (z, y, x): (usize, usize, usize),
    (depth, height, width): (usize, usize, usize),
    axis: usize,
) -> (Idx, Idx) {
    match axis {
        0 => (
            Idx(z, y, x.saturating_sub(1)),
            Idx(z, y, (x + 1).min(width - 1)),
        ),
        1 => (
            Idx(z, y.saturating_sub(1), x),
            Idx(z, (y + 1).min(height - 1), x),
        ),
        _ => (
            Idx(z.saturating_sub(1), y, x),
            Idx((z + 1).min(depth - 1), y, x),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{Extent, Geometry};

    fn noisy_step() -> Volume<f32> {
        let g = Geometry::new(Extent::from_dims([16, 8, 4]), [1.0; 3], [0.0; 3]);
        Volume::from_fn(g, |[x, y, z]| {
            let base = if x < 8 { 100.0 } else { 1000.0 };
            let noise = if (x + y + z) % 2 == 0 { 5.0 } else { -5.0 };
            base + noise
        })
        .unwrap()
    }

    #[test]
    fn stability_limit_for_three_dimensions() {
        assert_eq!(DiffusionParams::stability_limit(), 0.0625);
        assert!(DiffusionParams::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_parameters_are_rejected_not_clamped() {
        let unstable = DiffusionParams {
            time_step: 0.07,
            ..Default::default()
        };
        assert!(matches!(
            unstable.validate(),
            Err(Error::InvalidParameter { name: "time_step", .. })
        ));
        let zero_iterations = DiffusionParams {
            iterations: 0,
            ..Default::default()
        };
        assert!(zero_iterations.validate().is_err());
        let negative_conductance = DiffusionParams {
            conductance: -1.0,
            ..Default::default()
        };
        assert!(negative_conductance.validate().is_err());
    }

    #[test]
    fn smoothing_reduces_noise_but_keeps_the_edge() {
        let input = noisy_step();
        let output = anisotropic_diffusion(&input, &DiffusionParams::default()).unwrap();
        let before = (input.get([3, 3, 1]).unwrap() - input.get([4, 3, 1]).unwrap()).abs();
        let after = (output.get([3, 3, 1]).unwrap() - output.get([4, 3, 1]).unwrap()).abs();
        assert!(after < before);
        let edge = output.get([9, 3, 1]).unwrap() - output.get([6, 3, 1]).unwrap();
        assert!(edge > 700.0, "edge contrast collapsed to {edge}");
    }

    #[test]
    fn flat_field_is_unchanged() {
        let g = Geometry::new(Extent::from_dims([4, 4, 4]), [1.0; 3], [0.0; 3]);
        let flat = Volume::from_fn(g, |_| 42.0f32).unwrap();
        let output = anisotropic_diffusion(&flat, &DiffusionParams::default()).unwrap();
        assert_eq!(output, flat);
    }
}

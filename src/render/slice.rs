use glam::{DMat4, DVec3};
use ndarray::Array2;
use rayon::prelude::*;

use crate::enums::{Interpolation, Orientation};
use crate::interpolator::Interpolator;
use crate::planes::ReslicePlaneSet;
use crate::volume::Volume;
use crate::voxel::Voxel;

/// Sampling lattice of a reslice output, in plane-local physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResliceGrid {
    pub width: u32,
    pub height: u32,
    /// Physical distance between neighbouring output pixels.
    pub spacing: f64,
    /// Plane-local `(u, v)` shown at the center of the output.
    pub center: [f64; 2],
}

impl ResliceGrid {
    /// Plane-local coordinates of output pixel `(column, row)`; rows run top
    /// to bottom, `v` grows upwards.
    #[inline]
    pub fn local(&self, column: u32, row: u32) -> [f64; 2] {
        let u = self.center[0] + (column as f64 + 0.5 - self.width as f64 / 2.0) * self.spacing;
        let v = self.center[1] + (self.height as f64 / 2.0 - row as f64 - 0.5) * self.spacing;
        [u, v]
    }
}

/// Physical size of one slice-view pixel: the largest volume dimension fits
/// the shorter viewport side at zoom 1.
pub fn units_per_pixel(planes: &ReslicePlaneSet, [width, height]: [u32; 2], zoom: f64) -> f64 {
    let field = Orientation::ALL
        .iter()
        .map(|axis| planes.physical_size(*axis))
        .fold(0.0, f64::max)
        .max(f64::EPSILON);
    field / (width.min(height).max(1) as f64 * zoom)
}

/// Cuts `volume` with the plane described by `axes` and samples it on `grid`.
///
/// Points outside the volume read as `background`.
pub fn reslice<T: Voxel>(
    volume: &Volume<T>,
    axes: &DMat4,
    grid: &ResliceGrid,
    interpolation: Interpolation,
    background: f32,
) -> Array2<f32> {
    let geometry = volume.geometry();
    let data = volume.data();
    let (width, height) = (grid.width as usize, grid.height as usize);

    let pixels: Vec<f32> = (0..grid.height)
        .into_par_iter()
        .flat_map_iter(|row| {
            (0..grid.width).map(move |column| {
                let [u, v] = grid.local(column, row);
                let world = axes.transform_point3(DVec3::new(u, v, 0.0));
                let point = geometry.physical_to_array(world.to_array());
                Interpolator::sample(data, point, interpolation)
                    .map_or(background, |value| value as f32)
            })
        })
        .collect();

    Array2::from_shape_vec((height, width), pixels)
        .unwrap_or_else(|_| Array2::from_elem((height, width), background))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{Extent, Geometry};

    fn ramp() -> Volume<i16> {
        let g = Geometry::new(Extent::from_dims([10, 10, 10]), [1.0; 3], [0.0; 3]);
        Volume::from_fn(g, |[x, y, z]| (x + 10 * y + 100 * z) as i16).unwrap()
    }

    #[test]
    fn axial_slice_reads_one_z_layer() {
        let volume = ramp();
        let mut planes = ReslicePlaneSet::from_geometry(volume.geometry(), Orientation::Axial);
        planes.set_offset(Orientation::Axial, 3.0);
        let grid = ResliceGrid {
            width: 10,
            height: 10,
            spacing: 1.0,
            center: [0.0, 0.0],
        };
        let image = reslice(
            &volume,
            planes.active_matrix(),
            &grid,
            Interpolation::Nearest,
            -1.0,
        );
        // Grid pixel centers sit half a voxel off the lattice; nearest rounds.
        let z = 300.0;
        for value in image.iter().filter(|v| **v >= 0.0) {
            assert!(*value >= z && *value < z + 100.0, "{value}");
        }
        assert!(image.iter().any(|v| *v >= 0.0));
    }

    #[test]
    fn plane_outside_the_volume_is_background() {
        let volume = ramp();
        let mut planes = ReslicePlaneSet::from_geometry(volume.geometry(), Orientation::Coronal);
        planes.set_offset(Orientation::Coronal, 50.0);
        let grid = ResliceGrid {
            width: 8,
            height: 8,
            spacing: 1.0,
            center: [0.0, 0.0],
        };
        let image = reslice(
            &volume,
            planes.active_matrix(),
            &grid,
            Interpolation::Linear,
            0.0,
        );
        assert!(image.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn grid_is_centered() {
        let grid = ResliceGrid {
            width: 4,
            height: 2,
            spacing: 2.0,
            center: [10.0, -1.0],
        };
        assert_eq!(grid.local(0, 0), [7.0, 0.0]);
        assert_eq!(grid.local(3, 1), [13.0, -2.0]);
    }
}

use ndarray::Array3;

use crate::enums::Interpolation;
use crate::voxel::Voxel;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Samples `data` (stored `(z, y, x)`) at continuous array coordinates
    /// `(x, y, z)`. Points outside the voxel-center hull return `None`.
    #[inline]
    pub(crate) fn sample<T: Voxel>(
        data: &Array3<T>,
        point: [f64; 3],
        interpolation: Interpolation,
    ) -> Option<f64> {
        match interpolation {
            Interpolation::Nearest => Self::nearest(data, point),
            Interpolation::Linear => Self::trilinear(data, point),
        }
    }

    #[inline]
    fn inside(dim: (usize, usize, usize), [x, y, z]: [f64; 3]) -> bool {
        let (depth, height, width) = dim;
        x >= 0.0
            && y >= 0.0
            && z >= 0.0
            && x <= (width - 1) as f64
            && y <= (height - 1) as f64
            && z <= (depth - 1) as f64
    }

    #[inline]
    pub(crate) fn nearest<T: Voxel>(data: &Array3<T>, point: [f64; 3]) -> Option<f64> {
        if !Self::inside(data.dim(), point) {
            return None;
        }
        let [x, y, z] = point.map(|c| c.round() as usize);
        Some(data[[z, y, x]].to_f64())
    }

    #[inline]
    pub(crate) fn trilinear<T: Voxel>(data: &Array3<T>, point: [f64; 3]) -> Option<f64> {
        let (depth, height, width) = data.dim();
        if !Self::inside((depth, height, width), point) {
            return None;
        }
        let [x, y, z] = point;

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let z0 = z.floor() as usize;
        let x1 = (x0 + 1).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);
        let z1 = (z0 + 1).min(depth - 1);

        let dx = x - x0 as f64;
        let dy = y - y0 as f64;
        let dz = z - z0 as f64;

        let v = |z: usize, y: usize, x: usize| data[[z, y, x]].to_f64();

        let c00 = v(z0, y0, x0).mul_add(1.0 - dx, v(z0, y0, x1) * dx);
        let c01 = v(z0, y1, x0).mul_add(1.0 - dx, v(z0, y1, x1) * dx);
        let c10 = v(z1, y0, x0).mul_add(1.0 - dx, v(z1, y0, x1) * dx);
        let c11 = v(z1, y1, x0).mul_add(1.0 - dx, v(z1, y1, x1) * dx);

        let c0 = c00.mul_add(1.0 - dy, c01 * dy);
        let c1 = c10.mul_add(1.0 - dy, c11 * dy);

        Some(c0.mul_add(1.0 - dz, c1 * dz))
    }
}

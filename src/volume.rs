use ndarray::{Array3, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::voxel::Voxel;

/// Inclusive integer index bounds per axis, in `(x, y, z)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub min: [i64; 3],
    pub max: [i64; 3],
}

impl Extent {
    /// Extent starting at zero for an `(x, y, z)` voxel count.
    pub fn from_dims(dims: [usize; 3]) -> Self {
        Self {
            min: [0; 3],
            max: dims.map(|d| d as i64 - 1),
        }
    }

    /// Voxel count per axis in `(x, y, z)` order.
    pub fn dims(&self) -> [usize; 3] {
        [0, 1, 2].map(|i| (self.max[i] - self.min[i] + 1).max(0) as usize)
    }

    pub fn voxel_count(&self) -> usize {
        self.dims().iter().product()
    }

    /// Boundary values are inside.
    pub fn contains(&self, index: [i64; 3]) -> bool {
        (0..3).all(|i| index[i] >= self.min[i] && index[i] <= self.max[i])
    }
}

/// Physical placement of a voxel grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub extent: Extent,
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
}

impl Geometry {
    pub fn new(extent: Extent, spacing: [f64; 3], origin: [f64; 3]) -> Self {
        Self {
            extent,
            spacing,
            origin,
        }
    }

    /// Physical length spanned along each axis: `spacing * (max - min)`.
    pub fn size(&self) -> [f64; 3] {
        [0, 1, 2].map(|i| self.spacing[i] * (self.extent.max[i] - self.extent.min[i]) as f64)
    }

    /// Physical center: `origin + size / 2`.
    pub fn center(&self) -> [f64; 3] {
        let size = self.size();
        [0, 1, 2].map(|i| self.origin[i] + 0.5 * size[i])
    }

    pub fn min_spacing(&self) -> f64 {
        self.spacing.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Physical position of an extent index.
    pub fn index_to_physical(&self, index: [i64; 3]) -> [f64; 3] {
        [0, 1, 2].map(|i| self.origin[i] + self.spacing[i] * index[i] as f64)
    }

    /// Continuous array coordinates `(x, y, z)` of a physical point, relative to
    /// the first stored voxel.
    pub fn physical_to_array(&self, point: [f64; 3]) -> [f64; 3] {
        [0, 1, 2].map(|i| {
            (point[i] - self.origin[i]) / self.spacing[i] - self.extent.min[i] as f64
        })
    }

    /// Physical bounds `(lower, upper)` covered by the voxel centers.
    pub fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        let lower = self.index_to_physical(self.extent.min);
        let upper = self.index_to_physical(self.extent.max);
        (lower, upper)
    }

    fn validate(&self) -> Result<()> {
        if self.spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(Error::invalid(
                "spacing",
                format!("must be positive and finite, got {:?}", self.spacing),
            ));
        }
        if (0..3).any(|i| self.extent.max[i] < self.extent.min[i]) {
            return Err(Error::invalid(
                "extent",
                format!("empty extent {:?}", self.extent),
            ));
        }
        Ok(())
    }
}

/// A 3D scalar grid. Data is stored `(z, y, x)` and never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume<T> {
    data: Array3<T>,
    geometry: Geometry,
}

impl<T: Voxel> Volume<T> {
    pub fn new(data: Array3<T>, geometry: Geometry) -> Result<Self> {
        geometry.validate()?;
        let [nx, ny, nz] = geometry.extent.dims();
        if data.dim() != (nz, ny, nx) {
            return Err(Error::invalid(
                "data",
                format!(
                    "shape {:?} does not match extent {:?}",
                    data.dim(),
                    geometry.extent
                ),
            ));
        }
        Ok(Self { data, geometry })
    }

    /// Builds a volume by evaluating `f` at every extent index `(x, y, z)`.
    pub fn from_fn(geometry: Geometry, f: impl Fn([i64; 3]) -> T) -> Result<Self> {
        let [nx, ny, nz] = geometry.extent.dims();
        let min = geometry.extent.min;
        let data = Array3::from_shape_fn((nz, ny, nx), |(z, y, x)| {
            f([min[0] + x as i64, min[1] + y as i64, min[2] + z as i64])
        });
        Self::new(data, geometry)
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn extent(&self) -> &Extent {
        &self.geometry.extent
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.geometry.spacing
    }

    pub fn origin(&self) -> [f64; 3] {
        self.geometry.origin
    }

    pub fn size(&self) -> [f64; 3] {
        self.geometry.size()
    }

    pub fn center(&self) -> [f64; 3] {
        self.geometry.center()
    }

    /// Value at an extent index `(x, y, z)`.
    pub fn get(&self, index: [i64; 3]) -> Option<T> {
        self.array_index(index).map(|idx| self.data[idx])
    }

    pub(crate) fn array_index(&self, index: [i64; 3]) -> Option<(usize, usize, usize)> {
        let extent = &self.geometry.extent;
        if !extent.contains(index) {
            return None;
        }
        Some((
            (index[2] - extent.min[2]) as usize,
            (index[1] - extent.min[1]) as usize,
            (index[0] - extent.min[0]) as usize,
        ))
    }

    /// Observed `(min, max)` of the voxel values.
    pub fn min_max(&self) -> (f64, f64) {
        self.data
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                let v = v.to_f64();
                (lo.min(v), hi.max(v))
            })
    }

    /// Applies `f` voxel-wise, keeping the geometry.
    pub fn map<U: Voxel>(&self, f: impl Fn(T) -> U + Sync + Send) -> Volume<U> {
        let data = Zip::from(&self.data).par_map_collect(|&v| f(v));
        Volume {
            data,
            geometry: self.geometry,
        }
    }

    /// Swaps the data for an array of the same shape.
    pub(crate) fn with_data<U: Voxel>(&self, data: Array3<U>) -> Volume<U> {
        debug_assert_eq!(data.dim(), self.data.dim());
        Volume {
            data,
            geometry: self.geometry,
        }
    }

    /// Converts to another scalar domain, failing on the first value that the
    /// target type cannot represent.
    pub fn cast<U: Voxel>(&self) -> Result<Volume<U>> {
        let values = self
            .data
            .iter()
            .map(|&v| {
                let value = v.to_f64();
                U::from_f64(value).ok_or(Error::DomainOverflow {
                    value,
                    target: U::NAME,
                })
            })
            .collect::<Result<Vec<U>>>()?;
        let data = Array3::from_shape_vec(self.data.raw_dim(), values)
            .map_err(|e| Error::invalid("data", e.to_string()))?;
        Ok(self.with_data(data))
    }

    pub fn same_geometry<U>(&self, other: &Volume<U>) -> bool {
        self.geometry == other.geometry
    }
}

use glam::{DMat4, DVec3, DVec4};

use crate::enums::Orientation;
use crate::volume::Geometry;

/// The three reslice transforms plus the currently active axis.
///
/// Each transform maps plane-local `(u, v, w)` to physical space: the first
/// three columns hold the in-plane u, in-plane v and normal directions, the
/// fourth the plane center.
#[derive(Debug, Clone, PartialEq)]
pub struct ReslicePlaneSet {
    axes: [DMat4; 3],
    active: Orientation,
    origin: [f64; 3],
    size: [f64; 3],
}

impl ReslicePlaneSet {
    /// Derives the three orientation matrices, all centered on the volume's
    /// physical center.
    pub fn from_geometry(geometry: &Geometry, active: Orientation) -> Self {
        let center = DVec3::from(geometry.center()).extend(1.0);
        let axial = DMat4::from_cols(DVec4::X, DVec4::Y, DVec4::Z, center);
        let coronal = DMat4::from_cols(DVec4::X, DVec4::NEG_Z, DVec4::Y, center);
        let sagittal = DMat4::from_cols(DVec4::Y, DVec4::NEG_Z, DVec4::NEG_X, center);
        Self {
            axes: [axial, coronal, sagittal],
            active,
            origin: geometry.origin,
            size: geometry.size(),
        }
    }

    pub fn active(&self) -> Orientation {
        self.active
    }

    pub fn active_matrix(&self) -> &DMat4 {
        self.matrix(self.active)
    }

    pub fn matrix(&self, axis: Orientation) -> &DMat4 {
        &self.axes[axis.index()]
    }

    /// Makes `axis` the active plane.
    pub fn activate(&mut self, axis: Orientation) {
        tracing::debug!(from = ?self.active, to = ?axis, "activating reslice axis");
        self.active = axis;
    }

    /// Axis that follows the active one in the cycle.
    pub fn next_axis(&self) -> Orientation {
        self.active.next()
    }

    /// Writes `origin[axis] + physical_offset` into the translation row the
    /// plane normal points along (`2 - axis`). Offsets outside
    /// `[0, size[axis]]` are kept as-is and place the plane outside the
    /// volume.
    pub fn set_offset(&mut self, axis: Orientation, physical_offset: f64) {
        let row = axis.normal_component();
        self.axes[axis.index()].w_axis[row] = self.origin[axis.index()] + physical_offset;
    }

    /// Offset last written by [`set_offset`](Self::set_offset).
    pub fn offset(&self, axis: Orientation) -> f64 {
        let row = axis.normal_component();
        self.axes[axis.index()].w_axis[row] - self.origin[axis.index()]
    }

    /// Physical extent `size[axis]` the slider range is mapped onto.
    pub fn physical_size(&self, axis: Orientation) -> f64 {
        self.size[axis.index()]
    }

    /// Plane center in physical space.
    pub fn center(&self, axis: Orientation) -> [f64; 3] {
        self.matrix(axis).w_axis.truncate().to_array()
    }
}

//! Voxel filters the segmentation pipeline is assembled from.
//!
//! Every filter is a pure function from an input volume and its parameters to
//! a new volume with identical geometry.

pub mod connected;
pub mod diffusion;
pub mod morphology;
pub mod rescale;

pub use connected::{RegionGrowParams, connected_threshold};
pub use diffusion::{DiffusionParams, anisotropic_diffusion};
pub use morphology::{StructuringElement, closing, dilate, erode, opening};
pub use rescale::{RescaleParams, rescale_intensity};

//! # segview
//!
//! Seeded segmentation of 3D medical volumes with a synchronized slice and
//! volume viewer.
//!
//! A [`Volume`] is loaded from a MetaImage file or a DICOM series, run
//! through the [`SegmentationPipeline`] (edge-preserving smoothing, seeded
//! region growing inside an intensity band, rescaling, morphological closing
//! and opening) and the resulting [`SegmentationMask`] is shown on top of the
//! source in two viewports:
//!
//!  - a 2D reslice of the active plane (Axial, Coronal or Sagittal) whose
//!    position along the plane normal is driven by a slider
//!  - a 3D ray cast rendering that can be orbited and zoomed
//!
//! Pointer input is routed to whichever viewport is under the pointer. A
//! right click in the slice view cycles the reslice axis and recenters the
//! slider.
//!
//! Volumes are stored `(z, y, x)`; extents, seeds and physical coordinates
//! are always given as `(x, y, z)`.
//!
//! # Examples
//!
//! ## Segmenting a volume and saving the mask
//!
//! ```no_run
//! # use segview::{SortBy, VolumeLoader, PipelineParams, SegmentationPipeline, metaimage};
//! let volume = VolumeLoader::load("BRATS_HG0015_T1C.mha", SortBy::default())
//!     .expect("should have loaded the volume");
//! let mask = SegmentationPipeline::new(PipelineParams::default())
//!     .and_then(|pipeline| pipeline.run(&volume))
//!     .expect("should have segmented the volume");
//! metaimage::write("output.mha", mask.volume()).expect("should have written the mask");
//! ```

pub mod cli;
pub mod config;
pub mod enums;
pub mod error;
pub mod fanout;
pub mod filters;
mod interpolator;
pub mod layout;
pub mod metaimage;
pub mod pipeline;
pub mod planes;
pub mod present;
pub mod render;
pub mod router;
pub mod slider;
pub mod viewer;
pub mod volume;
pub mod volume_loader;
pub mod voxel;

pub use config::SegviewConfig;
pub use enums::{Interpolation, Orientation, SortBy};
pub use error::{Error, Result};
pub use pipeline::{PipelineParams, SegmentationMask, SegmentationPipeline};
pub use volume::{Extent, Geometry, Volume};
pub use volume_loader::VolumeLoader;

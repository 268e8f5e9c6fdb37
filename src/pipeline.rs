use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::enums::ScalarDomain;
use crate::error::Result;
use crate::filters::{
    self, DiffusionParams, RegionGrowParams, RescaleParams, StructuringElement,
};
use crate::volume::Volume;

/// Named steps of the segmentation pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CastToFloat,
    Denoise,
    RegionGrow,
    Rescale,
    Closing,
    Opening,
    CastToNative,
}

impl Stage {
    pub const ORDER: [Stage; 7] = [
        Stage::CastToFloat,
        Stage::Denoise,
        Stage::RegionGrow,
        Stage::Rescale,
        Stage::Closing,
        Stage::Opening,
        Stage::CastToNative,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::CastToFloat => "cast-to-float",
            Stage::Denoise => "denoise",
            Stage::RegionGrow => "region-grow",
            Stage::Rescale => "rescale",
            Stage::Closing => "closing",
            Stage::Opening => "opening",
            Stage::CastToNative => "cast-to-native",
        }
    }

    /// `(input, output)` scalar domains.
    pub fn domains(self) -> (ScalarDomain, ScalarDomain) {
        match self {
            Stage::CastToFloat => (ScalarDomain::Integral, ScalarDomain::Floating),
            Stage::CastToNative => (ScalarDomain::Floating, ScalarDomain::Integral),
            _ => (ScalarDomain::Floating, ScalarDomain::Floating),
        }
    }
}

/// Parameters of every stage. Deserialized from the `pipeline` section of the
/// configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    pub diffusion: DiffusionParams,
    pub region: RegionGrowParams,
    pub rescale: RescaleParams,
    pub closing_radius: u32,
    pub opening_radius: u32,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            diffusion: DiffusionParams::default(),
            region: RegionGrowParams::default(),
            rescale: RescaleParams::default(),
            closing_radius: 3,
            opening_radius: 2,
        }
    }
}

/// Binary region of interest aligned voxel-for-voxel with its source volume.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMask {
    volume: Volume<i16>,
}

impl SegmentationMask {
    /// Wraps a volume previously produced by the pipeline (for example one
    /// read back from disk).
    pub fn from_volume(volume: Volume<i16>) -> Self {
        Self { volume }
    }

    pub fn volume(&self) -> &Volume<i16> {
        &self.volume
    }

    pub fn into_volume(self) -> Volume<i16> {
        self.volume
    }

    /// Whether the voxel at extent index `(x, y, z)` is inside the region.
    pub fn contains(&self, index: [i64; 3]) -> bool {
        self.volume.get(index).is_some_and(|v| v > 0)
    }

    pub fn voxel_count(&self) -> usize {
        self.volume.data().iter().filter(|v| **v > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.voxel_count() == 0
    }
}

/// Fixed, linear chain of stages turning a volume into a [`SegmentationMask`].
#[derive(Debug, Clone)]
pub struct SegmentationPipeline {
    params: PipelineParams,
    closing_element: StructuringElement,
    opening_element: StructuringElement,
}

impl SegmentationPipeline {
    /// Validates all volume-independent parameters up front.
    pub fn new(params: PipelineParams) -> Result<Self> {
        params.diffusion.validate()?;
        params.region.validate()?;
        params.rescale.validate()?;
        let closing_element = StructuringElement::ball(params.closing_radius)?;
        let opening_element = StructuringElement::ball(params.opening_radius)?;
        Ok(Self {
            params,
            closing_element,
            opening_element,
        })
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    /// Runs every stage in order. The first failing stage aborts the run.
    pub fn run(&self, input: &Volume<i16>) -> Result<SegmentationMask> {
        self.params.region.validate_seeds(input)?;
        let started = Instant::now();

        let floating = timed(Stage::CastToFloat, || input.cast::<f32>())?;
        let smoothed = timed(Stage::Denoise, || {
            filters::anisotropic_diffusion(&floating, &self.params.diffusion)
        })?;
        drop(floating);
        let grown = timed(Stage::RegionGrow, || {
            filters::connected_threshold(&smoothed, &self.params.region)
        })?;
        drop(smoothed);
        let rescaled = timed(Stage::Rescale, || {
            filters::rescale_intensity(&grown, &self.params.rescale)
        })?;
        let closed = timed(Stage::Closing, || {
            Ok(filters::closing(&rescaled, &self.closing_element))
        })?;
        let opened = timed(Stage::Opening, || {
            Ok(filters::opening(&closed, &self.opening_element))
        })?;
        let native = timed(Stage::CastToNative, || opened.cast::<i16>())?;

        let mask = SegmentationMask { volume: native };
        tracing::info!(
            voxels = mask.voxel_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "segmentation finished"
        );
        Ok(mask)
    }
}

fn timed<T>(stage: Stage, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let span = tracing::info_span!("stage", name = stage.name());
    let _guard = span.enter();
    let started = Instant::now();
    let result = f();
    match &result {
        Ok(_) => tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "stage complete"
        ),
        Err(err) => tracing::warn!(%err, "stage failed, aborting pipeline"),
    }
    result
}

/// Convenience wrapper: build the pipeline and run it once.
pub fn segment(input: &Volume<i16>, params: PipelineParams) -> Result<SegmentationMask> {
    SegmentationPipeline::new(params)?.run(input)
}

impl From<SegmentationMask> for Volume<i16> {
    fn from(mask: SegmentationMask) -> Self {
        mask.volume
    }
}

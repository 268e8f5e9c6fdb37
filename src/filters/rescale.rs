use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::volume::Volume;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RescaleParams {
    pub out_min: f64,
    pub out_max: f64,
}

impl Default for RescaleParams {
    fn default() -> Self {
        Self {
            out_min: 0.0,
            out_max: 255.0,
        }
    }
}

impl RescaleParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.out_min.is_finite() && self.out_max.is_finite()) || self.out_min > self.out_max {
            return Err(Error::invalid(
                "rescale",
                format!("invalid output range [{}, {}]", self.out_min, self.out_max),
            ));
        }
        Ok(())
    }
}

/// Linearly maps the observed `[min, max]` of the input onto
/// `[out_min, out_max]`.
///
/// A constant input has no range to stretch: every voxel maps to `out_min`.
pub fn rescale_intensity(volume: &Volume<f32>, params: &RescaleParams) -> Result<Volume<f32>> {
    params.validate()?;
    let (min, max) = volume.min_max();
    let scale = if max > min {
        (params.out_max - params.out_min) / (max - min)
    } else {
        0.0
    };
    let shift = params.out_min - min * scale;
    if scale == 0.0 {
        tracing::debug!(min, max, "constant input, rescaling to the lower bound");
        let out_min = params.out_min as f32;
        return Ok(volume.map(move |_| out_min));
    }
    Ok(volume.map(move |v| (v as f64 * scale + shift) as f32))
}

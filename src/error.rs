use thiserror::Error;

use crate::volume_loader::VolumeLoaderError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("seed {seed:?} lies outside extent {min:?}..={max:?}")]
    InvalidSeed {
        seed: [i64; 3],
        min: [i64; 3],
        max: [i64; 3],
    },

    #[error("value {value} cannot be represented as {target}")]
    DomainOverflow { value: f64, target: &'static str },

    #[error("resource unavailable: {0}")]
    ResourceUnavailable(#[from] VolumeLoaderError),

    #[error("render initialisation failed: {0}")]
    RenderInitFailure(String),

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{failed} of {total} viewer processes failed")]
    ChildProcesses { failed: usize, total: usize },
}

impl Error {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

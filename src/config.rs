use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::pipeline::PipelineParams;
use crate::render::RenderSettings;
use crate::volume_loader::VolumeLoaderError;

/// Application configuration, read from a JSON file. Missing sections and
/// fields fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegviewConfig {
    pub pipeline: PipelineParams,
    pub render: RenderSettings,
}

impl SegviewConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(VolumeLoaderError::MissingFile(path.to_path_buf()).into());
        }
        let file = File::open(path).map_err(VolumeLoaderError::Io)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Overrides the region-growing parameters given on the command line.
    pub fn override_region(&mut self, seed: Option<[i64; 3]>, lower: Option<f64>, upper: Option<f64>) {
        let region = &mut self.pipeline.region;
        if let Some(seed) = seed {
            region.seeds = vec![seed];
        }
        if let Some(lower) = lower {
            region.lower = lower;
        }
        if let Some(upper) = upper {
            region.upper = upper;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults_match_the_reference_parameters() {
        let config = SegviewConfig::default();
        let p = &config.pipeline;
        assert_eq!(p.diffusion.iterations, 20);
        assert_eq!(p.diffusion.conductance, 3.0);
        assert_eq!(p.diffusion.time_step, 0.04);
        assert_eq!(p.region.seeds, vec![[75, 80, 50]]);
        assert_eq!((p.region.lower, p.region.upper), (900.0, 1500.0));
        assert_eq!((p.rescale.out_min, p.rescale.out_max), (0.0, 255.0));
        assert_eq!((p.closing_radius, p.opening_radius), (3, 2));
        assert_eq!(config.render.window, [400, 800]);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SegviewConfig::from_json(
            r#"{ "pipeline": { "region": { "lower": 100.0 } }, "render": { "window": [640, 480] } }"#,
        )
        .unwrap();
        assert_eq!(config.pipeline.region.lower, 100.0);
        assert_eq!(config.pipeline.region.upper, 1500.0);
        assert_eq!(config.pipeline.closing_radius, 3);
        assert_eq!(config.render.window, [640, 480]);
    }

    #[test]
    fn reads_from_file_and_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "pipeline": {{ "opening_radius": 1 }} }}"#).unwrap();
        let config = SegviewConfig::from_path(file.path()).unwrap();
        assert_eq!(config.pipeline.opening_radius, 1);

        let mut broken = tempfile::NamedTempFile::new().unwrap();
        write!(broken, "{{ not json").unwrap();
        assert!(matches!(
            SegviewConfig::from_path(broken.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_an_unavailable_resource() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segview.json");
        let err = SegviewConfig::from_path(&path).unwrap_err();
        assert!(
            matches!(&err, Error::ResourceUnavailable(VolumeLoaderError::MissingFile(p)) if *p == path),
            "{err}"
        );
        assert!(matches!(
            SegviewConfig::from_path(dir.path()),
            Err(Error::ResourceUnavailable(VolumeLoaderError::MissingFile(_)))
        ));
    }

    #[test]
    fn command_line_overrides_region() {
        let mut config = SegviewConfig::default();
        config.override_region(Some([1, 2, 3]), None, Some(2000.0));
        assert_eq!(config.pipeline.region.seeds, vec![[1, 2, 3]]);
        assert_eq!(config.pipeline.region.lower, 900.0);
        assert_eq!(config.pipeline.region.upper, 2000.0);
    }
}

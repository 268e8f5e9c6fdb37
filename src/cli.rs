use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::config::SegviewConfig;
use crate::enums::SortBy;
use crate::error::{Error, Result};
use crate::fanout::{self, FanoutPlan};
use crate::metaimage;
use crate::pipeline::{SegmentationMask, SegmentationPipeline};
use crate::render::{DualViewRenderer, RenderSettings};
use crate::viewer;
use crate::volume::Volume;
use crate::volume_loader::VolumeLoader;

#[derive(Debug, Parser)]
#[command(name = "segview")]
#[command(about = "Segment a region of interest in a 3D volume and inspect it in a slice/volume viewer")]
#[command(version)]
pub struct Cli {
    /// More logging (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand that loads a volume.
#[derive(Debug, Clone, Args)]
pub struct Source {
    /// MetaImage file (.mha/.mhd) or directory of .dcm files.
    #[arg(long)]
    pub input: PathBuf,

    /// JSON configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Slice ordering for DICOM series.
    #[arg(long, value_enum, default_value_t = SortBy::ImagePositionPatient)]
    pub sort_by: SortBy,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Segment the input, save the mask, and show both.
    Segment {
        #[command(flatten)]
        source: Source,

        /// Where the mask is written (MetaImage).
        #[arg(long, default_value = "output.mha")]
        output: PathBuf,

        /// Do not write the mask.
        #[arg(long)]
        no_save: bool,

        /// Do not open the viewer.
        #[arg(long)]
        no_render: bool,

        /// Write the initial frame as PNG.
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Seed index `x,y,z`; replaces the configured seeds.
        #[arg(long, value_delimiter = ',')]
        seed: Option<Vec<i64>>,

        /// Lower bound of the intensity band.
        #[arg(long)]
        lower: Option<f64>,

        /// Upper bound of the intensity band.
        #[arg(long)]
        upper: Option<f64>,
    },
    /// Show the volume without segmenting it.
    View {
        #[command(flatten)]
        source: Source,

        /// Write the initial frame as PNG instead of opening a window.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Open several viewer processes side by side.
    Demo {
        #[command(flatten)]
        source: Source,

        /// Number of viewer processes.
        #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
        copies: u32,
    },
}

/// `info` by default, louder with each `-v`; `RUST_LOG` overrides both.
pub fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .try_init();
}

impl Source {
    fn config(&self) -> Result<SegviewConfig> {
        match &self.config {
            Some(path) => SegviewConfig::from_path(path),
            None => Ok(SegviewConfig::default()),
        }
    }

    fn load(&self) -> Result<Volume<i16>> {
        VolumeLoader::load(&self.input, self.sort_by)
    }

    /// Arguments that reproduce this source for a child `view` process.
    fn view_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["view".into(), "--input".into(), self.input.clone().into()];
        if let Some(config) = &self.config {
            args.push("--config".into());
            args.push(config.clone().into());
        }
        if let Some(value) = self.sort_by.to_possible_value() {
            args.push("--sort-by".into());
            args.push(value.get_name().into());
        }
        args
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Segment {
            source,
            output,
            no_save,
            no_render,
            snapshot,
            seed,
            lower,
            upper,
        } => {
            let mut config = source.config()?;
            let seed = seed
                .map(|s| {
                    <[i64; 3]>::try_from(s.as_slice())
                        .map_err(|_| Error::invalid("seed", format!("expected x,y,z, got {s:?}")))
                })
                .transpose()?;
            config.override_region(seed, lower, upper);

            let volume = source.load()?;
            let mask = SegmentationPipeline::new(config.pipeline.clone())?.run(&volume)?;
            info!(voxels = mask.voxel_count(), empty = mask.is_empty(), "mask ready");

            if !no_save {
                metaimage::write(&output, mask.volume())?;
                info!(path = %output.display(), "mask saved");
            }
            if let Some(path) = &snapshot {
                save_snapshot(path, &config.render, &volume, Some(&mask))?;
            }
            if no_render {
                return Ok(());
            }
            viewer::run(config.render, volume, Some(mask))
        }
        Commands::View { source, snapshot } => {
            let config = source.config()?;
            let volume = source.load()?;
            match snapshot {
                Some(path) => save_snapshot(&path, &config.render, &volume, None),
                None => viewer::run(config.render, volume, None),
            }
        }
        Commands::Demo { source, copies } => {
            // Fail early in the parent rather than in every child.
            source.config()?;
            let plan = FanoutPlan::current_exe(source.view_args(), copies as usize)?;
            info!(copies, program = %plan.program.display(), "starting viewer processes");
            fanout::run(&plan).await
        }
    }
}

/// Renders the initial view without a window and saves it as PNG.
pub fn save_snapshot(
    path: &Path,
    settings: &RenderSettings,
    volume: &Volume<i16>,
    mask: Option<&SegmentationMask>,
) -> Result<()> {
    let state = viewer::initial_state(settings, volume);
    let renderer = DualViewRenderer::new(settings.clone(), volume.clone(), mask.cloned());
    renderer.render(&state).save(path)?;
    info!(path = %path.display(), "snapshot saved");
    Ok(())
}

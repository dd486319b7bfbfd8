//! `collect` options: defaults, then an optional TOML file, then flags.

use anyhow::{bail, Context, Result};
use clap::Args;
use faceset_core::PipelineConfig;
use std::path::{Path, PathBuf};

/// Overrides the default model directory.
pub const MODEL_DIR_ENV: &str = "FACESET_MODEL_DIR";

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Directory tree of photos (and videos, which are skipped)
    pub source_dir: PathBuf,
    /// Directory of photos of the person to collect
    pub reference_dir: PathBuf,
    /// Results go to OUTPUT_DIR/images and OUTPUT_DIR/invalid
    pub output_dir: PathBuf,

    /// Maximum encoding distance for a match, lower is stricter [default: 1.0]
    #[arg(short, long)]
    pub tolerance: Option<f32>,
    /// Minimum face size in pixels [default: 256]
    #[arg(long)]
    pub min_face_size: Option<u32>,
    /// Crops larger than this are scaled down; at least 1.5x --min-face-size [default: 512]
    #[arg(long)]
    pub crop_size: Option<u32>,
    /// Acceptable face brightness, 0-255 [default: 10 245]
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    pub luminosity_range: Option<Vec<u8>>,
    /// Blur threshold; 0 accepts everything [default: 0]
    #[arg(long)]
    pub laplacian_threshold: Option<f64>,
    /// Discard crops containing more than one face
    #[arg(long)]
    pub one_face: bool,
    /// Black out faces that don't match the reference
    #[arg(long)]
    pub mask_faces: bool,
    /// Move duplicates, corrupted files and rejected crops to OUTPUT_DIR/invalid instead of deleting them
    #[arg(long)]
    pub save_invalid: bool,
    /// Maximum perceptual hash distance between duplicates [default: 10]
    #[arg(long)]
    pub dedup_threshold: Option<u32>,
    /// Height photos are downsampled to before face detection [default: 500]
    #[arg(long)]
    pub sample_height: Option<u32>,

    /// TOML file with any of the options above (snake_case keys)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Directory holding the ONNX models [env: FACESET_MODEL_DIR]
    #[arg(long, value_name = "DIR")]
    pub model_dir: Option<PathBuf>,
    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,
}

impl CollectArgs {
    /// Layered pipeline configuration. Not yet validated.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut cfg = match &self.config {
            Some(path) => load_config_file(path)?,
            None => PipelineConfig::default(),
        };
        self.apply_overrides(&mut cfg)?;
        Ok(cfg)
    }

    pub fn model_dir(&self) -> PathBuf {
        resolve_model_dir(self.model_dir.clone(), std::env::var(MODEL_DIR_ENV).ok())
    }

    fn apply_overrides(&self, cfg: &mut PipelineConfig) -> Result<()> {
        if let Some(v) = self.tolerance {
            cfg.tolerance = v;
        }
        if let Some(v) = self.min_face_size {
            cfg.min_face_size = v;
        }
        if let Some(v) = self.crop_size {
            cfg.crop_size = v;
        }
        if let Some(range) = &self.luminosity_range {
            match range.as_slice() {
                &[min, max] => cfg.luminosity_range = (min, max),
                other => bail!("--luminosity-range takes two values, got {}", other.len()),
            }
        }
        if let Some(v) = self.laplacian_threshold {
            cfg.laplacian_threshold = v;
        }
        if let Some(v) = self.dedup_threshold {
            cfg.dedup_threshold = v;
        }
        if let Some(v) = self.sample_height {
            cfg.sample_height = v;
        }
        // Flags can only switch a file setting on.
        cfg.one_face |= self.one_face;
        cfg.mask_faces |= self.mask_faces;
        cfg.save_invalid |= self.save_invalid;
        Ok(())
    }
}

pub fn load_config_file(path: &Path) -> Result<PipelineConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
}

fn resolve_model_dir(flag: Option<PathBuf>, env: Option<String>) -> PathBuf {
    flag.or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(faceset_core::default_model_dir)
}

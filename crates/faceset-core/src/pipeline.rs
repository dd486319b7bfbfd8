//! Per-photo extraction: match, mask, crop, validate, save.
//!
//! Each source photo is downsampled to a working height for analysis. The
//! matching face closest to the reference set becomes the target; its box is
//! scaled back to source resolution and cropped as a padded square. With
//! masking enabled every other face is blacked out first. Accepted crops are
//! written as `img_<counter>.jpg`, where the counter advances once per
//! processed photo whether or not anything was written.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::config::PipelineConfig;
use crate::disposal::Disposal;
use crate::geometry::{self, CropResult, GeometryError};
use crate::mask::{compute_mask, FaceOverlay, PROTECT_SCALE, SUPPRESS_SCALE};
use crate::types::{EuclideanMatcher, FaceCandidate, Matcher, ReferenceFaceSet};
use crate::validator::{FaceValidator, Rejection};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageError, RgbImage};
use indicatif::ProgressBar;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const JPEG_QUALITY: u8 = 95;

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: ImageError,
    },
    #[error("geometry: {0}")]
    Geometry(#[from] GeometryError),
    #[error("face analysis: {0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: ImageError,
    },
}

/// What happened to one photo.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// No face matched the reference set. Nothing written.
    NoMatch,
    Rejected(Rejection),
    Saved(PathBuf),
}

/// Counters for one [`PhotoPipeline::process`] run.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub saved: usize,
    pub unmatched: usize,
    /// Rejections keyed by [`Rejection::reason`].
    pub rejected: BTreeMap<&'static str, usize>,
    pub failed: usize,
}

impl RunSummary {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    fn record(&mut self, result: &Result<Outcome, PhotoError>) {
        self.processed += 1;
        match result {
            Ok(Outcome::Saved(_)) => self.saved += 1,
            Ok(Outcome::NoMatch) => self.unmatched += 1,
            Ok(Outcome::Rejected(r)) => *self.rejected.entry(r.reason()).or_default() += 1,
            Err(_) => self.failed += 1,
        }
    }
}

pub struct PhotoPipeline<A: FaceAnalyzer> {
    analyzer: A,
    references: ReferenceFaceSet,
    matcher: EuclideanMatcher,
    validator: FaceValidator,
    config: PipelineConfig,
    disposal: Disposal,
    counter: u64,
    progress: bool,
}

impl<A: FaceAnalyzer> PhotoPipeline<A> {
    /// `config` is assumed to have passed [`PipelineConfig::validate`].
    pub fn new(analyzer: A, references: ReferenceFaceSet, config: PipelineConfig, disposal: Disposal) -> Self {
        Self {
            analyzer,
            references,
            matcher: EuclideanMatcher,
            validator: FaceValidator::new(config.validation_policy()),
            config,
            disposal,
            counter: 0,
            progress: false,
        }
    }

    /// Draw a progress bar on stderr while processing.
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Number of photos processed so far by this instance.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Run every file through [`process_file`](Self::process_file).
    /// Per-file failures are logged and counted; they never stop the batch.
    pub fn process(&mut self, files: &[PathBuf], output_dir: &Path) -> RunSummary {
        let bar = if self.progress {
            ProgressBar::new(files.len() as u64)
        } else {
            ProgressBar::hidden()
        };

        let mut summary = RunSummary::default();
        for file in files {
            bar.inc(1);
            let result = self.process_file(file, output_dir);
            match &result {
                Ok(Outcome::Saved(path)) => {
                    tracing::debug!(path = %file.display(), output = %path.display(), "face saved")
                }
                Ok(Outcome::Rejected(reason)) => {
                    tracing::info!(path = %file.display(), reason = reason.reason(), "crop rejected: {reason}")
                }
                Ok(Outcome::NoMatch) => tracing::debug!(path = %file.display(), "no matching face"),
                Err(e) => tracing::warn!(path = %file.display(), error = %e, "skipping photo"),
            }
            summary.record(&result);
        }

        bar.finish_and_clear();
        tracing::info!(
            processed = summary.processed,
            saved = summary.saved,
            rejected = summary.rejected_total(),
            unmatched = summary.unmatched,
            failed = summary.failed,
            "extraction complete"
        );
        summary
    }

    /// Extract the reference person's face from one photo.
    pub fn process_file(&mut self, file: &Path, output_dir: &Path) -> Result<Outcome, PhotoError> {
        self.counter += 1;
        let index = self.counter;

        let mut image = image::open(file)
            .map_err(|source| PhotoError::Decode { path: file.display().to_string(), source })?
            .to_rgb8();

        let sample = geometry::downsample_to_height(&image, self.config.sample_height)?;
        let candidates = self.analyzer.analyze(&sample)?;

        let Some(target) = self.select_target(&candidates) else {
            return Ok(Outcome::NoMatch);
        };

        let (source_w, source_h) = image.dimensions();
        let (sample_w, sample_h) = sample.dimensions();
        let face_box = geometry::scale_coords(
            candidates[target].location,
            (sample_h, sample_w),
            (source_h, source_w),
        );

        if self.config.mask_faces {
            let scale = source_h as f32 / sample_h as f32;
            mask_bystanders(&mut image, &candidates, target, scale);
        }

        let CropResult { cropped, face } = geometry::crop_face(&image, &face_box)?;
        let cropped = geometry::fit_to_crop_size(cropped, self.config.crop_size)?;

        if let Err(rejection) = self.validator.check(&cropped, &face, &mut self.analyzer) {
            let name = format!("{}_img_{index}.jpg", rejection.reason());
            if let Err(e) = self.disposal.keep_rejected(&cropped, &name) {
                tracing::warn!(name = %name, error = %e, "failed to keep rejected crop");
            }
            return Ok(Outcome::Rejected(rejection));
        }

        let dest = output_dir.join(format!("img_{index}.jpg"));
        save_jpeg(&cropped, &dest)
            .map_err(|source| PhotoError::Write { path: dest.display().to_string(), source })?;
        Ok(Outcome::Saved(dest))
    }

    /// Index of the matching candidate closest to the references. First wins ties.
    fn select_target(&self, candidates: &[FaceCandidate]) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (i, candidate) in candidates.iter().enumerate() {
            let result = self.matcher.compare(&candidate.encoding, &self.references, self.config.tolerance);
            tracing::trace!(face = i, distance = result.distance, matched = result.matched, "compared face");
            if !result.matched {
                continue;
            }
            if best.map_or(true, |(_, d)| result.distance < d) {
                best = Some((i, result.distance));
            }
        }
        best.map(|(i, _)| i)
    }
}

/// Black out every face but `target`, then restore the target's region.
fn mask_bystanders(image: &mut RgbImage, candidates: &[FaceCandidate], target: usize, scale: f32) {
    let (width, height) = image.dimensions();
    let mut overlay = FaceOverlay::new(width, height);

    for (i, candidate) in candidates.iter().enumerate() {
        if i == target {
            continue;
        }
        match compute_mask(&candidate.landmarks, SUPPRESS_SCALE, scale) {
            Ok(polygon) => overlay.suppress(&polygon),
            Err(e) => tracing::debug!(face = i, error = %e, "cannot mask face"),
        }
    }

    match compute_mask(&candidates[target].landmarks, PROTECT_SCALE, scale) {
        Ok(polygon) => overlay.protect(&polygon),
        Err(e) => tracing::debug!(error = %e, "cannot protect target face"),
    }

    overlay.apply(image);
}

fn save_jpeg(image: &RgbImage, path: &Path) -> Result<(), ImageError> {
    let mut writer = BufWriter::new(File::create(path)?);
    JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode_image(image)?;
    // Surface write errors that drop would swallow.
    writer.flush()?;
    Ok(())
}

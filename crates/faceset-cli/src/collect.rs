//! The `collect` command: pre-flight, dedup, extraction, summary.

use crate::config::CollectArgs;
use crate::scan;
use anyhow::{Context, Result};
use faceset_core::{
    DedupEngine, Disposal, FaceAnalyzer, OnnxFaceAnalyzer, PhotoPipeline, PipelineConfig,
    ReferenceFaceSet, RunSummary,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Everything `collect` reports at the end of a run.
#[derive(Debug, Serialize)]
struct CollectReport {
    photos: usize,
    /// Duplicates and corrupted files dropped before extraction.
    discarded: usize,
    skipped_videos: usize,
    #[serde(flatten)]
    extraction: RunSummary,
}

pub fn run(args: CollectArgs) -> Result<()> {
    let config = args.pipeline_config()?;
    config.validate().context("invalid configuration")?;

    let model_dir = args.model_dir();
    let analyzer = OnnxFaceAnalyzer::load(&model_dir)
        .with_context(|| format!("cannot load face models from {}", model_dir.display()))?;

    let report = collect(&args, config, analyzer)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Run the whole collection with an already loaded analyzer.
fn collect<A: FaceAnalyzer>(args: &CollectArgs, config: PipelineConfig, mut analyzer: A) -> Result<CollectReport> {
    let references = ReferenceFaceSet::load_dir(&args.reference_dir, &mut analyzer)
        .context("cannot load reference faces")?;

    let source = scan::scan(&args.source_dir)?;
    for video in &source.videos {
        tracing::info!(path = %video.display(), "skipping video file");
    }

    let (images_dir, invalid_dir) = prepare_output(&args.output_dir, config.save_invalid)?;
    let disposal = Disposal::new(invalid_dir);
    let progress = !args.no_progress;

    tracing::info!(photos = source.photos.len(), "removing duplicates");
    let survivors = DedupEngine::new(disposal.clone())
        .with_progress(progress)
        .clean(&source.photos, config.dedup_threshold);

    tracing::info!(photos = survivors.len(), "extracting faces");
    let mut pipeline = PhotoPipeline::new(analyzer, references, config, disposal).with_progress(progress);
    let extraction = pipeline.process(&survivors, &images_dir);

    Ok(CollectReport {
        photos: source.photos.len(),
        discarded: source.photos.len() - survivors.len(),
        skipped_videos: source.videos.len(),
        extraction,
    })
}

/// Create `OUTPUT/images`, plus `OUTPUT/invalid` when discarded files are kept.
fn prepare_output(output_dir: &Path, save_invalid: bool) -> Result<(PathBuf, Option<PathBuf>)> {
    let images = output_dir.join("images");
    let invalid = save_invalid.then(|| output_dir.join("invalid"));
    for dir in std::iter::once(&images).chain(invalid.as_ref()) {
        std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    }
    Ok((images, invalid))
}

fn print_report(report: &CollectReport) {
    let s = &report.extraction;
    println!("Photos found:        {}", report.photos);
    println!("Discarded:           {} (duplicates or corrupted)", report.discarded);
    println!("Processed:           {}", s.processed);
    println!("Faces saved:         {}", s.saved);
    println!("No match:            {}", s.unmatched);
    println!("Rejected:            {}", s.rejected_total());
    for (reason, count) in &s.rejected {
        println!("  {reason:<18} {count}");
    }
    println!("Failed:              {}", s.failed);
    if report.skipped_videos > 0 {
        println!("Videos skipped:      {} (video extraction is not supported)", report.skipped_videos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use faceset_core::{AnalyzerError, Embedding, FaceBox, FaceCandidate, Landmarks};
    use image::{Rgb, RgbImage};

    /// Every image holds one face covering its middle; its encoding is the
    /// top-left pixel, so the reference set matches by color.
    struct ColorAnalyzer;

    impl FaceAnalyzer for ColorAnalyzer {
        fn analyze(&mut self, image: &RgbImage) -> Result<Vec<FaceCandidate>, AnalyzerError> {
            let (w, h) = (image.width() as f32, image.height() as f32);
            let [r, g, b] = image.get_pixel(0, 0).0;
            Ok(vec![FaceCandidate {
                location: FaceBox::new(h * 0.25, w * 0.75, h * 0.75, w * 0.25),
                encoding: Embedding::new(vec![r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]),
                landmarks: Landmarks::default(),
            }])
        }
    }

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: CollectArgs,
    }

    /// Horizontal brightness ramp over `base`. Opposite ramps hash far apart.
    fn ramp(side: u32, base: [u8; 3], rising: bool) -> RgbImage {
        RgbImage::from_fn(side, side, |x, _| {
            let t = x as f32 / side as f32;
            let f = if rising { 0.5 + 0.5 * t } else { 1.0 - 0.5 * t };
            Rgb(base.map(|c| (c as f32 * f) as u8))
        })
    }

    #[test]
    fn test_collect_end_to_end() {
        let root = tempfile::tempdir().unwrap();
        let (src, refs, out) = (root.path().join("src"), root.path().join("refs"), root.path().join("out"));
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::create_dir_all(&refs).unwrap();

        ramp(64, [200, 120, 80], true).save(refs.join("me.png")).unwrap();
        // JPEG sources; the 0.2 tolerance absorbs compression drift in the key pixel.
        ramp(400, [200, 120, 80], true).save(src.join("me.jpg")).unwrap();
        ramp(400, [40, 90, 220], false).save(src.join("nested/other.jpg")).unwrap();
        std::fs::write(src.join("broken.jpg"), b"garbage").unwrap();
        std::fs::write(src.join("clip.mp4"), b"").unwrap();

        let argv = [
            "faceset",
            src.to_str().unwrap(),
            refs.to_str().unwrap(),
            out.to_str().unwrap(),
            "--tolerance", "0.2",
            "--min-face-size", "100",
            "--crop-size", "300",
            "--save-invalid",
            "--no-progress",
        ];
        let args = TestCli::try_parse_from(argv).unwrap().args;
        let config = args.pipeline_config().unwrap();
        config.validate().unwrap();

        let report = collect(&args, config, ColorAnalyzer).unwrap();
        assert_eq!(report.photos, 3);
        assert_eq!(report.skipped_videos, 1);
        assert_eq!(report.discarded, 1);
        assert_eq!(report.extraction.processed, 2);
        assert_eq!(report.extraction.saved, 1);
        assert_eq!(report.extraction.unmatched, 1);

        assert!(out.join("invalid/corrupted_broken.jpg").exists());
        let saved: Vec<_> = std::fs::read_dir(out.join("images")).unwrap().collect();
        assert_eq!(saved.len(), 1);
        // broken.jpg, me.jpg, nested/other.jpg: me is the first photo extracted.
        assert!(image::open(out.join("images/img_1.jpg")).is_ok());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["saved"], 1);
        assert_eq!(json["skipped_videos"], 1);
    }

    #[test]
    fn test_collect_without_references_fails() {
        let root = tempfile::tempdir().unwrap();
        let refs = root.path().join("refs");
        std::fs::create_dir_all(&refs).unwrap();
        let argv = ["faceset", "src", refs.to_str().unwrap(), "out"];
        let args = TestCli::try_parse_from(argv).unwrap().args;

        struct NoFaces;
        impl FaceAnalyzer for NoFaces {
            fn analyze(&mut self, _image: &RgbImage) -> Result<Vec<FaceCandidate>, AnalyzerError> {
                Ok(Vec::new())
            }
        }

        assert!(collect(&args, PipelineConfig::default(), NoFaces).is_err());
    }

    #[test]
    fn test_invalid_dir_only_with_save_invalid() {
        let root = tempfile::tempdir().unwrap();

        let (images, invalid) = prepare_output(root.path(), false).unwrap();
        assert!(images.is_dir());
        assert_eq!(invalid, None);
        assert!(!root.path().join("invalid").exists());

        let (_, invalid) = prepare_output(root.path(), true).unwrap();
        assert_eq!(invalid, Some(root.path().join("invalid")));
        assert!(root.path().join("invalid").is_dir());
    }
}

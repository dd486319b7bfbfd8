//! faceset-core: builds a face training set from a photo collection.
//!
//! The flow is dedup → per-photo extraction. [`dedup::DedupEngine`] drops
//! corrupted files and near-duplicates; [`pipeline::PhotoPipeline`] finds the
//! reference person in each survivor, optionally masks everyone else, and
//! writes a validated square crop. Face analysis sits behind
//! [`analyzer::FaceAnalyzer`]; [`analyzer::OnnxFaceAnalyzer`] runs SCRFD,
//! ArcFace and a 68-point landmark model on ONNX Runtime.

pub mod alignment;
pub mod analyzer;
pub mod config;
pub mod dedup;
pub mod detector;
pub mod disposal;
pub mod geometry;
pub mod hasher;
pub mod landmarks;
pub mod mask;
pub mod pipeline;
pub mod recognizer;
pub mod reference;
pub mod types;
pub mod validator;

pub use analyzer::{AnalyzerError, FaceAnalyzer, OnnxFaceAnalyzer};
pub use config::{ConfigError, PipelineConfig};
pub use dedup::DedupEngine;
pub use disposal::Disposal;
pub use pipeline::{Outcome, PhotoError, PhotoPipeline, RunSummary};
pub use reference::{is_photo, ReferenceError};
pub use types::{Embedding, FaceBox, FaceCandidate, Landmarks, ReferenceFaceSet};

use std::path::PathBuf;

/// `$XDG_DATA_HOME/faceset/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("faceset")
        .join("models")
}

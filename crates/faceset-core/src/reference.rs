//! Building the reference face set from a directory of images.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::types::ReferenceFaceSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extensions accepted as photos, lowercase.
pub const PHOTO_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("cannot read reference directory {path}: {source}")]
    ReadDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("face analysis failed: {0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("no reference faces found in {0}")]
    Empty(String),
}

/// True if `path` has one of the [`PHOTO_EXTENSIONS`] (any case).
pub fn is_photo(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| PHOTO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl ReferenceFaceSet {
    /// Encode the most prominent face of every photo directly inside `dir`.
    ///
    /// Files that fail to decode or contain no face are skipped with a
    /// warning. An empty result is an error: nothing could ever match.
    pub fn load_dir(dir: &Path, analyzer: &mut dyn FaceAnalyzer) -> Result<Self, ReferenceError> {
        let entries = std::fs::read_dir(dir).map_err(|source| ReferenceError::ReadDir {
            path: dir.display().to_string(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_photo(p))
            .collect();
        files.sort();

        let mut encodings = Vec::with_capacity(files.len());
        for file in &files {
            let image = match image::open(file) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    tracing::warn!(path = %file.display(), error = %e, "skipping unreadable reference image");
                    continue;
                }
            };

            match analyzer.encode_primary(&image)? {
                Some(encoding) => encodings.push(encoding),
                None => tracing::warn!(path = %file.display(), "no face in reference image"),
            }
        }

        if encodings.is_empty() {
            return Err(ReferenceError::Empty(dir.display().to_string()));
        }

        tracing::info!(dir = %dir.display(), faces = encodings.len(), files = files.len(), "reference faces loaded");
        Ok(ReferenceFaceSet::new(encodings))
    }
}

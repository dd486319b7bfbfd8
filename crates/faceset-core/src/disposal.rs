//! What happens to duplicates, corrupted files and rejected crops.

use image::RgbImage;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Delete invalid items, or keep them under an `invalid/` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposal {
    Delete,
    Relocate(PathBuf),
}

impl Disposal {
    pub fn new(invalid_dir: Option<PathBuf>) -> Self {
        match invalid_dir {
            Some(dir) => Disposal::Relocate(dir),
            None => Disposal::Delete,
        }
    }

    /// Remove `path` from the source set: delete it, or move it into the
    /// invalid directory as `name`. Returns the new location when moved.
    pub fn discard(&self, path: &Path, name: &str) -> io::Result<Option<PathBuf>> {
        match self {
            Disposal::Delete => {
                fs::remove_file(path)?;
                Ok(None)
            }
            Disposal::Relocate(dir) => {
                fs::create_dir_all(dir)?;
                let dest = unique_destination(dir, name);
                if fs::rename(path, &dest).is_err() {
                    // rename fails across filesystems
                    fs::copy(path, &dest)?;
                    fs::remove_file(path)?;
                }
                Ok(Some(dest))
            }
        }
    }

    /// Keep a rejected crop for inspection. A no-op in delete mode.
    pub fn keep_rejected(&self, crop: &RgbImage, name: &str) -> image::ImageResult<Option<PathBuf>> {
        match self {
            Disposal::Delete => Ok(None),
            Disposal::Relocate(dir) => {
                fs::create_dir_all(dir)?;
                let dest = unique_destination(dir, name);
                crop.save(&dest)?;
                Ok(Some(dest))
            }
        }
    }
}

/// `dir/name`, or `dir/<stem>_<n>.<ext>` with the first free `n` if taken.
pub fn unique_destination(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(name);
    let stem = as_path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = as_path.extension().and_then(|e| e.to_str());

    (1u32..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{stem}_{n}.{ext}")),
            None => dir.join(format!("{stem}_{n}")),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

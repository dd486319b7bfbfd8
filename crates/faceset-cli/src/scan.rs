//! Source tree discovery.

use anyhow::{Context, Result};
use faceset_core::is_photo;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "mkv", "webm"];

#[derive(Debug, Default)]
pub struct SourceFiles {
    pub photos: Vec<PathBuf>,
    pub videos: Vec<PathBuf>,
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Walk `root` recursively, in file-name order, sorting files into photos
/// and videos. Everything else is ignored.
pub fn scan(root: &Path) -> Result<SourceFiles> {
    let mut files = SourceFiles::default();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.with_context(|| format!("cannot walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if is_photo(path) {
            files.photos.push(path.to_path_buf());
        } else if is_video(path) {
            files.videos.push(path.to_path_buf());
        } else {
            tracing::debug!(path = %path.display(), "ignoring file");
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_classifies_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("trip/day2");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("a.JPG"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::write(nested.join("b.png"), b"").unwrap();
        fs::write(nested.join("clip.MKV"), b"").unwrap();
        fs::write(dir.path().join("trip/c.webm"), b"").unwrap();

        let files = scan(dir.path()).unwrap();
        assert_eq!(files.photos, vec![dir.path().join("a.JPG"), nested.join("b.png")]);
        assert_eq!(files.videos.len(), 2);
    }

    #[test]
    fn test_scan_missing_root() {
        assert!(scan(Path::new("/nonexistent/faceset/source")).is_err());
    }
}

//! Near-duplicate elimination over a photo list.
//!
//! Single pass: each file is compared against every record retained so far.
//! It loses if any match is at least as large; otherwise it replaces all of
//! its matches. The outcome still depends on input order, so a file that
//! sits between two clusters can land differently if the order changes.
//! Cost is O(n²) in the number of survivors, fine for hand-curated photo
//! sets.

use crate::disposal::Disposal;
use crate::hasher::{HashRecord, PerceptualHasher};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};

pub struct DedupEngine {
    hasher: PerceptualHasher,
    disposal: Disposal,
    progress: bool,
}

impl DedupEngine {
    pub fn new(disposal: Disposal) -> Self {
        Self {
            hasher: PerceptualHasher::new(),
            disposal,
            progress: false,
        }
    }

    /// Draw a progress bar on stderr while cleaning.
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Remove corrupted files and near-duplicates from `files`.
    ///
    /// Two images are duplicates when their hash distance is at most
    /// `similarity_threshold`. Losers are deleted or relocated per the
    /// engine's [`Disposal`]. Returns the survivors in the order they were
    /// first retained.
    pub fn clean(&self, files: &[PathBuf], similarity_threshold: u32) -> Vec<PathBuf> {
        let bar = if self.progress {
            ProgressBar::new(files.len() as u64)
        } else {
            ProgressBar::hidden()
        };

        // Insertion-ordered so the tie-break is at least stable for a given input order.
        let mut retained: Vec<(PathBuf, HashRecord)> = Vec::new();
        let mut corrupted = 0usize;
        let mut duplicates = 0usize;

        for file in files {
            bar.inc(1);

            let incoming = match self.hasher.hash_file(file) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(path = %file.display(), error = %e, "corrupted image, discarding");
                    self.discard(file, &format!("corrupted_{}", file_name(file)));
                    corrupted += 1;
                    continue;
                }
            };

            duplicates += self.admit(&mut retained, file, incoming, similarity_threshold);
        }

        bar.finish_and_clear();
        tracing::info!(
            input = files.len(),
            retained = retained.len(),
            duplicates,
            corrupted,
            "duplicate scan complete"
        );

        retained.into_iter().map(|(path, _)| path).collect()
    }

    /// Judge `incoming` against every retained record within `threshold`.
    /// Returns how many files were discarded.
    fn admit(
        &self,
        retained: &mut Vec<(PathBuf, HashRecord)>,
        file: &Path,
        incoming: HashRecord,
        threshold: u32,
    ) -> usize {
        let matches: Vec<usize> = retained
            .iter()
            .enumerate()
            .filter(|(_, (_, kept))| kept.distance(&incoming) <= threshold)
            .map(|(i, _)| i)
            .collect();

        if let Some(&keeper) = matches.iter().find(|&&i| retained[i].1.area >= incoming.area) {
            let (kept_path, kept) = &retained[keeper];
            tracing::debug!(
                path = %file.display(),
                keeper = %kept_path.display(),
                distance = kept.distance(&incoming),
                "duplicate of a larger image"
            );
            self.discard(file, &duplicate_name(kept_path, file));
            return 1;
        }

        // Back to front so earlier indices stay valid.
        for &i in matches.iter().rev() {
            let (kept_path, kept) = retained.remove(i);
            tracing::debug!(
                path = %kept_path.display(),
                keeper = %file.display(),
                distance = kept.distance(&incoming),
                "replacing smaller duplicate"
            );
            self.discard(&kept_path, &duplicate_name(file, &kept_path));
        }
        retained.push((file.to_path_buf(), incoming));
        matches.len()
    }

    fn discard(&self, path: &Path, name: &str) {
        match self.disposal.discard(path, name) {
            Ok(Some(dest)) => {
                tracing::debug!(path = %path.display(), dest = %dest.display(), "relocated")
            }
            Ok(None) => tracing::debug!(path = %path.display(), "deleted"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to discard file"),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn duplicate_name(keeper: &Path, loser: &Path) -> String {
    let stem = keeper
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("duplicateof_{stem}_{}", file_name(loser))
}

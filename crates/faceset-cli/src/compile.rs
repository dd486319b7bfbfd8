//! Flatten a `collect` output directory into one sequentially named set.
//!
//! `SOURCE/videos/<clip>/*.jpg` files get a per-clip three-letter prefix
//! (`aaa_`, `aab_`, ...) and `SOURCE/images/*.jpg` get `zzz_`, so a plain
//! name sort of the output keeps clips together and photos last.

use anyhow::{Context, Result};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const IMAGE_PREFIX: &str = "zzz";

/// Copy every planned file. Returns the number of files copied.
pub fn run(source: &Path, output: &Path) -> Result<usize> {
    let plan = plan(source, output)?;
    fs::create_dir_all(output).with_context(|| format!("cannot create {}", output.display()))?;

    for (from, to) in &plan {
        fs::copy(from, to)
            .with_context(|| format!("cannot copy {} to {}", from.display(), to.display()))?;
    }

    tracing::info!(source = %source.display(), output = %output.display(), files = plan.len(), "compiled");
    Ok(plan.len())
}

/// `(from, to)` pairs in copy order. Later pairs win on output collisions.
pub fn plan(source: &Path, output: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut pairs = Vec::new();

    let clips = list_sorted(&source.join("videos"), |p| p.is_dir())?;
    for (clip, prefix) in clips.iter().zip(prefixes(clips.len())) {
        for file in list_sorted(clip, is_jpg)? {
            pairs.push(planned(&file, output, &prefix));
        }
    }

    for file in list_sorted(&source.join("images"), is_jpg)? {
        pairs.push(planned(&file, output, IMAGE_PREFIX));
    }

    let mut seen: HashMap<&Path, &Path> = HashMap::new();
    for (from, to) in &pairs {
        if let Some(previous) = seen.insert(to.as_path(), from.as_path()) {
            tracing::warn!(
                output = %to.display(),
                first = %previous.display(),
                second = %from.display(),
                "name collision"
            );
        }
    }

    Ok(pairs)
}

fn planned(file: &Path, output: &Path, prefix: &str) -> (PathBuf, PathBuf) {
    let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    (file.to_path_buf(), output.join(format!("{prefix}_{name}")))
}

fn is_jpg(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|e| e == "jpg")
}

/// Entries of `dir` passing `keep`, in natural order. A missing directory is empty.
fn list_sorted(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "directory missing, nothing to compile");
        return Ok(Vec::new());
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("cannot read {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| keep(p))
        .collect();

    entries.sort_by(|a, b| {
        let name = |p: &PathBuf| p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        natural_cmp(&name(a), &name(b))
    });
    Ok(entries)
}

/// `count` lowercase prefixes: all three-letter ones first, then four-letter.
pub fn prefixes(count: usize) -> Vec<String> {
    let mut out = Vec::with_capacity(count);
    for len in 3..=4u32 {
        let total = 26usize.pow(len);
        for mut n in 0..total {
            if out.len() == count {
                break;
            }
            let mut word = vec![b'a'; len as usize];
            for slot in word.iter_mut().rev() {
                *slot = b'a' + (n % 26) as u8;
                n /= 26;
            }
            out.push(String::from_utf8_lossy(&word).into_owned());
        }
    }
    out.sort();
    out
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk {
    Number(u128),
    Text(String),
}

fn chunks(s: &str) -> Vec<Chunk> {
    let mut out = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(&c) = chars.peek() {
        let digit = c.is_ascii_digit();
        let mut run = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() != digit {
                break;
            }
            run.push(c);
            chars.next();
        }
        out.push(match run.parse::<u128>() {
            Ok(n) if digit => Chunk::Number(n),
            _ => Chunk::Text(run.to_lowercase()),
        });
    }
    out
}

/// Case-insensitive comparison treating digit runs as numbers: `img_2` < `img_10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    chunks(a).cmp(&chunks(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, path.to_string_lossy().as_bytes()).unwrap();
    }

    #[test]
    fn test_natural_order() {
        let mut names = vec!["img_10.jpg", "img_2.jpg", "IMG_1.jpg", "img_1a.jpg"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["IMG_1.jpg", "img_1a.jpg", "img_2.jpg", "img_10.jpg"]);
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(prefixes(3), vec!["aaa", "aab", "aac"]);
        assert!(prefixes(0).is_empty());
        let many = prefixes(26 * 26 * 26 + 2);
        assert_eq!(many.len(), 17578);
        assert_eq!(many.last().map(String::as_str), Some("zzz"));
        assert!(many.contains(&"aaab".to_string()));
    }

    #[test]
    fn test_plan_prefixes_clips_and_images() {
        let src = tempfile::tempdir().unwrap();
        let out = Path::new("/out");
        touch(&src.path().join("videos/beach/img_10.jpg"));
        touch(&src.path().join("videos/beach/img_2.jpg"));
        touch(&src.path().join("videos/alps/img_1.jpg"));
        touch(&src.path().join("videos/alps/notes.txt"));
        touch(&src.path().join("images/img_3.jpg"));

        let names: Vec<PathBuf> = plan(src.path(), out).unwrap().into_iter().map(|(_, to)| to).collect();
        assert_eq!(
            names,
            vec![
                out.join("aaa_img_1.jpg"),
                out.join("aab_img_2.jpg"),
                out.join("aab_img_10.jpg"),
                out.join("zzz_img_3.jpg"),
            ]
        );
    }

    #[test]
    fn test_run_copies_and_tolerates_missing_videos() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        touch(&src.path().join("images/img_1.jpg"));
        touch(&src.path().join("images/img_2.jpg"));

        assert_eq!(run(src.path(), out.path()).unwrap(), 2);
        assert!(out.path().join("zzz_img_1.jpg").exists());
        assert!(out.path().join("zzz_img_2.jpg").exists());
    }
}

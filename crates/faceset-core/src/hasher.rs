//! Difference hash (dHash) fingerprints for near-duplicate detection.

use img_hash::{HashAlg, Hasher, HasherConfig, ImageHash};
use std::path::Path;
use thiserror::Error;

/// Hash grid edge length: 8×8 gradient comparisons = 64 bits.
const HASH_SIZE: u32 = 8;

#[derive(Error, Debug)]
pub enum HashError {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("pixel buffer of {path} does not fit {width}x{height}")]
    Buffer { path: String, width: u32, height: u32 },
}

/// Fingerprint plus pixel area of one decoded file.
#[derive(Debug, Clone)]
pub struct HashRecord {
    pub hash: ImageHash,
    pub area: u64,
}

impl HashRecord {
    /// Hamming distance between two fingerprints.
    pub fn distance(&self, other: &HashRecord) -> u32 {
        self.hash.dist(&other.hash)
    }
}

pub struct PerceptualHasher {
    hasher: Hasher,
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PerceptualHasher {
    pub fn new() -> Self {
        Self {
            hasher: HasherConfig::new()
                .hash_alg(HashAlg::Gradient)
                .hash_size(HASH_SIZE, HASH_SIZE)
                .to_hasher(),
        }
    }

    /// Decode `path` and fingerprint it.
    ///
    /// img_hash links its own decoder-less `image`, so decoding happens here
    /// and only the raw RGB buffer is handed across.
    pub fn hash_file(&self, path: &Path) -> Result<HashRecord, HashError> {
        let rgb = image::open(path)
            .map_err(|source| HashError::Decode {
                path: path.display().to_string(),
                source,
            })?
            .to_rgb8();
        let (width, height) = rgb.dimensions();

        let buffer = img_hash::image::RgbImage::from_raw(width, height, rgb.into_raw()).ok_or_else(|| {
            HashError::Buffer {
                path: path.display().to_string(),
                width,
                height,
            }
        })?;
        let img = img_hash::image::DynamicImage::ImageRgb8(buffer);

        Ok(HashRecord {
            hash: self.hasher.hash_image(&img),
            area: width as u64 * height as u64,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Smooth synthetic photo; the same scene at any resolution.
    pub(crate) fn scene(width: u32, height: u32, inverted: bool) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let u = x as f32 / width as f32;
            let v = y as f32 / height as f32;
            let s = ((u * 7.0 + v * 3.0).sin() * 0.5 + (u * v * 11.0).cos() * 0.5 + 1.0) / 2.0;
            let g = (s * 255.0) as u8;
            let g = if inverted { 255 - g } else { g };
            Rgb([g, g / 2 + 40, 255 - g / 2])
        })
    }

    #[test]
    fn test_same_scene_different_resolution_is_close() {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("small.png");
        let large = dir.path().join("large.png");
        scene(200, 150, false).save(&small).unwrap();
        scene(400, 300, false).save(&large).unwrap();

        let hasher = PerceptualHasher::new();
        let a = hasher.hash_file(&small).unwrap();
        let b = hasher.hash_file(&large).unwrap();

        assert_eq!(a.area, 200 * 150);
        assert_eq!(b.area, 400 * 300);
        assert!(a.distance(&b) <= 10, "distance = {}", a.distance(&b));
    }

    #[test]
    fn test_different_scene_is_far() {
        let dir = tempfile::tempdir().unwrap();
        let a_path = dir.path().join("a.png");
        let b_path = dir.path().join("b.png");
        scene(200, 150, false).save(&a_path).unwrap();
        scene(200, 150, true).save(&b_path).unwrap();

        let hasher = PerceptualHasher::new();
        let a = hasher.hash_file(&a_path).unwrap();
        let b = hasher.hash_file(&b_path).unwrap();
        assert!(a.distance(&b) > 10, "distance = {}", a.distance(&b));
    }

    #[test]
    fn test_corrupted_file_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        let err = PerceptualHasher::new().hash_file(&path).unwrap_err();
        assert!(matches!(err, HashError::Decode { .. }));
    }

    #[test]
    fn test_hashes_common_photo_formats() {
        let dir = tempfile::tempdir().unwrap();
        let hasher = PerceptualHasher::new();
        let reference = dir.path().join("scene.png");
        scene(160, 120, false).save(&reference).unwrap();
        let expected = hasher.hash_file(&reference).unwrap();

        for ext in ["jpg", "bmp"] {
            let path = dir.path().join(format!("scene.{ext}"));
            scene(160, 120, false).save(&path).unwrap();
            let record = hasher.hash_file(&path).unwrap();
            assert_eq!(record.area, 160 * 120, "{ext}");
            assert!(record.distance(&expected) <= 10, "{ext}: distance = {}", record.distance(&expected));
        }
    }
}

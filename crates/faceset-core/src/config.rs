use crate::validator::ValidationPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output crops must be at least this multiple of `min_face_size`.
pub const CROP_TO_FACE_RATIO: f32 = 1.5;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("crop_size must be at least min_face_size * {CROP_TO_FACE_RATIO} ({required}), got {crop_size}")]
    CropTooSmall { crop_size: u32, required: u32 },
    #[error("luminosity range is inverted: {min} > {max}")]
    LuminosityRange { min: u8, max: u8 },
    #[error("tolerance must be a positive number, got {0}")]
    Tolerance(f32),
    #[error("laplacian_threshold must be >= 0, got {0}")]
    LaplacianThreshold(f64),
    #[error("sample_height must be greater than zero")]
    SampleHeight,
}

/// Everything the photo pipeline can be tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum encoding distance for a match. Lower = stricter.
    pub tolerance: f32,
    /// Minimum length in pixels of the shorter side of a face.
    pub min_face_size: u32,
    /// Crops larger than this are scaled down to `crop_size`².
    pub crop_size: u32,
    /// Acceptable mean face brightness, inclusive.
    pub luminosity_range: (u8, u8),
    /// Minimum Laplacian variance of the face; 0 disables the blur check.
    pub laplacian_threshold: f64,
    /// Reject crops that contain more than one face.
    pub one_face: bool,
    /// Black out faces that do not match the reference set.
    pub mask_faces: bool,
    /// Keep duplicates, corrupted files and rejected crops under `invalid/`.
    pub save_invalid: bool,
    /// Maximum hash distance for two photos to count as duplicates.
    pub dedup_threshold: u32,
    /// Height photos are downsampled to before detection.
    pub sample_height: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tolerance: 1.0,
            min_face_size: 256,
            crop_size: 512,
            luminosity_range: (10, 245),
            laplacian_threshold: 0.0,
            one_face: false,
            mask_faces: false,
            save_invalid: false,
            dedup_threshold: 10,
            sample_height: 500,
        }
    }
}

impl PipelineConfig {
    /// Pre-flight check. Run once before any file is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = (self.min_face_size as f32 * CROP_TO_FACE_RATIO).ceil() as u32;
        if self.crop_size < required {
            return Err(ConfigError::CropTooSmall { crop_size: self.crop_size, required });
        }

        let (min, max) = self.luminosity_range;
        if min > max {
            return Err(ConfigError::LuminosityRange { min, max });
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigError::Tolerance(self.tolerance));
        }
        if self.laplacian_threshold.is_nan() || self.laplacian_threshold < 0.0 {
            return Err(ConfigError::LaplacianThreshold(self.laplacian_threshold));
        }
        if self.sample_height == 0 {
            return Err(ConfigError::SampleHeight);
        }
        Ok(())
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            min_face_size: self.min_face_size,
            min_luminosity: self.luminosity_range.0,
            max_luminosity: self.luminosity_range.1,
            one_face: self.one_face,
            laplacian_threshold: self.laplacian_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(PipelineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_crop_size_equal_to_face_size_fails() {
        let cfg = PipelineConfig { crop_size: 256, min_face_size: 256, ..Default::default() };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::CropTooSmall { crop_size: 256, required: 384 })
        );
    }

    #[test]
    fn test_crop_size_exactly_one_and_half() {
        let cfg = PipelineConfig { crop_size: 384, min_face_size: 256, ..Default::default() };
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn test_inverted_luminosity_range() {
        let cfg = PipelineConfig { luminosity_range: (200, 100), ..Default::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::LuminosityRange { .. })));
    }

    #[test]
    fn test_non_positive_tolerance() {
        let cfg = PipelineConfig { tolerance: 0.0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::Tolerance(_))));
    }

    #[test]
    fn test_zero_sample_height() {
        let cfg = PipelineConfig { sample_height: 0, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::SampleHeight));
    }

    #[test]
    fn test_policy_mirrors_config() {
        let cfg = PipelineConfig { one_face: true, luminosity_range: (20, 200), ..Default::default() };
        let policy = cfg.validation_policy();
        assert!(policy.one_face);
        assert_eq!((policy.min_luminosity, policy.max_luminosity), (20, 200));
        assert_eq!(policy.min_face_size, 256);
    }
}

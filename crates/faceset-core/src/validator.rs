//! Accept/reject policy for candidate crops.

use crate::analyzer::FaceAnalyzer;
use crate::geometry::{self, GRAYSCALE_TOLERANCE};
use image::RgbImage;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationPolicy {
    pub min_face_size: u32,
    pub min_luminosity: u8,
    pub max_luminosity: u8,
    pub one_face: bool,
    /// 0 disables the blur check.
    pub laplacian_threshold: f64,
}

/// Why a crop was turned down. The first failing check wins.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    MultipleFaces(usize),
    /// Face detection on the crop itself failed.
    Detection(String),
    TooSmall { size: u32, min: u32 },
    Luminosity { value: u8, min: u8, max: u8 },
    Grayscale,
    Blurry { variance: f64, threshold: f64 },
}

impl Rejection {
    /// Short tag used in filenames and summaries.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::MultipleFaces(_) => "multiple_faces",
            Rejection::Detection(_) => "detection_failed",
            Rejection::TooSmall { .. } => "too_small",
            Rejection::Luminosity { .. } => "luminosity",
            Rejection::Grayscale => "grayscale",
            Rejection::Blurry { .. } => "blurry",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MultipleFaces(n) => write!(f, "{n} faces in crop"),
            Rejection::Detection(e) => write!(f, "face detection on crop failed: {e}"),
            Rejection::TooSmall { size, min } => write!(f, "face is {size}px, minimum {min}px"),
            Rejection::Luminosity { value, min, max } => {
                write!(f, "luminosity {value} outside [{min}, {max}]")
            }
            Rejection::Grayscale => write!(f, "crop is grayscale"),
            Rejection::Blurry { variance, threshold } => {
                write!(f, "laplacian variance {variance:.1} below {threshold:.1}")
            }
        }
    }
}

pub struct FaceValidator {
    policy: ValidationPolicy,
}

impl FaceValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// `true` when every check passes.
    pub fn accept(&self, cropped: &RgbImage, face: &RgbImage, analyzer: &mut dyn FaceAnalyzer) -> bool {
        self.check(cropped, face, analyzer).is_ok()
    }

    /// Run the checks in order and report the first failure.
    ///
    /// `face` is the raw face rectangle; `cropped` the padded square around it.
    /// The analyzer is only consulted when `one_face` is set.
    pub fn check(
        &self,
        cropped: &RgbImage,
        face: &RgbImage,
        analyzer: &mut dyn FaceAnalyzer,
    ) -> Result<(), Rejection> {
        let p = &self.policy;

        if p.one_face {
            let faces = analyzer
                .count_faces(cropped)
                .map_err(|e| Rejection::Detection(e.to_string()))?;
            if faces > 1 {
                return Err(Rejection::MultipleFaces(faces));
            }
        }

        let size = face.width().min(face.height());
        if size < p.min_face_size {
            return Err(Rejection::TooSmall { size, min: p.min_face_size });
        }

        let value = geometry::luminosity(face).round().clamp(0.0, 255.0) as u8;
        if value < p.min_luminosity || value > p.max_luminosity {
            return Err(Rejection::Luminosity { value, min: p.min_luminosity, max: p.max_luminosity });
        }

        if geometry::is_grayscale(cropped, GRAYSCALE_TOLERANCE) {
            return Err(Rejection::Grayscale);
        }

        if p.laplacian_threshold > 0.0 {
            let variance = geometry::laplacian_variance(face);
            if variance < p.laplacian_threshold {
                return Err(Rejection::Blurry { variance, threshold: p.laplacian_threshold });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AnalyzerError;
    use crate::types::FaceCandidate;
    use image::Rgb;

    /// Reports a fixed face count and no candidates.
    struct CountingAnalyzer(usize);

    impl FaceAnalyzer for CountingAnalyzer {
        fn analyze(&mut self, _image: &RgbImage) -> Result<Vec<FaceCandidate>, AnalyzerError> {
            Ok(Vec::new())
        }

        fn count_faces(&mut self, _image: &RgbImage) -> Result<usize, AnalyzerError> {
            Ok(self.0)
        }
    }

    fn policy() -> ValidationPolicy {
        ValidationPolicy {
            min_face_size: 64,
            min_luminosity: 10,
            max_luminosity: 245,
            one_face: false,
            laplacian_threshold: 0.0,
        }
    }

    fn colored(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb(rgb))
    }

    /// Textured color image: passes the grayscale and blur checks.
    fn textured(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if (x / 3 + y / 3) % 2 == 0 { Rgb([220, 140, 90]) } else { Rgb([150, 80, 40]) }
        })
    }

    #[test]
    fn test_accepts_good_crop() {
        let v = FaceValidator::new(policy());
        let crop = textured(128, 128);
        let face = textured(100, 80);
        assert_eq!(v.check(&crop, &face, &mut CountingAnalyzer(1)), Ok(()));
        assert!(v.accept(&crop, &face, &mut CountingAnalyzer(1)));
    }

    #[test]
    fn test_rejects_small_face_at_any_luminosity() {
        let v = FaceValidator::new(policy());
        let crop = colored(128, 128, [200, 120, 80]);
        for level in [0u8, 5, 60, 128, 200, 250, 255] {
            let face = colored(120, 63, [level, level / 2, level / 3]);
            let result = v.check(&crop, &face, &mut CountingAnalyzer(1));
            assert_eq!(result, Err(Rejection::TooSmall { size: 63, min: 64 }), "level {level}");
        }
    }

    #[test]
    fn test_rejects_dark_and_bright_faces() {
        let v = FaceValidator::new(policy());
        let crop = colored(128, 128, [200, 120, 80]);

        let dark = colored(80, 80, [5, 5, 20]);
        assert!(matches!(
            v.check(&crop, &dark, &mut CountingAnalyzer(1)),
            Err(Rejection::Luminosity { value: 7, .. })
        ));

        let bright = colored(80, 80, [255, 250, 250]);
        assert!(matches!(
            v.check(&crop, &bright, &mut CountingAnalyzer(1)),
            Err(Rejection::Luminosity { .. })
        ));
    }

    #[test]
    fn test_luminosity_bounds_inclusive() {
        let v = FaceValidator::new(policy());
        let crop = colored(128, 128, [200, 120, 80]);
        let at_min = colored(80, 80, [10, 10, 10]);
        assert_eq!(v.check(&crop, &at_min, &mut CountingAnalyzer(1)), Ok(()));
    }

    #[test]
    fn test_rejects_grayscale_crop() {
        let v = FaceValidator::new(policy());
        let crop = colored(128, 128, [120, 120, 120]);
        let face = colored(80, 80, [120, 120, 120]);
        assert_eq!(v.check(&crop, &face, &mut CountingAnalyzer(1)), Err(Rejection::Grayscale));
    }

    #[test]
    fn test_one_face_policy() {
        let v = FaceValidator::new(ValidationPolicy { one_face: true, ..policy() });
        let crop = textured(128, 128);
        let face = textured(80, 80);
        assert_eq!(v.check(&crop, &face, &mut CountingAnalyzer(2)), Err(Rejection::MultipleFaces(2)));
        assert_eq!(v.check(&crop, &face, &mut CountingAnalyzer(1)), Ok(()));
    }

    #[test]
    fn test_one_face_off_ignores_bystanders() {
        let v = FaceValidator::new(policy());
        let crop = textured(128, 128);
        let face = textured(80, 80);
        assert_eq!(v.check(&crop, &face, &mut CountingAnalyzer(3)), Ok(()));
    }

    #[test]
    fn test_blur_threshold() {
        let v = FaceValidator::new(ValidationPolicy { laplacian_threshold: 50.0, ..policy() });
        let crop = textured(128, 128);

        let flat = colored(80, 80, [200, 120, 80]);
        assert!(matches!(
            v.check(&crop, &flat, &mut CountingAnalyzer(1)),
            Err(Rejection::Blurry { .. })
        ));
        assert_eq!(v.check(&crop, &textured(80, 80), &mut CountingAnalyzer(1)), Ok(()));
    }

    #[test]
    fn test_rejection_reasons() {
        assert_eq!(Rejection::Grayscale.reason(), "grayscale");
        assert_eq!(Rejection::TooSmall { size: 1, min: 2 }.reason(), "too_small");
        assert_eq!(Rejection::Grayscale.to_string(), "crop is grayscale");
    }
}

//! The face analysis seam: detection, encoding and landmarks.
//!
//! The pipeline only talks to [`FaceAnalyzer`]. [`OnnxFaceAnalyzer`] is the
//! production backend; tests substitute scripted analyzers.

use crate::detector::{DetectorError, FaceDetector};
use crate::landmarks::{LandmarkError, LandmarkPredictor};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{Embedding, FaceCandidate};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

pub const DETECTOR_MODEL: &str = "det_10g.onnx";
pub const RECOGNIZER_MODEL: &str = "w600k_r50.onnx";
pub const LANDMARK_MODEL: &str = "1k3d68.onnx";

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("landmark error: {0}")]
    Landmark(#[from] LandmarkError),
}

pub trait FaceAnalyzer {
    /// Detect every face in `image`, with its encoding and landmarks, in
    /// `image` coordinates.
    fn analyze(&mut self, image: &RgbImage) -> Result<Vec<FaceCandidate>, AnalyzerError>;

    /// Number of faces in `image`. Cheaper than [`analyze`](Self::analyze)
    /// where the backend allows it.
    fn count_faces(&mut self, image: &RgbImage) -> Result<usize, AnalyzerError> {
        Ok(self.analyze(image)?.len())
    }

    /// Encoding of the most prominent face, if any.
    fn encode_primary(&mut self, image: &RgbImage) -> Result<Option<Embedding>, AnalyzerError> {
        Ok(self.analyze(image)?.into_iter().next().map(|c| c.encoding))
    }
}

/// SCRFD + ArcFace + 68-point landmarks, all on ONNX Runtime.
pub struct OnnxFaceAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
    landmarks: LandmarkPredictor,
}

impl OnnxFaceAnalyzer {
    /// Load the three models from `model_dir`. Fails fast if any is missing.
    pub fn load(model_dir: &Path) -> Result<Self, AnalyzerError> {
        let path = |name: &str| model_dir.join(name).to_string_lossy().into_owned();

        let detector = FaceDetector::load(&path(DETECTOR_MODEL))?;
        let recognizer = FaceRecognizer::load(&path(RECOGNIZER_MODEL))?;
        let landmarks = LandmarkPredictor::load(&path(LANDMARK_MODEL))?;

        tracing::info!(dir = %model_dir.display(), "face analysis models loaded");
        Ok(Self { detector, recognizer, landmarks })
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn analyze(&mut self, image: &RgbImage) -> Result<Vec<FaceCandidate>, AnalyzerError> {
        let detections = self.detector.detect(image)?;
        let mut candidates = Vec::with_capacity(detections.len());

        for det in &detections {
            let encoding = self.recognizer.extract(image, det)?;
            let landmarks = self.landmarks.predict(image, det)?;
            candidates.push(FaceCandidate {
                location: det.face_box(),
                encoding,
                landmarks,
            });
        }

        tracing::trace!(faces = candidates.len(), "analyzed image");
        Ok(candidates)
    }

    fn count_faces(&mut self, image: &RgbImage) -> Result<usize, AnalyzerError> {
        Ok(self.detector.detect(image)?.len())
    }

    fn encode_primary(&mut self, image: &RgbImage) -> Result<Option<Embedding>, AnalyzerError> {
        // Detections come back sorted by confidence.
        match self.detector.detect(image)?.first() {
            Some(det) => Ok(Some(self.recognizer.extract(image, det)?)),
            None => Ok(None),
        }
    }
}

//! 68-point facial landmark regressor via ONNX Runtime.
//!
//! Runs InsightFace's `1k3d68` model on a square crop around each
//! detection and maps the points back to image coordinates.

use crate::alignment::{self, SimilarityMatrix};
use crate::detector::Detection;
use crate::types::{Landmarks, Point};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const LANDMARK_INPUT_SIZE: u32 = 192;
/// Crop side relative to the longer side of the detection box.
const LANDMARK_CROP_EXPAND: f32 = 1.5;
const LANDMARK_COUNT: usize = 68;
/// Outputs at least this long carry (x, y, z) triples instead of (x, y) pairs.
const LANDMARK_3D_OUTPUT_LEN: usize = 3000;

#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("model file not found: {0}; download from insightface and place in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("degenerate detection box ({0}x{1})")]
    DegenerateBox(f32, f32),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

pub struct LandmarkPredictor {
    session: Session,
}

impl LandmarkPredictor {
    pub fn load(model_path: &str) -> Result<Self, LandmarkError> {
        if !Path::new(model_path).exists() {
            return Err(LandmarkError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, "loaded landmark model");
        Ok(Self { session })
    }

    /// Landmarks for one detection, in `image` coordinates.
    pub fn predict(&mut self, image: &RgbImage, face: &Detection) -> Result<Landmarks, LandmarkError> {
        let matrix = crop_matrix(face)?;
        let crop = alignment::warp_affine(image, &matrix, LANDMARK_INPUT_SIZE);
        let input = preprocess(&crop);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| LandmarkError::InferenceFailed(format!("landmark extraction: {e}")))?;

        let points = decode_points(raw, &matrix)?;
        Landmarks::from_ibug68(&points).ok_or_else(|| {
            LandmarkError::InferenceFailed(format!("expected {LANDMARK_COUNT} points, got {}", points.len()))
        })
    }
}

/// Scale-and-translate matrix putting the detection center at the crop center.
fn crop_matrix(face: &Detection) -> Result<SimilarityMatrix, LandmarkError> {
    let longest = face.width.max(face.height);
    if !longest.is_finite() || longest <= 0.0 {
        return Err(LandmarkError::DegenerateBox(face.width, face.height));
    }

    let half = LANDMARK_INPUT_SIZE as f32 / 2.0;
    let s = LANDMARK_INPUT_SIZE as f32 / (longest * LANDMARK_CROP_EXPAND);
    let cx = face.x + face.width / 2.0;
    let cy = face.y + face.height / 2.0;

    Ok([s, 0.0, half - cx * s, 0.0, s, half - cy * s])
}

/// The model expects raw 0–255 RGB values.
fn preprocess(crop: &RgbImage) -> Array4<f32> {
    let size = LANDMARK_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, px) in crop.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = px.0[c] as f32;
        }
    }
    tensor
}

/// Model output (normalized to [-1, 1] in crop space) → image coordinates.
fn decode_points(raw: &[f32], matrix: &SimilarityMatrix) -> Result<Vec<Point>, LandmarkError> {
    let dims = if raw.len() >= LANDMARK_3D_OUTPUT_LEN { 3 } else { 2 };
    let rows = raw.len() / dims;
    if rows < LANDMARK_COUNT {
        return Err(LandmarkError::InferenceFailed(format!(
            "landmark output too short: {} values",
            raw.len()
        )));
    }

    let half = LANDMARK_INPUT_SIZE as f32 / 2.0;
    let (s, tx, ty) = (matrix[0], matrix[2], matrix[5]);

    // The 68 2D landmarks are the trailing rows.
    Ok(raw
        .chunks_exact(dims)
        .skip(rows - LANDMARK_COUNT)
        .map(|row| {
            let cx = (row[0] + 1.0) * half;
            let cy = (row[1] + 1.0) * half;
            ((cx - tx) / s, (cy - ty) / s)
        })
        .collect())
}

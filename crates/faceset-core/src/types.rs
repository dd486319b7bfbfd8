use serde::{Deserialize, Serialize};

/// A 2D point in pixel coordinates.
pub type Point = (f32, f32);

/// Face rectangle as `(top, right, bottom, left)` edges, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl FaceBox {
    pub fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self { top, right, bottom, left }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// Named landmark point lists for one detected face (iBUG 68-point layout).
///
/// Only `chin`, the nose and the eyebrows feed the face mask; the eyes and
/// lips are carried along for completeness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmarks {
    pub chin: Vec<Point>,
    pub left_eyebrow: Vec<Point>,
    pub right_eyebrow: Vec<Point>,
    pub nose_bridge: Vec<Point>,
    pub nose_tip: Vec<Point>,
    pub left_eye: Vec<Point>,
    pub right_eye: Vec<Point>,
    pub top_lip: Vec<Point>,
    pub bottom_lip: Vec<Point>,
}

impl Landmarks {
    /// Split a 68-point iBUG landmark array into named regions.
    ///
    /// Returns `None` when fewer than 68 points are supplied.
    pub fn from_ibug68(points: &[Point]) -> Option<Self> {
        if points.len() < 68 {
            return None;
        }
        let pick = |idx: &[usize]| -> Vec<Point> { idx.iter().map(|&i| points[i]).collect() };

        Some(Self {
            chin: points[0..17].to_vec(),
            left_eyebrow: points[17..22].to_vec(),
            right_eyebrow: points[22..27].to_vec(),
            nose_bridge: points[27..31].to_vec(),
            nose_tip: points[31..36].to_vec(),
            left_eye: points[36..42].to_vec(),
            right_eye: points[42..48].to_vec(),
            top_lip: pick(&[48, 49, 50, 51, 52, 53, 54, 64, 63, 62, 61, 60]),
            bottom_lip: pick(&[54, 55, 56, 57, 58, 59, 48, 60, 67, 66, 65, 64]),
        })
    }
}

/// Face encoding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Euclidean distance between two embeddings. Lower = more similar.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One detected face in the working (downsampled) image.
#[derive(Debug, Clone)]
pub struct FaceCandidate {
    pub location: FaceBox,
    pub encoding: Embedding,
    pub landmarks: Landmarks,
}

/// The known-identity encodings every candidate is compared against.
#[derive(Debug, Clone, Default)]
pub struct ReferenceFaceSet {
    encodings: Vec<Embedding>,
}

impl ReferenceFaceSet {
    pub fn new(encodings: Vec<Embedding>) -> Self {
        Self { encodings }
    }

    pub fn len(&self) -> usize {
        self.encodings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encodings.is_empty()
    }

    pub fn encodings(&self) -> &[Embedding] {
        &self.encodings
    }
}

/// Result of comparing a probe encoding against the reference set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Smallest distance to any reference encoding (`f32::INFINITY` for an empty set).
    pub distance: f32,
}

/// Strategy for comparing a probe encoding against the reference set.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, references: &ReferenceFaceSet, tolerance: f32) -> MatchResult;
}

/// Euclidean distance matcher: a probe matches when it lies within
/// `tolerance` of any reference encoding.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(&self, probe: &Embedding, references: &ReferenceFaceSet, tolerance: f32) -> MatchResult {
        let distance = references
            .encodings()
            .iter()
            .map(|r| probe.euclidean_distance(r))
            .fold(f32::INFINITY, f32::min);

        MatchResult {
            matched: distance <= tolerance,
            distance,
        }
    }
}

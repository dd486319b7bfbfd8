//! Face masks built from landmark geometry.
//!
//! Each face yields a convex polygon around its jawline, nose and eyebrows.
//! Non-target faces are painted out of a white overlay with a shrunken
//! polygon; the target face is painted back in with an expanded one, so an
//! overlapping bystander mask never eats into the target.

use crate::types::{Landmarks, Point};
use image::{GrayImage, Luma, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point as PixelPoint;
use thiserror::Error;

/// Per-region scale factors: `< 1.0` shrinks a region toward its centroid,
/// `> 1.0` grows it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionScale {
    pub chin: f32,
    pub nose: f32,
    pub brows: f32,
}

impl RegionScale {
    pub const fn uniform(scale: f32) -> Self {
        Self { chin: scale, nose: scale, brows: scale }
    }
}

/// Shrink applied to faces that do not match the reference set.
pub const SUPPRESS_SCALE: RegionScale = RegionScale { chin: 0.8, nose: 0.95, brows: 0.95 };

/// Growth applied to the target face's protective mask.
pub const PROTECT_SCALE: RegionScale = RegionScale::uniform(1.2);

#[derive(Error, Debug, PartialEq)]
pub enum MaskError {
    #[error("landmark region '{0}' is empty")]
    MissingRegion(&'static str),
    #[error("mask hull has only {0} vertices")]
    Degenerate(usize),
}

/// Convex mask polygon for one face, in hull order.
///
/// `target_scale` maps the landmark coordinates (detection resolution) to
/// the image the mask will be painted on.
pub fn compute_mask(
    landmarks: &Landmarks,
    scale: RegionScale,
    target_scale: f32,
) -> Result<Vec<Point>, MaskError> {
    let chin = landmarks.chin.clone();
    let nose = [landmarks.nose_tip.as_slice(), landmarks.nose_bridge.as_slice()].concat();
    let brows = [landmarks.left_eyebrow.as_slice(), landmarks.right_eyebrow.as_slice()].concat();

    let mut points = Vec::with_capacity(chin.len() + nose.len() + brows.len());
    for (name, region, factor) in [
        ("chin", chin, scale.chin),
        ("nose", nose, scale.nose),
        ("eyebrows", brows, scale.brows),
    ] {
        if region.is_empty() {
            return Err(MaskError::MissingRegion(name));
        }
        points.extend(scale_about_centroid(&region, factor));
    }

    let hull = convex_hull(&points);
    if hull.len() < 3 {
        return Err(MaskError::Degenerate(hull.len()));
    }

    Ok(hull
        .into_iter()
        .map(|(x, y)| (x * target_scale, y * target_scale))
        .collect())
}

fn scale_about_centroid(points: &[Point], factor: f32) -> Vec<Point> {
    let n = points.len() as f32;
    let cx = points.iter().map(|p| p.0).sum::<f32>() / n;
    let cy = points.iter().map(|p| p.1).sum::<f32>() / n;

    points
        .iter()
        .map(|&(x, y)| (cx + (x - cx) * factor, cy + (y - cy) * factor))
        .collect()
}

fn cross(o: Point, a: Point, b: Point) -> f32 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// Andrew's monotone chain. Returns hull vertices counter-clockwise (in
/// y-up terms), collinear points dropped.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points.iter().copied().filter(|p| p.0.is_finite() && p.1.is_finite()).collect();
    pts.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    pts.dedup();

    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Point> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Single-channel overlay: 255 keeps a source pixel, 0 blacks it out.
pub struct FaceOverlay {
    mask: GrayImage,
}

impl FaceOverlay {
    /// Full-white overlay for a `width`×`height` image.
    pub fn new(width: u32, height: u32) -> Self {
        Self { mask: GrayImage::from_pixel(width, height, Luma([255])) }
    }

    /// Paint a non-target face out.
    pub fn suppress(&mut self, polygon: &[Point]) {
        self.fill(polygon, 0);
    }

    /// Paint the target face back in.
    pub fn protect(&mut self, polygon: &[Point]) {
        self.fill(polygon, 255);
    }

    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    fn fill(&mut self, polygon: &[Point], value: u8) {
        let mut poly: Vec<PixelPoint<i32>> = Vec::with_capacity(polygon.len());
        for &(x, y) in polygon {
            let p = PixelPoint::new(x.round() as i32, y.round() as i32);
            if poly.last() != Some(&p) {
                poly.push(p);
            }
        }
        // imageproc rejects polygons that repeat their first vertex.
        while poly.len() > 1 && poly.first() == poly.last() {
            poly.pop();
        }
        if poly.len() < 3 {
            tracing::debug!(vertices = poly.len(), "skipping degenerate mask polygon");
            return;
        }
        draw_polygon_mut(&mut self.mask, &poly, Luma([value]));
    }

    /// Bitwise AND of every channel with the overlay.
    pub fn apply(&self, image: &mut RgbImage) {
        for (px, m) in image.pixels_mut().zip(self.mask.pixels()) {
            let keep = m.0[0];
            for c in px.0.iter_mut() {
                *c &= keep;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgb;

    /// Synthetic face: lower-half jaw arc, a brow line and a vertical nose.
    pub(crate) fn face_landmarks(cx: f32, cy: f32, r: f32) -> Landmarks {
        let chin = (0..17)
            .map(|i| {
                let t = std::f32::consts::PI * i as f32 / 16.0;
                (cx + r * t.cos(), cy + r * t.sin())
            })
            .collect();
        let brow = |from: f32, to: f32| -> Vec<Point> {
            (0..5)
                .map(|i| (cx + r * (from + (to - from) * i as f32 / 4.0), cy - 0.6 * r))
                .collect()
        };
        Landmarks {
            chin,
            left_eyebrow: brow(-0.9, -0.1),
            right_eyebrow: brow(0.1, 0.9),
            nose_bridge: (0..4).map(|i| (cx, cy - 0.4 * r + 0.1 * r * i as f32)).collect(),
            nose_tip: (0..5).map(|i| (cx - 0.2 * r + 0.1 * r * i as f32, cy + 0.1 * r)).collect(),
            ..Landmarks::default()
        }
    }

    fn all_points(lm: &Landmarks) -> Vec<Point> {
        [
            lm.chin.as_slice(),
            lm.nose_tip.as_slice(),
            lm.nose_bridge.as_slice(),
            lm.left_eyebrow.as_slice(),
            lm.right_eyebrow.as_slice(),
        ]
        .concat()
    }

    fn is_convex(poly: &[Point]) -> bool {
        let n = poly.len();
        (0..n).all(|i| cross(poly[i], poly[(i + 1) % n], poly[(i + 2) % n]) > 0.0)
    }

    #[test]
    fn test_convex_hull_square_with_interior() {
        let pts = vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (2.0, 2.0), (1.0, 3.0), (2.0, 0.0)];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&(2.0, 2.0)));
        assert!(!hull.contains(&(2.0, 0.0)), "collinear edge point kept");
        assert!(is_convex(&hull));
    }

    #[test]
    fn test_convex_hull_collinear() {
        let pts = vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)];
        assert_eq!(convex_hull(&pts).len(), 2);
    }

    #[test]
    fn test_compute_mask_is_convex() {
        let lm = face_landmarks(100.0, 100.0, 40.0);
        for scale in [SUPPRESS_SCALE, PROTECT_SCALE, RegionScale::uniform(1.0)] {
            let poly = compute_mask(&lm, scale, 2.5).unwrap();
            assert!(poly.len() >= 3);
            assert!(is_convex(&poly), "non-convex mask for {scale:?}");
        }
    }

    #[test]
    fn test_unit_scale_reproduces_hull() {
        let lm = face_landmarks(80.0, 60.0, 30.0);
        let poly = compute_mask(&lm, RegionScale::uniform(1.0), 1.0).unwrap();
        let hull = convex_hull(&all_points(&lm));
        assert_eq!(poly.len(), hull.len());
        for (a, b) in poly.iter().zip(hull.iter()) {
            assert!((a.0 - b.0).abs() < 1e-3 && (a.1 - b.1).abs() < 1e-3, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_target_scale_multiplies_points() {
        let lm = face_landmarks(50.0, 50.0, 20.0);
        let base = compute_mask(&lm, PROTECT_SCALE, 1.0).unwrap();
        let scaled = compute_mask(&lm, PROTECT_SCALE, 3.0).unwrap();
        for (a, b) in base.iter().zip(scaled.iter()) {
            assert!((a.0 * 3.0 - b.0).abs() < 1e-3 && (a.1 * 3.0 - b.1).abs() < 1e-3);
        }
    }

    #[test]
    fn test_shrink_stays_inside_expand() {
        let lm = face_landmarks(100.0, 100.0, 40.0);
        let shrunk = compute_mask(&lm, SUPPRESS_SCALE, 1.0).unwrap();
        let grown = compute_mask(&lm, PROTECT_SCALE, 1.0).unwrap();
        let width = |p: &[Point]| {
            let xs = p.iter().map(|q| q.0);
            xs.clone().fold(f32::MIN, f32::max) - xs.fold(f32::MAX, f32::min)
        };
        assert!(width(&shrunk) < width(&grown));
    }

    #[test]
    fn test_missing_region() {
        let lm = Landmarks { chin: vec![(0.0, 0.0), (1.0, 1.0)], ..Landmarks::default() };
        assert_eq!(compute_mask(&lm, PROTECT_SCALE, 1.0), Err(MaskError::MissingRegion("nose")));
    }

    #[test]
    fn test_overlay_suppress_then_protect() {
        let mut overlay = FaceOverlay::new(100, 100);
        overlay.suppress(&[(10.0, 10.0), (90.0, 10.0), (90.0, 90.0), (10.0, 90.0)]);
        overlay.protect(&[(40.0, 40.0), (60.0, 40.0), (60.0, 60.0), (40.0, 60.0)]);

        let mask = overlay.mask();
        assert_eq!(mask.get_pixel(2, 2).0[0], 255);
        assert_eq!(mask.get_pixel(20, 20).0[0], 0);
        assert_eq!(mask.get_pixel(50, 50).0[0], 255);

        let mut img = RgbImage::from_pixel(100, 100, Rgb([200, 120, 80]));
        overlay.apply(&mut img);
        assert_eq!(img.get_pixel(20, 20).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(50, 50).0, [200, 120, 80]);
        assert_eq!(img.get_pixel(2, 2).0, [200, 120, 80]);
    }

    #[test]
    fn test_overlay_ignores_degenerate_polygon() {
        let mut overlay = FaceOverlay::new(10, 10);
        overlay.suppress(&[(1.1, 1.1), (1.2, 1.2), (0.9, 0.9)]);
        assert!(overlay.mask().pixels().all(|p| p.0[0] == 255));
    }
}

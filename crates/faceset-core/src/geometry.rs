//! Coordinate scaling, cropping and pixel statistics.
//!
//! Detection runs on a downsampled copy of each photo; everything here maps
//! between that working resolution and the source, and measures the pixel
//! properties the validator gates on.

use crate::types::FaceBox;
use image::imageops::{self, FilterType};
use image::RgbImage;
use thiserror::Error;

/// Rec.601 luma weights.
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

/// Mean per-pixel channel spread at or below which a region counts as monochrome.
pub const GRAYSCALE_TOLERANCE: f32 = 3.0;

#[derive(Error, Debug, PartialEq)]
pub enum GeometryError {
    #[error("image has zero extent ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("face region is degenerate after clamping: {0:?}")]
    DegenerateRegion(FaceBox),
}

/// Integer crop window within a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Padded-square crop plus the raw face rectangle it was built around.
pub struct CropResult {
    pub cropped: RgbImage,
    pub face: RgbImage,
}

/// Resize to `target_height`, preserving aspect ratio. Never upsamples.
pub fn downsample_to_height(image: &RgbImage, target_height: u32) -> Result<RgbImage, GeometryError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || target_height == 0 {
        return Err(GeometryError::EmptyImage { width, height });
    }

    let new_h = target_height.min(height);
    if new_h == height {
        return Ok(image.clone());
    }
    let new_w = ((width as f64 * new_h as f64 / height as f64).round() as u32).max(1);

    Ok(imageops::resize(image, new_w, new_h, FilterType::Triangle))
}

/// Scale a box between two `(height, width)` extents.
///
/// Uses the height ratio only: the downsample keeps aspect ratio, so the
/// scale is uniform.
pub fn scale_coords(face: FaceBox, from_size: (u32, u32), to_size: (u32, u32)) -> FaceBox {
    let scale = to_size.0 as f32 / from_size.0 as f32;
    FaceBox {
        top: face.top * scale,
        right: face.right * scale,
        bottom: face.bottom * scale,
        left: face.left * scale,
    }
}

/// Square window around `face` inside a `width`×`height` image.
///
/// The shorter side of the box is grown symmetrically to match the longer
/// one. If the square spills past an edge the window is shifted inward, so
/// faces near an edge end up off-center in the crop. The side is capped by
/// the shorter image dimension.
pub fn padded_square_region(width: u32, height: u32, face: &FaceBox) -> Option<CropRegion> {
    if width == 0 || height == 0 {
        return None;
    }

    let longest = face.width().max(face.height());
    if !longest.is_finite() || longest <= 0.0 {
        return None;
    }
    let side = (longest.round() as u32).clamp(1, width.min(height));

    let cx = (face.left + face.right) / 2.0;
    let cy = (face.top + face.bottom) / 2.0;
    let half = side as f32 / 2.0;

    let x = (cx - half).round().clamp(0.0, (width - side) as f32) as u32;
    let y = (cy - half).round().clamp(0.0, (height - side) as f32) as u32;

    Some(CropRegion { x, y, width: side, height: side })
}

/// Crop `image` to the padded square around `face`.
pub fn crop_as_padded_square(image: &RgbImage, face: &FaceBox) -> Result<RgbImage, GeometryError> {
    let (width, height) = image.dimensions();
    let region =
        padded_square_region(width, height, face).ok_or(GeometryError::DegenerateRegion(*face))?;
    Ok(imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image())
}

/// The raw face rectangle, rounded and clamped to the image.
pub fn face_region(image: &RgbImage, face: &FaceBox) -> Result<RgbImage, GeometryError> {
    let (width, height) = image.dimensions();
    let clamp = |v: f32, max: u32| v.round().clamp(0.0, max as f32) as u32;

    let left = clamp(face.left, width);
    let right = clamp(face.right, width);
    let top = clamp(face.top, height);
    let bottom = clamp(face.bottom, height);

    if right <= left || bottom <= top {
        return Err(GeometryError::DegenerateRegion(*face));
    }
    Ok(imageops::crop_imm(image, left, top, right - left, bottom - top).to_image())
}

/// Crop the padded square and the raw face rectangle in one go.
pub fn crop_face(image: &RgbImage, face: &FaceBox) -> Result<CropResult, GeometryError> {
    Ok(CropResult {
        cropped: crop_as_padded_square(image, face)?,
        face: face_region(image, face)?,
    })
}

/// Downscale a square crop to `crop_size` if either side exceeds it.
pub fn fit_to_crop_size(cropped: RgbImage, crop_size: u32) -> Result<RgbImage, GeometryError> {
    let (width, height) = cropped.dimensions();
    if width == 0 || height == 0 || crop_size == 0 {
        return Err(GeometryError::EmptyImage { width, height });
    }
    if width <= crop_size && height <= crop_size {
        return Ok(cropped);
    }
    Ok(imageops::resize(&cropped, crop_size, crop_size, FilterType::Lanczos3))
}

/// Mean brightness of a region as a single luma value (0.0–255.0).
pub fn luminosity(region: &RgbImage) -> f32 {
    let count = region.width() as usize * region.height() as usize;
    if count == 0 {
        return 0.0;
    }

    let mut sums = [0u64; 3];
    for px in region.pixels() {
        for (sum, &c) in sums.iter_mut().zip(px.0.iter()) {
            *sum += c as u64;
        }
    }
    let mean = |s: u64| s as f32 / count as f32;

    LUMA_R * mean(sums[0]) + LUMA_G * mean(sums[1]) + LUMA_B * mean(sums[2])
}

/// True when the three channels are effectively equal across the region.
pub fn is_grayscale(region: &RgbImage, tolerance: f32) -> bool {
    let count = region.width() as usize * region.height() as usize;
    if count == 0 {
        return true;
    }

    let spread: u64 = region
        .pixels()
        .map(|px| {
            let [r, g, b] = px.0;
            (r.max(g).max(b) - r.min(g).min(b)) as u64
        })
        .sum();

    spread as f32 / count as f32 <= tolerance
}

/// 4-neighbour Laplacian.
const LAPLACIAN_KERNEL: [i32; 9] = [0, 1, 0, 1, -4, 1, 0, 1, 0];

/// Variance of the Laplacian of the luma image. Low values mean blur.
pub fn laplacian_variance(region: &RgbImage) -> f64 {
    let gray = imageops::grayscale(region);
    let lap = imageproc::filter::filter3x3::<_, i32, i16>(&gray, &LAPLACIAN_KERNEL);

    let n = lap.width() as usize * lap.height() as usize;
    if n == 0 {
        return 0.0;
    }
    let mean = lap.pixels().map(|p| p.0[0] as f64).sum::<f64>() / n as f64;
    lap.pixels().map(|p| (p.0[0] as f64 - mean).powi(2)).sum::<f64>() / n as f64
}

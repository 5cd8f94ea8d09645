//! Image preprocessing: turn a rendered page into a clean binary image.
//!
//! Steps, in order:
//! 1. Grayscale conversion
//! 2. 3×3 median filter (optional) to remove salt-and-pepper scan noise
//! 3. Gaussian adaptive threshold: a pixel is white iff it is brighter than
//!    its Gaussian-weighted neighbourhood mean minus a small offset. Global
//!    thresholds fail on scans with uneven lighting; a local mean does not.
//! 4. Deskew (optional): projection-profile search over ±5°
//!
//! Every step keeps the image dimensions. The transform is pure and
//! deterministic. Failures are reported as [`PreprocessError`] so the caller
//! can fall back to the unprocessed raster.

use crate::config::PreprocessProfile;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use tracing::debug;

/// Largest skew searched, in degrees, either direction.
const MAX_SKEW_DEGREES: f32 = 5.0;
const SKEW_STEP_DEGREES: f32 = 0.5;
/// Estimated skews smaller than this are left alone.
const MIN_SKEW_CORRECTION: f32 = 0.25;
/// Skew is estimated on a copy no wider than this.
const SKEW_ESTIMATE_WIDTH: u32 = 800;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("image has zero size ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("image operation panicked: {0}")]
    Panicked(String),
}

/// Applies a [`PreprocessProfile`] to page rasters.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    profile: PreprocessProfile,
}

impl ImagePreprocessor {
    pub fn new(profile: PreprocessProfile) -> Self {
        Self { profile }
    }

    pub fn is_enabled(&self) -> bool {
        self.profile.enabled
    }

    pub fn profile(&self) -> &PreprocessProfile {
        &self.profile
    }

    /// Enhance `image` for OCR.
    ///
    /// image/imageproc operations panic on some malformed buffers instead of
    /// returning errors; those panics are caught and reported.
    pub fn process(&self, image: &DynamicImage) -> Result<DynamicImage, PreprocessError> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(PreprocessError::EmptyImage { width, height });
        }

        let enhanced = catch_unwind(AssertUnwindSafe(|| self.enhance(image)))
            .map_err(|payload| PreprocessError::Panicked(panic_message(payload.as_ref())))?;

        Ok(DynamicImage::ImageLuma8(enhanced))
    }

    fn enhance(&self, image: &DynamicImage) -> GrayImage {
        let mut gray = image.to_luma8();

        if self.profile.denoise {
            gray = median_filter(&gray, 1, 1);
        }

        let mut binary = gaussian_adaptive_threshold(
            &gray,
            self.profile.threshold_block_size,
            self.profile.threshold_offset,
        );

        if self.profile.deskew {
            let angle = estimate_skew(&binary);
            if angle.abs() >= MIN_SKEW_CORRECTION {
                debug!("Deskewing by {:.1}°", angle);
                binary = rotate_about_center(
                    &binary,
                    angle.to_radians(),
                    Interpolation::Nearest,
                    Luma([255]),
                );
            }
        }

        binary
    }
}

/// Binarise with a Gaussian-weighted local mean threshold.
///
/// `block_size` is the neighbourhood diameter; σ follows the usual
/// `0.3·((block−1)/2 − 1) + 0.8` relation so a block of 11 gives σ = 2.0.
pub fn gaussian_adaptive_threshold(gray: &GrayImage, block_size: u32, offset: i16) -> GrayImage {
    let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let local_mean = gaussian_blur_f32(gray, sigma.max(0.1));

    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let value = gray.get_pixel(x, y)[0] as i16;
        let threshold = local_mean.get_pixel(x, y)[0] as i16 - offset;
        *pixel = Luma([if value > threshold { 255 } else { 0 }]);
    }
    out
}

/// Rotation (degrees) that best aligns text lines with the horizontal axis.
///
/// Text lines give sharply peaked row profiles when horizontal, so the angle
/// maximising the sum of squared dark-pixel row counts wins.
pub fn estimate_skew(binary: &GrayImage) -> f32 {
    let sample = if binary.width() > SKEW_ESTIMATE_WIDTH {
        let height = (binary.height() as u64 * SKEW_ESTIMATE_WIDTH as u64
            / binary.width() as u64)
            .max(1) as u32;
        imageops::resize(binary, SKEW_ESTIMATE_WIDTH, height, FilterType::Triangle)
    } else {
        binary.clone()
    };

    let steps = (MAX_SKEW_DEGREES / SKEW_STEP_DEGREES) as i32;
    let mut best_angle = 0.0_f32;
    let mut best_score = row_profile_score(&sample);

    for i in -steps..=steps {
        if i == 0 {
            continue;
        }
        let angle = i as f32 * SKEW_STEP_DEGREES;
        let rotated = rotate_about_center(
            &sample,
            angle.to_radians(),
            Interpolation::Nearest,
            Luma([255]),
        );
        let score = row_profile_score(&rotated);
        if score > best_score {
            best_score = score;
            best_angle = angle;
        }
    }

    best_angle
}

fn row_profile_score(image: &GrayImage) -> u64 {
    image
        .rows()
        .map(|row| {
            let dark = row.filter(|p| p[0] < 128).count() as u64;
            dark * dark
        })
        .sum()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// White page with black horizontal bars, like lines of text.
    fn lined_page(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let on_line = y % 20 < 4 && y > 20 && y < height - 20;
            let in_margin = x < 20 || x >= width - 20;
            if on_line && !in_margin {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    #[test]
    fn keeps_dimensions_and_binarises() {
        let rgb = RgbImage::from_fn(123, 77, |x, y| {
            if (x / 7 + y / 5) % 2 == 0 {
                Rgb([30, 30, 30])
            } else {
                Rgb([230, 220, 210])
            }
        });
        let pre = ImagePreprocessor::new(PreprocessProfile::default());
        let out = pre.process(&DynamicImage::ImageRgb8(rgb)).unwrap();
        assert_eq!((out.width(), out.height()), (123, 77));
        let gray = out.to_luma8();
        assert!(gray.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn dark_text_stays_dark_on_light_background() {
        let page = lined_page(200, 120);
        let out = gaussian_adaptive_threshold(&page, 11, 2);
        // Middle of the bar at y = 41..43
        assert_eq!(out.get_pixel(100, 42)[0], 0);
        // Plain background
        assert_eq!(out.get_pixel(100, 30)[0], 255);
    }

    #[test]
    fn uniform_page_becomes_white() {
        let page = GrayImage::from_pixel(64, 64, Luma([180]));
        let out = gaussian_adaptive_threshold(&page, 11, 2);
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn zero_sized_image_is_an_error() {
        let pre = ImagePreprocessor::new(PreprocessProfile::default());
        let empty = DynamicImage::ImageLuma8(GrayImage::new(0, 10));
        assert!(matches!(
            pre.process(&empty),
            Err(PreprocessError::EmptyImage { width: 0, height: 10 })
        ));
    }

    #[test]
    fn straight_page_has_no_skew() {
        assert_eq!(estimate_skew(&lined_page(400, 300)), 0.0);
    }

    #[test]
    fn detects_rotation() {
        let page = lined_page(400, 300);
        let rotated = rotate_about_center(
            &page,
            3.0_f32.to_radians(),
            Interpolation::Nearest,
            Luma([255]),
        );
        let correction = estimate_skew(&rotated);
        assert!(
            (correction + 3.0).abs() <= 0.5,
            "expected ≈ -3°, got {correction}"
        );
    }

    #[test]
    fn deskew_keeps_dimensions() {
        let page = lined_page(300, 200);
        let rotated = rotate_about_center(
            &page,
            2.0_f32.to_radians(),
            Interpolation::Nearest,
            Luma([255]),
        );
        let profile = PreprocessProfile {
            deskew: true,
            ..PreprocessProfile::default()
        };
        let out = ImagePreprocessor::new(profile)
            .process(&DynamicImage::ImageLuma8(rotated))
            .unwrap();
        assert_eq!((out.width(), out.height()), (300, 200));
    }

    #[test]
    fn deterministic() {
        let page = DynamicImage::ImageLuma8(lined_page(150, 100));
        let pre = ImagePreprocessor::new(PreprocessProfile::default());
        assert_eq!(
            pre.process(&page).unwrap().to_luma8().into_raw(),
            pre.process(&page).unwrap().to_luma8().into_raw()
        );
    }
}

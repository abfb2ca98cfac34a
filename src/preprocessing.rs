// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image preprocessing for YOLO inference.
//!
//! Letterbox resize (aspect preserving, centered gray padding), scaling to
//! `[0, 1]` and conversion to a `(1, 3, H, W)` tensor.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::DynamicImage;
use ndarray::Array4;

use crate::error::{DetectError, Result};

/// Letterbox padding value (gray) as used during training.
pub const LETTERBOX_COLOR: u8 = 114;

/// Reciprocal of 255 for normalization.
const INV_255: f32 = 1.0 / 255.0;

/// Geometry of a letterbox transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Resized image width before padding.
    pub new_width: u32,
    /// Resized image height before padding.
    pub new_height: u32,
    /// Padding added on the left.
    pub pad_left: u32,
    /// Padding added on the top.
    pub pad_top: u32,
    /// Scale factors (`scale_y`, `scale_x`) from original to resized.
    pub scale: (f32, f32),
}

impl Letterbox {
    /// Fit `orig` (width, height) into `target` (height, width).
    #[must_use]
    pub fn fit(orig_width: u32, orig_height: u32, target: (usize, usize)) -> Self {
        let target_w = u32::try_from(target.1).unwrap_or(u32::MAX).max(1);
        let target_h = u32::try_from(target.0).unwrap_or(u32::MAX).max(1);
        let (orig_h, orig_w) = (orig_height.max(1) as f32, orig_width.max(1) as f32);

        let ratio = (target_h as f32 / orig_h).min(target_w as f32 / orig_w);

        let new_width = ((orig_w * ratio).round() as u32).clamp(1, target_w);
        let new_height = ((orig_h * ratio).round() as u32).clamp(1, target_h);

        let pad_left = (target_w - new_width) / 2;
        let pad_top = (target_h - new_height) / 2;

        Self {
            new_width,
            new_height,
            pad_left,
            pad_top,
            scale: (new_height as f32 / orig_h, new_width as f32 / orig_w),
        }
    }

    /// Map a box from model input space back to original image space.
    #[must_use]
    pub fn unmap(&self, coords: &[f32; 4]) -> [f32; 4] {
        let (scale_y, scale_x) = self.scale;
        let (pad_top, pad_left) = (self.pad_top as f32, self.pad_left as f32);

        [
            (coords[0] - pad_left) / scale_x,
            (coords[1] - pad_top) / scale_y,
            (coords[2] - pad_left) / scale_x,
            (coords[3] - pad_top) / scale_y,
        ]
    }
}

/// Preprocessed tensor with the transform needed to undo it.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// NCHW tensor, values in `[0, 1]`.
    pub tensor: Array4<f32>,
    /// Original image shape (height, width).
    pub orig_shape: (u32, u32),
    /// Letterbox geometry.
    pub letterbox: Letterbox,
}

/// Preprocess an image for a model with input size `target_size` (height, width).
///
/// # Errors
///
/// Returns [`DetectError::DecodeFailure`] for zero-sized images and
/// [`DetectError::InferenceError`] if the resize fails.
pub fn preprocess_image(image: &DynamicImage, target_size: (usize, usize)) -> Result<PreprocessResult> {
    let rgb = image.to_rgb8();
    let (orig_width, orig_height) = rgb.dimensions();
    if orig_width == 0 || orig_height == 0 {
        return Err(DetectError::DecodeFailure("image has no pixels".to_string()));
    }

    let letterbox = Letterbox::fit(orig_width, orig_height, target_size);

    let src = Image::from_vec_u8(orig_width, orig_height, rgb.into_raw(), PixelType::U8x3)
        .map_err(|e| DetectError::InferenceError(format!("failed to wrap image buffer: {e}")))?;
    let mut dst = Image::new(letterbox.new_width, letterbox.new_height, PixelType::U8x3);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new()
        .resize(&src, &mut dst, &options)
        .map_err(|e| DetectError::InferenceError(format!("failed to resize image: {e}")))?;

    let tensor = letterbox_tensor(dst.buffer(), &letterbox, target_size);

    Ok(PreprocessResult {
        tensor,
        orig_shape: (orig_height, orig_width),
        letterbox,
    })
}

/// Place resized RGB pixels into a padded, normalized NCHW tensor.
fn letterbox_tensor(resized: &[u8], letterbox: &Letterbox, target_size: (usize, usize)) -> Array4<f32> {
    let (dst_h, dst_w) = target_size;
    let pad = f32::from(LETTERBOX_COLOR) * INV_255;
    let mut tensor = Array4::from_elem((1, 3, dst_h, dst_w), pad);

    let new_w = letterbox.new_width as usize;
    let (top, left) = (letterbox.pad_top as usize, letterbox.pad_left as usize);

    for (i, px) in resized.chunks_exact(3).enumerate() {
        let y = top + i / new_w;
        let x = left + i % new_w;
        for c in 0..3 {
            tensor[[0, c, y, x]] = f32::from(px[c]) * INV_255;
        }
    }

    tensor
}

/// Clip a box to image bounds; `shape` is (height, width).
#[must_use]
pub fn clip_coords(coords: &[f32; 4], shape: (u32, u32)) -> [f32; 4] {
    let (h, w) = (shape.0 as f32, shape.1 as f32);
    [
        coords[0].clamp(0.0, w),
        coords[1].clamp(0.0, h),
        coords[2].clamp(0.0, w),
        coords[3].clamp(0.0, h),
    ]
}

//! Post-decode resizing helpers.

use image::imageops::FilterType;
use image::RgbaImage;

use crate::error::{Error, Result};

fn check(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimension { width, height });
    }
    Ok(())
}

fn resized(img: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage> {
    check(img.width(), img.height())?;
    Ok(image::imageops::resize(
        img,
        width.max(1),
        height.max(1),
        FilterType::Triangle,
    ))
}

/// Fit the longest side to `max_border`, keeping the aspect ratio.
pub fn scale_to_bounds(img: &RgbaImage, max_border: u32) -> Result<RgbaImage> {
    check(max_border, max_border)?;
    check(img.width(), img.height())?;
    let ratio = img.width() as f32 / img.height() as f32;
    let (w, h) = if ratio > 1.0 {
        (max_border, (max_border as f32 / ratio) as u32)
    } else {
        ((max_border as f32 * ratio) as u32, max_border)
    };
    resized(img, w, h)
}

pub fn scale_exact(img: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage> {
    check(width, height)?;
    resized(img, width, height)
}

/// Scale to `width`, height follows the aspect ratio.
pub fn scale_to_width(img: &RgbaImage, width: u32) -> Result<RgbaImage> {
    check(width, width)?;
    check(img.width(), img.height())?;
    let h = (img.height() as u64 * width as u64 / img.width() as u64) as u32;
    resized(img, width, h)
}

/// Scale to `height`, width follows the aspect ratio.
pub fn scale_to_height(img: &RgbaImage, height: u32) -> Result<RgbaImage> {
    check(height, height)?;
    check(img.width(), img.height())?;
    let w = (img.width() as u64 * height as u64 / img.height() as u64) as u32;
    resized(img, w, height)
}

use std::fs;
use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::{PreviewError, Result};

/// A rendered page, PNG-encoded.
#[derive(Clone, PartialEq)]
pub struct RasterImage {
    /// 1-based page number the image was rendered from.
    pub page: u32,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl std::fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterImage")
            .field("page", &self.page)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("png_bytes", &self.png.len())
            .finish()
    }
}

impl RasterImage {
    /// Wrap PNG bytes produced by a renderer, reading the dimensions back.
    pub fn from_png(page: u32, png: Vec<u8>) -> Result<Self> {
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).map_err(|e| {
            PreviewError::RasterizationFailed {
                page,
                reason: format!("renderer produced an unreadable image: {}", e),
            }
        })?;
        Ok(Self {
            page,
            width: decoded.width(),
            height: decoded.height(),
            png,
        })
    }

    pub fn from_rgba(page: u32, pixels: &RgbaImage) -> Result<Self> {
        let mut png = Vec::new();
        pixels
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| PreviewError::RasterizationFailed {
                page,
                reason: e.to_string(),
            })?;
        Ok(Self {
            page,
            width: pixels.width(),
            height: pixels.height(),
            png,
        })
    }

    /// Write the page to `path`, optionally converted to greyscale.
    pub fn save(&self, path: &Path, greyscale: bool) -> anyhow::Result<()> {
        if !greyscale {
            fs::write(path, &self.png)?;
            return Ok(());
        }
        let decoded = image::load_from_memory_with_format(&self.png, ImageFormat::Png)?;
        DynamicImage::ImageLuma8(decoded.to_luma8()).save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

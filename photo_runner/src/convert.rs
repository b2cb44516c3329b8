use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use std::path::Path;

use crate::error::AppError;

/// `CV_8UC1`
pub const TYPE_8UC1: i32 = 0;
/// `CV_8UC3`
pub const TYPE_8UC3: i32 = 16;
/// `CV_32FC1`
pub const TYPE_32FC1: i32 = 5;
/// `CV_32FC3`
pub const TYPE_32FC3: i32 = 21;

/// Row-major pixel buffer in the shim's layout. Colour images are BGR.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    /// Height.
    pub rows: i32,
    /// Width.
    pub cols: i32,
    /// Element type code.
    pub mat_type: i32,
    /// Raw element bytes.
    pub data: Vec<u8>,
}

impl Image {
    /// Decodes a file as an 8-bit BGR image.
    pub fn load_bgr(path: &Path) -> Result<Self, AppError> {
        let rgb = image::open(path)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        let mut data = rgb.into_raw();
        for px in data.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
        Ok(Self { rows: height as i32, cols: width as i32, mat_type: TYPE_8UC3, data })
    }

    /// Decodes a file as an 8-bit single-channel mask.
    pub fn load_mask(path: &Path) -> Result<Self, AppError> {
        let luma = image::open(path)?.to_luma8();
        let (width, height) = luma.dimensions();
        Ok(Self { rows: height as i32, cols: width as i32, mat_type: TYPE_8UC1, data: luma.into_raw() })
    }

    /// Encodes the image to `path`; the format follows the extension.
    ///
    /// Float results are taken to lie in `[0, 1]` and are scaled to 8 bits.
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let (width, height) = (self.cols as u32, self.rows as u32);
        let bytes = match self.mat_type {
            TYPE_8UC1 | TYPE_8UC3 => self.data.clone(),
            TYPE_32FC1 | TYPE_32FC3 => self
                .data
                .chunks_exact(4)
                .map(|c| {
                    let v = f32::from_ne_bytes([c[0], c[1], c[2], c[3]]);
                    (v * 255.0).round().clamp(0.0, 255.0) as u8
                })
                .collect(),
            other => return Err(AppError::UnsupportedOutput(other)),
        };

        match self.mat_type {
            TYPE_8UC1 | TYPE_32FC1 => {
                let gray: GrayImage = ImageBuffer::<Luma<u8>, _>::from_raw(width, height, bytes)
                    .ok_or(AppError::UnsupportedOutput(self.mat_type))?;
                gray.save(path)?;
            }
            _ => {
                let mut rgb = bytes;
                for px in rgb.chunks_exact_mut(3) {
                    px.swap(0, 2);
                }
                let color: RgbImage = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, rgb)
                    .ok_or(AppError::UnsupportedOutput(self.mat_type))?;
                color.save(path)?;
            }
        }
        Ok(())
    }
}

//! Image preprocessing for inference
//!
//! Mirrors the stored-sample transform: 224x224 crop-to-cover, then a
//! [0, 1]-normalized HWC float tensor.

use image::imageops::FilterType;
use ndarray::Array3;

use crate::error::{MlError, MlResult};
use crate::samples::store::IMAGE_SIZE;

/// Decode and resize an image, rejecting oversized payloads first
pub fn preprocess(raw: &[u8], max_bytes: usize) -> MlResult<Array3<f32>> {
    if raw.len() > max_bytes {
        return Err(MlError::PayloadTooLarge {
            size: raw.len(),
            limit: max_bytes,
        });
    }

    let decoded = image::load_from_memory(raw)
        .map_err(|e| MlError::ImageDecode(e.to_string()))?;
    let resized = decoded
        .resize_to_fill(IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle)
        .to_rgb8();

    let mut tensor = Array3::<f32>::zeros((IMAGE_SIZE as usize, IMAGE_SIZE as usize, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for (c, &value) in pixel.0.iter().enumerate() {
            tensor[[y as usize, x as usize, c]] = value as f32 / 255.0;
        }
    }
    Ok(tensor)
}

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DecodeError, Result};
use crate::video::types::Frame;

/// Resampling filter used when normalizing inputs to the square working size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl Default for ResizeFilter {
    fn default() -> Self {
        Self::Lanczos3
    }
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Decode a base64 payload, accepting an optional `data:image/...;base64,` prefix
pub fn decode_base64(field: &str, text: &str) -> Result<Vec<u8>> {
    let payload = match text.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| DecodeError::InvalidBase64 {
                field: field.to_string(),
                reason: "data URL has no ',' separator".to_string(),
            })?,
        None => text,
    };

    STANDARD
        .decode(payload.trim())
        .map_err(|e| {
            DecodeError::InvalidBase64 {
                field: field.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
}

/// Decode encoded image bytes (JPEG, PNG) into an RGB raster
///
/// Any alpha channel is dropped. Images with a zero dimension are rejected.
pub fn load_image(field: &str, bytes: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory(bytes).map_err(|e| DecodeError::InvalidImage {
        field: field.to_string(),
        reason: e.to_string(),
    })?;

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::EmptyImage {
            field: field.to_string(),
            width,
            height,
        }
        .into());
    }

    debug!("Decoded {} as {}x{} {:?}", field, width, height, image.color());

    let rgb_image = match image {
        DynamicImage::ImageRgb8(img) => img,
        other => other.to_rgb8(),
    };

    Ok(rgb_image)
}

/// Resize to `resolution x resolution`, ignoring the source aspect ratio
pub fn normalize(image: &RgbImage, resolution: u32, filter: ResizeFilter) -> Frame {
    if image.dimensions() == (resolution, resolution) {
        return Frame::new(image.clone());
    }

    Frame::new(image::imageops::resize(
        image,
        resolution,
        resolution,
        filter.into(),
    ))
}

//! Per-frame blend weights and pixel mixing.

use std::f64::consts::{FRAC_PI_2, PI};

use image::{ImageBuffer, Rgb};

use crate::error::{EncodeError, InvalidParameterError, Result};
use crate::video::types::Frame;

/// Blend weight for frame `index` of a `frame_count`-frame sequence
///
/// Raised cosine over one full period: 0 at the first and last frame, 1 at
/// the midpoint. A single-frame sequence is pure source.
pub fn blend_weight(index: usize, frame_count: usize) -> f64 {
    if frame_count <= 1 {
        return 0.0;
    }

    let u = index as f64 / (frame_count - 1) as f64;
    let alpha = 0.5 * (1.0 + (2.0 * PI * u - FRAC_PI_2).sin());
    alpha.clamp(0.0, 1.0)
}

/// All weights for a sequence, in frame order
pub fn blend_weights(frame_count: usize) -> Vec<f64> {
    (0..frame_count)
        .map(|i| blend_weight(i, frame_count))
        .collect()
}

/// `(1 - alpha) * source + alpha * target`, rounded per channel
pub fn blend_frames(source: &Frame, target: &Frame, alpha: f64) -> Result<Frame> {
    if source.dimensions() != target.dimensions() {
        return Err(InvalidParameterError::DimensionMismatch {
            name: "target frame".to_string(),
            width: target.width(),
            height: target.height(),
            expected_width: source.width(),
            expected_height: source.height(),
        }
        .into());
    }

    let alpha = alpha.clamp(0.0, 1.0);
    let inv = 1.0 - alpha;

    let data: Vec<u8> = source
        .as_rgb_bytes()
        .iter()
        .zip(target.as_rgb_bytes())
        .map(|(&s, &t)| {
            let value = inv * f64::from(s) + alpha * f64::from(t);
            value.round().clamp(0.0, 255.0) as u8
        })
        .collect();

    let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_raw(source.width(), source.height(), data).ok_or_else(|| {
            EncodeError::EncodingFailed {
                reason: "blended buffer does not match frame size".to_string(),
            }
        })?;

    Ok(Frame::new(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_starts_and_ends_at_source() {
        assert_eq!(blend_weight(0, 48), 0.0);
        assert!(blend_weight(47, 48) < 1e-12);
    }

    #[test]
    fn test_weight_peaks_near_midpoint() {
        let mid = blend_weight(24, 48);
        assert!(mid > 0.99, "midpoint weight was {mid}");

        let weights = blend_weights(48);
        let peak = weights
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert!(peak == 23 || peak == 24);
    }

    #[test]
    fn test_weight_rises_then_falls_once() {
        let weights = blend_weights(48);
        let direction_changes = weights
            .windows(3)
            .filter(|w| (w[1] - w[0]).signum() != (w[2] - w[1]).signum())
            .count();
        assert_eq!(direction_changes, 1);
    }

    #[test]
    fn test_four_frame_weights() {
        let weights = blend_weights(4);
        assert_eq!(weights[0], 0.0);
        assert!((weights[1] - 0.75).abs() < 1e-9);
        assert!((weights[2] - 0.75).abs() < 1e-9);
        assert!(weights[3] < 1e-12);
    }

    #[test]
    fn test_single_frame_is_source() {
        assert_eq!(blend_weight(0, 1), 0.0);
    }

    #[test]
    fn test_blend_endpoints_and_middle() {
        let red = Frame::new_filled(2, 2, [255, 0, 0]);
        let blue = Frame::new_filled(2, 2, [0, 0, 255]);

        assert_eq!(blend_frames(&red, &blue, 0.0).unwrap(), red);
        assert_eq!(blend_frames(&red, &blue, 1.0).unwrap(), blue);

        let half = blend_frames(&red, &blue, 0.5).unwrap();
        assert_eq!(half.get_pixel(1, 1), [128, 0, 128]);

        let three_quarters = blend_frames(&red, &blue, 0.75).unwrap();
        assert_eq!(three_quarters.get_pixel(0, 0), [64, 0, 191]);
    }

    #[test]
    fn test_blend_rejects_size_mismatch() {
        let a = Frame::new_filled(2, 2, [0, 0, 0]);
        let b = Frame::new_filled(3, 2, [0, 0, 0]);
        let err = blend_frames(&a, &b, 0.5).unwrap_err();
        assert!(matches!(
            err,
            crate::CompositorError::InvalidParameter(InvalidParameterError::DimensionMismatch {
                width: 3,
                expected_width: 2,
                ..
            })
        ));
    }
}

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageBuffer, Rgb, RgbImage};

use crate::error::{EncodeError, Result};

/// Represents a single video frame
///
/// This is a simple wrapper around an RGB image buffer. Frames carry no
/// alpha channel; every channel is 8 bits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_fn(width, height, |_, _| Rgb(color));
        Self { buffer }
    }

    /// Get the width of the frame
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    /// Get the height of the frame
    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Raw interleaved RGB bytes, row-major
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    /// Mean value of each channel over the whole frame
    pub fn mean_color(&self) -> [f64; 3] {
        let mut sums = [0u64; 3];
        for pixel in self.buffer.pixels() {
            for (sum, &value) in sums.iter_mut().zip(pixel.0.iter()) {
                *sum += u64::from(value);
            }
        }

        let count = (u64::from(self.width()) * u64::from(self.height())).max(1) as f64;
        [
            sums[0] as f64 / count,
            sums[1] as f64 / count,
            sums[2] as f64 / count,
        ]
    }
}

/// Ordered frames that all share one resolution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSequence {
    width: u32,
    height: u32,
    frames: Vec<Frame>,
}

impl FrameSequence {
    /// Create an empty sequence for frames of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_capacity(width, height, 0)
    }

    pub fn with_capacity(width: u32, height: u32, capacity: usize) -> Self {
        Self {
            width,
            height,
            frames: Vec::with_capacity(capacity),
        }
    }

    /// Append a frame, rejecting anything not matching the sequence size
    pub fn push(&mut self, frame: Frame) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(EncodeError::FrameMismatch {
                index: self.frames.len(),
                width: frame.width(),
                height: frame.height(),
                expected_width: self.width,
                expected_height: self.height,
            }
            .into());
        }

        self.frames.push(frame);
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get the total number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the sequence is empty
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Get all frames in order
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }
}

impl<'a> IntoIterator for &'a FrameSequence {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// An encoded MP4 ready for transport
///
/// Holds both the container bytes and their base64 text. Nothing here is
/// written to disk; the artifact lives as long as the response that carries it.
#[derive(Debug, Clone)]
pub struct VideoArtifact {
    pub bytes: Vec<u8>,
    pub base64: String,
    pub frame_count: usize,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

impl VideoArtifact {
    pub fn new(bytes: Vec<u8>, frame_count: usize, fps: u32, width: u32, height: u32) -> Self {
        let base64 = STANDARD.encode(&bytes);
        Self {
            bytes,
            base64,
            frame_count,
            fps,
            width,
            height,
        }
    }

    /// Size of the container in bytes
    pub fn file_size(&self) -> usize {
        self.bytes.len()
    }

    /// Playback length in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.fps == 0 {
            return 0.0;
        }
        self.frame_count as f64 / f64::from(self.fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_rejects_mismatched_frame() {
        let mut sequence = FrameSequence::new(4, 4);
        sequence.push(Frame::new_filled(4, 4, [1, 2, 3])).unwrap();

        let err = sequence.push(Frame::new_filled(4, 5, [1, 2, 3])).unwrap_err();
        assert!(err.to_string().contains("expected 4x4"));
        assert_eq!(sequence.len(), 1);
    }

    #[test]
    fn test_rgb_bytes_roundtrip() {
        let frame = Frame::new_filled(3, 2, [10, 20, 30]);
        let bytes = frame.as_rgb_bytes().to_vec();
        assert_eq!(bytes.len(), 3 * 2 * 3);

        let rebuilt = Frame::from_rgb_bytes(3, 2, bytes).unwrap();
        assert_eq!(rebuilt, frame);
        assert!(Frame::from_rgb_bytes(3, 2, vec![0; 5]).is_none());
    }

    #[test]
    fn test_mean_color_of_solid_frame() {
        let frame = Frame::new_filled(8, 8, [255, 128, 0]);
        assert_eq!(frame.mean_color(), [255.0, 128.0, 0.0]);
    }

    #[test]
    fn test_artifact_carries_base64() {
        let artifact = VideoArtifact::new(b"\x00\x00\x00\x1cftyp".to_vec(), 48, 24, 512, 512);
        assert_eq!(artifact.base64, "AAAAHGZ0eXA=");
        assert_eq!(artifact.file_size(), 8);
        assert!((artifact.duration_secs() - 2.0).abs() < f64::EPSILON);
    }
}

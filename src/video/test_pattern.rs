use image::{Rgb, RgbImage};

use crate::config::TestPatternConfig;
use crate::error::{InvalidParameterError, Result};
use crate::video::types::{Frame, FrameSequence};

const PROGRESS_BAR_HEIGHT: u32 = 8;

/// Diagnostic clip: a full hue sweep with a progress bar along the bottom edge
///
/// Lets callers check the encode and transport path without supplying images.
pub fn render_test_pattern(config: &TestPatternConfig) -> Result<FrameSequence> {
    config.validate()?;

    let frame_count = config.frame_count();
    if frame_count == 0 {
        return Err(InvalidParameterError::NonPositive {
            name: "test_pattern.frame_count".to_string(),
            value: 0,
        }
        .into());
    }

    let mut frames = FrameSequence::with_capacity(config.width, config.height, frame_count);
    for i in 0..frame_count {
        frames.push(test_pattern_frame(config, i))?;
    }

    Ok(frames)
}

/// Frame `index` of the test pattern, for streaming it without buffering the clip
pub fn test_pattern_frame(config: &TestPatternConfig, index: usize) -> Frame {
    let (width, height) = (config.width, config.height);
    let frame_count = config.frame_count().max(1);

    let hue = (index as f32 / frame_count as f32) * 360.0;
    let background = hsv_to_rgb(hue, 1.0, 1.0);

    let bar_top = height.saturating_sub(PROGRESS_BAR_HEIGHT);
    let bar_end = ((index + 1) as f64 / frame_count as f64 * width as f64).round() as u32;

    let buffer = RgbImage::from_fn(width, height, |x, y| {
        if y >= bar_top && x < bar_end {
            Rgb([255, 255, 255])
        } else {
            Rgb(background)
        }
    });

    Frame::new(buffer)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    [
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    ]
}

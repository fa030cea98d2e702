use std::path::Path;
use std::process::Command;

use serde::Deserialize;
use tracing::debug;

use crate::config::EncoderConfig;
use crate::error::{DecodeError, Result};
use crate::video::types::{Frame, FrameSequence};

/// Stream properties of an encoded video as reported by ffprobe
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: usize,
}

#[derive(Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    nb_read_frames: Option<String>,
}

#[derive(Deserialize)]
struct FfprobeOutput {
    streams: Vec<FfprobeStream>,
}

/// Reads encoded containers back into frames with `ffprobe`/`ffmpeg`
///
/// Used to verify artifacts: frame counts, sizes and playback rate.
pub struct VideoDecoder {
    ffmpeg_path: String,
    ffinspect_path: String,
}

impl VideoDecoder {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            ffinspect_path: config.ffprobe_path.clone(),
        }
    }

    pub fn inspect(&self, video: &[u8]) -> Result<VideoInfo> {
        let scratch = tempfile::Builder::new()
            .prefix("morph-compositor-inspect-")
            .tempdir()?;
        let input = scratch.path().join("input.mp4");
        std::fs::write(&input, video)?;

        self.inspect_path(&input)
    }

    /// Decode every frame of the video as RGB
    pub fn decode(&self, video: &[u8]) -> Result<FrameSequence> {
        let scratch = tempfile::Builder::new()
            .prefix("morph-compositor-decode-")
            .tempdir()?;
        let input = scratch.path().join("input.mp4");
        std::fs::write(&input, video)?;

        let info = self.inspect_path(&input)?;

        let out = Command::new(&self.ffmpeg_path)
            .args(["-v", "error", "-i"])
            .arg(&input)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .output()
            .map_err(|e| invalid_video(format!("failed to run ffmpeg for decode: {e}")))?;

        if !out.status.success() {
            return Err(invalid_video(format!(
                "ffmpeg decode failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let frame_len = info.width as usize * info.height as usize * 3;
        if frame_len == 0 || out.stdout.len() % frame_len != 0 {
            return Err(invalid_video(format!(
                "decoded {} bytes, not a multiple of the {}x{} frame size",
                out.stdout.len(),
                info.width,
                info.height
            )));
        }

        let mut frames =
            FrameSequence::with_capacity(info.width, info.height, out.stdout.len() / frame_len);
        for chunk in out.stdout.chunks_exact(frame_len) {
            let frame = Frame::from_rgb_bytes(info.width, info.height, chunk.to_vec())
                .ok_or_else(|| invalid_video("frame buffer size mismatch".to_string()))?;
            frames.push(frame)?;
        }

        debug!("Decoded {} frames of {}x{}", frames.len(), info.width, info.height);
        Ok(frames)
    }

    fn inspect_path(&self, input: &Path) -> Result<VideoInfo> {
        let out = Command::new(&self.ffinspect_path)
            .args([
                "-v",
                "error",
                "-count_frames",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,r_frame_rate,nb_read_frames",
                "-print_format",
                "json",
            ])
            .arg(input)
            .output()
            .map_err(|e| invalid_video(format!("failed to run ffprobe: {e}")))?;

        if !out.status.success() {
            return Err(invalid_video(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        parse_ffprobe_json(&out.stdout)
    }
}

fn parse_ffprobe_json(json: &[u8]) -> Result<VideoInfo> {
    let parsed: FfprobeOutput = serde_json::from_slice(json)
        .map_err(|e| invalid_video(format!("ffprobe json parse failed: {e}")))?;

    let stream = parsed
        .streams
        .first()
        .ok_or_else(|| invalid_video("no video stream found".to_string()))?;

    let width = stream
        .width
        .ok_or_else(|| invalid_video("missing video width".to_string()))?;
    let height = stream
        .height
        .ok_or_else(|| invalid_video("missing video height".to_string()))?;
    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_ratio)
        .ok_or_else(|| invalid_video("invalid r_frame_rate".to_string()))?;
    let frame_count = stream
        .nb_read_frames
        .as_deref()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| invalid_video("missing frame count".to_string()))?;

    Ok(VideoInfo {
        width,
        height,
        fps,
        frame_count,
    })
}

fn parse_ratio(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

fn invalid_video(reason: String) -> crate::CompositorError {
    DecodeError::InvalidVideo { reason }.into()
}

use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use tracing::{debug, info, warn};

use crate::config::EncoderConfig;
use crate::error::{CompositorError, EncodeError, InvalidParameterError, Result};
use crate::video::types::{Frame, FrameSequence, VideoArtifact};

const OUTPUT_FILE_NAME: &str = "morph.mp4";

/// MP4 encoder driving the system `ffmpeg` binary
///
/// Frames are streamed as raw RGB over stdin. The container is written into
/// a uniquely named scratch directory that is removed before `encode` returns,
/// whether or not encoding succeeded.
pub struct VideoEncoder {
    config: EncoderConfig,
}

impl VideoEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Whether the configured ffmpeg binary can be executed
    pub fn check_ffmpeg_available(&self) -> bool {
        program_available(&self.config.ffmpeg_path)
    }

    /// Encode an ordered frame sequence into an MP4 played back at `fps`
    pub fn encode(&self, frames: &FrameSequence, fps: u32) -> Result<VideoArtifact> {
        if frames.is_empty() {
            return Err(EncodeError::EmptySequence.into());
        }

        self.encode_with(frames.width(), frames.height(), frames.len(), fps, |out| {
            for frame in frames {
                out.write_all(frame.as_rgb_bytes())?;
            }
            Ok(())
        })
    }

    /// Encode `frame_count` frames produced on demand by `render`
    ///
    /// Each frame is written to the encoder as soon as it is rendered, so only
    /// one frame is held in memory regardless of the clip length.
    pub fn encode_rendered<F>(
        &self,
        width: u32,
        height: u32,
        frame_count: usize,
        fps: u32,
        mut render: F,
    ) -> Result<VideoArtifact>
    where
        F: FnMut(usize) -> Result<Frame>,
    {
        if frame_count == 0 {
            return Err(EncodeError::EmptySequence.into());
        }

        self.encode_with(width, height, frame_count, fps, |out| {
            for index in 0..frame_count {
                let frame = render(index)?;
                if frame.dimensions() != (width, height) {
                    return Err(EncodeError::FrameMismatch {
                        index,
                        width: frame.width(),
                        height: frame.height(),
                        expected_width: width,
                        expected_height: height,
                    }
                    .into());
                }
                out.write_all(frame.as_rgb_bytes())?;
            }
            Ok(())
        })
    }

    fn encode_with<W>(
        &self,
        width: u32,
        height: u32,
        frame_count: usize,
        fps: u32,
        write_frames: W,
    ) -> Result<VideoArtifact>
    where
        W: FnOnce(&mut dyn Write) -> Result<()>,
    {
        if fps == 0 {
            return Err(InvalidParameterError::NonPositive {
                name: "fps".to_string(),
                value: 0,
            }
            .into());
        }

        if !self.check_ffmpeg_available() {
            return Err(EncodeError::EncoderUnavailable {
                reason: format!("'{}' not found. Please install FFmpeg.", self.config.ffmpeg_path),
            }
            .into());
        }

        let scratch = self.scratch_dir()?;
        let output_path = scratch.path().join(OUTPUT_FILE_NAME);

        debug!("Encoding {} frames into {:?}", frame_count, output_path);

        let result = self
            .run_ffmpeg(width, height, fps, &output_path, write_frames)
            .and_then(|()| read_output(&output_path));

        if let Err(e) = scratch.close() {
            warn!("Failed to remove encoder scratch directory: {}", e);
        }

        let bytes = result?;

        info!(
            "Encoded {} frames at {} fps ({:.1} KB)",
            frame_count,
            fps,
            bytes.len() as f64 / 1024.0
        );

        Ok(VideoArtifact::new(bytes, frame_count, fps, width, height))
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("morph-compositor-");

        let dir = match &self.config.temp_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    fn run_ffmpeg<W>(
        &self,
        width: u32,
        height: u32,
        fps: u32,
        output_path: &Path,
        write_frames: W,
    ) -> Result<()>
    where
        W: FnOnce(&mut dyn Write) -> Result<()>,
    {
        let mut cmd = Command::new(&self.config.ffmpeg_path);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &format!("{}x{}", width, height),
            "-r",
            &fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            &self.config.codec,
            "-pix_fmt",
            output_pixel_format(width, height),
        ])
        .args(self.quality_args())
        .args(["-r", &fps.to_string(), "-movflags", "+faststart"])
        .arg(output_path);

        let mut child = cmd.spawn().map_err(|e| EncodeError::EncodingFailed {
            reason: format!("Failed to spawn FFmpeg process: {}", e),
        })?;

        // stdin is dropped at the end of this match, which signals end of input
        let write_result = match child.stdin.take() {
            Some(mut stdin) => write_frames(&mut stdin),
            None => Err(std::io::Error::other("FFmpeg stdin was not captured").into()),
        };

        if let Err(e) = write_result {
            if !matches!(e, CompositorError::Io(_)) {
                // A frame could not be rendered; stop ffmpeg and report that instead
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
            return Err(self.finish_failed_write(child, e));
        }

        let output = child
            .wait_with_output()
            .map_err(|e| EncodeError::EncodingFailed {
                reason: format!("FFmpeg execution failed: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EncodeError::EncodingFailed {
                reason: format!("FFmpeg exited with {}: {}", output.status, stderr.trim()),
            }
            .into());
        }

        Ok(())
    }

    /// Prefer ffmpeg's own complaint over the broken pipe it caused
    fn finish_failed_write(&self, child: Child, write_error: CompositorError) -> CompositorError {
        match child.wait_with_output() {
            Ok(output) if !output.status.success() => EncodeError::EncodingFailed {
                reason: format!(
                    "FFmpeg exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }
            .into(),
            _ => EncodeError::EncodingFailed {
                reason: format!("Failed to write frames to FFmpeg: {}", write_error),
            }
            .into(),
        }
    }

    fn quality_args(&self) -> Vec<String> {
        match self.config.codec.as_str() {
            "libx264" | "libx265" => vec![
                "-crf".to_string(),
                quality_to_crf(self.config.quality).to_string(),
            ],
            _ => vec![
                "-q:v".to_string(),
                quality_to_qscale(self.config.quality).to_string(),
            ],
        }
    }
}

/// 4:2:0 chroma needs even dimensions; fall back to 4:4:4 otherwise
fn output_pixel_format(width: u32, height: u32) -> &'static str {
    if width % 2 == 0 && height % 2 == 0 {
        "yuv420p"
    } else {
        "yuv444p"
    }
}

fn quality_to_crf(quality: u8) -> u8 {
    let quality = quality.min(100);
    51 - ((quality as f32 / 100.0) * 51.0) as u8
}

fn quality_to_qscale(quality: u8) -> u8 {
    let quality = quality.min(100);
    (31 - ((quality as f32 / 100.0) * 29.0) as u8).clamp(2, 31)
}

fn read_output(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path).map_err(|e| EncodeError::EncodingFailed {
        reason: format!("FFmpeg produced no output file: {}", e),
    })?;

    if bytes.is_empty() {
        return Err(EncodeError::EncodingFailed {
            reason: "FFmpeg produced an empty output file".to_string(),
        }
        .into());
    }

    Ok(bytes)
}

pub(crate) fn program_available(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

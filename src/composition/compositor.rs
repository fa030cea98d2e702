use tracing::{debug, info};

use crate::{
    config::{CompositorConfig, Config},
    error::{InvalidParameterError, Result},
    video::{
        blend_frames, blend_weight, load_image, normalize, Frame, FrameSequence, VideoArtifact,
        VideoEncoder,
    },
};

/// Inputs for one compositing run
///
/// Images are raw encoded bytes (JPEG, PNG, ...). `fps` only affects the
/// container's playback rate, never the rendered pixels.
#[derive(Debug, Clone)]
pub struct CompositeRequest {
    pub source_image: Vec<u8>,
    pub target_image: Vec<u8>,
    pub frame_count: u32,
    pub fps: u32,
    pub resolution: u32,
}

impl CompositeRequest {
    /// Create a request with the default 48 frames at 24 fps, 512x512
    pub fn new(source_image: Vec<u8>, target_image: Vec<u8>) -> Self {
        let defaults = CompositorConfig::default();
        Self {
            source_image,
            target_image,
            frame_count: defaults.frame_count,
            fps: defaults.fps,
            resolution: defaults.resolution,
        }
    }

    pub fn with_frame_count(mut self, frame_count: u32) -> Self {
        self.frame_count = frame_count;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }

    /// Build a request from loosely typed parameters, applying config defaults
    ///
    /// Missing values take the configured default; zero or negative values
    /// and values above the configured maximum are rejected.
    pub fn from_parts(
        source_image: Vec<u8>,
        target_image: Vec<u8>,
        frame_count: Option<i64>,
        fps: Option<i64>,
        resolution: Option<i64>,
        defaults: &CompositorConfig,
    ) -> Result<Self> {
        Ok(Self {
            source_image,
            target_image,
            frame_count: resolve_param(
                "frame_count",
                frame_count,
                defaults.frame_count,
                Some(defaults.max_frame_count),
            )?,
            fps: resolve_param("fps", fps, defaults.fps, None)?,
            resolution: resolve_param(
                "resolution",
                resolution,
                defaults.resolution,
                Some(defaults.max_resolution),
            )?,
        })
    }

    /// Reject zero values and anything beyond the configured limits
    pub fn validate(&self, limits: &CompositorConfig) -> Result<()> {
        for (name, value) in [
            ("frame_count", self.frame_count),
            ("fps", self.fps),
            ("resolution", self.resolution),
        ] {
            if value == 0 {
                return Err(InvalidParameterError::NonPositive {
                    name: name.to_string(),
                    value: 0,
                }
                .into());
            }
        }

        check_max("frame_count", self.frame_count, limits.max_frame_count)?;
        check_max("resolution", self.resolution, limits.max_resolution)?;
        Ok(())
    }
}

fn resolve_param(name: &str, value: Option<i64>, default: u32, max: Option<u32>) -> Result<u32> {
    let value = match value {
        None => return Ok(default),
        Some(v) => v,
    };

    if value <= 0 {
        return Err(InvalidParameterError::NonPositive {
            name: name.to_string(),
            value,
        }
        .into());
    }

    let limit = i64::from(max.unwrap_or(u32::MAX));
    if value > limit {
        return Err(InvalidParameterError::TooLarge {
            name: name.to_string(),
            value,
            max: limit,
        }
        .into());
    }

    Ok(value as u32)
}

fn check_max(name: &str, value: u32, max: u32) -> Result<()> {
    if value > max {
        return Err(InvalidParameterError::TooLarge {
            name: name.to_string(),
            value: i64::from(value),
            max: i64::from(max),
        }
        .into());
    }
    Ok(())
}

/// Deterministic image-to-video compositor
///
/// Renders an "approach, contact, retreat" morph between two images: the
/// blend weight follows a raised cosine from pure source to pure target and
/// back, then the frames are encoded as MP4. Each call owns its buffers and
/// its scratch directory, so one compositor can serve concurrent requests.
pub struct FrameCompositor {
    config: CompositorConfig,
    encoder: VideoEncoder,
}

impl FrameCompositor {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.compositor.clone(),
            encoder: VideoEncoder::new(config.encoder.clone()),
        }
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn encoder(&self) -> &VideoEncoder {
        &self.encoder
    }

    /// Decode, blend and encode
    ///
    /// Frames are blended one at a time and streamed to the encoder, so memory
    /// use does not grow with `frame_count`.
    pub fn compose(&self, request: &CompositeRequest) -> Result<VideoArtifact> {
        info!(
            "Composing {} frames at {}x{} ({} fps)",
            request.frame_count, request.resolution, request.resolution, request.fps
        );

        let (source, target) = self.prepare(request)?;
        let frame_count = request.frame_count as usize;

        self.encoder.encode_rendered(
            source.width(),
            source.height(),
            frame_count,
            request.fps,
            |i| blend_at(&source, &target, i, frame_count),
        )
    }

    /// Decode and blend without encoding
    ///
    /// Holds every frame in memory; requests whose raw frames would exceed
    /// `max_buffered_bytes` are rejected up front.
    pub fn render_frames(&self, request: &CompositeRequest) -> Result<FrameSequence> {
        request.validate(&self.config)?;

        let side = u64::from(request.resolution);
        let buffered = u64::from(request.frame_count)
            .saturating_mul(side * side)
            .saturating_mul(3);
        if buffered > self.config.max_buffered_bytes {
            return Err(InvalidParameterError::TooLarge {
                name: "frame_count x resolution^2 x 3 bytes".to_string(),
                value: i64::try_from(buffered).unwrap_or(i64::MAX),
                max: i64::try_from(self.config.max_buffered_bytes).unwrap_or(i64::MAX),
            }
            .into());
        }

        let (source, target) = self.prepare(request)?;
        blend_sequence(&source, &target, request.frame_count as usize)
    }

    /// Validate, decode and normalize both inputs
    fn prepare(&self, request: &CompositeRequest) -> Result<(Frame, Frame)> {
        request.validate(&self.config)?;

        let source = load_image("source_image", &request.source_image)?;
        let target = load_image("target_image", &request.target_image)?;

        Ok((
            normalize(&source, request.resolution, self.config.resize_filter),
            normalize(&target, request.resolution, self.config.resize_filter),
        ))
    }
}

fn blend_at(source: &Frame, target: &Frame, index: usize, frame_count: usize) -> Result<Frame> {
    let alpha = blend_weight(index, frame_count);
    debug!("Frame {}/{}: alpha = {:.4}", index + 1, frame_count, alpha);
    blend_frames(source, target, alpha)
}

/// Blend two same-sized frames into a `frame_count`-frame sequence
pub fn blend_sequence(source: &Frame, target: &Frame, frame_count: usize) -> Result<FrameSequence> {
    if frame_count == 0 {
        return Err(InvalidParameterError::NonPositive {
            name: "frame_count".to_string(),
            value: 0,
        }
        .into());
    }

    let mut frames = FrameSequence::with_capacity(source.width(), source.height(), frame_count);

    for i in 0..frame_count {
        frames.push(blend_at(source, target, i, frame_count)?)?;
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompositorError;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    fn compositor() -> FrameCompositor {
        FrameCompositor::new(&Config::default())
    }

    #[test]
    fn test_render_frame_count_and_size() {
        let request = CompositeRequest::new(png(20, 10, [255, 0, 0]), png(7, 9, [0, 0, 255]))
            .with_frame_count(6)
            .with_resolution(16);

        let frames = compositor().render_frames(&request).unwrap();
        assert_eq!(frames.len(), 6);
        assert!(frames.iter().all(|f| f.dimensions() == (16, 16)));
    }

    #[test]
    fn test_single_frame_is_resized_source() {
        let source_bytes = png(30, 12, [12, 200, 99]);
        let request = CompositeRequest::new(source_bytes.clone(), png(5, 5, [0, 0, 0]))
            .with_frame_count(1)
            .with_resolution(8);

        let compositor = compositor();
        let frames = compositor.render_frames(&request).unwrap();
        assert_eq!(frames.len(), 1);

        let expected = normalize(
            &load_image("source_image", &source_bytes).unwrap(),
            8,
            compositor.config().resize_filter,
        );
        assert_eq!(frames.get(0).unwrap(), &expected);
    }

    #[test]
    fn test_red_blue_shape() {
        let request = CompositeRequest::new(png(256, 256, [255, 0, 0]), png(256, 256, [0, 0, 255]))
            .with_frame_count(4)
            .with_resolution(64)
            .with_fps(12);

        let frames = compositor().render_frames(&request).unwrap();
        let means: Vec<[f64; 3]> = frames.iter().map(Frame::mean_color).collect();

        assert!(means[0][0] > 250.0 && means[0][2] < 5.0);
        assert!(means[2][2] > means[2][0]);
        assert!(means[3][0] > 250.0 && means[3][2] < 5.0);
    }

    #[test]
    fn test_render_is_deterministic() {
        let request = CompositeRequest::new(png(33, 17, [1, 2, 3]), png(9, 40, [250, 90, 10]))
            .with_frame_count(5)
            .with_resolution(24);

        let compositor = compositor();
        let first = compositor.render_frames(&request).unwrap();
        let second = compositor.render_frames(&request).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_corrupt_source_is_decode_error() {
        let request = CompositeRequest::new(b"garbage".to_vec(), png(4, 4, [0, 0, 0]))
            .with_resolution(8);
        let err = compositor().render_frames(&request).unwrap_err();
        assert!(matches!(err, CompositorError::Decode(_)));
    }

    #[test]
    fn test_zero_frame_count_is_invalid() {
        let request = CompositeRequest::new(png(4, 4, [0, 0, 0]), png(4, 4, [0, 0, 0]))
            .with_frame_count(0);
        let err = compositor().compose(&request).unwrap_err();
        assert!(matches!(err, CompositorError::InvalidParameter(_)));
    }

    #[test]
    fn test_from_parts_defaults_and_limits() {
        let defaults = CompositorConfig::default();

        let request =
            CompositeRequest::from_parts(vec![], vec![], None, Some(12), None, &defaults).unwrap();
        assert_eq!(request.frame_count, 48);
        assert_eq!(request.fps, 12);
        assert_eq!(request.resolution, 512);

        let negative =
            CompositeRequest::from_parts(vec![], vec![], Some(-1), None, None, &defaults);
        assert!(matches!(
            negative,
            Err(CompositorError::InvalidParameter(InvalidParameterError::NonPositive { value: -1, .. }))
        ));

        let huge = CompositeRequest::from_parts(vec![], vec![], None, None, Some(100_000), &defaults);
        assert!(matches!(
            huge,
            Err(CompositorError::InvalidParameter(InvalidParameterError::TooLarge { .. }))
        ));
    }

    #[test]
    fn test_buffered_render_is_bounded() {
        let request = CompositeRequest::new(b"not decoded".to_vec(), b"not decoded".to_vec())
            .with_frame_count(1200)
            .with_resolution(2048);

        let err = compositor().render_frames(&request).unwrap_err();
        assert!(matches!(
            err,
            CompositorError::InvalidParameter(InvalidParameterError::TooLarge { .. })
        ));

        let mut config = Config::default();
        config.compositor.max_buffered_bytes = 4 * 8 * 8 * 3;
        let small = FrameCompositor::new(&config);
        let fits = CompositeRequest::new(png(4, 4, [1, 1, 1]), png(4, 4, [2, 2, 2]))
            .with_frame_count(4)
            .with_resolution(8);
        assert_eq!(small.render_frames(&fits).unwrap().len(), 4);
        assert!(small.render_frames(&fits.with_frame_count(5)).is_err());
    }
}

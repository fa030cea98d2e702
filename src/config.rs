use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    video::ResizeFilter,
};

/// Main configuration for the morph compositor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Blend and frame-sequence settings
    pub compositor: CompositorConfig,

    /// MP4 encoding settings
    pub encoder: EncoderConfig,

    /// External model location and invocation
    pub model: ModelConfig,

    /// Diagnostic clip returned when a request carries no images
    pub test_pattern: TestPatternConfig,

    /// Downloading images given by URL
    pub fetch: FetchConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.compositor.validate()?;
        self.encoder.validate()?;
        self.model.validate()?;
        self.test_pattern.validate()?;
        self.fetch.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> crate::CompositorError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
    .into()
}

/// Compositor defaults and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Frames rendered when a request does not say
    pub frame_count: u32,

    /// Playback rate written into the container
    pub fps: u32,

    /// Side of the square working resolution
    pub resolution: u32,

    /// Filter used to normalize inputs to the working resolution
    pub resize_filter: ResizeFilter,

    /// Largest frame count a request may ask for
    pub max_frame_count: u32,

    /// Largest resolution a request may ask for
    pub max_resolution: u32,

    /// Ceiling on raw frame bytes held at once by `render_frames`
    ///
    /// `compose` streams frames to the encoder and is not bound by this.
    pub max_buffered_bytes: u64,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            frame_count: 48,
            fps: 24,
            resolution: 512,
            resize_filter: ResizeFilter::default(),
            max_frame_count: 1200,
            max_resolution: 2048,
            max_buffered_bytes: 1 << 30,
        }
    }
}

impl CompositorConfig {
    fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("compositor.frame_count", self.frame_count),
            ("compositor.fps", self.fps),
            ("compositor.resolution", self.resolution),
            ("compositor.max_frame_count", self.max_frame_count),
            ("compositor.max_resolution", self.max_resolution),
        ] {
            if value == 0 {
                return Err(invalid(key, value));
            }
        }

        if self.max_buffered_bytes == 0 {
            return Err(invalid("compositor.max_buffered_bytes", 0));
        }

        if self.frame_count > self.max_frame_count {
            return Err(invalid(
                "compositor.frame_count",
                format!("{} > max {}", self.frame_count, self.max_frame_count),
            ));
        }

        if self.resolution > self.max_resolution {
            return Err(invalid(
                "compositor.resolution",
                format!("{} > max {}", self.resolution, self.max_resolution),
            ));
        }

        Ok(())
    }
}

/// Video encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// ffmpeg executable, looked up on PATH unless absolute
    pub ffmpeg_path: String,

    /// ffprobe executable, used when reading videos back
    pub ffprobe_path: String,

    /// Video codec passed to `-c:v`
    pub codec: String,

    /// Quality setting (0-100, higher is better)
    pub quality: u8,

    /// Parent directory for scratch files; the system temp dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            codec: "libx264".to_string(),
            quality: 85,
            temp_dir: None,
        }
    }
}

impl EncoderConfig {
    fn validate(&self) -> Result<()> {
        if self.quality > 100 {
            return Err(invalid("encoder.quality", self.quality));
        }

        if self.codec.trim().is_empty() {
            return Err(invalid("encoder.codec", "<empty>"));
        }

        if self.ffmpeg_path.trim().is_empty() {
            return Err(invalid("encoder.ffmpeg_path", "<empty>"));
        }

        Ok(())
    }
}

/// External image-to-video model settings
///
/// `command` is run with `args`, after substituting `{source}`, `{target}`,
/// `{output}`, `{frames}`, `{fps}`, `{resolution}` and `{model_path}`. Without a command the
/// model producer reports itself unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding one subdirectory per model
    pub model_dir: PathBuf,

    /// Name of the model subdirectory to validate
    pub model_name: String,

    /// Program that runs the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Arguments passed to `command`
    pub args: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            model_name: "Wan2.1-I2V-14B-720P".to_string(),
            command: None,
            args: Vec::new(),
        }
    }
}

impl ModelConfig {
    /// Full path of the configured model directory
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_name)
    }

    fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(invalid("model.model_name", "<empty>"));
        }

        if let Some(command) = &self.command {
            if command.trim().is_empty() {
                return Err(invalid("model.command", "<empty>"));
            }
        }

        Ok(())
    }
}

const MAX_TEST_PATTERN_SIDE: u32 = 4096;
const MAX_TEST_PATTERN_SECS: f64 = 60.0;

/// Diagnostic test-pattern clip
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestPatternConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration_secs: f64,
}

impl Default for TestPatternConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 24,
            duration_secs: 3.0,
        }
    }
}

impl TestPatternConfig {
    /// Number of frames in the clip
    pub fn frame_count(&self) -> usize {
        (self.duration_secs * f64::from(self.fps)).round().max(0.0) as usize
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(invalid(
                "test_pattern.size",
                format!("{}x{}", self.width, self.height),
            ));
        }

        if self.width > MAX_TEST_PATTERN_SIDE || self.height > MAX_TEST_PATTERN_SIDE {
            return Err(invalid(
                "test_pattern.size",
                format!("{}x{} > max {}", self.width, self.height, MAX_TEST_PATTERN_SIDE),
            ));
        }

        if self.fps == 0 {
            return Err(invalid("test_pattern.fps", self.fps));
        }

        if !(self.duration_secs > 0.0 && self.duration_secs <= MAX_TEST_PATTERN_SECS) {
            return Err(invalid("test_pattern.duration_secs", self.duration_secs));
        }

        Ok(())
    }
}

/// Image download settings for `*_image_url` inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Whole-request timeout
    pub timeout_secs: u64,

    /// Responses larger than this are rejected
    pub max_bytes: u64,

    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_bytes: 20 * 1024 * 1024,
            user_agent: concat!("morph-compositor/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(invalid("fetch.timeout_secs", 0));
        }

        if self.max_bytes == 0 {
            return Err(invalid("fetch.max_bytes", 0));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.compositor.frame_count, 48);
        assert_eq!(config.compositor.fps, 24);
        assert_eq!(config.compositor.resolution, 512);
        assert_eq!(config.test_pattern.frame_count(), 72);
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.model.command = Some("run-model".to_string());
        original_config.model.args = vec!["--out".to_string(), "{output}".to_string()];

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(loaded_config.compositor.frame_count, 48);
        assert_eq!(loaded_config.compositor.resize_filter, ResizeFilter::Lanczos3);
        assert_eq!(loaded_config.encoder.codec, "libx264");
        assert_eq!(loaded_config.model.command.as_deref(), Some("run-model"));
        assert_eq!(loaded_config.model.args, original_config.model.args);
        assert!(loaded_config.encoder.temp_dir.is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(
            &file_path,
            "[compositor]\nframe_count = 12\nresize_filter = \"triangle\"\n",
        )
        .unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.compositor.frame_count, 12);
        assert_eq!(config.compositor.fps, 24);
        assert_eq!(config.compositor.resize_filter, ResizeFilter::Triangle);
        assert_eq!(config.encoder.quality, 85);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/morph.toml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = Config::default();
        config.compositor.frame_count = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.encoder.quality = 101;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.compositor.resolution = 4096;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.test_pattern.duration_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetch.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pattern_size_is_capped() {
        let mut config = Config::default();
        config.test_pattern.duration_secs = 3600.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("test_pattern.duration_secs"));

        let mut config = Config::default();
        config.test_pattern.duration_secs = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.test_pattern.width = 100_000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.test_pattern.duration_secs = 60.0;
        assert!(config.validate().is_ok());
    }
}

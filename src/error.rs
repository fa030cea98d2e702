use thiserror::Error;

/// Main error type for the morph-compositor library
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(#[from] InvalidParameterError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Producer error: {0}")]
    Producer(#[from] ProducerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Input images or videos that cannot be parsed
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Field '{field}' is not valid base64: {reason}")]
    InvalidBase64 { field: String, reason: String },

    #[error("Field '{field}' is not a decodable image: {reason}")]
    InvalidImage { field: String, reason: String },

    #[error("Field '{field}' decoded to an empty {width}x{height} image")]
    EmptyImage { field: String, width: u32, height: u32 },

    #[error("Video could not be decoded: {reason}")]
    InvalidVideo { reason: String },

    #[error("Malformed request: {reason}")]
    MalformedRequest { reason: String },

    #[error("Field '{field}' could not be fetched from {url}: {reason}")]
    FetchFailed {
        field: String,
        url: String,
        reason: String,
    },
}

/// Out-of-range request parameters
#[derive(Error, Debug)]
pub enum InvalidParameterError {
    #[error("'{name}' must be positive, got {value}")]
    NonPositive { name: String, value: i64 },

    #[error("'{name}' = {value} exceeds the maximum of {max}")]
    TooLarge { name: String, value: i64, max: i64 },

    #[error("Request is missing '{name}'")]
    Missing { name: String },

    #[error("'{name}' is {width}x{height}, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        name: String,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
}

/// Failures while assembling frames into a container
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Encoder unavailable: {reason}")]
    EncoderUnavailable { reason: String },

    #[error("Frame {index} is {width}x{height}, expected {expected_width}x{expected_height}")]
    FrameMismatch {
        index: usize,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    #[error("Nothing to encode: frame sequence is empty")]
    EmptySequence,

    #[error("Video encoding failed: {reason}")]
    EncodingFailed { reason: String },
}

/// Failures of a video producer other than the compositor's own
#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("Producer '{producer}' is unavailable: {reason}")]
    Unavailable { producer: String, reason: String },

    #[error("Model invocation failed: {reason}")]
    ModelFailed { reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

impl CompositorError {
    /// Whether a different producer may still succeed where this one failed
    ///
    /// Only producer failures qualify: a bad image or parameter fails the
    /// same way no matter who renders it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Producer(_))
    }

    /// Short machine-friendly tag for response metadata
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode_error",
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::Encode(_) => "encode_error",
            Self::Producer(_) => "producer_error",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Decode(DecodeError::InvalidImage { field, .. }) => {
                format!("Could not read '{}' as an image. Please send a base64-encoded JPEG or PNG.", field)
            }
            Self::Decode(DecodeError::InvalidBase64 { field, .. }) => {
                format!("'{}' is not valid base64.", field)
            }
            Self::Decode(DecodeError::FetchFailed { field, url, .. }) => {
                format!("Could not download '{}' from {}.", field, url)
            }
            Self::Encode(EncodeError::EncoderUnavailable { .. }) => {
                "Video encoding is unavailable on this worker (is ffmpeg installed?).".to_string()
            }
            _ => self.to_string(),
        }
    }
}

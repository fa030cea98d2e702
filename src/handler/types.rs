use serde::{Deserialize, Serialize};

use crate::{
    error::CompositorError, handler::inputs::ImageInput, health::HealthReport,
    video::VideoArtifact,
};

/// Incoming generation request
///
/// Images are base64 strings, optionally prefixed with a `data:` URL header,
/// or `http(s)://` addresses given either inline or in the `*_image_url`
/// fields. Empty strings count as absent. Numeric parameters stay signed here so that zero and negative values can
/// be reported as invalid parameters rather than as malformed JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_image: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_image: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_image_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_image_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<i64>,

    /// Use the compositor directly instead of the external model
    pub test_mode: bool,

    /// Report readiness instead of generating anything
    pub health_check: bool,
}

#[derive(Deserialize)]
struct JobEnvelope {
    input: GenerationRequest,
}

impl GenerationRequest {
    /// Parse a request, accepting either the bare object or a `{"input": {...}}` job envelope
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if value.get("input").is_some() {
            let envelope: JobEnvelope = serde_json::from_value(value)?;
            Ok(envelope.input)
        } else {
            serde_json::from_value(value)
        }
    }

    pub fn source_input(&self) -> Option<ImageInput<'_>> {
        ImageInput::select(self.source_image.as_deref(), self.source_image_url.as_deref())
    }

    pub fn target_input(&self) -> Option<ImageInput<'_>> {
        ImageInput::select(self.target_image.as_deref(), self.target_image_url.as_deref())
    }

    /// True when at least one image was supplied in any form
    pub fn has_images(&self) -> bool {
        self.source_input().is_some() || self.target_input().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// The first-choice producer made the video
    Success,
    /// The compositor stood in for a failed or missing model
    Fallback,
    Error,
}

/// Outgoing response
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResponse {
    pub status: ResponseStatus,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    /// Which producer made the video
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,

    /// Why the model did not deliver, on fallback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthReport>,

    pub elapsed_ms: u64,
    pub generated_at: String,
}

impl GenerationResponse {
    fn base(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            video: None,
            error: None,
            error_kind: None,
            producer: None,
            primary_error: None,
            frame_count: None,
            fps: None,
            resolution: None,
            health: None,
            elapsed_ms: 0,
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// A response carrying a video
    pub fn with_video(
        status: ResponseStatus,
        message: impl Into<String>,
        producer: impl Into<String>,
        artifact: VideoArtifact,
    ) -> Self {
        let mut response = Self::base(status, message);
        response.producer = Some(producer.into());
        response.frame_count = Some(artifact.frame_count);
        response.fps = Some(artifact.fps);
        response.resolution = Some(artifact.width);
        response.video = Some(artifact.base64);
        response
    }

    pub fn health(report: HealthReport) -> Self {
        let mut response = Self::base(ResponseStatus::Success, "Health check completed");
        response.health = Some(report);
        response
    }

    pub fn from_error(error: &CompositorError) -> Self {
        let mut response = Self::base(ResponseStatus::Error, error.user_message());
        response.error = Some(error.to_string());
        response.error_kind = Some(error.kind().to_string());
        response
    }

    /// An error with no typed source, e.g. a crashed worker task
    pub fn internal_error(message: impl Into<String>) -> Self {
        let message = message.into();
        let mut response = Self::base(ResponseStatus::Error, "Internal error");
        response.error = Some(message);
        response.error_kind = Some("internal_error".to_string());
        response
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

//! # Request Handler
//!
//! Maps generation requests onto the producers and shapes the responses.
//! The CPU-bound work runs on tokio's blocking pool so one handler can serve
//! many requests at once.

pub mod inputs;
pub mod types;

use std::sync::Arc;
use std::time::Instant;

use tokio::task;
use tracing::{error, info, warn};

use crate::{
    composition::{CompositeRequest, FrameCompositor},
    config::Config,
    error::{DecodeError, InvalidParameterError, Result},
    health::HealthReport,
    producers::{
        CompositorFallbackProducer, ExternalModelProducer, ProducerChain, COMPOSITOR_PRODUCER_NAME,
    },
    video::test_pattern_frame,
};

pub use inputs::ImageInput;
pub use types::{GenerationRequest, GenerationResponse, ResponseStatus};

pub const TEST_PATTERN_PRODUCER_NAME: &str = "test_pattern";

/// Entry point for generation requests
#[derive(Clone)]
pub struct RequestHandler {
    config: Arc<Config>,
    compositor: Arc<FrameCompositor>,
    chain: Arc<ProducerChain>,
}

impl RequestHandler {
    /// External model first, compositor as fallback
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let compositor = Arc::new(FrameCompositor::new(&config));
        let chain = ProducerChain::new(
            Box::new(ExternalModelProducer::new(
                config.model.clone(),
                config.compositor.clone(),
                &config.encoder,
            )),
            Box::new(CompositorFallbackProducer::new(compositor.clone())),
        );

        Ok(Self {
            config: Arc::new(config),
            compositor,
            chain: Arc::new(chain),
        })
    }

    /// Use a caller-supplied producer chain
    pub fn with_chain(config: Config, chain: ProducerChain) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            compositor: Arc::new(FrameCompositor::new(&config)),
            config: Arc::new(config),
            chain: Arc::new(chain),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle one request; never fails, errors become error-shaped responses
    pub async fn handle(&self, request: GenerationRequest) -> GenerationResponse {
        let started = Instant::now();

        let handler = self.clone();
        let mut response = match task::spawn_blocking(move || handler.handle_blocking(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("Request failed: {}", e);
                GenerationResponse::from_error(&e)
            }
            Err(e) => {
                error!("Request worker task failed: {}", e);
                GenerationResponse::internal_error(format!("worker task failed: {}", e))
            }
        };

        response.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "Request finished with status {:?} in {} ms",
            response.status, response.elapsed_ms
        );
        response
    }

    /// Parse a JSON job and handle it
    pub async fn handle_json(&self, json: &str) -> GenerationResponse {
        match GenerationRequest::from_json(json) {
            Ok(request) => self.handle(request).await,
            Err(e) => GenerationResponse::from_error(
                &DecodeError::MalformedRequest {
                    reason: e.to_string(),
                }
                .into(),
            ),
        }
    }

    fn handle_blocking(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        if request.health_check {
            info!("Running health check");
            return Ok(GenerationResponse::health(HealthReport::collect(&self.config)));
        }

        if !request.has_images() {
            return self.test_pattern();
        }

        let composite = self.composite_request(&request)?;

        if request.test_mode {
            info!("Test mode: compositing without the external model");
            let artifact = self.compositor.compose(&composite)?;
            return Ok(GenerationResponse::with_video(
                ResponseStatus::Success,
                "Morph video generated in test mode",
                COMPOSITOR_PRODUCER_NAME,
                artifact,
            ));
        }

        let outcome = self.chain.produce(&composite)?;
        let (status, message) = if outcome.fell_back {
            (
                ResponseStatus::Fallback,
                "Model unavailable, returning compositor morph video",
            )
        } else {
            (ResponseStatus::Success, "Video generated successfully")
        };

        let mut response =
            GenerationResponse::with_video(status, message, outcome.producer, outcome.artifact);
        response.primary_error = outcome.primary_error;
        Ok(response)
    }

    fn test_pattern(&self) -> Result<GenerationResponse> {
        info!("No images supplied, rendering test pattern");

        let pattern = &self.config.test_pattern;
        let artifact = self.compositor.encoder().encode_rendered(
            pattern.width,
            pattern.height,
            pattern.frame_count(),
            pattern.fps,
            |i| Ok(test_pattern_frame(pattern, i)),
        )?;

        Ok(GenerationResponse::with_video(
            ResponseStatus::Success,
            "Test video generated. Provide source_image and target_image for a morph.",
            TEST_PATTERN_PRODUCER_NAME,
            artifact,
        ))
    }

    fn composite_request(&self, request: &GenerationRequest) -> Result<CompositeRequest> {
        let source = request
            .source_input()
            .ok_or_else(|| missing("source_image"))?;
        let target = request
            .target_input()
            .ok_or_else(|| missing("target_image"))?;

        let fetch = &self.config.fetch;
        CompositeRequest::from_parts(
            source.load("source_image", fetch)?,
            target.load("target_image", fetch)?,
            request.frame_count,
            request.fps,
            request.resolution,
            &self.config.compositor,
        )
    }
}

fn missing(name: &str) -> crate::CompositorError {
    InvalidParameterError::Missing {
        name: name.to_string(),
    }
    .into()
}

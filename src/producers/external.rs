use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context};
use image::RgbImage;
use tracing::{debug, info, warn};

use crate::{
    composition::CompositeRequest,
    config::{CompositorConfig, EncoderConfig, ModelConfig},
    error::{ProducerError, Result},
    health::ModelValidation,
    producers::VideoProducer,
    video::{load_image, normalize, program_available, VideoArtifact, VideoDecoder},
};

pub const MODEL_PRODUCER_NAME: &str = "external_model";

/// Hands the request to an external image-to-video model
///
/// The model itself is opaque: a configured command is run with the two
/// normalized input images and must write an MP4 to the given output path.
/// Inputs and output live in a scratch directory removed after each call.
/// When ffprobe is available the output is probed, so the reported frame
/// count and size are those of the video actually produced.
pub struct ExternalModelProducer {
    model: ModelConfig,
    compositor: CompositorConfig,
    temp_dir: Option<std::path::PathBuf>,
    ffinspect_path: String,
    decoder: VideoDecoder,
}

impl ExternalModelProducer {
    pub fn new(model: ModelConfig, compositor: CompositorConfig, encoder: &EncoderConfig) -> Self {
        Self {
            model,
            compositor,
            temp_dir: encoder.temp_dir.clone(),
            ffinspect_path: encoder.ffprobe_path.clone(),
            decoder: VideoDecoder::new(encoder),
        }
    }

    fn unavailable(&self, reason: impl Into<String>) -> crate::CompositorError {
        ProducerError::Unavailable {
            producer: MODEL_PRODUCER_NAME.to_string(),
            reason: reason.into(),
        }
        .into()
    }

    fn scratch_dir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("morph-compositor-model-");
        match &self.temp_dir {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
    }

    fn describe(&self, bytes: Vec<u8>, request: &CompositeRequest) -> Result<VideoArtifact> {
        if !program_available(&self.ffinspect_path) {
            debug!("ffprobe unavailable, reporting requested video metadata");
            return Ok(VideoArtifact::new(
                bytes,
                request.frame_count as usize,
                request.fps,
                request.resolution,
                request.resolution,
            ));
        }

        let info = self
            .decoder
            .inspect(&bytes)
            .map_err(|e| ProducerError::ModelFailed {
                reason: format!("model output is not a readable video: {}", e),
            })?;

        Ok(VideoArtifact::new(
            bytes,
            info.frame_count,
            (info.fps.round() as u32).max(1),
            info.width,
            info.height,
        ))
    }

    fn run_model(
        &self,
        command: &str,
        request: &CompositeRequest,
        (source, target): (&RgbImage, &RgbImage),
        scratch: &Path,
    ) -> anyhow::Result<Vec<u8>> {
        let source_path = scratch.join("source.png");
        let target_path = scratch.join("target.png");
        let output_path = scratch.join("output.mp4");

        normalize(source, request.resolution, self.compositor.resize_filter)
            .as_image()
            .save(&source_path)
            .context("failed to write source image for the model")?;
        normalize(target, request.resolution, self.compositor.resize_filter)
            .as_image()
            .save(&target_path)
            .context("failed to write target image for the model")?;

        let args: Vec<String> = self
            .model
            .args
            .iter()
            .map(|arg| {
                substitute(arg, &[
                    ("{source}", source_path.display().to_string()),
                    ("{target}", target_path.display().to_string()),
                    ("{output}", output_path.display().to_string()),
                    ("{frames}", request.frame_count.to_string()),
                    ("{fps}", request.fps.to_string()),
                    ("{resolution}", request.resolution.to_string()),
                    ("{model_path}", self.model.model_path().display().to_string()),
                ])
            })
            .collect();

        debug!("Running model command: {} {:?}", command, args);

        let output = Command::new(command)
            .args(&args)
            .output()
            .with_context(|| format!("failed to spawn model command '{}'", command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("model command exited with {}: {}", output.status, stderr.trim());
        }

        let bytes = std::fs::read(&output_path)
            .with_context(|| format!("model did not write {}", output_path.display()))?;
        if bytes.is_empty() {
            bail!("model wrote an empty video");
        }

        Ok(bytes)
    }
}

fn substitute(template: &str, values: &[(&str, String)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, (key, value)| acc.replace(key, value))
}

impl VideoProducer for ExternalModelProducer {
    fn name(&self) -> &str {
        MODEL_PRODUCER_NAME
    }

    fn description(&self) -> &str {
        "External image-to-video diffusion model"
    }

    fn is_available(&self) -> bool {
        self.model.command.is_some() && ModelValidation::inspect(&self.model).models_found
    }

    fn produce(&self, request: &CompositeRequest) -> Result<VideoArtifact> {
        let command = self
            .model
            .command
            .as_deref()
            .ok_or_else(|| self.unavailable("no model command configured"))?;

        let validation = ModelValidation::inspect(&self.model);
        if !validation.models_found {
            return Err(self.unavailable(validation.errors.join("; ")));
        }

        request.validate(&self.compositor)?;
        // Bad inputs fail here with a decode error, before the model is involved.
        let source = load_image("source_image", &request.source_image)?;
        let target = load_image("target_image", &request.target_image)?;

        info!("Invoking external model {:?}", validation.model_path);

        let scratch = self.scratch_dir()?;
        let result = self.run_model(command, request, (&source, &target), scratch.path());

        if let Err(e) = scratch.close() {
            warn!("Failed to remove model scratch directory: {}", e);
        }

        let bytes = result.map_err(|e| ProducerError::ModelFailed {
            reason: format!("{:#}", e),
        })?;

        self.describe(bytes, request)
    }
}

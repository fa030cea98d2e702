//! Readiness checks: is ffmpeg usable, and is the external model in place?

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::{
    config::{Config, ModelConfig},
    video::program_available,
};

const WEIGHT_EXTENSIONS: [&str; 3] = ["safetensors", "bin", "pth"];

/// What was found in the configured model directory
#[derive(Debug, Clone, Serialize)]
pub struct ModelValidation {
    pub model_path: PathBuf,
    pub models_found: bool,
    pub model_files_count: usize,
    pub has_weights: bool,
    pub has_config: bool,
    pub errors: Vec<String>,
}

impl ModelValidation {
    /// Inspect the model directory named by `config`
    ///
    /// The model counts as present when the directory holds at least one
    /// weight file and one `config*` file.
    pub fn inspect(config: &ModelConfig) -> Self {
        let model_path = config.model_path();
        let mut validation = Self {
            model_path: model_path.clone(),
            models_found: false,
            model_files_count: 0,
            has_weights: false,
            has_config: false,
            errors: Vec::new(),
        };

        if !config.model_dir.is_dir() {
            validation.errors.push(format!(
                "Models directory not found: {}",
                config.model_dir.display()
            ));
            return validation;
        }

        if !model_path.is_dir() {
            validation
                .errors
                .push(format!("Model not found: {}", model_path.display()));
            return validation;
        }

        let entries = match std::fs::read_dir(&model_path) {
            Ok(entries) => entries,
            Err(e) => {
                validation
                    .errors
                    .push(format!("Error checking model files: {}", e));
                return validation;
            }
        };

        let file_names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();

        validation.model_files_count = file_names.len();
        validation.has_weights = file_names.iter().any(|name| is_weight_file(name));
        validation.has_config = file_names.iter().any(|name| name.starts_with("config"));

        if validation.has_weights && validation.has_config {
            validation.models_found = true;
        } else {
            validation
                .errors
                .push("Model files incomplete (missing weights or config)".to_string());
        }

        debug!(
            "Model validation for {:?}: {} files, weights={}, config={}",
            model_path, validation.model_files_count, validation.has_weights, validation.has_config
        );

        validation
    }
}

fn is_weight_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| WEIGHT_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Both the model and the compositor can run
    Healthy,
    /// Only the compositor can run
    Degraded,
    /// Nothing can be encoded
    Unhealthy,
}

impl HealthStatus {
    /// ffmpeg gates everything; the model only decides healthy vs degraded
    pub fn from_checks(ffmpeg_available: bool, model_ready: bool) -> Self {
        match (ffmpeg_available, model_ready) {
            (false, _) => Self::Unhealthy,
            (true, true) => Self::Healthy,
            (true, false) => Self::Degraded,
        }
    }
}

/// Snapshot of worker readiness
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub ffmpeg_available: bool,
    pub ffprobe_available: bool,
    pub model_command_configured: bool,
    pub model_validation: ModelValidation,
    pub checked_at: String,
}

impl HealthReport {
    pub fn collect(config: &Config) -> Self {
        let ffmpeg_available = program_available(&config.encoder.ffmpeg_path);
        let ffprobe_available = program_available(&config.encoder.ffprobe_path);
        let model_command_configured = config.model.command.is_some();
        let model_validation = ModelValidation::inspect(&config.model);

        let status = HealthStatus::from_checks(
            ffmpeg_available,
            model_command_configured && model_validation.models_found,
        );

        Self {
            status,
            ffmpeg_available,
            ffprobe_available,
            model_command_configured,
            model_validation,
            checked_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

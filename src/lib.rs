//! # Morph-Compositor
//!
//! Turn two still images into a short video: an external image-to-video model
//! when one is available, otherwise a deterministic morph that approaches the
//! target image, touches it, and retreats.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use morph_compositor::{CompositeRequest, Config, FrameCompositor};
//!
//! # fn main() -> morph_compositor::Result<()> {
//! let compositor = FrameCompositor::new(&Config::default());
//!
//! let request = CompositeRequest::new(
//!     std::fs::read("source.jpg")?,
//!     std::fs::read("target.jpg")?,
//! )
//! .with_frame_count(48)
//! .with_fps(24)
//! .with_resolution(512);
//!
//! let video = compositor.compose(&request)?;
//! println!("{} frames, {} bytes", video.frame_count, video.file_size());
//! # Ok(())
//! # }
//! ```
//!
//! ## Serving requests
//!
//! ```rust,no_run
//! use morph_compositor::{Config, GenerationRequest, RequestHandler};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let handler = RequestHandler::new(Config::default())?;
//! let response = handler
//!     .handle(GenerationRequest {
//!         source_image: Some("iVBORw0KGgo...".to_string()),
//!         target_image: Some("iVBORw0KGgo...".to_string()),
//!         ..Default::default()
//!     })
//!     .await;
//! println!("{}", response.to_json()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`video`] - Frame types, image loading, blending, MP4 encode/decode
//! - [`composition`] - The deterministic frame compositor
//! - [`producers`] - External model and compositor behind one trait, plus the fallback chain
//! - [`handler`] - Request/response contract
//! - [`health`] - Readiness checks
//! - [`config`] - Configuration management

pub mod composition;
pub mod config;
pub mod error;
pub mod handler;
pub mod health;
pub mod producers;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    composition::{CompositeRequest, FrameCompositor},
    config::Config,
    error::{CompositorError, Result},
    handler::{GenerationRequest, GenerationResponse, RequestHandler, ResponseStatus},
    producers::{ProducerChain, VideoProducer},
    video::{Frame, FrameSequence, VideoArtifact},
};

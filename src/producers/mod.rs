//! # Video Producers
//!
//! Everything that can answer a generation request with a video.
//!
//! - **external_model**: an opaque image-to-video model run as a command
//! - **compositor**: the built-in deterministic morph
//!
//! [`ProducerChain`] tries the first and falls back to the second.

pub mod chain;
pub mod external;
pub mod fallback;
pub mod traits;

// Re-exports for convenience
pub use chain::{ChainOutcome, ProducerChain};
pub use external::{ExternalModelProducer, MODEL_PRODUCER_NAME};
pub use fallback::{CompositorFallbackProducer, COMPOSITOR_PRODUCER_NAME};
pub use traits::VideoProducer;

//! # Composition
//!
//! The deterministic frame compositor: decode two images, blend them along a
//! raised-cosine curve, and encode the sequence.

pub mod compositor;

// Re-exports for convenience
pub use compositor::{blend_sequence, CompositeRequest, FrameCompositor};

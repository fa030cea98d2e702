//! # Video Module
//!
//! Frame types, input image loading, blending, and MP4 encode/decode.

pub mod blend;
pub mod types;

mod decoder;
mod encoder;
mod loader;
mod test_pattern;

pub use blend::{blend_frames, blend_weight, blend_weights};
pub use decoder::{VideoDecoder, VideoInfo};
pub use encoder::VideoEncoder;
pub(crate) use encoder::program_available;
pub use loader::{decode_base64, load_image, normalize, ResizeFilter};
pub use test_pattern::{render_test_pattern, test_pattern_frame};
pub use types::{Frame, FrameSequence, VideoArtifact};

use crate::{composition::CompositeRequest, error::Result, video::VideoArtifact};

/// Something that can turn two images into a video
///
/// The external model and the built-in compositor both implement this, so
/// the fallback policy in [`ProducerChain`](super::ProducerChain) can treat
/// them alike.
pub trait VideoProducer: Send + Sync {
    /// Returns the unique name of this producer, reported in responses
    fn name(&self) -> &str;

    /// Returns a human-readable description of this producer
    fn description(&self) -> &str;

    /// Cheap readiness check, without running anything
    ///
    /// A producer that reports `false` will be skipped by the chain.
    fn is_available(&self) -> bool {
        true
    }

    /// Produce a video for the request
    fn produce(&self, request: &CompositeRequest) -> Result<VideoArtifact>;
}

use std::sync::Arc;

use crate::{
    composition::{CompositeRequest, FrameCompositor},
    error::Result,
    producers::VideoProducer,
    video::VideoArtifact,
};

pub const COMPOSITOR_PRODUCER_NAME: &str = "compositor";

/// The built-in compositor exposed as a producer
pub struct CompositorFallbackProducer {
    compositor: Arc<FrameCompositor>,
}

impl CompositorFallbackProducer {
    pub fn new(compositor: Arc<FrameCompositor>) -> Self {
        Self { compositor }
    }
}

impl VideoProducer for CompositorFallbackProducer {
    fn name(&self) -> &str {
        COMPOSITOR_PRODUCER_NAME
    }

    fn description(&self) -> &str {
        "Deterministic raised-cosine morph between the two input images"
    }

    fn is_available(&self) -> bool {
        self.compositor.encoder().check_ffmpeg_available()
    }

    fn produce(&self, request: &CompositeRequest) -> Result<VideoArtifact> {
        self.compositor.compose(request)
    }
}

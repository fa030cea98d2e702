use tracing::{info, warn};

use crate::{
    composition::CompositeRequest,
    error::Result,
    producers::VideoProducer,
    video::VideoArtifact,
};

/// Result of running a [`ProducerChain`]
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub artifact: VideoArtifact,

    /// Name of the producer that made the artifact
    pub producer: String,

    /// True when the primary producer was skipped or failed
    pub fell_back: bool,

    /// Why the primary producer did not deliver, if it didn't
    pub primary_error: Option<String>,
}

/// Try-primary-then-secondary policy
///
/// The secondary only runs when the primary is unavailable or fails with a
/// recoverable (producer) error. Input errors such as undecodable images are
/// returned straight away, since the secondary would reject them too.
pub struct ProducerChain {
    primary: Box<dyn VideoProducer>,
    secondary: Box<dyn VideoProducer>,
}

impl ProducerChain {
    pub fn new(primary: Box<dyn VideoProducer>, secondary: Box<dyn VideoProducer>) -> Self {
        Self { primary, secondary }
    }

    pub fn primary(&self) -> &dyn VideoProducer {
        self.primary.as_ref()
    }

    pub fn secondary(&self) -> &dyn VideoProducer {
        self.secondary.as_ref()
    }

    pub fn produce(&self, request: &CompositeRequest) -> Result<ChainOutcome> {
        let primary_error = if self.primary.is_available() {
            match self.primary.produce(request) {
                Ok(artifact) => {
                    info!("Primary producer '{}' succeeded", self.primary.name());
                    return Ok(ChainOutcome {
                        artifact,
                        producer: self.primary.name().to_string(),
                        fell_back: false,
                        primary_error: None,
                    });
                }
                Err(e) if e.is_recoverable() => e.to_string(),
                Err(e) => return Err(e),
            }
        } else {
            format!("producer '{}' is unavailable", self.primary.name())
        };

        warn!(
            "Falling back to '{}': {}",
            self.secondary.name(),
            primary_error
        );

        let artifact = self.secondary.produce(request)?;
        Ok(ChainOutcome {
            artifact,
            producer: self.secondary.name().to_string(),
            fell_back: true,
            primary_error: Some(primary_error),
        })
    }
}

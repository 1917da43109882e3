use super::CaptureSession;
use crate::adapters::{adapters_for, CaptureAdapter};
use crate::config::BiocaptureConfig;
use crate::detector::DeviceDetector;
use crate::error::{BiocaptureError, Result};
use crate::events::EventBus;
use crate::platform::Platform;
use crate::types::Transport;
use std::sync::Arc;

/// Builder wiring a session to a host platform
pub struct CaptureSessionBuilder {
    config: Option<BiocaptureConfig>,
    platform: Option<Platform>,
    adapters: Vec<Arc<dyn CaptureAdapter>>,
    preferred: Option<Transport>,
    event_capacity: usize,
}

impl CaptureSessionBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            platform: None,
            adapters: Vec::new(),
            preferred: None,
            event_capacity: 64,
        }
    }

    pub fn config(mut self, config: BiocaptureConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Add an adapter beyond the ones derived from the platform
    pub fn adapter(mut self, adapter: Arc<dyn CaptureAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn prefer(mut self, transport: Transport) -> Self {
        self.preferred = Some(transport);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<CaptureSession> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let mut adapters = match &self.platform {
            Some(platform) => adapters_for(platform, &config),
            None => Vec::new(),
        };
        adapters.extend(self.adapters);

        if adapters.is_empty() && self.platform.is_none() {
            return Err(BiocaptureError::system(
                "A platform or at least one adapter must be specified",
            ));
        }

        let detector = DeviceDetector::new(adapters, config.detection.probe_timeout());
        let session = CaptureSession::new(detector, EventBus::new(self.event_capacity.max(1)));
        if let Some(transport) = self.preferred {
            session.prefer_transport(transport);
        }

        Ok(session)
    }
}

impl Default for CaptureSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

use super::{AttemptSlot, CaptureAdapter};
use crate::error::PlatformError;
use crate::platform::{NativeBridge, PlatformInfo};
use crate::types::{CaptureArtifact, Device, Modality, Transport};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Prompts through the native biometric bridge of a handheld device
pub struct NativeBridgeAdapter {
    bridge: Arc<dyn NativeBridge>,
    info: PlatformInfo,
    attempt: AttemptSlot,
}

impl NativeBridgeAdapter {
    pub fn new(bridge: Arc<dyn NativeBridge>, info: PlatformInfo) -> Self {
        Self {
            bridge,
            info,
            attempt: AttemptSlot::default(),
        }
    }

    async fn acquire(
        &self,
        modality: Modality,
        token: &CancellationToken,
    ) -> Result<CaptureArtifact, PlatformError> {
        let message = format!("Place your {} on the device sensor to continue", modality);

        let confirmed = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(PlatformError::abort("Native prompt aborted")),
            confirmed = self.bridge.confirm(&message) => confirmed?,
        };

        if !confirmed {
            return Err(PlatformError::not_allowed("Native capture declined by user"));
        }

        info!("Native bridge acquiring {} sample", modality);

        let sample = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(PlatformError::abort("Native capture aborted")),
            sample = self.bridge.acquire_sample(modality) => sample?,
        };

        Ok(CaptureArtifact::Structured(sample))
    }
}

#[async_trait]
impl CaptureAdapter for NativeBridgeAdapter {
    fn transport(&self) -> Transport {
        Transport::Native
    }

    fn supports(&self, _modality: Modality) -> bool {
        true
    }

    async fn probe(&self, _modality: Modality) -> Result<Device, PlatformError> {
        if !self.info.has_credential_management {
            return Err(PlatformError::not_supported(
                "Runtime exposes no credential management",
            ));
        }

        if !self.info.is_mobile {
            return Err(PlatformError::not_supported(
                "Native bridge requires a handheld device",
            ));
        }

        Ok(Device::new(Transport::Native, "Native Biometric Sensor"))
    }

    async fn capture(
        &self,
        modality: Modality,
        cancel: CancellationToken,
    ) -> Result<CaptureArtifact, PlatformError> {
        let token = self.attempt.begin(&cancel);
        let result = self.acquire(modality, &token).await;
        self.attempt.finish();
        result
    }

    async fn release(&self) {
        if self.attempt.abort() {
            debug!("Aborted in-flight native capture");
        }
    }
}

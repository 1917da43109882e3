//! Capture adapters, one per transport.
//!
//! Every adapter implements the same capability set: `probe` decides whether
//! the transport is usable for a modality, `capture` drives the transport's
//! asynchronous protocol to a raw [`CaptureArtifact`], and `release` frees any
//! hardware the adapter still holds. `capture` must release its resources on
//! every exit path, including cancellation.

mod camera;
mod native;
mod upload;
mod webauthn;
#[cfg(test)]
mod tests;

pub use camera::CameraAdapter;
pub use native::NativeBridgeAdapter;
pub use upload::{validate_upload, UploadAdapter};
pub use webauthn::{authenticator_display_name, PlatformAuthenticatorAdapter};

use crate::classifier::ErrorClassifier;
use crate::config::BiocaptureConfig;
use crate::error::{CaptureError, PlatformError};
use crate::platform::Platform;
use crate::types::{CaptureArtifact, Device, Modality, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[async_trait]
pub trait CaptureAdapter: Send + Sync {
    /// Transport this adapter drives
    fn transport(&self) -> Transport;

    /// Whether this transport is offered for `modality` at all
    fn supports(&self, modality: Modality) -> bool;

    /// Check that the transport is usable right now
    async fn probe(&self, modality: Modality) -> Result<Device, PlatformError>;

    /// Acquire one raw sample. Returns `AbortError` once `cancel` fires.
    async fn capture(
        &self,
        modality: Modality,
        cancel: CancellationToken,
    ) -> Result<CaptureArtifact, PlatformError>;

    /// Abort any in-flight attempt and release held hardware
    async fn release(&self);

    /// Capture with the raw platform error already classified
    async fn capture_classified(
        &self,
        modality: Modality,
        cancel: CancellationToken,
    ) -> Result<CaptureArtifact, CaptureError> {
        self.capture(modality, cancel)
            .await
            .map_err(|raw| ErrorClassifier::classify(self.transport(), &raw))
    }
}

/// Tracks the cancellation token of the attempt currently in flight
#[derive(Default)]
pub(crate) struct AttemptSlot {
    current: Mutex<Option<CancellationToken>>,
}

impl AttemptSlot {
    /// Start an attempt whose token fires on `parent` cancellation or `abort`
    pub(crate) fn begin(&self, parent: &CancellationToken) -> CancellationToken {
        let token = parent.child_token();
        *self.current.lock() = Some(token.clone());
        token
    }

    pub(crate) fn finish(&self) {
        self.current.lock().take();
    }

    /// Cancel the in-flight attempt, if any
    pub(crate) fn abort(&self) -> bool {
        match self.current.lock().take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Build an adapter for every capability the platform exposes
pub fn adapters_for(platform: &Platform, config: &BiocaptureConfig) -> Vec<Arc<dyn CaptureAdapter>> {
    let mut adapters: Vec<Arc<dyn CaptureAdapter>> = Vec::new();

    match &platform.authenticator {
        Some(authenticator) => adapters.push(Arc::new(PlatformAuthenticatorAdapter::new(
            Arc::clone(authenticator),
            platform.info.clone(),
            config.authenticator.clone(),
        ))),
        None => debug!("Runtime exposes no platform authenticator"),
    }

    match &platform.media {
        Some(media) => adapters.push(Arc::new(CameraAdapter::new(
            Arc::clone(media),
            config.camera.clone(),
        ))),
        None => debug!("Runtime exposes no media devices"),
    }

    match &platform.native {
        Some(bridge) => adapters.push(Arc::new(NativeBridgeAdapter::new(
            Arc::clone(bridge),
            platform.info.clone(),
        ))),
        None => debug!("Runtime exposes no native bridge"),
    }

    match &platform.files {
        Some(files) => adapters.push(Arc::new(UploadAdapter::new(
            Arc::clone(files),
            config.upload.max_bytes,
        ))),
        None => debug!("Runtime exposes no file picker"),
    }

    adapters
}

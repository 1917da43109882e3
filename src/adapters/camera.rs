use super::{AttemptSlot, CaptureAdapter};
use crate::config::CameraConfig;
use crate::error::PlatformError;
use crate::frame::SnapshotCanvas;
use crate::platform::{MediaDevices, MediaStream, VideoConstraints};
use crate::types::{CaptureArtifact, Device, Modality, Transport};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Exclusive hold on an open media stream; stops every track when dropped
struct StreamGuard {
    stream: Box<dyn MediaStream>,
}

impl StreamGuard {
    fn new(stream: Box<dyn MediaStream>) -> Self {
        Self { stream }
    }

    fn stream(&mut self) -> &mut dyn MediaStream {
        self.stream.as_mut()
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if self.stream.active_tracks() > 0 {
            debug!("Stopping media stream {}", self.stream.id());
        }
        self.stream.stop();
    }
}

/// Takes a snapshot from a live video stream after a settle delay
pub struct CameraAdapter {
    media: Arc<dyn MediaDevices>,
    config: CameraConfig,
    canvas: SnapshotCanvas,
    attempt: AttemptSlot,
}

impl CameraAdapter {
    pub fn new(media: Arc<dyn MediaDevices>, config: CameraConfig) -> Self {
        let canvas = SnapshotCanvas::new(config.jpeg_quality);
        Self {
            media,
            config,
            canvas,
            attempt: AttemptSlot::default(),
        }
    }

    async fn open_stream(
        &self,
        constraints: &VideoConstraints,
        token: &CancellationToken,
    ) -> Result<StreamGuard, PlatformError> {
        let deadline = self.config.acquire_timeout();

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(PlatformError::abort("Camera request aborted")),
            result = tokio::time::timeout(deadline, self.media.get_user_media(constraints)) => {
                match result {
                    Ok(stream) => stream.map(StreamGuard::new),
                    Err(_) => {
                        warn!("Camera stream did not start within {:?}", deadline);
                        Err(PlatformError::timeout("Camera stream did not start in time"))
                    }
                }
            }
        }
    }

    async fn snapshot(
        &self,
        modality: Modality,
        token: &CancellationToken,
    ) -> Result<String, PlatformError> {
        let constraints =
            VideoConstraints::for_modality(modality, self.config.width, self.config.height);
        let mut guard = self.open_stream(&constraints, token).await?;

        info!(
            "Camera stream {} open for {} ({:?}); snapshot in {:?}",
            guard.stream().id(),
            modality,
            constraints.facing_mode,
            self.config.settle_delay()
        );

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Camera capture cancelled before snapshot");
                return Err(PlatformError::abort("Camera capture cancelled"));
            }
            _ = tokio::time::sleep(self.config.settle_delay()) => {}
        }

        let frame = tokio::select! {
            biased;
            _ = token.cancelled() => Err(PlatformError::abort("Camera capture cancelled")),
            frame = guard.stream().grab_frame() => frame,
        };

        // The stream is stopped right after the snapshot, whatever its outcome
        drop(guard);

        self.canvas.to_data_url(&frame?)
    }
}

#[async_trait]
impl CaptureAdapter for CameraAdapter {
    fn transport(&self) -> Transport {
        Transport::Camera
    }

    fn supports(&self, modality: Modality) -> bool {
        matches!(modality, Modality::Face | Modality::Palmprint)
    }

    async fn probe(&self, _modality: Modality) -> Result<Device, PlatformError> {
        let stream = self.media.get_user_media(&VideoConstraints::any()).await?;
        // Only availability matters; the probe stream must not stay open
        drop(StreamGuard::new(stream));

        Ok(Device::new(Transport::Camera, "Camera"))
    }

    async fn capture(
        &self,
        modality: Modality,
        cancel: CancellationToken,
    ) -> Result<CaptureArtifact, PlatformError> {
        let token = self.attempt.begin(&cancel);
        let result = self.snapshot(modality, &token).await;
        self.attempt.finish();

        result.map(CaptureArtifact::Text)
    }

    async fn release(&self) {
        if self.attempt.abort() {
            debug!("Aborted in-flight camera capture");
        }
    }
}

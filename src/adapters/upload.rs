use super::CaptureAdapter;
use crate::error::PlatformError;
use crate::platform::{FilePicker, SelectedFile};
use crate::types::{CaptureArtifact, Device, Modality, Transport};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Accepts a user-chosen image file as the sample
pub struct UploadAdapter {
    picker: Arc<dyn FilePicker>,
    max_bytes: u64,
}

impl UploadAdapter {
    pub fn new(picker: Arc<dyn FilePicker>, max_bytes: u64) -> Self {
        Self { picker, max_bytes }
    }
}

/// Reject anything that is not an image within the size limit
pub fn validate_upload(file: &SelectedFile, max_bytes: u64) -> Result<(), PlatformError> {
    if !file.mime_type.starts_with("image/") {
        return Err(PlatformError::invalid_file(format!(
            "{} has type {}, expected an image",
            file.name, file.mime_type
        )));
    }

    if file.size() > max_bytes {
        return Err(PlatformError::invalid_file(format!(
            "{} is {} bytes, limit is {}",
            file.name,
            file.size(),
            max_bytes
        )));
    }

    Ok(())
}

#[async_trait]
impl CaptureAdapter for UploadAdapter {
    fn transport(&self) -> Transport {
        Transport::Upload
    }

    fn supports(&self, modality: Modality) -> bool {
        modality == Modality::Fingerprint
    }

    async fn probe(&self, _modality: Modality) -> Result<Device, PlatformError> {
        Ok(Device::new(Transport::Upload, "Image Upload"))
    }

    async fn capture(
        &self,
        modality: Modality,
        cancel: CancellationToken,
    ) -> Result<CaptureArtifact, PlatformError> {
        let picked = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PlatformError::abort("File selection aborted")),
            picked = self.picker.pick_file("image/*") => picked?,
        };

        let file = picked.ok_or_else(|| PlatformError::not_allowed("No file was selected"))?;
        validate_upload(&file, self.max_bytes)?;

        info!(
            "Accepted {} upload {} ({}, {} bytes)",
            modality,
            file.name,
            file.mime_type,
            file.size()
        );

        Ok(CaptureArtifact::Text(format!(
            "data:{};base64,{}",
            file.mime_type,
            BASE64.encode(&file.contents)
        )))
    }

    async fn release(&self) {
        debug!("Upload adapter holds no hardware");
    }
}

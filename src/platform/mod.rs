//! Host capability seams.
//!
//! Each trait stands in for one facility the host runtime may or may not
//! expose: a platform authenticator, media devices, a native biometric bridge
//! and a file chooser. Adapters only ever talk to these traits.

mod fs;
pub mod simulated;

pub use fs::FsFilePicker;

use crate::error::PlatformError;
use crate::frame::FrameData;
use crate::types::{Modality, PlatformCredential};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Signals describing the running device, used for probing and naming
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    /// Operating system / user agent platform string
    pub os: String,
    /// Handheld form factor
    pub is_mobile: bool,
    /// Whether a credential-management capability is exposed
    pub has_credential_management: bool,
    /// Whether the runtime is a secure context (HTTPS or localhost)
    pub secure_context: bool,
}

impl PlatformInfo {
    /// Signals for the machine this process runs on
    pub fn current() -> Self {
        let os = std::env::consts::OS.to_string();
        let is_mobile = matches!(os.as_str(), "android" | "ios");
        Self {
            os,
            is_mobile,
            has_credential_management: true,
            secure_context: true,
        }
    }
}

/// User verification requirement for a credential ceremony
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserVerification {
    Required,
    Preferred,
    Discouraged,
}

/// Options passed to a platform credential-creation ceremony
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialCreationOptions {
    pub challenge: Vec<u8>,
    pub rp_id: String,
    pub rp_name: String,
    pub user_id: Vec<u8>,
    pub user_name: String,
    pub user_display_name: String,
    /// COSE algorithm identifiers, most preferred first
    pub algorithms: Vec<i64>,
    pub platform_attachment: bool,
    pub user_verification: UserVerification,
    pub timeout: Duration,
}

/// Platform-bound authenticator (fingerprint or face sensor managed by the OS)
#[async_trait]
pub trait PlatformAuthenticator: Send + Sync {
    /// Whether a user-verifying platform authenticator is present
    async fn is_user_verifying_available(&self) -> Result<bool, PlatformError>;

    /// Run a credential-creation ceremony
    async fn create_credential(
        &self,
        options: CredentialCreationOptions,
    ) -> Result<PlatformCredential, PlatformError>;
}

/// Camera direction requested from media devices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    User,
    Environment,
}

/// Video-only stream constraints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoConstraints {
    pub facing_mode: Option<FacingMode>,
    pub width: u32,
    pub height: u32,
}

impl VideoConstraints {
    /// Front camera for faces, rear camera for everything else
    pub fn for_modality(modality: Modality, width: u32, height: u32) -> Self {
        let facing_mode = match modality {
            Modality::Face => FacingMode::User,
            Modality::Fingerprint | Modality::Palmprint => FacingMode::Environment,
        };
        Self {
            facing_mode: Some(facing_mode),
            width,
            height,
        }
    }

    /// Unconstrained request used for availability probing
    pub fn any() -> Self {
        Self {
            facing_mode: None,
            width: 0,
            height: 0,
        }
    }
}

/// Source of live video streams
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Box<dyn MediaStream>, PlatformError>;
}

/// An open video stream. Holding one keeps the camera busy.
#[async_trait]
pub trait MediaStream: Send {
    fn id(&self) -> &str;

    /// Number of tracks that have not been stopped
    fn active_tracks(&self) -> usize;

    /// Grab the current frame from the video track
    async fn grab_frame(&mut self) -> Result<FrameData, PlatformError>;

    /// Stop every track. Stopping twice is harmless.
    fn stop(&mut self);
}

/// Integration point for a native biometric bridge
#[async_trait]
pub trait NativeBridge: Send + Sync {
    /// Ask the user to confirm the device prompt
    async fn confirm(&self, message: &str) -> Result<bool, PlatformError>;

    /// Acquire one sample from the native sensor
    async fn acquire_sample(&self, modality: Modality) -> Result<Value, PlatformError>;
}

/// A file chosen by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub contents: Vec<u8>,
}

impl SelectedFile {
    pub fn size(&self) -> u64 {
        self.contents.len() as u64
    }
}

/// File chooser; `Ok(None)` means the user dismissed it
#[async_trait]
pub trait FilePicker: Send + Sync {
    async fn pick_file(&self, accept: &str) -> Result<Option<SelectedFile>, PlatformError>;
}

/// Capabilities exposed by the running host. Missing ones are `None`.
#[derive(Clone)]
pub struct Platform {
    pub info: PlatformInfo,
    pub authenticator: Option<Arc<dyn PlatformAuthenticator>>,
    pub media: Option<Arc<dyn MediaDevices>>,
    pub native: Option<Arc<dyn NativeBridge>>,
    pub files: Option<Arc<dyn FilePicker>>,
}

impl Platform {
    /// A host that exposes nothing
    pub fn bare(info: PlatformInfo) -> Self {
        Self {
            info,
            authenticator: None,
            media: None,
            native: None,
            files: None,
        }
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn PlatformAuthenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn with_media(mut self, media: Arc<dyn MediaDevices>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_native(mut self, native: Arc<dyn NativeBridge>) -> Self {
        self.native = Some(native);
        self
    }

    pub fn with_files(mut self, files: Arc<dyn FilePicker>) -> Self {
        self.files = Some(files);
        self
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("info", &self.info)
            .field("authenticator", &self.authenticator.is_some())
            .field("media", &self.media.is_some())
            .field("native", &self.native.is_some())
            .field("files", &self.files.is_some())
            .finish()
    }
}

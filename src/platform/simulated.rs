//! Simulated host capabilities.
//!
//! Used by the CLI when no real hardware integration is wired in, and by the
//! test suite as scriptable fakes: every simulated device can be told to fail
//! with a named platform error, and the media devices count live tracks.

use super::{
    CredentialCreationOptions, FilePicker, MediaDevices, MediaStream, NativeBridge, Platform,
    PlatformAuthenticator, PlatformInfo, SelectedFile, VideoConstraints,
};
use crate::error::PlatformError;
use crate::frame::FrameData;
use crate::types::{Modality, PlatformCredential};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use parking_lot::Mutex;
use rand::RngCore;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use uuid::Uuid;

fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

/// Simulated platform authenticator
pub struct SimulatedAuthenticator {
    available: bool,
    secure_context: bool,
    latency: Duration,
    failure: Mutex<Option<PlatformError>>,
    ceremonies: AtomicUsize,
    last_options: Mutex<Option<CredentialCreationOptions>>,
}

impl SimulatedAuthenticator {
    pub fn new(available: bool) -> Self {
        Self {
            available,
            secure_context: true,
            latency: Duration::from_millis(250),
            failure: Mutex::new(None),
            ceremonies: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn insecure(mut self) -> Self {
        self.secure_context = false;
        self
    }

    /// Make every following ceremony fail with `error`
    pub fn fail_with(&self, error: PlatformError) {
        *self.failure.lock() = Some(error);
    }

    pub fn ceremony_count(&self) -> usize {
        self.ceremonies.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<CredentialCreationOptions> {
        self.last_options.lock().clone()
    }
}

#[async_trait]
impl PlatformAuthenticator for SimulatedAuthenticator {
    async fn is_user_verifying_available(&self) -> Result<bool, PlatformError> {
        Ok(self.available)
    }

    async fn create_credential(
        &self,
        options: CredentialCreationOptions,
    ) -> Result<PlatformCredential, PlatformError> {
        self.ceremonies.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock() = Some(options.clone());

        if !self.secure_context {
            return Err(PlatformError::new(
                "SecurityError",
                "The operation is insecure",
            ));
        }

        tokio::time::sleep(self.latency).await;

        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }

        if !self.available {
            return Err(PlatformError::not_supported(
                "No platform authenticator is available",
            ));
        }

        let raw_id = random_bytes(16);
        let client_data = json!({
            "type": "webauthn.create",
            "challenge": URL_SAFE_NO_PAD.encode(&options.challenge),
            "origin": format!("https://{}", options.rp_id),
            "crossOrigin": false,
        });

        // CBOR map header followed by `fmt: "none"`, then the credential id
        let mut attestation_object = vec![0xA3, 0x63, b'f', b'm', b't', 0x64, b'n', b'o', b'n', b'e'];
        attestation_object.extend_from_slice(&raw_id);

        debug!("Simulated ceremony completed for rp {}", options.rp_id);

        Ok(PlatformCredential {
            id: URL_SAFE_NO_PAD.encode(&raw_id),
            raw_id,
            attestation_object,
            client_data_json: client_data.to_string().into_bytes(),
            transports: vec!["internal".to_string()],
            authenticator_attachment: Some("platform".to_string()),
        })
    }
}

/// Simulated camera source
pub struct SimulatedMediaDevices {
    available: bool,
    startup_latency: Duration,
    resolution: (u32, u32),
    failure: Mutex<Option<PlatformError>>,
    live_tracks: Arc<AtomicUsize>,
    streams_opened: AtomicUsize,
    last_constraints: Mutex<Option<VideoConstraints>>,
}

impl SimulatedMediaDevices {
    pub fn new(available: bool) -> Self {
        Self {
            available,
            startup_latency: Duration::ZERO,
            resolution: (64, 48),
            failure: Mutex::new(None),
            live_tracks: Arc::new(AtomicUsize::new(0)),
            streams_opened: AtomicUsize::new(0),
            last_constraints: Mutex::new(None),
        }
    }

    pub fn with_startup_latency(mut self, latency: Duration) -> Self {
        self.startup_latency = latency;
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = (width, height);
        self
    }

    /// Make every following stream request fail with `error`
    pub fn fail_with(&self, error: PlatformError) {
        *self.failure.lock() = Some(error);
    }

    /// Tracks opened and not yet stopped, across all streams
    pub fn active_tracks(&self) -> usize {
        self.live_tracks.load(Ordering::SeqCst)
    }

    pub fn streams_opened(&self) -> usize {
        self.streams_opened.load(Ordering::SeqCst)
    }

    pub fn last_constraints(&self) -> Option<VideoConstraints> {
        self.last_constraints.lock().clone()
    }
}

#[async_trait]
impl MediaDevices for SimulatedMediaDevices {
    async fn get_user_media(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Box<dyn MediaStream>, PlatformError> {
        *self.last_constraints.lock() = Some(constraints.clone());

        if !self.startup_latency.is_zero() {
            tokio::time::sleep(self.startup_latency).await;
        }

        if !self.available {
            return Err(PlatformError::new(
                "NotFoundError",
                "Requested device not found",
            ));
        }

        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }

        let (width, height) = if constraints.width > 0 && constraints.height > 0 {
            (constraints.width, constraints.height)
        } else {
            self.resolution
        };

        self.streams_opened.fetch_add(1, Ordering::SeqCst);
        self.live_tracks.fetch_add(1, Ordering::SeqCst);

        let stream = SimulatedStream {
            id: Uuid::new_v4().to_string(),
            live: true,
            frames: 0,
            width,
            height,
            live_tracks: Arc::clone(&self.live_tracks),
        };
        debug!("Opened simulated stream {} ({}x{})", stream.id, width, height);

        Ok(Box::new(stream))
    }
}

/// Stream with a single synthetic video track.
///
/// Dropping the stream does not stop its track; callers must `stop()` it.
pub struct SimulatedStream {
    id: String,
    live: bool,
    frames: u64,
    width: u32,
    height: u32,
    live_tracks: Arc<AtomicUsize>,
}

#[async_trait]
impl MediaStream for SimulatedStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.live)
    }

    async fn grab_frame(&mut self) -> Result<FrameData, PlatformError> {
        if !self.live {
            return Err(PlatformError::new("InvalidStateError", "Video track has ended"));
        }

        let (width, height) = (self.width as usize, self.height as usize);
        let shift = (self.frames % 256) as usize;
        let mut data = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                data.push(((x * 255 / width.max(1)) + shift) as u8);
                data.push((y * 255 / height.max(1)) as u8);
                data.push(128);
            }
        }
        self.frames += 1;

        trace!("Generated simulated frame {} for stream {}", self.frames, self.id);
        Ok(FrameData::new(data, self.width, self.height))
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.live_tracks.fetch_sub(1, Ordering::SeqCst);
            debug!("Stopped simulated stream {}", self.id);
        }
    }
}

/// Placeholder native bridge that synthesizes a JSON sample
pub struct SimulatedNativeBridge {
    info: PlatformInfo,
    delay: Duration,
    confirm_answer: AtomicBool,
    failure: Mutex<Option<PlatformError>>,
    prompts: Mutex<Vec<String>>,
}

impl SimulatedNativeBridge {
    pub fn new(info: PlatformInfo, delay: Duration) -> Self {
        Self {
            info,
            delay,
            confirm_answer: AtomicBool::new(true),
            failure: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer given to subsequent confirmation prompts
    pub fn answer_prompts(&self, confirm: bool) {
        self.confirm_answer.store(confirm, Ordering::SeqCst);
    }

    pub fn fail_with(&self, error: PlatformError) {
        *self.failure.lock() = Some(error);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl NativeBridge for SimulatedNativeBridge {
    async fn confirm(&self, message: &str) -> Result<bool, PlatformError> {
        self.prompts.lock().push(message.to_string());
        Ok(self.confirm_answer.load(Ordering::SeqCst))
    }

    async fn acquire_sample(&self, modality: Modality) -> Result<Value, PlatformError> {
        tokio::time::sleep(self.delay).await;

        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }

        Ok(json!({
            "type": "native_biometric",
            "modality": modality.as_str(),
            "sampleId": Uuid::new_v4().to_string(),
            "capturedAt": Utc::now().to_rfc3339(),
            "device": {
                "bridge": "simulated",
                "platform": self.info.os,
                "mobile": self.info.is_mobile,
            },
        }))
    }
}

/// File picker returning a preset file, or nothing when dismissed
pub struct SimulatedFilePicker {
    file: Mutex<Option<SelectedFile>>,
}

impl SimulatedFilePicker {
    pub fn new(file: Option<SelectedFile>) -> Self {
        Self {
            file: Mutex::new(file),
        }
    }

    pub fn set_file(&self, file: Option<SelectedFile>) {
        *self.file.lock() = file;
    }
}

#[async_trait]
impl FilePicker for SimulatedFilePicker {
    async fn pick_file(&self, _accept: &str) -> Result<Option<SelectedFile>, PlatformError> {
        Ok(self.file.lock().clone())
    }
}

/// A host exposing a simulated authenticator, camera and native bridge
pub fn platform(info: PlatformInfo, native_delay: Duration) -> Platform {
    let native = SimulatedNativeBridge::new(info.clone(), native_delay);
    let authenticator = if info.secure_context {
        SimulatedAuthenticator::new(true)
    } else {
        SimulatedAuthenticator::new(true).insecure()
    };

    Platform::bare(info)
        .with_authenticator(Arc::new(authenticator))
        .with_media(Arc::new(SimulatedMediaDevices::new(true)))
        .with_native(Arc::new(native))
}

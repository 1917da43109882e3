use super::*;
use crate::config::BiocaptureConfig;
use crate::error::CaptureErrorKind;
use crate::platform::simulated::{
    SimulatedAuthenticator, SimulatedFilePicker, SimulatedMediaDevices, SimulatedNativeBridge,
};
use crate::platform::{FacingMode, PlatformInfo, SelectedFile, UserVerification};
use std::time::Duration;

const FIVE_MIB: usize = 5 * 1024 * 1024;

fn desktop_info() -> PlatformInfo {
    PlatformInfo {
        os: "windows".to_string(),
        is_mobile: false,
        has_credential_management: true,
        secure_context: true,
    }
}

fn handheld_info() -> PlatformInfo {
    PlatformInfo {
        os: "android".to_string(),
        is_mobile: true,
        has_credential_management: true,
        secure_context: true,
    }
}

fn image_file(size: usize) -> SelectedFile {
    SelectedFile {
        name: "print.png".to_string(),
        mime_type: "image/png".to_string(),
        contents: vec![0u8; size],
    }
}

fn camera_adapter(media: Arc<SimulatedMediaDevices>) -> Arc<CameraAdapter> {
    let config = BiocaptureConfig::default();
    Arc::new(CameraAdapter::new(media, config.camera))
}

#[tokio::test]
async fn test_authenticator_probe_names_device_from_platform() {
    let config = BiocaptureConfig::default();
    let adapter = PlatformAuthenticatorAdapter::new(
        Arc::new(SimulatedAuthenticator::new(true)),
        desktop_info(),
        config.authenticator,
    );

    let device = adapter.probe(Modality::Fingerprint).await.unwrap();
    assert_eq!(device.transport, Transport::Webauthn);
    assert_eq!(device.display_name, "Windows Hello");
}

#[tokio::test]
async fn test_authenticator_probe_fails_without_sensor() {
    let config = BiocaptureConfig::default();
    let adapter = PlatformAuthenticatorAdapter::new(
        Arc::new(SimulatedAuthenticator::new(false)),
        desktop_info(),
        config.authenticator,
    );

    let error = adapter.probe(Modality::Fingerprint).await.unwrap_err();
    assert_eq!(error.name, "NotSupportedError");
}

#[test]
fn test_display_name_distinguishes_form_factors() {
    let mut info = desktop_info();
    info.os = "macos".to_string();
    assert_eq!(authenticator_display_name(&info), "Touch ID");

    info.os = "linux".to_string();
    assert_eq!(authenticator_display_name(&info), "Platform Authenticator");

    info.is_mobile = true;
    assert_eq!(authenticator_display_name(&info), "Mobile Biometric Sensor");

    assert_eq!(authenticator_display_name(&handheld_info()), "Android Biometrics");
}

#[tokio::test(start_paused = true)]
async fn test_ceremony_uses_required_verification_and_random_challenge() {
    let config = BiocaptureConfig::default();
    let authenticator = Arc::new(SimulatedAuthenticator::new(true));
    let adapter = PlatformAuthenticatorAdapter::new(
        authenticator.clone(),
        desktop_info(),
        config.authenticator,
    );

    let artifact = adapter
        .capture(Modality::Fingerprint, CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(artifact, CaptureArtifact::Credential(_)));

    let first = authenticator.last_options().unwrap();
    assert_eq!(first.user_verification, UserVerification::Required);
    assert!(first.platform_attachment);
    assert_eq!(first.timeout, Duration::from_secs(120));
    assert_eq!(first.challenge.len(), 32);

    adapter
        .capture(Modality::Fingerprint, CancellationToken::new())
        .await
        .unwrap();
    let second = authenticator.last_options().unwrap();
    assert_ne!(first.challenge, second.challenge);
}

#[tokio::test(start_paused = true)]
async fn test_slow_ceremony_times_out() {
    let config = BiocaptureConfig::default();
    let adapter = PlatformAuthenticatorAdapter::new(
        Arc::new(SimulatedAuthenticator::new(true).with_latency(Duration::from_secs(300))),
        desktop_info(),
        config.authenticator,
    );

    let error = adapter
        .capture_classified(Modality::Fingerprint, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(error.kind, CaptureErrorKind::Timeout);
    assert!(error.retryable);
}

#[tokio::test(start_paused = true)]
async fn test_ceremony_failures_are_classified() {
    let config = BiocaptureConfig::default();
    let authenticator = Arc::new(SimulatedAuthenticator::new(true));
    let adapter = PlatformAuthenticatorAdapter::new(
        authenticator.clone(),
        desktop_info(),
        config.authenticator,
    );

    authenticator.fail_with(PlatformError::new("InvalidStateError", "busy"));
    let error = adapter
        .capture_classified(Modality::Face, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(error.kind, CaptureErrorKind::SensorBusy);

    authenticator.fail_with(PlatformError::not_allowed("user dismissed"));
    let error = adapter
        .capture_classified(Modality::Face, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(error.kind, CaptureErrorKind::PermissionDenied);
}

#[tokio::test]
async fn test_insecure_context_is_security_error() {
    let config = BiocaptureConfig::default();
    let adapter = PlatformAuthenticatorAdapter::new(
        Arc::new(SimulatedAuthenticator::new(true).insecure()),
        desktop_info(),
        config.authenticator,
    );

    let error = adapter
        .capture_classified(Modality::Fingerprint, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(error.kind, CaptureErrorKind::SecurityContextInvalid);
    assert!(!error.retryable);
}

#[tokio::test]
async fn test_camera_probe_releases_stream() {
    let media = Arc::new(SimulatedMediaDevices::new(true));
    let adapter = camera_adapter(media.clone());

    let device = adapter.probe(Modality::Face).await.unwrap();
    assert_eq!(device.transport, Transport::Camera);
    assert_eq!(media.streams_opened(), 1);
    assert_eq!(media.active_tracks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_camera_snapshot_after_settle_delay() {
    let media = Arc::new(SimulatedMediaDevices::new(true));
    let adapter = camera_adapter(media.clone());

    let started = tokio::time::Instant::now();
    let artifact = adapter
        .capture(Modality::Face, CancellationToken::new())
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(3));
    match artifact {
        CaptureArtifact::Text(url) => assert!(url.starts_with("data:image/jpeg;base64,")),
        other => panic!("Unexpected artifact: {:?}", other),
    }
    assert_eq!(media.active_tracks(), 0);
    assert_eq!(
        media.last_constraints().and_then(|c| c.facing_mode),
        Some(FacingMode::User)
    );
}

#[tokio::test(start_paused = true)]
async fn test_camera_uses_rear_camera_for_palm() {
    let media = Arc::new(SimulatedMediaDevices::new(true));
    let adapter = camera_adapter(media.clone());

    adapter
        .capture(Modality::Palmprint, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        media.last_constraints().and_then(|c| c.facing_mode),
        Some(FacingMode::Environment)
    );
}

#[tokio::test(start_paused = true)]
async fn test_camera_cancel_before_snapshot_stops_tracks() {
    let media = Arc::new(SimulatedMediaDevices::new(true));
    let adapter = camera_adapter(media.clone());
    let cancel = CancellationToken::new();

    let task = {
        let adapter = Arc::clone(&adapter);
        let cancel = cancel.clone();
        tokio::spawn(async move { adapter.capture(Modality::Face, cancel).await })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(media.active_tracks(), 1);

    cancel.cancel();
    let error = task.await.unwrap().unwrap_err();

    assert!(error.is_abort());
    assert_eq!(media.active_tracks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_camera_release_aborts_attempt() {
    let media = Arc::new(SimulatedMediaDevices::new(true));
    let adapter = camera_adapter(media.clone());

    let task = {
        let adapter = Arc::clone(&adapter);
        tokio::spawn(async move { adapter.capture(Modality::Face, CancellationToken::new()).await })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;
    adapter.release().await;

    assert!(task.await.unwrap().unwrap_err().is_abort());
    assert_eq!(media.active_tracks(), 0);
}

#[tokio::test]
async fn test_camera_permission_denied_is_classified() {
    let media = Arc::new(SimulatedMediaDevices::new(true));
    media.fail_with(PlatformError::not_allowed("Permission dismissed"));
    let adapter = camera_adapter(media.clone());

    let error = adapter
        .capture_classified(Modality::Face, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(error.kind, CaptureErrorKind::PermissionDenied);
    assert_eq!(media.active_tracks(), 0);
}

#[tokio::test]
async fn test_native_probe_requires_handheld_with_credential_management() {
    let bridge = Arc::new(SimulatedNativeBridge::new(handheld_info(), Duration::ZERO));

    let desktop = NativeBridgeAdapter::new(bridge.clone(), desktop_info());
    assert!(desktop.probe(Modality::Face).await.is_err());

    let mut no_credentials = handheld_info();
    no_credentials.has_credential_management = false;
    let bare = NativeBridgeAdapter::new(bridge.clone(), no_credentials);
    assert!(bare.probe(Modality::Face).await.is_err());

    let handheld = NativeBridgeAdapter::new(bridge, handheld_info());
    assert_eq!(
        handheld.probe(Modality::Face).await.unwrap().transport,
        Transport::Native
    );
}

#[tokio::test(start_paused = true)]
async fn test_native_capture_prompts_then_synthesizes_sample() {
    let bridge = Arc::new(SimulatedNativeBridge::new(
        handheld_info(),
        Duration::from_millis(1500),
    ));
    let adapter = NativeBridgeAdapter::new(bridge.clone(), handheld_info());

    let artifact = adapter
        .capture(Modality::Fingerprint, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(bridge.prompts().len(), 1);
    match artifact {
        CaptureArtifact::Structured(value) => {
            assert_eq!(value["modality"], "fingerprint");
            assert_eq!(value["type"], "native_biometric");
        }
        other => panic!("Unexpected artifact: {:?}", other),
    }
}

#[tokio::test]
async fn test_native_declined_prompt_is_permission_denied() {
    let bridge = Arc::new(SimulatedNativeBridge::new(handheld_info(), Duration::ZERO));
    bridge.answer_prompts(false);
    let adapter = NativeBridgeAdapter::new(bridge, handheld_info());

    let error = adapter
        .capture_classified(Modality::Face, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(error.kind, CaptureErrorKind::PermissionDenied);
}

#[test]
fn test_upload_only_offered_for_fingerprint() {
    let adapter = UploadAdapter::new(Arc::new(SimulatedFilePicker::new(None)), FIVE_MIB as u64);

    assert!(adapter.supports(Modality::Fingerprint));
    assert!(!adapter.supports(Modality::Face));
    assert!(!adapter.supports(Modality::Palmprint));
}

#[tokio::test]
async fn test_upload_size_boundary() {
    let picker = Arc::new(SimulatedFilePicker::new(Some(image_file(FIVE_MIB))));
    let adapter = UploadAdapter::new(picker.clone(), FIVE_MIB as u64);

    let artifact = adapter
        .capture(Modality::Fingerprint, CancellationToken::new())
        .await
        .unwrap();
    match artifact {
        CaptureArtifact::Text(url) => assert!(url.starts_with("data:image/png;base64,")),
        other => panic!("Unexpected artifact: {:?}", other),
    }

    picker.set_file(Some(image_file(FIVE_MIB + 1)));
    let error = adapter
        .capture_classified(Modality::Fingerprint, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(error.kind, CaptureErrorKind::InvalidInputFormat);
}

#[tokio::test]
async fn test_oversized_file_on_disk_is_invalid_input() {
    let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    file.as_file().set_len(FIVE_MIB as u64 + 1).unwrap();
    let picker = crate::platform::FsFilePicker::new(file.path()).with_max_bytes(FIVE_MIB as u64);
    let adapter = UploadAdapter::new(Arc::new(picker), FIVE_MIB as u64);

    let error = adapter
        .capture_classified(Modality::Fingerprint, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(error.kind, CaptureErrorKind::InvalidInputFormat);
    assert!(error.retryable);
}

#[test]
fn test_upload_rejects_non_image() {
    let file = SelectedFile {
        name: "notes.txt".to_string(),
        mime_type: "text/plain".to_string(),
        contents: b"hello".to_vec(),
    };

    let error = validate_upload(&file, FIVE_MIB as u64).unwrap_err();
    assert_eq!(error.name, "InvalidFileError");
}

#[tokio::test]
async fn test_dismissed_picker_is_permission_denied() {
    let adapter = UploadAdapter::new(Arc::new(SimulatedFilePicker::new(None)), FIVE_MIB as u64);

    let error = adapter
        .capture_classified(Modality::Fingerprint, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(error.kind, CaptureErrorKind::PermissionDenied);
}

#[test]
fn test_adapters_for_skips_missing_capabilities() {
    let config = BiocaptureConfig::default();
    let platform = Platform::bare(desktop_info())
        .with_media(Arc::new(SimulatedMediaDevices::new(true)));

    let adapters = adapters_for(&platform, &config);
    let transports: Vec<Transport> = adapters.iter().map(|a| a.transport()).collect();
    assert_eq!(transports, vec![Transport::Camera]);
}

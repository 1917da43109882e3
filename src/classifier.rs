use crate::error::{CaptureError, CaptureErrorKind, PlatformError};
use crate::types::Transport;
use tracing::{debug, warn};

/// Static mapping of `(transport, platform error name)` to `(kind, retryable)`
const CLASSIFICATION_TABLE: &[(Transport, &str, CaptureErrorKind, bool)] = &[
    // Platform authenticator ceremony
    (Transport::Webauthn, "NotSupportedError", CaptureErrorKind::DeviceUnavailable, false),
    (Transport::Webauthn, "ConstraintError", CaptureErrorKind::DeviceUnavailable, false),
    (Transport::Webauthn, "NotAllowedError", CaptureErrorKind::PermissionDenied, true),
    (Transport::Webauthn, "AbortError", CaptureErrorKind::PermissionDenied, true),
    (Transport::Webauthn, "InvalidStateError", CaptureErrorKind::SensorBusy, true),
    (Transport::Webauthn, "SecurityError", CaptureErrorKind::SecurityContextInvalid, false),
    (Transport::Webauthn, "TimeoutError", CaptureErrorKind::Timeout, true),
    (Transport::Webauthn, "EncodingError", CaptureErrorKind::EncodingFailure, true),
    // Live camera stream
    (Transport::Camera, "NotFoundError", CaptureErrorKind::DeviceUnavailable, false),
    (Transport::Camera, "OverconstrainedError", CaptureErrorKind::DeviceUnavailable, false),
    (Transport::Camera, "NotAllowedError", CaptureErrorKind::PermissionDenied, true),
    (Transport::Camera, "PermissionDeniedError", CaptureErrorKind::PermissionDenied, true),
    (Transport::Camera, "NotReadableError", CaptureErrorKind::SensorBusy, true),
    (Transport::Camera, "TrackStartError", CaptureErrorKind::SensorBusy, true),
    (Transport::Camera, "SecurityError", CaptureErrorKind::SecurityContextInvalid, false),
    (Transport::Camera, "TimeoutError", CaptureErrorKind::Timeout, true),
    (Transport::Camera, "EncodingError", CaptureErrorKind::EncodingFailure, true),
    // Native bridge prompt
    (Transport::Native, "NotSupportedError", CaptureErrorKind::DeviceUnavailable, false),
    (Transport::Native, "NotAllowedError", CaptureErrorKind::PermissionDenied, true),
    (Transport::Native, "InvalidStateError", CaptureErrorKind::SensorBusy, true),
    (Transport::Native, "SecurityError", CaptureErrorKind::SecurityContextInvalid, false),
    (Transport::Native, "TimeoutError", CaptureErrorKind::Timeout, true),
    (Transport::Native, "EncodingError", CaptureErrorKind::EncodingFailure, true),
    // File upload
    (Transport::Upload, "InvalidFileError", CaptureErrorKind::InvalidInputFormat, true),
    (Transport::Upload, "NotReadableError", CaptureErrorKind::InvalidInputFormat, true),
    (Transport::Upload, "NotAllowedError", CaptureErrorKind::PermissionDenied, true),
    (Transport::Upload, "EncodingError", CaptureErrorKind::EncodingFailure, true),
];

/// Maps raw platform exceptions onto the capture failure taxonomy
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify a raw platform error raised while using `transport`
    pub fn classify(transport: Transport, raw: &PlatformError) -> CaptureError {
        let (kind, retryable) = match Self::lookup(transport, &raw.name) {
            Some(entry) => entry,
            None => {
                warn!(
                    "Unclassified {} error '{}': {}",
                    transport, raw.name, raw.message
                );
                (CaptureErrorKind::Unknown, true)
            }
        };

        debug!(
            "Classified {} error '{}' as {} (retryable: {})",
            transport, raw.name, kind, retryable
        );

        CaptureError::new(kind, kind.hint(), retryable)
    }

    /// Table lookup without the `Unknown` fallback
    pub fn lookup(transport: Transport, name: &str) -> Option<(CaptureErrorKind, bool)> {
        CLASSIFICATION_TABLE
            .iter()
            .find(|(t, n, _, _)| *t == transport && *n == name)
            .map(|(_, _, kind, retryable)| (*kind, *retryable))
    }
}

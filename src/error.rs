use crate::types::Transport;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Crate-level errors outside the capture taxonomy
#[derive(Error, Debug)]
pub enum BiocaptureError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("System error: {message}")]
    System { message: String },
}

impl BiocaptureError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BiocaptureError>;

/// Failure taxonomy surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureErrorKind {
    DeviceUnavailable,
    PermissionDenied,
    SensorBusy,
    SecurityContextInvalid,
    Timeout,
    InvalidInputFormat,
    EncodingFailure,
    Unknown,
}

impl CaptureErrorKind {
    /// User-facing remediation for this kind of failure
    pub fn hint(&self) -> &'static str {
        match self {
            CaptureErrorKind::DeviceUnavailable => {
                "No usable capture device was found. Switch to another device or upload an image instead."
            }
            CaptureErrorKind::PermissionDenied => {
                "Access was declined. Allow access to the sensor or camera when prompted, then try again."
            }
            CaptureErrorKind::SensorBusy => {
                "The sensor is in use by another application. Close it and try again."
            }
            CaptureErrorKind::SecurityContextInvalid => {
                "Biometric capture requires a secure (HTTPS) connection. Reopen the page over a secure origin."
            }
            CaptureErrorKind::Timeout => {
                "The capture took too long. Keep your finger or face steady on the sensor and try again."
            }
            CaptureErrorKind::InvalidInputFormat => {
                "The selected file must be an image no larger than 5 MB. Choose a different file."
            }
            CaptureErrorKind::EncodingFailure => {
                "The captured sample could not be encoded. Capture a new sample."
            }
            CaptureErrorKind::Unknown => "Something went wrong during capture. Try again.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureErrorKind::DeviceUnavailable => "device_unavailable",
            CaptureErrorKind::PermissionDenied => "permission_denied",
            CaptureErrorKind::SensorBusy => "sensor_busy",
            CaptureErrorKind::SecurityContextInvalid => "security_context_invalid",
            CaptureErrorKind::Timeout => "timeout",
            CaptureErrorKind::InvalidInputFormat => "invalid_input_format",
            CaptureErrorKind::EncodingFailure => "encoding_failure",
            CaptureErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CaptureErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified capture failure handed to the caller
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct CaptureError {
    pub kind: CaptureErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl CaptureError {
    pub fn new<S: Into<String>>(kind: CaptureErrorKind, message: S, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    pub fn device_unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(CaptureErrorKind::DeviceUnavailable, message, true)
    }

    pub fn encoding_failure<S: Into<String>>(message: S) -> Self {
        Self::new(CaptureErrorKind::EncodingFailure, message, true)
    }

    pub fn hint(&self) -> &'static str {
        self.kind.hint()
    }
}

/// Raw exception raised by a host platform facility, named the way the
/// platform names it (`NotAllowedError`, `InvalidStateError`, ...)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{name}: {message}")]
pub struct PlatformError {
    pub name: String,
    pub message: String,
}

impl PlatformError {
    pub fn new<N: Into<String>, M: Into<String>>(name: N, message: M) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn not_allowed<M: Into<String>>(message: M) -> Self {
        Self::new("NotAllowedError", message)
    }

    pub fn not_supported<M: Into<String>>(message: M) -> Self {
        Self::new("NotSupportedError", message)
    }

    pub fn timeout<M: Into<String>>(message: M) -> Self {
        Self::new("TimeoutError", message)
    }

    pub fn abort<M: Into<String>>(message: M) -> Self {
        Self::new("AbortError", message)
    }

    pub fn invalid_file<M: Into<String>>(message: M) -> Self {
        Self::new("InvalidFileError", message)
    }

    pub fn is_abort(&self) -> bool {
        self.name == "AbortError"
    }
}

/// Rejections from the caller-facing session API
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Device {0} is not among the detected devices")]
    UnknownDevice(Transport),

    #[error("Capture cancelled")]
    Cancelled,

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

impl SessionError {
    /// The classified capture error, if this rejection carries one
    pub fn capture_error(&self) -> Option<&CaptureError> {
        match self {
            SessionError::Capture(error) => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL_KINDS: [CaptureErrorKind; 8] = [
        CaptureErrorKind::DeviceUnavailable,
        CaptureErrorKind::PermissionDenied,
        CaptureErrorKind::SensorBusy,
        CaptureErrorKind::SecurityContextInvalid,
        CaptureErrorKind::Timeout,
        CaptureErrorKind::InvalidInputFormat,
        CaptureErrorKind::EncodingFailure,
        CaptureErrorKind::Unknown,
    ];

    #[test]
    fn test_each_kind_has_distinct_hint() {
        let hints: HashSet<&str> = ALL_KINDS.iter().map(|kind| kind.hint()).collect();
        assert_eq!(hints.len(), ALL_KINDS.len());
    }

    #[test]
    fn test_capture_error_display() {
        let error = CaptureError::new(CaptureErrorKind::SensorBusy, "authenticator busy", true);
        assert_eq!(error.to_string(), "sensor_busy: authenticator busy");
        assert_eq!(error.hint(), CaptureErrorKind::SensorBusy.hint());
    }

    #[test]
    fn test_session_error_exposes_capture_error() {
        let error: SessionError = CaptureError::device_unavailable("none").into();
        assert_eq!(
            error.capture_error().map(|e| e.kind),
            Some(CaptureErrorKind::DeviceUnavailable)
        );
        assert!(SessionError::Cancelled.capture_error().is_none());
    }
}

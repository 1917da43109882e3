pub mod adapters;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod frame;
pub mod normalizer;
pub mod platform;
pub mod recovery;
pub mod selector;
pub mod session;
pub mod types;

pub use adapters::{
    adapters_for, CameraAdapter, CaptureAdapter, NativeBridgeAdapter, PlatformAuthenticatorAdapter,
    UploadAdapter,
};
pub use classifier::ErrorClassifier;
pub use config::BiocaptureConfig;
pub use detector::DeviceDetector;
pub use error::{
    BiocaptureError, CaptureError, CaptureErrorKind, PlatformError, Result, SessionError,
};
pub use events::{EventBus, SessionEvent};
pub use frame::{FrameData, SnapshotCanvas};
pub use normalizer::EncodingNormalizer;
pub use platform::{Platform, PlatformInfo};
pub use recovery::{capture_with_retry, RecoveryAction, RetryPolicy};
pub use selector::DeviceSelector;
pub use session::{CaptureSession, CaptureSessionBuilder, SessionState};
pub use types::{CaptureArtifact, CaptureResult, Device, Modality, PlatformCredential, Transport};

use crate::config::{BiocaptureConfig, RecoverySettings};
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::session::{CaptureSession, SessionState};
use crate::types::{CaptureResult, Modality};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// What to do after a failed capture attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Run detection and capture again after the delay
    RetryAfterDelay(Duration),
    /// Surface the error to the caller
    GiveUp,
}

/// Retry policy for retryable capture errors
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&BiocaptureConfig::default().recovery)
    }
}

impl From<&RecoverySettings> for RetryPolicy {
    fn from(settings: &RecoverySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            exponential_backoff: settings.exponential_backoff,
        }
    }
}

impl RetryPolicy {
    /// Never retry
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Decide how to continue after `retry_count` retries ended in `error`
    pub fn handle_error(&self, retry_count: u32, error: &SessionError) -> RecoveryAction {
        let capture_error = match error.capture_error() {
            Some(capture_error) => capture_error,
            None => return RecoveryAction::GiveUp,
        };

        if !capture_error.retryable {
            debug!("{} is not retryable", capture_error.kind);
            return RecoveryAction::GiveUp;
        }

        if retry_count >= self.max_retries {
            warn!(
                "Maximum retries ({}) exceeded: {}",
                self.max_retries, capture_error
            );
            return RecoveryAction::GiveUp;
        }

        RecoveryAction::RetryAfterDelay(self.calculate_delay(retry_count))
    }

    /// Calculate delay for retry with exponential backoff
    pub fn calculate_delay(&self, retry_count: u32) -> Duration {
        if !self.exponential_backoff {
            return self.base_delay;
        }

        let factor = 2_u32.saturating_pow(retry_count);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Detect, select and capture, retrying retryable failures under `policy`.
///
/// Stops at the first success, at a non-retryable error, or as soon as the
/// session is cancelled, including while waiting between attempts.
pub async fn capture_with_retry(
    session: &CaptureSession,
    modality: Modality,
    policy: &RetryPolicy,
) -> Result<CaptureResult, SessionError> {
    let mut retry_count = 0;

    loop {
        let outcome = match session.request_capture(modality).await {
            Ok(_) => session
                .start_capture()
                .await
                .map_err(|e| abandoned(session, e)),
            Err(e) => Err(e),
        };

        let error = match outcome {
            Ok(result) => {
                if retry_count > 0 {
                    info!("Capture succeeded after {} retries", retry_count);
                }
                return Ok(result);
            }
            Err(e) => e,
        };

        match policy.handle_error(retry_count, &error) {
            RecoveryAction::GiveUp => return Err(error),
            RecoveryAction::RetryAfterDelay(delay) => {
                retry_count += 1;
                info!(
                    "Retrying capture (attempt {}/{}) in {:?}: {}",
                    retry_count, policy.max_retries, delay, error
                );
                sleep(delay).await;

                // A cancel while waiting moves the failed session back to idle
                if !matches!(session.state(), SessionState::Failed(_)) {
                    debug!("Session left the failed state during backoff");
                    session.events().publish(SessionEvent::cancelled());
                    return Err(SessionError::Cancelled);
                }
            }
        }
    }
}

/// A start rejected because a cancel already returned the session to idle
fn abandoned(session: &CaptureSession, error: SessionError) -> SessionError {
    match error {
        SessionError::InvalidState { .. } if session.state() == SessionState::Idle => {
            SessionError::Cancelled
        }
        other => other,
    }
}

use super::{AttemptSlot, CaptureAdapter};
use crate::config::AuthenticatorConfig;
use crate::error::PlatformError;
use crate::platform::{
    CredentialCreationOptions, PlatformAuthenticator, PlatformInfo, UserVerification,
};
use crate::types::{CaptureArtifact, Device, Modality, Transport};
use async_trait::async_trait;
use rand::RngCore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// ES256 then RS256
const COSE_ALGORITHMS: [i64; 2] = [-7, -257];

/// Drives a platform-bound credential-creation ceremony
pub struct PlatformAuthenticatorAdapter {
    authenticator: Arc<dyn PlatformAuthenticator>,
    info: PlatformInfo,
    config: AuthenticatorConfig,
    attempt: AttemptSlot,
}

impl PlatformAuthenticatorAdapter {
    pub fn new(
        authenticator: Arc<dyn PlatformAuthenticator>,
        info: PlatformInfo,
        config: AuthenticatorConfig,
    ) -> Self {
        Self {
            authenticator,
            info,
            config,
            attempt: AttemptSlot::default(),
        }
    }

    fn creation_options(&self) -> CredentialCreationOptions {
        let mut challenge = vec![0u8; self.config.challenge_len];
        rand::thread_rng().fill_bytes(&mut challenge);

        CredentialCreationOptions {
            challenge,
            rp_id: self.config.rp_id.clone(),
            rp_name: self.config.rp_name.clone(),
            user_id: Uuid::new_v4().as_bytes().to_vec(),
            user_name: self.config.user_name.clone(),
            user_display_name: self.config.user_display_name.clone(),
            algorithms: COSE_ALGORITHMS.to_vec(),
            platform_attachment: true,
            user_verification: UserVerification::Required,
            timeout: self.config.ceremony_timeout(),
        }
    }
}

/// Advisory sensor name derived from platform signals
pub fn authenticator_display_name(info: &PlatformInfo) -> String {
    let os = info.os.to_ascii_lowercase();

    let name = if os.contains("windows") {
        "Windows Hello"
    } else if os.contains("iphone") || os.contains("ipad") || os == "ios" {
        "Face ID / Touch ID"
    } else if os.contains("mac") {
        "Touch ID"
    } else if os.contains("android") {
        "Android Biometrics"
    } else if info.is_mobile {
        "Mobile Biometric Sensor"
    } else {
        "Platform Authenticator"
    };

    name.to_string()
}

#[async_trait]
impl CaptureAdapter for PlatformAuthenticatorAdapter {
    fn transport(&self) -> Transport {
        Transport::Webauthn
    }

    fn supports(&self, modality: Modality) -> bool {
        matches!(modality, Modality::Fingerprint | Modality::Face)
    }

    async fn probe(&self, _modality: Modality) -> Result<Device, PlatformError> {
        if self.authenticator.is_user_verifying_available().await? {
            Ok(Device::new(Transport::Webauthn, authenticator_display_name(&self.info)))
        } else {
            Err(PlatformError::not_supported(
                "No user-verifying platform authenticator",
            ))
        }
    }

    async fn capture(
        &self,
        modality: Modality,
        cancel: CancellationToken,
    ) -> Result<CaptureArtifact, PlatformError> {
        let token = self.attempt.begin(&cancel);
        let options = self.creation_options();
        let timeout = options.timeout;

        info!(
            "Starting platform credential ceremony for {} (rp: {}, timeout: {:?})",
            modality, options.rp_id, timeout
        );

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(PlatformError::abort("Ceremony aborted")),
            result = tokio::time::timeout(timeout, self.authenticator.create_credential(options)) => {
                match result {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("Platform credential ceremony exceeded {:?}", timeout);
                        Err(PlatformError::timeout("Credential ceremony timed out"))
                    }
                }
            }
        };

        self.attempt.finish();

        let credential = outcome?;
        debug!(
            "Ceremony produced credential {} ({} byte attestation)",
            credential.id,
            credential.attestation_object.len()
        );

        Ok(CaptureArtifact::Credential(credential))
    }

    async fn release(&self) {
        if self.attempt.abort() {
            debug!("Aborted in-flight platform credential ceremony");
        }
    }
}

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Biometric modality requested for a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Fingerprint,
    Face,
    Palmprint,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Fingerprint => "fingerprint",
            Modality::Face => "face",
            Modality::Palmprint => "palmprint",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fingerprint" => Ok(Modality::Fingerprint),
            "face" => Ok(Modality::Face),
            "palmprint" | "palm" => Ok(Modality::Palmprint),
            other => Err(format!("unknown modality '{}'", other)),
        }
    }
}

/// Concrete capture channel underlying a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Webauthn,
    Camera,
    Native,
    Upload,
}

impl Transport {
    /// All transports, highest default priority first
    pub const PRIORITY_ORDER: [Transport; 4] = [
        Transport::Webauthn,
        Transport::Camera,
        Transport::Native,
        Transport::Upload,
    ];

    /// Lower rank wins during default selection
    pub fn priority_rank(&self) -> usize {
        match self {
            Transport::Webauthn => 0,
            Transport::Camera => 1,
            Transport::Native => 2,
            Transport::Upload => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Webauthn => "webauthn",
            Transport::Camera => "camera",
            Transport::Native => "native",
            Transport::Upload => "upload",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webauthn" => Ok(Transport::Webauthn),
            "camera" => Ok(Transport::Camera),
            "native" => Ok(Transport::Native),
            "upload" => Ok(Transport::Upload),
            other => Err(format!("unknown transport '{}'", other)),
        }
    }
}

/// A usable capture device discovered during detection.
///
/// Devices are produced fresh on every detection pass and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub transport: Transport,
    pub display_name: String,
    pub available: bool,
}

impl Device {
    pub fn new<S: Into<String>>(transport: Transport, display_name: S) -> Self {
        Self {
            transport,
            display_name: display_name.into(),
            available: true,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.transport)
    }
}

/// Raw credential produced by a platform-authenticator ceremony
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCredential {
    pub id: String,
    pub raw_id: Vec<u8>,
    pub attestation_object: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub transports: Vec<String>,
    pub authenticator_attachment: Option<String>,
}

impl PlatformCredential {
    /// Structured form with binary members carried as Base64 text
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "rawId": BASE64.encode(&self.raw_id),
            "type": "public-key",
            "response": {
                "attestationObject": BASE64.encode(&self.attestation_object),
                "clientDataJSON": BASE64.encode(&self.client_data_json),
                "transports": self.transports,
            },
            "authenticatorAttachment": self.authenticator_attachment,
        })
    }
}

/// Adapter-specific result before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureArtifact {
    /// Data URL or other text produced by a capture
    Text(String),
    /// Raw binary buffer
    Binary(Vec<u8>),
    /// Structured record such as a simulated native payload
    Structured(serde_json::Value),
    /// Platform-authenticator credential record
    Credential(PlatformCredential),
}

impl CaptureArtifact {
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureArtifact::Text(_) => "text",
            CaptureArtifact::Binary(_) => "binary",
            CaptureArtifact::Structured(_) => "structured",
            CaptureArtifact::Credential(_) => "credential",
        }
    }
}

/// The sole artifact handed across to the caller and backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub modality: Modality,
    /// Base64 text without any `data:` scheme prefix
    pub canonical_encoding: String,
    pub source_transport: Transport,
    pub captured_at: DateTime<Utc>,
}

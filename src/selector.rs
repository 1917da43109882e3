use crate::error::SessionError;
use crate::types::{Device, Transport};
use tracing::{debug, info};

/// Picks the default device by transport priority, honoring a manual override
#[derive(Debug, Clone, Default)]
pub struct DeviceSelector {
    preferred: Option<Transport>,
}

impl DeviceSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preference(transport: Transport) -> Self {
        Self {
            preferred: Some(transport),
        }
    }

    pub fn preferred(&self) -> Option<Transport> {
        self.preferred
    }

    /// Choose a device, or `None` when nothing usable was detected
    pub fn select(&self, devices: &[Device]) -> Option<Device> {
        if let Some(preferred) = self.preferred {
            if let Some(device) = devices
                .iter()
                .find(|d| d.available && d.transport == preferred)
            {
                debug!("Using overridden device {}", device);
                return Some(device.clone());
            }
            debug!(
                "Overridden transport {} not detected, using priority order",
                preferred
            );
        }

        devices
            .iter()
            .filter(|d| d.available)
            .min_by_key(|d| d.transport.priority_rank())
            .cloned()
    }

    /// Make `chosen` the selection for the rest of the session
    pub fn override_with(
        &mut self,
        devices: &[Device],
        chosen: &Device,
    ) -> Result<Device, SessionError> {
        let device = devices
            .iter()
            .find(|d| d.available && d.transport == chosen.transport)
            .cloned()
            .ok_or(SessionError::UnknownDevice(chosen.transport))?;

        info!("Device override set to {}", device);
        self.preferred = Some(device.transport);
        Ok(device)
    }

    pub fn clear_override(&mut self) {
        self.preferred = None;
    }
}

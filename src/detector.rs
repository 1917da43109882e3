use crate::adapters::CaptureAdapter;
use crate::types::{Device, Modality, Transport};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Probes every adapter relevant to a modality and reports what is usable
pub struct DeviceDetector {
    adapters: Vec<Arc<dyn CaptureAdapter>>,
    probe_timeout: Duration,
}

impl DeviceDetector {
    pub fn new(adapters: Vec<Arc<dyn CaptureAdapter>>, probe_timeout: Duration) -> Self {
        Self {
            adapters,
            probe_timeout,
        }
    }

    /// Run all probes concurrently, each bounded by the probe timeout.
    ///
    /// A failed or timed-out probe yields no device. The result is ordered by
    /// transport priority.
    pub async fn detect(&self, modality: Modality) -> Vec<Device> {
        let candidates: Vec<&Arc<dyn CaptureAdapter>> = self
            .adapters
            .iter()
            .filter(|adapter| adapter.supports(modality))
            .collect();

        debug!(
            "Probing {} transport(s) for {}",
            candidates.len(),
            modality
        );

        let probes = candidates.into_iter().map(|adapter| async move {
            let transport = adapter.transport();
            match tokio::time::timeout(self.probe_timeout, adapter.probe(modality)).await {
                Ok(Ok(device)) => {
                    debug!("{} probe found {}", transport, device.display_name);
                    Some(device)
                }
                Ok(Err(e)) => {
                    debug!("{} probe unavailable: {}", transport, e);
                    None
                }
                Err(_) => {
                    warn!(
                        "{} probe did not answer within {:?}",
                        transport, self.probe_timeout
                    );
                    None
                }
            }
        });

        let mut devices: Vec<Device> = join_all(probes).await.into_iter().flatten().collect();
        devices.sort_by_key(|device| device.transport.priority_rank());

        info!(
            "Detected {} device(s) for {}: [{}]",
            devices.len(),
            modality,
            devices
                .iter()
                .map(|d| d.transport.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        devices
    }

    /// Adapter driving `transport`, if the platform exposes it
    pub fn adapter(&self, transport: Transport) -> Option<Arc<dyn CaptureAdapter>> {
        self.adapters
            .iter()
            .find(|adapter| adapter.transport() == transport)
            .cloned()
    }

    pub fn transports(&self) -> Vec<Transport> {
        self.adapters.iter().map(|adapter| adapter.transport()).collect()
    }
}

//! Capture session state machine.
//!
//! A session walks `Idle -> Detecting -> Ready -> Capturing` and ends in
//! `Succeeded` or `Failed`. `cancel` returns any state to `Idle`. Each request
//! runs under a generation number; a cancel bumps it so that results arriving
//! from an abandoned attempt are dropped instead of delivered.

mod builder;

pub use builder::CaptureSessionBuilder;

use crate::adapters::CaptureAdapter;
use crate::detector::DeviceDetector;
use crate::error::{CaptureError, SessionError};
use crate::events::{EventBus, SessionEvent};
use crate::normalizer::EncodingNormalizer;
use crate::selector::DeviceSelector;
use crate::types::{CaptureResult, Device, Modality, Transport};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Detecting {
        modality: Modality,
    },
    Ready {
        modality: Modality,
        devices: Vec<Device>,
        selected: Device,
    },
    Capturing {
        modality: Modality,
        device: Device,
    },
    Succeeded(CaptureResult),
    Failed(CaptureError),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Detecting { .. } => "detecting",
            SessionState::Ready { .. } => "ready",
            SessionState::Capturing { .. } => "capturing",
            SessionState::Succeeded(_) => "succeeded",
            SessionState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Succeeded(_) | SessionState::Failed(_))
    }
}

struct SessionCore {
    state: SessionState,
    selector: DeviceSelector,
    generation: u64,
    cancel: CancellationToken,
}

impl SessionCore {
    fn transition(&mut self, state: SessionState, events: &EventBus) {
        debug!("Session {} -> {}", self.state.name(), state.name());
        let name = state.name();
        self.state = state;
        events.publish(SessionEvent::state_changed(name));
    }

    fn reject(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState {
            operation,
            state: self.state.name(),
        }
    }

    /// Whether a commit for `generation` is still wanted
    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && !self.cancel.is_cancelled()
    }
}

struct SessionInner {
    detector: DeviceDetector,
    events: EventBus,
    core: Mutex<SessionCore>,
}

/// Caller-facing handle on one capture lifecycle; clones share the session
#[derive(Clone)]
pub struct CaptureSession {
    inner: Arc<SessionInner>,
}

impl CaptureSession {
    pub fn new(detector: DeviceDetector, events: EventBus) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                detector,
                events,
                core: Mutex::new(SessionCore {
                    state: SessionState::Idle,
                    selector: DeviceSelector::new(),
                    generation: 0,
                    cancel: CancellationToken::new(),
                }),
            }),
        }
    }

    pub fn builder() -> CaptureSessionBuilder {
        CaptureSessionBuilder::new()
    }

    pub fn state(&self) -> SessionState {
        self.inner.core.lock().state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Transports the host exposes, detected or not
    pub fn transports(&self) -> Vec<Transport> {
        self.inner.detector.transports()
    }

    /// Prefer `transport` whenever it is detected, for the rest of the session
    pub fn prefer_transport(&self, transport: Transport) {
        self.inner.core.lock().selector = DeviceSelector::with_preference(transport);
    }

    /// Detect devices for `modality` and select one.
    ///
    /// Valid from `Idle`, `Ready` or a terminal state. Ends in `Ready`, or in
    /// `Failed(DeviceUnavailable)` when nothing usable was found.
    pub async fn request_capture(&self, modality: Modality) -> Result<Vec<Device>, SessionError> {
        let (generation, cancel) = {
            let mut core = self.inner.core.lock();
            match core.state {
                SessionState::Detecting { .. } | SessionState::Capturing { .. } => {
                    return Err(core.reject("request capture"));
                }
                _ => {}
            }

            core.generation += 1;
            core.cancel = CancellationToken::new();
            core.transition(SessionState::Detecting { modality }, &self.inner.events);
            (core.generation, core.cancel.clone())
        };

        info!("Capture requested for {}", modality);

        let devices = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            devices = self.inner.detector.detect(modality) => devices,
        };

        let mut core = self.inner.core.lock();
        if !core.is_current(generation) {
            debug!("Dropping detection result of abandoned request");
            return Err(SessionError::Cancelled);
        }

        match core.selector.select(&devices) {
            Some(selected) => {
                info!("Selected {} for {}", selected, modality);
                core.transition(
                    SessionState::Ready {
                        modality,
                        devices: devices.clone(),
                        selected,
                    },
                    &self.inner.events,
                );
                Ok(devices)
            }
            None => {
                let error = CaptureError::device_unavailable(format!(
                    "No capture device is available for {}",
                    modality
                ));
                core.transition(SessionState::Failed(error.clone()), &self.inner.events);
                self.inner.events.publish(SessionEvent::Failed {
                    error: error.clone(),
                });
                Err(SessionError::Capture(error))
            }
        }
    }

    /// Devices found by the last detection, while the session is `Ready`
    pub fn list_devices(&self) -> Vec<Device> {
        match &self.inner.core.lock().state {
            SessionState::Ready { devices, .. } => devices.clone(),
            _ => Vec::new(),
        }
    }

    /// Override the selected device. Valid only in `Ready`; the state is kept.
    pub fn select_device(&self, device: &Device) -> Result<Device, SessionError> {
        let mut core = self.inner.core.lock();
        let devices = match &core.state {
            SessionState::Ready { devices, .. } => devices.clone(),
            _ => return Err(core.reject("select device")),
        };

        let chosen = core.selector.override_with(&devices, device)?;
        if let SessionState::Ready { selected, .. } = &mut core.state {
            *selected = chosen.clone();
        }
        Ok(chosen)
    }

    /// Run the selected adapter and deliver the normalized result.
    ///
    /// Valid only in `Ready`; any other state is rejected without side effects.
    pub async fn start_capture(&self) -> Result<CaptureResult, SessionError> {
        let (generation, cancel, modality, device, adapter) = {
            let mut core = self.inner.core.lock();
            let (modality, device) = match &core.state {
                SessionState::Ready {
                    modality, selected, ..
                } => (*modality, selected.clone()),
                _ => return Err(core.reject("start capture")),
            };

            let adapter = match self.inner.detector.adapter(device.transport) {
                Some(adapter) => adapter,
                None => {
                    let error = CaptureError::device_unavailable(format!(
                        "{} is no longer exposed by the host",
                        device.transport
                    ));
                    core.transition(SessionState::Failed(error.clone()), &self.inner.events);
                    self.inner.events.publish(SessionEvent::Failed {
                        error: error.clone(),
                    });
                    return Err(SessionError::Capture(error));
                }
            };

            core.transition(
                SessionState::Capturing {
                    modality,
                    device: device.clone(),
                },
                &self.inner.events,
            );
            (
                core.generation,
                core.cancel.clone(),
                modality,
                device,
                adapter,
            )
        };

        info!("Capturing {} with {}", modality, device);

        let outcome = adapter.capture_classified(modality, cancel.clone()).await;
        adapter.release().await;

        let outcome = outcome.and_then(|artifact| {
            debug!("Normalizing {} artifact", artifact.kind());
            EncodingNormalizer::normalize(&artifact).map(|canonical_encoding| CaptureResult {
                modality,
                canonical_encoding,
                source_transport: device.transport,
                captured_at: Utc::now(),
            })
        });

        let mut core = self.inner.core.lock();
        if !core.is_current(generation) {
            debug!("Suppressing late outcome of cancelled capture");
            return Err(SessionError::Cancelled);
        }

        match outcome {
            Ok(result) => {
                core.transition(SessionState::Succeeded(result.clone()), &self.inner.events);
                self.inner.events.publish(SessionEvent::Captured {
                    result: result.clone(),
                });
                Ok(result)
            }
            Err(error) => {
                warn!("Capture with {} failed: {} ({})", device, error, error.hint());
                core.transition(SessionState::Failed(error.clone()), &self.inner.events);
                self.inner.events.publish(SessionEvent::Failed {
                    error: error.clone(),
                });
                Err(SessionError::Capture(error))
            }
        }
    }

    /// Abandon whatever is in flight and return to `Idle`.
    ///
    /// Releases the active adapter. `Cancelled` is published once per
    /// abandoned request; cancelling an idle session does nothing.
    pub async fn cancel(&self) {
        let adapter = {
            let mut core = self.inner.core.lock();
            if core.state.is_terminal() {
                core.transition(SessionState::Idle, &self.inner.events);
                return;
            }

            let active = match &core.state {
                SessionState::Idle => return,
                SessionState::Capturing { device, .. } => Some(device.transport),
                _ => None,
            };

            core.cancel.cancel();
            core.generation += 1;
            core.transition(SessionState::Idle, &self.inner.events);
            self.inner.events.publish(SessionEvent::cancelled());

            active.and_then(|transport| self.inner.detector.adapter(transport))
        };

        if let Some(adapter) = adapter {
            adapter.release().await;
        }
    }

    /// Leave a terminal state for `Idle`
    pub fn reset(&self) -> Result<(), SessionError> {
        let mut core = self.inner.core.lock();
        match core.state {
            SessionState::Idle => Ok(()),
            SessionState::Succeeded(_) | SessionState::Failed(_) => {
                core.transition(SessionState::Idle, &self.inner.events);
                Ok(())
            }
            _ => Err(core.reject("reset")),
        }
    }

    /// Adapter for `transport`, if the host exposes it
    pub fn adapter(&self, transport: Transport) -> Option<Arc<dyn CaptureAdapter>> {
        self.inner.detector.adapter(transport)
    }
}

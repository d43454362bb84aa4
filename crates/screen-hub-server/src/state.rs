//! Shared application state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use device_bridge::{DeviceRegistry, SessionSupervisor};
use screen_hub_types::RecordingConfig;

use crate::capture::FrameSource;

/// Mutable relay controls shared by every stream connection.
pub struct RelayState {
    /// Once set, every open stream ends and no new frames are produced.
    pub stop: AtomicBool,
    /// Host monitor currently being streamed.
    pub monitor_index: AtomicUsize,
    pub jpeg_quality: u8,
    /// Target stream frame rate.
    pub fps: u32,
    /// When set, a capture failure ends the stream instead of substituting
    /// the placeholder frame.
    pub strict: bool,
}

impl RelayState {
    pub fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn monitor(&self) -> usize {
        self.monitor_index.load(Ordering::SeqCst)
    }

    pub fn select_monitor(&self, index: usize) {
        self.monitor_index.store(index, Ordering::SeqCst);
    }
}

pub struct AppState {
    pub supervisor: SessionSupervisor,
    /// Recording defaults applied when a request omits fields.
    pub recording_defaults: RecordingConfig,
    pub frames: Arc<dyn FrameSource>,
    pub relay: RelayState,
    /// Config file settings changes are persisted to; `None` disables
    /// write-back.
    pub config_path: Option<std::path::PathBuf>,
}

impl AppState {
    pub fn registry(&self) -> &DeviceRegistry {
        self.supervisor.registry()
    }
}

//! API request/response payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use screen_hub_types::{
    DeviceInfo, RecordingCapabilities, RecordingPreset, SessionSnapshot, StorageInfo,
    TransferRecord,
};

#[derive(Serialize, ToSchema)]
pub struct DevicesResponse {
    pub devices: Vec<DeviceInfo>,
}

#[derive(Serialize, ToSchema)]
pub struct StorageResponse {
    pub device_id: String,
    #[serde(flatten)]
    pub storage: StorageInfo,
    /// Human-readable free space, when known.
    pub available_display: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CapabilitiesResponse {
    pub device_id: String,
    #[serde(flatten)]
    pub capabilities: RecordingCapabilities,
}

#[derive(Serialize, ToSchema)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSnapshot>,
}

#[derive(Serialize, ToSchema)]
pub struct PresetsResponse {
    pub presets: Vec<RecordingPreset>,
}

/// Recording start parameters; omitted fields use the server defaults.
#[derive(Default, Serialize, Deserialize, ToSchema)]
pub struct StartRecordingRequest {
    /// `WIDTHxHEIGHT`, or omitted for the device's native size.
    pub resolution: Option<String>,
    /// Bitrate in Mbps (1..=20).
    pub bitrate_mbps: Option<u32>,
    pub fps: Option<u32>,
    /// Clip length limit in minutes (device caps apply).
    pub max_time_minutes: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct StopRecordingResponse {
    /// `false` when there was no running recording to stop.
    pub stopped: bool,
    pub transfer: Option<TransferRecord>,
}

#[derive(Serialize, ToSchema)]
pub struct ScreenshotResponse {
    pub transfer: TransferRecord,
}

/// Mirroring start parameters.
#[derive(Default, Serialize, Deserialize, ToSchema)]
pub struct StartMirroringRequest {
    /// Maximum mirrored size, `WIDTHxHEIGHT`.
    pub resolution: Option<String>,
    /// Frame-rate cap.
    pub fps: Option<u32>,
    /// Engage a host virtual display (extend mode).
    #[serde(default)]
    pub extend_display: bool,
}

#[derive(Serialize, ToSchema)]
pub struct StopMirroringResponse {
    /// `false` when there was no running mirroring session to stop.
    pub stopped: bool,
}

#[derive(Serialize, ToSchema)]
pub struct WifiConnectResponse {
    /// Network serial the device is now reachable at (`host:port`).
    pub connected: String,
}

#[derive(Serialize, ToSchema)]
pub struct DisconnectResponse {
    pub disconnected: bool,
}

/// Persisted settings update.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct OutputFolderRequest {
    pub output_folder: String,
}

#[derive(Serialize, ToSchema)]
pub struct MonitorResponse {
    pub monitor_index: usize,
}

#[derive(Serialize, ToSchema)]
pub struct ShutdownResponse {
    pub stopping: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

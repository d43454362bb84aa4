use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel used when a device property could not be read.
///
/// Individual property failures degrade to this value; they never abort
/// device enumeration.
pub const UNKNOWN: &str = "unknown";

/// How a device is attached to the host bridge.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DeviceTransport {
    /// Physical USB connection.
    Usb,
    /// Network connection (`host:port` serial).
    Tcp,
}

impl DeviceTransport {
    /// Derive the transport from a device serial.
    ///
    /// Network serials always carry a `host:port` form.
    pub fn from_serial(serial: &str) -> Self {
        if serial.contains(':') {
            DeviceTransport::Tcp
        } else {
            DeviceTransport::Usb
        }
    }
}

/// Snapshot of one connected, authorized device.
///
/// Property fields fall back to [`UNKNOWN`] individually when a read fails.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeviceInfo {
    /// Stable serial reported by the bridge.
    pub id: String,
    /// USB or network attachment.
    pub transport: DeviceTransport,
    /// `ro.product.model`.
    pub model: String,
    /// `ro.product.brand`.
    pub brand: String,
    /// `ro.build.version.release`.
    pub os_version: String,
    /// `ro.build.version.sdk`, kept as reported.
    pub sdk: String,
    /// Physical screen size, `WIDTHxHEIGHT`.
    pub resolution: String,
}

impl DeviceInfo {
    /// Parsed SDK level, `None` when the property was unreadable.
    pub fn sdk_level(&self) -> Option<u32> {
        self.sdk.trim().parse().ok()
    }
}

/// Storage snapshot for a device's shared storage.
///
/// `None` fields mean the `df` output could not be parsed. Sizes are bytes
/// (the device reports kilobytes; values are scaled on parse).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StorageInfo {
    pub total_bytes: Option<u64>,
    pub used_bytes: Option<u64>,
    pub available_bytes: Option<u64>,
    pub used_percent: Option<f32>,
}

impl StorageInfo {
    pub fn is_known(&self) -> bool {
        self.total_bytes.is_some()
    }
}

/// Render a byte count in human units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{value:.1} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1} PB")
}

/// Recording capabilities derived from the device SDK level.
///
/// Pure function of the SDK integer; never persisted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecordingCapabilities {
    /// `true` when the on-device `screenrecord` tool exists (SDK >= 19).
    pub screenrecord: bool,
    /// Container formats the device can produce.
    pub supported_formats: Vec<String>,
    /// Ceiling for the user-facing bitrate setting, in Mbps.
    pub max_bitrate_mbps: u32,
    /// Ceiling for a single clip, in seconds.
    pub max_duration_secs: u32,
    /// Internal audio capture available (SDK >= 29).
    pub has_audio: bool,
}

impl RecordingCapabilities {
    /// Derive the profile for an SDK level.
    ///
    /// A missing or unparsable SDK yields the conservative profile
    /// (mp4-only, no audio).
    pub fn for_sdk(sdk: Option<u32>) -> Self {
        let sdk = sdk.unwrap_or(0);
        Self {
            screenrecord: sdk >= 19,
            supported_formats: vec!["mp4".to_string()],
            max_bitrate_mbps: if sdk >= 21 { 20 } else { 8 },
            max_duration_secs: 180,
            has_audio: sdk >= 29,
        }
    }
}

/// User-facing recording parameters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecordingConfig {
    /// `WIDTHxHEIGHT`, or `None` for the device's native size.
    pub resolution: Option<String>,
    /// Bitrate in Mbps (1..=20). Converted to an absolute bit rate for the
    /// device command.
    pub bitrate_mbps: u32,
    /// Target frame rate.
    pub fps: u32,
    /// Hard recording limit in seconds.
    pub time_limit_secs: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            resolution: None,
            bitrate_mbps: 8,
            fps: 30,
            time_limit_secs: 180,
        }
    }
}

/// Named recording configuration offered to clients as a starting point.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecordingPreset {
    pub name: String,
    pub description: String,
    pub config: RecordingConfig,
}

impl RecordingPreset {
    fn new(name: &str, description: &str, config: RecordingConfig) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            config,
        }
    }

    /// Built-in presets covering the common quality/size trade-offs.
    pub fn builtin() -> Vec<Self> {
        vec![
            Self::new(
                "high-quality",
                "Best quality, large files",
                RecordingConfig {
                    resolution: Some("1920x1080".to_string()),
                    bitrate_mbps: 12,
                    fps: 30,
                    time_limit_secs: 180,
                },
            ),
            Self::new(
                "balanced",
                "Good quality, balanced size",
                RecordingConfig {
                    resolution: Some("1280x720".to_string()),
                    bitrate_mbps: 8,
                    fps: 30,
                    time_limit_secs: 180,
                },
            ),
            Self::new(
                "compact",
                "Lower quality, small files",
                RecordingConfig {
                    resolution: Some("854x480".to_string()),
                    bitrate_mbps: 4,
                    fps: 24,
                    time_limit_secs: 180,
                },
            ),
            Self::new(
                "streaming",
                "Smooth motion for live relays",
                RecordingConfig {
                    resolution: Some("1280x720".to_string()),
                    bitrate_mbps: 6,
                    fps: 60,
                    time_limit_secs: 180,
                },
            ),
            Self::new(
                "demo",
                "Full-HD walkthroughs and tutorials",
                RecordingConfig {
                    resolution: Some("1920x1080".to_string()),
                    bitrate_mbps: 8,
                    fps: 24,
                    time_limit_secs: 180,
                },
            ),
        ]
    }
}

/// Mirroring parameters.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MirrorConfig {
    /// Maximum mirrored dimension, `WIDTHxHEIGHT` (the larger side is
    /// passed to the tool), or `None` for native.
    pub resolution: Option<String>,
    /// Frame-rate cap, or `None` for the tool default.
    pub fps: Option<u32>,
    /// Engage a host virtual display for extend mode.
    #[serde(default)]
    pub extend_display: bool,
}

/// Kind of exclusive per-device operation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Recording,
    Mirroring,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Recording => f.write_str("recording"),
            SessionKind::Mirroring => f.write_str("mirroring"),
        }
    }
}

/// Session lifecycle states.
///
/// `Completed` and `Failed` are terminal; the session entry is discarded
/// once terminal cleanup finishes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Never held by a live session entry: a device with no entry is idle.
    /// Present so API clients can render the full lifecycle.
    Idle,
    Starting,
    Running,
    Stopping,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

/// Serializable view of an active session for API responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SessionSnapshot {
    /// Stable session id (`sess:<uuid>`).
    pub id: String,
    /// Target device serial.
    pub device_id: String,
    pub kind: SessionKind,
    pub state: SessionState,
    /// Unix millis at start-request time.
    pub started_at_ms: i64,
    /// On-device artifact path (recording only).
    pub remote_path: Option<String>,
    /// Local destination path (recording only).
    pub local_path: Option<String>,
}

/// Result of one pull attempt.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferOutcome {
    /// Pull finished and the local file exists.
    Completed {
        bytes: u64,
        /// Set when the local file is implausibly small (< 1 KB). Warning
        /// only; tiny captures can be legitimate.
        possibly_corrupt: bool,
    },
    /// Pull exited nonzero.
    Failed { detail: String },
    /// Pull did not finish within the transfer timeout.
    TimedOut,
    /// Pull reported success but produced no local file.
    Incomplete,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Completed { .. })
    }
}

/// Ephemeral record of one remote-to-local transfer, including the
/// unconditional remote cleanup that follows it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TransferRecord {
    pub remote_path: String,
    pub local_path: String,
    /// Size reported by the device before the pull, when known.
    pub expected_bytes: Option<u64>,
    pub outcome: TransferOutcome,
    /// Whether the remote copy was removed afterwards.
    pub remote_removed: bool,
}

/// Session-lifecycle failures surfaced to callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionError {
    /// Bridge binary missing or not executable.
    BridgeUnavailable,
    /// Device not present in the current enumeration.
    DeviceNotFound { device_id: String },
    /// Device lacks a required shell command.
    CapabilityUnsupported { detail: String },
    /// Device already holds an active session.
    SessionConflict {
        device_id: String,
        kind: SessionKind,
    },
    /// Subprocess could not be spawned or died during the grace period.
    ProcessStartFailed { detail: String },
    /// Graceful stop exceeded its bound.
    ProcessTimeout,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::BridgeUnavailable => f.write_str("device bridge is not available"),
            SessionError::DeviceNotFound { device_id } => {
                write!(f, "device {device_id} not found")
            }
            SessionError::CapabilityUnsupported { detail } => {
                write!(f, "capability unsupported: {detail}")
            }
            SessionError::SessionConflict { device_id, kind } => {
                write!(f, "device {device_id} already has an active {kind} session")
            }
            SessionError::ProcessStartFailed { detail } => {
                write!(f, "process start failed: {detail}")
            }
            SessionError::ProcessTimeout => f.write_str("process did not stop within its bound"),
        }
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_from_serial() {
        assert_eq!(
            DeviceTransport::from_serial("ABC123"),
            DeviceTransport::Usb
        );
        assert_eq!(
            DeviceTransport::from_serial("192.168.0.12:5555"),
            DeviceTransport::Tcp
        );
    }

    #[test]
    fn builtin_presets_stay_within_device_limits() {
        let presets = RecordingPreset::builtin();
        assert!(!presets.is_empty());
        for preset in &presets {
            assert!(
                (1..=20).contains(&preset.config.bitrate_mbps),
                "{}",
                preset.name
            );
            assert!(preset.config.time_limit_secs <= 180, "{}", preset.name);
            assert!(preset.config.resolution.is_some(), "{}", preset.name);
        }
        let names: Vec<_> = presets.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"balanced"));
    }

    #[test]
    fn capabilities_follow_sdk_boundaries() {
        let table = [
            (None, false, 8, false),
            (Some(18), false, 8, false),
            (Some(19), true, 8, false),
            (Some(20), true, 8, false),
            (Some(21), true, 20, false),
            (Some(28), true, 20, false),
            (Some(29), true, 20, true),
        ];
        for (sdk, screenrecord, max_bitrate, audio) in table {
            let caps = RecordingCapabilities::for_sdk(sdk);
            assert_eq!(caps.screenrecord, screenrecord, "sdk {sdk:?}");
            assert_eq!(caps.max_bitrate_mbps, max_bitrate, "sdk {sdk:?}");
            assert_eq!(caps.has_audio, audio, "sdk {sdk:?}");
            assert_eq!(caps.max_duration_secs, 180, "sdk {sdk:?}");
            assert_eq!(caps.supported_formats, vec!["mp4".to_string()]);
        }
    }

    #[test]
    fn unparsable_sdk_is_conservative() {
        let info = DeviceInfo {
            id: "ABC".to_string(),
            transport: DeviceTransport::Usb,
            model: UNKNOWN.to_string(),
            brand: UNKNOWN.to_string(),
            os_version: UNKNOWN.to_string(),
            sdk: UNKNOWN.to_string(),
            resolution: UNKNOWN.to_string(),
        };
        assert_eq!(info.sdk_level(), None);
        assert!(!RecordingCapabilities::for_sdk(info.sdk_level()).has_audio);
    }

    #[test]
    fn format_bytes_scales_units() {
        assert_eq!(format_bytes(512), "512.0 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn transfer_outcome_success_flag() {
        assert!(
            TransferOutcome::Completed {
                bytes: 4096,
                possibly_corrupt: false
            }
            .is_success()
        );
        assert!(!TransferOutcome::TimedOut.is_success());
        assert!(!TransferOutcome::Incomplete.is_success());
    }
}

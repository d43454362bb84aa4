//! Device registry.
//!
//! Produces point-in-time snapshots of connected devices enriched with
//! derived attributes. Every individual property fetch degrades on its own;
//! a flaky `getprop` never discards the device.

use std::sync::Arc;
use std::time::Duration;

use screen_hub_types::{DeviceInfo, RecordingCapabilities, StorageInfo, UNKNOWN};

use crate::adb::AdbClient;

const SHELL_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Snapshot provider for connected devices.
#[derive(Clone)]
pub struct DeviceRegistry {
    adb: Arc<AdbClient>,
}

impl DeviceRegistry {
    pub fn new(adb: Arc<AdbClient>) -> Self {
        Self { adb }
    }

    pub fn adb(&self) -> &Arc<AdbClient> {
        &self.adb
    }

    /// Enumerate authorized devices and enrich each with static properties.
    pub async fn refresh(&self) -> Vec<DeviceInfo> {
        let mut devices = Vec::new();
        for entry in self.adb.list_devices().await {
            let id = entry.serial;
            let model = self.adb.get_property(&id, "ro.product.model").await;
            let brand = self.adb.get_property(&id, "ro.product.brand").await;
            let os_version = self.adb.get_property(&id, "ro.build.version.release").await;
            let sdk = self.adb.get_property(&id, "ro.build.version.sdk").await;
            let resolution = self.screen_resolution(&id).await;
            devices.push(DeviceInfo {
                id,
                transport: entry.transport,
                model,
                brand,
                os_version,
                sdk,
                resolution,
            });
        }
        tracing::debug!(count = devices.len(), "device registry refreshed");
        devices
    }

    /// Physical screen size via `wm size`, or `"unknown"`.
    pub async fn screen_resolution(&self, device_id: &str) -> String {
        let result = self
            .adb
            .run_shell(device_id, &["wm", "size"], SHELL_TIMEOUT)
            .await;
        match result {
            Ok(output) if output.success() => {
                parse_wm_size(&output.stdout).unwrap_or_else(|| UNKNOWN.to_string())
            }
            _ => UNKNOWN.to_string(),
        }
    }

    /// Shared-storage snapshot from `df /sdcard`.
    ///
    /// Malformed output yields an all-unknown record, never an error.
    pub async fn storage_info(&self, device_id: &str) -> StorageInfo {
        let result = self
            .adb
            .run_shell(device_id, &["df", "/sdcard"], SHELL_TIMEOUT)
            .await;
        match result {
            Ok(output) if output.success() => parse_df(&output.stdout),
            _ => StorageInfo::default(),
        }
    }

    /// Recording capability profile for a device, derived from its SDK level.
    pub async fn capabilities(&self, device_id: &str) -> RecordingCapabilities {
        let sdk = self.adb.get_property(device_id, "ro.build.version.sdk").await;
        RecordingCapabilities::for_sdk(sdk.trim().parse().ok())
    }

    /// Probe whether the on-device `screenrecord` tool exists.
    pub async fn supports_screenrecord(&self, device_id: &str) -> bool {
        match self
            .adb
            .run_shell(device_id, &["which", "screenrecord"], PROBE_TIMEOUT)
            .await
        {
            Ok(output) => output.success() && !output.stdout.trim().is_empty(),
            Err(_) => false,
        }
    }
}

/// Parse `wm size` output of the form `Physical size: 1920x1080`.
fn parse_wm_size(stdout: &str) -> Option<String> {
    for line in stdout.lines() {
        let value = match line.split_once(':') {
            Some((_, rest)) => rest.trim(),
            None => line.trim(),
        };
        if let Some((w, h)) = value.split_once('x') {
            if w.chars().all(|c| c.is_ascii_digit())
                && h.chars().all(|c| c.is_ascii_digit())
                && !w.is_empty()
                && !h.is_empty()
            {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Parse a single-row `df` result. The device reports kilobytes; fields are
/// scaled to bytes here.
fn parse_df(stdout: &str) -> StorageInfo {
    let Some(row) = stdout.lines().nth(1) else {
        return StorageInfo::default();
    };
    let fields: Vec<&str> = row.split_whitespace().collect();
    if fields.len() < 4 {
        return StorageInfo::default();
    }
    let total_kb: u64 = match fields[1].parse() {
        Ok(v) => v,
        Err(_) => return StorageInfo::default(),
    };
    let used_kb: u64 = match fields[2].parse() {
        Ok(v) => v,
        Err(_) => return StorageInfo::default(),
    };
    let available_kb: u64 = match fields[3].parse() {
        Ok(v) => v,
        Err(_) => return StorageInfo::default(),
    };
    let used_percent = if total_kb > 0 {
        Some(used_kb as f32 / total_kb as f32 * 100.0)
    } else {
        None
    };
    StorageInfo {
        total_bytes: Some(total_kb * 1024),
        used_bytes: Some(used_kb * 1024),
        available_bytes: Some(available_kb * 1024),
        used_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_wm_size_accepts_physical_size() {
        assert_eq!(
            parse_wm_size("Physical size: 1920x1080\n").as_deref(),
            Some("1920x1080")
        );
        assert_eq!(
            parse_wm_size("Physical size: 1080x2400\nOverride size: 720x1600\n").as_deref(),
            Some("1080x2400")
        );
    }

    #[test]
    fn parse_wm_size_rejects_garbage() {
        assert_eq!(parse_wm_size("error: no devices found"), None);
        assert_eq!(parse_wm_size("Physical size: axb"), None);
        assert_eq!(parse_wm_size(""), None);
    }

    #[test]
    fn parse_df_converts_kilobytes_to_bytes() {
        let stdout = "Filesystem      1K-blocks     Used Available Use% Mounted on\n\
                      /dev/fuse       115609964 22031432  93460372  20% /storage/emulated\n";
        let info = parse_df(stdout);
        assert_eq!(info.total_bytes, Some(115609964 * 1024));
        assert_eq!(info.used_bytes, Some(22031432 * 1024));
        assert_eq!(info.available_bytes, Some(93460372 * 1024));
        let percent = info.used_percent.expect("percent");
        assert!((percent - 19.06).abs() < 0.1, "got {percent}");
    }

    #[test]
    fn parse_df_degrades_on_short_rows() {
        assert_eq!(parse_df("df: /sdcard: No such file or directory\n"), StorageInfo::default());
        assert_eq!(
            parse_df("Filesystem 1K-blocks\n/dev/fuse 123\n"),
            StorageInfo::default()
        );
        assert_eq!(
            parse_df("Filesystem 1K-blocks Used Available\n/dev/fuse abc def ghi\n"),
            StorageInfo::default()
        );
        assert_eq!(parse_df(""), StorageInfo::default());
    }

    #[tokio::test]
    async fn refresh_with_missing_bridge_is_empty() {
        let registry = DeviceRegistry::new(Arc::new(AdbClient::with_program(
            "/nonexistent/path/to/adb",
        )));
        assert!(registry.refresh().await.is_empty());
        assert_eq!(registry.storage_info("ABC").await, StorageInfo::default());
        assert!(!registry.supports_screenrecord("ABC").await);
    }
}

//! Device bridge command execution.
//!
//! Single point of contact with the `adb` binary: path resolution, bounded
//! synchronous queries, and file transfer. Callers own retry policy; this
//! layer never retries.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::process::Command;
use tokio::time::timeout;

use screen_hub_types::{DeviceTransport, UNKNOWN};

const VERSION_TIMEOUT: Duration = Duration::from_secs(5);
const LIST_TIMEOUT: Duration = Duration::from_secs(10);
const PROPERTY_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const TCPIP_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a bridge command produced no output at all.
///
/// A nonzero exit is not an `ExecError`; it lands in
/// [`CommandOutput::exit_code`].
#[derive(Debug)]
pub enum ExecError {
    /// Deadline elapsed before the command finished.
    TimedOut { after: Duration },
    /// The process could not be spawned.
    Spawn(std::io::Error),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::TimedOut { after } => write!(f, "command timed out after {after:?}"),
            ExecError::Spawn(e) => write!(f, "command could not be spawned: {e}"),
        }
    }
}

impl std::error::Error for ExecError {}

/// Captured result of one bridge command.
#[derive(Clone, Debug)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Raw `devices -l` entry for an authorized, online device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceEntry {
    pub serial: String,
    pub transport: DeviceTransport,
}

/// Thin client around the device-bridge binary.
///
/// The binary path is resolved once at construction and cached for the
/// process lifetime: a bundled `platform-tools` copy next to the running
/// executable wins over whatever the search path provides.
#[derive(Clone, Debug)]
pub struct AdbClient {
    program: PathBuf,
    bundled: bool,
}

impl AdbClient {
    /// Resolve the bridge binary location.
    pub fn resolve() -> Self {
        let bundled = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("platform-tools")))
            .map(|dir| {
                if cfg!(windows) {
                    dir.join("adb.exe")
                } else {
                    dir.join("adb")
                }
            })
            .filter(|path| path.exists());
        match bundled {
            Some(path) => {
                tracing::info!(adb = %path.display(), "using bundled device bridge");
                Self {
                    program: path,
                    bundled: true,
                }
            }
            None => Self {
                program: PathBuf::from("adb"),
                bundled: false,
            },
        }
    }

    /// Build a client around an explicit binary path (tests, overrides).
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            bundled: false,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn is_bundled(&self) -> bool {
        self.bundled
    }

    /// Run one bridge command with a hard deadline.
    ///
    /// Spawn failures and timeouts surface as [`ExecError`]; a nonzero exit
    /// is a successful execution and lands in `exit_code`.
    pub async fn run(&self, args: &[&str], deadline: Duration) -> Result<CommandOutput, ExecError> {
        let output = timeout(
            deadline,
            Command::new(&self.program)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ExecError::TimedOut { after: deadline })?
        .map_err(ExecError::Spawn)?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Probe the bridge binary with a version query.
    ///
    /// Returns `false` on any execution failure: not found, timeout, or
    /// nonzero exit.
    pub async fn is_available(&self) -> bool {
        match self.run(&["version"], VERSION_TIMEOUT).await {
            Ok(output) => output.success(),
            Err(_) => false,
        }
    }

    /// List authorized, online devices.
    ///
    /// Unauthorized and offline entries are excluded from the result, not
    /// reported as errors. A missing bridge yields an empty list.
    pub async fn list_devices(&self) -> Vec<DeviceEntry> {
        match self.run(&["devices", "-l"], LIST_TIMEOUT).await {
            Ok(output) if output.success() => parse_device_list(&output.stdout),
            Ok(output) => {
                tracing::warn!(stderr = %output.stderr.trim(), "device list query failed");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "device list query failed");
                Vec::new()
            }
        }
    }

    /// Read one system property, degrading to the `"unknown"` sentinel.
    pub async fn get_property(&self, device_id: &str, key: &str) -> String {
        let result = self
            .run(&["-s", device_id, "shell", "getprop", key], PROPERTY_TIMEOUT)
            .await;
        match result {
            Ok(output) if output.success() => {
                let value = output.stdout.trim();
                if value.is_empty() {
                    UNKNOWN.to_string()
                } else {
                    value.to_string()
                }
            }
            _ => UNKNOWN.to_string(),
        }
    }

    /// Run an arbitrary shell command on a device.
    pub async fn run_shell(
        &self,
        device_id: &str,
        shell_args: &[&str],
        deadline: Duration,
    ) -> Result<CommandOutput, ExecError> {
        let mut args = vec!["-s", device_id, "shell"];
        args.extend_from_slice(shell_args);
        self.run(&args, deadline).await
    }

    /// Push a local file to the device.
    pub async fn push(
        &self,
        device_id: &str,
        local: &Path,
        remote: &str,
        deadline: Duration,
    ) -> Result<CommandOutput, ExecError> {
        let local = local.to_str().ok_or_else(|| non_utf8_path(local))?;
        self.run(&["-s", device_id, "push", local, remote], deadline)
            .await
    }

    /// Pull a remote file to local storage.
    pub async fn pull(
        &self,
        device_id: &str,
        remote: &str,
        local: &Path,
        deadline: Duration,
    ) -> Result<CommandOutput, ExecError> {
        let local = local.to_str().ok_or_else(|| non_utf8_path(local))?;
        self.run(&["-s", device_id, "pull", remote, local], deadline)
            .await
    }

    /// Connect to a device over the network.
    ///
    /// The bridge exits zero even on refusal; success is judged by the
    /// `connected` marker in its output.
    pub async fn connect(&self, host: &str, port: u16) -> Result<()> {
        let target = format!("{host}:{port}");
        let output = self.run(&["connect", &target], CONNECT_TIMEOUT).await?;
        if output.stdout.to_ascii_lowercase().contains("connected") {
            Ok(())
        } else {
            Err(anyhow!("connect {target} failed: {}", output.stdout.trim()))
        }
    }

    /// Disconnect a network device.
    pub async fn disconnect(&self, device_id: &str) -> bool {
        self.run(&["disconnect", device_id], TCPIP_TIMEOUT)
            .await
            .map(|output| output.success())
            .unwrap_or(false)
    }

    /// Switch a USB-attached device to TCP listening mode.
    pub async fn tcpip(&self, device_id: &str, port: u16) -> Result<()> {
        let port = port.to_string();
        let output = self
            .run(&["-s", device_id, "tcpip", &port], TCPIP_TIMEOUT)
            .await?;
        if output.success() {
            Ok(())
        } else {
            Err(anyhow!("tcpip failed: {}", output.stderr.trim()))
        }
    }

    /// Best-effort Wi-Fi address of a device, for network reconnection.
    pub async fn device_ip(&self, device_id: &str) -> Option<String> {
        let output = self
            .run_shell(
                device_id,
                &["ip", "addr", "show", "wlan0"],
                PROPERTY_TIMEOUT,
            )
            .await
            .ok()?;
        if !output.success() {
            return None;
        }
        parse_inet_addr(&output.stdout)
    }
}

fn non_utf8_path(path: &Path) -> ExecError {
    ExecError::Spawn(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("non-UTF-8 path {path:?}"),
    ))
}

/// Parse `devices -l` output, keeping only lines whose state token is
/// exactly `device`.
fn parse_device_list(stdout: &str) -> Vec<DeviceEntry> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let serial = fields.next()?;
            let state = fields.next()?;
            if state != "device" {
                return None;
            }
            Some(DeviceEntry {
                serial: serial.to_string(),
                transport: DeviceTransport::from_serial(serial),
            })
        })
        .collect()
}

/// Pull the first `inet a.b.c.d/prefix` address out of `ip addr` output.
fn parse_inet_addr(stdout: &str) -> Option<String> {
    for line in stdout.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("inet ") {
            let addr = rest.split('/').next()?.trim();
            if addr.split('.').count() == 4 {
                return Some(addr.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_device_list_keeps_only_online_devices() {
        let stdout = "List of devices attached\n\
                      ABC123\tdevice usb:1-1 product:foo model:Pixel_7 device:panther\n\
                      DEF456\tunauthorized usb:1-2\n\
                      GHI789\toffline\n\
                      192.168.0.12:5555\tdevice product:bar model:Tab_S8\n";
        let entries = parse_device_list(stdout);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].serial, "ABC123");
        assert_eq!(entries[0].transport, DeviceTransport::Usb);
        assert_eq!(entries[1].serial, "192.168.0.12:5555");
        assert_eq!(entries[1].transport, DeviceTransport::Tcp);
    }

    #[test]
    fn parse_device_list_handles_empty_output() {
        assert!(parse_device_list("List of devices attached\n").is_empty());
        assert!(parse_device_list("").is_empty());
    }

    #[test]
    fn parse_inet_addr_finds_wlan_address() {
        let stdout = "30: wlan0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500\n\
                      \tinet 192.168.1.42/24 brd 192.168.1.255 scope global wlan0\n\
                      \tinet6 fe80::1/64 scope link\n";
        assert_eq!(parse_inet_addr(stdout).as_deref(), Some("192.168.1.42"));
        assert_eq!(parse_inet_addr("no addresses here"), None);
    }

    #[test]
    fn explicit_program_is_not_bundled() {
        let client = AdbClient::with_program("adb");
        assert!(!client.is_bundled());
        assert_eq!(client.program(), Path::new("adb"));
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable_and_lists_nothing() {
        let client = AdbClient::with_program("/nonexistent/path/to/adb");
        assert!(!client.is_available().await);
        assert!(client.list_devices().await.is_empty());
        assert_eq!(client.get_property("ABC", "ro.product.model").await, UNKNOWN);
    }
}

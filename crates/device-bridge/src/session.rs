//! Session supervisor.
//!
//! Owns the one-session-per-device invariant and the lifecycle of every
//! recording and mirroring session. A single coarse mutex guards the session
//! map; the guard is never held across an await. Slot claim happens before
//! any device command, so two concurrent starts for the same device race on
//! the map, not on the device.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use screen_hub_types::{
    MirrorConfig, RecordingConfig, SessionError, SessionKind, SessionSnapshot, SessionState,
    TransferRecord, format_bytes,
};

use crate::adb::{AdbClient, ExecError};
use crate::registry::DeviceRegistry;
use crate::transfer::ArtifactTransfer;
use crate::virtual_display::VirtualDisplay;

/// Grace before a recorder is considered to have started.
const RECORD_START_GRACE: Duration = Duration::from_secs(1);
/// Grace before a mirroring tool is considered live.
const MIRROR_START_GRACE: Duration = Duration::from_secs(2);
/// Bound on waiting for a child to exit after a stop signal.
const STOP_WAIT: Duration = Duration::from_secs(10);
/// Delay after recorder exit for the device to flush the container.
const SETTLE_DELAY: Duration = Duration::from_secs(2);
const SHELL_TIMEOUT: Duration = Duration::from_secs(10);
const PUSH_TIMEOUT: Duration = Duration::from_secs(30);
const SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(15);
/// Below this free space a recording start is logged as risky but allowed.
const LOW_STORAGE_BYTES: u64 = 100 * 1024 * 1024;
const TEST_RECORDING_SECS: u32 = 10;
const SCRCPY_REMOTE_PAYLOAD: &str = "/data/local/tmp/scrcpy-server";

struct ActiveSession {
    id: String,
    device_id: String,
    kind: SessionKind,
    state: SessionState,
    started_at_ms: i64,
    remote_path: Option<String>,
    local_path: Option<String>,
    child: Option<Child>,
    display_engaged: bool,
}

impl ActiveSession {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            device_id: self.device_id.clone(),
            kind: self.kind,
            state: self.state,
            started_at_ms: self.started_at_ms,
            remote_path: self.remote_path.clone(),
            local_path: self.local_path.clone(),
        }
    }
}

struct ScrcpyTools {
    binary: PathBuf,
    payload: PathBuf,
}

struct Inner {
    adb: Arc<AdbClient>,
    registry: DeviceRegistry,
    transfer: ArtifactTransfer,
    display: Arc<dyn VirtualDisplay>,
    output_dir: PathBuf,
    scrcpy_dir: Option<PathBuf>,
    sessions: Mutex<HashMap<String, ActiveSession>>,
}

/// Cheap-to-clone handle; monitor tasks hold one to report unsolicited
/// tool failures back through the normal stop path.
#[derive(Clone)]
pub struct SessionSupervisor {
    inner: Arc<Inner>,
}

impl SessionSupervisor {
    pub fn new(
        adb: Arc<AdbClient>,
        display: Arc<dyn VirtualDisplay>,
        output_dir: PathBuf,
        scrcpy_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: DeviceRegistry::new(adb.clone()),
                transfer: ArtifactTransfer::new(adb.clone()),
                adb,
                display,
                output_dir,
                scrcpy_dir,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.inner.registry
    }

    /// Snapshots of every live session.
    pub fn sessions(&self) -> Vec<SessionSnapshot> {
        self.inner
            .sessions
            .lock()
            .unwrap()
            .values()
            .map(ActiveSession::snapshot)
            .collect()
    }

    pub fn session_for(&self, device_id: &str) -> Option<SessionSnapshot> {
        self.inner
            .sessions
            .lock()
            .unwrap()
            .get(device_id)
            .map(ActiveSession::snapshot)
    }

    /// Start a screen recording on a device.
    pub async fn start_recording(
        &self,
        device_id: &str,
        cfg: RecordingConfig,
    ) -> Result<SessionSnapshot, SessionError> {
        self.ensure_device(device_id).await?;
        self.claim_slot(device_id, SessionKind::Recording)?;
        match self.launch_recording(device_id, cfg).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                self.discard_slot(device_id);
                Err(e)
            }
        }
    }

    /// Same lifecycle as [`start_recording`](Self::start_recording) with a
    /// short fixed clip length, for verifying a device end to end.
    pub async fn start_test_recording(
        &self,
        device_id: &str,
        mut cfg: RecordingConfig,
    ) -> Result<SessionSnapshot, SessionError> {
        cfg.time_limit_secs = TEST_RECORDING_SECS;
        self.start_recording(device_id, cfg).await
    }

    /// Stop a running recording, pull the artifact, and clean up.
    ///
    /// Returns `None` when there is nothing to stop: unknown device, wrong
    /// session kind, or a stop already in flight. The session slot is
    /// removed whether or not the artifact survived.
    pub async fn stop_recording(&self, device_id: &str) -> Option<TransferRecord> {
        let (child, remote, local) = {
            let mut sessions = self.inner.sessions.lock().unwrap();
            let entry = sessions.get_mut(device_id)?;
            if entry.kind != SessionKind::Recording || entry.state != SessionState::Running {
                return None;
            }
            entry.state = SessionState::Stopping;
            (
                entry.child.take(),
                entry.remote_path.clone()?,
                entry.local_path.clone()?,
            )
        };

        // The on-device recorder is a separate process from our bridge
        // child; SIGINT makes it finalize the container.
        match self
            .inner
            .adb
            .run_shell(device_id, &["pkill", "-SIGINT", "screenrecord"], SHELL_TIMEOUT)
            .await
        {
            Ok(output) if output.success() => {}
            Ok(output) => {
                tracing::warn!(
                    device_id = %device_id,
                    stderr = %output.stderr.trim(),
                    "recorder signal returned nonzero"
                );
            }
            Err(e) => {
                tracing::warn!(device_id = %device_id, error = %e, "recorder signal failed");
            }
        }

        if let Some(mut child) = child {
            if timeout(STOP_WAIT, child.wait()).await.is_err() {
                tracing::warn!(device_id = %device_id, "recorder bridge process hung; killing");
                let _ = child.kill().await;
            }
        }
        sleep(SETTLE_DELAY).await;

        let expected = self.remote_size(device_id, &remote).await;
        let record = self
            .inner
            .transfer
            .pull_and_clean(device_id, &remote, Path::new(&local), expected)
            .await;
        let state = if record.outcome.is_success() {
            SessionState::Completed
        } else {
            SessionState::Failed
        };
        tracing::info!(device_id = %device_id, state = ?state, "recording session finished");
        self.discard_slot(device_id);
        Some(record)
    }

    /// One-shot screenshot; no session entry is created.
    pub async fn take_screenshot(&self, device_id: &str) -> Result<TransferRecord, SessionError> {
        self.ensure_device(device_id).await?;
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let name = format!("screenshot_{stamp}.png");
        let remote = format!("/sdcard/{name}");
        let output = self
            .inner
            .adb
            .run_shell(device_id, &["screencap", "-p", &remote], SCREENSHOT_TIMEOUT)
            .await
            .map_err(exec_to_session_error)?;
        if !output.success() {
            return Err(SessionError::ProcessStartFailed {
                detail: format!("screencap: {}", output.stderr.trim()),
            });
        }
        let local = self.inner.output_dir.join(name);
        Ok(self
            .inner
            .transfer
            .pull_and_clean(device_id, &remote, &local, None)
            .await)
    }

    /// Start mirroring a device to the host.
    ///
    /// Local tooling is verified before any device command runs, so a
    /// misconfigured host never leaves state on the device.
    pub async fn start_mirroring(
        &self,
        device_id: &str,
        cfg: MirrorConfig,
    ) -> Result<SessionSnapshot, SessionError> {
        let tools = self.locate_scrcpy()?;
        self.ensure_device(device_id).await?;
        self.claim_slot(device_id, SessionKind::Mirroring)?;
        match self.launch_mirroring(device_id, cfg, tools).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                self.discard_slot(device_id);
                Err(e)
            }
        }
    }

    /// Stop a running mirroring session. Returns `false` when there was
    /// nothing to stop; safe to call twice.
    pub async fn stop_mirroring(&self, device_id: &str) -> bool {
        let (child, display_engaged) = {
            let mut sessions = self.inner.sessions.lock().unwrap();
            let Some(entry) = sessions.get_mut(device_id) else {
                return false;
            };
            if entry.kind != SessionKind::Mirroring || entry.state != SessionState::Running {
                return false;
            }
            entry.state = SessionState::Stopping;
            (entry.child.take(), entry.display_engaged)
        };

        if let Some(mut child) = child {
            if !request_terminate(&child) {
                if let Err(e) = child.start_kill() {
                    tracing::warn!(device_id = %device_id, error = %e, "mirroring stop signal failed");
                }
            }
            if timeout(STOP_WAIT, child.wait()).await.is_err() {
                tracing::warn!(device_id = %device_id, "mirroring tool ignored terminate; killing");
                let _ = child.kill().await;
            }
        }
        if display_engaged {
            if let Err(e) = self.inner.display.release() {
                tracing::warn!(device_id = %device_id, error = %e, "virtual display teardown failed");
            }
        }
        self.inner.sessions.lock().unwrap().remove(device_id);
        tracing::info!(device_id = %device_id, "mirroring session stopped");
        true
    }

    async fn launch_recording(
        &self,
        device_id: &str,
        cfg: RecordingConfig,
    ) -> Result<SessionSnapshot, SessionError> {
        if !self.inner.registry.supports_screenrecord(device_id).await {
            return Err(SessionError::CapabilityUnsupported {
                detail: "screenrecord tool not present on device".to_string(),
            });
        }
        let storage = self.inner.registry.storage_info(device_id).await;
        if let Some(available) = storage.available_bytes {
            if available < LOW_STORAGE_BYTES {
                tracing::warn!(
                    device_id = %device_id,
                    available = %format_bytes(available),
                    "device storage low; recording may truncate"
                );
            }
        }

        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let name = format!("screenrecord_{stamp}.mp4");
        let remote = format!("/sdcard/{name}");
        let local = self.inner.output_dir.join(&name);

        let shell_args = screenrecord_args(&cfg, &remote);
        let mut child = Command::new(self.inner.adb.program())
            .args(["-s", device_id, "shell"])
            .args(&shell_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SessionError::ProcessStartFailed {
                detail: format!("spawn screenrecord: {e}"),
            })?;

        sleep(RECORD_START_GRACE).await;
        if let Ok(Some(status)) = child.try_wait() {
            let detail = drain_stderr(&mut child).await;
            return Err(SessionError::ProcessStartFailed {
                detail: format!("screenrecord exited during startup ({status}): {detail}"),
            });
        }

        let mut sessions = self.inner.sessions.lock().unwrap();
        let entry = sessions
            .get_mut(device_id)
            .ok_or(SessionError::ProcessStartFailed {
                detail: "session slot vanished during startup".to_string(),
            })?;
        entry.state = SessionState::Running;
        entry.remote_path = Some(remote);
        entry.local_path = Some(local.display().to_string());
        entry.child = Some(child);
        tracing::info!(
            device_id = %device_id,
            session_id = %entry.id,
            remote = %entry.remote_path.as_deref().unwrap_or_default(),
            "recording started"
        );
        Ok(entry.snapshot())
    }

    async fn launch_mirroring(
        &self,
        device_id: &str,
        cfg: MirrorConfig,
        tools: ScrcpyTools,
    ) -> Result<SessionSnapshot, SessionError> {
        if cfg.extend_display {
            self.inner
                .display
                .engage()
                .map_err(|e| SessionError::CapabilityUnsupported {
                    detail: e.to_string(),
                })?;
            if let Some(entry) = self.inner.sessions.lock().unwrap().get_mut(device_id) {
                entry.display_engaged = true;
            }
        }

        let push = self
            .inner
            .adb
            .push(device_id, &tools.payload, SCRCPY_REMOTE_PAYLOAD, PUSH_TIMEOUT)
            .await
            .map_err(exec_to_session_error)?;
        if !push.success() {
            return Err(SessionError::ProcessStartFailed {
                detail: format!("push mirroring payload: {}", push.stderr.trim()),
            });
        }
        let chmod = self
            .inner
            .adb
            .run_shell(
                device_id,
                &["chmod", "777", SCRCPY_REMOTE_PAYLOAD],
                SHELL_TIMEOUT,
            )
            .await
            .map_err(exec_to_session_error)?;
        if !chmod.success() {
            return Err(SessionError::ProcessStartFailed {
                detail: format!("chmod mirroring payload: {}", chmod.stderr.trim()),
            });
        }

        let args = scrcpy_args(device_id, &cfg);
        let mut child = Command::new(&tools.binary)
            .args(&args)
            .env("ADB", self.inner.adb.program())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SessionError::ProcessStartFailed {
                detail: format!("spawn {}: {e}", tools.binary.display()),
            })?;

        // The tool reports fatal conditions as `ERROR:` lines on either
        // stream; a hit triggers the normal stop path. The tasks end on
        // their own when the pipes close.
        if let Some(stdout) = child.stdout.take() {
            self.spawn_output_monitor(device_id, "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            self.spawn_output_monitor(device_id, "stderr", stderr);
        }

        sleep(MIRROR_START_GRACE).await;
        if let Ok(Some(status)) = child.try_wait() {
            return Err(SessionError::ProcessStartFailed {
                detail: format!("mirroring tool exited during startup ({status})"),
            });
        }

        let mut sessions = self.inner.sessions.lock().unwrap();
        let entry = sessions
            .get_mut(device_id)
            .ok_or(SessionError::ProcessStartFailed {
                detail: "session slot vanished during startup".to_string(),
            })?;
        entry.state = SessionState::Running;
        entry.child = Some(child);
        tracing::info!(device_id = %device_id, session_id = %entry.id, "mirroring started");
        Ok(entry.snapshot())
    }

    fn spawn_output_monitor<R>(&self, device_id: &str, stream: &'static str, source: R)
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
    {
        let supervisor = self.clone();
        let device_id = device_id.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(source).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.contains("ERROR:") {
                    tracing::warn!(
                        device_id = %device_id,
                        stream = stream,
                        line = %line,
                        "mirroring tool reported an error; stopping session"
                    );
                    supervisor.stop_mirroring(&device_id).await;
                    break;
                }
                tracing::debug!(device_id = %device_id, stream = stream, line = %line);
            }
        });
    }

    /// Confirm the device is attached and authorized, distinguishing a
    /// missing bridge from a missing device.
    async fn ensure_device(&self, device_id: &str) -> Result<(), SessionError> {
        let devices = self.inner.adb.list_devices().await;
        if devices.iter().any(|d| d.serial == device_id) {
            return Ok(());
        }
        if self.inner.adb.is_available().await {
            Err(SessionError::DeviceNotFound {
                device_id: device_id.to_string(),
            })
        } else {
            Err(SessionError::BridgeUnavailable)
        }
    }

    fn claim_slot(&self, device_id: &str, kind: SessionKind) -> Result<(), SessionError> {
        let mut sessions = self.inner.sessions.lock().unwrap();
        if let Some(existing) = sessions.get(device_id) {
            return Err(SessionError::SessionConflict {
                device_id: device_id.to_string(),
                kind: existing.kind,
            });
        }
        sessions.insert(
            device_id.to_string(),
            ActiveSession {
                id: format!("sess:{}", Uuid::new_v4()),
                device_id: device_id.to_string(),
                kind,
                state: SessionState::Starting,
                started_at_ms: chrono::Utc::now().timestamp_millis(),
                remote_path: None,
                local_path: None,
                child: None,
                display_engaged: false,
            },
        );
        Ok(())
    }

    /// Remove a slot, tearing down whatever the session had acquired.
    fn discard_slot(&self, device_id: &str) {
        let removed = self.inner.sessions.lock().unwrap().remove(device_id);
        if let Some(entry) = removed {
            if entry.display_engaged {
                if let Err(e) = self.inner.display.release() {
                    tracing::warn!(device_id = %device_id, error = %e, "virtual display teardown failed");
                }
            }
            // A remaining child is reaped by kill_on_drop.
        }
    }

    fn locate_scrcpy(&self) -> Result<ScrcpyTools, SessionError> {
        let Some(dir) = &self.inner.scrcpy_dir else {
            return Err(SessionError::ProcessStartFailed {
                detail: "mirroring tool directory not configured".to_string(),
            });
        };
        let binary = dir.join(if cfg!(windows) { "scrcpy.exe" } else { "scrcpy" });
        let payload = dir.join("scrcpy-server");
        if !binary.exists() {
            return Err(SessionError::ProcessStartFailed {
                detail: format!("{} not found", binary.display()),
            });
        }
        if !payload.exists() {
            return Err(SessionError::ProcessStartFailed {
                detail: format!("{} not found", payload.display()),
            });
        }
        Ok(ScrcpyTools { binary, payload })
    }

    /// Size of the finished artifact on the device, for the transfer record.
    async fn remote_size(&self, device_id: &str, remote: &str) -> Option<u64> {
        let output = self
            .inner
            .adb
            .run_shell(device_id, &["ls", "-la", remote], SHELL_TIMEOUT)
            .await
            .ok()?;
        if !output.success() {
            tracing::warn!(device_id = %device_id, remote = %remote, "recorded artifact not found on device");
            return None;
        }
        parse_ls_size(&output.stdout)
    }
}

/// Ask a child to exit cleanly so it can tear down device state. Returns
/// `false` when no graceful signal could be delivered; the caller's
/// bounded wait and hard kill cover that case.
#[cfg(unix)]
fn request_terminate(child: &Child) -> bool {
    match child.id() {
        Some(pid) => {
            unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            true
        }
        None => false,
    }
}

#[cfg(not(unix))]
fn request_terminate(_child: &Child) -> bool {
    false
}

fn exec_to_session_error(e: ExecError) -> SessionError {
    match e {
        ExecError::TimedOut { .. } => SessionError::ProcessTimeout,
        ExecError::Spawn(e) => SessionError::ProcessStartFailed {
            detail: e.to_string(),
        },
    }
}

async fn drain_stderr(child: &mut Child) -> String {
    let Some(stderr) = child.stderr.take() else {
        return String::new();
    };
    let mut lines = BufReader::new(stderr).lines();
    let mut collected = Vec::new();
    while let Ok(Ok(Some(line))) = timeout(Duration::from_millis(500), lines.next_line()).await {
        collected.push(line);
    }
    collected.join(" | ")
}

/// Device-side recorder argv. `--size` is emitted only when a resolution
/// override is set; the bitrate is passed as an absolute bit count.
fn screenrecord_args(cfg: &RecordingConfig, remote: &str) -> Vec<String> {
    let mut args = vec!["screenrecord".to_string()];
    if let Some(size) = &cfg.resolution {
        args.push("--size".to_string());
        args.push(size.clone());
    }
    args.push("--bit-rate".to_string());
    args.push((u64::from(cfg.bitrate_mbps) * 1_000_000).to_string());
    args.push("--time-limit".to_string());
    args.push(cfg.time_limit_secs.to_string());
    args.push("--verbose".to_string());
    args.push(remote.to_string());
    args
}

fn scrcpy_args(device_id: &str, cfg: &MirrorConfig) -> Vec<String> {
    let mut args = vec![
        "-s".to_string(),
        device_id.to_string(),
        "--no-audio".to_string(),
        "-v".to_string(),
    ];
    if let Some(fps) = cfg.fps {
        args.push("--max-fps".to_string());
        args.push(fps.to_string());
    }
    if let Some(dim) = cfg.resolution.as_deref().and_then(max_dimension) {
        args.push("-m".to_string());
        args.push(dim.to_string());
    }
    args
}

/// Larger side of a `WIDTHxHEIGHT` string, which is what the mirroring
/// tool's `-m` flag takes.
fn max_dimension(resolution: &str) -> Option<u32> {
    let (w, h) = resolution.split_once('x')?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    Some(w.max(h))
}

/// Size field from a single-file `ls -la` line. Toybox output carries a
/// link-count column that older toolboxes omit.
fn parse_ls_size(stdout: &str) -> Option<u64> {
    stdout.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.len() {
            8.. => fields[4].parse().ok(),
            7 => fields[3].parse().ok(),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_display::NoopVirtualDisplay;

    fn make_supervisor(scrcpy_dir: Option<PathBuf>) -> SessionSupervisor {
        SessionSupervisor::new(
            Arc::new(AdbClient::with_program("/nonexistent/path/to/adb")),
            Arc::new(NoopVirtualDisplay),
            std::env::temp_dir().join("screen-hub-tests"),
            scrcpy_dir,
        )
    }

    #[test]
    fn second_claim_of_either_kind_conflicts() {
        let supervisor = make_supervisor(None);
        supervisor.claim_slot("ABC123", SessionKind::Recording).unwrap();
        let err = supervisor
            .claim_slot("ABC123", SessionKind::Mirroring)
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::SessionConflict {
                kind: SessionKind::Recording,
                ..
            }
        ));
        // Mirroring first blocks recording the same way.
        supervisor.claim_slot("DEF456", SessionKind::Mirroring).unwrap();
        let err = supervisor
            .claim_slot("DEF456", SessionKind::Recording)
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::SessionConflict {
                kind: SessionKind::Mirroring,
                ..
            }
        ));
        // A different device is unaffected.
        supervisor.claim_slot("GHI789", SessionKind::Recording).unwrap();
    }

    #[test]
    fn claimed_sessions_are_born_starting() {
        // Idle has no entry; a claim goes straight to Starting.
        let supervisor = make_supervisor(None);
        assert!(supervisor.session_for("ABC123").is_none());
        supervisor.claim_slot("ABC123", SessionKind::Recording).unwrap();
        let snapshot = supervisor.session_for("ABC123").expect("claimed slot");
        assert_eq!(snapshot.state, SessionState::Starting);
        assert!(snapshot.id.starts_with("sess:"));
    }

    #[test]
    fn discard_frees_the_slot() {
        let supervisor = make_supervisor(None);
        supervisor.claim_slot("ABC123", SessionKind::Recording).unwrap();
        supervisor.discard_slot("ABC123");
        supervisor.claim_slot("ABC123", SessionKind::Mirroring).unwrap();
    }

    #[test]
    fn discard_releases_an_engaged_display() {
        let display = Arc::new(crate::virtual_display::testing::RecordingDisplay::new(false));
        let supervisor = SessionSupervisor::new(
            Arc::new(AdbClient::with_program("/nonexistent/path/to/adb")),
            display.clone(),
            std::env::temp_dir().join("screen-hub-tests"),
            None,
        );
        supervisor.claim_slot("ABC123", SessionKind::Mirroring).unwrap();
        supervisor
            .inner
            .sessions
            .lock()
            .unwrap()
            .get_mut("ABC123")
            .unwrap()
            .display_engaged = true;
        supervisor.discard_slot("ABC123");
        assert_eq!(display.calls.lock().unwrap().as_slice(), ["release"]);
    }

    #[tokio::test]
    async fn stop_without_session_is_a_no_op() {
        let supervisor = make_supervisor(None);
        assert!(supervisor.stop_recording("ABC123").await.is_none());
        assert!(!supervisor.stop_mirroring("ABC123").await);
        // A claimed-but-not-running slot is not stoppable either.
        supervisor.claim_slot("ABC123", SessionKind::Recording).unwrap();
        assert!(supervisor.stop_recording("ABC123").await.is_none());
    }

    #[tokio::test]
    async fn missing_bridge_reports_unavailable() {
        let supervisor = make_supervisor(None);
        let err = supervisor
            .start_recording("ABC123", RecordingConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::BridgeUnavailable));
        assert!(supervisor.sessions().is_empty());
    }

    #[tokio::test]
    async fn missing_mirroring_tool_fails_before_any_device_command() {
        // The bridge binary is also missing; getting ProcessStartFailed
        // instead of BridgeUnavailable proves the local check ran first.
        let supervisor = make_supervisor(Some(PathBuf::from("/nonexistent/scrcpy")));
        let err = supervisor
            .start_mirroring("ABC123", MirrorConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ProcessStartFailed { .. }));

        let supervisor = make_supervisor(None);
        let err = supervisor
            .start_mirroring("ABC123", MirrorConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ProcessStartFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn terminate_request_ends_a_child_without_a_hard_kill() {
        let mut child = Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        assert!(request_terminate(&child));
        let status = timeout(Duration::from_secs(5), child.wait())
            .await
            .expect("child exited after terminate request")
            .unwrap();
        assert!(!status.success());
    }

    #[test]
    fn screenrecord_args_encode_bitrate_and_limit() {
        let cfg = RecordingConfig {
            resolution: None,
            bitrate_mbps: 8,
            fps: 30,
            time_limit_secs: 180,
        };
        let args = screenrecord_args(&cfg, "/sdcard/screenrecord_x.mp4");
        assert_eq!(
            args,
            vec![
                "screenrecord",
                "--bit-rate",
                "8000000",
                "--time-limit",
                "180",
                "--verbose",
                "/sdcard/screenrecord_x.mp4",
            ]
        );
    }

    #[test]
    fn screenrecord_args_include_size_only_when_set() {
        let cfg = RecordingConfig {
            resolution: Some("1280x720".to_string()),
            bitrate_mbps: 20,
            fps: 60,
            time_limit_secs: 60,
        };
        let args = screenrecord_args(&cfg, "/sdcard/r.mp4");
        assert_eq!(args[1], "--size");
        assert_eq!(args[2], "1280x720");
        assert!(args.contains(&"20000000".to_string()));
    }

    #[test]
    fn scrcpy_args_pass_fps_and_max_dimension() {
        let cfg = MirrorConfig {
            resolution: Some("1920x1080".to_string()),
            fps: Some(60),
            extend_display: false,
        };
        let args = scrcpy_args("ABC123", &cfg);
        assert_eq!(
            args,
            vec!["-s", "ABC123", "--no-audio", "-v", "--max-fps", "60", "-m", "1920"]
        );
        let bare = scrcpy_args("ABC123", &MirrorConfig::default());
        assert_eq!(bare, vec!["-s", "ABC123", "--no-audio", "-v"]);
    }

    #[test]
    fn ls_size_parses_both_layouts() {
        let toybox =
            "-rw-rw---- 1 root sdcard 4096000 2024-06-01 12:00 /sdcard/screenrecord_x.mp4\n";
        assert_eq!(parse_ls_size(toybox), Some(4096000));
        let toolbox = "-rw-rw---- root sdcard 4096000 2024-06-01 12:00 /sdcard/x.mp4\n";
        assert_eq!(parse_ls_size(toolbox), Some(4096000));
        assert_eq!(parse_ls_size("ls: /sdcard/x.mp4: No such file or directory"), None);
    }

    #[test]
    fn max_dimension_picks_larger_side() {
        assert_eq!(max_dimension("1920x1080"), Some(1920));
        assert_eq!(max_dimension("1080x2400"), Some(2400));
        assert_eq!(max_dimension("garbage"), None);
    }
}

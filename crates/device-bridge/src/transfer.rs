//! Artifact transfer manager.
//!
//! Moves finished artifacts off the device and cleans up after itself. A
//! transfer never returns `Err`: every way it can go wrong is a value of
//! [`TransferOutcome`], so callers can record it on the session without
//! unwinding.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use screen_hub_types::{TransferOutcome, TransferRecord};

use crate::adb::{AdbClient, ExecError};

const PULL_TIMEOUT: Duration = Duration::from_secs(120);
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Files smaller than this after a successful pull are flagged as possibly
/// truncated; a real recording header alone exceeds it.
const CORRUPTION_THRESHOLD: u64 = 1024;

#[derive(Clone)]
pub struct ArtifactTransfer {
    adb: Arc<AdbClient>,
}

impl ArtifactTransfer {
    pub fn new(adb: Arc<AdbClient>) -> Self {
        Self { adb }
    }

    /// Pull `remote` into `local`, then remove the remote copy.
    ///
    /// The remote delete runs regardless of how the pull went; a failed
    /// delete is logged and recorded but never changes the outcome.
    pub async fn pull_and_clean(
        &self,
        device_id: &str,
        remote: &str,
        local: &Path,
        expected_bytes: Option<u64>,
    ) -> TransferRecord {
        let outcome = self.pull_verified(device_id, remote, local).await;
        let remote_removed = self.remove_remote(device_id, remote).await;
        if let TransferOutcome::Completed { bytes, .. } = &outcome {
            tracing::info!(
                device_id = %device_id,
                local = %local.display(),
                bytes = bytes,
                "artifact transferred"
            );
        }
        TransferRecord {
            remote_path: remote.to_string(),
            local_path: local.display().to_string(),
            expected_bytes,
            outcome,
            remote_removed,
        }
    }

    async fn pull_verified(&self, device_id: &str, remote: &str, local: &Path) -> TransferOutcome {
        if let Some(parent) = local.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return TransferOutcome::Failed {
                    detail: format!("create {}: {e}", parent.display()),
                };
            }
        }

        let output = match self.adb.pull(device_id, remote, local, PULL_TIMEOUT).await {
            Ok(output) => output,
            Err(ExecError::TimedOut { after }) => {
                tracing::warn!(device_id = %device_id, remote = %remote, after = ?after, "pull timed out");
                return TransferOutcome::TimedOut;
            }
            Err(ExecError::Spawn(e)) => {
                return TransferOutcome::Failed {
                    detail: format!("pull spawn: {e}"),
                };
            }
        };
        if !output.success() {
            return TransferOutcome::Failed {
                detail: output.stderr.trim().to_string(),
            };
        }

        // The bridge can exit zero without producing a file (remote path
        // raced with deletion); verify on disk before claiming success.
        classify_local(local)
    }

    /// Best-effort remote delete; returns whether the file is gone.
    async fn remove_remote(&self, device_id: &str, remote: &str) -> bool {
        match self
            .adb
            .run_shell(device_id, &["rm", remote], CLEANUP_TIMEOUT)
            .await
        {
            Ok(output) if output.success() => true,
            Ok(output) => {
                tracing::warn!(
                    device_id = %device_id,
                    remote = %remote,
                    stderr = %output.stderr.trim(),
                    "cleanup failed: remote artifact left behind"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    device_id = %device_id,
                    remote = %remote,
                    error = %e,
                    "cleanup failed: remote artifact left behind"
                );
                false
            }
        }
    }
}

/// Classify the pulled file on disk.
fn classify_local(local: &Path) -> TransferOutcome {
    match std::fs::metadata(local) {
        Ok(meta) => TransferOutcome::Completed {
            bytes: meta.len(),
            possibly_corrupt: meta.len() < CORRUPTION_THRESHOLD,
        },
        Err(_) => TransferOutcome::Incomplete,
    }
}

//! Host virtual-display capability.
//!
//! Extend-mode mirroring needs an extra display on the host. The driver
//! tooling is Windows-only and external; everything here treats it as an
//! opaque capability behind a trait so the supervisor stays portable and
//! testable.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[derive(Debug)]
pub struct DisplayError {
    pub detail: String,
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "virtual display: {}", self.detail)
    }
}

impl std::error::Error for DisplayError {}

/// A host display that can be brought up for the duration of a mirroring
/// session and torn down afterwards.
pub trait VirtualDisplay: Send + Sync {
    /// Bring the extra display up. Must be safe to call when it is already
    /// engaged.
    fn engage(&self) -> Result<(), DisplayError>;
    /// Tear the display down. Failures are for the caller to log, not act on.
    fn release(&self) -> Result<(), DisplayError>;
}

/// No host display support. Engaging fails so extend-mode requests are
/// rejected cleanly rather than silently mirrored.
pub struct NoopVirtualDisplay;

impl VirtualDisplay for NoopVirtualDisplay {
    fn engage(&self) -> Result<(), DisplayError> {
        Err(DisplayError {
            detail: "no virtual display driver on this host".to_string(),
        })
    }

    fn release(&self) -> Result<(), DisplayError> {
        Ok(())
    }
}

/// Driver wrapper around the `usbmmidd_v2` installer tool.
///
/// The tool ships as `deviceinstaller64.exe`; `install usbmmidd.inf usbmmidd`
/// registers the driver and `enableidd 1`/`enableidd 0` toggles the display.
pub struct UsbMmIddDisplay {
    installer: PathBuf,
}

impl UsbMmIddDisplay {
    /// Look for the installer under `dir`; `None` when it is not present.
    pub fn locate(dir: &Path) -> Option<Self> {
        let installer = dir.join("deviceinstaller64.exe");
        installer.exists().then(|| Self { installer })
    }

    // The installer is a short local tool; it runs blocking on the caller's
    // thread like the rest of the driver tooling it wraps.
    fn run_installer(&self, args: &[&str]) -> Result<(), DisplayError> {
        let workdir = self
            .installer
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let output = Command::new(&self.installer)
            .args(args)
            .current_dir(&workdir)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| DisplayError {
                detail: format!("spawn {}: {e}", self.installer.display()),
            })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(DisplayError {
                detail: format!(
                    "{} exited {:?}: {}",
                    args.join(" "),
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }
}

impl VirtualDisplay for UsbMmIddDisplay {
    fn engage(&self) -> Result<(), DisplayError> {
        // Installing an already-installed driver is a no-op for the tool.
        self.run_installer(&["install", "usbmmidd.inf", "usbmmidd"])?;
        self.run_installer(&["enableidd", "1"])
    }

    fn release(&self) -> Result<(), DisplayError> {
        self.run_installer(&["enableidd", "0"])
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records engage/release calls; optionally fails engagement.
    pub struct RecordingDisplay {
        pub calls: Mutex<Vec<&'static str>>,
        pub fail_engage: bool,
    }

    impl RecordingDisplay {
        pub fn new(fail_engage: bool) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_engage,
            }
        }
    }

    impl VirtualDisplay for RecordingDisplay {
        fn engage(&self) -> Result<(), DisplayError> {
            self.calls.lock().unwrap().push("engage");
            if self.fail_engage {
                Err(DisplayError {
                    detail: "forced failure".to_string(),
                })
            } else {
                Ok(())
            }
        }

        fn release(&self) -> Result<(), DisplayError> {
            self.calls.lock().unwrap().push("release");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_display_rejects_engage_but_releases_quietly() {
        let display = NoopVirtualDisplay;
        assert!(display.engage().is_err());
        assert!(display.release().is_ok());
    }

    #[test]
    fn locate_requires_installer_binary() {
        assert!(UsbMmIddDisplay::locate(Path::new("/nonexistent")).is_none());
    }
}

//! Configuration loading and parsing.
//!
//! Defines the server config schema and resolves defaults. Every field is
//! optional; an empty file (or no file at all) yields a fully working
//! configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use screen_hub_types::RecordingConfig;

/// On-device recorder hard limit for a single clip.
const MAX_TIME_LIMIT_SECS: u32 = 180;

/// Top-level server configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    /// Bind address (host:port).
    pub bind: Option<String>,
    /// Folder where pulled recordings and screenshots land.
    pub output_folder: Option<String>,
    /// Recording resolution override, `WIDTHxHEIGHT`.
    pub resolution: Option<String>,
    /// Recording bitrate in Mbps.
    pub bitrate_mbps: Option<u32>,
    /// Recording frame rate.
    pub fps: Option<u32>,
    /// Recording length limit in minutes.
    pub max_time_minutes: Option<u32>,
    /// Host monitor streamed by the relay.
    pub monitor_index: Option<usize>,
    /// JPEG quality for the relay stream (1..=100).
    pub jpeg_quality: Option<u8>,
    /// Directory holding the mirroring tool and its server payload.
    pub scrcpy_dir: Option<String>,
}

impl ServerConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<ServerConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }

    /// Substitute defaults for everything left unset.
    pub fn resolve(self) -> Result<Settings> {
        let bind: SocketAddr = match self.bind.as_deref() {
            Some(bind) => bind.parse().with_context(|| format!("parse bind {bind}"))?,
            None => "0.0.0.0:5000".parse().expect("default bind"),
        };
        let output_folder = match self.output_folder.as_deref() {
            Some(dir) => PathBuf::from(dir),
            None => default_output_folder(),
        };
        let minutes = self.max_time_minutes.unwrap_or(3);
        let recording = RecordingConfig {
            resolution: self.resolution,
            bitrate_mbps: self.bitrate_mbps.unwrap_or(8).clamp(1, 20),
            fps: self.fps.unwrap_or(30),
            time_limit_secs: (minutes * 60).min(MAX_TIME_LIMIT_SECS),
        };
        Ok(Settings {
            bind,
            output_folder,
            recording,
            monitor_index: self.monitor_index.unwrap_or(0),
            jpeg_quality: self.jpeg_quality.unwrap_or(80).clamp(1, 100),
            scrcpy_dir: self.scrcpy_dir.map(PathBuf::from),
        })
    }
}

/// Fully resolved runtime settings.
#[derive(Clone, Debug)]
pub struct Settings {
    pub bind: SocketAddr,
    pub output_folder: PathBuf,
    /// Defaults applied to recording requests that omit fields.
    pub recording: RecordingConfig,
    pub monitor_index: usize,
    pub jpeg_quality: u8,
    pub scrcpy_dir: Option<PathBuf>,
}

fn default_output_folder() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .map(|home| home.join("Documents").join("ScreenHub"))
        .unwrap_or_else(|| PathBuf::from("ScreenHub"))
}

/// Update the output folder in the config file on disk, preserving the rest
/// of the document.
pub fn update_output_folder(path: &Path, folder: &Path) -> Result<()> {
    let raw = if path.exists() {
        std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?
    } else {
        String::new()
    };
    let mut doc = raw
        .parse::<toml_edit::DocumentMut>()
        .with_context(|| format!("parse config {:?}", path))?;
    doc["output_folder"] = toml_edit::value(folder.display().to_string());
    std::fs::write(path, doc.to_string()).with_context(|| format!("write config {:?}", path))?;
    Ok(())
}

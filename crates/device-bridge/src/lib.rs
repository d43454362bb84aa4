//! Android device control over the platform debug bridge: device
//! enumeration, recording and mirroring sessions, and artifact transfer.

pub mod adb;
pub mod registry;
pub mod session;
pub mod transfer;
pub mod virtual_display;

pub use adb::AdbClient;
pub use registry::DeviceRegistry;
pub use session::SessionSupervisor;
pub use transfer::ArtifactTransfer;
pub use virtual_display::{NoopVirtualDisplay, UsbMmIddDisplay, VirtualDisplay};

//! Host screen capture for the streaming relay.
//!
//! The relay only ever sees JPEG-ready RGB frames behind the [`FrameSource`]
//! trait; the real backend enumerates host monitors through `xcap`, tests
//! substitute deterministic fakes.

use std::fmt;

use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;

/// One captured frame, tightly packed RGB.
#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub enum CaptureError {
    /// The requested monitor index does not exist.
    NoSuchMonitor { index: usize, available: usize },
    /// The platform capture call failed.
    Backend(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NoSuchMonitor { index, available } => {
                write!(f, "monitor {index} not found ({available} available)")
            }
            CaptureError::Backend(detail) => write!(f, "capture failed: {detail}"),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Source of host screen frames.
pub trait FrameSource: Send + Sync {
    fn monitor_count(&self) -> usize;
    fn capture(&self, monitor_index: usize) -> Result<Frame, CaptureError>;
}

/// Real backend over the platform capture API.
pub struct XcapFrameSource;

impl FrameSource for XcapFrameSource {
    fn monitor_count(&self) -> usize {
        xcap::Monitor::all().map(|monitors| monitors.len()).unwrap_or(0)
    }

    fn capture(&self, monitor_index: usize) -> Result<Frame, CaptureError> {
        let monitors = xcap::Monitor::all().map_err(|e| CaptureError::Backend(e.to_string()))?;
        let available = monitors.len();
        let monitor = monitors
            .into_iter()
            .nth(monitor_index)
            .ok_or(CaptureError::NoSuchMonitor {
                index: monitor_index,
                available,
            })?;
        let image = monitor
            .capture_image()
            .map_err(|e| CaptureError::Backend(e.to_string()))?;
        let (width, height) = (image.width(), image.height());
        let rgba = image.into_raw();
        let mut data = Vec::with_capacity(rgba.len() / 4 * 3);
        for px in rgba.chunks_exact(4) {
            data.extend_from_slice(&px[..3]);
        }
        Ok(Frame {
            width,
            height,
            data,
        })
    }
}

/// Encode a frame as JPEG at the given quality.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode(
            &frame.data,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| CaptureError::Backend(e.to_string()))?;
    Ok(buf)
}

/// Solid black stand-in shown when the selected monitor is unavailable.
pub fn placeholder_jpeg(quality: u8) -> Vec<u8> {
    let frame = Frame {
        width: 640,
        height: 360,
        data: vec![0u8; 640 * 360 * 3],
    };
    // Encoding a constant frame cannot fail; fall back to an empty body if
    // the encoder ever disagrees.
    encode_jpeg(&frame, quality).unwrap_or_default()
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Deterministic source: `monitors` flat gray frames.
    pub struct FakeFrameSource {
        pub monitors: usize,
    }

    impl FrameSource for FakeFrameSource {
        fn monitor_count(&self) -> usize {
            self.monitors
        }

        fn capture(&self, monitor_index: usize) -> Result<Frame, CaptureError> {
            if monitor_index >= self.monitors {
                return Err(CaptureError::NoSuchMonitor {
                    index: monitor_index,
                    available: self.monitors,
                });
            }
            Ok(Frame {
                width: 32,
                height: 32,
                data: vec![128u8; 32 * 32 * 3],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeFrameSource;
    use super::*;

    #[test]
    fn encode_produces_a_jpeg_header() {
        let source = FakeFrameSource { monitors: 1 };
        let frame = source.capture(0).unwrap();
        let jpeg = encode_jpeg(&frame, 80).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn missing_monitor_is_reported_with_count() {
        let source = FakeFrameSource { monitors: 2 };
        let err = source.capture(5).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::NoSuchMonitor {
                index: 5,
                available: 2
            }
        ));
    }

    #[test]
    fn placeholder_is_a_valid_jpeg() {
        let jpeg = placeholder_jpeg(80);
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }
}

//! Frame sources.
//!
//! This module provides the sources the real-time loop can pull frames from:
//! - Synthetic test patterns (`stub://gradient`, `stub://bars`, `stub://split`, `stub://noise`)
//! - Still images (`image://photo.png`, or any `.png`/`.jpg` path)
//! - USB/V4L2 cameras (feature: ingest-v4l2, `/dev/video0` or `v4l2:///dev/video0`)
//! - Local video files (feature: ingest-file-ffmpeg)
//!
//! Every source implements `FrameSource` and produces RGB8 `Frame`s. A
//! `?frames=N` suffix on synthetic and still-image specs ends the stream after
//! N frames.
//!
//! Sources are responsible for:
//! - Opening and releasing the device (`start` / `stop`, `stop` idempotent)
//! - Delivering frames at the negotiated resolution
//! - Signalling end-of-stream with `Ok(None)`
//!
//! `get_frame` blocks until a frame is available. There is no timeout: a
//! stalled device stalls the caller.

#[cfg(feature = "ingest-file-ffmpeg")]
mod file_ffmpeg;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
mod still;
mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use crate::error::{Error, Result};
use crate::frame::Frame;

#[cfg(feature = "ingest-file-ffmpeg")]
pub use file_ffmpeg::FfmpegFileSource;
pub use still::StillImageSource;
pub use synthetic::{SyntheticPattern, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// Requested capture parameters. Sources may negotiate a different size;
/// `FrameSource::frame_size` reports the actual one after `start`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            target_fps: 30,
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// A blocking supplier of raster frames.
pub trait FrameSource {
    /// Human-readable source identifier (device path, file, stub name).
    fn name(&self) -> &str;

    /// Acquire the device. Failure is an `Error::Acquisition`.
    fn start(&mut self) -> Result<()>;

    /// Next frame, or `None` at end of stream.
    fn get_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the device. Safe to call more than once.
    fn stop(&mut self);

    /// Negotiated frame size, known after `start` for most sources.
    fn frame_size(&self) -> Option<(u32, u32)>;

    /// Capture counters, read by the loop's periodic report.
    fn stats(&self) -> SourceStats;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn get_frame(&mut self) -> Result<Option<Frame>> {
        (**self).get_frame()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn frame_size(&self) -> Option<(u32, u32)> {
        (**self).frame_size()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}

/// Parsed form of a source spec string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    Synthetic {
        pattern: SyntheticPattern,
        frame_limit: Option<u64>,
    },
    Still {
        path: String,
        frame_limit: Option<u64>,
    },
    V4l2 {
        device: String,
    },
    File {
        path: String,
    },
}

const IMAGE_EXTENSIONS: [&str; 3] = [".png", ".jpg", ".jpeg"];

impl SourceSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(Error::config("frame source must not be empty"));
        }

        if let Some(rest) = spec.strip_prefix("stub://") {
            let (name, frame_limit) = split_frame_limit(rest)?;
            return Ok(SourceSpec::Synthetic {
                pattern: SyntheticPattern::from_name(name),
                frame_limit,
            });
        }
        if let Some(rest) = spec.strip_prefix("image://") {
            let (path, frame_limit) = split_frame_limit(rest)?;
            return Ok(SourceSpec::Still {
                path: path.to_string(),
                frame_limit,
            });
        }
        if let Some(device) = spec.strip_prefix("v4l2://") {
            return Ok(SourceSpec::V4l2 {
                device: device.to_string(),
            });
        }
        if spec.starts_with("/dev/video") {
            return Ok(SourceSpec::V4l2 {
                device: spec.to_string(),
            });
        }
        if spec.contains("://") {
            return Err(Error::config(format!(
                "unsupported frame source scheme in '{}' (local sources only)",
                spec
            )));
        }

        let (path, frame_limit) = split_frame_limit(spec)?;
        let lower = path.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            return Ok(SourceSpec::Still {
                path: path.to_string(),
                frame_limit,
            });
        }
        Ok(SourceSpec::File {
            path: spec.to_string(),
        })
    }
}

fn split_frame_limit(spec: &str) -> Result<(&str, Option<u64>)> {
    let Some((base, query)) = spec.split_once('?') else {
        return Ok((spec, None));
    };
    let limit = query
        .strip_prefix("frames=")
        .and_then(|n| n.parse::<u64>().ok())
        .ok_or_else(|| {
            Error::config(format!(
                "unsupported source option '{}' (expected frames=N)",
                query
            ))
        })?;
    Ok((base, Some(limit)))
}

/// Builds the source for `spec`. The source is not started.
pub fn open_source(spec: &str, capture: &CaptureConfig) -> Result<Box<dyn FrameSource>> {
    match SourceSpec::parse(spec)? {
        SourceSpec::Synthetic {
            pattern,
            frame_limit,
        } => Ok(Box::new(
            SyntheticSource::new(spec.to_string(), pattern, capture.clone())
                .with_frame_limit(frame_limit),
        )),
        SourceSpec::Still { path, frame_limit } => Ok(Box::new(
            StillImageSource::new(path, capture.clone()).with_frame_limit(frame_limit),
        )),
        SourceSpec::V4l2 { device } => {
            #[cfg(feature = "ingest-v4l2")]
            {
                Ok(Box::new(V4l2Source::new(v4l2::V4l2Config {
                    device,
                    target_fps: capture.target_fps,
                    width: capture.width,
                    height: capture.height,
                })))
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                Err(Error::config(format!(
                    "camera {} requires the ingest-v4l2 feature",
                    device
                )))
            }
        }
        SourceSpec::File { path } => {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                Ok(Box::new(FfmpegFileSource::new(path)))
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(Error::config(format!(
                    "video file {} requires the ingest-file-ffmpeg feature",
                    path
                )))
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

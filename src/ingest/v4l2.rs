//! V4L2 camera source.
//!
//! This module provides `V4l2Source` for capturing frames from local V4L2
//! devices (e.g. /dev/video0).
//!
//! The source asks the driver for RGB3 at the requested size and rate. Drivers
//! that refuse RGB usually offer YUYV or NV12, which are converted to RGB on
//! capture. Frames are copied out of the mmap buffer before the next dequeue,
//! so a `Frame` never aliases driver memory.

use ouroboros::self_referencing;
use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{FrameSource, SourceStats};
use crate::error::{Error, Result};
use crate::frame::Frame;

/// Configuration for a V4L2 source.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Requested frame rate. Drivers may ignore it.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
        }
    }
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

pub struct V4l2Source {
    config: V4l2Config,
    state: Option<DeviceState>,
    pixel_format: PixelFormat,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
}

impl V4l2Source {
    pub fn new(config: V4l2Config) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            pixel_format: PixelFormat::Rgb24,
            frame_count: 0,
        }
    }

    fn acquisition(&self, what: &str, err: impl std::fmt::Display) -> Error {
        Error::acquisition(format!("{} {}", what, self.config.device), err)
    }
}

impl FrameSource for V4l2Source {
    fn name(&self) -> &str {
        &self.config.device
    }

    fn start(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        if self.state.is_some() {
            return Ok(());
        }

        let mut device = v4l::Device::with_path(&self.config.device)
            .map_err(|e| self.acquisition("open v4l2 device", e))?;
        let mut format = device
            .format()
            .map_err(|e| self.acquisition("read v4l2 format", e))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .map_err(|e| self.acquisition("read v4l2 format after set failure", e))?
            }
        };

        self.pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            self.acquisition(
                "negotiate pixel format on",
                format!("unsupported fourcc {}", format.fourcc),
            )
        })?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
            },
        }
        .try_build()
        .map_err(|e| self.acquisition("create v4l2 buffer stream for", e))?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{}, {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.pixel_format
        );
        Ok(())
    }

    fn get_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let captured = match self.state.as_mut() {
            Some(state) => state.with_mut(|fields| {
                fields
                    .stream
                    .next()
                    .map(|(buf, meta)| buf[..(meta.bytesused as usize).min(buf.len())].to_vec())
            }),
            None => {
                return Err(Error::acquisition(&self.config.device, "device not started"))
            }
        };
        let raw = match captured {
            Ok(raw) => raw,
            Err(err) => return Err(self.acquisition("capture v4l2 frame from", err)),
        };

        let (width, height) = (self.active_width, self.active_height);
        let rgb = normalize_to_rgb(&raw, width, height, self.pixel_format)?;
        let frame = Frame::from_rgb(rgb, width, height)?.with_sequence(self.frame_count);

        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn stop(&mut self) {
        if self.state.take().is_some() {
            log::info!(
                "V4l2Source: released {} after {} frames",
                self.config.device,
                self.frame_count
            );
        }
    }

    fn frame_size(&self) -> Option<(u32, u32)> {
        self.state
            .as_ref()
            .map(|_| (self.active_width, self.active_height))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.device.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

//! Still-image frame source.
//!
//! Decodes one PNG/JPEG file on `start` and hands out copies of it on every
//! `get_frame`. Images whose size differs from the requested capture size are
//! resized once so the grid sees the same geometry a camera would deliver.

use image::imageops::FilterType;
use image::RgbImage;

use super::{CaptureConfig, FrameSource, SourceStats};
use crate::error::{Error, Result};
use crate::frame::Frame;

pub struct StillImageSource {
    path: String,
    capture: CaptureConfig,
    frame_limit: Option<u64>,
    image: Option<RgbImage>,
    frame_count: u64,
}

impl StillImageSource {
    pub fn new(path: String, capture: CaptureConfig) -> Self {
        Self {
            path,
            capture,
            frame_limit: None,
            image: None,
            frame_count: 0,
        }
    }

    /// Ends the stream after `limit` frames.
    pub fn with_frame_limit(mut self, limit: Option<u64>) -> Self {
        self.frame_limit = limit;
        self
    }
}

impl FrameSource for StillImageSource {
    fn name(&self) -> &str {
        &self.path
    }

    fn start(&mut self) -> Result<()> {
        let decoded = image::open(&self.path)
            .map_err(|e| Error::acquisition(&self.path, e))?
            .to_rgb8();

        let (width, height) = (self.capture.width, self.capture.height);
        let image = if width > 0 && height > 0 && decoded.dimensions() != (width, height) {
            log::debug!(
                "StillImageSource: resizing {} from {:?} to {}x{}",
                self.path,
                decoded.dimensions(),
                width,
                height
            );
            image::imageops::resize(&decoded, width, height, FilterType::Triangle)
        } else {
            decoded
        };

        log::info!(
            "StillImageSource: loaded {} ({}x{})",
            self.path,
            image.width(),
            image.height()
        );
        self.image = Some(image);
        Ok(())
    }

    fn get_frame(&mut self) -> Result<Option<Frame>> {
        let image = self
            .image
            .as_ref()
            .ok_or_else(|| Error::acquisition(&self.path, "source not started"))?;
        if self
            .frame_limit
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Ok(None);
        }

        let frame = Frame::try_from(image.clone())?.with_sequence(self.frame_count);
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn stop(&mut self) {
        self.image = None;
    }

    fn frame_size(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|image| image.dimensions())
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.path.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &tempfile::TempDir, width: u32, height: u32) -> String {
        let image = RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                image::Rgb([255, 0, 0])
            } else {
                image::Rgb([0, 0, 255])
            }
        });
        let path = dir.path().join("still.png");
        image.save(&path).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn repeats_the_image_until_the_limit() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(&dir, 8, 4);
        let capture = CaptureConfig {
            width: 8,
            height: 4,
            target_fps: 30,
        };
        let mut source = StillImageSource::new(path, capture).with_frame_limit(Some(3));
        source.start()?;
        assert_eq!(source.frame_size(), Some((8, 4)));

        let mut frames = Vec::new();
        while let Some(frame) = source.get_frame()? {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].sequence(), 2);
        assert_eq!(frames[0].pixel(0, 0), [255, 0, 0]);
        assert_eq!(frames[0].pixel(7, 3), [0, 0, 255]);
        Ok(())
    }

    #[test]
    fn resizes_to_the_capture_size() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(&dir, 20, 10);
        let capture = CaptureConfig {
            width: 10,
            height: 5,
            target_fps: 30,
        };
        let mut source = StillImageSource::new(path, capture);
        source.start()?;
        assert_eq!(source.frame_size(), Some((10, 5)));
        let frame = source.get_frame()?.expect("unbounded source");
        assert_eq!((frame.width(), frame.height()), (10, 5));
        Ok(())
    }

    #[test]
    fn missing_file_is_an_acquisition_error() {
        let mut source =
            StillImageSource::new("/nonexistent/still.png".to_string(), CaptureConfig::default());
        assert!(matches!(source.start(), Err(Error::Acquisition(_))));
        assert!(source.get_frame().is_err());
    }
}

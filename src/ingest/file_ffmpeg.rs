//! Local video file source using FFmpeg.
//!
//! Decodes the best video stream of a file and converts each frame to RGB24 at
//! its native size. The file plays once: after the last decoded frame the
//! source reports end of stream.

use ffmpeg_next as ffmpeg;

use super::{FrameSource, SourceStats};
use crate::error::{Error, Result};
use crate::frame::Frame;

struct Decoding {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    eof_sent: bool,
}

pub struct FfmpegFileSource {
    path: String,
    state: Option<Decoding>,
    frame_count: u64,
    frame_size: Option<(u32, u32)>,
}

impl FfmpegFileSource {
    pub fn new(path: String) -> Self {
        Self {
            path,
            state: None,
            frame_count: 0,
            frame_size: None,
        }
    }

    fn open(&self) -> Result<Decoding> {
        let fail = |what: &str, err: ffmpeg::Error| {
            Error::acquisition(format!("{} {}", what, self.path), err)
        };

        ffmpeg::init().map_err(|e| fail("initialize ffmpeg for", e))?;
        let input = ffmpeg::format::input(&self.path).map_err(|e| fail("open", e))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| Error::acquisition(&self.path, "file has no video track"))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(|e| fail("load video decoder parameters for", e))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| fail("open video decoder for", e))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| fail("create RGB scaler for", e))?;

        Ok(Decoding {
            input,
            stream_index,
            decoder,
            scaler,
            eof_sent: false,
        })
    }
}

impl FrameSource for FfmpegFileSource {
    fn name(&self) -> &str {
        &self.path
    }

    fn start(&mut self) -> Result<()> {
        if self.state.is_some() {
            return Ok(());
        }
        let state = self.open()?;
        let size = (state.decoder.width(), state.decoder.height());
        self.frame_size = Some(size);
        self.state = Some(state);
        log::info!(
            "FfmpegFileSource: opened {} ({}x{})",
            self.path,
            size.0,
            size.1
        );
        Ok(())
    }

    fn get_frame(&mut self) -> Result<Option<Frame>> {
        let Some(state) = self.state.as_mut() else {
            return Err(Error::acquisition(&self.path, "source not started"));
        };

        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if state.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = ffmpeg::frame::Video::empty();
                state
                    .scaler
                    .run(&decoded, &mut rgb_frame)
                    .map_err(|e| Error::acquisition("scale frame to RGB", e))?;
                let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
                let frame =
                    Frame::from_rgb(pixels, width, height)?.with_sequence(self.frame_count);
                self.frame_count += 1;
                return Ok(Some(frame));
            }

            if state.eof_sent {
                log::info!(
                    "FfmpegFileSource: end of {} after {} frames",
                    self.path,
                    self.frame_count
                );
                return Ok(None);
            }

            let next = state
                .input
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));
            match next {
                Some((index, packet)) if index == state.stream_index => state
                    .decoder
                    .send_packet(&packet)
                    .map_err(|e| Error::acquisition("decode packet", e))?,
                Some(_) => {}
                None => {
                    state
                        .decoder
                        .send_eof()
                        .map_err(|e| Error::acquisition("flush decoder", e))?;
                    state.eof_sent = true;
                }
            }
        }
    }

    fn stop(&mut self) {
        if self.state.take().is_some() {
            log::debug!("FfmpegFileSource: closed {}", self.path);
        }
    }

    fn frame_size(&self) -> Option<(u32, u32)> {
        self.frame_size
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.path.clone(),
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((data[..row_bytes * height as usize].to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let span = data
            .get(start..start + row_bytes)
            .ok_or_else(|| Error::acquisition("copy decoded frame", "row is out of bounds"))?;
        pixels.extend_from_slice(span);
    }

    Ok((pixels, width, height))
}

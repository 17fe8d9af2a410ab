//! Real-time capture -> analyze -> transmit loop.
//!
//! One iteration:
//! 1. Acquire a frame (blocking). `None` ends the run.
//! 2. Analyze it into a `FrameFeatureSet`.
//! 3. Send the set as one bundle. Transmission errors are logged, counted and
//!    skipped; the next frame is processed as usual.
//! 4. Call the preview hook, if any.
//! 5. Poll the cancellation flag.
//! 6. Sleep out the rest of the frame interval.
//!
//! Acquisition and analysis failures stop the loop and are returned to the
//! caller. The `CaptureGuard` releases the source on every exit path.

mod guard;
mod pacer;
mod preview;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::analyze::{AnalyzerSettings, GridAnalyzer};
use crate::error::{Error, Result};
use crate::grid::GridShape;
use crate::ingest::{FrameSource, SourceStats};
use crate::osc::{check_bundle_fits, FeatureSink, MAX_UDP_PAYLOAD};

pub use guard::CaptureGuard;
pub use pacer::Pacer;
pub use preview::{brightness_map, ConsoleSummary, Preview};

/// Default number of frames between throughput reports.
pub const DEFAULT_REPORT_INTERVAL: u64 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    Cancelled,
    FrameLimit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopOptions {
    pub target_fps: u32,
    /// Frames between throughput reports; 0 disables them.
    pub report_interval: u64,
    pub max_frames: Option<u64>,
    /// Upper bound for one encoded bundle. Grids that exceed it are rejected
    /// by `RealtimeLoop::new`.
    pub max_datagram_bytes: usize,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            target_fps: 30,
            report_interval: DEFAULT_REPORT_INTERVAL,
            max_frames: None,
            max_datagram_bytes: MAX_UDP_PAYLOAD,
        }
    }
}

/// Totals for one run of the loop.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub bundles_sent: u64,
    pub send_failures: u64,
    pub bytes_sent: u64,
    pub stop_reason: StopReason,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn average_fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames_processed as f64 / secs
        } else {
            0.0
        }
    }
}

#[derive(Default)]
struct Counters {
    frames: u64,
    bundles: u64,
    failures: u64,
    bytes: u64,
}

/// Throughput window between periodic reports.
struct Report {
    every: u64,
    window_start: Instant,
    window_frames: u64,
}

impl Report {
    fn new(every: u64) -> Self {
        Self {
            every,
            window_start: Instant::now(),
            window_frames: 0,
        }
    }

    /// Source stats are only read on frames that produce a report.
    fn tick<S: FrameSource + ?Sized>(&mut self, counters: &Counters, source: &S) {
        if self.every == 0 {
            return;
        }
        self.window_frames += 1;
        if self.window_frames < self.every {
            return;
        }
        let secs = self.window_start.elapsed().as_secs_f64();
        let fps = if secs > 0.0 {
            self.window_frames as f64 / secs
        } else {
            0.0
        };
        log::info!("{}", report_line(counters, fps, &source.stats()));
        self.window_start = Instant::now();
        self.window_frames = 0;
    }
}

fn report_line(counters: &Counters, fps: f64, source: &SourceStats) -> String {
    format!(
        "{} frames ({:.1} fps), {} bundles sent, {} send failures, {} captured {}",
        counters.frames,
        fps,
        counters.bundles,
        counters.failures,
        source.source,
        source.frames_captured
    )
}

pub struct RealtimeLoop {
    shape: GridShape,
    settings: AnalyzerSettings,
    options: LoopOptions,
    cancel: Arc<AtomicBool>,
    preview: Option<Box<dyn Preview>>,
    state: LoopState,
}

impl RealtimeLoop {
    pub fn new(shape: GridShape, settings: AnalyzerSettings, options: LoopOptions) -> Result<Self> {
        settings.validate()?;
        if options.target_fps == 0 {
            return Err(Error::config("target fps must be >= 1"));
        }
        check_bundle_fits(shape, options.max_datagram_bytes.min(MAX_UDP_PAYLOAD))?;
        Ok(Self {
            shape,
            settings,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
            preview: None,
            state: LoopState::Idle,
        })
    }

    /// Shares an externally owned cancellation flag (e.g. set by a signal handler).
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_preview(mut self, preview: Box<dyn Preview>) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn analyzer_for(
        &self,
        slot: &mut Option<GridAnalyzer>,
        width: u32,
        height: u32,
    ) -> Result<GridAnalyzer> {
        if let Some(analyzer) = slot.take() {
            return Ok(analyzer);
        }
        GridAnalyzer::new(self.shape, self.settings.clone(), width, height)
    }

    /// Runs until end of stream, cancellation, the frame limit, or a fatal error.
    ///
    /// The loop runs once; calling `run` again after it stopped is an error.
    pub fn run<S: FrameSource>(
        &mut self,
        mut capture: CaptureGuard<S>,
        sink: &mut dyn FeatureSink,
    ) -> Result<RunSummary> {
        if self.state != LoopState::Idle {
            return Err(Error::Internal(format!(
                "realtime loop cannot run from state {:?}",
                self.state
            )));
        }
        self.state = LoopState::Running;
        let started = Instant::now();

        let mut counters = Counters::default();
        let outcome = self.iterate(&mut capture, sink, &mut counters);
        self.state = LoopState::Stopped;
        drop(capture);

        let elapsed = started.elapsed();
        match outcome {
            Ok(stop_reason) => {
                let summary = RunSummary {
                    frames_processed: counters.frames,
                    bundles_sent: counters.bundles,
                    send_failures: counters.failures,
                    bytes_sent: counters.bytes,
                    stop_reason,
                    elapsed,
                };
                log::info!(
                    "realtime loop stopped ({:?}) after {} frames in {:.2}s",
                    summary.stop_reason,
                    summary.frames_processed,
                    elapsed.as_secs_f64()
                );
                Ok(summary)
            }
            Err(err) => {
                log::error!(
                    "realtime loop failed after {} frames: {}",
                    counters.frames,
                    err
                );
                Err(err)
            }
        }
    }

    fn iterate<S: FrameSource>(
        &mut self,
        capture: &mut CaptureGuard<S>,
        sink: &mut dyn FeatureSink,
        counters: &mut Counters,
    ) -> Result<StopReason> {
        let mut pacer = Pacer::from_fps(self.options.target_fps)?;
        let mut report = Report::new(self.options.report_interval);

        // Validate against the negotiated size up front when the source knows it.
        let mut analyzer = match capture.source().frame_size() {
            Some((width, height)) => Some(GridAnalyzer::new(
                self.shape,
                self.settings.clone(),
                width,
                height,
            )?),
            None => None,
        };

        log::info!(
            "realtime loop running: {} grid, {} fps target, source {}",
            self.shape,
            self.options.target_fps,
            capture.source().name()
        );

        if self.cancelled() {
            return Ok(StopReason::Cancelled);
        }

        loop {
            pacer.begin();

            if self
                .options
                .max_frames
                .is_some_and(|limit| counters.frames >= limit)
            {
                return Ok(StopReason::FrameLimit);
            }

            let Some(frame) = capture.source_mut().get_frame()? else {
                return Ok(StopReason::EndOfStream);
            };

            let grid = self.analyzer_for(&mut analyzer, frame.width(), frame.height())?;
            let features = grid.analyze(&frame);
            analyzer = Some(grid);
            let features = features?;

            match sink.send(&features) {
                Ok(bytes) => {
                    counters.bundles += 1;
                    counters.bytes += bytes as u64;
                }
                Err(err) if err.is_recoverable() => {
                    counters.failures += 1;
                    log::warn!("frame {}: {}", frame.sequence(), err);
                }
                Err(err) => return Err(err),
            }
            counters.frames += 1;
            log::trace!(
                "frame {} processed in {:?}",
                frame.sequence(),
                frame.age()
            );

            if let Some(preview) = self.preview.as_mut() {
                preview.show(&frame, &features);
            }
            report.tick(counters, capture.source());

            if self.cancelled() {
                return Ok(StopReason::Cancelled);
            }
            pacer.pace();
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

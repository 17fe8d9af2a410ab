//! webcam-osc
//!
//! This crate turns a live video stream into a grid of per-cell visual
//! features and streams them, one OSC bundle per frame, over UDP to a
//! real-time consumer such as Pure Data.
//!
//! # Architecture
//!
//! Data flows one way per iteration:
//!
//! 1. **Acquire**: a `FrameSource` hands out one RGB8 `Frame`.
//! 2. **Analyze**: `GridAnalyzer` splits the frame into `rows x cols` cells and
//!    computes mean color, brightness, luma contrast and a dominant color per
//!    cell, in row-major order.
//! 3. **Transmit**: `FeatureSender` encodes all cells as one OSC bundle
//!    (`/cell/{row}/{col}/{rgb|brightness|contrast|dominant}`) and sends it as
//!    a single UDP datagram.
//!
//! `RealtimeLoop` drives the three steps at a target frame rate. Nothing is
//! retained across frames except the analyzer's fixed layout and the
//! sender's socket.
//!
//! # Module Structure
//!
//! - `grid`: Grid shape and exact frame partitioning
//! - `frame`: RGB8 frame container
//! - `analyze`: Per-cell feature extraction
//! - `osc`: OSC 1.0 codec, bundle layout, UDP sender
//! - `ingest`: Frame sources (synthetic, still image, V4L2, video file)
//! - `runtime`: Paced real-time loop, capture guard, preview hook
//! - `config`: Layered startup configuration and presets

pub mod analyze;
pub mod config;
pub mod error;
pub mod frame;
pub mod grid;
pub mod ingest;
pub mod osc;
pub mod runtime;

pub use analyze::{
    analyze_frame, AnalyzerSettings, CellFeatures, DominantMode, FrameFeatureSet, GridAnalyzer,
};
pub use config::{apply_preset, AppConfig, ConfigOverrides};
pub use error::{Error, Result};
pub use frame::Frame;
pub use grid::{CellRegion, GridShape};
pub use ingest::{open_source, CaptureConfig, FrameSource, SourceSpec};
pub use osc::{Endpoint, FeatureSender, FeatureSink};
pub use runtime::{CaptureGuard, LoopOptions, LoopState, RealtimeLoop, RunSummary, StopReason};

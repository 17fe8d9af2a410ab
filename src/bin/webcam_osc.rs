//! webcam_osc - stream per-cell webcam features to an OSC receiver
//!
//! This daemon:
//! 1. Loads configuration (file, environment, presets, command line)
//! 2. Binds a UDP socket towards the OSC receiver
//! 3. Starts the frame source (camera, still image, video file or synthetic)
//! 4. Runs the paced capture -> analyze -> send loop until the stream ends,
//!    the frame limit is reached, or Ctrl-C is pressed

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use webcam_osc::config::PRESETS;
use webcam_osc::osc::bundle_size_for;
use webcam_osc::runtime::ConsoleSummary;
use webcam_osc::{
    open_source, AppConfig, CaptureGuard, ConfigOverrides, FeatureSender, FrameSource, GridShape,
    RealtimeLoop,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Stream per-cell webcam features as OSC bundles over UDP")]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension)
    #[arg(long, env = "WEBCAM_OSC_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Preset to apply before the other flags (performance|balanced|quality)
    #[arg(long)]
    preset: Option<String>,

    /// Frame source: /dev/videoN, v4l2://DEV, image://PATH, stub://PATTERN or a video file
    #[arg(long)]
    source: Option<String>,

    /// OSC receiver host
    #[arg(long)]
    host: Option<String>,

    /// OSC receiver port
    #[arg(long)]
    port: Option<u16>,

    /// Grid shape as ROWSxCOLS
    #[arg(long, value_name = "ROWSxCOLS")]
    grid: Option<GridShape>,

    /// Target frames per second
    #[arg(long)]
    fps: Option<u32>,

    /// Requested capture width
    #[arg(long)]
    width: Option<u32>,

    /// Requested capture height
    #[arg(long)]
    height: Option<u32>,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Frames between throughput reports (0 disables them)
    #[arg(long)]
    report_interval: Option<u64>,

    /// Log a brightness map every N frames (visible with RUST_LOG=debug)
    #[arg(long, value_name = "N")]
    preview_every: Option<u64>,

    /// List the available presets and exit
    #[arg(long)]
    list_presets: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// UI mode for stderr progress
    #[arg(long, value_enum, default_value_t = ui::UiMode::Auto, value_name = "MODE")]
    ui: ui::UiMode,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            preset: self.preset.clone(),
            source: self.source.clone(),
            host: self.host.clone(),
            port: self.port,
            grid: self.grid,
            fps: self.fps,
            width: self.width,
            height: self.height,
            max_frames: self.max_frames,
            report_interval: self.report_interval,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list_presets {
        for (name, description) in PRESETS {
            println!("{:<12} {}", name, description);
        }
        return Ok(());
    }

    let ui = ui::Ui::detect(args.ui);

    let cfg = {
        let stage = ui.stage("load configuration");
        let cfg = AppConfig::load(args.config.as_deref())
            .context("load configuration")?
            .with_overrides(&args.overrides())
            .context("apply command-line overrides")?;
        stage.done(format!(
            "{} grid, {}x{} @ {} fps{}",
            cfg.grid,
            cfg.capture.width,
            cfg.capture.height,
            cfg.capture.target_fps,
            cfg.preset
                .as_deref()
                .map(|p| format!(", preset {}", p))
                .unwrap_or_default()
        ));
        cfg
    };

    if args.print_config {
        println!("{}", cfg.to_json()?);
        return Ok(());
    }

    let mut sender = {
        let stage = ui.stage("bind osc socket");
        let sender = FeatureSender::connect(&cfg.osc)
            .with_context(|| format!("connect to osc receiver {}", cfg.osc))?
            .with_capacity_for(cfg.grid);
        stage.done(format!(
            "{} ({} bytes per bundle)",
            sender.target(),
            bundle_size_for(cfg.grid)
        ));
        sender
    };

    let capture = {
        let stage = ui.stage("start frame source");
        let source = open_source(&cfg.source, &cfg.capture)?;
        let capture = CaptureGuard::acquire(source)
            .with_context(|| format!("start frame source {}", cfg.source))?;
        let size = capture
            .source()
            .frame_size()
            .map(|(w, h)| format!("{}x{}", w, h))
            .unwrap_or_else(|| "size from first frame".to_string());
        stage.done(format!("{} ({})", capture.source().name(), size));
        capture
    };

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst))
            .context("install Ctrl-C handler")?;
    }

    let mut realtime = RealtimeLoop::new(cfg.grid, cfg.analysis.clone(), cfg.loop_options())?
        .with_cancel_flag(cancel);
    if let Some(every) = args.preview_every {
        realtime = realtime.with_preview(Box::new(ConsoleSummary::new(every)));
    }

    log::info!(
        "streaming {} grid from {} to {} (Ctrl-C to stop)",
        cfg.grid,
        cfg.source,
        cfg.osc
    );
    let summary = realtime
        .run(capture, &mut sender)
        .context("realtime loop stopped")?;

    let stats = sender.stats();
    log::info!(
        "{:?}: {} frames in {:.1}s ({:.1} fps), {} bundles / {} bytes sent, {} send failures",
        summary.stop_reason,
        summary.frames_processed,
        summary.elapsed.as_secs_f64(),
        summary.average_fps(),
        stats.bundles_sent,
        stats.bytes_sent,
        summary.send_failures
    );
    Ok(())
}

//! osc_monitor - reference receiver for webcam_osc bundles
//!
//! Listens on a UDP port, decodes each datagram as one grid snapshot and logs
//! a summary every N bundles. With `--json` every snapshot is also written to
//! stdout as one JSON line, which makes the stream easy to record or diff.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{ErrorKind, Write};
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use webcam_osc::osc::{decode_feature_set, OscPacket};
use webcam_osc::runtime::brightness_map;
use webcam_osc::FrameFeatureSet;

#[path = "../ui.rs"]
mod ui;

/// Poll interval for the cancellation flag while no datagram arrives.
const RECV_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(author, version, about = "Decode and report webcam_osc grid bundles")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, env = "WEBCAM_OSC_PORT", default_value_t = 5005)]
    port: u16,

    /// Log a snapshot summary every N bundles
    #[arg(long, default_value_t = 30, value_name = "N")]
    every: u64,

    /// Exit after this many bundles
    #[arg(long)]
    max_bundles: Option<u64>,

    /// Write every snapshot to stdout as a JSON line
    #[arg(long)]
    json: bool,

    /// UI mode for stderr progress
    #[arg(long, value_enum, default_value_t = ui::UiMode::Auto, value_name = "MODE")]
    ui: ui::UiMode,
}

#[derive(Default)]
struct MonitorStats {
    bundles: u64,
    decode_errors: u64,
    bytes: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = ui::Ui::detect(args.ui);

    let socket = {
        let stage = ui.stage("bind listener");
        let socket = UdpSocket::bind((args.bind.as_str(), args.port))
            .with_context(|| format!("bind udp {}:{}", args.bind, args.port))?;
        socket
            .set_read_timeout(Some(RECV_TIMEOUT))
            .context("set socket read timeout")?;
        stage.done(socket.local_addr().ok().map(|addr| addr.to_string()));
        socket
    };

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst))
            .context("install Ctrl-C handler")?;
    }

    let every = args.every.max(1);
    let mut stats = MonitorStats::default();
    let mut buf = vec![0u8; 65_536];
    let stdout = std::io::stdout();

    while !cancel.load(Ordering::SeqCst) {
        if args.max_bundles.is_some_and(|max| stats.bundles >= max) {
            break;
        }

        let (len, from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                continue
            }
            Err(err) => return Err(err).context("receive datagram"),
        };
        stats.bytes += len as u64;

        let features = match decode_snapshot(&buf[..len]) {
            Ok(features) => features,
            Err(err) => {
                stats.decode_errors += 1;
                log::warn!("{} byte datagram from {}: {}", len, from, err);
                continue;
            }
        };
        stats.bundles += 1;

        if args.json {
            let line = serde_json::to_string(features.cells()).context("encode snapshot")?;
            writeln!(stdout.lock(), "{}", line).context("write snapshot")?;
        }
        if stats.bundles % every == 0 {
            log::info!(
                "bundle #{} from {}: {} grid, {} bytes, mean brightness {:.3}\n{}",
                stats.bundles,
                from,
                features.shape(),
                len,
                features.mean_brightness(),
                brightness_map(&features)
            );
        }
    }

    log::info!(
        "received {} bundles ({} bytes), {} undecodable datagrams",
        stats.bundles,
        stats.bytes,
        stats.decode_errors
    );
    Ok(())
}

fn decode_snapshot(bytes: &[u8]) -> webcam_osc::Result<FrameFeatureSet> {
    let packet = OscPacket::decode(bytes)?;
    if !matches!(packet, OscPacket::Bundle(_)) {
        log::debug!("received a bare message instead of a bundle");
    }
    decode_feature_set(&packet)
}

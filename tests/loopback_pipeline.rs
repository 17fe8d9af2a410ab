//! End-to-end: synthetic source -> analyzer -> UDP sender -> local receiver.

use std::net::UdpSocket;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use webcam_osc::osc::{decode_feature_set, OscPacket};
use webcam_osc::runtime::Preview;
use webcam_osc::{
    open_source, AnalyzerSettings, CaptureConfig, CaptureGuard, Endpoint, FeatureSender,
    FeatureSink, Frame, FrameFeatureSet, GridShape, LoopOptions, RealtimeLoop, StopReason,
};

/// Keeps a copy of every feature set the loop produced.
struct Recorder(Arc<Mutex<Vec<FrameFeatureSet>>>);

impl Preview for Recorder {
    fn show(&mut self, _frame: &Frame, features: &FrameFeatureSet) {
        self.0.lock().unwrap().push(features.clone());
    }
}

fn receiver() -> (UdpSocket, Endpoint) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind receiver");
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("read timeout");
    let port = socket.local_addr().expect("local addr").port();
    (socket, Endpoint::new("127.0.0.1", port))
}

fn capture() -> CaptureConfig {
    CaptureConfig {
        width: 64,
        height: 48,
        target_fps: 120,
    }
}

#[test]
fn every_frame_arrives_as_one_decodable_bundle() {
    let (rx, endpoint) = receiver();
    let shape = GridShape::new(3, 4).unwrap();
    let mut sender = FeatureSender::connect(&endpoint)
        .expect("sender")
        .with_capacity_for(shape);

    let recorded = Arc::new(Mutex::new(Vec::new()));
    let mut realtime = RealtimeLoop::new(
        shape,
        AnalyzerSettings::default(),
        LoopOptions {
            target_fps: 120,
            report_interval: 0,
            max_frames: None,
            ..LoopOptions::default()
        },
    )
    .expect("loop")
    .with_preview(Box::new(Recorder(Arc::clone(&recorded))));

    let source = open_source("stub://bars?frames=5", &capture()).expect("source");
    let summary = realtime
        .run(CaptureGuard::acquire(source).expect("start"), &mut sender)
        .expect("run");

    assert_eq!(summary.stop_reason, StopReason::EndOfStream);
    assert_eq!(summary.frames_processed, 5);
    assert_eq!(summary.bundles_sent, 5);
    assert_eq!(summary.send_failures, 0);

    let sent = recorded.lock().unwrap().clone();
    assert_eq!(sent.len(), 5);

    let mut buf = vec![0u8; 65_536];
    for expected in &sent {
        let (len, _) = rx.recv_from(&mut buf).expect("datagram");
        let packet = OscPacket::decode(&buf[..len]).expect("osc packet");
        assert!(matches!(packet, OscPacket::Bundle(_)));
        assert_eq!(packet.messages().len(), 4 * shape.cell_count());
        let received = decode_feature_set(&packet).expect("grid snapshot");
        assert_eq!(&received, expected);
    }
    assert_eq!(summary.bytes_sent, sender.stats().bytes_sent);
}

#[test]
fn split_frame_contrast_peaks_on_the_boundary_row() {
    let (rx, endpoint) = receiver();
    // 64x48 split at y = 24. With 5 rows of 9 px the boundary falls inside row 2.
    let shape = GridShape::new(5, 2).unwrap();
    let mut sender = FeatureSender::connect(&endpoint).expect("sender");

    let source = open_source("stub://split", &capture()).expect("source");
    let mut guard = CaptureGuard::acquire(source).expect("start");
    let frame = guard
        .source_mut()
        .get_frame()
        .expect("frame")
        .expect("unbounded source");
    drop(guard);

    let features = webcam_osc::analyze_frame(&frame, shape).expect("analyze");
    sender.send(&features).expect("send");

    let mut buf = vec![0u8; 65_536];
    let (len, _) = rx.recv_from(&mut buf).expect("datagram");
    let received = decode_feature_set(&OscPacket::decode(&buf[..len]).unwrap()).unwrap();

    let boundary = received.get(2, 0).unwrap();
    let inside_top = received.get(0, 0).unwrap();
    let inside_bottom = received.get(4, 1).unwrap();
    assert!(boundary.contrast > inside_top.contrast);
    assert!(boundary.contrast > inside_bottom.contrast);
    assert!((inside_top.brightness - 1.0).abs() < 1e-6);
    assert!(inside_bottom.brightness.abs() < 1e-6);
}

#[test]
fn a_vanished_receiver_does_not_stop_the_stream() {
    // Reserve a port and release it so nothing listens there.
    let port = {
        let (socket, endpoint) = receiver();
        drop(socket);
        endpoint.port
    };
    let mut sender = FeatureSender::connect(&Endpoint::new("127.0.0.1", port)).expect("sender");

    let mut realtime = RealtimeLoop::new(
        GridShape::new(2, 2).unwrap(),
        AnalyzerSettings::default(),
        LoopOptions {
            target_fps: 120,
            report_interval: 0,
            max_frames: Some(6),
            ..LoopOptions::default()
        },
    )
    .expect("loop");
    let source = open_source("stub://gradient", &capture()).expect("source");
    let summary = realtime
        .run(CaptureGuard::acquire(source).expect("start"), &mut sender)
        .expect("transmission errors are not fatal");

    assert_eq!(summary.stop_reason, StopReason::FrameLimit);
    assert_eq!(summary.frames_processed, 6);
    assert_eq!(summary.bundles_sent + summary.send_failures, 6);
}

#[test]
fn oversized_grid_never_reaches_the_wire() {
    let (rx, endpoint) = receiver();
    rx.set_read_timeout(Some(Duration::from_millis(200))).expect("read timeout");
    let shape = GridShape::new(64, 64).unwrap();
    let sender = FeatureSender::connect(&endpoint).expect("sender");

    let built = RealtimeLoop::new(
        shape,
        AnalyzerSettings::default(),
        LoopOptions {
            max_frames: Some(5),
            ..LoopOptions::default()
        },
    );
    assert!(matches!(built, Err(webcam_osc::Error::Configuration(_))));
    assert_eq!(sender.stats().bundles_sent, 0);

    let mut buf = vec![0u8; 65_536];
    assert!(rx.recv_from(&mut buf).is_err());
}

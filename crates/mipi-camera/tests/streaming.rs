mod common;

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use camera_hal::EspErr;
use common::Rig;
use mipi_camera::{CameraError, CameraState, StreamStep, TELEMETRY_WINDOW};

#[test]
fn test_start_before_setup_fails_without_hardware() {
    let rig = Rig::new();
    let mut camera = rig.camera(rig.config());
    assert!(matches!(camera.start_streaming(), Err(CameraError::NotInitialized)));
    assert!(rig.board.log().is_empty());
}

#[test]
fn test_start_twice_is_idempotent() {
    let rig = Rig::new();
    let mut camera = rig.streaming();
    assert_eq!(rig.board.log().count("esp_cam_ctlr_start"), 1);

    camera.start_streaming().unwrap();
    assert!(camera.is_streaming());
    assert_eq!(rig.board.log().count("esp_cam_ctlr_start"), 1);
}

#[test]
fn test_stop_when_idle_is_noop() {
    let rig = Rig::new();
    let mut camera = rig.camera(rig.config());
    camera.setup().unwrap();

    camera.stop_streaming();
    assert!(!camera.is_streaming());
    assert!(!rig.board.log().contains("esp_cam_ctlr_stop"));
}

#[test]
fn test_stop_ignores_driver_errors() {
    let rig = Rig::new();
    let mut camera = rig.streaming();
    rig.board.fail("esp_cam_ctlr_stop", EspErr::Fail);

    camera.stop_streaming();
    assert_eq!(camera.state(), CameraState::Initialized);

    rig.board.clear_faults();
    camera.start_streaming().unwrap();
    assert!(camera.is_streaming());
}

#[test]
fn test_sensor_start_failure_keeps_idle() {
    let rig = Rig::new();
    let mut camera = rig.camera(rig.config());
    camera.setup().unwrap();
    rig.faults.start.store(true, Ordering::SeqCst);

    let err = camera.start_streaming().unwrap_err();
    assert!(matches!(err, CameraError::StreamStart { step: StreamStep::Sensor, .. }));
    assert_eq!(camera.state(), CameraState::Initialized);
    assert!(!rig.board.log().contains("esp_cam_ctlr_start"));
}

#[test]
fn test_capture_requires_streaming() {
    let rig = Rig::new();
    let mut camera = rig.streaming();
    let csi = rig.board.csi();
    csi.complete_full_transfer().unwrap();
    camera.stop_streaming();

    assert!(matches!(camera.capture_frame(), Err(CameraError::NotStreaming)));
    camera.start_streaming().unwrap();
    // The pending frame survived the rejected capture
    assert!(camera.capture_frame().unwrap());
}

#[test]
fn test_capture_selects_completed_buffer() {
    let rig = Rig::new();
    let mut camera = rig.streaming();
    let csi = rig.board.csi();

    assert!(!camera.capture_frame().unwrap());

    let first = csi.complete_full_transfer().unwrap();
    assert!(camera.capture_frame().unwrap());
    let data = camera.frame_data().unwrap();
    assert_eq!(data.as_ptr() as usize, first.buffer);
    assert!(data.iter().all(|&b| b == first.fill));
    assert!(!camera.capture_frame().unwrap());

    let second = csi.complete_full_transfer().unwrap();
    assert_ne!(second.buffer, first.buffer);
    assert!(camera.capture_frame().unwrap());
    assert_eq!(camera.frame_data().unwrap().as_ptr() as usize, second.buffer);
}

#[test]
fn test_held_frame_survives_later_transfers() {
    let rig = Rig::new();
    let mut camera = rig.streaming();
    let csi = rig.board.csi();

    let first = csi.complete_full_transfer().unwrap();
    assert!(camera.capture_frame().unwrap());
    let data = camera.frame_data().unwrap();

    let second = csi.complete_full_transfer().unwrap();
    let third = csi.complete_full_transfer().unwrap();
    assert_ne!(second.buffer, first.buffer);
    assert_ne!(third.buffer, first.buffer);
    assert_eq!(data.as_ptr() as usize, first.buffer);
    assert!(data.iter().all(|&b| b == first.fill));

    // Newest completion is the one delivered
    assert!(camera.capture_frame().unwrap());
    let data = camera.frame_data().unwrap();
    assert_eq!(data.as_ptr() as usize, third.buffer);
    assert!(data.iter().all(|&b| b == third.fill));
    assert!(!camera.capture_frame().unwrap());
}

#[test]
fn test_most_recent_frame_wins() {
    let rig = Rig::new();
    let mut camera = rig.streaming();
    let csi = rig.board.csi();

    csi.complete_full_transfer().unwrap();
    csi.complete_full_transfer().unwrap();
    let third = csi.complete_full_transfer().unwrap();

    assert!(camera.capture_frame().unwrap());
    assert_eq!(camera.frame_data().unwrap().as_ptr() as usize, third.buffer);
    assert!(!camera.capture_frame().unwrap());
}

#[test]
fn test_zero_size_transfer_is_dropped() {
    let rig = Rig::new();
    let mut camera = rig.streaming();
    let csi = rig.board.csi();

    let first = csi.complete_transfer(0).unwrap();
    assert!(!camera.capture_frame().unwrap());
    assert_eq!(camera.dropped_transfers(), 1);

    // The receiver is handed the same slot again
    let retry = csi.complete_full_transfer().unwrap();
    assert_eq!(retry.buffer, first.buffer);
    assert!(camera.capture_frame().unwrap());
}

#[test]
fn test_telemetry_window() {
    let rig = Rig::new();
    let mut camera = rig.streaming();
    let csi = rig.board.csi();
    let start = Instant::now();

    for _ in 0..90 {
        csi.complete_full_transfer().unwrap();
    }
    // 27 polls with a pending frame, 3 without
    for _ in 0..27 {
        assert!(camera.poll_at(start).is_none());
    }
    assert!(camera.capture_frame().unwrap());
    for _ in 0..2 {
        assert!(camera.poll_at(start).is_none());
    }

    let report = camera
        .poll_at(start + TELEMETRY_WINDOW + Duration::from_millis(1))
        .unwrap();
    assert_eq!((report.ready, report.not_ready), (27, 3));
    assert_eq!(report.sensor_fps(), 30.0);
    assert_eq!(report.ready_rate(), 90.0);

    // Next window starts from zero
    let next = camera
        .poll_at(start + TELEMETRY_WINDOW * 3)
        .unwrap();
    assert_eq!(next.frames, 0);
}

#[test]
fn test_poll_is_idle_when_not_streaming() {
    let rig = Rig::new();
    let mut camera = rig.camera(rig.config());
    camera.setup().unwrap();
    assert!(camera
        .poll_at(Instant::now() + TELEMETRY_WINDOW * 2)
        .is_none());
}

#[test]
fn test_free_running_generator() {
    let rig = Rig::new();
    rig.board.csi().set_frame_rate(Some(200));
    let mut camera = rig.streaming();

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut captured = false;
    while Instant::now() < deadline {
        if camera.capture_frame().unwrap() {
            captured = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(captured);
    let frame = camera.frame().unwrap();
    assert_eq!((frame.width(), frame.height()), (1280, 800));
    drop(camera);
    assert!(!rig.board.csi().is_running());
}

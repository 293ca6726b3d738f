mod common;

use std::sync::atomic::Ordering;

use camera_hal::EspErr;
use camera_hal::MemoryCaps;
use common::{Rig, STUB_PID};
use mipi_camera::{BringUpStage, CameraError, CameraState};

/// First hardware operation of each stage, in order
const STAGE_OPS: [(BringUpStage, &str); 7] = [
    (BringUpStage::Clock, "ledc_timer_config"),
    (BringUpStage::Reset, "gpio_set_direction"),
    (BringUpStage::PowerRail, "esp_ldo_acquire_channel"),
    (BringUpStage::Csi, "esp_cam_new_csi_ctlr"),
    (BringUpStage::Isp, "esp_isp_new_processor"),
    (BringUpStage::BufferAlloc, "heap_caps_aligned_alloc"),
    (BringUpStage::AutoStart, "esp_cam_ctlr_start"),
];

fn later_ops(stage: BringUpStage) -> Vec<&'static str> {
    STAGE_OPS
        .iter()
        .skip_while(|(s, _)| *s != stage)
        .skip(1)
        .map(|(_, op)| *op)
        .collect()
}

#[test]
fn test_full_bring_up_order() {
    let rig = Rig::new();
    let mut camera = rig.camera(rig.config().with_auto_start(true));
    camera.setup().unwrap();
    assert_eq!(camera.state(), CameraState::Streaming);

    let log = rig.board.log();
    let positions: Vec<usize> = STAGE_OPS
        .iter()
        .map(|(_, op)| log.position(op).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", log.entries());
    assert!(log.position("esp_cam_ctlr_enable") < log.position("esp_isp_new_processor"));
    assert!(log.position("esp_isp_enable") < log.position("heap_caps_aligned_alloc"));
}

#[test]
fn test_each_hardware_stage_failure_aborts() {
    let failing = [
        (BringUpStage::Clock, "ledc_channel_config"),
        (BringUpStage::Reset, "gpio_set_level"),
        (BringUpStage::PowerRail, "esp_ldo_acquire_channel"),
        (BringUpStage::Csi, "esp_cam_ctlr_register_event_callbacks"),
        (BringUpStage::Isp, "esp_isp_new_processor"),
        (BringUpStage::BufferAlloc, "heap_caps_aligned_alloc"),
        (BringUpStage::AutoStart, "esp_cam_ctlr_start"),
    ];

    for (stage, op) in failing {
        let rig = Rig::new();
        rig.board.fail(op, EspErr::Fail);
        let mut camera = rig.camera(rig.config().with_auto_start(true));

        assert!(camera.setup().is_err(), "{op} should fail bring-up");
        assert_eq!(camera.state(), CameraState::Failed);
        assert_eq!(camera.failed_stage(), Some(stage));
        for later in later_ops(stage) {
            assert!(
                !rig.board.log().contains(later),
                "{later} ran after {stage} failed"
            );
        }
    }
}

#[test]
fn test_sensor_failures_abort_before_power() {
    for fault in ["read_id", "wrong_id", "init"] {
        let rig = Rig::new();
        match fault {
            "read_id" => rig.faults.read_id.store(true, Ordering::SeqCst),
            "wrong_id" => rig.faults.wrong_id.store(true, Ordering::SeqCst),
            _ => rig.faults.init.store(true, Ordering::SeqCst),
        }
        let mut camera = rig.camera(rig.config());
        let err = camera.setup().unwrap_err();

        match fault {
            "read_id" => assert!(matches!(err, CameraError::SensorCommunication { .. })),
            "wrong_id" => assert!(matches!(
                err,
                CameraError::IdMismatch {
                    expected: STUB_PID,
                    actual: 0xBEEF
                }
            )),
            _ => assert!(matches!(err, CameraError::SensorCommunication { .. })),
        }
        assert_eq!(camera.failed_stage(), Some(BringUpStage::SensorInit));
        assert!(!rig.board.log().contains("esp_ldo_acquire_channel"));
        assert!(camera.is_failed());
    }
}

#[test]
fn test_config_errors_touch_no_hardware() {
    let rig = Rig::new();
    let mut camera = rig.camera(rig.config().with_reset_pin(99));
    assert!(matches!(camera.setup(), Err(CameraError::InvalidPin { pin: 99, .. })));
    assert!(rig.board.log().is_empty());

    let rig = Rig::new();
    let mut camera = rig.camera(mipi_camera::CameraConfig::new("imx477"));
    let err = camera.setup().unwrap_err();
    assert!(matches!(err, CameraError::UnknownSensor(_)));
    assert!(err.is_config());
    assert!(rig.board.log().is_empty());
    assert!(camera.is_failed());
}

#[test]
fn test_isp_enable_failure_deletes_processor() {
    let rig = Rig::new();
    rig.board.fail("esp_isp_enable", EspErr::InvalidState);
    let mut camera = rig.camera(rig.config());

    assert!(camera.setup().is_err());
    assert_eq!(camera.failed_stage(), Some(BringUpStage::Isp));
    assert_eq!(rig.board.live_isp_processors(), 0);
    assert!(!rig.board.log().contains("heap_caps_aligned_alloc"));
}

#[test]
fn test_partial_buffer_allocation_frees_first() {
    let rig = Rig::new();
    rig.board.fail_allocation(1);
    let mut camera = rig.camera(rig.config());

    assert!(camera.setup().is_err());
    assert_eq!(camera.failed_stage(), Some(BringUpStage::BufferAlloc));
    assert_eq!(rig.board.memory().live_allocations(), 0);
    assert_eq!(camera.frame_data(), None);
}

#[test]
fn test_buffer_size_follows_geometry() {
    let rig = Rig::new();
    let mut camera = rig.camera(rig.config());
    camera.setup().unwrap();

    let requests = rig.board.memory().requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.size, 2_048_000);
        assert_eq!(request.align, 64);
        assert!(request.caps.contains(MemoryCaps::DMA));
    }
    assert_eq!(camera.frame_len(), 2_048_000);

    let csi = rig.board.csi().config().unwrap();
    assert_eq!((csi.h_res, csi.v_res), (1280, 800));
    assert_eq!((csi.data_lane_num, csi.lane_bit_rate_mbps), (2, 800));
    assert_eq!(rig.board.isp_config().unwrap().bayer_order, 3);
}

#[test]
fn test_ldo_request() {
    let rig = Rig::new();
    rig.camera(rig.config()).setup().unwrap();
    assert!(rig
        .board
        .log()
        .entries()
        .contains(&"esp_ldo_acquire_channel(chan=3, mv=2500)".to_string()));
}

#[test]
fn test_setup_twice_is_noop() {
    let rig = Rig::new();
    let mut camera = rig.camera(rig.config());
    camera.setup().unwrap();
    let calls = rig.board.log().len();

    camera.setup().unwrap();
    assert_eq!(rig.board.log().len(), calls);
    assert!(camera.is_initialized());
}

//! Shared fixtures: a scriptable stub sensor on a simulated board

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use camera_hal::sim::SimBoard;
use camera_hal::{EspErr, HalError};
use camera_sensors::{BayerPattern, SensorDriver, SensorError, SensorRegistry};
use mipi_camera::{CameraConfig, MipiCamera, TimingConfig};

pub const STUB_PID: u16 = 0x1234;

/// Failure switches for [`StubSensor`], shared with the test
#[derive(Default)]
pub struct StubFaults {
    pub read_id: AtomicBool,
    pub wrong_id: AtomicBool,
    pub init: AtomicBool,
    pub start: AtomicBool,
}

/// 1280x800, two lanes at 800 Mbps
pub struct StubSensor {
    faults: Arc<StubFaults>,
}

fn bus_error(op: &'static str) -> SensorError {
    SensorError::Bus(HalError::new(op, EspErr::Timeout))
}

impl SensorDriver for StubSensor {
    fn name(&self) -> &'static str {
        "STUB"
    }

    fn width(&self) -> u32 {
        1280
    }

    fn height(&self) -> u32 {
        800
    }

    fn lane_count(&self) -> u8 {
        2
    }

    fn bayer_pattern(&self) -> BayerPattern {
        BayerPattern::Rggb
    }

    fn lane_bitrate_mbps(&self) -> u32 {
        800
    }

    fn pid(&self) -> u16 {
        STUB_PID
    }

    fn read_id(&self) -> Result<u16, SensorError> {
        if self.faults.read_id.load(Ordering::SeqCst) {
            return Err(bus_error("sccb_read"));
        }
        if self.faults.wrong_id.load(Ordering::SeqCst) {
            return Ok(0xBEEF);
        }
        Ok(STUB_PID)
    }

    fn init(&mut self) -> Result<(), SensorError> {
        if self.faults.init.load(Ordering::SeqCst) {
            return Err(bus_error("sccb_write"));
        }
        Ok(())
    }

    fn start_stream(&mut self) -> Result<(), SensorError> {
        if self.faults.start.load(Ordering::SeqCst) {
            return Err(bus_error("sccb_write"));
        }
        Ok(())
    }

    fn stop_stream(&mut self) -> Result<(), SensorError> {
        Ok(())
    }
}

pub struct Rig {
    pub board: SimBoard,
    pub faults: Arc<StubFaults>,
}

impl Rig {
    pub fn new() -> Self {
        Self {
            board: SimBoard::new(),
            faults: Arc::new(StubFaults::default()),
        }
    }

    pub fn config(&self) -> CameraConfig {
        CameraConfig::new("stub")
            .with_reset_pin(36)
            .with_external_clock(24, 24_000_000)
            .with_auto_start(false)
            .with_timing(TimingConfig::immediate())
    }

    pub fn camera(&self, config: CameraConfig) -> MipiCamera {
        let faults = self.faults.clone();
        let registry = SensorRegistry::builtin().with_entry("stub", move |_ctx| {
            Box::new(StubSensor {
                faults: faults.clone(),
            })
        });
        MipiCamera::new(config, self.board.peripherals()).with_registry(registry)
    }

    /// Camera brought up and streaming
    pub fn streaming(&self) -> MipiCamera {
        let mut camera = self.camera(self.config());
        camera.setup().expect("setup");
        camera.start_streaming().expect("start");
        camera
    }
}

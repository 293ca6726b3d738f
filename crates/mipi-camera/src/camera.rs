//! Capture state machine
//!
//! Bring-up runs strictly in [`BringUpStage`] order and is all-or-nothing:
//! the first failing step leaves the camera [`CameraState::Failed`] for good.
//! After that the camera toggles between idle and streaming, and the poll
//! loop turns interrupt-side frame completions into a "frame ready" answer
//! for [`MipiCamera::capture_frame`].

use std::sync::Arc;
use std::time::Instant;

use camera_hal::{CsiEventHandler, Peripherals};
use camera_sensors::{SensorContext, SensorDriver, SensorGeometry, SensorRegistry};
use metrics::counter;
use tracing::{debug, error, info, warn};

use crate::clock::ExternalClock;
use crate::csi::CsiReceiver;
use crate::error::{BringUpStage, CameraError, StreamStep};
use crate::exchange::FrameExchange;
use crate::frame::Rgb565Frame;
use crate::frame_pool::FrameBufferPool;
use crate::isp::ImageProcessor;
use crate::params::HardwareParams;
use crate::power::PowerRail;
use crate::reset;
use crate::telemetry::{TelemetryReport, TelemetryWindow};
use crate::CameraConfig;

/// Lifecycle of a camera instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    Uninitialized,
    /// Brought up, not capturing
    Initialized,
    Streaming,
    /// A bring-up step or the auto-start failed; terminal
    Failed,
}

/// MIPI-CSI camera driver
pub struct MipiCamera {
    config: CameraConfig,
    params: HardwareParams,
    registry: SensorRegistry,
    peripherals: Peripherals,
    state: CameraState,
    failed_stage: Option<BringUpStage>,

    sensor: Option<Box<dyn SensorDriver>>,
    geometry: Option<SensorGeometry>,
    clock: Option<ExternalClock>,
    power: Option<PowerRail>,
    csi: Option<CsiReceiver>,
    isp: Option<ImageProcessor>,
    buffers: Option<FrameBufferPool>,

    exchange: Arc<FrameExchange>,
    /// Slot exposed to the consumer
    current: Option<usize>,
    telemetry: TelemetryWindow,
}

impl MipiCamera {
    /// Create an unconfigured camera using the built-in sensor registry
    pub fn new(config: CameraConfig, peripherals: Peripherals) -> Self {
        Self {
            config,
            params: HardwareParams::default(),
            registry: SensorRegistry::builtin(),
            peripherals,
            state: CameraState::Uninitialized,
            failed_stage: None,
            sensor: None,
            geometry: None,
            clock: None,
            power: None,
            csi: None,
            isp: None,
            buffers: None,
            exchange: Arc::new(FrameExchange::new()),
            current: None,
            telemetry: TelemetryWindow::new(Instant::now()),
        }
    }

    pub fn with_registry(mut self, registry: SensorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_params(mut self, params: HardwareParams) -> Self {
        self.params = params;
        self
    }

    /// Run the bring-up sequence, then start streaming if `auto_start` is set
    pub fn setup(&mut self) -> Result<(), CameraError> {
        match self.state {
            CameraState::Failed => return Err(CameraError::DeviceFailed),
            CameraState::Initialized | CameraState::Streaming => {
                warn!("Camera already set up");
                return Ok(());
            }
            CameraState::Uninitialized => {}
        }

        info!("Init MIPI Camera ({})", self.config.sensor_type);
        if let Err(e) = self.config.validate(&self.registry) {
            error!("Invalid camera configuration: {}", e);
            self.state = CameraState::Failed;
            return Err(e);
        }

        let steps: [(BringUpStage, fn(&mut Self) -> Result<(), CameraError>); 8] = [
            (BringUpStage::Clock, Self::start_clock),
            (BringUpStage::Reset, Self::reset_sensor),
            (BringUpStage::SensorCreate, Self::create_sensor),
            (BringUpStage::SensorInit, Self::init_sensor),
            (BringUpStage::PowerRail, Self::acquire_power),
            (BringUpStage::Csi, Self::bring_up_csi),
            (BringUpStage::Isp, Self::bring_up_isp),
            (BringUpStage::BufferAlloc, Self::allocate_buffers),
        ];
        for (stage, step) in steps {
            debug!("Bring-up: {}", stage);
            if let Err(e) = step(self) {
                return Err(self.fail(stage, e));
            }
        }

        self.state = CameraState::Initialized;
        info!("Camera ready");

        if self.config.auto_start {
            self.peripherals
                .delay
                .delay_ms(self.config.timing.auto_start_delay_ms);
            if let Err(e) = self.start_streaming() {
                return Err(self.fail(BringUpStage::AutoStart, e));
            }
        }
        Ok(())
    }

    fn fail(&mut self, stage: BringUpStage, err: CameraError) -> CameraError {
        error!("Bring-up failed at {}: {}", stage, err);
        self.state = CameraState::Failed;
        self.failed_stage = Some(stage);
        err
    }

    fn start_clock(&mut self) -> Result<(), CameraError> {
        let Some(clock) = &self.config.external_clock else {
            info!("No external clock configured, sensor uses its internal oscillator");
            return Ok(());
        };
        let pin = clock
            .pin
            .ok_or(CameraError::MissingPin("external_clock.pin"))?;
        let started = ExternalClock::start(
            self.peripherals.ledc.as_mut(),
            self.peripherals.delay.as_ref(),
            pin,
            clock.frequency_hz,
            &self.params.clock,
            self.config.timing.clock_settle_ms,
        )
        .map_err(CameraError::hal(BringUpStage::Clock))?;
        self.clock = Some(started);
        Ok(())
    }

    fn reset_sensor(&mut self) -> Result<(), CameraError> {
        let Some(pin) = self.config.reset_pin else {
            return Ok(());
        };
        reset::pulse(
            self.peripherals.gpio.as_mut(),
            self.peripherals.delay.as_ref(),
            pin,
            self.config.timing.reset_low_ms,
            self.config.timing.reset_high_ms,
        )
        .map_err(CameraError::hal(BringUpStage::Reset))
    }

    fn create_sensor(&mut self) -> Result<(), CameraError> {
        let ctx = SensorContext {
            sccb: self.peripherals.sccb.clone(),
            delay: self.peripherals.delay.clone(),
        };
        let sensor = self
            .registry
            .create(&self.config.sensor_type, ctx)
            .map_err(CameraError::sensor(BringUpStage::SensorCreate))?;
        info!("Sensor driver created: {}", sensor.name());
        self.sensor = Some(sensor);
        Ok(())
    }

    fn init_sensor(&mut self) -> Result<(), CameraError> {
        let sensor = self.sensor.as_mut().ok_or(CameraError::NotInitialized)?;

        let geometry = sensor.geometry();
        if geometry.width == 0 || geometry.height == 0 || geometry.lane_count == 0 {
            return Err(CameraError::InvalidConfig(format!(
                "{} reports an empty mode: {}x{}, {} lane(s)",
                sensor.name(),
                geometry.width,
                geometry.height,
                geometry.lane_count
            )));
        }
        info!(
            "Sensor: {}x{}, {} lane(s), {} Mbps, bayer {}",
            geometry.width,
            geometry.height,
            geometry.lane_count,
            geometry.lane_bitrate_mbps,
            geometry.bayer
        );

        let expected = sensor.pid();
        let actual = sensor.read_id().map_err(|e| {
            error!("Failed to read sensor ID: {}", e);
            CameraError::sensor(BringUpStage::SensorInit)(e)
        })?;
        if actual != expected {
            error!(
                "Wrong sensor: read PID 0x{:04X}, expected 0x{:04X}",
                actual, expected
            );
            return Err(CameraError::IdMismatch { expected, actual });
        }
        info!("Sensor ID 0x{:04X}", actual);

        sensor
            .init()
            .map_err(CameraError::sensor(BringUpStage::SensorInit))?;
        self.peripherals
            .delay
            .delay_ms(self.config.timing.sensor_settle_ms);

        self.geometry = Some(geometry);
        Ok(())
    }

    fn acquire_power(&mut self) -> Result<(), CameraError> {
        let rail = PowerRail::acquire(self.peripherals.ldo.as_mut(), &self.params.ldo)
            .map_err(CameraError::hal(BringUpStage::PowerRail))?;
        self.power = Some(rail);
        Ok(())
    }

    fn bring_up_csi(&mut self) -> Result<(), CameraError> {
        let geometry = self.geometry.ok_or(CameraError::NotInitialized)?;
        let handler: Arc<dyn CsiEventHandler> = self.exchange.clone();
        let receiver = CsiReceiver::bring_up(
            self.peripherals.csi.as_mut(),
            &geometry,
            &self.params.csi,
            handler,
        )
        .map_err(CameraError::hal(BringUpStage::Csi))?;
        self.csi = Some(receiver);
        Ok(())
    }

    fn bring_up_isp(&mut self) -> Result<(), CameraError> {
        let geometry = self.geometry.ok_or(CameraError::NotInitialized)?;
        let isp = ImageProcessor::bring_up(self.peripherals.isp.as_mut(), &geometry, &self.params.isp)
            .map_err(CameraError::hal(BringUpStage::Isp))?;
        self.isp = Some(isp);
        Ok(())
    }

    fn allocate_buffers(&mut self) -> Result<(), CameraError> {
        let geometry = self.geometry.ok_or(CameraError::NotInitialized)?;
        let size = self
            .params
            .buffers
            .frame_size(geometry.width, geometry.height);
        let pool = FrameBufferPool::allocate(
            self.peripherals.memory.clone(),
            size,
            &self.params.buffers,
        )
        .map_err(CameraError::hal(BringUpStage::BufferAlloc))?;

        self.exchange.install_buffers(pool.as_ptrs(), size);
        self.current = Some(0);
        self.buffers = Some(pool);
        info!("Frame buffers: 2 x {} bytes", size);
        Ok(())
    }

    /// Start the sensor stream, then the receiver.
    ///
    /// A no-op when already streaming. On failure the camera stays idle.
    pub fn start_streaming(&mut self) -> Result<(), CameraError> {
        match self.state {
            CameraState::Uninitialized => return Err(CameraError::NotInitialized),
            CameraState::Failed => return Err(CameraError::DeviceFailed),
            CameraState::Streaming => {
                warn!("Already streaming");
                return Ok(());
            }
            CameraState::Initialized => {}
        }
        let (Some(sensor), Some(csi)) = (self.sensor.as_mut(), self.csi.as_mut()) else {
            return Err(CameraError::NotInitialized);
        };

        info!("Start streaming");
        self.exchange.reset_counters();
        self.telemetry.reset(Instant::now());

        if let Err(e) = sensor.start_stream() {
            error!("Sensor start failed: {}", e);
            return Err(CameraError::StreamStart {
                step: StreamStep::Sensor,
                source: Box::new(e),
            });
        }
        self.peripherals
            .delay
            .delay_ms(self.config.timing.stream_settle_ms);

        if let Err(e) = csi.start() {
            error!("CSI start failed: {}", e);
            if let Err(stop_err) = sensor.stop_stream() {
                warn!("Sensor stop after failed CSI start: {}", stop_err);
            }
            return Err(CameraError::StreamStart {
                step: StreamStep::Csi,
                source: Box::new(e),
            });
        }

        self.state = CameraState::Streaming;
        info!("Streaming active");
        Ok(())
    }

    /// Stop the receiver, then the sensor. Always succeeds; driver errors
    /// are logged.
    pub fn stop_streaming(&mut self) {
        if self.state != CameraState::Streaming {
            return;
        }
        if let Some(csi) = self.csi.as_mut() {
            csi.stop();
        }
        if let Some(sensor) = self.sensor.as_mut() {
            if let Err(e) = sensor.stop_stream() {
                warn!("Sensor stop failed: {}", e);
            }
        }
        self.state = CameraState::Initialized;
        info!("Streaming stopped");
    }

    /// Claim the most recently completed frame.
    ///
    /// `Ok(true)` moves [`frame_data`](Self::frame_data) to the new frame,
    /// `Ok(false)` means nothing new arrived since the last call.
    pub fn capture_frame(&mut self) -> Result<bool, CameraError> {
        if self.state != CameraState::Streaming {
            return Err(CameraError::NotStreaming);
        }
        match self.exchange.take_frame() {
            Some(slot) => {
                self.current = Some(slot);
                counter!("mipi_camera.frames_captured").increment(1);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Periodic bookkeeping; returns a report whenever a window closes
    pub fn poll(&mut self) -> Option<TelemetryReport> {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> Option<TelemetryReport> {
        if self.state != CameraState::Streaming {
            return None;
        }
        self.telemetry.sample(self.exchange.is_frame_ready());
        if !self.telemetry.is_due(now) {
            return None;
        }

        let report = self
            .telemetry
            .finish(now, self.exchange.take_frames_received());
        info!(
            "Sensor: {:.1} fps | frame_ready: {:.1}% of polls",
            report.sensor_fps(),
            report.ready_rate()
        );
        report.publish();
        Some(report)
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == CameraState::Streaming
    }

    pub fn is_initialized(&self) -> bool {
        matches!(
            self.state,
            CameraState::Initialized | CameraState::Streaming
        )
    }

    pub fn is_failed(&self) -> bool {
        self.state == CameraState::Failed
    }

    /// Step that moved the camera to [`CameraState::Failed`]
    pub fn failed_stage(&self) -> Option<BringUpStage> {
        self.failed_stage
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn geometry(&self) -> Option<SensorGeometry> {
        self.geometry
    }

    pub fn sensor_name(&self) -> Option<&'static str> {
        self.sensor.as_ref().map(|sensor| sensor.name())
    }

    pub fn image_width(&self) -> u32 {
        self.geometry.map_or(0, |g| g.width)
    }

    pub fn image_height(&self) -> u32 {
        self.geometry.map_or(0, |g| g.height)
    }

    /// Bytes per frame
    pub fn frame_len(&self) -> usize {
        self.buffers.as_ref().map_or(0, FrameBufferPool::buffer_size)
    }

    /// Frame claimed by the last successful `capture_frame`. The receiver
    /// does not write this slot while it is held, and the borrow ends before
    /// the next claim can release it.
    pub fn frame_data(&self) -> Option<&[u8]> {
        self.buffers.as_ref()?.slot(self.current?)
    }

    pub fn frame(&self) -> Option<Rgb565Frame<'_>> {
        Rgb565Frame::new(self.frame_data()?, self.image_width(), self.image_height())
    }

    /// Transfers that completed with zero bytes since streaming started
    pub fn dropped_transfers(&self) -> u32 {
        self.exchange.dropped_transfers()
    }

    /// Human-readable configuration summary
    pub fn diagnostics(&self) -> String {
        let mut lines = vec!["MIPI Camera:".to_string()];
        match &self.sensor {
            Some(sensor) => {
                lines.push(format!("  Sensor: {}", sensor.name()));
                lines.push(format!("  PID: 0x{:04X}", sensor.pid()));
            }
            None => lines.push(format!(
                "  Sensor: {} (driver not loaded)",
                self.config.sensor_type
            )),
        }
        lines.push(format!(
            "  Resolution: {}x{}",
            self.image_width(),
            self.image_height()
        ));
        lines.push("  Format: RGB565".to_string());
        match &self.geometry {
            Some(g) => {
                lines.push(format!("  Lanes: {}", g.lane_count));
                lines.push(format!("  Bayer: {}", g.bayer));
            }
            None => {
                lines.push("  Lanes: -".to_string());
                lines.push("  Bayer: -".to_string());
            }
        }
        lines.push(match &self.config.external_clock {
            Some(clock) => {
                let pin = clock
                    .pin
                    .map_or_else(|| "unset".to_string(), |pin| pin.to_string());
                format!("  External Clock: GPIO{} @ {} Hz", pin, clock.frequency_hz)
            }
            None => "  External Clock: none (internal oscillator)".to_string(),
        });
        if let Some(stage) = self.failed_stage {
            lines.push(format!("  Failed at: {}", stage));
        }
        lines.push(format!(
            "  Streaming: {}",
            if self.is_streaming() { "YES" } else { "NO" }
        ));
        lines.join("\n")
    }

    pub fn dump_config(&self) {
        for line in self.diagnostics().lines() {
            info!("{}", line);
        }
    }
}

impl Drop for MipiCamera {
    fn drop(&mut self) {
        self.stop_streaming();
        // Receiver goes before the buffers it writes into
        self.csi.take();
        self.isp.take();
        self.buffers.take();
        self.power.take();
        if let Some(clock) = self.clock.take() {
            clock.stop(self.peripherals.ledc.as_mut());
        }
    }
}

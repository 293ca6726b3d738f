//! Capture throughput window

use std::time::{Duration, Instant};

use metrics::gauge;

/// Reporting period of the poll loop
pub const TELEMETRY_WINDOW: Duration = Duration::from_secs(3);

/// Ready/not-ready samples for the current window.
/// The frame count itself lives in the frame exchange.
#[derive(Debug, Clone)]
pub struct TelemetryWindow {
    started: Instant,
    length: Duration,
    ready: u32,
    not_ready: u32,
}

/// Figures for one completed window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryReport {
    pub frames: u32,
    pub ready: u32,
    pub not_ready: u32,
    pub window: Duration,
}

impl TelemetryReport {
    pub fn sensor_fps(&self) -> f64 {
        self.frames as f64 / self.window.as_secs_f64()
    }

    /// Share of poll samples that saw a pending frame, in percent
    pub fn ready_rate(&self) -> f64 {
        let samples = self.ready + self.not_ready;
        if samples == 0 {
            return 0.0;
        }
        self.ready as f64 / samples as f64 * 100.0
    }

    /// Export as gauges
    pub fn publish(&self) {
        gauge!("mipi_camera.sensor_fps").set(self.sensor_fps());
        gauge!("mipi_camera.frame_ready_rate").set(self.ready_rate());
    }
}

impl TelemetryWindow {
    pub fn new(now: Instant) -> Self {
        Self::with_length(now, TELEMETRY_WINDOW)
    }

    pub fn with_length(now: Instant, length: Duration) -> Self {
        Self {
            started: now,
            length,
            ready: 0,
            not_ready: 0,
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.started = now;
        self.ready = 0;
        self.not_ready = 0;
    }

    pub fn sample(&mut self, frame_ready: bool) {
        if frame_ready {
            self.ready += 1;
        } else {
            self.not_ready += 1;
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.length
    }

    /// Close the window with `frames` received and start the next one
    pub fn finish(&mut self, now: Instant, frames: u32) -> TelemetryReport {
        let report = TelemetryReport {
            frames,
            ready: self.ready,
            not_ready: self.not_ready,
            window: self.length,
        };
        self.reset(now);
        report
    }
}

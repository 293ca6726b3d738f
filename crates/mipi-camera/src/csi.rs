//! CSI receiver

use std::sync::Arc;

use camera_hal::{CsiConfig, CsiController, CsiEventHandler, CsiHost, HalError};
use camera_sensors::SensorGeometry;
use tracing::{debug, info, warn};

use crate::params::CsiParams;

/// A created, callback-wired and enabled CSI controller
pub struct CsiReceiver {
    ctlr: Box<dyn CsiController>,
    running: bool,
}

impl CsiReceiver {
    /// Create the controller for `geometry`, register `handler` and enable it.
    /// Capture does not begin until [`start`](Self::start).
    pub fn bring_up(
        host: &mut dyn CsiHost,
        geometry: &SensorGeometry,
        params: &CsiParams,
        handler: Arc<dyn CsiEventHandler>,
    ) -> Result<Self, HalError> {
        let config = CsiConfig {
            ctlr_id: params.ctlr_id,
            h_res: geometry.width,
            v_res: geometry.height,
            lane_bit_rate_mbps: geometry.lane_bitrate_mbps,
            input_color: params.input_color,
            output_color: params.output_color,
            data_lane_num: geometry.lane_count,
            byte_swap_en: params.byte_swap,
            queue_items: params.queue_items,
        };
        let mut ctlr = host.new_controller(&config)?;
        ctlr.register_event_callbacks(handler)?;
        ctlr.enable()?;

        info!(
            "CSI: {}x{}, {} lane(s) @ {} Mbps",
            geometry.width, geometry.height, geometry.lane_count, geometry.lane_bitrate_mbps
        );
        Ok(Self {
            ctlr,
            running: false,
        })
    }

    pub fn start(&mut self) -> Result<(), HalError> {
        self.ctlr.start()?;
        self.running = true;
        Ok(())
    }

    /// Stop capture; errors are logged, never returned
    pub fn stop(&mut self) {
        if let Err(e) = self.ctlr.stop() {
            warn!("CSI stop failed: {}", e);
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Drop for CsiReceiver {
    fn drop(&mut self) {
        if self.running {
            debug!("Stopping CSI before teardown");
            self.stop();
        }
    }
}

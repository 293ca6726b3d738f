//! Image signal processor (RAW8 Bayer to RGB565)

use camera_hal::{HalError, IspConfig, IspHost, IspProcessor};
use camera_sensors::SensorGeometry;
use tracing::{debug, error, info};

use crate::params::IspParams;

/// An enabled ISP processor; disabled and deleted when dropped
pub struct ImageProcessor {
    processor: Box<dyn IspProcessor>,
}

impl ImageProcessor {
    pub fn bring_up(
        host: &mut dyn IspHost,
        geometry: &SensorGeometry,
        params: &IspParams,
    ) -> Result<Self, HalError> {
        let config = IspConfig {
            input_source: params.input_source,
            input_color: params.input_color,
            output_color: params.output_color,
            h_res: geometry.width,
            v_res: geometry.height,
            has_line_start_packet: params.line_start_packet,
            has_line_end_packet: params.line_end_packet,
            clk_hz: params.clk_hz,
            bayer_order: geometry.bayer.code(),
        };
        let mut processor = host.new_processor(&config)?;
        if let Err(e) = processor.enable() {
            error!("ISP enable failed: {}", e);
            drop(processor);
            return Err(e);
        }

        info!("ISP: {} Hz, bayer {}", params.clk_hz, geometry.bayer);
        Ok(Self { processor })
    }
}

impl Drop for ImageProcessor {
    fn drop(&mut self) {
        if let Err(e) = self.processor.disable() {
            debug!("ISP disable on teardown failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_hal::sim::SimBoard;
    use camera_hal::EspErr;
    use camera_sensors::BayerPattern;

    fn geometry() -> SensorGeometry {
        SensorGeometry {
            width: 800,
            height: 640,
            lane_count: 2,
            bayer: BayerPattern::Bggr,
            lane_bitrate_mbps: 200,
        }
    }

    #[test]
    fn test_config_follows_geometry() {
        let board = SimBoard::new();
        let mut p = board.peripherals();
        let isp = ImageProcessor::bring_up(p.isp.as_mut(), &geometry(), &IspParams::default()).unwrap();

        let config = board.isp_config().unwrap();
        assert_eq!((config.h_res, config.v_res), (800, 640));
        assert_eq!(config.clk_hz, 120_000_000);
        assert_eq!(config.bayer_order, 0);
        assert!(!config.has_line_start_packet && !config.has_line_end_packet);
        assert_eq!(board.live_isp_processors(), 1);

        drop(isp);
        assert!(board.log().contains("esp_isp_disable"));
        assert_eq!(board.live_isp_processors(), 0);
    }

    #[test]
    fn test_enable_failure_deletes_processor() {
        let board = SimBoard::new();
        board.fail("esp_isp_enable", EspErr::Fail);
        let mut p = board.peripherals();
        let err = ImageProcessor::bring_up(p.isp.as_mut(), &geometry(), &IspParams::default())
            .err()
            .unwrap();

        assert_eq!(err.op, "esp_isp_enable");
        assert_eq!(board.live_isp_processors(), 0);
        assert!(board.log().contains("esp_isp_del_processor"));
        assert!(!board.log().contains("esp_isp_disable"));
    }
}

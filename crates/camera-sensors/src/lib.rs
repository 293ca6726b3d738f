//! Image Sensor Drivers
//!
//! Every supported sensor implements [`SensorDriver`]. Drivers are looked up
//! by their sensor-type string in a [`SensorRegistry`].

mod ov5647;
mod registry;
mod regs;
mod sc202cs;

pub use ov5647::{Ov5647, OV5647_CHIP_ID};
pub use registry::{SensorKind, SensorRegistry};
pub use regs::{write_table, RegValue, REG_DELAY};
pub use sc202cs::{Sc202cs, SC202CS_CHIP_ID};

use std::sync::Arc;

use camera_hal::{Delay, HalError, SccbBus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sensor error types
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("SCCB transfer failed: {0}")]
    Bus(#[from] HalError),

    #[error("Unsupported sensor type: {0}")]
    Unsupported(String),
}

/// Color filter arrangement, encoded as `color_raw_element_order_t`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BayerPattern {
    Bggr = 0,
    Gbrg = 1,
    Grbg = 2,
    Rggb = 3,
}

impl BayerPattern {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for BayerPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BayerPattern::Bggr => "BGGR",
            BayerPattern::Gbrg => "GBRG",
            BayerPattern::Grbg => "GRBG",
            BayerPattern::Rggb => "RGGB",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// Output geometry and link parameters of a sensor mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorGeometry {
    pub width: u32,
    pub height: u32,
    pub lane_count: u8,
    pub bayer: BayerPattern,
    pub lane_bitrate_mbps: u32,
}

/// Where a sensor keeps its product ID on the SCCB bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipId {
    /// 7-bit SCCB address
    pub addr: u8,
    pub high_reg: u16,
    pub low_reg: u16,
    pub pid: u16,
}

impl ChipId {
    /// Read the live ID over `sccb`
    pub fn read(&self, sccb: &dyn SccbBus) -> Result<u16, SensorError> {
        regs::read_u16(sccb, self.addr, self.high_reg, self.low_reg)
    }

    /// Register writes that make a blank register file report `pid`
    pub fn registers(&self) -> [(u8, u16, u8); 2] {
        let [hi, lo] = self.pid.to_be_bytes();
        [(self.addr, self.high_reg, hi), (self.addr, self.low_reg, lo)]
    }
}

/// What a driver gets to talk to its sensor
#[derive(Clone)]
pub struct SensorContext {
    pub sccb: Arc<dyn SccbBus>,
    pub delay: Arc<dyn Delay>,
}

/// Capability contract of a sensor driver
pub trait SensorDriver: Send {
    /// Human-readable model name
    fn name(&self) -> &'static str;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn lane_count(&self) -> u8;

    fn bayer_pattern(&self) -> BayerPattern;

    fn lane_bitrate_mbps(&self) -> u32;

    /// Product ID the sensor is expected to report
    fn pid(&self) -> u16;

    /// Read the live product ID over SCCB
    fn read_id(&self) -> Result<u16, SensorError>;

    /// Load the mode register table; the sensor is left in standby
    fn init(&mut self) -> Result<(), SensorError>;

    fn start_stream(&mut self) -> Result<(), SensorError>;

    fn stop_stream(&mut self) -> Result<(), SensorError>;

    fn geometry(&self) -> SensorGeometry {
        SensorGeometry {
            width: self.width(),
            height: self.height(),
            lane_count: self.lane_count(),
            bayer: self.bayer_pattern(),
            lane_bitrate_mbps: self.lane_bitrate_mbps(),
        }
    }
}

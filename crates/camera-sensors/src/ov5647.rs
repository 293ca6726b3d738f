//! OmniVision OV5647, 800x640 RAW8 over two MIPI lanes (2x2 binned)

use tracing::debug;

use crate::regs::{write_table, RegValue, REG_DELAY};
use crate::{BayerPattern, ChipId, SensorContext, SensorDriver, SensorError};

pub const OV5647_CHIP_ID: ChipId = ChipId {
    addr: 0x36,
    high_reg: 0x300a,
    low_reg: 0x300b,
    pid: 0x5647,
};
const ADDR: u8 = OV5647_CHIP_ID.addr;
const REG_MODE_SELECT: u16 = 0x0100;
const REG_SOFT_RESET: u16 = 0x0103;
const REG_FRAME_OFF: u16 = 0x4202;

const INIT_TABLE: &[RegValue] = &[
    (REG_SOFT_RESET, 0x01),
    (REG_DELAY, 10),
    (REG_MODE_SELECT, 0x00),
    // 8-bit MIPI mode, PLL for 200 Mbps per lane
    (0x3034, 0x18),
    (0x3035, 0x41),
    (0x3036, 0x32),
    (0x303c, 0x11),
    (0x3106, 0xf5),
    // Two data lanes
    (0x3018, 0x44),
    (0x4800, 0x34),
    (0x4814, 0x2a),
    // 2x2 binning
    (0x3820, 0x41),
    (0x3821, 0x07),
    // Output size 800x640
    (0x3808, 0x03),
    (0x3809, 0x20),
    (0x380a, 0x02),
    (0x380b, 0x80),
    // HTS / VTS
    (0x380c, 0x07),
    (0x380d, 0x68),
    (0x380e, 0x03),
    (0x380f, 0xd8),
    // AEC/AGC defaults
    (0x3503, 0x00),
    (0x3a0f, 0x58),
    (0x3a10, 0x50),
    (REG_FRAME_OFF, 0x0f),
    (REG_DELAY, 5),
];

pub struct Ov5647 {
    ctx: SensorContext,
}

impl Ov5647 {
    pub fn new(ctx: SensorContext) -> Self {
        Self { ctx }
    }
}

impl SensorDriver for Ov5647 {
    fn name(&self) -> &'static str {
        "OV5647"
    }

    fn width(&self) -> u32 {
        800
    }

    fn height(&self) -> u32 {
        640
    }

    fn lane_count(&self) -> u8 {
        2
    }

    fn bayer_pattern(&self) -> BayerPattern {
        BayerPattern::Bggr
    }

    fn lane_bitrate_mbps(&self) -> u32 {
        200
    }

    fn pid(&self) -> u16 {
        OV5647_CHIP_ID.pid
    }

    fn read_id(&self) -> Result<u16, SensorError> {
        OV5647_CHIP_ID.read(self.ctx.sccb.as_ref())
    }

    fn init(&mut self) -> Result<(), SensorError> {
        debug!("OV5647: writing {} init registers", INIT_TABLE.len());
        write_table(
            self.ctx.sccb.as_ref(),
            self.ctx.delay.as_ref(),
            ADDR,
            INIT_TABLE,
        )
    }

    fn start_stream(&mut self) -> Result<(), SensorError> {
        let sccb = self.ctx.sccb.as_ref();
        sccb.write_reg(ADDR, REG_FRAME_OFF, 0x00)?;
        sccb.write_reg(ADDR, REG_MODE_SELECT, 0x01)?;
        Ok(())
    }

    fn stop_stream(&mut self) -> Result<(), SensorError> {
        let sccb = self.ctx.sccb.as_ref();
        sccb.write_reg(ADDR, REG_MODE_SELECT, 0x00)?;
        sccb.write_reg(ADDR, REG_FRAME_OFF, 0x0f)?;
        Ok(())
    }
}

//! SmartSens SC202CS, 1280x720 RAW8 over one MIPI lane

use tracing::debug;

use crate::regs::{write_table, RegValue, REG_DELAY};
use crate::{BayerPattern, ChipId, SensorContext, SensorDriver, SensorError};

pub const SC202CS_CHIP_ID: ChipId = ChipId {
    addr: 0x36,
    high_reg: 0x3107,
    low_reg: 0x3108,
    pid: 0xEB52,
};
const ADDR: u8 = SC202CS_CHIP_ID.addr;
const REG_MODE_SELECT: u16 = 0x0100;
const REG_SOFT_RESET: u16 = 0x0103;

const INIT_TABLE: &[RegValue] = &[
    (REG_SOFT_RESET, 0x01),
    (REG_DELAY, 10),
    (REG_MODE_SELECT, 0x00),
    // PLL: 24 MHz in, 576 Mbps per lane
    (0x36e9, 0x80),
    (0x36ea, 0x06),
    (0x36eb, 0x0a),
    (0x36ec, 0x01),
    (0x36ed, 0x18),
    (0x36e9, 0x24),
    (0x301f, 0x18),
    // RAW8 output, single lane
    (0x3031, 0x08),
    (0x3018, 0x12),
    (0x3019, 0x0e),
    // Output window 1280x720
    (0x3208, 0x05),
    (0x3209, 0x00),
    (0x320a, 0x02),
    (0x320b, 0xd0),
    // HTS / VTS for 30 fps
    (0x320c, 0x06),
    (0x320d, 0x40),
    (0x320e, 0x03),
    (0x320f, 0xe8),
    // Analog and exposure defaults
    (0x3301, 0x09),
    (0x3304, 0x50),
    (0x3e01, 0x3e),
    (0x3e02, 0x00),
    (0x3e08, 0x00),
    (0x3e09, 0x20),
    (REG_DELAY, 5),
];

pub struct Sc202cs {
    ctx: SensorContext,
}

impl Sc202cs {
    pub fn new(ctx: SensorContext) -> Self {
        Self { ctx }
    }
}

impl SensorDriver for Sc202cs {
    fn name(&self) -> &'static str {
        "SC202CS"
    }

    fn width(&self) -> u32 {
        1280
    }

    fn height(&self) -> u32 {
        720
    }

    fn lane_count(&self) -> u8 {
        1
    }

    fn bayer_pattern(&self) -> BayerPattern {
        BayerPattern::Bggr
    }

    fn lane_bitrate_mbps(&self) -> u32 {
        576
    }

    fn pid(&self) -> u16 {
        SC202CS_CHIP_ID.pid
    }

    fn read_id(&self) -> Result<u16, SensorError> {
        SC202CS_CHIP_ID.read(self.ctx.sccb.as_ref())
    }

    fn init(&mut self) -> Result<(), SensorError> {
        debug!("SC202CS: writing {} init registers", INIT_TABLE.len());
        write_table(
            self.ctx.sccb.as_ref(),
            self.ctx.delay.as_ref(),
            ADDR,
            INIT_TABLE,
        )
    }

    fn start_stream(&mut self) -> Result<(), SensorError> {
        self.ctx
            .sccb
            .write_reg(ADDR, REG_MODE_SELECT, 0x01)?;
        Ok(())
    }

    fn stop_stream(&mut self) -> Result<(), SensorError> {
        self.ctx
            .sccb
            .write_reg(ADDR, REG_MODE_SELECT, 0x00)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_hal::sim::SimBoard;

    fn sensor(board: &SimBoard) -> Sc202cs {
        Sc202cs::new(SensorContext {
            sccb: board.sccb(),
            delay: board.delay(),
        })
    }

    #[test]
    fn test_read_id() {
        let board = SimBoard::new();
        board.sccb().set_register(ADDR, 0x3107, 0xeb);
        board.sccb().set_register(ADDR, 0x3108, 0x52);
        assert_eq!(sensor(&board).read_id().unwrap(), SC202CS_CHIP_ID.pid);
    }

    #[test]
    fn test_init_leaves_standby() {
        let board = SimBoard::new();
        let mut s = sensor(&board);
        s.init().unwrap();
        assert_eq!(board.sccb().register(ADDR, REG_MODE_SELECT), Some(0x00));
        assert_eq!(board.sccb().register(ADDR, 0x3209), Some(0x00));
        assert_eq!(board.delay().calls(), vec![10, 5]);

        s.start_stream().unwrap();
        assert_eq!(board.sccb().register(ADDR, REG_MODE_SELECT), Some(0x01));
        s.stop_stream().unwrap();
        assert_eq!(board.sccb().register(ADDR, REG_MODE_SELECT), Some(0x00));
    }
}

//! Register table helpers

use camera_hal::{Delay, SccbBus};
use tracing::trace;

use crate::SensorError;

/// Register address marking a delay entry; the value is milliseconds
pub const REG_DELAY: u16 = 0xFFFF;

/// `(register, value)` pair
pub type RegValue = (u16, u8);

/// Write a register table, honouring [`REG_DELAY`] entries
pub fn write_table(
    sccb: &dyn SccbBus,
    delay: &dyn Delay,
    addr: u8,
    table: &[RegValue],
) -> Result<(), SensorError> {
    for &(reg, value) in table {
        if reg == REG_DELAY {
            delay.delay_ms(value as u32);
            continue;
        }
        trace!("sccb 0x{:02x}: 0x{:04x} <- 0x{:02x}", addr, reg, value);
        sccb.write_reg(addr, reg, value)?;
    }
    Ok(())
}

/// Read a big-endian 16-bit value split across two registers
pub fn read_u16(sccb: &dyn SccbBus, addr: u8, high: u16, low: u16) -> Result<u16, SensorError> {
    let hi = sccb.read_reg(addr, high)?;
    let lo = sccb.read_reg(addr, low)?;
    Ok(u16::from_be_bytes([hi, lo]))
}

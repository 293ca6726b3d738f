//! SCCB (I2C-like) register bus used to talk to image sensors

use crate::HalError;

/// Register access with 16-bit register addresses and 8-bit values
pub trait SccbBus: Send + Sync {
    fn read_reg(&self, addr: u8, reg: u16) -> Result<u8, HalError>;

    fn write_reg(&self, addr: u8, reg: u16, value: u8) -> Result<(), HalError>;
}

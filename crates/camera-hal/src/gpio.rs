//! Digital output pins

use crate::HalError;

/// GPIO driver for push-pull outputs
pub trait Gpio: Send {
    /// Configure `pin` as an output
    fn set_output(&mut self, pin: u8) -> Result<(), HalError>;

    fn set_level(&mut self, pin: u8, high: bool) -> Result<(), HalError>;
}

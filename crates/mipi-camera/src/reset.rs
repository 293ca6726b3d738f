//! Sensor reset line

use camera_hal::{Delay, Gpio, HalError};
use tracing::debug;

/// Drive the active-low reset: low for `low_ms`, then high and wait `high_ms`
pub fn pulse(
    gpio: &mut dyn Gpio,
    delay: &dyn Delay,
    pin: u8,
    low_ms: u32,
    high_ms: u32,
) -> Result<(), HalError> {
    gpio.set_output(pin)?;
    gpio.set_level(pin, false)?;
    delay.delay_ms(low_ms);
    gpio.set_level(pin, true)?;
    delay.delay_ms(high_ms);
    debug!("Sensor reset pulse on GPIO{}", pin);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_hal::sim::SimBoard;

    #[test]
    fn test_pulse_sequence() {
        let board = SimBoard::new();
        let mut p = board.peripherals();
        pulse(p.gpio.as_mut(), p.delay.as_ref(), 36, 10, 20).unwrap();

        assert_eq!(
            board.log().entries(),
            vec![
                "gpio_set_direction(36)",
                "gpio_set_level(36, 0)",
                "delay_ms(10)",
                "gpio_set_level(36, 1)",
                "delay_ms(20)",
            ]
        );
        assert_eq!(board.gpio_level(36), Some(true));
    }
}

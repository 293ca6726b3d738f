//! External pixel clock on an LEDC timer/channel pair

use camera_hal::{Delay, HalError, Ledc, LedcChannelConfig, LedcTimerConfig};
use tracing::{info, warn};

use crate::params::ClockParams;

/// A running clock output
#[derive(Debug)]
pub struct ExternalClock {
    pin: u8,
    frequency_hz: u32,
    params: ClockParams,
}

impl ExternalClock {
    /// Configure the timer and channel, then wait `settle_ms` for the
    /// sensor PLL to lock
    pub fn start(
        ledc: &mut dyn Ledc,
        delay: &dyn Delay,
        pin: u8,
        frequency_hz: u32,
        params: &ClockParams,
        settle_ms: u32,
    ) -> Result<Self, HalError> {
        ledc.timer_config(&LedcTimerConfig {
            speed_mode: params.speed_mode,
            duty_resolution_bits: params.duty_resolution_bits,
            timer: params.timer,
            freq_hz: frequency_hz,
        })?;
        ledc.channel_config(&LedcChannelConfig {
            gpio: pin,
            speed_mode: params.speed_mode,
            channel: params.channel,
            timer: params.timer,
            duty: params.duty(),
            hpoint: params.hpoint,
        })?;
        delay.delay_ms(settle_ms);

        info!("External clock: {} Hz on GPIO{}", frequency_hz, pin);
        Ok(Self {
            pin,
            frequency_hz,
            params: params.clone(),
        })
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    /// Stop the output and park the pin low
    pub fn stop(self, ledc: &mut dyn Ledc) {
        if let Err(e) = ledc.stop(self.params.speed_mode, self.params.channel, false) {
            warn!("Failed to stop external clock on GPIO{}: {}", self.pin, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_hal::sim::SimBoard;
    use camera_hal::EspErr;

    #[test]
    fn test_start_configures_half_duty() {
        let board = SimBoard::new();
        let mut p = board.peripherals();
        let clock = ExternalClock::start(
            p.ledc.as_mut(),
            p.delay.as_ref(),
            24,
            24_000_000,
            &ClockParams::default(),
            50,
        )
        .unwrap();

        assert_eq!(
            board.log().entries(),
            vec![
                "ledc_timer_config(timer=0, freq=24000000, bits=2)",
                "ledc_channel_config(gpio=24, channel=0, duty=2)",
                "delay_ms(50)",
            ]
        );
        assert_eq!(clock.frequency_hz(), 24_000_000);

        clock.stop(p.ledc.as_mut());
        assert!(board.log().contains("ledc_stop"));
    }

    #[test]
    fn test_rejected_frequency_skips_settle() {
        let board = SimBoard::new();
        board.fail("ledc_timer_config", EspErr::InvalidArg);
        let mut p = board.peripherals();
        let err = ExternalClock::start(
            p.ledc.as_mut(),
            p.delay.as_ref(),
            24,
            1,
            &ClockParams::default(),
            50,
        )
        .unwrap_err();

        assert_eq!(err.code, EspErr::InvalidArg);
        assert!(!board.log().contains("ledc_channel_config"));
        assert!(board.delay().calls().is_empty());
    }
}

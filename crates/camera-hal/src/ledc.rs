//! LED PWM controller, used here as the sensor's external clock source

use crate::HalError;

/// LEDC speed mode. The P4 only implements the low-speed group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedMode {
    LowSpeed,
}

/// Timer configuration (`ledc_timer_config_t`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedcTimerConfig {
    pub speed_mode: SpeedMode,
    /// Duty resolution in bits; the duty register spans `0..2^bits`
    pub duty_resolution_bits: u8,
    pub timer: u8,
    pub freq_hz: u32,
}

/// Channel configuration (`ledc_channel_config_t`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedcChannelConfig {
    pub gpio: u8,
    pub speed_mode: SpeedMode,
    pub channel: u8,
    pub timer: u8,
    pub duty: u32,
    pub hpoint: u32,
}

/// LEDC driver
pub trait Ledc: Send {
    fn timer_config(&mut self, config: &LedcTimerConfig) -> Result<(), HalError>;

    fn channel_config(&mut self, config: &LedcChannelConfig) -> Result<(), HalError>;

    /// Stop the channel output and hold the pin at `idle_level`
    fn stop(&mut self, speed_mode: SpeedMode, channel: u8, idle_level: bool)
        -> Result<(), HalError>;
}

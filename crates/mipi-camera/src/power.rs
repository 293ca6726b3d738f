//! MIPI PHY power rail

use camera_hal::{HalError, Ldo, LdoChannel, LdoChannelConfig};
use tracing::info;

use crate::params::LdoParams;

/// Acquired LDO channel; released when dropped
pub struct PowerRail {
    channel: Box<dyn LdoChannel>,
}

impl PowerRail {
    pub fn acquire(ldo: &mut dyn Ldo, params: &LdoParams) -> Result<Self, HalError> {
        let channel = ldo.acquire_channel(&LdoChannelConfig {
            chan_id: params.chan_id,
            voltage_mv: params.voltage_mv,
        })?;
        info!(
            "LDO channel {} at {} mV",
            channel.chan_id(),
            channel.voltage_mv()
        );
        Ok(Self { channel })
    }

    pub fn voltage_mv(&self) -> u32 {
        self.channel.voltage_mv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_hal::sim::SimBoard;

    #[test]
    fn test_rail_released_on_drop() {
        let board = SimBoard::new();
        let mut p = board.peripherals();
        let rail = PowerRail::acquire(p.ldo.as_mut(), &LdoParams::default()).unwrap();
        assert_eq!(rail.voltage_mv(), 2500);
        assert!(board.log().contains("esp_ldo_acquire_channel"));

        drop(rail);
        assert!(board.log().contains("esp_ldo_release_channel"));
    }
}

//! On-chip LDO regulator channels

use crate::HalError;

/// Channel request (`esp_ldo_channel_config_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LdoChannelConfig {
    pub chan_id: u8,
    pub voltage_mv: u32,
}

/// An acquired channel. Dropping it releases the channel.
pub trait LdoChannel: Send {
    fn chan_id(&self) -> u8;

    fn voltage_mv(&self) -> u32;
}

/// LDO driver
pub trait Ldo: Send {
    fn acquire_channel(
        &mut self,
        config: &LdoChannelConfig,
    ) -> Result<Box<dyn LdoChannel>, HalError>;
}

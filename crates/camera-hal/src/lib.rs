//! Camera Hardware Abstraction Layer
//!
//! Traits for every SoC primitive the MIPI-CSI camera pipeline touches:
//! - LEDC timer/channel (external sensor clock)
//! - GPIO outputs (sensor reset)
//! - LDO channels (MIPI PHY supply)
//! - CSI controller and its interrupt callbacks
//! - ISP processor
//! - DMA-capable aligned heap
//! - SCCB register bus
//!
//! Backends: `ffi` (ESP-IDF board shim, feature `esp-idf`), `host`
//! (std-backed pieces) and `sim` (recording, fault-injecting simulation).

mod csi;
mod delay;
mod error;
mod gpio;
mod isp;
mod ldo;
mod ledc;
mod memory;
mod sccb;

#[cfg(feature = "esp-idf")]
pub mod ffi;
pub mod host;
pub mod sim;

use std::sync::Arc;

pub use csi::{ColorType, CsiConfig, CsiController, CsiEventHandler, CsiHost, CsiTransaction};
pub use delay::Delay;
pub use error::{check, EspErr, HalError};
pub use gpio::Gpio;
pub use isp::{IspConfig, IspHost, IspInputSource, IspProcessor};
pub use ldo::{Ldo, LdoChannel, LdoChannelConfig};
pub use ledc::{Ledc, LedcChannelConfig, LedcTimerConfig, SpeedMode};
pub use memory::{DmaAllocator, MemoryCaps};
pub use sccb::SccbBus;

/// Highest GPIO number on the ESP32-P4
pub const MAX_GPIO: u8 = 54;

/// Every peripheral the camera driver needs, handed over at construction
pub struct Peripherals {
    pub ledc: Box<dyn Ledc>,
    pub gpio: Box<dyn Gpio>,
    pub ldo: Box<dyn Ldo>,
    pub csi: Box<dyn CsiHost>,
    pub isp: Box<dyn IspHost>,
    pub memory: Arc<dyn DmaAllocator>,
    pub sccb: Arc<dyn SccbBus>,
    pub delay: Arc<dyn Delay>,
}

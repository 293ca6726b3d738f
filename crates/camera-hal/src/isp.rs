//! Image signal processor

use crate::{ColorType, HalError};

/// Where the ISP reads its input from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IspInputSource {
    Csi,
    Dvp,
    Dma,
}

/// Processor configuration (`esp_isp_processor_cfg_t`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IspConfig {
    pub input_source: IspInputSource,
    pub input_color: ColorType,
    pub output_color: ColorType,
    pub h_res: u32,
    pub v_res: u32,
    pub has_line_start_packet: bool,
    pub has_line_end_packet: bool,
    pub clk_hz: u32,
    /// Raw element order code (`color_raw_element_order_t`)
    pub bayer_order: u8,
}

/// A created processor. Dropping it deletes the processor.
pub trait IspProcessor: Send {
    fn enable(&mut self) -> Result<(), HalError>;

    fn disable(&mut self) -> Result<(), HalError>;
}

/// Factory for ISP processors
pub trait IspHost: Send {
    fn new_processor(&mut self, config: &IspConfig) -> Result<Box<dyn IspProcessor>, HalError>;
}

//! MIPI-CSI camera controller

use std::sync::Arc;

use crate::HalError;

/// Pixel encodings understood by the camera controller and the ISP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    Raw8,
    Raw10,
    Rgb565,
    Rgb888,
    Yuv422,
}

impl ColorType {
    /// Bytes per pixel once the frame lands in memory
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ColorType::Raw8 => 1,
            ColorType::Raw10 | ColorType::Rgb565 | ColorType::Yuv422 => 2,
            ColorType::Rgb888 => 3,
        }
    }
}

/// Controller configuration (`esp_cam_ctlr_csi_config_t`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsiConfig {
    pub ctlr_id: u8,
    pub h_res: u32,
    pub v_res: u32,
    pub lane_bit_rate_mbps: u32,
    pub input_color: ColorType,
    pub output_color: ColorType,
    pub data_lane_num: u8,
    pub byte_swap_en: bool,
    /// Number of in-flight transaction descriptors
    pub queue_items: u32,
}

/// One DMA transaction (`esp_cam_ctlr_trans_t`)
#[derive(Debug)]
pub struct CsiTransaction {
    pub buffer: *mut u8,
    pub buflen: usize,
    /// Bytes actually written by the receiver, set on completion
    pub received_size: usize,
}

impl Default for CsiTransaction {
    fn default() -> Self {
        Self {
            buffer: std::ptr::null_mut(),
            buflen: 0,
            received_size: 0,
        }
    }
}

/// Callbacks invoked by the controller from interrupt context.
///
/// Implementations must not block, allocate or log. Both return whether a
/// higher-priority task was woken, not success.
pub trait CsiEventHandler: Send + Sync {
    /// The receiver is about to start a transfer and needs a buffer
    fn on_get_new_trans(&self, trans: &mut CsiTransaction) -> bool;

    /// The receiver finished a transfer
    fn on_trans_finished(&self, trans: &CsiTransaction) -> bool;
}

/// A created controller. Dropping it deletes the controller.
pub trait CsiController: Send {
    fn register_event_callbacks(
        &mut self,
        handler: Arc<dyn CsiEventHandler>,
    ) -> Result<(), HalError>;

    fn enable(&mut self) -> Result<(), HalError>;

    fn start(&mut self) -> Result<(), HalError>;

    fn stop(&mut self) -> Result<(), HalError>;
}

/// Factory for CSI controllers
pub trait CsiHost: Send {
    fn new_controller(&mut self, config: &CsiConfig) -> Result<Box<dyn CsiController>, HalError>;
}

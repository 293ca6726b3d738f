//! Fixed hardware parameters, one value object per subsystem

use camera_hal::{ColorType, IspInputSource, MemoryCaps, SpeedMode};

/// Frame buffers in the pool; the exchange rotates between exactly two
pub const BUFFER_COUNT: usize = 2;

/// External clock generator (LEDC timer + channel)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockParams {
    pub speed_mode: SpeedMode,
    pub duty_resolution_bits: u8,
    pub timer: u8,
    pub channel: u8,
    pub hpoint: u32,
}

impl Default for ClockParams {
    fn default() -> Self {
        Self {
            speed_mode: SpeedMode::LowSpeed,
            duty_resolution_bits: 2,
            timer: 0,
            channel: 0,
            hpoint: 0,
        }
    }
}

impl ClockParams {
    /// Half of the duty range, i.e. a 50% square wave
    pub fn duty(&self) -> u32 {
        (1u32 << self.duty_resolution_bits) / 2
    }
}

/// MIPI PHY supply rail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LdoParams {
    pub chan_id: u8,
    pub voltage_mv: u32,
}

impl Default for LdoParams {
    fn default() -> Self {
        Self {
            chan_id: 3,
            voltage_mv: 2500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsiParams {
    pub ctlr_id: u8,
    pub input_color: ColorType,
    pub output_color: ColorType,
    pub byte_swap: bool,
    pub queue_items: u32,
}

impl Default for CsiParams {
    fn default() -> Self {
        Self {
            ctlr_id: 0,
            input_color: ColorType::Raw8,
            output_color: ColorType::Rgb565,
            byte_swap: false,
            queue_items: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IspParams {
    pub input_source: IspInputSource,
    pub input_color: ColorType,
    pub output_color: ColorType,
    pub clk_hz: u32,
    pub line_start_packet: bool,
    pub line_end_packet: bool,
}

impl Default for IspParams {
    fn default() -> Self {
        Self {
            input_source: IspInputSource::Csi,
            input_color: ColorType::Raw8,
            output_color: ColorType::Rgb565,
            clk_hz: 120_000_000,
            line_start_packet: false,
            line_end_packet: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferParams {
    pub alignment: usize,
    pub bytes_per_pixel: usize,
    pub caps: MemoryCaps,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            alignment: 64,
            bytes_per_pixel: ColorType::Rgb565.bytes_per_pixel(),
            caps: MemoryCaps::SPIRAM | MemoryCaps::DMA,
        }
    }
}

impl BufferParams {
    /// Bytes per frame buffer
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel
    }
}

/// Everything the bring-up sequence programs into hardware
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareParams {
    pub clock: ClockParams,
    pub ldo: LdoParams,
    pub csi: CsiParams,
    pub isp: IspParams,
    pub buffers: BufferParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_duty_is_half_range() {
        let mut params = ClockParams::default();
        assert_eq!(params.duty(), 2);
        params.duty_resolution_bits = 10;
        assert_eq!(params.duty(), 512);
    }

    #[test]
    fn test_frame_size() {
        let params = BufferParams::default();
        assert_eq!(params.frame_size(1280, 800), 2_048_000);
        assert_eq!(params.frame_size(1280, 720), 1_843_200);
        assert!(params.caps.contains(MemoryCaps::DMA));
    }
}

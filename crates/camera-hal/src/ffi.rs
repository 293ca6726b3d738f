//! FFI bindings for the ESP-IDF board-support shim
//!
//! The shim is a thin C layer over the ESP-IDF LEDC, GPIO, LDO,
//! `esp_cam_ctlr`, ISP, `heap_caps` and SCCB drivers. Every function returns
//! an `esp_err_t`; handles are opaque pointers owned by the Rust wrappers
//! below and released on drop.

use std::ffi::c_void;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use libc::{c_int, size_t};
use tracing::{debug, warn};

use crate::{
    check, ColorType, CsiConfig, CsiController, CsiEventHandler, CsiHost, CsiTransaction, Delay,
    DmaAllocator, Gpio, HalError, IspConfig, IspHost, IspInputSource, IspProcessor, Ldo,
    LdoChannel, LdoChannelConfig, Ledc, LedcChannelConfig, LedcTimerConfig, MemoryCaps,
    Peripherals, SccbBus, SpeedMode,
};

/// C color type enum (shared by the CSI controller and ISP)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub enum CColorType {
    Raw8 = 0,
    Raw10 = 1,
    Rgb565 = 2,
    Rgb888 = 3,
    Yuv422 = 4,
}

impl From<ColorType> for CColorType {
    fn from(c: ColorType) -> Self {
        match c {
            ColorType::Raw8 => CColorType::Raw8,
            ColorType::Raw10 => CColorType::Raw10,
            ColorType::Rgb565 => CColorType::Rgb565,
            ColorType::Rgb888 => CColorType::Rgb888,
            ColorType::Yuv422 => CColorType::Yuv422,
        }
    }
}

/// Layout-compatible with `esp_cam_ctlr_trans_t`
#[repr(C)]
pub struct CCsiTransaction {
    pub buffer: *mut c_void,
    pub buflen: size_t,
    pub received_size: size_t,
}

type CsiEventCallback =
    unsafe extern "C" fn(handle: *mut c_void, trans: *mut CCsiTransaction, user_data: *mut c_void)
        -> bool;

/// Layout-compatible with `esp_cam_ctlr_evt_cbs_t`
#[repr(C)]
pub struct CCsiCallbacks {
    pub on_get_new_trans: CsiEventCallback,
    pub on_trans_finished: CsiEventCallback,
}

#[repr(C)]
pub struct CCsiConfig {
    pub ctlr_id: c_int,
    pub h_res: u32,
    pub v_res: u32,
    pub lane_bit_rate_mbps: u32,
    pub input_color: CColorType,
    pub output_color: CColorType,
    pub data_lane_num: c_int,
    pub byte_swap_en: bool,
    pub queue_items: c_int,
}

#[repr(C)]
pub struct CIspConfig {
    /// 0 = CSI, 1 = DVP, 2 = DMA
    pub input_source: c_int,
    pub input_color: CColorType,
    pub output_color: CColorType,
    pub h_res: u32,
    pub v_res: u32,
    pub has_line_start_packet: bool,
    pub has_line_end_packet: bool,
    pub clk_hz: u32,
    pub bayer_order: c_int,
}

// Board shim, linked from the ESP-IDF component that hosts this crate
extern "C" {
    fn mipi_board_ledc_timer_config(speed_mode: c_int, duty_resolution_bits: c_int, timer: c_int, freq_hz: u32) -> c_int;
    fn mipi_board_ledc_channel_config(gpio: c_int, speed_mode: c_int, channel: c_int, timer: c_int, duty: u32, hpoint: u32) -> c_int;
    fn mipi_board_ledc_stop(speed_mode: c_int, channel: c_int, idle_level: c_int) -> c_int;

    fn mipi_board_gpio_set_output(pin: c_int) -> c_int;
    fn mipi_board_gpio_set_level(pin: c_int, level: c_int) -> c_int;

    fn mipi_board_ldo_acquire(chan_id: c_int, voltage_mv: c_int, handle_out: *mut *mut c_void) -> c_int;
    fn mipi_board_ldo_release(handle: *mut c_void) -> c_int;

    fn mipi_board_csi_new(config: *const CCsiConfig, handle_out: *mut *mut c_void) -> c_int;
    fn mipi_board_csi_register_callbacks(handle: *mut c_void, callbacks: *const CCsiCallbacks, user_data: *mut c_void) -> c_int;
    fn mipi_board_csi_enable(handle: *mut c_void) -> c_int;
    fn mipi_board_csi_start(handle: *mut c_void) -> c_int;
    fn mipi_board_csi_stop(handle: *mut c_void) -> c_int;
    fn mipi_board_csi_disable(handle: *mut c_void) -> c_int;
    fn mipi_board_csi_del(handle: *mut c_void) -> c_int;

    fn mipi_board_isp_new(config: *const CIspConfig, handle_out: *mut *mut c_void) -> c_int;
    fn mipi_board_isp_enable(handle: *mut c_void) -> c_int;
    fn mipi_board_isp_disable(handle: *mut c_void) -> c_int;
    fn mipi_board_isp_del(handle: *mut c_void) -> c_int;

    fn mipi_board_heap_aligned_alloc(align: size_t, size: size_t, caps: u32) -> *mut c_void;
    fn mipi_board_heap_free(ptr: *mut c_void);

    fn mipi_board_sccb_read(addr: u8, reg: u16, value_out: *mut u8) -> c_int;
    fn mipi_board_sccb_write(addr: u8, reg: u16, value: u8) -> c_int;

    fn mipi_board_delay_ms(ms: u32);
}

fn speed_mode_code(mode: SpeedMode) -> c_int {
    match mode {
        SpeedMode::LowSpeed => 0,
    }
}

/// Peripherals backed by the board shim
pub fn esp_peripherals() -> Peripherals {
    Peripherals {
        ledc: Box::new(EspLedc),
        gpio: Box::new(EspGpio),
        ldo: Box::new(EspLdo),
        csi: Box::new(EspCsiHost),
        isp: Box::new(EspIspHost),
        memory: Arc::new(EspHeap),
        sccb: Arc::new(EspSccb),
        delay: Arc::new(EspDelay),
    }
}

struct EspLedc;

impl Ledc for EspLedc {
    fn timer_config(&mut self, config: &LedcTimerConfig) -> Result<(), HalError> {
        let ret = unsafe {
            mipi_board_ledc_timer_config(
                speed_mode_code(config.speed_mode),
                config.duty_resolution_bits as c_int,
                config.timer as c_int,
                config.freq_hz,
            )
        };
        check("ledc_timer_config", ret)
    }

    fn channel_config(&mut self, config: &LedcChannelConfig) -> Result<(), HalError> {
        let ret = unsafe {
            mipi_board_ledc_channel_config(
                config.gpio as c_int,
                speed_mode_code(config.speed_mode),
                config.channel as c_int,
                config.timer as c_int,
                config.duty,
                config.hpoint,
            )
        };
        check("ledc_channel_config", ret)
    }

    fn stop(&mut self, speed_mode: SpeedMode, channel: u8, idle_level: bool) -> Result<(), HalError> {
        let ret = unsafe {
            mipi_board_ledc_stop(
                speed_mode_code(speed_mode),
                channel as c_int,
                c_int::from(idle_level),
            )
        };
        check("ledc_stop", ret)
    }
}

struct EspGpio;

impl Gpio for EspGpio {
    fn set_output(&mut self, pin: u8) -> Result<(), HalError> {
        check("gpio_set_direction", unsafe {
            mipi_board_gpio_set_output(pin as c_int)
        })
    }

    fn set_level(&mut self, pin: u8, high: bool) -> Result<(), HalError> {
        check("gpio_set_level", unsafe {
            mipi_board_gpio_set_level(pin as c_int, c_int::from(high))
        })
    }
}

struct EspLdo;

impl Ldo for EspLdo {
    fn acquire_channel(
        &mut self,
        config: &LdoChannelConfig,
    ) -> Result<Box<dyn LdoChannel>, HalError> {
        let mut handle = ptr::null_mut();
        let ret = unsafe {
            mipi_board_ldo_acquire(
                config.chan_id as c_int,
                config.voltage_mv as c_int,
                &mut handle,
            )
        };
        check("esp_ldo_acquire_channel", ret)?;
        Ok(Box::new(EspLdoChannel {
            handle,
            config: *config,
        }))
    }
}

struct EspLdoChannel {
    handle: *mut c_void,
    config: LdoChannelConfig,
}

// The handle is only touched through &mut self or on drop
unsafe impl Send for EspLdoChannel {}

impl LdoChannel for EspLdoChannel {
    fn chan_id(&self) -> u8 {
        self.config.chan_id
    }

    fn voltage_mv(&self) -> u32 {
        self.config.voltage_mv
    }
}

impl Drop for EspLdoChannel {
    fn drop(&mut self) {
        if let Err(e) = check("esp_ldo_release_channel", unsafe {
            mipi_board_ldo_release(self.handle)
        }) {
            warn!("{}", e);
        }
    }
}

struct EspCsiHost;

impl CsiHost for EspCsiHost {
    fn new_controller(&mut self, config: &CsiConfig) -> Result<Box<dyn CsiController>, HalError> {
        let c_config = CCsiConfig {
            ctlr_id: config.ctlr_id as c_int,
            h_res: config.h_res,
            v_res: config.v_res,
            lane_bit_rate_mbps: config.lane_bit_rate_mbps,
            input_color: config.input_color.into(),
            output_color: config.output_color.into(),
            data_lane_num: config.data_lane_num as c_int,
            byte_swap_en: config.byte_swap_en,
            queue_items: config.queue_items as c_int,
        };
        let mut handle = ptr::null_mut();
        check("esp_cam_new_csi_ctlr", unsafe {
            mipi_board_csi_new(&c_config, &mut handle)
        })?;
        Ok(Box::new(EspCsiController {
            handle,
            handler: None,
            enabled: false,
        }))
    }
}

struct EspCsiController {
    handle: *mut c_void,
    // Boxed so the pointer handed to C as `user_data` stays put
    handler: Option<Box<Arc<dyn CsiEventHandler>>>,
    enabled: bool,
}

// The controller handle is owned exclusively by this wrapper
unsafe impl Send for EspCsiController {}

unsafe extern "C" fn on_get_new_trans_trampoline(
    _handle: *mut c_void,
    trans: *mut CCsiTransaction,
    user_data: *mut c_void,
) -> bool {
    if trans.is_null() || user_data.is_null() {
        return false;
    }
    let handler = &*(user_data as *const Arc<dyn CsiEventHandler>);
    let mut t = CsiTransaction::default();
    let woken = handler.on_get_new_trans(&mut t);
    (*trans).buffer = t.buffer as *mut c_void;
    (*trans).buflen = t.buflen;
    woken
}

unsafe extern "C" fn on_trans_finished_trampoline(
    _handle: *mut c_void,
    trans: *mut CCsiTransaction,
    user_data: *mut c_void,
) -> bool {
    if trans.is_null() || user_data.is_null() {
        return false;
    }
    let handler = &*(user_data as *const Arc<dyn CsiEventHandler>);
    let t = CsiTransaction {
        buffer: (*trans).buffer as *mut u8,
        buflen: (*trans).buflen,
        received_size: (*trans).received_size,
    };
    handler.on_trans_finished(&t)
}

impl CsiController for EspCsiController {
    fn register_event_callbacks(
        &mut self,
        handler: Arc<dyn CsiEventHandler>,
    ) -> Result<(), HalError> {
        let boxed = Box::new(handler);
        let user_data = &*boxed as *const Arc<dyn CsiEventHandler> as *mut c_void;
        let callbacks = CCsiCallbacks {
            on_get_new_trans: on_get_new_trans_trampoline,
            on_trans_finished: on_trans_finished_trampoline,
        };
        check("esp_cam_ctlr_register_event_callbacks", unsafe {
            mipi_board_csi_register_callbacks(self.handle, &callbacks, user_data)
        })?;
        self.handler = Some(boxed);
        Ok(())
    }

    fn enable(&mut self) -> Result<(), HalError> {
        check("esp_cam_ctlr_enable", unsafe {
            mipi_board_csi_enable(self.handle)
        })?;
        self.enabled = true;
        Ok(())
    }

    fn start(&mut self) -> Result<(), HalError> {
        check("esp_cam_ctlr_start", unsafe {
            mipi_board_csi_start(self.handle)
        })
    }

    fn stop(&mut self) -> Result<(), HalError> {
        check("esp_cam_ctlr_stop", unsafe { mipi_board_csi_stop(self.handle) })
    }
}

impl Drop for EspCsiController {
    fn drop(&mut self) {
        if self.enabled {
            if let Err(e) = check("esp_cam_ctlr_disable", unsafe {
                mipi_board_csi_disable(self.handle)
            }) {
                warn!("{}", e);
            }
        }
        if let Err(e) = check("esp_cam_ctlr_del", unsafe { mipi_board_csi_del(self.handle) }) {
            warn!("{}", e);
        }
        // Callbacks can no longer fire once the controller is deleted
        self.handler.take();
        debug!("CSI controller deleted");
    }
}

struct EspIspHost;

impl IspHost for EspIspHost {
    fn new_processor(&mut self, config: &IspConfig) -> Result<Box<dyn IspProcessor>, HalError> {
        let c_config = CIspConfig {
            input_source: match config.input_source {
                IspInputSource::Csi => 0,
                IspInputSource::Dvp => 1,
                IspInputSource::Dma => 2,
            },
            input_color: config.input_color.into(),
            output_color: config.output_color.into(),
            h_res: config.h_res,
            v_res: config.v_res,
            has_line_start_packet: config.has_line_start_packet,
            has_line_end_packet: config.has_line_end_packet,
            clk_hz: config.clk_hz,
            bayer_order: config.bayer_order as c_int,
        };
        let mut handle = ptr::null_mut();
        check("esp_isp_new_processor", unsafe {
            mipi_board_isp_new(&c_config, &mut handle)
        })?;
        Ok(Box::new(EspIspProcessor {
            handle,
            enabled: false,
        }))
    }
}

struct EspIspProcessor {
    handle: *mut c_void,
    enabled: bool,
}

// The processor handle is owned exclusively by this wrapper
unsafe impl Send for EspIspProcessor {}

impl IspProcessor for EspIspProcessor {
    fn enable(&mut self) -> Result<(), HalError> {
        check("esp_isp_enable", unsafe { mipi_board_isp_enable(self.handle) })?;
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), HalError> {
        check("esp_isp_disable", unsafe {
            mipi_board_isp_disable(self.handle)
        })?;
        self.enabled = false;
        Ok(())
    }
}

impl Drop for EspIspProcessor {
    fn drop(&mut self) {
        if self.enabled {
            if let Err(e) = self.disable() {
                warn!("{}", e);
            }
        }
        if let Err(e) = check("esp_isp_del_processor", unsafe {
            mipi_board_isp_del(self.handle)
        }) {
            warn!("{}", e);
        }
    }
}

struct EspHeap;

impl DmaAllocator for EspHeap {
    fn alloc_aligned(&self, align: usize, size: usize, caps: MemoryCaps) -> Option<NonNull<u8>> {
        let ptr = unsafe { mipi_board_heap_aligned_alloc(align, size, caps.0) };
        NonNull::new(ptr as *mut u8)
    }

    unsafe fn free(&self, ptr: NonNull<u8>, _align: usize, _size: usize) {
        mipi_board_heap_free(ptr.as_ptr() as *mut c_void);
    }
}

struct EspSccb;

impl SccbBus for EspSccb {
    fn read_reg(&self, addr: u8, reg: u16) -> Result<u8, HalError> {
        let mut value = 0u8;
        check("sccb_read", unsafe {
            mipi_board_sccb_read(addr, reg, &mut value)
        })?;
        Ok(value)
    }

    fn write_reg(&self, addr: u8, reg: u16, value: u8) -> Result<(), HalError> {
        check("sccb_write", unsafe { mipi_board_sccb_write(addr, reg, value) })
    }
}

struct EspDelay;

impl Delay for EspDelay {
    fn delay_ms(&self, ms: u32) {
        unsafe { mipi_board_delay_ms(ms) }
    }
}

//! Simulated board
//!
//! Every driver call lands in a shared [`EventLog`] as `op(detail)`, and any
//! operation can be made to fail by name with [`SimBoard::fail`]. The CSI
//! controller can be driven by hand through [`SimCsiHandle`] or left to a
//! free-running frame generator thread.

use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::debug;

use crate::host::HeapDmaAllocator;
use crate::{
    CsiConfig, CsiController, CsiEventHandler, CsiHost, CsiTransaction, Delay, DmaAllocator,
    EspErr, Gpio, HalError, IspConfig, IspHost, IspProcessor, Ldo, LdoChannel, LdoChannelConfig,
    Ledc, LedcChannelConfig, LedcTimerConfig, MemoryCaps, Peripherals, SccbBus, SpeedMode,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Ordered record of driver calls
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn record(&self, entry: impl Into<String>) {
        lock(&self.entries).push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        lock(&self.entries).clone()
    }

    /// Index of the first call to `op`
    pub fn position(&self, op: &str) -> Option<usize> {
        lock(&self.entries).iter().position(|e| op_name(e) == op)
    }

    pub fn count(&self, op: &str) -> usize {
        lock(&self.entries).iter().filter(|e| op_name(e) == op).count()
    }

    pub fn contains(&self, op: &str) -> bool {
        self.position(op).is_some()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }
}

fn op_name(entry: &str) -> &str {
    entry.split('(').next().unwrap_or(entry)
}

#[derive(Debug, Clone, Default)]
struct Ctx {
    log: EventLog,
    faults: Arc<Mutex<HashMap<&'static str, EspErr>>>,
}

impl Ctx {
    fn call(&self, op: &'static str, detail: String) -> Result<(), HalError> {
        self.log.record(format!("{op}({detail})"));
        match lock(&self.faults).get(op) {
            Some(code) => Err(HalError::new(op, *code)),
            None => Ok(()),
        }
    }

    fn is_faulted(&self, op: &'static str) -> bool {
        lock(&self.faults).contains_key(op)
    }
}

/// A simulated SoC with every camera-facing peripheral
pub struct SimBoard {
    ctx: Ctx,
    gpio_levels: Arc<Mutex<HashMap<u8, bool>>>,
    csi: Arc<CsiShared>,
    isp: Arc<IspShared>,
    memory: Arc<SimMemory>,
    sccb: Arc<SimSccb>,
    delay: Arc<SimDelay>,
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBoard {
    pub fn new() -> Self {
        let ctx = Ctx::default();
        Self {
            gpio_levels: Arc::new(Mutex::new(HashMap::new())),
            csi: Arc::new(CsiShared::default()),
            isp: Arc::new(IspShared::default()),
            memory: Arc::new(SimMemory::new(ctx.clone())),
            sccb: Arc::new(SimSccb::new(ctx.clone())),
            delay: Arc::new(SimDelay::new(ctx.clone())),
            ctx,
        }
    }

    pub fn log(&self) -> &EventLog {
        &self.ctx.log
    }

    /// Make every subsequent call to `op` fail with `code`
    pub fn fail(&self, op: &'static str, code: EspErr) {
        lock(&self.ctx.faults).insert(op, code);
    }

    pub fn clear_faults(&self) {
        lock(&self.ctx.faults).clear();
        *lock(&self.memory.fail_call) = None;
    }

    /// Make the `call_index`-th allocation (0-based) return null
    pub fn fail_allocation(&self, call_index: usize) {
        *lock(&self.memory.fail_call) = Some(call_index);
    }

    pub fn csi(&self) -> SimCsiHandle {
        SimCsiHandle {
            shared: self.csi.clone(),
        }
    }

    pub fn sccb(&self) -> Arc<SimSccb> {
        self.sccb.clone()
    }

    pub fn memory(&self) -> Arc<SimMemory> {
        self.memory.clone()
    }

    pub fn delay(&self) -> Arc<SimDelay> {
        self.delay.clone()
    }

    pub fn gpio_level(&self, pin: u8) -> Option<bool> {
        lock(&self.gpio_levels).get(&pin).copied()
    }

    pub fn isp_config(&self) -> Option<IspConfig> {
        lock(&self.isp.config).clone()
    }

    /// ISP processors created and not yet deleted
    pub fn live_isp_processors(&self) -> usize {
        self.isp.live.load(Ordering::Acquire)
    }

    /// Hand out a fresh set of peripheral drivers wired to this board
    pub fn peripherals(&self) -> Peripherals {
        Peripherals {
            ledc: Box::new(SimLedc {
                ctx: self.ctx.clone(),
            }),
            gpio: Box::new(SimGpio {
                ctx: self.ctx.clone(),
                levels: self.gpio_levels.clone(),
            }),
            ldo: Box::new(SimLdo {
                ctx: self.ctx.clone(),
            }),
            csi: Box::new(SimCsiHost {
                ctx: self.ctx.clone(),
                shared: self.csi.clone(),
            }),
            isp: Box::new(SimIspHost {
                ctx: self.ctx.clone(),
                shared: self.isp.clone(),
            }),
            memory: self.memory.clone(),
            sccb: self.sccb.clone(),
            delay: self.delay.clone(),
        }
    }
}

struct SimLedc {
    ctx: Ctx,
}

impl Ledc for SimLedc {
    fn timer_config(&mut self, config: &LedcTimerConfig) -> Result<(), HalError> {
        self.ctx.call(
            "ledc_timer_config",
            format!(
                "timer={}, freq={}, bits={}",
                config.timer, config.freq_hz, config.duty_resolution_bits
            ),
        )
    }

    fn channel_config(&mut self, config: &LedcChannelConfig) -> Result<(), HalError> {
        self.ctx.call(
            "ledc_channel_config",
            format!(
                "gpio={}, channel={}, duty={}",
                config.gpio, config.channel, config.duty
            ),
        )
    }

    fn stop(&mut self, _speed_mode: SpeedMode, channel: u8, idle_level: bool) -> Result<(), HalError> {
        self.ctx
            .call("ledc_stop", format!("channel={channel}, idle={idle_level}"))
    }
}

struct SimGpio {
    ctx: Ctx,
    levels: Arc<Mutex<HashMap<u8, bool>>>,
}

impl Gpio for SimGpio {
    fn set_output(&mut self, pin: u8) -> Result<(), HalError> {
        self.ctx.call("gpio_set_direction", format!("{pin}"))
    }

    fn set_level(&mut self, pin: u8, high: bool) -> Result<(), HalError> {
        self.ctx
            .call("gpio_set_level", format!("{pin}, {}", u8::from(high)))?;
        lock(&self.levels).insert(pin, high);
        Ok(())
    }
}

struct SimLdo {
    ctx: Ctx,
}

impl Ldo for SimLdo {
    fn acquire_channel(
        &mut self,
        config: &LdoChannelConfig,
    ) -> Result<Box<dyn LdoChannel>, HalError> {
        self.ctx.call(
            "esp_ldo_acquire_channel",
            format!("chan={}, mv={}", config.chan_id, config.voltage_mv),
        )?;
        Ok(Box::new(SimLdoChannel {
            ctx: self.ctx.clone(),
            config: *config,
        }))
    }
}

struct SimLdoChannel {
    ctx: Ctx,
    config: LdoChannelConfig,
}

impl LdoChannel for SimLdoChannel {
    fn chan_id(&self) -> u8 {
        self.config.chan_id
    }

    fn voltage_mv(&self) -> u32 {
        self.config.voltage_mv
    }
}

impl Drop for SimLdoChannel {
    fn drop(&mut self) {
        self.ctx
            .log
            .record(format!("esp_ldo_release_channel(chan={})", self.config.chan_id));
    }
}

/// A completed simulated transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimTransfer {
    /// Address of the buffer the handler supplied (0 if none)
    pub buffer: usize,
    pub received_size: usize,
    /// Byte value written over the received region
    pub fill: u8,
}

#[derive(Default)]
struct CsiShared {
    config: Mutex<Option<CsiConfig>>,
    handler: Mutex<Option<Arc<dyn CsiEventHandler>>>,
    enabled: AtomicBool,
    running: AtomicBool,
    frame_rate: Mutex<Option<u32>>,
    generator: Mutex<Option<JoinHandle<()>>>,
    sequence: AtomicU8,
}

impl CsiShared {
    fn complete_transfer(&self, received_size: Option<usize>) -> Option<SimTransfer> {
        if !self.running.load(Ordering::Acquire) {
            return None;
        }
        let handler = lock(&self.handler).clone()?;

        let mut trans = CsiTransaction::default();
        handler.on_get_new_trans(&mut trans);

        let fill = self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let received = received_size.unwrap_or(trans.buflen).min(trans.buflen);
        if !trans.buffer.is_null() && received > 0 {
            // SAFETY: the handler handed out `buflen` writable bytes at `buffer`
            unsafe { std::ptr::write_bytes(trans.buffer, fill, received) };
        }
        trans.received_size = received;
        handler.on_trans_finished(&trans);

        Some(SimTransfer {
            buffer: trans.buffer as usize,
            received_size: received,
            fill,
        })
    }

    fn stop_generator(&self) {
        self.running.store(false, Ordering::Release);
        let handle = lock(&self.generator).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                debug!("simulated frame generator panicked");
            }
        }
    }
}

/// Test-side view of the simulated CSI receiver
#[derive(Clone)]
pub struct SimCsiHandle {
    shared: Arc<CsiShared>,
}

impl SimCsiHandle {
    /// Configuration passed to the last `new_controller` call
    pub fn config(&self) -> Option<CsiConfig> {
        lock(&self.shared.config).clone()
    }

    pub fn has_handler(&self) -> bool {
        lock(&self.shared.handler).is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Run a generator thread at `fps` whenever the controller is started.
    /// `None` leaves transfers to [`complete_transfer`](Self::complete_transfer).
    pub fn set_frame_rate(&self, fps: Option<u32>) {
        *lock(&self.shared.frame_rate) = fps;
    }

    /// Fire one request/finish callback pair reporting `received_size` bytes.
    /// Returns `None` if the controller is not running or has no handler.
    pub fn complete_transfer(&self, received_size: usize) -> Option<SimTransfer> {
        self.shared.complete_transfer(Some(received_size))
    }

    /// Fire a transfer that fills the whole supplied buffer
    pub fn complete_full_transfer(&self) -> Option<SimTransfer> {
        self.shared.complete_transfer(None)
    }
}

struct SimCsiHost {
    ctx: Ctx,
    shared: Arc<CsiShared>,
}

impl CsiHost for SimCsiHost {
    fn new_controller(&mut self, config: &CsiConfig) -> Result<Box<dyn CsiController>, HalError> {
        self.ctx.call(
            "esp_cam_new_csi_ctlr",
            format!(
                "{}x{}, lanes={}, mbps={}",
                config.h_res, config.v_res, config.data_lane_num, config.lane_bit_rate_mbps
            ),
        )?;
        *lock(&self.shared.config) = Some(config.clone());
        Ok(Box::new(SimCsiController {
            ctx: self.ctx.clone(),
            shared: self.shared.clone(),
        }))
    }
}

struct SimCsiController {
    ctx: Ctx,
    shared: Arc<CsiShared>,
}

impl CsiController for SimCsiController {
    fn register_event_callbacks(
        &mut self,
        handler: Arc<dyn CsiEventHandler>,
    ) -> Result<(), HalError> {
        self.ctx
            .call("esp_cam_ctlr_register_event_callbacks", String::new())?;
        *lock(&self.shared.handler) = Some(handler);
        Ok(())
    }

    fn enable(&mut self) -> Result<(), HalError> {
        self.ctx.call("esp_cam_ctlr_enable", String::new())?;
        self.shared.enabled.store(true, Ordering::Release);
        Ok(())
    }

    fn start(&mut self) -> Result<(), HalError> {
        self.ctx.call("esp_cam_ctlr_start", String::new())?;
        if !self.shared.enabled.load(Ordering::Acquire) {
            return Err(HalError::new("esp_cam_ctlr_start", EspErr::InvalidState));
        }
        self.shared.running.store(true, Ordering::Release);

        let fps = *lock(&self.shared.frame_rate);
        if let Some(fps) = fps {
            let shared = self.shared.clone();
            let period = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
            let handle = std::thread::spawn(move || {
                while shared.running.load(Ordering::Acquire) {
                    std::thread::sleep(period);
                    shared.complete_transfer(None);
                }
            });
            *lock(&self.shared.generator) = Some(handle);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HalError> {
        let result = self.ctx.call("esp_cam_ctlr_stop", String::new());
        self.shared.stop_generator();
        result
    }
}

impl Drop for SimCsiController {
    fn drop(&mut self) {
        self.shared.stop_generator();
        self.shared.enabled.store(false, Ordering::Release);
        lock(&self.shared.handler).take();
        self.ctx.log.record("esp_cam_ctlr_del()");
    }
}

#[derive(Default)]
struct IspShared {
    config: Mutex<Option<IspConfig>>,
    live: AtomicUsize,
}

struct SimIspHost {
    ctx: Ctx,
    shared: Arc<IspShared>,
}

impl IspHost for SimIspHost {
    fn new_processor(&mut self, config: &IspConfig) -> Result<Box<dyn IspProcessor>, HalError> {
        self.ctx.call(
            "esp_isp_new_processor",
            format!("{}x{}, clk={}", config.h_res, config.v_res, config.clk_hz),
        )?;
        *lock(&self.shared.config) = Some(config.clone());
        self.shared.live.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(SimIspProcessor {
            ctx: self.ctx.clone(),
            shared: self.shared.clone(),
        }))
    }
}

struct SimIspProcessor {
    ctx: Ctx,
    shared: Arc<IspShared>,
}

impl IspProcessor for SimIspProcessor {
    fn enable(&mut self) -> Result<(), HalError> {
        self.ctx.call("esp_isp_enable", String::new())
    }

    fn disable(&mut self) -> Result<(), HalError> {
        self.ctx.call("esp_isp_disable", String::new())
    }
}

impl Drop for SimIspProcessor {
    fn drop(&mut self) {
        self.shared.live.fetch_sub(1, Ordering::AcqRel);
        self.ctx.log.record("esp_isp_del_processor()");
    }
}

/// One recorded allocation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocRequest {
    pub align: usize,
    pub size: usize,
    pub caps: MemoryCaps,
}

/// Heap that records requests and can be told to fail
pub struct SimMemory {
    ctx: Ctx,
    heap: HeapDmaAllocator,
    requests: Mutex<Vec<AllocRequest>>,
    fail_call: Mutex<Option<usize>>,
    live: AtomicUsize,
}

impl SimMemory {
    fn new(ctx: Ctx) -> Self {
        Self {
            ctx,
            heap: HeapDmaAllocator,
            requests: Mutex::new(Vec::new()),
            fail_call: Mutex::new(None),
            live: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> Vec<AllocRequest> {
        lock(&self.requests).clone()
    }

    /// Allocations not yet freed
    pub fn live_allocations(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

impl DmaAllocator for SimMemory {
    fn alloc_aligned(&self, align: usize, size: usize, caps: MemoryCaps) -> Option<NonNull<u8>> {
        let index = {
            let mut requests = lock(&self.requests);
            requests.push(AllocRequest { align, size, caps });
            requests.len() - 1
        };
        self.ctx.log.record(format!(
            "heap_caps_aligned_alloc(align={align}, size={size}, caps=0x{:x})",
            caps.0
        ));
        if *lock(&self.fail_call) == Some(index) || self.ctx.is_faulted("heap_caps_aligned_alloc")
        {
            return None;
        }
        let ptr = self.heap.alloc_aligned(align, size, caps)?;
        self.live.fetch_add(1, Ordering::AcqRel);
        Some(ptr)
    }

    unsafe fn free(&self, ptr: NonNull<u8>, align: usize, size: usize) {
        self.ctx.log.record(format!("heap_caps_free(size={size})"));
        self.live.fetch_sub(1, Ordering::AcqRel);
        self.heap.free(ptr, align, size);
    }
}

/// Register file behind a simulated SCCB bus
pub struct SimSccb {
    ctx: Ctx,
    registers: Mutex<HashMap<(u8, u16), u8>>,
    writes: Mutex<Vec<(u8, u16, u8)>>,
}

impl SimSccb {
    fn new(ctx: Ctx) -> Self {
        Self {
            ctx,
            registers: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Preload a register, e.g. a chip ID
    pub fn set_register(&self, addr: u8, reg: u16, value: u8) {
        lock(&self.registers).insert((addr, reg), value);
    }

    pub fn register(&self, addr: u8, reg: u16) -> Option<u8> {
        lock(&self.registers).get(&(addr, reg)).copied()
    }

    /// Every successful write, in order
    pub fn writes(&self) -> Vec<(u8, u16, u8)> {
        lock(&self.writes).clone()
    }
}

impl SccbBus for SimSccb {
    fn read_reg(&self, addr: u8, reg: u16) -> Result<u8, HalError> {
        self.ctx
            .call("sccb_read", format!("0x{addr:02x}, 0x{reg:04x}"))?;
        Ok(self.register(addr, reg).unwrap_or(0))
    }

    fn write_reg(&self, addr: u8, reg: u16, value: u8) -> Result<(), HalError> {
        self.ctx.call(
            "sccb_write",
            format!("0x{addr:02x}, 0x{reg:04x}, 0x{value:02x}"),
        )?;
        lock(&self.registers).insert((addr, reg), value);
        lock(&self.writes).push((addr, reg, value));
        Ok(())
    }
}

/// Delay that records instead of sleeping
pub struct SimDelay {
    ctx: Ctx,
    calls: Mutex<Vec<u32>>,
}

impl SimDelay {
    fn new(ctx: Ctx) -> Self {
        Self {
            ctx,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<u32> {
        lock(&self.calls).clone()
    }

    pub fn total_ms(&self) -> u64 {
        lock(&self.calls).iter().map(|&ms| ms as u64).sum()
    }
}

impl Delay for SimDelay {
    fn delay_ms(&self, ms: u32) {
        self.ctx.log.record(format!("delay_ms({ms})"));
        lock(&self.calls).push(ms);
    }
}

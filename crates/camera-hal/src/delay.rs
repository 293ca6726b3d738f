//! Blocking delays for the setup path

/// Blocking millisecond delay. Never called from interrupt context.
pub trait Delay: Send + Sync {
    fn delay_ms(&self, ms: u32);
}

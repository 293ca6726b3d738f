//! MIPI-CSI Camera Driver
//!
//! Brings up an image sensor behind a CSI receiver and ISP, then hands
//! RGB565 frames to a single consumer through a lock-free double buffer.
//!
//! ```text
//! clock -> reset -> sensor -> LDO -> CSI -> ISP -> buffers -> stream
//! ```

mod camera;
mod clock;
mod config;
mod csi;
mod error;
mod exchange;
mod frame;
mod frame_pool;
mod isp;
mod params;
mod power;
mod reset;
mod telemetry;

pub use camera::{CameraState, MipiCamera};
pub use config::{CameraConfig, ExternalClockConfig, TimingConfig, ENV_PREFIX};
pub use error::{BringUpStage, CameraError, StreamStep};
pub use exchange::FrameExchange;
pub use frame::{rgb565_to_rgb888, Rgb565Frame};
pub use params::{
    BufferParams, ClockParams, CsiParams, HardwareParams, IspParams, LdoParams, BUFFER_COUNT,
};
pub use telemetry::{TelemetryReport, TelemetryWindow, TELEMETRY_WINDOW};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install a global fmt subscriber at `level`
pub fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already installed");
    }
}

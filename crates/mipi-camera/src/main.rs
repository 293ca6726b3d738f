//! Simulated camera run: bring-up, stream, poll and capture on a host

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use camera_hal::host::StdDelay;
use camera_hal::sim::SimBoard;
use camera_sensors::SensorKind;
use clap::Parser;
use mipi_camera::{init_logging, CameraConfig, MipiCamera};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "mipi-cam-sim", version, about = "Run the MIPI camera driver against a simulated board")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sensor type, ignored when --config is given
    #[arg(short, long, default_value = "sc202cs")]
    sensor: String,

    /// Simulated sensor frame rate
    #[arg(long, default_value_t = 30)]
    sensor_fps: u32,

    /// Consumer capture rate
    #[arg(long, default_value_t = 15)]
    capture_fps: u32,

    /// Poll loop period in milliseconds
    #[arg(long, default_value_t = 16)]
    poll_ms: u64,

    /// How long to stream, in seconds
    #[arg(short, long, default_value_t = 7)]
    duration: u64,

    /// Record bring-up delays instead of sleeping through them
    #[arg(long)]
    no_delays: bool,

    /// Write the last captured frame here as PNG
    #[arg(long)]
    snapshot: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level);

    info!("=== MIPI camera simulator v{} ===", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => CameraConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CameraConfig::new(args.sensor.as_str()),
    };

    let board = SimBoard::new();
    if let Ok(kind) = config.sensor_type.parse::<SensorKind>() {
        for (addr, reg, value) in kind.chip_id().registers() {
            board.sccb().set_register(addr, reg, value);
        }
    }
    board.csi().set_frame_rate(Some(args.sensor_fps));

    let mut peripherals = board.peripherals();
    if !args.no_delays {
        peripherals.delay = Arc::new(StdDelay);
    }

    let mut camera = MipiCamera::new(config, peripherals);
    camera.setup().context("camera bring-up")?;
    if !camera.is_streaming() {
        camera.start_streaming().context("start streaming")?;
    }
    camera.dump_config();

    let mut poll = tokio::time::interval(Duration::from_millis(args.poll_ms.max(1)));
    let mut capture =
        tokio::time::interval(Duration::from_secs_f64(1.0 / args.capture_fps.max(1) as f64));
    let deadline = tokio::time::sleep(Duration::from_secs(args.duration));
    tokio::pin!(deadline);

    let mut captured = 0u64;
    let mut no_new = 0u64;
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = poll.tick() => {
                camera.poll();
            }
            _ = capture.tick() => {
                if camera.capture_frame()? {
                    captured += 1;
                } else {
                    no_new += 1;
                }
            }
        }
    }

    info!(
        "Captured {} frames, {} polls without a new frame, {} dropped transfers",
        captured,
        no_new,
        camera.dropped_transfers()
    );

    camera.stop_streaming();

    if let Some(path) = &args.snapshot {
        let frame = camera.frame().context("no frame buffer to snapshot")?;
        frame
            .to_rgb_image()
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Snapshot written to {}", path.display());
    }
    Ok(())
}

//! Camera Error Types

use std::fmt;

use camera_hal::HalError;
use camera_sensors::SensorError;
use thiserror::Error;

/// Bring-up steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BringUpStage {
    Clock,
    Reset,
    SensorCreate,
    SensorInit,
    PowerRail,
    Csi,
    Isp,
    BufferAlloc,
    AutoStart,
}

impl BringUpStage {
    pub fn name(self) -> &'static str {
        match self {
            BringUpStage::Clock => "external clock",
            BringUpStage::Reset => "sensor reset",
            BringUpStage::SensorCreate => "sensor driver",
            BringUpStage::SensorInit => "sensor init",
            BringUpStage::PowerRail => "LDO",
            BringUpStage::Csi => "CSI",
            BringUpStage::Isp => "ISP",
            BringUpStage::BufferAlloc => "frame buffers",
            BringUpStage::AutoStart => "auto-start",
        }
    }
}

impl fmt::Display for BringUpStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors surfaced by the camera driver
#[derive(Debug, Error)]
pub enum CameraError {
    /// Configuration file or environment could not be read
    #[error("Configuration load failed: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown sensor type: {0}")]
    UnknownSensor(String),

    #[error("Missing required pin: {0}")]
    MissingPin(&'static str),

    #[error("Invalid {name} GPIO {pin} (valid range 0..={max})")]
    InvalidPin { name: &'static str, pin: u8, max: u8 },

    /// A hardware call failed during bring-up
    #[error("{stage} failed: {source}")]
    Hal {
        stage: BringUpStage,
        #[source]
        source: HalError,
    },

    /// The sensor did not answer on SCCB
    #[error("Sensor communication failed during {stage}: {source}")]
    SensorCommunication {
        stage: BringUpStage,
        #[source]
        source: SensorError,
    },

    /// The sensor answered with someone else's product ID
    #[error("Sensor ID mismatch: expected 0x{expected:04X}, read 0x{actual:04X}")]
    IdMismatch { expected: u16, actual: u16 },

    #[error("Camera not initialized")]
    NotInitialized,

    #[error("Camera failed during bring-up; create a new instance to retry")]
    DeviceFailed,

    #[error("Camera not streaming")]
    NotStreaming,

    /// A stream start sub-step failed; the camera stays idle
    #[error("Stream start failed at {step}: {source}")]
    StreamStart {
        step: StreamStep,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Sub-steps of `start_streaming`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStep {
    Sensor,
    Csi,
}

impl fmt::Display for StreamStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamStep::Sensor => f.write_str("sensor stream on"),
            StreamStep::Csi => f.write_str("CSI start"),
        }
    }
}

impl CameraError {
    pub(crate) fn hal(stage: BringUpStage) -> impl FnOnce(HalError) -> CameraError {
        move |source| CameraError::Hal { stage, source }
    }

    pub(crate) fn sensor(stage: BringUpStage) -> impl FnOnce(SensorError) -> CameraError {
        move |source| match source {
            SensorError::Unsupported(key) => CameraError::UnknownSensor(key),
            source => CameraError::SensorCommunication { stage, source },
        }
    }

    /// Bring-up stage this error is attributed to, if any
    pub fn stage(&self) -> Option<BringUpStage> {
        match self {
            CameraError::Hal { stage, .. } | CameraError::SensorCommunication { stage, .. } => {
                Some(*stage)
            }
            CameraError::IdMismatch { .. } => Some(BringUpStage::SensorInit),
            _ => None,
        }
    }

    /// True for errors detected before any hardware I/O
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            CameraError::Config(_)
                | CameraError::InvalidConfig(_)
                | CameraError::UnknownSensor(_)
                | CameraError::MissingPin(_)
                | CameraError::InvalidPin { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_hal::EspErr;

    #[test]
    fn test_hal_error_message() {
        let err = CameraError::hal(BringUpStage::Isp)(HalError::new("esp_isp_enable", EspErr::Fail));
        assert_eq!(err.to_string(), "ISP failed: esp_isp_enable failed: ESP_FAIL (0xffffffff)");
        assert_eq!(err.stage(), Some(BringUpStage::Isp));
        assert!(!err.is_config());
    }

    #[test]
    fn test_unsupported_sensor_is_config_error() {
        let err = CameraError::sensor(BringUpStage::SensorCreate)(SensorError::Unsupported(
            "imx219".into(),
        ));
        assert!(matches!(err, CameraError::UnknownSensor(ref key) if key == "imx219"));
        assert!(err.is_config());
    }

    #[test]
    fn test_id_mismatch_message() {
        let err = CameraError::IdMismatch {
            expected: 0xEB52,
            actual: 0x5647,
        };
        assert_eq!(err.to_string(), "Sensor ID mismatch: expected 0xEB52, read 0x5647");
    }
}

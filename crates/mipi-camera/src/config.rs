//! Camera configuration

use std::path::Path;

use camera_hal::MAX_GPIO;
use camera_sensors::SensorRegistry;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::CameraError;

/// Prefix for environment overrides, e.g. `MIPI_CAMERA__RESET_PIN=36`
pub const ENV_PREFIX: &str = "MIPI_CAMERA";

/// External pixel clock on an LEDC channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalClockConfig {
    /// Output GPIO; required whenever the clock section is present
    #[serde(default)]
    pub pin: Option<u8>,
    pub frequency_hz: u32,
}

/// Bring-up and streaming delays (milliseconds)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub clock_settle_ms: u32,
    pub reset_low_ms: u32,
    pub reset_high_ms: u32,
    pub sensor_settle_ms: u32,
    pub stream_settle_ms: u32,
    pub auto_start_delay_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            clock_settle_ms: 50,
            reset_low_ms: 10,
            reset_high_ms: 20,
            sensor_settle_ms: 200,
            stream_settle_ms: 100,
            auto_start_delay_ms: 100,
        }
    }
}

impl TimingConfig {
    /// All delays zeroed
    pub fn immediate() -> Self {
        Self {
            clock_settle_ms: 0,
            reset_low_ms: 0,
            reset_high_ms: 0,
            sensor_settle_ms: 0,
            stream_settle_ms: 0,
            auto_start_delay_ms: 0,
        }
    }
}

/// Camera configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Registry key of the sensor driver, case-insensitive
    pub sensor_type: String,

    /// Active-low sensor reset line
    pub reset_pin: Option<u8>,

    /// Without this the sensor runs from its own oscillator
    pub external_clock: Option<ExternalClockConfig>,

    /// Start streaming at the end of `setup()`
    pub auto_start: bool,

    pub timing: TimingConfig,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            sensor_type: "sc202cs".to_string(),
            reset_pin: None,
            external_clock: None,
            auto_start: true,
            timing: TimingConfig::default(),
        }
    }
}

impl CameraConfig {
    pub fn new(sensor_type: impl Into<String>) -> Self {
        Self {
            sensor_type: sensor_type.into(),
            ..Default::default()
        }
    }

    pub fn with_reset_pin(mut self, pin: u8) -> Self {
        self.reset_pin = Some(pin);
        self
    }

    pub fn with_external_clock(mut self, pin: u8, frequency_hz: u32) -> Self {
        self.external_clock = Some(ExternalClockConfig {
            pin: Some(pin),
            frequency_hz,
        });
        self
    }

    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Load from a TOML file, then apply `MIPI_CAMERA__*` environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CameraError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Check everything that can be checked without touching hardware
    pub fn validate(&self, registry: &SensorRegistry) -> Result<(), CameraError> {
        if self.sensor_type.trim().is_empty() {
            return Err(CameraError::InvalidConfig("sensor_type is empty".into()));
        }
        if !registry.contains(&self.sensor_type) {
            return Err(CameraError::UnknownSensor(self.sensor_type.clone()));
        }

        if let Some(pin) = self.reset_pin {
            check_pin("reset", pin)?;
        }

        if let Some(clock) = &self.external_clock {
            let pin = clock.pin.ok_or(CameraError::MissingPin("external_clock.pin"))?;
            check_pin("external clock", pin)?;
            if clock.frequency_hz == 0 {
                return Err(CameraError::InvalidConfig(
                    "external clock frequency must be nonzero".into(),
                ));
            }
            if self.reset_pin == Some(pin) {
                return Err(CameraError::InvalidConfig(format!(
                    "GPIO {} used for both reset and external clock",
                    pin
                )));
            }
        }
        Ok(())
    }
}

fn check_pin(name: &'static str, pin: u8) -> Result<(), CameraError> {
    if pin > MAX_GPIO {
        return Err(CameraError::InvalidPin {
            name,
            pin,
            max: MAX_GPIO,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_toml(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "mipi-camera-{}-{}.toml",
            name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = CameraConfig::default();
        assert!(config.auto_start);
        assert_eq!(config.timing.sensor_settle_ms, 200);
        assert!(config.validate(&SensorRegistry::builtin()).is_ok());
    }

    #[test]
    fn test_unknown_sensor() {
        let config = CameraConfig::new("imx219");
        let err = config.validate(&SensorRegistry::builtin()).unwrap_err();
        assert!(matches!(err, CameraError::UnknownSensor(_)));
    }

    #[test]
    fn test_sensor_type_case_insensitive() {
        assert!(CameraConfig::new("OV5647")
            .validate(&SensorRegistry::builtin())
            .is_ok());
    }

    #[test]
    fn test_pin_checks() {
        let registry = SensorRegistry::builtin();

        let err = CameraConfig::default().with_reset_pin(60).validate(&registry);
        assert!(matches!(err, Err(CameraError::InvalidPin { pin: 60, .. })));

        let err = CameraConfig::default()
            .with_reset_pin(36)
            .with_external_clock(36, 24_000_000)
            .validate(&registry);
        assert!(matches!(err, Err(CameraError::InvalidConfig(_))));

        let err = CameraConfig::default()
            .with_external_clock(36, 0)
            .validate(&registry);
        assert!(matches!(err, Err(CameraError::InvalidConfig(_))));

        let mut config = CameraConfig::default();
        config.external_clock = Some(ExternalClockConfig {
            pin: None,
            frequency_hz: 24_000_000,
        });
        assert!(matches!(
            config.validate(&registry),
            Err(CameraError::MissingPin("external_clock.pin"))
        ));
    }

    #[test]
    fn test_load_toml() {
        let path = temp_toml(
            "load",
            r#"
sensor_type = "ov5647"
reset_pin = 36
auto_start = false

[external_clock]
pin = 24
frequency_hz = 24000000

[timing]
sensor_settle_ms = 300
"#,
        );
        let config = CameraConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.sensor_type, "ov5647");
        assert_eq!(config.reset_pin, Some(36));
        assert!(!config.auto_start);
        assert_eq!(
            config.external_clock,
            Some(ExternalClockConfig {
                pin: Some(24),
                frequency_hz: 24_000_000
            })
        );
        assert_eq!(config.timing.sensor_settle_ms, 300);
        assert_eq!(config.timing.reset_low_ms, 10);
    }

    #[test]
    fn test_load_missing_file() {
        let err = CameraConfig::load("/nonexistent/mipi-camera.toml").unwrap_err();
        assert!(matches!(err, CameraError::Config(_)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CameraConfig = serde_json::from_str(r#"{"sensor_type": "sc202cs"}"#).unwrap();
        assert_eq!(config, CameraConfig::default());
    }
}

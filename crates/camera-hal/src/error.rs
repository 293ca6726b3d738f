//! Vendor return codes and the HAL error type

use thiserror::Error;

/// Return codes reported by the SoC driver layer (`esp_err_t` values)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EspErr {
    Ok,
    Fail,
    NoMem,
    InvalidArg,
    InvalidState,
    InvalidSize,
    NotFound,
    NotSupported,
    Timeout,
    Unknown(i32),
}

impl EspErr {
    /// Raw numeric value as seen on the C side
    pub fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Fail => -1,
            Self::NoMem => 0x101,
            Self::InvalidArg => 0x102,
            Self::InvalidState => 0x103,
            Self::InvalidSize => 0x104,
            Self::NotFound => 0x105,
            Self::NotSupported => 0x106,
            Self::Timeout => 0x107,
            Self::Unknown(code) => code,
        }
    }

    /// Short symbolic name, matching the vendor macro names
    pub fn name(self) -> &'static str {
        match self {
            Self::Ok => "ESP_OK",
            Self::Fail => "ESP_FAIL",
            Self::NoMem => "ESP_ERR_NO_MEM",
            Self::InvalidArg => "ESP_ERR_INVALID_ARG",
            Self::InvalidState => "ESP_ERR_INVALID_STATE",
            Self::InvalidSize => "ESP_ERR_INVALID_SIZE",
            Self::NotFound => "ESP_ERR_NOT_FOUND",
            Self::NotSupported => "ESP_ERR_NOT_SUPPORTED",
            Self::Timeout => "ESP_ERR_TIMEOUT",
            Self::Unknown(_) => "ESP_ERR_UNKNOWN",
        }
    }
}

impl From<i32> for EspErr {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            -1 => Self::Fail,
            0x101 => Self::NoMem,
            0x102 => Self::InvalidArg,
            0x103 => Self::InvalidState,
            0x104 => Self::InvalidSize,
            0x105 => Self::NotFound,
            0x106 => Self::NotSupported,
            0x107 => Self::Timeout,
            other => Self::Unknown(other),
        }
    }
}

impl std::fmt::Display for EspErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.code())
    }
}

/// A failed hardware call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{op} failed: {code}")]
pub struct HalError {
    /// Name of the driver operation, e.g. `"esp_cam_ctlr_enable"`
    pub op: &'static str,
    /// Code returned by the driver
    pub code: EspErr,
}

impl HalError {
    pub fn new(op: &'static str, code: impl Into<EspErr>) -> Self {
        Self {
            op,
            code: code.into(),
        }
    }
}

/// Turn a raw return code into a `Result`
pub fn check(op: &'static str, code: i32) -> Result<(), HalError> {
    match EspErr::from(code) {
        EspErr::Ok => Ok(()),
        err => Err(HalError::new(op, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_code_mapping() {
        assert_eq!(EspErr::from(0), EspErr::Ok);
        assert_eq!(EspErr::from(0x101), EspErr::NoMem);
        assert_eq!(EspErr::from(0x107), EspErr::Timeout);
        assert_eq!(EspErr::from(42), EspErr::Unknown(42));
        assert_eq!(EspErr::InvalidState.code(), 0x103);
    }

    #[test]
    fn test_check() {
        assert!(check("ledc_timer_config", 0).is_ok());
        let err = check("ledc_timer_config", 0x102).unwrap_err();
        assert_eq!(err.op, "ledc_timer_config");
        assert_eq!(err.code, EspErr::InvalidArg);
        assert_eq!(
            err.to_string(),
            "ledc_timer_config failed: ESP_ERR_INVALID_ARG (0x102)"
        );
    }

    proptest! {
        #[test]
        fn test_any_code_maps_back(code in any::<i32>()) {
            prop_assert_eq!(EspErr::from(code).code(), code);
            prop_assert_eq!(check("op", code).is_ok(), code == 0);
        }
    }
}

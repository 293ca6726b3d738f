//! Sensor lookup by configured type string

use std::fmt;
use std::str::FromStr;

use crate::{
    ChipId, Ov5647, Sc202cs, SensorContext, SensorDriver, SensorError, OV5647_CHIP_ID,
    SC202CS_CHIP_ID,
};

/// Built-in sensor models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Sc202cs,
    Ov5647,
}

impl SensorKind {
    pub const ALL: [SensorKind; 2] = [SensorKind::Sc202cs, SensorKind::Ov5647];

    /// Registry key, as written in configuration
    pub fn key(self) -> &'static str {
        match self {
            SensorKind::Sc202cs => "sc202cs",
            SensorKind::Ov5647 => "ov5647",
        }
    }

    pub fn chip_id(self) -> ChipId {
        match self {
            SensorKind::Sc202cs => SC202CS_CHIP_ID,
            SensorKind::Ov5647 => OV5647_CHIP_ID,
        }
    }

    pub fn create(self, ctx: SensorContext) -> Box<dyn SensorDriver> {
        match self {
            SensorKind::Sc202cs => Box::new(Sc202cs::new(ctx)),
            SensorKind::Ov5647 => Box::new(Ov5647::new(ctx)),
        }
    }
}

impl FromStr for SensorKind {
    type Err = SensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorKind::ALL
            .into_iter()
            .find(|kind| kind.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| SensorError::Unsupported(s.to_string()))
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

type Factory = Box<dyn Fn(SensorContext) -> Box<dyn SensorDriver> + Send + Sync>;

/// Table of sensor factories keyed by lowercase type string
pub struct SensorRegistry {
    entries: Vec<(String, Factory)>,
}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SensorRegistry {
    /// Registry holding every [`SensorKind`]
    pub fn builtin() -> Self {
        SensorKind::ALL
            .into_iter()
            .fold(Self::empty(), |registry, kind| {
                registry.with_entry(kind.key(), move |ctx| kind.create(ctx))
            })
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add or replace a factory
    pub fn with_entry<F>(mut self, key: &str, factory: F) -> Self
    where
        F: Fn(SensorContext) -> Box<dyn SensorDriver> + Send + Sync + 'static,
    {
        let key = key.to_ascii_lowercase();
        self.entries.retain(|(existing, _)| *existing != key);
        self.entries.push((key, Box::new(factory)));
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(key, _)| key.as_str()).collect()
    }

    /// Instantiate the driver registered under `key`
    pub fn create(
        &self,
        key: &str,
        ctx: SensorContext,
    ) -> Result<Box<dyn SensorDriver>, SensorError> {
        let factory = self
            .find(key)
            .ok_or_else(|| SensorError::Unsupported(key.to_string()))?;
        Ok(factory(ctx))
    }

    fn find(&self, key: &str) -> Option<&Factory> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(key))
            .map(|(_, factory)| factory)
    }
}

// Analytics options selected by the dashboard controls
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// SOC (%) below which the discharge preceding a charge counts as deep.
pub const DEFAULT_DEEP_DISCHARGE_SOC: f64 = 30.0;

#[derive(Debug, Error, PartialEq)]
pub enum OptionsError {
    #[error("temperature bucket width must be one of 5, 10, 15 or 20 degrees, got {0}")]
    InvalidBucketWidth(u32),
    #[error("deep discharge threshold must be within 0..=100, got {0}")]
    InvalidDeepDischargeSoc(f64),
}

/// Temperature histogram bin width in °C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "u32")]
pub enum BucketWidth {
    Five,
    #[default]
    Ten,
    Fifteen,
    Twenty,
}

impl BucketWidth {
    pub const ALL: [BucketWidth; 4] = [
        BucketWidth::Five,
        BucketWidth::Ten,
        BucketWidth::Fifteen,
        BucketWidth::Twenty,
    ];

    pub fn degrees(self) -> f64 {
        match self {
            BucketWidth::Five => 5.0,
            BucketWidth::Ten => 10.0,
            BucketWidth::Fifteen => 15.0,
            BucketWidth::Twenty => 20.0,
        }
    }
}

impl TryFrom<u32> for BucketWidth {
    type Error = OptionsError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(BucketWidth::Five),
            10 => Ok(BucketWidth::Ten),
            15 => Ok(BucketWidth::Fifteen),
            20 => Ok(BucketWidth::Twenty),
            other => Err(OptionsError::InvalidBucketWidth(other)),
        }
    }
}

impl fmt::Display for BucketWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°C", self.degrees())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyticsOptions {
    pub bucket_width: BucketWidth,
    pub deep_discharge_soc: f64,
}

impl AnalyticsOptions {
    pub fn new(bucket_width: BucketWidth, deep_discharge_soc: f64) -> Result<Self, OptionsError> {
        if !(0.0..=100.0).contains(&deep_discharge_soc) {
            return Err(OptionsError::InvalidDeepDischargeSoc(deep_discharge_soc));
        }
        Ok(Self {
            bucket_width,
            deep_discharge_soc,
        })
    }
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self {
            bucket_width: BucketWidth::default(),
            deep_discharge_soc: DEFAULT_DEEP_DISCHARGE_SOC,
        }
    }
}

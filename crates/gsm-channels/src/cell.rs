//! Cell, receiver and key inputs consumed by a decode

use crate::error::{ChannelError, Result};

/// GSM cell the capture file was recorded from
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    /// Carrier frequency as understood by the decoder (e.g. `935.2e6`)
    pub frequency: String,
}

impl Cell {
    pub fn new(frequency: impl Into<String>) -> Self {
        Self {
            frequency: frequency.into(),
        }
    }
}

/// Receiver settings the capture was made with
///
/// Carried alongside a decode for logging and bookkeeping; none of it is
/// passed to the decoder.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceConfig {
    /// Index of the SDR dongle
    pub device_index: u32,
    /// Tuner gain in dB (`None` = automatic)
    pub gain: Option<f64>,
    /// Frequency correction in parts per million
    pub ppm: i32,
    /// Sample rate in samples per second
    pub sample_rate: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            gain: None,
            ppm: 0,
            sample_rate: 1_000_000,
        }
    }
}

/// A5 cipher key used to decrypt a dedicated channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// A5 algorithm version (`1`, `2` or `3`)
    pub algorithm: String,
    /// Session key Kc, as accepted by the decoder
    pub key: String,
}

impl KeyMaterial {
    /// Build key material from caller-supplied tokens
    ///
    /// Tokens are `[algorithm, key]`. No tokens means the channel is in
    /// clear; any count other than zero or two is rejected.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Option<Self>> {
        match tokens {
            [] => Ok(None),
            [algorithm, key] => Ok(Some(Self {
                algorithm: algorithm.as_ref().to_string(),
                key: key.as_ref().to_string(),
            })),
            other => Err(ChannelError::invalid(format!(
                "expected 0 or 2 key tokens (algorithm, key), got {}",
                other.len()
            ))),
        }
    }
}

// APU 設定 - 輸出取樣率與取樣複製倍率

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Result};

/// Runtime knobs for the synthesizer. Every field has a default, so a config
/// file only needs to name what it overrides.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ApuConfig {
    /// Rate of the host's output buffers, in Hz.
    pub output_sample_rate: u32,
    /// Output slots filled per generated sample. Higher values trade audio
    /// quality for CPU time; does not need to be a power of two.
    pub replication: u32,
    /// Upper bound on the slots handled per internal sub-block (rounded up to
    /// a multiple of `replication`).
    pub max_chunk: usize,
    /// Initial state of the generation enable switch.
    pub start_enabled: bool,
}

impl Default for ApuConfig {
    fn default() -> Self {
        ApuConfig {
            output_sample_rate: 44100,
            replication: 2,
            max_chunk: 256,
            start_enabled: true,
        }
    }
}

impl ApuConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let config: ApuConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.replication == 0 {
            return Err(ConfigError::ZeroReplication);
        }
        if self.output_sample_rate < self.replication {
            return Err(ConfigError::RateBelowReplication {
                rate: self.output_sample_rate,
                replication: self.replication,
            });
        }
        if self.max_chunk == 0 {
            return Err(ConfigError::ZeroChunk);
        }
        Ok(())
    }

    /// True samples generated per second.
    pub fn step_rate(&self) -> u32 {
        self.output_sample_rate / self.replication
    }
}

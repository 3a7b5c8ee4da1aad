// 寄存器腳本播放器 - 依幀重播 APU 寫入
//
// 腳本格式 (JSON):
//   { "frames": 120, "writes": [ { "frame": 0, "address": "0xFF26", "value": 128 }, ... ] }

use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;

use crate::apu::{Apu, is_apu_address};
use crate::error::{Error, Result};

/// Frames played after the last scheduled write when `frames` is absent.
pub const DEFAULT_TAIL_FRAMES: u32 = 60;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledWrite {
    pub frame: u32,
    #[serde(deserialize_with = "deserialize_address")]
    pub address: u16,
    pub value: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RegisterScript {
    /// Total frames to render; defaults to the last write plus a short tail.
    #[serde(default)]
    pub frames: Option<u32>,
    pub writes: Vec<ScheduledWrite>,
}

/// Accepts either a JSON number or a "0xFF12"-style hex string.
fn deserialize_address<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Address {
        Number(u16),
        Text(String),
    }

    match Address::deserialize(deserializer)? {
        Address::Number(addr) => Ok(addr),
        Address::Text(text) => {
            let digits = text
                .trim()
                .trim_start_matches("0x")
                .trim_start_matches("0X");
            u16::from_str_radix(digits, 16)
                .map_err(|_| serde::de::Error::custom(format!("invalid address {:?}", text)))
        }
    }
}

impl RegisterScript {
    pub fn from_json(data: &str) -> Result<Self> {
        let script: RegisterScript = serde_json::from_str(data)?;
        script.validate()?;
        Ok(script)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let script = Self::from_json(&fs::read_to_string(path)?)?;
        log::info!(
            "Loaded register script: {} writes, {} frames",
            script.writes.len(),
            script.length_frames()
        );
        Ok(script)
    }

    /// Every write must land in the APU window.
    pub fn validate(&self) -> Result<()> {
        match self.writes.iter().find(|w| !is_apu_address(w.address)) {
            Some(write) => Err(Error::InvalidAddress(write.address)),
            None => Ok(()),
        }
    }

    pub fn length_frames(&self) -> u32 {
        self.frames.unwrap_or_else(|| {
            self.writes
                .iter()
                .map(|w| w.frame + 1)
                .max()
                .unwrap_or(0)
                + DEFAULT_TAIL_FRAMES
        })
    }
}

/// Drives an [`Apu`] one video frame at a time: apply the frame's writes,
/// then render one frame of audio.
#[derive(Debug)]
pub struct Player {
    writes: Vec<ScheduledWrite>,
    next_write: usize,
    frame: u32,
    total_frames: u32,
}

impl Player {
    pub fn new(script: RegisterScript) -> Result<Self> {
        script.validate()?;
        let total_frames = script.length_frames();
        let mut writes = script.writes;
        // 穩定排序，同一幀內保持原始寫入順序
        writes.sort_by_key(|w| w.frame);
        Ok(Player {
            writes,
            next_write: 0,
            frame: 0,
            total_frames,
        })
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }

    pub fn is_finished(&self) -> bool {
        self.frame >= self.total_frames
    }

    fn apply_writes(&mut self, apu: &mut Apu) {
        while let Some(write) = self.writes.get(self.next_write) {
            if write.frame > self.frame {
                break;
            }
            log::trace!(
                "frame {}: write 0x{:02X} -> 0x{:04X}",
                self.frame,
                write.value,
                write.address
            );
            apu.write(write.address, write.value);
            self.next_write += 1;
        }
    }

    /// Plays one frame into `left`/`right` (sized by the caller, normally
    /// [`Apu::samples_per_frame`]). Returns what [`Apu::generate`] returned.
    pub fn step_frame(&mut self, apu: &mut Apu, left: &mut [i16], right: &mut [i16]) -> bool {
        self.apply_writes(apu);
        let produced = apu.generate(left, right);
        self.frame += 1;
        produced
    }

    /// Renders every remaining frame back to back.
    pub fn render_all(&mut self, apu: &mut Apu) -> (Vec<i16>, Vec<i16>) {
        let per_frame = apu.samples_per_frame();
        let remaining = self.total_frames.saturating_sub(self.frame) as usize;
        let mut left = vec![0i16; per_frame * remaining];
        let mut right = vec![0i16; per_frame * remaining];

        for (l, r) in left
            .chunks_mut(per_frame)
            .zip(right.chunks_mut(per_frame))
        {
            self.step_frame(apu, l, r);
        }
        (left, right)
    }
}

/// Peak and RMS level of one output channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LevelStats {
    pub peak: i16,
    pub rms: f64,
}

impl LevelStats {
    pub fn measure(samples: &[i16]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let peak = samples.iter().map(|s| s.saturating_abs()).max().unwrap_or(0);
        let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        LevelStats {
            peak,
            rms: (sum / samples.len() as f64).sqrt(),
        }
    }
}

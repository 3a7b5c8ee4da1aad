// 時序表 - 噪音頻率表、占空比、讀取遮罩

use crate::config::ApuConfig;

pub const DMG_CLOCK_FREQ: u32 = 4_194_304;
pub const SCREEN_REFRESH_CYCLES: f64 = 70224.0;
/// Frames per second of the emulated LCD (~59.73 Hz).
pub const VERTICAL_SYNC: f64 = DMG_CLOCK_FREQ as f64 / SCREEN_REFRESH_CYCLES;

pub const MAX_CHAN_VOLUME: u8 = 15;

const VOL_INIT_MAX: i32 = i16::MAX as i32 / 8;
const VOL_INIT_MIN: i32 = i16::MIN as i32 / 8;

/// Square and noise output levels, one step of a full-volume channel.
pub const LEVEL_HIGH: i32 = VOL_INIT_MAX / MAX_CHAN_VOLUME as i32;
pub const LEVEL_LOW: i32 = VOL_INIT_MIN / MAX_CHAN_VOLUME as i32;
/// Wave output per nibble step above or below the 8 midpoint.
pub const WAVE_LEVEL_UNIT: i32 = i16::MAX as i32 / 64;

/// 12.5%, 25%, 50%, 75%; bit n is the level of duty step n.
pub const DUTY_LOOKUP: [u8; 4] = [0x10, 0x30, 0x3C, 0xCF];

/// Bits that read back as 1, indexed by `addr - 0xFF10`.
#[rustfmt::skip]
pub const READ_MASKS: [u8; 0x30] = [
    0x80, 0x3F, 0x00, 0xFF, 0xBF, // NR10-NR14
    0xFF, 0x3F, 0x00, 0xFF, 0xBF, // NR20-NR24
    0x7F, 0xFF, 0x9F, 0xFF, 0xBF, // NR30-NR34
    0xFF, 0xFF, 0x00, 0x00, 0xBF, // NR40-NR44
    0x00, 0x00, 0x70,             // NR50-NR52
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // 0xFF27-0xFF2F
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // wave RAM
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Post-boot register contents, written in order from 0xFF10.
#[rustfmt::skip]
pub const REGISTER_DEFAULTS: [u8; 23] = [
    0x80, 0xBF, 0xF3, 0xFF, 0x3F,
    0xFF, 0x3F, 0x00, 0xFF, 0x3F,
    0x7F, 0xFF, 0x9F, 0xFF, 0x3F,
    0xFF, 0xFF, 0x00, 0x00, 0x3F,
    0x77, 0xF3, 0xF1,
];

#[rustfmt::skip]
pub const WAVE_DEFAULTS: [u8; 16] = [
    0xAC, 0xDD, 0xDA, 0x48,
    0x36, 0x02, 0xCF, 0x16,
    0x2C, 0x04, 0xE5, 0x2C,
    0xAC, 0xDD, 0xDA, 0x48,
];

/// Constants derived from an [`ApuConfig`]. All fixed-point timers advance
/// once per generated sample ("step") and fire when their counter passes
/// `inc_ref`.
#[derive(Debug, Clone)]
pub struct Timing {
    pub replication: usize,
    /// Generated samples per second.
    pub step_rate: u32,
    /// Fixed-point threshold shared by every timer. Must be >= `step_rate`.
    pub inc_ref: u32,
    pub max_chunk: usize,
    /// Noise channel frequency in Hz by `[divisor_code][shift_code]`.
    pub noise_freqs: [[u32; 16]; 8],
}

impl Timing {
    pub fn new(config: &ApuConfig) -> Self {
        let replication = config.replication.max(1) as usize;
        let step_rate = config.step_rate().max(1);
        let max_chunk = config.max_chunk.max(1).div_ceil(replication) * replication;

        Timing {
            replication,
            step_rate,
            inc_ref: step_rate,
            max_chunk,
            noise_freqs: noise_frequency_table(),
        }
    }

    /// Converts a note frequency in Hz into a per-step counter increment.
    pub fn note_increment(&self, freq: u32) -> u32 {
        freq * (self.inc_ref / self.step_rate)
    }

    pub fn envelope_increment(&self, step: u8) -> u32 {
        if step == 0 {
            // Fires roughly every 1/8 s but never changes the volume.
            ((8 * self.inc_ref as u64) / self.step_rate as u64) as u32
        } else {
            ((64 * self.inc_ref as u64) / (step as u64 * self.step_rate as u64)) as u32
        }
    }

    pub fn sweep_increment(&self, period: u8) -> u32 {
        if period == 0 {
            return 0;
        }
        ((128 * self.inc_ref as u64) / (period as u64 * self.step_rate as u64)) as u32
    }

    pub fn length_increment(&self, remaining: u32) -> u32 {
        ((256 * self.inc_ref as u64) / (self.step_rate as u64 * remaining.max(1) as u64)) as u32
    }

    /// Output slots per emulated video frame.
    pub fn samples_per_frame(&self) -> usize {
        let per_frame = (self.step_rate as f64 / VERTICAL_SYNC) as usize;
        per_frame * self.replication
    }
}

fn noise_frequency_table() -> [[u32; 16]; 8] {
    let mut table = [[0u32; 16]; 8];
    for (divisor_code, row) in table.iter_mut().enumerate() {
        let divisor: u32 = if divisor_code == 0 {
            8
        } else {
            divisor_code as u32 * 16
        };
        for (shift, freq) in row.iter_mut().enumerate() {
            let term = divisor << shift;
            *freq = if term == 0 { 0 } else { DMG_CLOCK_FREQ / term };
        }
    }
    table
}

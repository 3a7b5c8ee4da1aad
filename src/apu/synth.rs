// 取樣合成 - 各聲道逐步產生取樣並疊加到輸出區塊

use super::channel::{Channel, ChannelKind, Duty, square_frequency, wave_frequency};
use super::registers::RegisterFile;
use super::tables::{LEVEL_HIGH, LEVEL_LOW, Timing, WAVE_LEVEL_UNIT};

/// Noise blocks whose per-step increment falls below this are skipped.
pub const NOISE_MIN_INCREMENT: u32 = 1000;

/// Noise shift codes from here up produce no clock on hardware.
const NOISE_SILENT_SHIFT: u16 = 14;

/// One sub-block of output plus the master volumes it is mixed at.
#[derive(Debug)]
pub(super) struct Mix<'a> {
    pub left: &'a mut [i16],
    pub right: &'a mut [i16],
    pub volume_left: i32,
    pub volume_right: i32,
}

impl<'a> Mix<'a> {
    pub fn len(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    fn add(&mut self, index: usize, sample: i32, on_left: bool, on_right: bool) {
        let left = sample * on_left as i32 * self.volume_left;
        let right = sample * on_right as i32 * self.volume_right;
        // 16-bit wraparound, same as the hardware-facing integer mixer
        self.left[index] = self.left[index].wrapping_add(left as i16);
        self.right[index] = self.right[index].wrapping_add(right as i16);
    }

    /// Copies each generated sample over the rest of its group of slots.
    pub fn replicate(&mut self, replication: usize) {
        let len = self.len();
        for start in (0..len).step_by(replication) {
            let end = (start + replication).min(len);
            for slot in start + 1..end {
                self.left[slot] = self.left[start];
                self.right[slot] = self.right[start];
            }
        }
    }
}

/// Whole steps' worth of phase between two crossings. A crossing always
/// lands less than one `frequency_increment` after the previous one, so this
/// truncates to 0 and each step's output is just the level it ends on.
/// Rounding it up would shift every wave sample by one step.
fn weight(pos: u32, prev_pos: u32, frequency_increment: u32) -> i32 {
    ((pos - prev_pos) / frequency_increment) as i32
}

impl Duty {
    /// Moves to the next of the 8 duty steps and returns its level.
    fn clock(&mut self) -> i32 {
        self.step = (self.step + 1) & 7;
        if self.pattern & (1 << self.step) != 0 {
            LEVEL_HIGH
        } else {
            LEVEL_LOW
        }
    }
}

pub(super) fn render_square(channel: &mut Channel, timing: &Timing, mix: &mut Mix) {
    if !channel.powered || !channel.enabled {
        return;
    }
    let Some(mut duty) = channel.duty() else {
        return;
    };

    channel.frequency_increment = timing.note_increment(square_frequency(channel.frequency)) * 8;
    let len = channel.update_length(mix.len(), timing);

    for i in (0..len).step_by(timing.replication) {
        channel.update_envelope(timing);
        channel.update_sweep(timing);
        if !channel.enabled {
            break;
        }

        let mut pos = 0;
        let mut prev_pos = 0;
        let mut sample = 0;

        while channel.advance_phase(&mut pos, timing.inc_ref) {
            sample += weight(pos, prev_pos, channel.frequency_increment) * channel.level;
            channel.level = duty.clock();
            prev_pos = pos;
        }

        if channel.muted {
            continue;
        }

        sample += channel.level;
        sample *= channel.volume as i32;
        sample /= 4;

        mix.add(i, sample, channel.on_left, channel.on_right);
    }

    if let Some(state) = channel.duty_mut() {
        *state = duty;
    }
}

/// Nibble at `position` after the wave volume shift; code 0 mutes.
fn wave_sample(regs: &RegisterFile, position: u8, volume_code: u8) -> u8 {
    let nibble = regs.wave_nibble(position);
    match volume_code {
        0 => 0,
        code => nibble >> (code - 1),
    }
}

pub(super) fn render_wave(
    channel: &mut Channel,
    regs: &RegisterFile,
    timing: &Timing,
    mix: &mut Mix,
) {
    if !channel.powered || !channel.enabled {
        return;
    }
    let ChannelKind::Wave { sample_position } = channel.kind else {
        return;
    };
    let mut position = sample_position;

    channel.frequency_increment = timing.note_increment(wave_frequency(channel.frequency)) * 32;
    let len = channel.update_length(mix.len(), timing);

    for i in (0..len).step_by(timing.replication) {
        let mut pos = 0;
        let mut prev_pos = 0;
        let mut sample = 0;

        let mut nibble = wave_sample(regs, position, channel.volume) as i32;

        while channel.advance_phase(&mut pos, timing.inc_ref) {
            position = (position + 1) & 31;
            sample += weight(pos, prev_pos, channel.frequency_increment)
                * (nibble - 8)
                * WAVE_LEVEL_UNIT;
            nibble = wave_sample(regs, position, channel.volume) as i32;
            prev_pos = pos;
        }

        sample += (nibble - 8) * WAVE_LEVEL_UNIT;
        channel.level = (nibble - 8) * WAVE_LEVEL_UNIT;

        if channel.volume == 0 || channel.muted {
            continue;
        }

        sample /= 4;
        mix.add(i, sample, channel.on_left, channel.on_right);
    }

    channel.kind = ChannelKind::Wave {
        sample_position: position,
    };
}

pub(super) fn render_noise(channel: &mut Channel, timing: &Timing, mix: &mut Mix) {
    if !channel.powered {
        return;
    }
    let ChannelKind::Noise {
        mut lfsr,
        width,
        divisor_code,
    } = channel.kind
    else {
        return;
    };

    let shift = channel.frequency & 0x0F;
    if shift >= NOISE_SILENT_SHIFT && channel.enabled {
        log::debug!("Noise shift {} is silent, channel stopped", shift);
        channel.enabled = false;
    }

    let freq = timing.noise_freqs[(divisor_code & 0x07) as usize][shift as usize];
    channel.frequency_increment = timing.note_increment(freq);
    if channel.frequency_increment < NOISE_MIN_INCREMENT {
        return;
    }

    let len = channel.update_length(mix.len(), timing);

    for i in (0..len).step_by(timing.replication) {
        channel.update_envelope(timing);

        let mut pos = 0;
        let mut prev_pos = 0;
        let mut sample = 0;

        while channel.advance_phase(&mut pos, timing.inc_ref) {
            channel.level = if lfsr.clock(width) {
                LEVEL_HIGH
            } else {
                LEVEL_LOW
            };
            sample += weight(pos, prev_pos, channel.frequency_increment) * channel.level;
            prev_pos = pos;
        }

        if channel.muted {
            continue;
        }

        sample += channel.level;
        sample *= channel.volume as i32;
        sample /= 4;

        mix.add(i, sample, channel.on_left, channel.on_right);
    }

    if let ChannelKind::Noise { lfsr: state, .. } = &mut channel.kind {
        *state = lfsr;
    }
}

// 聲道狀態機 - 觸發、長度、包絡、掃描

use super::registers::{NR10, NR12, RegisterFile};
use super::tables::{DMG_CLOCK_FREQ, LEVEL_LOW, MAX_CHAN_VOLUME, Timing};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Square1,
    Square2,
    Wave,
    Noise,
}

impl ChannelId {
    pub const ALL: [ChannelId; 4] = [
        ChannelId::Square1,
        ChannelId::Square2,
        ChannelId::Wave,
        ChannelId::Noise,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Channel owning the register at `addr` (five registers per channel).
    pub fn from_address(addr: u16) -> Option<ChannelId> {
        match addr.wrapping_sub(0xFF10) / 5 {
            0 => Some(ChannelId::Square1),
            1 => Some(ChannelId::Square2),
            2 => Some(ChannelId::Wave),
            3 => Some(ChannelId::Noise),
            _ => None,
        }
    }

    fn max_length(self) -> u32 {
        match self {
            ChannelId::Wave => 256,
            _ => 64,
        }
    }

    /// NRx2 of this channel (NR32 for the wave channel).
    fn envelope_register(self) -> u16 {
        NR12 + 5 * self as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfsrWidth {
    /// 15-bit sequence, period 32767.
    Wide,
    /// 7-bit sequence, period 127.
    Narrow,
}

/// Noise shift register. Each clock shifts left, feeds the previous output
/// into bit 0 and outputs the XNOR of the two taps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lfsr {
    register: u16,
    output: bool,
}

impl Lfsr {
    pub const SEED: u16 = 0xFFFF;

    pub fn new() -> Self {
        Lfsr {
            register: Self::SEED,
            output: false,
        }
    }

    pub fn clock(&mut self, width: LfsrWidth) -> bool {
        self.register = (self.register << 1) | self.output as u16;
        let (high, low) = match width {
            LfsrWidth::Wide => (14, 13),
            LfsrWidth::Narrow => (6, 5),
        };
        self.output = (self.register >> high) & 1 == (self.register >> low) & 1;
        self.output
    }

    pub fn register(&self) -> u16 {
        self.register
    }

    pub fn output(&self) -> bool {
        self.output
    }
}

impl Default for Lfsr {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts up by `increment` per step toward the shared threshold; the channel
/// stops when it gets there.
#[derive(Debug, Clone, Default)]
pub struct LengthCounter {
    pub load: u8,
    pub enabled: bool,
    pub counter: u32,
    pub increment: u32,
}

impl LengthCounter {
    fn trigger(&mut self, max_length: u32, timing: &Timing) {
        self.increment = timing.length_increment(max_length - self.load as u32);
        self.counter = 0;
    }

    /// Advances over a block of `steps`. Returns the number of steps played
    /// before expiry, or `None` if the channel outlives the block.
    pub fn advance(&mut self, steps: usize, inc_ref: u32) -> Option<usize> {
        if self.increment == 0 {
            return None;
        }
        let remaining = (inc_ref.saturating_sub(self.counter) / self.increment) as usize;
        if remaining > steps {
            self.counter += steps as u32 * self.increment;
            None
        } else {
            self.counter = 0;
            Some(remaining)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VolumeEnvelope {
    /// 0 disables volume changes.
    pub step: u8,
    pub up: bool,
    pub counter: u32,
    pub increment: u32,
}

impl VolumeEnvelope {
    fn trigger(&mut self, nrx2: u8, timing: &Timing) {
        self.step = nrx2 & 0x07;
        self.up = nrx2 & 0x08 != 0;
        self.increment = timing.envelope_increment(self.step);
        self.counter = 0;
    }

    pub fn tick(&mut self, volume: &mut u8, inc_ref: u32) {
        self.counter += self.increment;

        while self.counter > inc_ref {
            if self.step != 0 {
                let next = if self.up {
                    (*volume + 1).min(MAX_CHAN_VOLUME)
                } else {
                    volume.saturating_sub(1)
                };
                if next == 0 || next == MAX_CHAN_VOLUME {
                    self.increment = 0;
                }
                *volume = next;
            }
            self.counter -= inc_ref;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrequencySweep {
    pub shadow_frequency: u16,
    /// 0 leaves the sweep inert.
    pub period: u8,
    pub up: bool,
    pub shift: u8,
    pub counter: u32,
    pub increment: u32,
}

impl FrequencySweep {
    fn trigger(&mut self, nr10: u8, frequency: u16, timing: &Timing) {
        self.shadow_frequency = frequency;
        self.period = (nr10 >> 4) & 0x07;
        self.up = nr10 & 0x08 == 0;
        self.shift = nr10 & 0x07;
        self.increment = timing.sweep_increment(self.period);
        // First tick lands on the first generated step.
        self.counter = timing.inc_ref;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Duty {
    /// Bit n set = high level on duty step n.
    pub pattern: u8,
    pub step: u8,
}

#[derive(Debug, Clone)]
pub enum ChannelKind {
    Square1 { duty: Duty, sweep: FrequencySweep },
    Square2 { duty: Duty },
    Wave { sample_position: u8 },
    Noise {
        lfsr: Lfsr,
        width: LfsrWidth,
        divisor_code: u8,
    },
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub(super) enabled: bool,
    pub(super) powered: bool,
    pub(super) on_left: bool,
    pub(super) on_right: bool,
    pub(super) muted: bool,

    pub(super) volume: u8,
    pub(super) volume_init: u8,

    /// 11-bit period code; the noise channel keeps its shift code here.
    pub(super) frequency: u16,
    pub(super) frequency_counter: u32,
    pub(super) frequency_increment: u32,

    /// Last output level, held between steps.
    pub(super) level: i32,

    pub(super) length: LengthCounter,
    pub(super) envelope: VolumeEnvelope,
    pub(super) kind: ChannelKind,
}

impl Channel {
    pub fn new(id: ChannelId) -> Self {
        let (kind, level) = match id {
            ChannelId::Square1 => (
                ChannelKind::Square1 {
                    duty: Duty::default(),
                    sweep: FrequencySweep::default(),
                },
                -1,
            ),
            ChannelId::Square2 => (
                ChannelKind::Square2 {
                    duty: Duty::default(),
                },
                -1,
            ),
            ChannelId::Wave => (ChannelKind::Wave { sample_position: 0 }, 0),
            ChannelId::Noise => (
                ChannelKind::Noise {
                    lfsr: Lfsr::new(),
                    width: LfsrWidth::Wide,
                    divisor_code: 0,
                },
                0,
            ),
        };

        Channel {
            enabled: false,
            powered: false,
            on_left: false,
            on_right: false,
            muted: false,
            volume: 0,
            volume_init: 0,
            frequency: 0,
            frequency_counter: 0,
            frequency_increment: 0,
            level,
            length: LengthCounter::default(),
            envelope: VolumeEnvelope::default(),
            kind,
        }
    }

    pub fn id(&self) -> ChannelId {
        match self.kind {
            ChannelKind::Square1 { .. } => ChannelId::Square1,
            ChannelKind::Square2 { .. } => ChannelId::Square2,
            ChannelKind::Wave { .. } => ChannelId::Wave,
            ChannelKind::Noise { .. } => ChannelId::Noise,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn frequency(&self) -> u16 {
        self.frequency
    }

    pub fn panning(&self) -> (bool, bool) {
        (self.on_left, self.on_right)
    }

    pub fn length(&self) -> &LengthCounter {
        &self.length
    }

    pub fn envelope(&self) -> &VolumeEnvelope {
        &self.envelope
    }

    pub fn sweep(&self) -> Option<&FrequencySweep> {
        match &self.kind {
            ChannelKind::Square1 { sweep, .. } => Some(sweep),
            _ => None,
        }
    }

    pub fn duty(&self) -> Option<Duty> {
        match self.kind {
            ChannelKind::Square1 { duty, .. } | ChannelKind::Square2 { duty } => Some(duty),
            _ => None,
        }
    }

    pub(super) fn duty_mut(&mut self) -> Option<&mut Duty> {
        match &mut self.kind {
            ChannelKind::Square1 { duty, .. } | ChannelKind::Square2 { duty } => Some(duty),
            _ => None,
        }
    }

    /// (Re)starts the channel. The caller refreshes the NR52 status bits.
    pub(super) fn trigger(&mut self, regs: &RegisterFile, timing: &Timing) {
        let id = self.id();
        self.enabled = true;
        self.volume = self.volume_init;
        self.envelope
            .trigger(regs.get(id.envelope_register()), timing);

        match &mut self.kind {
            ChannelKind::Square1 { sweep, .. } => {
                sweep.trigger(regs.get(NR10), self.frequency, timing);
            }
            ChannelKind::Square2 { .. } => {}
            ChannelKind::Wave { sample_position } => *sample_position = 0,
            ChannelKind::Noise { lfsr, .. } => {
                *lfsr = Lfsr::new();
                self.level = LEVEL_LOW;
            }
        }

        self.length.trigger(id.max_length(), timing);
        log::trace!(
            "{:?} triggered: freq={} vol={} env_step={} len_load={}",
            id,
            self.frequency,
            self.volume,
            self.envelope.step,
            self.length.load
        );
    }

    /// NRx2 write. A running channel gets the "zombie mode" volume change
    /// instead of a clean reload.
    pub(super) fn write_envelope(&mut self, value: u8) {
        self.volume_init = value >> 4;
        self.powered = (value >> 3) != 0;

        if self.powered && self.enabled {
            if self.envelope.step == 0 && self.envelope.increment != 0 {
                if value & 0x08 != 0 {
                    self.volume += 1;
                } else {
                    self.volume += 2;
                }
            } else {
                self.volume = 16 - self.volume;
            }

            self.volume &= 0x0F;
            self.envelope.step = value & 0x07;
        }
    }

    /// Slot index at which this channel stops within a block of `len` slots.
    pub(super) fn update_length(&mut self, len: usize, timing: &Timing) -> usize {
        if !self.enabled {
            return 0;
        }
        if !self.length.enabled || self.length.increment == 0 {
            return len;
        }

        let steps = len.div_ceil(timing.replication);
        match self.length.advance(steps, timing.inc_ref) {
            None => len,
            Some(played) => {
                self.enabled = false;
                log::debug!("{:?} length expired", self.id());
                (played * timing.replication).min(len)
            }
        }
    }

    pub(super) fn update_envelope(&mut self, timing: &Timing) {
        self.envelope.tick(&mut self.volume, timing.inc_ref);
    }

    /// Square1 frequency sweep; no-op on the other channels.
    pub(super) fn update_sweep(&mut self, timing: &Timing) {
        let ChannelKind::Square1 { sweep, .. } = &mut self.kind else {
            return;
        };
        sweep.counter += sweep.increment;

        while sweep.counter > timing.inc_ref {
            if sweep.shift != 0 {
                let delta = sweep.shadow_frequency >> sweep.shift;
                let candidate = if sweep.up {
                    self.frequency.wrapping_add(delta)
                } else {
                    self.frequency.wrapping_sub(delta)
                };

                // Out-of-range results stop the channel and are not stored.
                if candidate > 2047 {
                    if self.enabled {
                        log::debug!("Square1 sweep overflow, freq={}", candidate);
                    }
                    self.enabled = false;
                } else {
                    self.frequency = candidate;
                    self.frequency_increment =
                        timing.note_increment(square_frequency(self.frequency)) * 8;
                }
            } else if sweep.period != 0 {
                // Nonzero period with zero shift stops the channel.
                self.enabled = false;
            }
            sweep.counter -= timing.inc_ref;
        }
    }

    /// Moves the phase accumulator by one step's worth of `frequency_increment`
    /// (minus the part already consumed, `pos`). Returns true on each period
    /// crossing, leaving in `pos` how far into the step it happened.
    pub(super) fn advance_phase(&mut self, pos: &mut u32, inc_ref: u32) -> bool {
        let inc = self.frequency_increment - *pos;
        self.frequency_counter += inc;

        if self.frequency_counter > inc_ref {
            *pos = self.frequency_increment - (self.frequency_counter - inc_ref);
            self.frequency_counter = 0;
            true
        } else {
            *pos = self.frequency_increment;
            false
        }
    }
}

/// Tone frequency in Hz of a square channel period code.
pub(super) fn square_frequency(frequency: u16) -> u32 {
    DMG_CLOCK_FREQ / ((2048 - (frequency as u32 & 0x7FF)) << 5)
}

/// Sample-advance frequency in Hz of a wave channel period code.
pub(super) fn wave_frequency(frequency: u16) -> u32 {
    (DMG_CLOCK_FREQ / 64) / (2048 - (frequency as u32 & 0x7FF))
}

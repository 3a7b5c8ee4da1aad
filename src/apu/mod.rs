// APU (Audio Processing Unit) - Game Boy 音訊處理器
//
// 寄存器視窗 0xFF10 ~ 0xFF3F，四個聲道：
//   方波 1 (含掃頻)、方波 2、波形、噪音

pub mod channel;
pub mod registers;
mod synth;
pub mod tables;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::ApuConfig;
use crate::error::Result;

pub use channel::{Channel, ChannelId, LfsrWidth};
pub use registers::{REGISTER_FILE_SIZE, is_apu_address};
pub use synth::NOISE_MIN_INCREMENT;

use registers::*;
use synth::Mix;
use tables::{DUTY_LOOKUP, REGISTER_DEFAULTS, Timing, WAVE_DEFAULTS};

/// Shared "audio locked" switch. The scene layer keeps a clone and sets it
/// while generation must not run; [`Apu::generate`] then produces nothing.
#[derive(Debug, Clone, Default)]
pub struct LockHandle(Arc<AtomicBool>);

impl LockHandle {
    pub fn lock(&self) {
        self.set_locked(true);
    }

    pub fn unlock(&self) {
        self.set_locked(false);
    }

    pub fn set_locked(&self, locked: bool) {
        self.0.store(locked, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct Apu {
    regs: RegisterFile,
    channels: [Channel; 4],
    timing: Timing,

    // NR50 主音量 (0-7)
    volume_left: i32,
    volume_right: i32,

    enabled: bool,
    locked: LockHandle,
}

impl Apu {
    /// APU with the default 44.1 kHz output and 2x replication.
    pub fn new() -> Self {
        Self::build(ApuConfig::default())
    }

    pub fn with_config(config: ApuConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ApuConfig) -> Self {
        let mut apu = Apu {
            regs: RegisterFile::new(),
            channels: ChannelId::ALL.map(Channel::new),
            timing: Timing::new(&config),
            volume_left: 0,
            volume_right: 0,
            enabled: config.start_enabled,
            locked: LockHandle::default(),
        };
        apu.reset();
        log::info!(
            "APU ready: {} Hz output, replication {}, {} samples per frame",
            config.output_sample_rate,
            apu.timing.replication,
            apu.timing.samples_per_frame()
        );
        apu
    }

    /// Back to power-on state: channels cleared, post-boot register values
    /// and wave RAM written through the normal write path.
    pub fn reset(&mut self) {
        self.regs = RegisterFile::new();
        self.channels = ChannelId::ALL.map(Channel::new);
        self.volume_left = 0;
        self.volume_right = 0;

        self.write(NR52, 0x80);
        for (offset, &value) in REGISTER_DEFAULTS.iter().enumerate() {
            self.write(APU_START + offset as u16, value);
        }
        for (offset, &value) in WAVE_DEFAULTS.iter().enumerate() {
            self.write(WAVE_RAM_START + offset as u16, value);
        }
        log::debug!("APU reset");
    }

    /// Bus read. Write-only and unused bits read as 1.
    pub fn read(&self, addr: u16) -> u8 {
        if !is_apu_address(addr) {
            return 0xFF;
        }
        self.regs.read(addr)
    }

    /// Bus write with all register side effects.
    pub fn write(&mut self, addr: u16, value: u8) {
        if !is_apu_address(addr) {
            log::warn!("Ignoring APU write outside 0xFF10-0xFF3F: 0x{:04X}", addr);
            return;
        }

        if addr == NR52 {
            self.write_power(value);
            return;
        }

        // 關機時忽略寫入
        if !self.regs.is_powered() {
            return;
        }

        self.regs.set(addr, value);

        match (addr, ChannelId::from_address(addr)) {
            (NR12 | NR22 | NR42, Some(id)) => self.channel_mut(id).write_envelope(value),
            (NR32, _) => {
                let wave = self.channel_mut(ChannelId::Wave);
                wave.volume_init = (value >> 5) & 0x03;
                wave.volume = wave.volume_init;
            }
            (NR11 | NR21 | NR41, Some(id)) => {
                let channel = self.channel_mut(id);
                channel.length.load = value & 0x3F;
                if let Some(duty) = channel.duty_mut() {
                    duty.pattern = DUTY_LOOKUP[(value >> 6) as usize];
                }
            }
            (NR31, _) => self.channel_mut(ChannelId::Wave).length.load = value,
            (NR13 | NR23 | NR33, Some(id)) => {
                let channel = self.channel_mut(id);
                channel.frequency = (channel.frequency & 0xFF00) | value as u16;
            }
            (NR30, _) => {
                let wave = self.channel_mut(ChannelId::Wave);
                wave.powered = value & 0x80 != 0;
                wave.enabled = wave.powered;
            }
            (NR14 | NR24 | NR34 | NR44, Some(id)) => self.write_control(id, value),
            (NR43, _) => {
                let noise = self.channel_mut(ChannelId::Noise);
                noise.frequency = (value >> 4) as u16;
                if let channel::ChannelKind::Noise {
                    width,
                    divisor_code,
                    ..
                } = &mut noise.kind
                {
                    *width = if value & 0x08 == 0 {
                        LfsrWidth::Wide
                    } else {
                        LfsrWidth::Narrow
                    };
                    *divisor_code = value & 0x07;
                }
            }
            (NR50, _) => {
                self.volume_left = ((value >> 4) & 0x07) as i32;
                self.volume_right = (value & 0x07) as i32;
            }
            (NR51, _) => {
                for (i, channel) in self.channels.iter_mut().enumerate() {
                    channel.on_left = (value >> (4 + i)) & 1 != 0;
                    channel.on_right = (value >> i) & 1 != 0;
                }
            }
            // NR10 is latched at trigger; wave RAM is stored as is.
            _ => {}
        }

        self.refresh_status();
    }

    fn write_power(&mut self, value: u8) {
        let was_powered = self.regs.is_powered();
        self.regs.set(NR52, value & 0x80);

        if value & 0x80 == 0 {
            self.regs.clear_channel_registers();
            for channel in self.channels.iter_mut() {
                channel.enabled = false;
            }
        }
        self.refresh_status();

        if was_powered != self.regs.is_powered() {
            log::debug!(
                "APU power {}",
                if self.regs.is_powered() { "on" } else { "off" }
            );
        }
    }

    /// NRx4: frequency high bits (not for noise), length enable, trigger.
    fn write_control(&mut self, id: ChannelId, value: u8) {
        let channel = &mut self.channels[id.index()];

        if id != ChannelId::Noise {
            channel.frequency = (channel.frequency & 0x00FF) | (((value & 0x07) as u16) << 8);
        }
        channel.length.enabled = value & 0x40 != 0;

        if value & 0x80 != 0 {
            channel.trigger(&self.regs, &self.timing);
        }
    }

    /// Mirrors the channels' enabled flags into NR52 bits 0-3.
    fn refresh_status(&mut self) {
        let status = self
            .channels
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, channel)| acc | ((channel.enabled as u8) << i));
        self.regs.set_status(status);
    }

    /// Fills `left`/`right` with mixed output (at most the shorter length).
    /// Returns false, leaving both buffers untouched, while disabled or locked.
    pub fn generate(&mut self, left: &mut [i16], right: &mut [i16]) -> bool {
        if !self.enabled || self.locked.is_locked() {
            return false;
        }

        let len = left.len().min(right.len());
        let chunk = self.timing.max_chunk;
        let mut start = 0;

        while start < len {
            let end = (start + chunk).min(len);
            let mut mix = Mix {
                left: &mut left[start..end],
                right: &mut right[start..end],
                volume_left: self.volume_left,
                volume_right: self.volume_right,
            };
            mix.left.fill(0);
            mix.right.fill(0);

            let [square1, square2, wave, noise] = &mut self.channels;
            synth::render_wave(wave, &self.regs, &self.timing, &mut mix);
            synth::render_square(square1, &self.timing, &mut mix);
            synth::render_square(square2, &self.timing, &mut mix);
            synth::render_noise(noise, &self.timing, &mut mix);

            mix.replicate(self.timing.replication);
            self.refresh_status();
            start = end;
        }

        true
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            log::debug!("APU generation {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn lock_handle(&self) -> LockHandle {
        self.locked.clone()
    }

    /// Raw register bytes (no read masks), e.g. for save-state snapshots.
    pub fn registers(&self) -> &[u8; REGISTER_FILE_SIZE] {
        self.regs.as_bytes()
    }

    pub fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id.index()]
    }

    pub fn set_channel_muted(&mut self, id: ChannelId, muted: bool) {
        self.channel_mut(id).muted = muted;
    }

    pub fn master_volume(&self) -> (u8, u8) {
        (self.volume_left as u8, self.volume_right as u8)
    }

    /// Output slots per emulated video frame at the configured rate.
    pub fn samples_per_frame(&self) -> usize {
        self.timing.samples_per_frame()
    }

    fn channel_mut(&mut self, id: ChannelId) -> &mut Channel {
        &mut self.channels[id.index()]
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApuConfig;
    use crate::error::{ConfigError, Error};

    /// Powered APU with every channel idle and registers cleared.
    fn quiet_apu() -> Apu {
        let mut apu = Apu::new();
        apu.write(NR52, 0x00);
        apu.write(NR52, 0x80);
        apu
    }

    fn render(apu: &mut Apu, slots: usize) -> (Vec<i16>, Vec<i16>) {
        let mut left = vec![0i16; slots];
        let mut right = vec![0i16; slots];
        assert!(apu.generate(&mut left, &mut right));
        (left, right)
    }

    #[test]
    fn test_power_on_defaults() {
        let apu = Apu::new();
        assert_eq!(apu.read(NR52), 0xF0);
        assert_eq!(apu.read(NR50), 0x77);
        assert_eq!(apu.read(NR51), 0xF3);
        assert_eq!(apu.read(NR12), 0xF3);
        assert_eq!(apu.read(NR11), 0xBF);
        assert_eq!(apu.read(NR30), 0x7F);
        assert_eq!(apu.registers()[0x20], 0xAC);
        assert_eq!(apu.master_volume(), (7, 7));
        assert!(apu.is_enabled());
        for id in ChannelId::ALL {
            assert!(!apu.channel(id).is_enabled());
        }
        assert_eq!(apu.channel(ChannelId::Square1).volume(), 0);
    }

    #[test]
    fn test_with_config_validates() {
        let config = ApuConfig {
            replication: 0,
            ..ApuConfig::default()
        };
        assert!(matches!(
            Apu::with_config(config),
            Err(Error::Config(ConfigError::ZeroReplication))
        ));

        let config = ApuConfig {
            start_enabled: false,
            ..ApuConfig::default()
        };
        let apu = Apu::with_config(config).unwrap();
        assert!(!apu.is_enabled());
    }

    #[test]
    fn test_power_off_clears_and_blocks_writes() {
        let mut apu = Apu::new();
        apu.write(NR12, 0xF0);
        apu.write(NR14, 0x80);
        assert!(apu.channel(ChannelId::Square1).is_enabled());
        apu.write(WAVE_RAM_START, 0x5A);

        apu.write(NR52, 0x00);
        for (offset, &mask) in tables::READ_MASKS[..0x16].iter().enumerate() {
            assert_eq!(apu.read(APU_START + offset as u16), mask);
        }
        assert_eq!(apu.read(NR52), 0x70);
        for id in ChannelId::ALL {
            assert!(!apu.channel(id).is_enabled());
        }
        assert_eq!(apu.read(WAVE_RAM_START), 0x5A);

        apu.write(NR50, 0x77);
        apu.write(NR12, 0xF0);
        apu.write(WAVE_RAM_START, 0x00);
        assert_eq!(apu.read(NR50), 0x00);
        assert_eq!(apu.read(NR12), 0x00);
        assert_eq!(apu.read(WAVE_RAM_START), 0x5A);

        apu.write(NR52, 0x80);
        apu.write(NR50, 0x35);
        assert_eq!(apu.read(NR50), 0x35);
        assert_eq!(apu.master_volume(), (3, 5));
    }

    #[test]
    fn test_nr52_status_mirrors_channels() {
        let mut apu = quiet_apu();
        assert_eq!(apu.read(NR52), 0xF0);

        apu.write(NR22, 0xF0);
        apu.write(NR24, 0x80);
        assert_eq!(apu.read(NR52), 0xF2);

        apu.write(NR42, 0xF0);
        apu.write(NR44, 0x80);
        assert_eq!(apu.read(NR52), 0xFA);

        // Writing NR52 cannot set the status bits.
        apu.write(NR52, 0x8F);
        assert_eq!(apu.read(NR52), 0xFA);
    }

    #[test]
    fn test_sweep_zero_shift_disables_on_first_step() {
        let mut apu = quiet_apu();
        apu.write(NR10, 0x10);
        apu.write(NR12, 0xF0);
        apu.write(NR13, 0x00);
        apu.write(NR14, 0x84);
        assert!(apu.channel(ChannelId::Square1).is_enabled());

        render(&mut apu, 2);
        assert!(!apu.channel(ChannelId::Square1).is_enabled());
        assert_eq!(apu.read(NR52) & 0x01, 0);
    }

    #[test]
    fn test_sweep_overflow_disables() {
        let mut apu = quiet_apu();
        // period 1, up, shift 4; frequency 1900
        apu.write(NR10, 0x14);
        apu.write(NR12, 0xF0);
        apu.write(NR13, (1900 & 0xFF) as u8);
        apu.write(NR14, 0x80 | (1900 >> 8) as u8);

        render(&mut apu, 2);
        let square1 = apu.channel(ChannelId::Square1);
        assert!(square1.is_enabled());
        assert_eq!(square1.frequency(), 2018);

        // Next sweep tick (1/128 s later) would reach 2136.
        render(&mut apu, 400);
        let square1 = apu.channel(ChannelId::Square1);
        assert!(!square1.is_enabled());
        // The overflowing sum is never stored.
        assert_eq!(square1.frequency(), 2018);
        assert!(square1.frequency() <= 2047);
        assert_eq!(apu.read(NR52) & 0x01, 0);
    }

    #[test]
    fn test_retrigger_after_sweep_overflow() {
        let mut apu = quiet_apu();
        apu.write(NR10, 0x14);
        apu.write(NR12, 0xF0);
        apu.write(NR13, (1900 & 0xFF) as u8);
        apu.write(NR14, 0x80 | (1900 >> 8) as u8);
        render(&mut apu, 800);
        assert!(!apu.channel(ChannelId::Square1).is_enabled());

        // Sweep off, retrigger at a fresh frequency.
        apu.write(NR10, 0x00);
        apu.write(NR13, 0x00);
        apu.write(NR14, 0x84);
        let square1 = apu.channel(ChannelId::Square1);
        assert!(square1.is_enabled());
        assert_eq!(square1.frequency(), 1024);
        assert_eq!(apu.read(NR52) & 0x01, 0x01);

        render(&mut apu, 2048);
        assert!(apu.channel(ChannelId::Square1).is_enabled());
        assert_eq!(apu.channel(ChannelId::Square1).frequency(), 1024);
    }

    #[test]
    fn test_sweep_kill_silences_rest_of_block() {
        let mut apu = quiet_apu();
        apu.write(NR50, 0x77);
        apu.write(NR51, 0x11);
        apu.write(NR10, 0x10); // period 1, shift 0
        apu.write(NR12, 0xF0);
        apu.write(NR14, 0x86);

        let (left, right) = render(&mut apu, 256);
        assert!(!apu.channel(ChannelId::Square1).is_enabled());
        assert!(left.iter().all(|&s| s == 0));
        assert!(right.iter().all(|&s| s == 0));
    }

    /// Share of true samples above zero for a lone Square1 tone.
    fn high_ratio(nr11: u8) -> f64 {
        let mut apu = quiet_apu();
        apu.write(NR50, 0x77);
        apu.write(NR51, 0x11);
        apu.write(NR11, nr11);
        apu.write(NR12, 0xF0);
        // 2000: 2730 Hz, at most one duty step per generated sample
        apu.write(NR13, (2000 & 0xFF) as u8);
        apu.write(NR14, 0x80 | (2000 >> 8) as u8);

        let (left, _) = render(&mut apu, 44100);
        let samples: Vec<i16> = left.iter().step_by(2).copied().collect();
        let high = samples.iter().filter(|&&s| s > 0).count();
        high as f64 / samples.len() as f64
    }

    #[test]
    fn test_duty_codes_set_high_share() {
        for (code, expected) in [(0u8, 0.125), (1, 0.25), (2, 0.5), (3, 0.75)] {
            let ratio = high_ratio(code << 6);
            assert!(
                (ratio - expected).abs() < 0.02,
                "duty code {}: high share {:.3}, expected {}",
                code,
                ratio,
                expected
            );
        }
    }

    #[test]
    fn test_duty_code_latched_from_nrx1() {
        let mut apu = quiet_apu();
        for (code, pattern) in [0x10u8, 0x30, 0x3C, 0xCF].into_iter().enumerate() {
            apu.write(NR11, (code as u8) << 6 | 0x05);
            apu.write(NR21, (code as u8) << 6);
            assert_eq!(apu.channel(ChannelId::Square1).duty().map(|d| d.pattern), Some(pattern));
            assert_eq!(apu.channel(ChannelId::Square2).duty().map(|d| d.pattern), Some(pattern));
            assert_eq!(apu.channel(ChannelId::Square1).length().load, 0x05);
        }
    }

    #[test]
    fn test_frozen_envelope_keeps_volume() {
        let mut apu = quiet_apu();
        apu.write(NR50, 0x77);
        apu.write(NR51, 0x11);
        apu.write(NR12, 0xF0);
        apu.write(NR14, 0x80);
        assert_eq!(apu.channel(ChannelId::Square1).volume(), 15);

        for _ in 0..50 {
            render(&mut apu, 1024);
            assert_eq!(apu.channel(ChannelId::Square1).volume(), 15);
        }
    }

    #[test]
    fn test_envelope_decays_to_silence() {
        let mut apu = quiet_apu();
        apu.write(NR50, 0x77);
        apu.write(NR51, 0x22);
        apu.write(NR22, 0x31); // volume 3, down, step 1
        apu.write(NR24, 0x80);

        // Three steps of 1/64 s.
        render(&mut apu, 44100 / 64 * 3 + 64);
        assert_eq!(apu.channel(ChannelId::Square2).volume(), 0);
        assert!(apu.channel(ChannelId::Square2).is_enabled());

        let (left, right) = render(&mut apu, 64);
        assert!(left.iter().all(|&s| s == 0));
        assert!(right.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_generate_disabled_leaves_buffers() {
        let mut apu = Apu::new();
        apu.set_enabled(false);
        let mut left = [123i16; 16];
        let mut right = [-7i16; 16];
        assert!(!apu.generate(&mut left, &mut right));
        assert_eq!(left, [123; 16]);
        assert_eq!(right, [-7; 16]);

        apu.set_enabled(true);
        assert!(apu.generate(&mut left, &mut right));
        assert_eq!(left, [0; 16]);
    }

    #[test]
    fn test_locked_generate_produces_nothing() {
        let mut apu = Apu::new();
        let lock = apu.lock_handle();
        lock.lock();
        let mut left = [9i16; 4];
        let mut right = [9i16; 4];
        assert!(!apu.generate(&mut left, &mut right));
        assert_eq!(left, [9; 4]);

        lock.unlock();
        assert!(apu.generate(&mut left, &mut right));
    }

    #[test]
    fn test_lock_is_per_instance() {
        let first = Apu::new();
        let second = Apu::new();
        first.lock_handle().lock();
        assert!(first.lock_handle().is_locked());
        assert!(!second.lock_handle().is_locked());
    }

    /// 16 bytes = 32 nibbles 0,1,..,15,15,14,..,0
    fn ramp_pattern() -> [u8; 16] {
        let mut pattern = [0u8; 16];
        for (i, byte) in pattern.iter_mut().enumerate() {
            let hi = if i < 8 { 2 * i } else { 31 - 2 * i };
            let lo = if i < 8 { 2 * i + 1 } else { 30 - 2 * i };
            *byte = ((hi as u8) << 4) | lo as u8;
        }
        pattern
    }

    fn pattern_nibble(pattern: &[u8; 16], position: usize) -> i32 {
        let byte = pattern[position / 2];
        let nibble = if position % 2 == 0 { byte >> 4 } else { byte & 0x0F };
        nibble as i32
    }

    #[test]
    fn test_wave_reproduces_ram_in_order() {
        let mut apu = quiet_apu();
        let pattern = ramp_pattern();
        for (i, &byte) in pattern.iter().enumerate() {
            apu.write(WAVE_RAM_START + i as u16, byte);
        }
        apu.write(NR50, 0x10); // left 1, right 0
        apu.write(NR51, 0x44); // wave on both sides
        apu.write(NR30, 0x80);
        apu.write(NR32, 0x20); // volume code 1
        // 1954: 697 Hz * 32 = 22304 per step, one wave step per generated sample
        apu.write(NR33, 0xA2);
        apu.write(NR34, 0x87);

        let (left, right) = render(&mut apu, 64);
        for step in 0..32 {
            // The first crossing happens on the first step.
            let nibble = pattern_nibble(&pattern, (step + 1) % 32);
            let expected = ((nibble - 8) * 511 / 4) as i16;
            assert_eq!(left[step * 2], expected, "step {}", step);
            assert_eq!(left[step * 2 + 1], expected);
            assert_eq!(right[step * 2], 0);
        }
    }

    #[test]
    fn test_wave_dac_off_stops_channel() {
        let mut apu = quiet_apu();
        apu.write(NR30, 0x80);
        apu.write(NR34, 0x80);
        assert!(apu.channel(ChannelId::Wave).is_enabled());
        apu.write(NR30, 0x00);
        assert!(!apu.channel(ChannelId::Wave).is_enabled());
        assert_eq!(apu.read(NR52) & 0x04, 0);
    }

    #[test]
    fn test_length_expiry_stops_channel() {
        let mut apu = quiet_apu();
        apu.write(NR50, 0x77);
        apu.write(NR51, 0x22);
        apu.write(NR21, 0x3F); // load 63: 1/256 s left
        apu.write(NR22, 0xF0);
        apu.write(NR24, 0xC0);
        assert!(apu.channel(ChannelId::Square2).is_enabled());

        render(&mut apu, 128);
        assert!(apu.channel(ChannelId::Square2).is_enabled());
        let (left, _) = render(&mut apu, 256);
        assert!(!apu.channel(ChannelId::Square2).is_enabled());
        assert_eq!(apu.read(NR52) & 0x02, 0);
        assert!(left[250..].iter().all(|&s| s == 0));
    }

    #[test]
    fn test_length_disabled_keeps_playing() {
        let mut apu = quiet_apu();
        apu.write(NR21, 0x3F);
        apu.write(NR22, 0xF0);
        apu.write(NR24, 0x80);
        render(&mut apu, 4096);
        assert!(apu.channel(ChannelId::Square2).is_enabled());
    }

    #[test]
    fn test_zombie_mode_through_bus() {
        let mut apu = quiet_apu();
        apu.write(NR22, 0xF0);
        apu.write(NR24, 0x80);
        apu.write(NR22, 0x08);
        assert_eq!(apu.channel(ChannelId::Square2).volume(), 0);
        apu.write(NR22, 0x10);
        assert_eq!(apu.channel(ChannelId::Square2).volume(), 2);
    }

    #[test]
    fn test_replication_copies_each_sample() {
        let config = ApuConfig {
            replication: 3,
            ..ApuConfig::default()
        };
        let mut apu = Apu::with_config(config).unwrap();
        apu.write(NR51, 0x11);
        apu.write(NR12, 0xF0);
        apu.write(NR14, 0x86);

        let (left, right) = render(&mut apu, 600);
        for group in left.chunks(3) {
            assert!(group.iter().all(|&s| s == group[0]));
        }
        assert_eq!(left, right);
        assert!(left.iter().any(|&s| s != 0));
    }

    #[test]
    fn test_muted_channel_is_silent() {
        let mut apu = quiet_apu();
        apu.write(NR50, 0x77);
        apu.write(NR51, 0x11);
        apu.write(NR12, 0xF0);
        apu.write(NR14, 0x86);
        apu.set_channel_muted(ChannelId::Square1, true);
        assert!(apu.channel(ChannelId::Square1).is_muted());

        let (left, _) = render(&mut apu, 512);
        assert!(left.iter().all(|&s| s == 0));
        assert!(apu.channel(ChannelId::Square1).is_enabled());

        apu.set_channel_muted(ChannelId::Square1, false);
        let (left, _) = render(&mut apu, 512);
        assert!(left.iter().any(|&s| s != 0));
    }

    #[test]
    fn test_noise_control_fields() {
        let mut apu = quiet_apu();
        apu.write(NR43, 0x5B);
        let noise = apu.channel(ChannelId::Noise);
        assert_eq!(noise.frequency(), 5);
        match &noise.kind {
            channel::ChannelKind::Noise {
                width,
                divisor_code,
                ..
            } => {
                assert_eq!(*width, LfsrWidth::Narrow);
                assert_eq!(*divisor_code, 3);
            }
            _ => panic!("expected noise channel"),
        }

        // NR44 never touches the shift code.
        apu.write(NR44, 0x07);
        assert_eq!(apu.channel(ChannelId::Noise).frequency(), 5);
    }

    #[test]
    fn test_panning_and_out_of_window() {
        let mut apu = quiet_apu();
        apu.write(NR51, 0x81);
        assert_eq!(apu.channel(ChannelId::Square1).panning(), (false, true));
        assert_eq!(apu.channel(ChannelId::Noise).panning(), (true, false));

        apu.write(0xFF40, 0x12);
        assert_eq!(apu.read(0xFF40), 0xFF);
        assert_eq!(apu.read(0xFF27), 0xFF);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut apu = Apu::new();
        apu.write(NR50, 0x00);
        apu.write(WAVE_RAM_START, 0x00);
        apu.write(NR24, 0x80);
        apu.reset();
        assert_eq!(apu.read(NR50), 0x77);
        assert_eq!(apu.read(WAVE_RAM_START), 0xAC);
        assert!(!apu.channel(ChannelId::Square2).is_enabled());
    }
}

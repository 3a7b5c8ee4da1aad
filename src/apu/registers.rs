// 音訊寄存器 - 0xFF10 ~ 0xFF3F

use super::tables::READ_MASKS;

pub const APU_START: u16 = 0xFF10;
pub const APU_END: u16 = 0xFF3F;
pub const REGISTER_FILE_SIZE: usize = (APU_END - APU_START + 1) as usize;

pub const NR10: u16 = 0xFF10;
pub const NR11: u16 = 0xFF11;
pub const NR12: u16 = 0xFF12;
pub const NR13: u16 = 0xFF13;
pub const NR14: u16 = 0xFF14;
pub const NR21: u16 = 0xFF16;
pub const NR22: u16 = 0xFF17;
pub const NR23: u16 = 0xFF18;
pub const NR24: u16 = 0xFF19;
pub const NR30: u16 = 0xFF1A;
pub const NR31: u16 = 0xFF1B;
pub const NR32: u16 = 0xFF1C;
pub const NR33: u16 = 0xFF1D;
pub const NR34: u16 = 0xFF1E;
pub const NR41: u16 = 0xFF20;
pub const NR42: u16 = 0xFF21;
pub const NR43: u16 = 0xFF22;
pub const NR44: u16 = 0xFF23;
pub const NR50: u16 = 0xFF24;
pub const NR51: u16 = 0xFF25;
pub const NR52: u16 = 0xFF26;
pub const WAVE_RAM_START: u16 = 0xFF30;

/// True for addresses the bus should route to the APU.
pub fn is_apu_address(addr: u16) -> bool {
    (APU_START..=APU_END).contains(&addr)
}

/// Raw bytes behind the APU window. Only the APU writes here; callers get a
/// read-only view through [`super::Apu::registers`].
#[derive(Debug, Clone)]
pub struct RegisterFile {
    bytes: [u8; REGISTER_FILE_SIZE],
}

impl RegisterFile {
    pub fn new() -> Self {
        RegisterFile {
            bytes: [0; REGISTER_FILE_SIZE],
        }
    }

    fn index(addr: u16) -> usize {
        (addr - APU_START) as usize
    }

    pub fn get(&self, addr: u16) -> u8 {
        self.bytes[Self::index(addr)]
    }

    pub fn set(&mut self, addr: u16, value: u8) {
        self.bytes[Self::index(addr)] = value;
    }

    /// Stored byte with the write-only and unused bits forced to 1.
    pub fn read(&self, addr: u16) -> u8 {
        let index = Self::index(addr);
        self.bytes[index] | READ_MASKS[index]
    }

    pub fn is_powered(&self) -> bool {
        self.get(NR52) & 0x80 != 0
    }

    /// Zeroes NR10..=NR51. NR52 and wave RAM are left alone.
    pub fn clear_channel_registers(&mut self) {
        let end = Self::index(NR52);
        self.bytes[..end].fill(0);
    }

    /// Replaces the NR52 status nibble, keeping the power bit.
    pub fn set_status(&mut self, status: u8) {
        let power = self.get(NR52) & 0x80;
        self.set(NR52, power | (status & 0x0F));
    }

    /// 4-bit wave sample `position` (0..32): high nibble first.
    pub fn wave_nibble(&self, position: u8) -> u8 {
        let byte = self.get(WAVE_RAM_START + (position as u16 & 31) / 2);
        if position & 1 == 0 { byte >> 4 } else { byte & 0x0F }
    }

    pub fn as_bytes(&self) -> &[u8; REGISTER_FILE_SIZE] {
        &self.bytes
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

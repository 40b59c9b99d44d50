use strum::Display;

use crate::bus::BusWidth;

pub mod programmer;
pub mod size_table;

pub use programmer::{FlashProgrammer, NullProgress, Progress};
pub use size_table::flash_size;

/// JEDEC manufacturer codes the size table knows about.
pub mod manufacturer {
    pub const SPANSION: u8 = 0x01;
    pub const SST: u8 = 0xBF;
    pub const MACRONIX: u8 = 0xC2;
}

/// Command values, placed on `DQ7..DQ0`.
pub mod command {
    pub const UNLOCK_1: u8 = 0xAA;
    pub const UNLOCK_2: u8 = 0x55;
    pub const ID_ENTRY: u8 = 0x90;
    pub const ID_EXIT: u8 = 0xF0;
    pub const ERASE_SETUP: u8 = 0x80;
    pub const CHIP_ERASE: u8 = 0x10;
    pub const SECTOR_ERASE: u8 = 0x30;
    pub const PROGRAM: u8 = 0xA0;
    pub const WRITE_BUFFER: u8 = 0x25;
    pub const BUFFER_CONFIRM: u8 = 0x29;
}

/// Identification read back from the chip's software ID mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlashDeviceId {
    pub manufacturer: u8,
    pub device: u8,
    /// Extended device code of Spansion-style parts; 0 elsewhere.
    pub kind: u8,
    /// Capacity in bytes, 0 when the part is unknown.
    pub size: u32,
}

impl FlashDeviceId {
    pub fn is_known(&self) -> bool {
        self.size != 0
    }

    /// Parts that accept write-buffer programming.
    pub fn supports_buffer(&self) -> bool {
        self.manufacturer == manufacturer::SPANSION
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CommandFamily {
    /// `$AAA`/`$555` unlock (AMD/Macronix/Spansion style).
    Macronix,
    /// `$5555`/`$2AAA` unlock (SST 5V parts).
    Sst,
}

/// A command family bound to the width the chip is wired at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandSet {
    pub family: CommandFamily,
    pub width: BusWidth,
}

impl CommandSet {
    pub const fn new(family: CommandFamily, width: BusWidth) -> Self {
        Self { family, width }
    }

    /// `(unlock1, unlock2)` bus addresses. Word-wide parts are addressed by
    /// word, so the byte address is the word address shifted left once.
    pub const fn unlock_addresses(&self) -> (u32, u32) {
        match (self.family, self.width) {
            (CommandFamily::Macronix, BusWidth::Eight) => (0x0AAA, 0x0555),
            (CommandFamily::Macronix, BusWidth::Sixteen) => (0x0555 << 1, 0x02AA << 1),
            (CommandFamily::Sst, BusWidth::Eight) => (0x5555, 0x2AAA),
            (CommandFamily::Sst, BusWidth::Sixteen) => (0x5555 << 1, 0x2AAA << 1),
        }
    }

    /// DQ6 as it appears in a byte or word read.
    pub const fn status_mask(&self) -> u16 {
        match self.width {
            BusWidth::Eight => 0x40,
            BusWidth::Sixteen => 0x4000,
        }
    }

    /// Bus value carrying `value` on `DQ7..DQ0`.
    pub const fn encode(&self, value: u8) -> u16 {
        match self.width {
            BusWidth::Eight => value as u16,
            BusWidth::Sixteen => (value as u16) << 8,
        }
    }
}

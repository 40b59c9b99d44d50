//! ROM header conveniences: size codes and stored checksums.

use std::ops::Range;

/// Low nibble of this byte holds the Master System ROM size code.
pub const SMS_SIZE_CODE_ADDRESS: u32 = 0x7FFF;
/// Little-endian checksum stored in the Master System header.
pub const SMS_CHECKSUM_ADDRESS: u32 = 0x7FFA;

pub const GENESIS_CHECKSUM_ADDRESS: u32 = 0x18E;
/// Big-endian ROM end address, high word then low word.
pub const GENESIS_ROM_END_ADDRESS: u32 = 0x1A4;
/// First byte covered by the Genesis checksum.
pub const GENESIS_CHECKSUM_START: u32 = 0x200;

/// Size of a Master System ROM and the header gap its checksum skips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomSize {
    pub size: u32,
    /// Bytes strictly after `start` and before `end` are left out of the
    /// checksum.
    pub checksum_skip: Range<u32>,
}

const DEFAULT_SIZE_CODE: u8 = 0x0;

/// Resolves a Master System size code. Unlisted codes fall back to the
/// 256 KiB entry.
pub fn resolve(code: u8) -> RomSize {
    let (size, checksum_skip) = match code {
        0xA => (8_192, 0x1FEF..0x2000),
        0xB => (16_384, 0x3FEF..0x4000),
        0xC => (32_768, 0x7FEF..0x8000),
        0xD => (49_152, 0xBFEF..0xC000),
        0xE => (65_536, 0x7FEF..0x8000),
        0xF => (131_072, 0x7FEF..0x8000),
        0x0 => (262_144, 0x7FEF..0x8000),
        0x1 => (525_288, 0x7FEF..0x8000),
        0x2 => (1_048_576, 0x7FEF..0x8000),
        _ => return resolve(DEFAULT_SIZE_CODE),
    };
    RomSize {
        size,
        checksum_skip,
    }
}

/// Stored against computed checksum of a cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum {
    pub expected: u16,
    pub calculated: u16,
    pub rom_size: u32,
}

impl Checksum {
    pub fn is_valid(&self) -> bool {
        self.expected == self.calculated
    }
}

/// Size of a Master System ROM as declared by its header.
pub fn sms_rom_size(mut read_byte: impl FnMut(u32) -> u8) -> RomSize {
    resolve(read_byte(SMS_SIZE_CODE_ADDRESS) & 0x0F)
}

/// 16-bit byte sum of a Master System ROM, skipping the header gap.
pub fn sms_checksum(mut read_byte: impl FnMut(u32) -> u8) -> Checksum {
    let expected = u16::from_le_bytes([
        read_byte(SMS_CHECKSUM_ADDRESS),
        read_byte(SMS_CHECKSUM_ADDRESS + 1),
    ]);
    let RomSize {
        size,
        checksum_skip,
    } = sms_rom_size(&mut read_byte);

    let calculated = (0..=checksum_skip.start)
        .chain(checksum_skip.end..size)
        .fold(0u16, |sum, address| {
            sum.wrapping_add(u16::from(read_byte(address)))
        });

    Checksum {
        expected,
        calculated,
        rom_size: size,
    }
}

/// ROM size declared by a Genesis header: end address plus one.
pub fn genesis_rom_size(mut read_word: impl FnMut(u32) -> u16) -> u32 {
    let high = u32::from(read_word(GENESIS_ROM_END_ADDRESS));
    let low = u32::from(read_word(GENESIS_ROM_END_ADDRESS + 2));
    ((high << 16) | low).wrapping_add(1)
}

/// 16-bit word sum of a Genesis ROM from `$200` to the declared end.
pub fn genesis_checksum(mut read_word: impl FnMut(u32) -> u16) -> Checksum {
    let expected = read_word(GENESIS_CHECKSUM_ADDRESS);
    let rom_size = genesis_rom_size(&mut read_word);

    let calculated = (GENESIS_CHECKSUM_START..rom_size)
        .step_by(2)
        .fold(0u16, |sum, address| sum.wrapping_add(read_word(address)));

    Checksum {
        expected,
        calculated,
        rom_size,
    }
}

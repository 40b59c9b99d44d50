use crate::flash::manufacturer::{MACRONIX, SPANSION, SST};

const MIB: u32 = 0x10_0000;
const KIB: u32 = 0x400;

/// Capacity in bytes for a `(manufacturer, device, type)` triple, or 0 when
/// the part is not listed.
///
/// Spansion parts share one device code and are told apart by the extended
/// type byte; the other vendors are keyed by device code.
pub fn flash_size(manufacturer: u8, device: u8, kind: u8) -> u32 {
    match manufacturer {
        SPANSION => match kind {
            0x10 | 0x0C => 8 * MIB,
            0x1A | 0x1D => 4 * MIB,
            _ => 0,
        },
        SST => match device {
            0x6D | 0x6C => 8 * MIB,
            0x5D | 0x5C | 0x5B | 0x5A => 4 * MIB,
            0x4F | 0x4E | 0x4B | 0x4A => 2 * MIB,
            _ => 0,
        },
        MACRONIX => match device {
            0xC9 | 0xCB => 8 * MIB,
            0xA7 | 0xA8 => 4 * MIB,
            0xC4 | 0x49 => 4 * MIB,
            0x58 | 0xD6 => MIB,
            0x23 | 0xAB => 512 * KIB,
            0x51 | 0x57 => 512 * KIB,
            _ => 0,
        },
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_parts() {
        assert_eq!(flash_size(0xC2, 0x58, 0), 0x10_0000);
        assert_eq!(flash_size(0xC2, 0x23, 0), 0x8_0000);
        assert_eq!(flash_size(0xC2, 0xCB, 0), 0x80_0000);
        assert_eq!(flash_size(0xBF, 0x6D, 0), 0x80_0000);
        assert_eq!(flash_size(0xBF, 0x4A, 0), 0x20_0000);
        assert_eq!(flash_size(0x01, 0x7E, 0x10), 0x80_0000);
        assert_eq!(flash_size(0x01, 0x7E, 0x1D), 0x40_0000);
    }

    #[test]
    fn spansion_ignores_device_code() {
        assert_eq!(flash_size(0x01, 0x00, 0x1A), flash_size(0x01, 0xFF, 0x1A));
        assert_eq!(flash_size(0x01, 0x58, 0x00), 0);
    }

    #[test]
    fn unknown_parts_have_no_size() {
        assert_eq!(flash_size(0xFF, 0xFF, 0xFF), 0);
        assert_eq!(flash_size(0x00, 0x00, 0x00), 0);
        assert_eq!(flash_size(0xC2, 0x00, 0x10), 0);
        assert_eq!(flash_size(0xBF, 0xB5, 0x00), 0);
    }
}

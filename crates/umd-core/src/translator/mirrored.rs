use crate::{
    bus::Bus,
    translator::{Physical, Translator, TranslatorKind},
};

/// Bit-reversal lookup: entry `i` holds `i` with bit `n` moved to bit `7 - n`.
const REVERSED: [u8; 256] = build_reversal_table();

const fn build_reversal_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut value = 0;
    while value < 256 {
        let mut reversed = 0u8;
        let mut bit = 0;
        while bit < 8 {
            if value & (1 << bit) != 0 {
                reversed |= 1 << (7 - bit);
            }
            bit += 1;
        }
        table[value] = reversed;
        value += 1;
    }
    table
}

pub fn reverse_bits(value: u8) -> u8 {
    REVERSED[value as usize]
}

/// Flat 24-bit addressing on a card whose data pins are wired in reverse
/// order. Only payload bytes are corrected; flash command and status bytes
/// travel as-is.
#[derive(Debug, Clone, Default)]
pub struct MirroredBus;

impl Translator for MirroredBus {
    fn kind(&self) -> TranslatorKind {
        TranslatorKind::MirroredBus
    }

    fn translate(&mut self, _bus: &mut dyn Bus, address: u32) -> Physical {
        Physical::bits24(address)
    }

    fn payload_in(&self, value: u8) -> u8 {
        reverse_bits(value)
    }

    fn payload_out(&self, value: u8) -> u8 {
        reverse_bits(value)
    }
}

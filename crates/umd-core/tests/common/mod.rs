#![allow(dead_code)]

use umd_core::{
    Umd,
    flash::programmer::Progress,
    profile::ConsoleKind,
    sim::{FlashTiming, SimConfig, SimPort},
};

/// Busy times short enough to keep polling loops cheap.
pub const FAST_TIMING: FlashTiming = FlashTiming {
    program_ns: 2_000,
    sector_erase_ns: 400_000,
    chip_erase_ns: 2_000_000,
};

pub fn config(console: ConsoleKind) -> SimConfig {
    SimConfig::for_console(console).with_timing(FAST_TIMING)
}

/// Session over a simulated cartridge with `console` already selected.
pub fn session(console: ConsoleKind) -> Umd<SimPort> {
    session_with(config(console))
}

pub fn session_with(config: SimConfig) -> Umd<SimPort> {
    let console = config.console;
    let mut umd = Umd::new(SimPort::new(config));
    umd.select_profile(console);
    umd
}

/// Counts progress callbacks.
#[derive(Debug, Default)]
pub struct CountingProgress {
    pub ticks: usize,
    pub done: usize,
}

impl Progress for CountingProgress {
    fn tick(&mut self) {
        self.ticks += 1;
    }

    fn done(&mut self) {
        self.done += 1;
    }
}

/// Big-endian word of the image bytes at `address`.
pub fn image_word(image: &[u8], address: usize) -> u16 {
    u16::from_be_bytes([image[address], image[address + 1]])
}

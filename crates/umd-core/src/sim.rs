//! Software stand-in for the adapter and a flash cartridge.
//!
//! [`SimPort`] implements [`Port`]: it latches addresses on the ALE falling
//! edges, answers `/CE`+`/RD` reads and commits writes when a write strobe
//! is released, exactly as the cartridge would see the pins. Behind the pins
//! sits a console-specific wiring (mapper, chip selects or lane strobes) and
//! a [`FlashChip`].

use tracing::debug;

use crate::{
    bus::{BusWidth, Direction, Lanes, Level, Line, Port},
    flash::CommandFamily,
    profile::ConsoleKind,
    translator::windowed::{Control, WINDOW_SIZE},
};

pub mod flash;

pub use flash::{ChipId, FlashChip, FlashTiming};

/// Time one pin access takes (a single AVR instruction at 16 MHz).
const DEFAULT_ACCESS_NS: u64 = 62;

/// Genesis save RAM window.
const GENESIS_SRAM_START: u32 = 0x20_0000;
const GENESIS_SRAM_END: u32 = 0x40_0000;

const LINE_COUNT: usize = 14;

fn line_index(line: Line) -> usize {
    match line {
        Line::AleLow => 0,
        Line::AleHigh => 1,
        Line::ChipEnable => 2,
        Line::ReadEnable => 3,
        Line::WriteEnable => 4,
        Line::CartDetect => 5,
        Line::Ctrl(n) => 6 + usize::from(n & 0x07),
    }
}

/// What the simulated cartridge looks like.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub console: ConsoleKind,
    pub chip: ChipId,
    pub family: CommandFamily,
    pub capacity: usize,
    pub sector_size: u32,
    pub timing: FlashTiming,
    pub sram_size: usize,
    pub access_ns: u64,
    pub present: bool,
}

impl SimConfig {
    /// A typical reflashable cartridge for `console`.
    pub fn for_console(console: ConsoleKind) -> Self {
        let (chip, family, capacity, sector_size) = match console {
            ConsoleKind::Coleco => (
                ChipId {
                    manufacturer: 0xBF,
                    device: 0xB5,
                    kind: 0,
                },
                CommandFamily::Sst,
                0x2_0000,
                0x1000,
            ),
            ConsoleKind::Genesis => (
                ChipId {
                    manufacturer: 0x01,
                    device: 0x7E,
                    kind: 0x1D,
                },
                CommandFamily::Macronix,
                0x40_0000,
                0x1_0000,
            ),
            ConsoleKind::Sms => (
                ChipId {
                    manufacturer: 0xC2,
                    device: 0x58,
                    kind: 0,
                },
                CommandFamily::Macronix,
                0x10_0000,
                0x1_0000,
            ),
            ConsoleKind::PcEngine | ConsoleKind::TurboGrafx16 | ConsoleKind::Undefined => (
                ChipId {
                    manufacturer: 0xC2,
                    device: 0x23,
                    kind: 0,
                },
                CommandFamily::Macronix,
                0x8_0000,
                0x1_0000,
            ),
        };

        Self {
            console,
            chip,
            family,
            capacity,
            sector_size,
            timing: FlashTiming::default(),
            sram_size: 0x8000,
            access_ns: DEFAULT_ACCESS_NS,
            present: true,
        }
    }

    pub fn with_sram_size(mut self, sram_size: usize) -> Self {
        self.sram_size = sram_size;
        self
    }

    pub fn with_timing(mut self, timing: FlashTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_chip(mut self, chip: ChipId, family: CommandFamily) -> Self {
        self.chip = chip;
        self.family = family;
        self
    }

    pub fn with_present(mut self, present: bool) -> Self {
        self.present = present;
        self
    }

    fn width(&self) -> BusWidth {
        match self.console {
            ConsoleKind::Genesis => BusWidth::Sixteen,
            _ => BusWidth::Eight,
        }
    }

    fn reset_line(&self) -> Option<Line> {
        match self.console {
            ConsoleKind::Sms | ConsoleKind::PcEngine => Some(Line::Ctrl(4)),
            ConsoleKind::TurboGrafx16 => Some(Line::Ctrl(0)),
            _ => None,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::for_console(ConsoleKind::Undefined)
    }
}

/// Something the cartridge observed on its pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// A write committed by the release of `strobe`.
    Write {
        address: u32,
        lanes: Lanes,
        strobe: Line,
    },
    /// The console reset line was released after being held low.
    Reset,
}

/// Sega mapper registers as the cartridge holds them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SegaMapper {
    pages: [u8; 3],
    control: Control,
}

impl Default for SegaMapper {
    fn default() -> Self {
        Self {
            pages: [0, 1, 2],
            control: Control::empty(),
        }
    }
}

#[derive(Debug)]
pub struct SimPort {
    config: SimConfig,
    flash: FlashChip,
    sram: Vec<u8>,
    mapper: SegaMapper,
    /// Genesis `/TIME` register: save RAM mapped.
    sram_mapped: bool,
    direction: Direction,
    driven: Lanes,
    lines: [Level; LINE_COUNT],
    address: u32,
    now_ns: u64,
    events: Vec<SimEvent>,
}

impl SimPort {
    pub fn new(config: SimConfig) -> Self {
        let flash = FlashChip::new(
            config.chip,
            config.family,
            config.width(),
            config.capacity,
            config.sector_size,
            config.timing,
        );
        Self {
            sram: vec![0xFF; config.sram_size.max(1)],
            flash,
            config,
            mapper: SegaMapper::default(),
            sram_mapped: false,
            direction: Direction::Input,
            driven: Lanes::default(),
            lines: [Level::High; LINE_COUNT],
            address: 0,
            now_ns: 0,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn flash(&self) -> &FlashChip {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut FlashChip {
        &mut self.flash
    }

    pub fn sram(&self) -> &[u8] {
        &self.sram
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Latched address as the cartridge sees it.
    pub fn latched_address(&self) -> u32 {
        self.address
    }

    pub fn now_ns(&self) -> u64 {
        self.now_ns
    }

    pub fn set_present(&mut self, present: bool) {
        self.config.present = present;
    }

    fn level(&self, line: Line) -> Level {
        self.lines[line_index(line)]
    }

    fn is_low(&self, line: Line) -> bool {
        self.level(line) == Level::Low
    }

    fn tick(&mut self) {
        self.now_ns += self.config.access_ns;
    }

    fn on_edge(&mut self, line: Line, previous: Level, level: Level) {
        match (line, previous, level) {
            (Line::AleLow, Level::High, Level::Low) => {
                self.address = (self.address & 0xFF_0000)
                    | (u32::from(self.driven.upper) << 8)
                    | u32::from(self.driven.lower);
            }
            (Line::AleHigh, Level::High, Level::Low) => {
                self.address = (self.address & 0xFFFF) | (u32::from(self.driven.lower) << 16);
            }
            (Line::WriteEnable, Level::Low, Level::High) if self.is_low(Line::ChipEnable) => {
                self.commit_write(Line::WriteEnable);
            }
            (Line::Ctrl(_), Level::Low, Level::High) => self.on_ctrl_release(line),
            _ => {}
        }
    }

    fn on_ctrl_release(&mut self, line: Line) {
        if self.config.reset_line() == Some(line) {
            debug!("sim cartridge reset");
            self.mapper = SegaMapper::default();
            self.events.push(SimEvent::Reset);
            return;
        }

        if self.config.console != ConsoleKind::Genesis {
            return;
        }
        match line {
            Line::Ctrl(5) | Line::Ctrl(6) if self.is_low(Line::ChipEnable) => {
                self.commit_write(line);
            }
            Line::Ctrl(7) if self.is_low(Line::Ctrl(5)) => {
                self.events.push(SimEvent::Write {
                    address: self.address,
                    lanes: self.driven,
                    strobe: line,
                });
                self.sram_mapped = self.driven.lower & 0x01 != 0;
                debug!("sim time register: save RAM mapped = {}", self.sram_mapped);
            }
            _ => {}
        }
    }

    fn coleco_selected(&self, address: u32) -> bool {
        let range = ((address >> 13) & 0x03) as u8;
        (0..4u8).all(|n| self.is_low(Line::Ctrl(n)) == (n == range))
    }

    fn genesis_sram_index(&self, address: u32) -> Option<usize> {
        (self.sram_mapped && (GENESIS_SRAM_START..GENESIS_SRAM_END).contains(&address))
            .then(|| ((address - GENESIS_SRAM_START) >> 1) as usize % self.sram.len())
    }

    fn sega_flash_address(&self, address: u32) -> u32 {
        let slot = (address / WINDOW_SIZE) as usize;
        u32::from(self.mapper.pages[slot]) * WINDOW_SIZE + (address % WINDOW_SIZE)
    }

    fn read_cartridge(&mut self) -> Lanes {
        let now = self.now_ns;
        match self.config.console {
            ConsoleKind::Sms => {
                let address = self.address & 0xFFFF;
                if address >= 3 * WINDOW_SIZE {
                    return Lanes::FLOATING;
                }
                if address >= 2 * WINDOW_SIZE && self.mapper.control.contains(Control::SRAM_ENABLE)
                {
                    let index = (address % WINDOW_SIZE) as usize % self.sram.len();
                    return Lanes::new(self.sram[index], 0xFF);
                }
                let flash_address = self.sega_flash_address(address);
                Lanes::new(self.flash.read(flash_address, now) as u8, 0xFF)
            }
            ConsoleKind::Coleco => {
                let address = self.address & 0xFFFF;
                if !self.coleco_selected(address) {
                    return Lanes::FLOATING;
                }
                Lanes::new(self.flash.read(address & 0x7FFF, now) as u8, 0xFF)
            }
            ConsoleKind::Genesis => {
                if let Some(index) = self.genesis_sram_index(self.address) {
                    let byte = self.sram[index];
                    return Lanes::new(byte, byte);
                }
                let [low, high] = self.flash.read(self.address >> 1, now).to_le_bytes();
                Lanes::new(low, high)
            }
            ConsoleKind::PcEngine | ConsoleKind::TurboGrafx16 | ConsoleKind::Undefined => {
                Lanes::new(self.flash.read(self.address, now) as u8, 0xFF)
            }
        }
    }

    fn commit_write(&mut self, strobe: Line) {
        let lanes = self.driven;
        let now = self.now_ns;
        self.events.push(SimEvent::Write {
            address: self.address,
            lanes,
            strobe,
        });

        match self.config.console {
            ConsoleKind::Sms => {
                let address = self.address & 0xFFFF;
                match address {
                    0xFFFC => self.mapper.control = Control::from_bits_truncate(lanes.lower),
                    0xFFFD..=0xFFFF => {
                        self.mapper.pages[(address - 0xFFFD) as usize] = lanes.lower;
                    }
                    a if a >= 2 * WINDOW_SIZE
                        && a < 3 * WINDOW_SIZE
                        && self.mapper.control.contains(Control::SRAM_ENABLE) =>
                    {
                        let index = (a % WINDOW_SIZE) as usize % self.sram.len();
                        self.sram[index] = lanes.lower;
                    }
                    a if a < 3 * WINDOW_SIZE
                        && self.mapper.control.contains(Control::WRITE_ENABLE) =>
                    {
                        let flash_address = self.sega_flash_address(a);
                        self.flash
                            .write(flash_address, u16::from(lanes.lower), now);
                    }
                    _ => {}
                }
            }
            ConsoleKind::Coleco => {
                let address = self.address & 0xFFFF;
                if self.coleco_selected(address) {
                    self.flash
                        .write(address & 0x7FFF, u16::from(lanes.lower), now);
                }
            }
            ConsoleKind::Genesis => {
                let sram = self.genesis_sram_index(self.address);
                match (strobe, sram) {
                    (Line::WriteEnable, None) => {
                        let word = u16::from_le_bytes([lanes.lower, lanes.upper]);
                        self.flash.write(self.address >> 1, word, now);
                    }
                    (Line::Ctrl(5), Some(index)) => self.sram[index] = lanes.lower,
                    (Line::Ctrl(6), Some(index)) => self.sram[index] = lanes.upper,
                    // single-lane writes leave the other byte of the word erased
                    (Line::Ctrl(5), None) => {
                        let word = u16::from_le_bytes([lanes.lower, 0xFF]);
                        self.flash.write(self.address >> 1, word, now);
                    }
                    (Line::Ctrl(6), None) => {
                        let word = u16::from_le_bytes([0xFF, lanes.upper]);
                        self.flash.write(self.address >> 1, word, now);
                    }
                    _ => {}
                }
            }
            ConsoleKind::PcEngine | ConsoleKind::TurboGrafx16 | ConsoleKind::Undefined => {
                self.flash
                    .write(self.address, u16::from(lanes.lower), now);
            }
        }
    }
}

impl Port for SimPort {
    fn set_direction(&mut self, direction: Direction) {
        self.tick();
        self.direction = direction;
    }

    fn drive(&mut self, lanes: Lanes) {
        self.tick();
        self.driven = lanes;
    }

    fn sample(&mut self) -> Lanes {
        self.tick();
        if self.direction == Direction::Output {
            return self.driven;
        }
        if self.is_low(Line::ChipEnable) && self.is_low(Line::ReadEnable) {
            self.read_cartridge()
        } else {
            Lanes::FLOATING
        }
    }

    fn set_line(&mut self, line: Line, level: Level) {
        self.tick();
        let previous = self.level(line);
        self.lines[line_index(line)] = level;
        self.on_edge(line, previous, level);
    }

    fn line(&mut self, line: Line) -> Level {
        self.tick();
        match line {
            Line::CartDetect if self.config.present => Level::Low,
            Line::CartDetect => Level::High,
            _ => self.level(line),
        }
    }

    fn delay_ns(&mut self, ns: u32) {
        self.now_ns += u64::from(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.now_ns += u64::from(ms) * 1_000_000;
    }

    fn millis(&mut self) -> u64 {
        self.now_ns / 1_000_000
    }
}

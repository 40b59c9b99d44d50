use tracing::trace;

use crate::{
    bus::BusWidth,
    flash::{CommandFamily, CommandSet, command},
};

/// Identification bytes a simulated chip answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChipId {
    pub manufacturer: u8,
    pub device: u8,
    pub kind: u8,
}

/// Busy times of the embedded algorithms, in nanoseconds of bus time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashTiming {
    pub program_ns: u64,
    pub sector_erase_ns: u64,
    pub chip_erase_ns: u64,
}

impl Default for FlashTiming {
    fn default() -> Self {
        Self {
            program_ns: 20_000,
            sector_erase_ns: 25_000_000,
            chip_erase_ns: 300_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Read,
    Unlocked1,
    Unlocked2,
    Id,
    Program,
    EraseSetup,
    EraseUnlocked1,
    EraseUnlocked2,
    BufferCount { block: u32 },
    BufferLoad { block: u32, remaining: u32 },
    BufferConfirm { block: u32 },
}

#[derive(Debug, Clone, Copy)]
struct Busy {
    until_ns: u64,
    /// DQ7 while busy: complement of the programmed bit, 0 for erases.
    dq7: u8,
}

/// JEDEC-style flash command decoder with a byte array behind it.
///
/// Addresses are chip addresses: bytes for x8 parts, words for x16 parts.
/// Word data carries `DQ7..DQ0` in its low byte; commands are decoded from
/// that byte only.
#[derive(Debug, Clone)]
pub struct FlashChip {
    id: ChipId,
    family: CommandFamily,
    width: BusWidth,
    cells: Vec<u8>,
    sector_size: u32,
    timing: FlashTiming,
    mode: Mode,
    busy: Option<Busy>,
    toggle: bool,
    buffer: Vec<(u32, u16)>,
}

impl FlashChip {
    pub fn new(
        id: ChipId,
        family: CommandFamily,
        width: BusWidth,
        capacity: usize,
        sector_size: u32,
        timing: FlashTiming,
    ) -> Self {
        Self {
            id,
            family,
            width,
            cells: vec![0xFF; capacity.max(2)],
            sector_size: sector_size.max(2),
            timing,
            mode: Mode::Read,
            busy: None,
            toggle: false,
            buffer: Vec::new(),
        }
    }

    pub fn id(&self) -> ChipId {
        self.id
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Copies `data` into the array at byte `offset`, bypassing the command
    /// interface.
    pub fn load(&mut self, offset: usize, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            let index = (offset + i) % self.cells.len();
            self.cells[index] = byte;
        }
    }

    pub fn is_busy(&self, now_ns: u64) -> bool {
        self.busy.is_some_and(|busy| now_ns < busy.until_ns)
    }

    fn unlock_addresses(&self) -> (u32, u32, u32) {
        let (first, second) = CommandSet::new(self.family, self.width).unlock_addresses();
        match (self.family, self.width) {
            (CommandFamily::Macronix, BusWidth::Eight) => (first, second, 0xFFF),
            (CommandFamily::Macronix, BusWidth::Sixteen) => (first >> 1, second >> 1, 0x7FF),
            (CommandFamily::Sst, BusWidth::Eight) => (first, second, 0x7FFF),
            (CommandFamily::Sst, BusWidth::Sixteen) => (first >> 1, second >> 1, 0x7FFF),
        }
    }

    fn byte_index(&self, address: u32) -> usize {
        let offset = match self.width {
            BusWidth::Eight => address as usize,
            BusWidth::Sixteen => (address as usize) << 1,
        };
        offset % self.cells.len()
    }

    fn cell(&self, address: u32) -> u16 {
        let index = self.byte_index(address);
        match self.width {
            BusWidth::Eight => u16::from(self.cells[index]),
            BusWidth::Sixteen => {
                let high = self.cells.get(index + 1).copied().unwrap_or(0xFF);
                u16::from_le_bytes([self.cells[index], high])
            }
        }
    }

    fn program_cell(&mut self, address: u32, data: u16) {
        let index = self.byte_index(address);
        let [low, high] = data.to_le_bytes();
        self.cells[index] &= low;
        if self.width == BusWidth::Sixteen {
            if let Some(cell) = self.cells.get_mut(index + 1) {
                *cell &= high;
            }
        }
    }

    fn start(&mut self, now_ns: u64, duration_ns: u64, dq7: u8) {
        self.busy = Some(Busy {
            until_ns: now_ns + duration_ns,
            dq7,
        });
    }

    pub fn read(&mut self, address: u32, now_ns: u64) -> u16 {
        if let Some(busy) = self.busy {
            if now_ns < busy.until_ns {
                self.toggle = !self.toggle;
                let dq6 = if self.toggle { 0x40 } else { 0x00 };
                return u16::from(busy.dq7 | dq6);
            }
            self.busy = None;
        }

        match self.mode {
            Mode::Id => match address & 0xFF {
                0x00 => u16::from(self.id.manufacturer),
                0x01 => u16::from(self.id.device),
                0x0E => u16::from(self.id.kind),
                _ => 0,
            },
            _ => self.cell(address),
        }
    }

    pub fn write(&mut self, address: u32, data: u16, now_ns: u64) {
        if self.is_busy(now_ns) {
            return;
        }

        let value = data as u8;
        let (first, second, mask) = self.unlock_addresses();
        let masked = address & mask;

        let mode = self.mode;
        self.mode = match mode {
            Mode::Read | Mode::Id if value == command::ID_EXIT => Mode::Read,
            Mode::Read | Mode::Id => {
                if masked == first && value == command::UNLOCK_1 {
                    Mode::Unlocked1
                } else {
                    mode
                }
            }
            Mode::Unlocked1 if masked == second && value == command::UNLOCK_2 => Mode::Unlocked2,
            Mode::Unlocked2 => match value {
                command::ID_ENTRY if masked == first => Mode::Id,
                command::PROGRAM if masked == first => Mode::Program,
                command::ERASE_SETUP if masked == first => Mode::EraseSetup,
                command::WRITE_BUFFER => Mode::BufferCount { block: address },
                _ => Mode::Read,
            },
            Mode::Program => {
                trace!("flash program {address:#x} <- {data:#06x}");
                self.program_cell(address, data);
                self.start(now_ns, self.timing.program_ns, !value & 0x80);
                Mode::Read
            }
            Mode::EraseSetup if masked == first && value == command::UNLOCK_1 => {
                Mode::EraseUnlocked1
            }
            Mode::EraseUnlocked1 if masked == second && value == command::UNLOCK_2 => {
                Mode::EraseUnlocked2
            }
            Mode::EraseUnlocked2 => {
                match value {
                    command::CHIP_ERASE if masked == first => {
                        self.cells.fill(0xFF);
                        self.start(now_ns, self.timing.chip_erase_ns, 0);
                    }
                    command::SECTOR_ERASE => {
                        let index = self.byte_index(address);
                        let size = self.sector_size as usize;
                        let start = index - index % size;
                        let end = (start + size).min(self.cells.len());
                        self.cells[start..end].fill(0xFF);
                        self.start(now_ns, self.timing.sector_erase_ns, 0);
                    }
                    _ => {}
                }
                Mode::Read
            }
            Mode::BufferCount { block } => {
                self.buffer.clear();
                Mode::BufferLoad {
                    block,
                    remaining: u32::from(value) + 1,
                }
            }
            Mode::BufferLoad { block, remaining } => {
                self.buffer.push((address, data));
                if remaining > 1 {
                    Mode::BufferLoad {
                        block,
                        remaining: remaining - 1,
                    }
                } else {
                    Mode::BufferConfirm { block }
                }
            }
            Mode::BufferConfirm { block } => {
                if value == command::BUFFER_CONFIRM && address == block {
                    let buffer = std::mem::take(&mut self.buffer);
                    let dq7 = buffer.last().map_or(0, |&(_, d)| !(d as u8) & 0x80);
                    for (target, word) in buffer {
                        self.program_cell(target, word);
                    }
                    self.start(now_ns, self.timing.program_ns, dq7);
                }
                Mode::Read
            }
            _ => Mode::Read,
        };
    }
}

use tracing::{debug, warn};

use crate::{
    bus::{BusWidth, CartBus},
    flash::{CommandFamily, CommandSet, FlashDeviceId, command, flash_size},
};

/// Consecutive agreeing status reads that mark a program as finished.
pub const PROGRAM_SETTLE_READS: u32 = 2;
/// Consecutive agreeing status reads that mark an erase as finished.
pub const ERASE_SETTLE_READS: u32 = 4;
/// Wall time between progress ticks while an erase is running.
pub const PROGRESS_INTERVAL_MS: u64 = 250;

/// Address polled for the toggle bit.
const STATUS_ADDRESS: u32 = 0x0000;

/// Write-buffer limits of S29GL-style parts.
pub const MAX_BUFFER_WORDS: usize = 16;
pub const BUFFER_BLOCK_BYTES: u32 = 0x20;

/// Advisory liveness output for long erases.
pub trait Progress {
    fn tick(&mut self);

    fn done(&mut self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl Progress for NullProgress {
    fn tick(&mut self) {}

    fn done(&mut self) {}
}

/// Issues the JEDEC command sequences of one command family.
///
/// The programmer is stateless; every operation runs against the [`CartBus`]
/// it is handed, so bank switching and chip-enable routing come from the
/// active profile's translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashProgrammer {
    commands: CommandSet,
}

impl FlashProgrammer {
    pub const fn new(family: CommandFamily, width: BusWidth) -> Self {
        Self {
            commands: CommandSet::new(family, width),
        }
    }

    pub fn commands(&self) -> CommandSet {
        self.commands
    }

    pub fn family(&self) -> CommandFamily {
        self.commands.family
    }

    fn command(&self, cart: &mut CartBus<'_>, address: u32, value: u8) {
        match self.commands.width {
            BusWidth::Eight => cart.write_byte(address, value),
            BusWidth::Sixteen => cart.write_word(address, self.commands.encode(value)),
        }
    }

    /// `(unlock1, AA) (unlock2, 55)` prefix shared by every sequence.
    fn unlock(&self, cart: &mut CartBus<'_>) {
        let (first, second) = self.commands.unlock_addresses();
        self.command(cart, first, command::UNLOCK_1);
        self.command(cart, second, command::UNLOCK_2);
    }

    /// Full unlock triple ending with `value` at the first unlock address.
    fn unlock_command(&self, cart: &mut CartBus<'_>, value: u8) {
        self.unlock(cart);
        let (first, _) = self.commands.unlock_addresses();
        self.command(cart, first, value);
    }

    fn status(&self, cart: &mut CartBus<'_>) -> u16 {
        let raw = match self.commands.width {
            BusWidth::Eight => u16::from(cart.read_byte(STATUS_ADDRESS)),
            BusWidth::Sixteen => cart.read_word(STATUS_ADDRESS),
        };
        raw & self.commands.status_mask()
    }

    pub fn identify(&self, cart: &mut CartBus<'_>) -> FlashDeviceId {
        cart.begin_flash_command();
        self.unlock_command(cart, command::ID_ENTRY);

        let (manufacturer, device, kind) = match self.commands.width {
            BusWidth::Eight => (cart.read_byte(0x0000), cart.read_byte(0x0001), 0),
            BusWidth::Sixteen => (
                (cart.read_word(0x0000) >> 8) as u8,
                (cart.read_word(0x0001 << 1) >> 8) as u8,
                (cart.read_word(0x000E << 1) >> 8) as u8,
            ),
        };

        self.command(cart, 0x0000, command::ID_EXIT);
        cart.end_flash_command();

        let size = flash_size(manufacturer, device, kind);
        debug!(
            "flash id: manufacturer={manufacturer:#04x} device={device:#04x} type={kind:#04x} size={size:#x}"
        );
        FlashDeviceId {
            manufacturer,
            device,
            kind,
            size,
        }
    }

    pub fn erase_chip(&self, cart: &mut CartBus<'_>, wait: bool, progress: &mut dyn Progress) {
        debug!("chip erase ({} family)", self.family());
        cart.begin_flash_command();
        self.unlock_command(cart, command::ERASE_SETUP);
        self.unlock_command(cart, command::CHIP_ERASE);
        cart.end_flash_command();

        if wait {
            self.wait_erase(cart, progress);
        }
    }

    pub fn erase_sector(
        &self,
        cart: &mut CartBus<'_>,
        sector: u32,
        wait: bool,
        progress: &mut dyn Progress,
    ) {
        debug!("sector erase at {sector:#08x}");
        cart.begin_flash_command();
        self.unlock_command(cart, command::ERASE_SETUP);
        self.unlock(cart);
        self.command(cart, sector, command::SECTOR_ERASE);
        cart.end_flash_command();

        if wait {
            self.wait_erase(cart, progress);
        }
    }

    /// Programs one payload byte. The byte goes through the translator's
    /// payload conversion; the command bytes do not.
    pub fn program_byte(&self, cart: &mut CartBus<'_>, address: u32, data: u8, wait: bool) {
        cart.begin_flash_command();
        self.unlock_command(cart, command::PROGRAM);
        cart.write_payload(address, data);
        cart.end_flash_command();

        if wait {
            self.wait_program(cart);
        }
    }

    /// Programs one payload word. Byte-wide parts take it as two byte
    /// programs, high byte first; the first is always waited on.
    pub fn program_word(&self, cart: &mut CartBus<'_>, address: u32, data: u16, wait: bool) {
        if self.commands.width == BusWidth::Eight {
            let [high, low] = data.to_be_bytes();
            self.program_byte(cart, address, high, true);
            self.program_byte(cart, address.wrapping_add(1), low, wait);
            return;
        }

        cart.begin_flash_command();
        self.unlock_command(cart, command::PROGRAM);
        cart.write_payload_word(address, data);
        cart.end_flash_command();

        if wait {
            self.wait_program(cart);
        }
    }

    /// Write-buffer programming for S29GL-style word-wide parts.
    ///
    /// `words` must lie inside one [`BUFFER_BLOCK_BYTES`] block starting at
    /// `address`; anything past the block is dropped. Returns the number of
    /// words written.
    pub fn program_buffer(
        &self,
        cart: &mut CartBus<'_>,
        address: u32,
        words: &[u16],
        wait: bool,
    ) -> usize {
        let block = address & !(BUFFER_BLOCK_BYTES - 1);
        let room = ((block + BUFFER_BLOCK_BYTES - address) / 2) as usize;
        let count = words.len().min(room).min(MAX_BUFFER_WORDS);
        if count == 0 {
            return 0;
        }
        if count < words.len() {
            warn!(
                "write buffer at {address:#08x} truncated to {count} of {} words",
                words.len()
            );
        }

        cart.begin_flash_command();
        self.unlock(cart);
        self.command(cart, block, command::WRITE_BUFFER);
        self.command(cart, block, (count - 1) as u8);
        let mut target = address;
        for &word in &words[..count] {
            cart.write_payload_word(target, word);
            target += 2;
        }
        self.command(cart, block, command::BUFFER_CONFIRM);
        cart.end_flash_command();

        if wait {
            self.wait_program(cart);
        }
        count
    }

    /// Seeds from one status read, then counts how many of the next
    /// `attempts` reads agree with their predecessor. Any change resets the
    /// count, so a finished operation returns exactly `attempts`.
    pub fn toggle_bit(&self, cart: &mut CartBus<'_>, attempts: u32) -> u32 {
        let mut previous = self.status(cart);
        let mut matches = 0;
        for _ in 0..attempts {
            let current = self.status(cart);
            if current == previous {
                matches += 1;
            } else {
                matches = 0;
            }
            previous = current;
        }
        matches
    }

    /// Re-reads `address` until it returns `expected`, for at most
    /// `max_reads` reads. `expected` is a payload byte.
    pub fn data_poll(
        &self,
        cart: &mut CartBus<'_>,
        address: u32,
        expected: u8,
        max_reads: u32,
    ) -> bool {
        let raw = cart.encode_payload(expected);
        (0..max_reads).any(|_| cart.read_byte(address) == raw)
    }

    /// Repeats [`FlashProgrammer::toggle_bit`] until it settles or
    /// `timeout_ms` of wall time has passed.
    pub fn wait_ready(&self, cart: &mut CartBus<'_>, attempts: u32, timeout_ms: u64) -> bool {
        let deadline = cart.millis().saturating_add(timeout_ms);
        loop {
            if self.toggle_bit(cart, attempts) == attempts {
                return true;
            }
            if cart.millis() >= deadline {
                warn!("flash still busy after {timeout_ms}ms");
                return false;
            }
        }
    }

    fn wait_program(&self, cart: &mut CartBus<'_>) {
        while self.toggle_bit(cart, PROGRAM_SETTLE_READS) != PROGRAM_SETTLE_READS {}
    }

    fn wait_erase(&self, cart: &mut CartBus<'_>, progress: &mut dyn Progress) {
        let mut last_tick = cart.millis();
        while self.toggle_bit(cart, ERASE_SETTLE_READS) != ERASE_SETTLE_READS {
            let now = cart.millis();
            if now.saturating_sub(last_tick) >= PROGRESS_INTERVAL_MS {
                progress.tick();
                last_tick = now;
            }
        }
        progress.done();
    }
}

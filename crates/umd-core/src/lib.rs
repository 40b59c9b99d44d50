use tracing::{debug, info, warn};

use crate::{
    bus::{BusController, BusWidth, CartBus, Port},
    error::Error,
    flash::{
        FlashDeviceId, FlashProgrammer,
        programmer::{BUFFER_BLOCK_BYTES, MAX_BUFFER_WORDS, Progress},
    },
    header::Checksum,
    profile::{CartridgeProfile, ConsoleKind, select_profile},
};

pub mod bus;
pub mod error;
pub mod flash;
pub mod header;
pub mod profile;
pub mod sim;
pub mod translator;

/// One cartridge session: the adapter bus plus whichever console profile is
/// currently bound to it.
///
/// Until [`Umd::select_profile`] is called the no-op profile is active, so
/// every operation is harmless and returns zeroed data.
#[derive(Debug)]
pub struct Umd<P> {
    bus: BusController<P>,
    profile: CartridgeProfile,
    /// Device identified since the last profile change.
    flash: Option<FlashDeviceId>,
}

impl<P: Port> Umd<P> {
    pub fn new(port: P) -> Self {
        Self {
            bus: BusController::new(port),
            profile: CartridgeProfile::noop(),
            flash: None,
        }
    }

    /// Binds the profile for `console` and runs its activation sequence.
    pub fn select_profile(&mut self, console: ConsoleKind) -> &CartridgeProfile {
        info!("selecting {console} profile");
        let mut profile = select_profile(console);
        profile.activate(&mut self.bus);
        self.profile = profile;
        self.flash = None;
        &self.profile
    }

    pub fn profile(&self) -> &CartridgeProfile {
        &self.profile
    }

    pub fn bus(&self) -> &BusController<P> {
        &self.bus
    }

    pub fn port(&self) -> &P {
        self.bus.port()
    }

    pub fn port_mut(&mut self) -> &mut P {
        self.bus.port_mut()
    }

    /// Last identified flash device, if any.
    pub fn flash_id(&self) -> Option<FlashDeviceId> {
        self.flash
    }

    fn session(&mut self) -> Option<(CartBus<'_>, FlashProgrammer)> {
        self.profile.session(&mut self.bus)
    }

    pub fn read_byte(&mut self, address: u32) -> u8 {
        self.session()
            .map_or(0, |(mut cart, _)| cart.read_payload(address))
    }

    pub fn read_word(&mut self, address: u32) -> u16 {
        self.session()
            .map_or(0, |(mut cart, _)| cart.read_payload_word(address))
    }

    /// Raw bus write through the translator; no flash command is issued.
    pub fn write_byte(&mut self, address: u32, value: u8) {
        if let Some((mut cart, _)) = self.session() {
            cart.write_payload(address, value);
        }
    }

    pub fn write_word(&mut self, address: u32, value: u16) {
        if let Some((mut cart, _)) = self.session() {
            cart.write_payload_word(address, value);
        }
    }

    /// Fills `buf` with consecutive payload bytes starting at `address`.
    pub fn read_block(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Error> {
        Error::check_span(address, buf.len())?;
        match self.session() {
            Some((mut cart, _)) => {
                for (offset, byte) in (address..).zip(buf.iter_mut()) {
                    *byte = cart.read_payload(offset);
                }
            }
            None => buf.fill(0),
        }
        Ok(())
    }

    /// Fills `buf` with consecutive words starting at the even `address`.
    pub fn read_word_block(&mut self, address: u32, buf: &mut [u16]) -> Result<(), Error> {
        if address % 2 != 0 {
            return Err(Error::UnalignedWord(address));
        }
        Error::check_span(address, buf.len() * 2)?;
        match self.session() {
            Some((mut cart, _)) => {
                for (offset, word) in (address..).step_by(2).zip(buf.iter_mut()) {
                    *word = cart.read_payload_word(offset);
                }
            }
            None => buf.fill(0),
        }
        Ok(())
    }

    /// Reads the software ID of the flash part and remembers it for later
    /// operations. The no-op profile reports an all-zero, unknown device.
    pub fn identify(&mut self) -> FlashDeviceId {
        let id = self
            .session()
            .map(|(mut cart, programmer)| programmer.identify(&mut cart))
            .unwrap_or_default();
        if !id.is_known() {
            warn!(
                "unknown flash {:#04x}/{:#04x}/{:#04x}",
                id.manufacturer, id.device, id.kind
            );
        }
        self.flash = Some(id);
        id
    }

    pub fn erase_chip(&mut self, wait: bool, progress: &mut dyn Progress) {
        if let Some((mut cart, programmer)) = self.session() {
            programmer.erase_chip(&mut cart, wait, progress);
        }
    }

    pub fn erase_sector(&mut self, sector: u32, wait: bool, progress: &mut dyn Progress) {
        if let Some((mut cart, programmer)) = self.session() {
            programmer.erase_sector(&mut cart, sector, wait, progress);
        }
    }

    pub fn program_byte(&mut self, address: u32, data: u8, wait: bool) {
        if let Some((mut cart, programmer)) = self.session() {
            programmer.program_byte(&mut cart, address, data, wait);
        }
    }

    pub fn program_word(&mut self, address: u32, data: u16, wait: bool) {
        if let Some((mut cart, programmer)) = self.session() {
            programmer.program_word(&mut cart, address, data, wait);
        }
    }

    /// Programs consecutive words starting at the even `address`.
    ///
    /// Word-wide parts that accept write buffers get one buffered program per
    /// 32-byte block; everything else is programmed a word at a time. Every
    /// chunk but the last is waited on regardless of `wait`. Returns the
    /// number of words written.
    pub fn program_words(&mut self, address: u32, words: &[u16], wait: bool) -> Result<usize, Error> {
        if address % 2 != 0 {
            return Err(Error::UnalignedWord(address));
        }
        Error::check_span(address, words.len() * 2)?;

        let buffered = self.profile.bus_width() == BusWidth::Sixteen
            && self.flash.is_some_and(|id| id.supports_buffer());
        let Some((mut cart, programmer)) = self.session() else {
            return Ok(0);
        };

        let mut target = address;
        let mut rest = words;
        while !rest.is_empty() {
            let room = if buffered {
                let block = target & !(BUFFER_BLOCK_BYTES - 1);
                (((block + BUFFER_BLOCK_BYTES - target) / 2) as usize).min(MAX_BUFFER_WORDS)
            } else {
                1
            };
            let last = rest.len() <= room;
            let written = if buffered {
                programmer.program_buffer(&mut cart, target, rest, wait || !last)
            } else {
                programmer.program_word(&mut cart, target, rest[0], wait || !last);
                1
            };
            target += (written * 2) as u32;
            rest = &rest[written..];
        }

        debug!(
            "programmed {} words at {address:#08x} (buffered: {buffered})",
            words.len()
        );
        Ok(words.len())
    }

    pub fn toggle_bit(&mut self, attempts: u32) -> u32 {
        self.session()
            .map_or(0, |(mut cart, programmer)| programmer.toggle_bit(&mut cart, attempts))
    }

    pub fn data_poll(&mut self, address: u32, expected: u8, max_reads: u32) -> bool {
        self.session().is_some_and(|(mut cart, programmer)| {
            programmer.data_poll(&mut cart, address, expected, max_reads)
        })
    }

    /// Bounded completion wait. The no-op profile has nothing in flight and
    /// reports ready at once.
    pub fn wait_ready(&mut self, attempts: u32, timeout_ms: u64) -> bool {
        self.session().is_none_or(|(mut cart, programmer)| {
            programmer.wait_ready(&mut cart, attempts, timeout_ms)
        })
    }

    pub fn detect_cartridge(&mut self) -> bool {
        self.bus.detect_presence()
    }

    /// Maps save RAM in. Returns `false` when the profile has no save RAM
    /// control.
    pub fn enable_sram(&mut self) -> bool {
        self.session()
            .is_some_and(|(mut cart, _)| cart.set_sram(true))
    }

    pub fn disable_sram(&mut self) -> bool {
        self.session()
            .is_some_and(|(mut cart, _)| cart.set_sram(false))
    }

    /// ROM size declared by the cartridge header, for consoles that have one.
    pub fn rom_size(&mut self) -> Option<u32> {
        let console = self.profile.console();
        let (mut cart, _) = self.session()?;
        match console {
            ConsoleKind::Sms => Some(header::sms_rom_size(|a| cart.read_payload(a)).size),
            ConsoleKind::Genesis => Some(header::genesis_rom_size(|a| cart.read_payload_word(a))),
            _ => None,
        }
    }

    /// Stored and computed header checksum, for consoles that have one.
    pub fn checksum(&mut self) -> Option<Checksum> {
        let console = self.profile.console();
        let (mut cart, _) = self.session()?;
        match console {
            ConsoleKind::Sms => Some(header::sms_checksum(|a| cart.read_payload(a))),
            ConsoleKind::Genesis => Some(header::genesis_checksum(|a| cart.read_payload_word(a))),
            _ => None,
        }
    }
}

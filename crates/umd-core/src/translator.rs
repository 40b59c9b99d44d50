use std::fmt::Debug;

use dyn_clone::DynClone;
use strum::Display;

use crate::bus::{AddressWidth, Bus, Lane, WriteStrobe};

pub mod linear;
pub mod mirrored;
pub mod range_switched;
pub mod windowed;

pub use linear::Linear;
pub use mirrored::{MirroredBus, reverse_bits};
pub use range_switched::RangeSwitched;
pub use windowed::{BankSlot, Windowed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TranslatorKind {
    Linear,
    Windowed,
    RangeSwitched,
    MirroredBus,
}

/// Address the cartridge actually sees for a logical ROM address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Physical {
    pub address: u32,
    pub width: AddressWidth,
}

impl Physical {
    pub const fn bits16(address: u32) -> Self {
        Self {
            address: address & 0xFFFF,
            width: AddressWidth::Bits16,
        }
    }

    pub const fn bits24(address: u32) -> Self {
        Self {
            address: address & 0xFF_FFFF,
            width: AddressWidth::Bits24,
        }
    }
}

/// Data lane and strobe a byte transfer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub lane: Lane,
    pub strobe: WriteStrobe,
}

impl Route {
    pub const EIGHT_BIT: Route = Route {
        lane: Lane::Lower,
        strobe: WriteStrobe::Write,
    };
}

/// Maps logical ROM addresses onto a console's banking scheme.
///
/// Translators own whatever cache their scheme needs (the selected page of a
/// bank slot, the active chip-enable range) and issue the side-effect writes
/// themselves through the [`Bus`] they are handed.
pub trait Translator: DynClone + Debug {
    fn kind(&self) -> TranslatorKind;

    /// Resolves `address`, performing any bank-register or chip-enable
    /// changes it needs. The caller latches the returned address.
    fn translate(&mut self, bus: &mut dyn Bus, address: u32) -> Physical;

    /// Lane and write strobe for a single byte at `address`.
    fn route_byte(&self, address: u32) -> Route {
        let _ = address;
        Route::EIGHT_BIT
    }

    /// Converts a byte read from the bus into the value a caller expects.
    /// Flash protocol bytes never pass through here.
    fn payload_in(&self, value: u8) -> u8 {
        value
    }

    /// Inverse of [`Translator::payload_in`] for bytes headed to the cartridge.
    fn payload_out(&self, value: u8) -> u8 {
        value
    }

    /// Called when the profile becomes active, right after any reset pulse.
    fn activate(&mut self, bus: &mut dyn Bus) {
        let _ = bus;
        self.invalidate();
    }

    /// Opens a flash command sequence (identify, erase or program).
    fn begin_flash_command(&mut self, bus: &mut dyn Bus) {
        let _ = bus;
    }

    /// Closes the sequence opened by [`Translator::begin_flash_command`].
    fn end_flash_command(&mut self, bus: &mut dyn Bus) {
        let _ = bus;
    }

    /// Maps or unmaps battery-backed save RAM. Returns `false` when the scheme
    /// has no save RAM control.
    fn set_sram(&mut self, bus: &mut dyn Bus, enabled: bool) -> bool {
        let _ = (bus, enabled);
        false
    }

    /// Forgets cached hardware state so the next access rewrites it.
    fn invalidate(&mut self) {}
}

dyn_clone::clone_trait_object!(Translator);

use bitflags::bitflags;
use tracing::debug;

use crate::{
    bus::{AddressWidth, Bus, Lanes, WriteStrobe},
    translator::{Physical, Translator, TranslatorKind},
};

// Windowed – Sega mapper, three 16 KiB slots.
//
// | Slot | Window          | Register | Home page | Behaviour                     |
// |------|-----------------|----------|-----------|-------------------------------|
// | 0    | `$0000-$3FFF`   | `$FFFD`  | 0         | Fixed for ROM access          |
// | 1    | `$4000-$7FFF`   | `$FFFE`  | 1         | Fixed for ROM access          |
// | 2    | `$8000-$BFFF`   | `$FFFF`  | 2         | Re-banked on every far access |
// | -    | -               | `$FFFC`  | -         | Control: ROM write / save RAM |

pub const WINDOW_SIZE: u32 = 0x4000;
const WINDOW_MASK: u32 = WINDOW_SIZE - 1;
const PAGE_SHIFT: u32 = 14;

pub const CONTROL_REGISTER: u16 = 0xFFFC;
const SLOT_REGISTERS: [u16; 3] = [0xFFFD, 0xFFFE, 0xFFFF];

bitflags! {
    /// Mapper control register (`$FFFC`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Control: u8 {
        /// Save RAM mapped into slot 2.
        const SRAM_ENABLE = 0x08;
        /// Cartridge writes reach the ROM/flash.
        const WRITE_ENABLE = 0x80;
    }
}

/// One bank-switched address window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankSlot {
    pub slot: u8,
    pub window_base: u32,
    pub window_size: u32,
    pub register: u16,
    /// Page last written to `register`; `None` until the first write.
    pub cached_page: Option<u8>,
}

impl BankSlot {
    fn new(slot: u8) -> Self {
        Self {
            slot,
            window_base: u32::from(slot) * WINDOW_SIZE,
            window_size: WINDOW_SIZE,
            register: SLOT_REGISTERS[usize::from(slot)],
            cached_page: None,
        }
    }

    fn home_page(&self) -> u8 {
        self.slot
    }

    /// Points the slot at `page`, writing the bank register only on change.
    /// Returns `true` when a register write was issued.
    pub fn select(&mut self, bus: &mut dyn Bus, page: u8) -> bool {
        if self.cached_page == Some(page) {
            return false;
        }
        debug!("slot {} register {:#06x} <- page {page}", self.slot, self.register);
        write_register(bus, self.register, page);
        self.cached_page = Some(page);
        true
    }

    pub fn physical(&self, address: u32) -> u32 {
        self.window_base | (address & (self.window_size - 1))
    }
}

fn write_register(bus: &mut dyn Bus, register: u16, value: u8) {
    bus.latch_address(u32::from(register), AddressWidth::Bits16);
    bus.strobe_write(Lanes::from_byte(value), WriteStrobe::Write);
}

#[derive(Debug, Clone)]
pub struct Windowed {
    slots: [BankSlot; 3],
    control: Control,
}

impl Default for Windowed {
    fn default() -> Self {
        Self::new()
    }
}

impl Windowed {
    pub fn new() -> Self {
        Self {
            slots: [BankSlot::new(0), BankSlot::new(1), BankSlot::new(2)],
            control: Control::empty(),
        }
    }

    pub fn slots(&self) -> &[BankSlot; 3] {
        &self.slots
    }

    pub fn control(&self) -> Control {
        self.control
    }

    fn write_control(&mut self, bus: &mut dyn Bus, control: Control) {
        debug!("control register <- {:#04x}", control.bits());
        write_register(bus, CONTROL_REGISTER, control.bits());
        self.control = control;
    }

    /// Homes the two fixed slots. Slot 2 keeps its page; no command address
    /// falls inside it.
    fn select_fixed_pages(&mut self, bus: &mut dyn Bus) {
        for slot in &mut self.slots[..2] {
            let page = slot.home_page();
            slot.select(bus, page);
        }
    }
}

impl Translator for Windowed {
    fn kind(&self) -> TranslatorKind {
        TranslatorKind::Windowed
    }

    fn translate(&mut self, bus: &mut dyn Bus, address: u32) -> Physical {
        let far = &mut self.slots[2];
        if address < far.window_base {
            return Physical::bits16(address);
        }

        let page = ((address >> PAGE_SHIFT) & 0xFF) as u8;
        far.select(bus, page);
        Physical::bits16(far.physical(address))
    }

    fn activate(&mut self, bus: &mut dyn Bus) {
        self.invalidate();
        for slot in &mut self.slots[1..] {
            let page = slot.home_page();
            slot.select(bus, page);
        }
    }

    fn begin_flash_command(&mut self, bus: &mut dyn Bus) {
        self.select_fixed_pages(bus);
        self.write_control(bus, Control::WRITE_ENABLE);
    }

    fn end_flash_command(&mut self, bus: &mut dyn Bus) {
        self.write_control(bus, Control::empty());
    }

    fn set_sram(&mut self, bus: &mut dyn Bus, enabled: bool) -> bool {
        let control = if enabled {
            Control::WRITE_ENABLE | Control::SRAM_ENABLE
        } else {
            Control::empty()
        };
        self.write_control(bus, control);
        true
    }

    fn invalidate(&mut self) {
        for slot in &mut self.slots {
            slot.cached_page = None;
        }
    }
}

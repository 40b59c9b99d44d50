use std::fmt::Debug;

pub mod cart;
pub mod controller;
#[cfg(test)]
pub(crate) mod mock;

pub use cart::CartBus;
pub use controller::BusController;

/// Minimum time `/RD` or `/WR` stays asserted before data is sampled or
/// released. The slowest supported ROMs need ~70ns; 125ns leaves margin for
/// the level shifters.
pub const STROBE_SETTLE_NS: u32 = 125;

/// How long a console reset line is held low during profile activation.
pub const RESET_PULSE_MS: u32 = 1;

/// Control lines exposed by the adapter.
///
/// Every strobe is active low; the latch enables are active high and capture
/// the data lanes on their falling edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    /// Latches A0..A15 from the lower/upper data lanes.
    AleLow,
    /// Latches A16..A23 from the lower data lane.
    AleHigh,
    ChipEnable,
    ReadEnable,
    WriteEnable,
    /// Cartridge-present sense, pulled up on the adapter.
    CartDetect,
    /// General purpose cartridge control line `CTRL0..=CTRL7`.
    Ctrl(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Level {
    Low,
    #[default]
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Data lanes released with pull-ups enabled.
    #[default]
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// Only the low latch is loaded; A16..A23 keep their previous value.
    Bits16,
    Bits24,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusWidth {
    Eight,
    Sixteen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// `D7..D0`
    Lower,
    /// `D15..D8`
    Upper,
}

impl Lane {
    /// Even bytes travel on the lower lane, odd bytes on the upper lane.
    pub fn for_address(address: u32) -> Self {
        if address & 1 == 0 {
            Lane::Lower
        } else {
            Lane::Upper
        }
    }
}

/// Values on the two 8-bit data lanes.
///
/// A logical word is the big-endian pair of ROM-image bytes at `(addr,
/// addr + 1)`: the even byte sits on the lower lane and forms the high half
/// of the word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Lanes {
    pub lower: u8,
    pub upper: u8,
}

impl Lanes {
    /// Both lanes floating high with the adapter pull-ups.
    pub const FLOATING: Lanes = Lanes {
        lower: 0xFF,
        upper: 0xFF,
    };

    pub const fn new(lower: u8, upper: u8) -> Self {
        Self { lower, upper }
    }

    pub const fn from_byte(value: u8) -> Self {
        Self {
            lower: value,
            upper: 0,
        }
    }

    pub const fn from_word(word: u16) -> Self {
        Self {
            lower: (word >> 8) as u8,
            upper: word as u8,
        }
    }

    pub const fn word(self) -> u16 {
        ((self.lower as u16) << 8) | self.upper as u16
    }

    pub fn lane(self, lane: Lane) -> u8 {
        match lane {
            Lane::Lower => self.lower,
            Lane::Upper => self.upper,
        }
    }

    pub fn with_lane(mut self, lane: Lane, value: u8) -> Self {
        match lane {
            Lane::Lower => self.lower = value,
            Lane::Upper => self.upper = value,
        }
        self
    }
}

/// Which strobe qualifies a write cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteStrobe {
    /// `/CE` then `/WR`, both lanes.
    Write,
    /// `/CE` then a lane-specific write line.
    Lane(Line),
    /// A lane write line then `/TIME`, with `/CE` left idle.
    Time { lane: Line, time: Line },
}

/// Raw adapter hardware: data lanes, direction registers, control lines and
/// a clock.
///
/// Implementations mirror the hardware directly and never fail.
pub trait Port: Debug {
    fn set_direction(&mut self, direction: Direction);

    /// Drives both lanes. Only meaningful while the direction is
    /// [`Direction::Output`].
    fn drive(&mut self, lanes: Lanes);

    /// Samples both lanes as currently seen by the adapter.
    fn sample(&mut self) -> Lanes;

    fn set_line(&mut self, line: Line, level: Level);

    fn line(&mut self, line: Line) -> Level;

    fn delay_ns(&mut self, ns: u32);

    fn delay_ms(&mut self, ms: u32);

    /// Monotonic milliseconds since power-up.
    fn millis(&mut self) -> u64;
}

impl<T: Port + ?Sized> Port for &mut T {
    fn set_direction(&mut self, direction: Direction) {
        (**self).set_direction(direction)
    }

    fn drive(&mut self, lanes: Lanes) {
        (**self).drive(lanes)
    }

    fn sample(&mut self) -> Lanes {
        (**self).sample()
    }

    fn set_line(&mut self, line: Line, level: Level) {
        (**self).set_line(line, level)
    }

    fn line(&mut self, line: Line) -> Level {
        (**self).line(line)
    }

    fn delay_ns(&mut self, ns: u32) {
        (**self).delay_ns(ns)
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }

    fn millis(&mut self) -> u64 {
        (**self).millis()
    }
}

impl<T: Port + ?Sized> Port for Box<T> {
    fn set_direction(&mut self, direction: Direction) {
        (**self).set_direction(direction)
    }

    fn drive(&mut self, lanes: Lanes) {
        (**self).drive(lanes)
    }

    fn sample(&mut self) -> Lanes {
        (**self).sample()
    }

    fn set_line(&mut self, line: Line, level: Level) {
        (**self).set_line(line, level)
    }

    fn line(&mut self, line: Line) -> Level {
        (**self).line(line)
    }

    fn delay_ns(&mut self, ns: u32) {
        (**self).delay_ns(ns)
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }

    fn millis(&mut self) -> u64 {
        (**self).millis()
    }
}

/// Timing-correct bus transactions, without any console meaning.
///
/// Address translators and the flash programmer are written against this
/// trait so they can run on [`BusController`] or on a recording mock.
pub trait Bus: Debug {
    fn latch_address(&mut self, address: u32, width: AddressWidth);

    fn strobe_read(&mut self, width: BusWidth) -> Lanes;

    fn strobe_write(&mut self, lanes: Lanes, strobe: WriteStrobe);

    fn set_line(&mut self, line: Line, level: Level);

    /// Drives `line` low for [`RESET_PULSE_MS`] and releases it.
    fn pulse_reset(&mut self, line: Line);

    fn millis(&mut self) -> u64;
}

impl<T: Bus + ?Sized> Bus for &mut T {
    fn latch_address(&mut self, address: u32, width: AddressWidth) {
        (**self).latch_address(address, width)
    }

    fn strobe_read(&mut self, width: BusWidth) -> Lanes {
        (**self).strobe_read(width)
    }

    fn strobe_write(&mut self, lanes: Lanes, strobe: WriteStrobe) {
        (**self).strobe_write(lanes, strobe)
    }

    fn set_line(&mut self, line: Line, level: Level) {
        (**self).set_line(line, level)
    }

    fn pulse_reset(&mut self, line: Line) {
        (**self).pulse_reset(line)
    }

    fn millis(&mut self) -> u64 {
        (**self).millis()
    }
}

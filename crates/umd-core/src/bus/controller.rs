use tracing::trace;

use crate::bus::{
    AddressWidth, Bus, BusWidth, Direction, Lanes, Level, Line, Port, RESET_PULSE_MS,
    STROBE_SETTLE_NS, WriteStrobe,
};

/// Drives the adapter's latches and strobes in the order the cartridge
/// hardware expects.
///
/// | Step        | Order                                                          |
/// |-------------|----------------------------------------------------------------|
/// | 24-bit latch| lanes = mid/low, pulse `ALE_low`, lanes = 0/high, pulse `ALE_high`, idle lanes, input |
/// | 16-bit latch| lanes = mid/low, pulse `ALE_low`, input                        |
/// | read        | `/CE` low, `/RD` low, settle, sample, `/RD` high, `/CE` high   |
/// | write       | output, drive, `/CE` low, `/WR` low, settle, `/WR` high, `/CE` high, input |
#[derive(Debug)]
pub struct BusController<P> {
    port: P,
}

impl<P: Port> BusController<P> {
    pub fn new(mut port: P) -> Self {
        for line in [Line::ChipEnable, Line::ReadEnable, Line::WriteEnable] {
            port.set_line(line, Level::High);
        }
        port.set_line(Line::AleLow, Level::Low);
        port.set_line(Line::AleHigh, Level::Low);
        port.set_direction(Direction::Input);
        Self { port }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn into_port(self) -> P {
        self.port
    }

    /// Switches the data-lane direction registers. Input releases the lanes
    /// to the pull-ups.
    pub fn set_direction(&mut self, direction: Direction) {
        self.port.set_direction(direction);
    }

    pub fn latch_address(&mut self, address: u32, width: AddressWidth) {
        let [low, mid, high, _] = address.to_le_bytes();
        trace!("latch {address:#08x} ({width:?})");

        self.port.set_direction(Direction::Output);
        self.port.drive(Lanes::new(low, mid));
        self.pulse_latch(Line::AleLow);

        if width == AddressWidth::Bits24 {
            self.port.drive(Lanes::new(high, 0x00));
            self.pulse_latch(Line::AleHigh);
            // Leaves no stale address byte behind for floating reads.
            self.port.drive(Lanes::default());
        }

        self.port.set_direction(Direction::Input);
    }

    pub fn strobe_read(&mut self, width: BusWidth) -> Lanes {
        self.port.set_direction(Direction::Input);
        self.port.set_line(Line::ChipEnable, Level::Low);
        self.port.set_line(Line::ReadEnable, Level::Low);
        self.settle();

        let mut lanes = self.port.sample();

        self.port.set_line(Line::ReadEnable, Level::High);
        self.port.set_line(Line::ChipEnable, Level::High);

        if width == BusWidth::Eight {
            lanes.upper = 0;
        }
        lanes
    }

    pub fn strobe_write(&mut self, lanes: Lanes, strobe: WriteStrobe) {
        self.port.set_direction(Direction::Output);
        self.port.drive(lanes);

        match strobe {
            WriteStrobe::Write => self.enabled_pulse(Line::WriteEnable),
            WriteStrobe::Lane(line) => self.enabled_pulse(line),
            WriteStrobe::Time { lane, time } => {
                self.port.set_line(lane, Level::Low);
                self.port.set_line(time, Level::Low);
                self.settle();
                self.port.set_line(time, Level::High);
                self.port.set_line(lane, Level::High);
            }
        }

        self.port.set_direction(Direction::Input);
    }

    /// `true` when a cartridge pulls the active-low detect line down.
    pub fn detect_presence(&mut self) -> bool {
        self.port.line(Line::CartDetect) == Level::Low
    }

    pub fn set_line(&mut self, line: Line, level: Level) {
        self.port.set_line(line, level);
    }

    pub fn pulse_reset(&mut self, line: Line) {
        self.port.set_line(line, Level::Low);
        self.port.delay_ms(RESET_PULSE_MS);
        self.port.set_line(line, Level::High);
    }

    pub fn millis(&mut self) -> u64 {
        self.port.millis()
    }

    /// Minimum strobe width; replaces counting instruction cycles.
    pub fn settle(&mut self) {
        self.port.delay_ns(STROBE_SETTLE_NS);
    }

    fn pulse_latch(&mut self, line: Line) {
        self.port.set_line(line, Level::High);
        self.port.set_line(line, Level::Low);
    }

    fn enabled_pulse(&mut self, strobe: Line) {
        self.port.set_line(Line::ChipEnable, Level::Low);
        self.port.set_line(strobe, Level::Low);
        self.settle();
        self.port.set_line(strobe, Level::High);
        self.port.set_line(Line::ChipEnable, Level::High);
    }
}

impl<P: Port> Bus for BusController<P> {
    fn latch_address(&mut self, address: u32, width: AddressWidth) {
        BusController::latch_address(self, address, width)
    }

    fn strobe_read(&mut self, width: BusWidth) -> Lanes {
        BusController::strobe_read(self, width)
    }

    fn strobe_write(&mut self, lanes: Lanes, strobe: WriteStrobe) {
        BusController::strobe_write(self, lanes, strobe)
    }

    fn set_line(&mut self, line: Line, level: Level) {
        BusController::set_line(self, line, level)
    }

    fn pulse_reset(&mut self, line: Line) {
        BusController::pulse_reset(self, line)
    }

    fn millis(&mut self) -> u64 {
        BusController::millis(self)
    }
}

use std::collections::HashMap;

use crate::bus::{AddressWidth, Bus, BusWidth, Lanes, Level, Line, WriteStrobe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BusOp {
    Latch(u32, AddressWidth),
    Read(u32),
    Write(u32, Lanes, WriteStrobe),
    Line(Line, Level),
    Reset(Line),
}

/// Records every transaction and serves reads from a flat map keyed by the
/// latched physical address.
#[derive(Debug, Default)]
pub(crate) struct MockBus {
    pub(crate) ops: Vec<BusOp>,
    pub(crate) mem: HashMap<u32, Lanes>,
    pub(crate) lines: HashMap<Line, Level>,
    latched: u32,
    millis: u64,
}

impl MockBus {
    pub(crate) fn writes_to(&self, address: u32) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, BusOp::Write(a, _, _) if *a == address))
            .count()
    }

    pub(crate) fn writes(&self) -> impl Iterator<Item = (u32, Lanes, WriteStrobe)> + '_ {
        self.ops.iter().filter_map(|op| match *op {
            BusOp::Write(address, lanes, strobe) => Some((address, lanes, strobe)),
            _ => None,
        })
    }

    pub(crate) fn level(&self, line: Line) -> Level {
        self.lines.get(&line).copied().unwrap_or_default()
    }
}

impl Bus for MockBus {
    fn latch_address(&mut self, address: u32, width: AddressWidth) {
        self.latched = match width {
            AddressWidth::Bits16 => (self.latched & 0xFF_0000) | (address & 0xFFFF),
            AddressWidth::Bits24 => address & 0xFF_FFFF,
        };
        self.ops.push(BusOp::Latch(address, width));
    }

    fn strobe_read(&mut self, width: BusWidth) -> Lanes {
        self.ops.push(BusOp::Read(self.latched));
        self.millis += 1;
        let mut lanes = self.mem.get(&self.latched).copied().unwrap_or(Lanes::FLOATING);
        if width == BusWidth::Eight {
            lanes.upper = 0;
        }
        lanes
    }

    fn strobe_write(&mut self, lanes: Lanes, strobe: WriteStrobe) {
        self.ops.push(BusOp::Write(self.latched, lanes, strobe));
        self.mem.insert(self.latched, lanes);
    }

    fn set_line(&mut self, line: Line, level: Level) {
        self.ops.push(BusOp::Line(line, level));
        self.lines.insert(line, level);
    }

    fn pulse_reset(&mut self, line: Line) {
        self.ops.push(BusOp::Reset(line));
    }

    fn millis(&mut self) -> u64 {
        self.millis
    }
}

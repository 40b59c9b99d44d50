use tracing::trace;

use crate::{
    bus::{Bus, Level, Line},
    translator::{Physical, Translator, TranslatorKind},
};

// RangeSwitched – ColecoVision chip selects.
//
// | Address bits 14..13 | Console window  | Line asserted |
// |---------------------|-----------------|---------------|
// | `00`                | `$8000-$9FFF`   | `/8000`       |
// | `01`                | `$A000-$BFFF`   | `/A000`       |
// | `10`                | `$C000-$DFFF`   | `/C000`       |
// | `11`                | `$E000-$FFFF`   | `/E000`       |

const RANGE_MASK: u32 = 0x6000;
const RANGE_SHIFT: u32 = 13;

#[derive(Debug, Clone)]
pub struct RangeSwitched {
    /// Chip-enable lines indexed by range.
    lines: [Line; 4],
    selected: Option<usize>,
}

impl RangeSwitched {
    pub fn new(lines: [Line; 4]) -> Self {
        Self {
            lines,
            selected: None,
        }
    }

    pub fn range_of(address: u32) -> usize {
        ((address & RANGE_MASK) >> RANGE_SHIFT) as usize
    }

    pub fn selected_line(&self) -> Option<Line> {
        self.selected.map(|range| self.lines[range])
    }

    fn select(&mut self, bus: &mut dyn Bus, range: usize) {
        match self.selected {
            Some(current) if current == range => return,
            Some(current) => bus.set_line(self.lines[current], Level::High),
            None => {
                for (index, &line) in self.lines.iter().enumerate() {
                    if index != range {
                        bus.set_line(line, Level::High);
                    }
                }
            }
        }
        trace!("chip enable range {range}");
        bus.set_line(self.lines[range], Level::Low);
        self.selected = Some(range);
    }
}

impl Translator for RangeSwitched {
    fn kind(&self) -> TranslatorKind {
        TranslatorKind::RangeSwitched
    }

    fn translate(&mut self, bus: &mut dyn Bus, address: u32) -> Physical {
        self.select(bus, Self::range_of(address));
        Physical::bits16(address)
    }

    fn invalidate(&mut self) {
        self.selected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::MockBus;

    const LINES: [Line; 4] = [Line::Ctrl(0), Line::Ctrl(1), Line::Ctrl(2), Line::Ctrl(3)];

    fn low_lines(bus: &MockBus) -> Vec<Line> {
        LINES
            .into_iter()
            .filter(|&line| bus.level(line) == Level::Low)
            .collect()
    }

    #[test]
    fn exactly_one_line_is_low() {
        let mut bus = MockBus::default();
        let mut ranged = RangeSwitched::new(LINES);

        for (address, line) in [
            (0x0000, Line::Ctrl(0)),
            (0x2AAA, Line::Ctrl(1)),
            (0x5555, Line::Ctrl(2)),
            (0x7FFF, Line::Ctrl(3)),
            (0x1234, Line::Ctrl(0)),
        ] {
            let physical = ranged.translate(&mut bus, address);
            assert_eq!(physical, Physical::bits16(address));
            assert_eq!(low_lines(&bus), vec![line]);
        }
    }

    #[test]
    fn staying_in_range_does_not_toggle_lines() {
        let mut bus = MockBus::default();
        let mut ranged = RangeSwitched::new(LINES);
        ranged.translate(&mut bus, 0x4000);
        let ops = bus.ops.len();
        ranged.translate(&mut bus, 0x5FFF);
        assert_eq!(bus.ops.len(), ops);
        assert_eq!(ranged.selected_line(), Some(Line::Ctrl(2)));
    }

    #[test]
    fn invalidate_drives_every_line_again() {
        let mut bus = MockBus::default();
        let mut ranged = RangeSwitched::new(LINES);
        ranged.translate(&mut bus, 0x0000);
        ranged.invalidate();
        bus.ops.clear();
        ranged.translate(&mut bus, 0x0000);
        assert_eq!(bus.ops.len(), 4);
        assert_eq!(low_lines(&bus), vec![Line::Ctrl(0)]);
    }
}

use tracing::debug;

use crate::{
    bus::{AddressWidth, Bus, BusWidth, Lane, Lanes, Line, WriteStrobe},
    translator::{Physical, Route, Translator, TranslatorKind},
};

// Linear – flat 24-bit addressing.
//
// | Bus     | Byte write          | Word write    | Extras                         |
// |---------|---------------------|---------------|--------------------------------|
// | 8-bit   | lower lane, `/WR`   | n/a           | None                           |
// | 16-bit  | even: lower, `/LWR` | both, `/WR`   | `/TIME` register write at `$0` |
// |         | odd: upper, `/UWR`  |               |                                |

/// Per-lane write strobes of a 16-bit cartridge slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneStrobes {
    pub lower: Line,
    pub upper: Line,
    /// `/TIME` register strobe, used for save RAM control.
    pub time: Option<Line>,
}

/// `/TIME` register values that map or unmap save RAM.
const SRAM_ENABLE: u8 = 0x03;
const SRAM_DISABLE: u8 = 0x00;

#[derive(Debug, Clone)]
pub struct Linear {
    width: BusWidth,
    strobes: Option<LaneStrobes>,
}

impl Linear {
    pub fn byte_wide() -> Self {
        Self {
            width: BusWidth::Eight,
            strobes: None,
        }
    }

    pub fn word_wide(strobes: LaneStrobes) -> Self {
        Self {
            width: BusWidth::Sixteen,
            strobes: Some(strobes),
        }
    }

    pub fn width(&self) -> BusWidth {
        self.width
    }
}

impl Translator for Linear {
    fn kind(&self) -> TranslatorKind {
        TranslatorKind::Linear
    }

    fn translate(&mut self, _bus: &mut dyn Bus, address: u32) -> Physical {
        Physical::bits24(address)
    }

    fn route_byte(&self, address: u32) -> Route {
        let Some(strobes) = self.strobes else {
            return Route::EIGHT_BIT;
        };
        match Lane::for_address(address) {
            Lane::Lower => Route {
                lane: Lane::Lower,
                strobe: WriteStrobe::Lane(strobes.lower),
            },
            Lane::Upper => Route {
                lane: Lane::Upper,
                strobe: WriteStrobe::Lane(strobes.upper),
            },
        }
    }

    fn set_sram(&mut self, bus: &mut dyn Bus, enabled: bool) -> bool {
        let Some(LaneStrobes {
            lower,
            time: Some(time),
            ..
        }) = self.strobes
        else {
            return false;
        };

        let value = if enabled { SRAM_ENABLE } else { SRAM_DISABLE };
        debug!("time register <- {value:#04x}");
        bus.latch_address(0, AddressWidth::Bits24);
        bus.strobe_write(
            Lanes::from_byte(value),
            WriteStrobe::Time { lane: lower, time },
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::{BusOp, MockBus};

    fn strobes() -> LaneStrobes {
        LaneStrobes {
            lower: Line::Ctrl(5),
            upper: Line::Ctrl(6),
            time: Some(Line::Ctrl(7)),
        }
    }

    #[test]
    fn passes_address_through_unchanged() {
        let mut bus = MockBus::default();
        let mut linear = Linear::byte_wide();
        assert_eq!(
            linear.translate(&mut bus, 0x12_3456),
            Physical::bits24(0x12_3456)
        );
        assert!(bus.ops.is_empty());
    }

    #[test]
    fn routes_odd_bytes_to_upper_lane() {
        let linear = Linear::word_wide(strobes());

        let odd = linear.route_byte(0x1001);
        assert_eq!(odd.lane, Lane::Upper);
        assert_eq!(odd.strobe, WriteStrobe::Lane(Line::Ctrl(6)));

        let even = linear.route_byte(0x1000);
        assert_eq!(even.lane, Lane::Lower);
        assert_eq!(even.strobe, WriteStrobe::Lane(Line::Ctrl(5)));
    }

    #[test]
    fn byte_wide_bus_always_uses_write_enable() {
        let linear = Linear::byte_wide();
        assert_eq!(linear.route_byte(0x1001), Route::EIGHT_BIT);
    }

    #[test]
    fn sram_control_writes_time_register() {
        let mut bus = MockBus::default();
        let mut linear = Linear::word_wide(strobes());
        assert!(linear.set_sram(&mut bus, true));

        assert_eq!(
            bus.ops.last(),
            Some(&BusOp::Write(
                0,
                Lanes::from_byte(SRAM_ENABLE),
                WriteStrobe::Time {
                    lane: Line::Ctrl(5),
                    time: Line::Ctrl(7),
                }
            ))
        );
        assert!(!Linear::byte_wide().set_sram(&mut bus, true));
    }
}

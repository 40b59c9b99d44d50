use std::str::FromStr;

use strum::{Display, EnumIter, EnumString, FromRepr, IntoStaticStr};
use tracing::info;

use crate::{
    bus::{Bus, BusWidth, CartBus, Level, Line},
    error::Error,
    flash::{CommandFamily, FlashProgrammer},
    translator::{
        Linear, MirroredBus, RangeSwitched, Translator, TranslatorKind, Windowed,
        linear::LaneStrobes,
    },
};

// Console bindings.
//
// | Console     | Bus    | Translator    | Flash family      | Reset            |
// |-------------|--------|---------------|-------------------|------------------|
// | ColecoVision| 8-bit  | RangeSwitched | SST `$5555/$2AAA` | none             |
// | Genesis     | 16-bit | Linear        | `$555/$2AA` words | CTRL4 held high  |
// | Master Sys. | 8-bit  | Windowed      | `$AAA/$555`       | CTRL4 pulse      |
// | PC Engine   | 8-bit  | MirroredBus   | `$AAA/$555`       | CTRL4 pulse      |
// | TurboGrafx  | 8-bit  | Linear        | `$AAA/$555`       | CTRL0 pulse      |

/// Chip-enable lines of the ColecoVision slot, by 8 KiB range.
const COLECO_CHIP_ENABLES: [Line; 4] = [Line::Ctrl(0), Line::Ctrl(1), Line::Ctrl(2), Line::Ctrl(3)];

/// Genesis `/LWR`, `/UWR` and `/TIME`.
const GENESIS_STROBES: LaneStrobes = LaneStrobes {
    lower: Line::Ctrl(5),
    upper: Line::Ctrl(6),
    time: Some(Line::Ctrl(7)),
};

/// Console selector. Numeric values match the host protocol's mode numbers.
#[repr(u8)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    FromRepr,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum ConsoleKind {
    #[default]
    Undefined = 0,
    Coleco = 1,
    Genesis = 2,
    Sms = 3,
    #[strum(to_string = "pce", serialize = "pcengine")]
    PcEngine = 4,
    #[strum(to_string = "tg16", serialize = "turbografx")]
    TurboGrafx16 = 5,
}

impl ConsoleKind {
    /// Numeric selector; anything out of range is [`ConsoleKind::Undefined`].
    pub fn from_selector(value: u8) -> Self {
        Self::from_repr(value).unwrap_or_default()
    }

    /// Accepts either a mode number or a console name.
    pub fn parse_selector(text: &str) -> Result<Self, Error> {
        let text = text.trim();
        if let Ok(value) = text.parse::<u8>() {
            return Ok(Self::from_selector(value));
        }
        Self::from_str(text).map_err(|_| Error::UnknownConsole(text.to_owned()))
    }
}

/// Reset wiring of a console slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetLine {
    pub line: Line,
    /// Pulse low on activation; otherwise the line is only released high.
    pub pulse: bool,
}

#[derive(Debug, Clone)]
struct Binding {
    translator: Box<dyn Translator>,
    programmer: FlashProgrammer,
}

/// Everything console-specific about a session, bound once at mode select.
///
/// The undefined console yields a profile without a binding: every operation
/// routed through it is a harmless no-op.
#[derive(Debug, Clone)]
pub struct CartridgeProfile {
    console: ConsoleKind,
    bus_width: BusWidth,
    reset: Option<ResetLine>,
    mirrored_bus: bool,
    binding: Option<Binding>,
}

impl Default for CartridgeProfile {
    fn default() -> Self {
        Self::noop()
    }
}

impl CartridgeProfile {
    pub fn noop() -> Self {
        Self {
            console: ConsoleKind::Undefined,
            bus_width: BusWidth::Eight,
            reset: None,
            mirrored_bus: false,
            binding: None,
        }
    }

    fn bound(
        console: ConsoleKind,
        bus_width: BusWidth,
        translator: Box<dyn Translator>,
        family: CommandFamily,
        reset: Option<ResetLine>,
    ) -> Self {
        let mirrored_bus = translator.kind() == TranslatorKind::MirroredBus;
        Self {
            console,
            bus_width,
            reset,
            mirrored_bus,
            binding: Some(Binding {
                translator,
                programmer: FlashProgrammer::new(family, bus_width),
            }),
        }
    }

    pub fn console(&self) -> ConsoleKind {
        self.console
    }

    pub fn bus_width(&self) -> BusWidth {
        self.bus_width
    }

    pub fn reset(&self) -> Option<ResetLine> {
        self.reset
    }

    pub fn mirrored_bus(&self) -> bool {
        self.mirrored_bus
    }

    pub fn is_noop(&self) -> bool {
        self.binding.is_none()
    }

    pub fn translator_kind(&self) -> Option<TranslatorKind> {
        self.binding.as_ref().map(|b| b.translator.kind())
    }

    pub fn family(&self) -> Option<CommandFamily> {
        self.binding.as_ref().map(|b| b.programmer.family())
    }

    /// Brings the slot into a known state: reset pulse where the console
    /// needs one, then translator-specific register setup.
    pub fn activate(&mut self, bus: &mut dyn Bus) {
        if let Some(reset) = self.reset {
            if reset.pulse {
                bus.pulse_reset(reset.line);
            } else {
                bus.set_line(reset.line, Level::High);
            }
        }
        if let Some(binding) = &mut self.binding {
            binding.translator.activate(bus);
        }
        info!(
            "profile {} active ({:?}, {:?})",
            self.console,
            self.bus_width,
            self.translator_kind()
        );
    }

    /// Bus view plus programmer for one operation; `None` for the no-op
    /// profile.
    pub fn session<'a>(&'a mut self, bus: &'a mut dyn Bus) -> Option<(CartBus<'a>, FlashProgrammer)> {
        let width = self.bus_width;
        let binding = self.binding.as_mut()?;
        let programmer = binding.programmer;
        Some((CartBus::new(bus, binding.translator.as_mut(), width), programmer))
    }
}

/// Profile registry: the single place console kinds turn into bindings.
pub fn select_profile(console: ConsoleKind) -> CartridgeProfile {
    match console {
        ConsoleKind::Undefined => CartridgeProfile::noop(),
        ConsoleKind::Coleco => CartridgeProfile::bound(
            console,
            BusWidth::Eight,
            Box::new(RangeSwitched::new(COLECO_CHIP_ENABLES)),
            CommandFamily::Sst,
            None,
        ),
        ConsoleKind::Genesis => CartridgeProfile::bound(
            console,
            BusWidth::Sixteen,
            Box::new(Linear::word_wide(GENESIS_STROBES)),
            CommandFamily::Macronix,
            Some(ResetLine {
                line: Line::Ctrl(4),
                pulse: false,
            }),
        ),
        ConsoleKind::Sms => CartridgeProfile::bound(
            console,
            BusWidth::Eight,
            Box::new(Windowed::new()),
            CommandFamily::Macronix,
            Some(ResetLine {
                line: Line::Ctrl(4),
                pulse: true,
            }),
        ),
        ConsoleKind::PcEngine => CartridgeProfile::bound(
            console,
            BusWidth::Eight,
            Box::new(MirroredBus),
            CommandFamily::Macronix,
            Some(ResetLine {
                line: Line::Ctrl(4),
                pulse: true,
            }),
        ),
        ConsoleKind::TurboGrafx16 => CartridgeProfile::bound(
            console,
            BusWidth::Eight,
            Box::new(Linear::byte_wide()),
            CommandFamily::Macronix,
            Some(ResetLine {
                line: Line::Ctrl(0),
                pulse: true,
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::bus::mock::{BusOp, MockBus};

    #[test]
    fn selectors_follow_mode_numbers() {
        assert_eq!(ConsoleKind::from_selector(1), ConsoleKind::Coleco);
        assert_eq!(ConsoleKind::from_selector(3), ConsoleKind::Sms);
        assert_eq!(ConsoleKind::from_selector(5), ConsoleKind::TurboGrafx16);
        assert_eq!(ConsoleKind::from_selector(6), ConsoleKind::Undefined);
        assert_eq!(ConsoleKind::from_selector(0xFF), ConsoleKind::Undefined);
    }

    #[test]
    fn parses_names_and_numbers() -> anyhow::Result<()> {
        assert_eq!(ConsoleKind::parse_selector("SMS")?, ConsoleKind::Sms);
        assert_eq!(ConsoleKind::parse_selector("2")?, ConsoleKind::Genesis);
        assert_eq!(ConsoleKind::parse_selector("pcengine")?, ConsoleKind::PcEngine);
        assert_eq!(ConsoleKind::parse_selector("tg16")?, ConsoleKind::TurboGrafx16);
        assert!(matches!(
            ConsoleKind::parse_selector("n64"),
            Err(Error::UnknownConsole(name)) if name == "n64"
        ));
        Ok(())
    }

    #[test]
    fn display_names_round_trip() -> anyhow::Result<()> {
        for console in ConsoleKind::iter() {
            assert_eq!(ConsoleKind::parse_selector(&console.to_string())?, console);
        }
        Ok(())
    }

    #[test]
    fn bindings_per_console() {
        let sms = select_profile(ConsoleKind::Sms);
        assert_eq!(sms.bus_width(), BusWidth::Eight);
        assert_eq!(sms.translator_kind(), Some(TranslatorKind::Windowed));
        assert_eq!(sms.family(), Some(CommandFamily::Macronix));

        let genesis = select_profile(ConsoleKind::Genesis);
        assert_eq!(genesis.bus_width(), BusWidth::Sixteen);
        assert_eq!(genesis.translator_kind(), Some(TranslatorKind::Linear));

        let coleco = select_profile(ConsoleKind::Coleco);
        assert_eq!(coleco.translator_kind(), Some(TranslatorKind::RangeSwitched));
        assert_eq!(coleco.family(), Some(CommandFamily::Sst));
        assert_eq!(coleco.reset(), None);

        let pce = select_profile(ConsoleKind::PcEngine);
        assert!(pce.mirrored_bus());
        assert!(!select_profile(ConsoleKind::TurboGrafx16).mirrored_bus());
    }

    #[test]
    fn undefined_console_is_noop() {
        let mut profile = select_profile(ConsoleKind::Undefined);
        assert!(profile.is_noop());

        let mut bus = MockBus::default();
        profile.activate(&mut bus);
        assert!(profile.session(&mut bus).is_none());
        assert!(bus.ops.is_empty());
    }

    #[test]
    fn activation_pulses_reset_where_needed() {
        let mut bus = MockBus::default();
        select_profile(ConsoleKind::TurboGrafx16).activate(&mut bus);
        assert_eq!(bus.ops, vec![BusOp::Reset(Line::Ctrl(0))]);

        let mut bus = MockBus::default();
        select_profile(ConsoleKind::Genesis).activate(&mut bus);
        assert_eq!(bus.ops, vec![BusOp::Line(Line::Ctrl(4), Level::High)]);

        let mut bus = MockBus::default();
        select_profile(ConsoleKind::Sms).activate(&mut bus);
        assert_eq!(bus.ops[0], BusOp::Reset(Line::Ctrl(4)));
        assert_eq!(bus.writes_to(0xFFFE), 1);
        assert_eq!(bus.writes_to(0xFFFF), 1);
    }
}

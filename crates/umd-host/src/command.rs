//! Text command lines accepted by the host session.
//!
//! | verb          | arguments            | reply                          |
//! |---------------|----------------------|--------------------------------|
//! | `setmode`     | `<n|name>`           | console name                   |
//! | `getid`       | `[m|d|t|s]`          | all id fields, or one          |
//! | `erase`       | `[w]`                | `ok`, or `.`/`!` progress      |
//! | `sectorerase` | `<addr> [w]`         | `ok`, or `.`/`!` progress      |
//! | `prgbyte`     | `<addr> <value>`     | `ok`                           |
//! | `prgword`     | `<addr> <value>`     | `ok`                           |
//! | `rdbyte`      | `<addr>`             | hex byte                       |
//! | `rdword`      | `<addr>`             | hex word                       |
//! | `rdbblk`      | `<addr> <len>`       | hex dump, `len` bytes          |
//! | `rdwblk`      | `<addr> <len>`       | hex dump, `len` words          |
//! | `wrbyte`      | `<addr> <value>`     | `ok`                           |
//! | `wrword`      | `<addr> <value>`     | `ok`                           |
//! | `sram`        | `on|off`             | `ok`                           |
//! | `detect`      |                      | `present` / `absent`           |
//! | `romsize`     |                      | hex size                       |
//! | `checksum`    |                      | expected, calculated, verdict  |

use std::{io, str::FromStr};

use strum::EnumString;
use thiserror::Error;
use umd_core::profile::ConsoleKind;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    UnknownVerb(String),

    #[error("missing argument <{name}> for `{verb}`")]
    MissingArgument {
        verb: &'static str,
        name: &'static str,
    },

    #[error("unexpected argument `{0}`")]
    UnexpectedArgument(String),

    #[error("invalid number `{0}`")]
    BadNumber(String),

    #[error("{value:#x} does not fit in {bits} bits")]
    TooWide { value: u32, bits: u32 },

    #[error("{0}")]
    Unsupported(&'static str),

    #[error("flash still busy after {0}ms")]
    Timeout(u64),

    #[error(transparent)]
    Core(#[from] umd_core::error::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Single field selector of `getid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
pub enum IdField {
    #[strum(serialize = "m")]
    Manufacturer,
    #[strum(serialize = "d")]
    Device,
    #[strum(serialize = "t")]
    Kind,
    #[strum(serialize = "s")]
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetMode(ConsoleKind),
    GetId(Option<IdField>),
    Erase { wait: bool },
    SectorErase { address: u32, wait: bool },
    ProgramByte { address: u32, value: u8 },
    ProgramWord { address: u32, value: u16 },
    ReadByte(u32),
    ReadWord(u32),
    ReadByteBlock { address: u32, len: usize },
    ReadWordBlock { address: u32, len: usize },
    WriteByte { address: u32, value: u8 },
    WriteWord { address: u32, value: u16 },
    Sram(bool),
    Detect,
    RomSize,
    Checksum,
}

/// Decimal or `0x`-prefixed hexadecimal.
pub fn parse_number(text: &str) -> Result<u32, CommandError> {
    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| CommandError::BadNumber(text.to_owned()))
}

struct Args<'a> {
    verb: &'static str,
    words: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn optional(&mut self) -> Option<&'a str> {
        self.words.next()
    }

    fn required(&mut self, name: &'static str) -> Result<&'a str, CommandError> {
        self.words.next().ok_or(CommandError::MissingArgument {
            verb: self.verb,
            name,
        })
    }

    fn number(&mut self, name: &'static str) -> Result<u32, CommandError> {
        parse_number(self.required(name)?)
    }

    fn byte(&mut self, name: &'static str) -> Result<u8, CommandError> {
        let value = self.number(name)?;
        u8::try_from(value).map_err(|_| CommandError::TooWide { value, bits: 8 })
    }

    fn word(&mut self, name: &'static str) -> Result<u16, CommandError> {
        let value = self.number(name)?;
        u16::try_from(value).map_err(|_| CommandError::TooWide { value, bits: 16 })
    }

    fn wait_flag(&mut self) -> Result<bool, CommandError> {
        match self.optional() {
            None => Ok(false),
            Some("w") => Ok(true),
            Some(other) => Err(CommandError::UnexpectedArgument(other.to_owned())),
        }
    }

    fn finish(mut self, command: Command) -> Result<Command, CommandError> {
        match self.words.next() {
            Some(extra) => Err(CommandError::UnexpectedArgument(extra.to_owned())),
            None => Ok(command),
        }
    }
}

const VERBS: [&str; 16] = [
    "setmode",
    "getid",
    "erase",
    "sectorerase",
    "prgbyte",
    "prgword",
    "rdbyte",
    "rdword",
    "rdbblk",
    "rdwblk",
    "wrbyte",
    "wrword",
    "sram",
    "detect",
    "romsize",
    "checksum",
];

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let first = words.next().unwrap_or_default();
        let verb = VERBS
            .iter()
            .find(|verb| verb.eq_ignore_ascii_case(first))
            .ok_or_else(|| CommandError::UnknownVerb(first.to_owned()))?;
        let mut args = Args { verb: *verb, words };

        let command = match *verb {
            "setmode" => Command::SetMode(ConsoleKind::parse_selector(args.required("mode")?)?),
            "getid" => match args.optional() {
                None => Command::GetId(None),
                Some(field) => Command::GetId(Some(
                    IdField::from_str(field)
                        .map_err(|_| CommandError::UnexpectedArgument(field.to_owned()))?,
                )),
            },
            "erase" => Command::Erase {
                wait: args.wait_flag()?,
            },
            "sectorerase" => Command::SectorErase {
                address: args.number("address")?,
                wait: args.wait_flag()?,
            },
            "prgbyte" => Command::ProgramByte {
                address: args.number("address")?,
                value: args.byte("value")?,
            },
            "prgword" => Command::ProgramWord {
                address: args.number("address")?,
                value: args.word("value")?,
            },
            "rdbyte" => Command::ReadByte(args.number("address")?),
            "rdword" => Command::ReadWord(args.number("address")?),
            "rdbblk" => Command::ReadByteBlock {
                address: args.number("address")?,
                len: args.number("len")? as usize,
            },
            "rdwblk" => Command::ReadWordBlock {
                address: args.number("address")?,
                len: args.number("len")? as usize,
            },
            "wrbyte" => Command::WriteByte {
                address: args.number("address")?,
                value: args.byte("value")?,
            },
            "wrword" => Command::WriteWord {
                address: args.number("address")?,
                value: args.word("value")?,
            },
            "sram" => match args.required("on|off")? {
                "on" => Command::Sram(true),
                "off" => Command::Sram(false),
                other => return Err(CommandError::UnexpectedArgument(other.to_owned())),
            },
            "detect" => Command::Detect,
            "romsize" => Command::RomSize,
            _ => Command::Checksum,
        };
        args.finish(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_accept_hex_and_decimal() {
        assert_eq!(parse_number("0x10000").ok(), Some(0x1_0000));
        assert_eq!(parse_number("0XfF").ok(), Some(0xFF));
        assert_eq!(parse_number("42").ok(), Some(42));
        assert!(matches!(parse_number("0xZZ"), Err(CommandError::BadNumber(text)) if text == "0xZZ"));
    }

    #[test]
    fn parses_verbs() -> anyhow::Result<()> {
        assert_eq!(
            "setmode 3".parse::<Command>()?,
            Command::SetMode(ConsoleKind::Sms)
        );
        assert_eq!(
            "SETMODE genesis".parse::<Command>()?,
            Command::SetMode(ConsoleKind::Genesis)
        );
        assert_eq!("getid d".parse::<Command>()?, Command::GetId(Some(IdField::Device)));
        assert_eq!("erase w".parse::<Command>()?, Command::Erase { wait: true });
        assert_eq!(
            "prgbyte 0x10000 0x42".parse::<Command>()?,
            Command::ProgramByte {
                address: 0x1_0000,
                value: 0x42
            }
        );
        assert_eq!(
            "rdwblk 0x200 16".parse::<Command>()?,
            Command::ReadWordBlock {
                address: 0x200,
                len: 16
            }
        );
        assert_eq!("sram off".parse::<Command>()?, Command::Sram(false));
        Ok(())
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(matches!(
            "dump 0".parse::<Command>(),
            Err(CommandError::UnknownVerb(verb)) if verb == "dump"
        ));
        assert!(matches!(
            "rdbyte".parse::<Command>(),
            Err(CommandError::MissingArgument {
                verb: "rdbyte",
                name: "address"
            })
        ));
        assert!(matches!(
            "prgbyte 0 0x100".parse::<Command>(),
            Err(CommandError::TooWide {
                value: 0x100,
                bits: 8
            })
        ));
        assert!(matches!(
            "detect now".parse::<Command>(),
            Err(CommandError::UnexpectedArgument(arg)) if arg == "now"
        ));
        assert!(matches!(
            "setmode n64".parse::<Command>(),
            Err(CommandError::Core(_))
        ));
    }
}

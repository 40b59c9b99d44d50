use std::io::{self, BufRead, Write};

use tracing::{debug, warn};
use umd_core::{
    Umd,
    bus::Port,
    error::Error,
    flash::programmer::{ERASE_SETTLE_READS, NullProgress, PROGRAM_SETTLE_READS, Progress},
};

use crate::command::{Command, CommandError, IdField};

/// Bytes per hex dump line.
const DUMP_WIDTH: usize = 16;

/// Prints `.` per erase progress tick and `!` on completion.
struct TextProgress<'a> {
    out: &'a mut dyn Write,
    error: Option<io::Error>,
}

impl<'a> TextProgress<'a> {
    fn new(out: &'a mut dyn Write) -> Self {
        Self { out, error: None }
    }

    fn emit(&mut self, mark: &[u8]) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.out.write_all(mark).and_then(|()| self.out.flush()) {
            self.error = Some(err);
        }
    }

    fn finish(self) -> io::Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => writeln!(self.out),
        }
    }
}

impl Progress for TextProgress<'_> {
    fn tick(&mut self) {
        self.emit(b".");
    }

    fn done(&mut self) {
        self.emit(b"!");
    }
}

/// Executes command lines against one [`Umd`].
#[derive(Debug)]
pub struct Session<P> {
    umd: Umd<P>,
    /// Bound on every completion wait; `None` waits as long as the chip
    /// stays busy.
    poll_deadline_ms: Option<u64>,
}

impl<P: Port> Session<P> {
    pub fn new(umd: Umd<P>) -> Self {
        Self {
            umd,
            poll_deadline_ms: None,
        }
    }

    pub fn with_poll_deadline(mut self, deadline_ms: Option<u64>) -> Self {
        self.poll_deadline_ms = deadline_ms;
        self
    }

    pub fn umd(&self) -> &Umd<P> {
        &self.umd
    }

    pub fn umd_mut(&mut self) -> &mut Umd<P> {
        &mut self.umd
    }

    /// Runs every line of `input`. Blank lines and `#` comments are skipped;
    /// a failing line is reported as `error: <message>` and the session goes
    /// on. Only output failures end the run.
    pub fn run(&mut self, input: impl BufRead, out: &mut impl Write) -> io::Result<()> {
        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            debug!("> {line}");

            let result = line
                .parse::<Command>()
                .and_then(|command| self.execute(command, &mut *out));
            match result {
                Ok(()) => {}
                Err(CommandError::Io(err)) => return Err(err),
                Err(err) => {
                    warn!("`{line}` failed: {err}");
                    writeln!(out, "error: {err}")?;
                }
            }
            out.flush()?;
        }
        Ok(())
    }

    pub fn execute(&mut self, command: Command, out: &mut dyn Write) -> Result<(), CommandError> {
        match command {
            Command::SetMode(console) => {
                self.umd.select_profile(console);
                writeln!(out, "{console}")?;
            }
            Command::GetId(field) => {
                let id = self.umd.identify();
                match field {
                    None => writeln!(
                        out,
                        "manufacturer={:#04x} device={:#04x} type={:#04x} size={:#x}",
                        id.manufacturer, id.device, id.kind, id.size
                    )?,
                    Some(IdField::Manufacturer) => writeln!(out, "{:#04x}", id.manufacturer)?,
                    Some(IdField::Device) => writeln!(out, "{:#04x}", id.device)?,
                    Some(IdField::Kind) => writeln!(out, "{:#04x}", id.kind)?,
                    Some(IdField::Size) => writeln!(out, "{:#x}", id.size)?,
                }
            }
            Command::Erase { wait } => {
                self.erase(out, wait, |umd, wait, progress| umd.erase_chip(wait, progress))?;
            }
            Command::SectorErase { address, wait } => {
                self.erase(out, wait, |umd, wait, progress| {
                    umd.erase_sector(address, wait, progress)
                })?;
            }
            Command::ProgramByte { address, value } => {
                self.program(|umd, wait| umd.program_byte(address, value, wait))?;
                writeln!(out, "ok")?;
            }
            Command::ProgramWord { address, value } => {
                self.program(|umd, wait| umd.program_word(address, value, wait))?;
                writeln!(out, "ok")?;
            }
            Command::ReadByte(address) => writeln!(out, "{:#04x}", self.umd.read_byte(address))?,
            Command::ReadWord(address) => writeln!(out, "{:#06x}", self.umd.read_word(address))?,
            Command::ReadByteBlock { address, len } => {
                Error::check_span(address, len)?;
                let mut buf = vec![0u8; len];
                self.umd.read_block(address, &mut buf)?;
                for (index, chunk) in buf.chunks(DUMP_WIDTH).enumerate() {
                    let bytes: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
                    let offset = address as usize + index * DUMP_WIDTH;
                    writeln!(out, "{offset:06x}: {}", bytes.join(" "))?;
                }
            }
            Command::ReadWordBlock { address, len } => {
                Error::check_span(address, len.saturating_mul(2))?;
                let mut buf = vec![0u16; len];
                self.umd.read_word_block(address, &mut buf)?;
                for (index, chunk) in buf.chunks(DUMP_WIDTH / 2).enumerate() {
                    let words: Vec<String> = chunk.iter().map(|w| format!("{w:04x}")).collect();
                    let offset = address as usize + index * DUMP_WIDTH;
                    writeln!(out, "{offset:06x}: {}", words.join(" "))?;
                }
            }
            Command::WriteByte { address, value } => {
                self.umd.write_byte(address, value);
                writeln!(out, "ok")?;
            }
            Command::WriteWord { address, value } => {
                self.umd.write_word(address, value);
                writeln!(out, "ok")?;
            }
            Command::Sram(enabled) => {
                let supported = if enabled {
                    self.umd.enable_sram()
                } else {
                    self.umd.disable_sram()
                };
                if !supported {
                    return Err(CommandError::Unsupported(
                        "no save RAM control for this console",
                    ));
                }
                writeln!(out, "ok")?;
            }
            Command::Detect => {
                let state = if self.umd.detect_cartridge() {
                    "present"
                } else {
                    "absent"
                };
                writeln!(out, "{state}")?;
            }
            Command::RomSize => {
                let size = self
                    .umd
                    .rom_size()
                    .ok_or(CommandError::Unsupported("no ROM header for this console"))?;
                writeln!(out, "{size:#x}")?;
            }
            Command::Checksum => {
                let checksum = self
                    .umd
                    .checksum()
                    .ok_or(CommandError::Unsupported("no ROM header for this console"))?;
                let verdict = if checksum.is_valid() { "ok" } else { "bad" };
                writeln!(
                    out,
                    "expected={:#06x} calculated={:#06x} size={:#x} {verdict}",
                    checksum.expected, checksum.calculated, checksum.rom_size
                )?;
            }
        }
        Ok(())
    }

    /// Starts an erase. `wait` streams progress marks; with a poll deadline
    /// the completion wait is bounded instead.
    fn erase(
        &mut self,
        out: &mut dyn Write,
        wait: bool,
        start: impl FnOnce(&mut Umd<P>, bool, &mut dyn Progress),
    ) -> Result<(), CommandError> {
        if !wait {
            start(&mut self.umd, false, &mut NullProgress);
            writeln!(out, "ok")?;
            return Ok(());
        }

        match self.poll_deadline_ms {
            None => {
                let mut progress = TextProgress::new(out);
                start(&mut self.umd, true, &mut progress);
                progress.finish()?;
            }
            Some(deadline) => {
                start(&mut self.umd, false, &mut NullProgress);
                if !self.umd.wait_ready(ERASE_SETTLE_READS, deadline) {
                    return Err(CommandError::Timeout(deadline));
                }
                writeln!(out, "!")?;
            }
        }
        Ok(())
    }

    fn program(&mut self, start: impl FnOnce(&mut Umd<P>, bool)) -> Result<(), CommandError> {
        match self.poll_deadline_ms {
            None => start(&mut self.umd, true),
            Some(deadline) => {
                start(&mut self.umd, false);
                if !self.umd.wait_ready(PROGRAM_SETTLE_READS, deadline) {
                    return Err(CommandError::Timeout(deadline));
                }
            }
        }
        Ok(())
    }
}

use anyhow::Result;
use ctor::ctor;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use umd_core::{
    Umd,
    profile::ConsoleKind,
    sim::{FlashTiming, SimConfig, SimPort},
};
use umd_host::Session;

const FAST_TIMING: FlashTiming = FlashTiming {
    program_ns: 2_000,
    sector_erase_ns: 400_000,
    chip_erase_ns: 2_000_000,
};

#[ctor]
fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_file(true)
        .with_line_number(true)
        .with_max_level(Level::DEBUG)
        .pretty()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn session(config: SimConfig) -> Session<SimPort> {
    Session::new(Umd::new(SimPort::new(config)))
}

fn run(session: &mut Session<SimPort>, script: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    session.run(script.as_bytes(), &mut out)?;
    Ok(String::from_utf8(out)?.lines().map(str::to_owned).collect())
}

#[test]
fn sms_program_and_read_back() -> Result<()> {
    let mut session = session(SimConfig::for_console(ConsoleKind::Sms).with_timing(FAST_TIMING));
    let lines = run(
        &mut session,
        "\
# erase, program one far byte, read it back
setmode sms
erase w
prgbyte 0x10000 0x42
rdbyte 0x10000
getid m
getid s
",
    )?;
    assert_eq!(lines, ["sms", "!", "ok", "0x42", "0xc2", "0x100000"]);
    Ok(())
}

#[test]
fn errors_do_not_end_the_session() -> Result<()> {
    let mut session = session(SimConfig::for_console(ConsoleKind::Genesis));
    let lines = run(
        &mut session,
        "setmode 2\nbogus 1\nrdbyte\nprgword 0x100 0x12345\nsram maybe\ndetect\n",
    )?;
    assert_eq!(lines, [
        "genesis",
        "error: unknown command `bogus`",
        "error: missing argument <address> for `rdbyte`",
        "error: 0x12345 does not fit in 16 bits",
        "error: unexpected argument `maybe`",
        "present",
    ]);
    Ok(())
}

#[test]
fn erase_with_wait_prints_progress() -> Result<()> {
    let mut session = session(SimConfig::for_console(ConsoleKind::TurboGrafx16));
    let lines = run(&mut session, "setmode tg16\nerase w\n")?;
    assert_eq!(lines[0], "tg16");
    assert!(lines[1].starts_with('.'));
    assert!(lines[1].ends_with('!'));
    assert!(lines[1].trim_end_matches('!').chars().all(|c| c == '.'));
    Ok(())
}

#[test]
fn poll_deadline_bounds_erase() -> Result<()> {
    let mut session =
        session(SimConfig::for_console(ConsoleKind::TurboGrafx16)).with_poll_deadline(Some(5));
    let lines = run(&mut session, "setmode 5\nerase w\n")?;
    assert_eq!(lines, ["tg16", "error: flash still busy after 5ms"]);
    Ok(())
}

#[test]
fn genesis_words_and_dump() -> Result<()> {
    let mut session =
        session(SimConfig::for_console(ConsoleKind::Genesis).with_timing(FAST_TIMING));
    let lines = run(
        &mut session,
        "setmode genesis\nprgword 0x200 0x4e71\nrdword 0x200\nrdwblk 0x200 2\nrdbblk 0x200 3\n",
    )?;
    assert_eq!(lines, [
        "genesis",
        "ok",
        "0x4e71",
        "000200: 4e71 ffff",
        "000200: 4e 71 ff",
    ]);
    Ok(())
}

#[test]
fn sms_words_and_out_of_range_spans() -> Result<()> {
    let mut session = session(SimConfig::for_console(ConsoleKind::Sms).with_timing(FAST_TIMING));
    let lines = run(
        &mut session,
        "\
setmode sms
prgword 0x10100 0x1234
rdword 0x10100
rdword 0xffffffff
rdbblk 0 0xffffffff
rdbyte 0x10101
",
    )?;
    assert_eq!(lines, [
        "sms",
        "ok",
        "0x1234",
        "0xffff",
        "error: 4294967295 bytes at 0x000000 run past the 24-bit address space",
        "0x34",
    ]);
    Ok(())
}

#[test]
fn save_ram_and_headers_per_console() -> Result<()> {
    let mut pce = session(SimConfig::for_console(ConsoleKind::PcEngine));
    let lines = run(&mut pce, "setmode pce\nsram on\nromsize\n")?;
    assert_eq!(lines, [
        "pce",
        "error: no save RAM control for this console",
        "error: no ROM header for this console",
    ]);

    let mut sms = session(SimConfig::for_console(ConsoleKind::Sms));
    let lines = run(
        &mut sms,
        "setmode sms\nsram on\nwrbyte 0x8000 0x5a\nrdbyte 0x8000\nsram off\nromsize\n",
    )?;
    // blank header: size code 0xF
    assert_eq!(lines, ["sms", "ok", "ok", "0x5a", "ok", "0x20000"]);
    Ok(())
}

#[test]
fn undefined_mode_is_harmless() -> Result<()> {
    let mut session = session(SimConfig::default().with_present(false));
    let lines = run(&mut session, "setmode 9\nrdbyte 0\ngetid\ndetect\n")?;
    assert_eq!(lines, [
        "undefined",
        "0x00",
        "manufacturer=0x00 device=0x00 type=0x00 size=0x0",
        "absent",
    ]);
    assert!(session.umd().port().events().is_empty());
    Ok(())
}

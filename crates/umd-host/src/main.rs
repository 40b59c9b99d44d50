use std::{
    fs::File,
    io::{self, BufReader},
    path::PathBuf,
};

use anyhow::Context;
use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;
use umd_core::{
    Umd,
    profile::ConsoleKind,
    sim::{SimConfig, SimPort},
};
use umd_host::Session;

/// Cartridge flash programmer front end
#[derive(Parser, Debug)]
#[command(name = "umd-host")]
#[command(about = "Reads and programs flash cartridges over a line-oriented command set", long_about = None)]
struct Args {
    /// Console profile to select before the first command (name or mode number)
    #[arg(short, long)]
    console: Option<String>,

    /// Read commands from this file instead of stdin
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Raw flash contents to preload into the simulated cartridge
    #[arg(long)]
    image: Option<PathBuf>,

    /// Simulate an empty slot
    #[arg(long)]
    no_cartridge: bool,

    /// Give up on a busy flash chip after this many milliseconds
    #[arg(long)]
    poll_deadline_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Replies go to stdout, logs to stderr.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let console = args
        .console
        .as_deref()
        .map(ConsoleKind::parse_selector)
        .transpose()?
        .unwrap_or_default();

    let config = SimConfig::for_console(console).with_present(!args.no_cartridge);
    let mut port = SimPort::new(config);
    if let Some(path) = &args.image {
        let image =
            std::fs::read(path).with_context(|| format!("reading image {}", path.display()))?;
        info!("preloading {} bytes from {}", image.len(), path.display());
        port.flash_mut().load(0, &image);
    }

    let mut umd = Umd::new(port);
    if console != ConsoleKind::Undefined {
        umd.select_profile(console);
    }
    let mut session = Session::new(umd).with_poll_deadline(args.poll_deadline_ms);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match &args.script {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("opening script {}", path.display()))?;
            session.run(BufReader::new(file), &mut out)?;
        }
        None => session.run(io::stdin().lock(), &mut out)?,
    }

    Ok(())
}

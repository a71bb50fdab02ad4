use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use pdfdeck::clock::SystemClock;
use pdfdeck::deck::DeckSource;
use pdfdeck::deck::image_dir::ImageDirSource;
use pdfdeck::display::TerminalDisplay;
use pdfdeck::navigation::CountdownMode;
use pdfdeck::panic_handler::initialize_panic_handler;
use pdfdeck::settings::load_settings;
use pdfdeck::{Coordinator, ShowConfig, ShowError};

/// Present a PDF (or a folder of images) with an audience view and a
/// presenter console side by side.
#[derive(Parser, Debug)]
#[command(name = "pdfdeck", version, about)]
struct Cli {
    /// A .pdf file, or a directory of PNG/JPEG/GIF/WebP slides
    path: PathBuf,

    /// Only show the first N pages
    #[arg(long, value_name = "N")]
    pages: Option<usize>,

    /// Start a countdown of this many minutes with the show
    #[arg(long, value_name = "MINUTES")]
    countdown: Option<f64>,

    /// Count elapsed time up instead of down
    #[arg(long)]
    count_up: bool,

    /// Dissolve length in milliseconds (0 disables the dissolve)
    #[arg(long, value_name = "MS")]
    dissolve_ms: Option<u64>,

    /// Settings file (default: <config dir>/pdfdeck/config.yaml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Where to write the log
    #[arg(long, value_name = "FILE", default_value = "pdfdeck.log")]
    log_file: PathBuf,

    /// Log at debug level
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("pdfdeck: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("cannot create log file {}", cli.log_file.display()))?,
    )?;
    info!("Starting pdfdeck on {}", cli.path.display());

    let settings = load_settings(cli.config.as_deref());
    let mut config = ShowConfig::from_settings(&settings);
    config.page_limit = cli.pages;
    if let Some(ms) = cli.dissolve_ms {
        config.dissolve = Duration::from_millis(ms);
    }
    if cli.count_up {
        config.countdown_mode = CountdownMode::Up;
    }
    if let Some(minutes) = cli.countdown {
        if !minutes.is_finite() || minutes <= 0.0 {
            anyhow::bail!("--countdown must be a positive number of minutes");
        }
        config.countdown = Some(Duration::from_secs_f64(minutes * 60.0));
    }

    let source = open_source(&cli.path)?;
    // Fail on an unreadable document before the terminal is taken over.
    source.describe()?;

    initialize_panic_handler();
    let display = TerminalDisplay::new()?;
    let mut show = Coordinator::new(display, SystemClock, source, config)?;
    show.run();

    info!("Shutting down pdfdeck");
    Ok(())
}

fn open_source(path: &Path) -> Result<Arc<dyn DeckSource>, ShowError> {
    if path.is_dir() {
        return Ok(Arc::new(ImageDirSource::open(path)?));
    }
    if !path.is_file() {
        return Err(ShowError::load(path, "no such file or directory"));
    }
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(ShowError::load(path, "expected a .pdf file or an image directory"));
    }
    open_pdf(path)
}

#[cfg(feature = "pdf")]
fn open_pdf(path: &Path) -> Result<Arc<dyn DeckSource>, ShowError> {
    Ok(Arc::new(pdfdeck::deck::pdf_source::MupdfSource::new(path)))
}

#[cfg(not(feature = "pdf"))]
fn open_pdf(path: &Path) -> Result<Arc<dyn DeckSource>, ShowError> {
    Err(ShowError::load(
        path,
        "this build has no PDF support (rebuild with --features pdf)",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_build_opens_pdf_paths() {
        assert!(cfg!(feature = "pdf"), "PDF support should be a default feature");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talk.pdf");
        std::fs::write(&path, b"%PDF-1.4\n").unwrap();
        assert!(open_source(&path).is_ok());
    }

    #[test]
    fn other_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();
        assert!(open_source(&path).is_err());
    }
}

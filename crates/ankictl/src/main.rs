//! Command line tool for adding cards to AnkiWeb.
//!
//! Reads one card per line from stdin, skips cards whose front already
//! exists in the collection and adds the rest to a deck.
//!
//! ```text
//! printf 'hola\thello\nadios\tgoodbye\n' | ankictl --add Spanish
//! ```

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use ankiweb::ingest::{DEFAULT_STOP_STREAK, Ingest, IngestOptions};
use ankiweb::{AnkiWebClient, CookieJar, InputFormat};
use clap::Parser;
use tokio::io::BufReader;
use tracing::{debug, error, info};

use crate::config::Config;

// ============================================================================
// CLI Arguments
// ============================================================================

/// AnkiWeb command line interface.
#[derive(Parser, Debug)]
#[command(name = "ankictl")]
#[command(version, about, long_about = None)]
struct Args {
    /// Add cards into this deck
    #[arg(short = 'A', long = "add", value_name = "DECK")]
    deck: String,

    /// Format of input lines: text (front<TAB>back) or json (["front", "back"])
    #[arg(short, long, default_value = "text")]
    format: InputFormat,

    /// Configuration file [default: $HOME/.config/anki/anki.conf]
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// File for storing session cookies [default: $HOME/.cache/anki/anki.cookies]
    #[arg(short = 'k', long, value_name = "PATH")]
    cookies: Option<PathBuf>,

    /// Stop after a streak of this many cards that already exist (0 never stops)
    #[arg(long, value_name = "N", default_value_t = DEFAULT_STOP_STREAK)]
    stop_streak: usize,

    /// Enable verbose logging (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| home().join(".config").join("anki").join("anki.conf"))
    }

    fn cookies_path(&self) -> PathBuf {
        self.cookies
            .clone()
            .unwrap_or_else(|| home().join(".cache").join("anki").join("anki.cookies"))
    }
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match run(&args).await {
        Ok(added) => {
            println!("{} new words", added);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "ankictl failed");
            eprintln!("ankictl: {}", error_chain(e.as_ref()));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<usize, Box<dyn std::error::Error>> {
    let config_path = args.config_path();
    let cookies_path = args.cookies_path();

    let config = Config::load(&config_path)?;
    debug!(path = %config_path.display(), "Loaded config");

    let mut client = AnkiWebClient::builder()
        .cookies(CookieJar::load(&cookies_path)?)
        .build()?;

    client.account().login(&config.email, &config.password).await?;

    let options = IngestOptions::new(&args.deck)
        .format(args.format)
        .stop_streak(args.stop_streak);
    info!(deck = %options.deck, format = %options.format, "Reading cards from stdin");

    let report = Ingest::new(&mut client, options)
        .run(BufReader::new(tokio::io::stdin()))
        .await?;

    client.save_cookies(&cookies_path)?;

    Ok(report.added)
}

/// Render an error and its sources as `outer: inner: ...`.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

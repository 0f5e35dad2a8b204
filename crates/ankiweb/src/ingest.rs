//! Line-by-line card ingestion with duplicate detection.
//!
//! Each line is searched before it is added, one record at a time. A run of
//! consecutive duplicates means the rest of the input was most likely added
//! by an earlier run, so ingestion stops once the streak reaches the
//! threshold.
//!
//! # Example
//!
//! ```no_run
//! use ankiweb::AnkiWebClient;
//! use ankiweb::ingest::{Ingest, IngestOptions};
//!
//! # async fn example() -> ankiweb::Result<()> {
//! let mut client = AnkiWebClient::new()?;
//! client.account().login("me@example.com", "hunter2").await?;
//!
//! let input: &[u8] = b"hola\thello\nadios\tgoodbye\n";
//! let report = Ingest::new(&mut client, IngestOptions::new("Spanish"))
//!     .run(input)
//!     .await?;
//! println!("{} new words", report.added);
//! # Ok(())
//! # }
//! ```

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::client::AnkiWebClient;
use crate::error::{Error, Result};
use crate::types::{Card, InputFormat};

/// Default duplicate streak that ends a run.
pub const DEFAULT_STOP_STREAK: usize = 10;

/// Where cards are looked up and added.
///
/// Implemented by [`AnkiWebClient`]; tests substitute an in-memory store.
#[allow(async_fn_in_trait)]
pub trait CardStore {
    /// Whether a card with this front text already exists.
    async fn exists(&mut self, front: &str) -> Result<bool>;

    /// Add a new card to `deck`.
    async fn add(&mut self, deck: &str, card: &Card) -> Result<()>;
}

impl CardStore for AnkiWebClient {
    async fn exists(&mut self, front: &str) -> Result<bool> {
        self.cards().search(front).await
    }

    async fn add(&mut self, deck: &str, card: &Card) -> Result<()> {
        self.cards().add(deck, &card.front, &card.back).await
    }
}

/// Settings for one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// Target deck name.
    pub deck: String,
    /// Encoding of input lines.
    pub format: InputFormat,
    /// Consecutive duplicates that end the run; `0` never stops early.
    pub stop_streak: usize,
}

impl IngestOptions {
    /// Options for `deck` with text input and the default streak.
    pub fn new(deck: impl Into<String>) -> Self {
        Self {
            deck: deck.into(),
            format: InputFormat::Text,
            stop_streak: DEFAULT_STOP_STREAK,
        }
    }

    /// Set the input format.
    pub fn format(mut self, format: InputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the duplicate streak threshold.
    pub fn stop_streak(mut self, streak: usize) -> Self {
        self.stop_streak = streak;
        self
    }
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Cards newly added.
    pub added: usize,
    /// Lines whose front text already existed.
    pub duplicates: usize,
    /// Consecutive duplicates at the end of the run.
    pub streak: usize,
    /// Whether the duplicate streak ended the run before the input did.
    pub stopped_early: bool,
}

/// Ingestion loop over a [`CardStore`].
#[derive(Debug)]
pub struct Ingest<'a, S> {
    store: &'a mut S,
    options: IngestOptions,
}

impl<'a, S: CardStore> Ingest<'a, S> {
    /// Create a loop feeding `store`.
    pub fn new(store: &'a mut S, options: IngestOptions) -> Self {
        Self { store, options }
    }

    /// Consume `input` line by line.
    ///
    /// Empty lines are skipped. Any unparsable line, search failure or add
    /// failure aborts the run with the error.
    pub async fn run<R>(self, input: R) -> Result<IngestReport>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut report = IngestReport::default();
        let mut lines = input.lines();
        let mut number = 0;

        loop {
            number += 1;
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    return Err(Error::InvalidRecord {
                        line: number,
                        reason: e.to_string(),
                    });
                }
            };
            if line.is_empty() {
                continue;
            }

            let card = Card::parse(&line, self.options.format).map_err(|reason| {
                Error::InvalidRecord {
                    line: number,
                    reason,
                }
            })?;

            if self.store.exists(&card.front).await? {
                debug!(front = %card.front, "Already exists");
                report.duplicates += 1;
                report.streak += 1;

                if self.options.stop_streak > 0 && report.streak >= self.options.stop_streak {
                    debug!(streak = report.streak, "Got streak of existing words, stopping");
                    report.stopped_early = true;
                    break;
                }
                continue;
            }

            report.streak = 0;
            debug!(front = %card.front, back = %card.back, "Adding");
            self.store.add(&self.options.deck, &card).await?;
            report.added += 1;
        }

        info!(
            added = report.added,
            duplicates = report.duplicates,
            stopped_early = report.stopped_early,
            "Ingestion finished"
        );
        Ok(report)
    }
}

//! Duplicate search and card submission.
//!
//! # Example
//!
//! ```no_run
//! use ankiweb::AnkiWebClient;
//!
//! # async fn example() -> ankiweb::Result<()> {
//! let mut client = AnkiWebClient::new()?;
//! client.account().login("me@example.com", "hunter2").await?;
//!
//! if !client.cards().search("hola").await? {
//!     client.cards().add("Spanish", "hola", "hello").await?;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Serialize;
use tracing::debug;

use crate::client::{AnkiWebClient, DEFAULT_MODEL_ID, Request};
use crate::error::Result;

/// One search result row; the capture is the front text of the card.
static SEARCH_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<td>\s*([^/<]+)").expect("search item pattern"));

/// Provides access to card search and add operations.
///
/// Obtained via [`AnkiWebClient::cards()`].
#[derive(Debug)]
pub struct CardActions<'a> {
    pub(crate) client: &'a mut AnkiWebClient,
}

#[derive(Debug, Serialize)]
struct SearchForm<'a> {
    keyword: &'a str,
    submitted: u8,
}

#[derive(Debug, Serialize)]
struct AddForm<'a> {
    csrf_token: &'a str,
    mid: &'a str,
    deck: &'a str,
    data: String,
}

impl CardActions<'_> {
    /// Check whether a card with exactly this front text exists.
    ///
    /// Comparison is on the trimmed text of each result row, so `"word"`
    /// does not match a card `"wordsmith"`.
    pub async fn search(&mut self, query: &str) -> Result<bool> {
        let url = self.client.endpoints.search.clone();
        let form = SearchForm {
            keyword: query,
            submitted: 1,
        };

        let reply = self
            .client
            .execute_with_backoff(&Request::post(&url, &form).referer(&url).ajax())
            .await?;
        reply.ensure_ok()?;

        let found = search_items(&reply.body).any(|item| item == query);
        debug!(query, found, "Searched cards");
        Ok(found)
    }

    /// Add a card to `deck`.
    ///
    /// Fetches the editor token on first use.
    pub async fn add(&mut self, deck: &str, front: &str, back: &str) -> Result<()> {
        let token = self.client.ensure_edit_token().await?;

        let url = self.client.endpoints.edit_save.clone();
        let referer = self.client.endpoints.edit.clone();
        let form = AddForm {
            csrf_token: &token,
            mid: DEFAULT_MODEL_ID,
            deck,
            data: serde_json::to_string(&((front, back), ""))?,
        };

        let reply = self
            .client
            .execute_with_backoff(&Request::post(&url, &form).referer(&referer).ajax())
            .await?;
        reply.ensure_ok()?;

        debug!(deck, front, "Added card");
        Ok(())
    }
}

/// Front texts of the rows in a search result page.
fn search_items(body: &str) -> impl Iterator<Item = &str> {
    SEARCH_ITEM
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|item| !item.is_empty())
}

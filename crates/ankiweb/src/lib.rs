//! An async client for adding cards to AnkiWeb through its web forms.
//!
//! AnkiWeb has no public API for creating cards. This crate drives the same
//! pages a browser would: it logs in with the account form, keeps the
//! session cookies between runs, scrapes the anti-forgery tokens the forms
//! require, searches for existing cards and posts new ones.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use ankiweb::{AnkiWebClient, CookieJar};
//!
//! # async fn example() -> ankiweb::Result<()> {
//! let cookies = Path::new("/tmp/anki.cookies");
//!
//! let mut client = AnkiWebClient::builder()
//!     .cookies(CookieJar::load(cookies)?)
//!     .build()?;
//!
//! // Skips the credentials POST when the saved cookies are still valid
//! client.account().login("me@example.com", "hunter2").await?;
//!
//! if !client.cards().search("hola").await? {
//!     client.cards().add("Spanish", "hola", "hello").await?;
//! }
//!
//! client.save_cookies(cookies)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Action Groups
//!
//! - [`AnkiWebClient::account()`] - Log in and check the session
//! - [`AnkiWebClient::cards()`] - Search for and add cards
//!
//! Bulk input goes through [`ingest::Ingest`], which stops early once it
//! sees a streak of cards that already exist.
//!
//! # Rate Limiting
//!
//! AnkiWeb answers bursts with `429 Too Many Requests`. Search and add sleep
//! and re-send the same request, a bounded number of times; see
//! [`ClientBuilder::rate_limit_backoff`] and
//! [`ClientBuilder::rate_limit_retries`].

pub mod actions;
pub mod client;
pub mod cookies;
pub mod error;
pub mod ingest;
pub mod token;
pub mod types;

pub use client::{AnkiWebClient, ClientBuilder, DEFAULT_MODEL_ID, Endpoints, Redirects, USER_AGENT};
pub use cookies::{CookieJar, StoredCookie};
pub use error::{Error, Result};
pub use token::{PatternExtractor, TokenExtractor};
pub use types::{Card, InputFormat};

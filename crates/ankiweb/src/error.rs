//! Error types for AnkiWeb session operations.
//!
//! Every variant carries the URL or path it concerns, so an error surfaced
//! from deep inside an ingestion run still says which request failed.
//!
//! # Example
//!
//! ```no_run
//! use ankiweb::{AnkiWebClient, Error};
//!
//! # async fn example() -> ankiweb::Result<()> {
//! let mut client = AnkiWebClient::new()?;
//!
//! match client.account().login("me@example.com", "hunter2").await {
//!     Ok(()) => println!("Logged in"),
//!     Err(Error::AuthenticationFailed { .. }) => {
//!         eprintln!("Check the email and password in your config");
//!     }
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// The error type for AnkiWeb operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced a response.
    ///
    /// Covers DNS failures, refused connections, TLS errors and timeouts, as
    /// well as failures while reading a response body.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// The URL that was being requested.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a status the operation does not accept.
    #[error("{url} returned {status}, but 200 OK expected")]
    UnexpectedStatus {
        /// The URL that was requested.
        url: String,
        /// The status the server returned.
        status: StatusCode,
    },

    /// The server redirected where no redirect is accepted.
    ///
    /// AnkiWeb answers requests from an unauthenticated session by
    /// redirecting to the login page, so this usually means the cookies
    /// have expired.
    #[error("{url} redirected to {location}")]
    Redirected {
        /// The URL that was requested.
        url: String,
        /// Where the server pointed us.
        location: String,
    },

    /// An anti-forgery token could not be located in a page.
    ///
    /// `matches` is zero when the pattern did not match at all, and greater
    /// than one when the page contained several differing candidates.
    #[error("unable to find {token} in page ({matches} candidates)")]
    TokenNotFound {
        /// Which token was being looked for.
        token: String,
        /// Number of distinct candidates found.
        matches: usize,
    },

    /// The login form was rejected.
    #[error("bad email/password (login returned {status})")]
    AuthenticationFailed {
        /// The status returned for the credentials POST.
        status: StatusCode,
    },

    /// The server kept answering 429 after every retry.
    #[error("{url} still rate limited after {attempts} attempts")]
    RateLimited {
        /// The URL that was requested.
        url: String,
        /// Number of attempts made, including the first.
        attempts: u32,
    },

    /// The cookie file could not be read or written.
    #[error("unable to access cookie file {}: {source}", .path.display())]
    Persistence {
        /// The cookie file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The cookie file exists but does not contain a cookie list.
    #[error("unable to parse cookie file {}: {source}", .path.display())]
    CookieFile {
        /// The cookie file path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// An input line could not be turned into a card.
    #[error("invalid record on line {line}: {reason}")]
    InvalidRecord {
        /// 1-based line number in the input.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration.
    ///
    /// A base URL did not parse, or the HTTP client could not be built.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// A specialized Result type for AnkiWeb operations.
pub type Result<T> = std::result::Result<T, Error>;

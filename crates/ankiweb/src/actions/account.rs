//! Login and session operations.
//!
//! # Example
//!
//! ```no_run
//! use ankiweb::AnkiWebClient;
//!
//! # async fn example() -> ankiweb::Result<()> {
//! let mut client = AnkiWebClient::new()?;
//!
//! client.account().login("me@example.com", "hunter2").await?;
//! assert!(client.account().check_session().await?);
//! # Ok(())
//! # }
//! ```

use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info};

use crate::client::{AnkiWebClient, Request, is_redirect};
use crate::error::{Error, Result};

/// Provides access to login and session operations.
///
/// Obtained via [`AnkiWebClient::account()`].
#[derive(Debug)]
pub struct AccountActions<'a> {
    pub(crate) client: &'a mut AnkiWebClient,
}

#[derive(Debug, Serialize)]
struct LoginForm<'a> {
    username: &'a str,
    password: &'a str,
    csrf_token: &'a str,
    submitted: u8,
}

impl AccountActions<'_> {
    /// Log in with an email and password.
    ///
    /// When the login page already redirects, the stored cookies are still
    /// valid and no credentials are sent.
    ///
    /// # Errors
    ///
    /// [`Error::AuthenticationFailed`] when the credentials POST is not
    /// answered with a redirect.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<()> {
        let url = self.client.endpoints.login.clone();

        debug!(url = %url, "Requesting login page");
        let page = self.client.execute(&Request::get(&url)).await?;

        if is_redirect(page.status) {
            debug!(status = %page.status, "Already authorized");
            return Ok(());
        }
        page.ensure_ok()?;

        let token = self.client.login_token.extract(&page.body)?;

        let form = LoginForm {
            username: email,
            password,
            csrf_token: &token,
            submitted: 1,
        };

        debug!(url = %url, "Posting credentials");
        let reply = self
            .client
            .execute(&Request::post(&url, &form).referer(&url))
            .await?;

        if !is_redirect(reply.status) {
            return Err(Error::AuthenticationFailed {
                status: reply.status,
            });
        }

        info!("Logged in to AnkiWeb");
        Ok(())
    }

    /// Check whether the current cookies belong to a logged-in session.
    ///
    /// Returns `false` when the server redirects (to the login page).
    pub async fn check_session(&mut self) -> Result<bool> {
        let url = self.client.endpoints.check_cookie.clone();
        let reply = self.client.execute(&Request::get(&url)).await?;

        if reply.status == StatusCode::OK {
            Ok(true)
        } else if is_redirect(reply.status) {
            Ok(false)
        } else {
            Err(Error::UnexpectedStatus {
                url: url.to_string(),
                status: reply.status,
            })
        }
    }
}

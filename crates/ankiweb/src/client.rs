//! The AnkiWeb session client and builder.

use std::path::Path;
use std::time::Duration;

use reqwest::header::{COOKIE, LOCATION, REFERER};
use reqwest::{Client, Method, StatusCode, Url, redirect};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::actions::{AccountActions, CardActions};
use crate::cookies::CookieJar;
use crate::error::{Error, Result};
use crate::token::{PatternExtractor, TokenExtractor};

/// Default base URL for account and search pages.
const DEFAULT_WEB_URL: &str = "https://ankiweb.net";

/// Default base URL for the card editor.
const DEFAULT_USER_URL: &str = "https://ankiuser.net";

/// User agent sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/56.0.2924.87 Safari/537.36";

/// Note type id of the stock "Basic" model cards are added with.
pub const DEFAULT_MODEL_ID: &str = "1510000287133";

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default pause after a 429 response.
const DEFAULT_BACKOFF: Duration = Duration::from_secs(3);

/// Default number of retries after a 429 response.
const DEFAULT_MAX_RETRIES: u32 = 5;

/// Maximum hops for requests that follow redirects.
const MAX_REDIRECTS: usize = 10;

/// The AnkiWeb pages the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Login form (GET for the token, POST for credentials).
    pub login: Url,
    /// Session check.
    pub check_cookie: Url,
    /// Keyword search.
    pub search: Url,
    /// Card editor page holding the edit token.
    pub edit: Url,
    /// Card save endpoint.
    pub edit_save: Url,
}

impl Endpoints {
    /// Build the endpoint set from the two service base URLs.
    ///
    /// `web` hosts the account and search pages (`https://ankiweb.net`),
    /// `user` hosts the editor (`https://ankiuser.net`).
    pub fn new(web: &str, user: &str) -> Result<Self> {
        let web = web.trim_end_matches('/');
        let user = user.trim_end_matches('/');

        Ok(Self {
            login: parse_url(&format!("{}/account/login", web))?,
            check_cookie: parse_url(&format!("{}/account/checkCookie", web))?,
            search: parse_url(&format!("{}/search/", web))?,
            edit: parse_url(&format!("{}/edit/", user))?,
            edit_save: parse_url(&format!("{}/edit/save", user))?,
        })
    }

    /// Whether `url` points at the login page.
    pub fn is_login_page(&self, url: &Url) -> bool {
        url.host_str() == self.login.host_str()
            && url.port_or_known_default() == self.login.port_or_known_default()
            && url.path() == self.login.path()
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_WEB_URL, DEFAULT_USER_URL).expect("default endpoints are valid URLs")
    }
}

/// Whether `status` sends the browser elsewhere.
///
/// 300 and 304 are 3xx codes but never carry a new location.
pub(crate) fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

fn parse_url(s: &str) -> Result<Url> {
    Url::parse(s).map_err(|e| Error::Config(format!("invalid URL {}: {}", s, e)))
}

/// Redirect handling for a single request.
///
/// The underlying HTTP client never follows redirects itself; each request
/// states what it wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Redirects {
    /// Hand 3xx responses back to the caller.
    #[default]
    Manual,
    /// Follow up to ten hops, collecting cookies along the way.
    Follow,
}

/// A request as issued by the action groups.
#[derive(Debug)]
pub(crate) struct Request<'a, F: ?Sized = ()> {
    method: Method,
    url: &'a Url,
    form: Option<&'a F>,
    referer: Option<&'a Url>,
    cookie: Option<&'a str>,
    ajax: bool,
    redirects: Redirects,
}

impl<'a> Request<'a, ()> {
    /// A GET request.
    pub fn get(url: &'a Url) -> Self {
        Self {
            method: Method::GET,
            url,
            form: None,
            referer: None,
            cookie: None,
            ajax: false,
            redirects: Redirects::Manual,
        }
    }
}

impl<'a, F: Serialize + ?Sized> Request<'a, F> {
    /// A POST request with a form-encoded body.
    pub fn post(url: &'a Url, form: &'a F) -> Self {
        Self {
            method: Method::POST,
            url,
            form: Some(form),
            referer: None,
            cookie: None,
            ajax: false,
            redirects: Redirects::Manual,
        }
    }

    /// Set the `Referer` header.
    pub fn referer(mut self, url: &'a Url) -> Self {
        self.referer = Some(url);
        self
    }

    /// Set an explicit `Cookie` header.
    ///
    /// Jar cookies with the same names are left out.
    pub fn cookie(mut self, cookie: &'a str) -> Self {
        self.cookie = Some(cookie);
        self
    }

    /// Mark the request as script-originated (`X-Requested-With`).
    pub fn ajax(mut self) -> Self {
        self.ajax = true;
        self
    }

    /// Set the redirect policy.
    pub fn redirects(mut self, redirects: Redirects) -> Self {
        self.redirects = redirects;
        self
    }
}

/// A fully read response.
#[derive(Debug)]
pub(crate) struct Reply {
    /// Final status.
    pub status: StatusCode,
    /// URL that produced the final response.
    pub url: Url,
    /// `Location` header of the final response, if any.
    pub location: Option<String>,
    /// Response body.
    pub body: String,
}

impl Reply {
    /// Accept only 200, mapping redirects and other statuses to errors.
    pub fn ensure_ok(&self) -> Result<()> {
        if is_redirect(self.status) {
            return Err(Error::Redirected {
                url: self.url.to_string(),
                location: self.location.clone().unwrap_or_default(),
            });
        }
        if self.status != StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                url: self.url.to_string(),
                status: self.status,
            });
        }
        Ok(())
    }
}

/// A logged-in (or about to be) AnkiWeb browser session.
///
/// The client owns the cookie jar and the cached editor token, so all
/// operations take `&mut self` and run one request at a time.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use ankiweb::{AnkiWebClient, CookieJar};
///
/// # async fn example() -> ankiweb::Result<()> {
/// let cookies = Path::new("/tmp/anki.cookies");
/// let mut client = AnkiWebClient::builder()
///     .cookies(CookieJar::load(cookies)?)
///     .build()?;
///
/// client.account().login("me@example.com", "hunter2").await?;
///
/// if !client.cards().search("hola").await? {
///     client.cards().add("Spanish", "hola", "hello").await?;
/// }
///
/// client.save_cookies(cookies)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AnkiWebClient {
    http_client: Client,
    pub(crate) endpoints: Endpoints,
    jar: CookieJar,
    user_agent: String,
    pub(crate) login_token: Box<dyn TokenExtractor>,
    edit_token_extractor: Box<dyn TokenExtractor>,
    edit_token: Option<String>,
    backoff: Duration,
    max_retries: u32,
}

impl AnkiWebClient {
    /// Create a client with default settings and an empty cookie jar.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a builder for custom client configuration.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Access login and session operations.
    pub fn account(&mut self) -> AccountActions<'_> {
        AccountActions { client: self }
    }

    /// Access search and add operations.
    pub fn cards(&mut self) -> CardActions<'_> {
        CardActions { client: self }
    }

    /// The endpoints this client talks to.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// The session cookies collected so far.
    pub fn cookies(&self) -> &CookieJar {
        &self.jar
    }

    /// Persist the session cookies to `path`.
    pub fn save_cookies(&self, path: &Path) -> Result<()> {
        self.jar.save(path)
    }

    /// Send one request, following redirects if the request asks for it.
    pub(crate) async fn execute<F>(&mut self, request: &Request<'_, F>) -> Result<Reply>
    where
        F: Serialize + ?Sized,
    {
        let mut url = request.url.clone();
        let mut method = request.method.clone();
        let mut form = request.form;

        for _ in 0..=MAX_REDIRECTS {
            debug!(method = %method, url = %url, "Sending request");

            let mut builder = self
                .http_client
                .request(method.clone(), url.clone())
                .header(reqwest::header::USER_AGENT, self.user_agent.as_str());

            if let Some(referer) = request.referer {
                builder = builder.header(REFERER, referer.as_str());
            }
            if request.ajax {
                builder = builder.header("X-Requested-With", "XMLHttpRequest");
            }
            if let Some(form) = form {
                builder = builder.form(form);
            }
            if let Some(cookies) = self.jar.cookie_header(&url, request.cookie) {
                builder = builder.header(COOKIE, cookies);
            }

            let response = builder.send().await.map_err(|source| Error::Transport {
                url: url.to_string(),
                source,
            })?;

            self.jar.store_response_cookies(&url, response.headers());

            let status = response.status();
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            debug!(url = %url, status = %status, "Received response");

            if request.redirects == Redirects::Follow && is_redirect(status) {
                if let Some(next) = location.as_deref().and_then(|l| url.join(l).ok()) {
                    trace!(from = %url, to = %next, "Following redirect");
                    if !matches!(
                        status,
                        StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
                    ) {
                        method = Method::GET;
                        form = None;
                    }
                    url = next;
                    continue;
                }
            }

            let body = response.text().await.map_err(|source| Error::Transport {
                url: url.to_string(),
                source,
            })?;
            trace!(url = %url, body = %body, "Response body");

            return Ok(Reply {
                status,
                url,
                location,
                body,
            });
        }

        Err(Error::Redirected {
            url: request.url.to_string(),
            location: url.to_string(),
        })
    }

    /// Send a request, sleeping and re-sending it while the server answers
    /// 429.
    pub(crate) async fn execute_with_backoff<F>(&mut self, request: &Request<'_, F>) -> Result<Reply>
    where
        F: Serialize + ?Sized,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let reply = self.execute(request).await?;

            if reply.status != StatusCode::TOO_MANY_REQUESTS {
                return Ok(reply);
            }
            if attempts > self.max_retries {
                return Err(Error::RateLimited {
                    url: request.url.to_string(),
                    attempts,
                });
            }

            warn!(
                url = %request.url,
                attempt = attempts,
                backoff_ms = self.backoff.as_millis() as u64,
                "Too many requests, backing off"
            );
            tokio::time::sleep(self.backoff).await;
        }
    }

    /// Return the editor token, fetching it from the editor page on first
    /// use.
    pub(crate) async fn ensure_edit_token(&mut self) -> Result<String> {
        if let Some(token) = &self.edit_token {
            return Ok(token.clone());
        }

        let url = self.endpoints.edit.clone();
        debug!(url = %url, "Requesting editor page");
        let reply = self
            .execute(&Request::get(&url).redirects(Redirects::Follow))
            .await?;

        if is_redirect(reply.status) || self.endpoints.is_login_page(&reply.url) {
            return Err(Error::Redirected {
                url: url.to_string(),
                location: reply.location.unwrap_or_else(|| reply.url.to_string()),
            });
        }
        reply.ensure_ok()?;

        let token = self.edit_token_extractor.extract(&reply.body)?;
        debug!("Got editor token");
        self.edit_token = Some(token.clone());
        Ok(token)
    }
}

/// Builder for creating a customized [`AnkiWebClient`].
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use ankiweb::AnkiWebClient;
///
/// # fn example() -> ankiweb::Result<()> {
/// let client = AnkiWebClient::builder()
///     .web_url("http://127.0.0.1:8080")
///     .user_url("http://127.0.0.1:8080")
///     .rate_limit_backoff(Duration::from_millis(500))
///     .rate_limit_retries(2)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ClientBuilder {
    web_url: String,
    user_url: String,
    cookies: CookieJar,
    user_agent: String,
    timeout: Duration,
    backoff: Duration,
    max_retries: u32,
    login_token: Option<Box<dyn TokenExtractor>>,
    edit_token: Option<Box<dyn TokenExtractor>>,
}

impl ClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            web_url: DEFAULT_WEB_URL.to_string(),
            user_url: DEFAULT_USER_URL.to_string(),
            cookies: CookieJar::new(),
            user_agent: USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            backoff: DEFAULT_BACKOFF,
            max_retries: DEFAULT_MAX_RETRIES,
            login_token: None,
            edit_token: None,
        }
    }

    /// Set the base URL of the account and search pages.
    ///
    /// Defaults to `https://ankiweb.net`.
    pub fn web_url(mut self, url: impl Into<String>) -> Self {
        self.web_url = url.into();
        self
    }

    /// Set the base URL of the card editor.
    ///
    /// Defaults to `https://ankiuser.net`.
    pub fn user_url(mut self, url: impl Into<String>) -> Self {
        self.user_url = url.into();
        self
    }

    /// Start from a previously saved cookie jar.
    pub fn cookies(mut self, jar: CookieJar) -> Self {
        self.cookies = jar;
        self
    }

    /// Override the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    ///
    /// Defaults to 30 seconds.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    /// Set the pause after a 429 response.
    ///
    /// Defaults to 3 seconds.
    pub fn rate_limit_backoff(mut self, duration: Duration) -> Self {
        self.backoff = duration;
        self
    }

    /// Set how many times a rate-limited request is re-sent.
    ///
    /// Defaults to 5.
    pub fn rate_limit_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Replace the login page token extractor.
    pub fn login_token_extractor(mut self, extractor: impl TokenExtractor + 'static) -> Self {
        self.login_token = Some(Box::new(extractor));
        self
    }

    /// Replace the editor page token extractor.
    pub fn edit_token_extractor(mut self, extractor: impl TokenExtractor + 'static) -> Self {
        self.edit_token = Some(Box::new(extractor));
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<AnkiWebClient> {
        let endpoints = Endpoints::new(&self.web_url, &self.user_url)?;

        let http_client = Client::builder()
            .timeout(self.timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| Error::Config(format!("unable to build HTTP client: {}", e)))?;

        Ok(AnkiWebClient {
            http_client,
            endpoints,
            jar: self.cookies,
            user_agent: self.user_agent,
            login_token: self
                .login_token
                .unwrap_or_else(|| Box::new(PatternExtractor::login_form())),
            edit_token_extractor: self
                .edit_token
                .unwrap_or_else(|| Box::new(PatternExtractor::editor_script())),
            edit_token: None,
            backoff: self.backoff,
            max_retries: self.max_retries,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Common test utilities for AnkiWeb session tests.

use std::time::Duration;

use ankiweb::AnkiWebClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Start a new mock server for testing.
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// A client pointing both AnkiWeb hosts at the mock server.
pub fn client_for(server: &MockServer) -> AnkiWebClient {
    AnkiWebClient::builder()
        .web_url(server.uri())
        .user_url(server.uri())
        .rate_limit_backoff(Duration::from_millis(10))
        .rate_limit_retries(3)
        .build()
        .unwrap()
}

/// The login form with a hidden token.
#[allow(dead_code)] // Not all test files use this
pub fn login_page(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(format!(
        r#"<html><body><form method="post" action="/account/login">
<input type="hidden" name="csrf_token" value="{}">
<input name="username"><input name="password" type="password">
</form></body></html>"#,
        token
    ))
}

/// The card editor page with its script token.
#[allow(dead_code)]
pub fn editor_page(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(format!(
        "<html><script>\neditor.csrf_token2 = '{}';\neditor.init();\n</script></html>",
        token
    ))
}

/// A search result table with one row per front text.
#[allow(dead_code)]
pub fn search_results(fronts: &[&str]) -> ResponseTemplate {
    let rows: String = fronts
        .iter()
        .map(|front| format!("<tr><td> {} / back</td></tr>\n", front))
        .collect();
    ResponseTemplate::new(200).set_body_string(format!("<table>\n{}</table>", rows))
}

/// A redirect to `location`.
#[allow(dead_code)]
pub fn redirect_to(location: &str) -> ResponseTemplate {
    ResponseTemplate::new(302).insert_header("Location", location)
}

/// Mount a mock for a method and path, expected to be hit `times` times.
#[allow(dead_code)]
pub async fn mock_page(
    server: &MockServer,
    http_method: &str,
    page: &str,
    response: ResponseTemplate,
    times: u64,
) {
    Mock::given(method(http_method))
        .and(path(page))
        .respond_with(response)
        .expect(times)
        .mount(server)
        .await;
}

//! Tests for login and session check.

mod common;

use ankiweb::{AnkiWebClient, CookieJar, Error, USER_AGENT};
use common::{client_for, login_page, mock_page, redirect_to, setup_mock_server};
use reqwest::{StatusCode, Url};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_login_posts_credentials() {
    let server = setup_mock_server().await;
    let login_url = format!("{}/account/login", server.uri());

    mock_page(&server, "GET", "/account/login", login_page("tok-login"), 1).await;
    Mock::given(method("POST"))
        .and(path("/account/login"))
        .and(header("user-agent", USER_AGENT))
        .and(header("referer", login_url.as_str()))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("username=me%40example.com"))
        .and(body_string_contains("password=s3cret"))
        .and(body_string_contains("csrf_token=tok-login"))
        .and(body_string_contains("submitted=1"))
        .respond_with(redirect_to("/decks/").insert_header("Set-Cookie", "ankiweb=sess; Path=/"))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client
        .account()
        .login("me@example.com", "s3cret")
        .await
        .unwrap();

    let url = Url::parse(&server.uri()).unwrap();
    assert_eq!(client.cookies().get(&url, "ankiweb").unwrap().value, "sess");
}

#[tokio::test]
async fn test_login_skipped_when_already_authorized() {
    let server = setup_mock_server().await;
    mock_page(&server, "GET", "/account/login", redirect_to("/decks/"), 1).await;
    mock_page(
        &server,
        "POST",
        "/account/login",
        ResponseTemplate::new(302),
        0,
    )
    .await;

    let mut client = client_for(&server);
    client
        .account()
        .login("me@example.com", "s3cret")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_login_bad_credentials() {
    let server = setup_mock_server().await;
    mock_page(&server, "GET", "/account/login", login_page("tok"), 1).await;
    mock_page(&server, "POST", "/account/login", login_page("tok2"), 1).await;

    let mut client = client_for(&server);
    let err = client
        .account()
        .login("me@example.com", "wrong")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::AuthenticationFailed { status } if status == StatusCode::OK
    ));
}

#[tokio::test]
async fn test_login_not_modified_is_not_success() {
    let server = setup_mock_server().await;
    mock_page(&server, "GET", "/account/login", login_page("tok"), 1).await;
    mock_page(
        &server,
        "POST",
        "/account/login",
        ResponseTemplate::new(304),
        1,
    )
    .await;

    let mut client = client_for(&server);
    let err = client
        .account()
        .login("me@example.com", "hunter2")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::AuthenticationFailed { status } if status == StatusCode::NOT_MODIFIED
    ));
}

#[tokio::test]
async fn test_login_page_multiple_choices_is_not_authorized() {
    let server = setup_mock_server().await;
    mock_page(
        &server,
        "GET",
        "/account/login",
        ResponseTemplate::new(300),
        1,
    )
    .await;
    mock_page(&server, "POST", "/account/login", redirect_to("/"), 0).await;

    let mut client = client_for(&server);
    let err = client.account().login("a", "b").await.unwrap_err();

    assert!(matches!(
        err,
        Error::UnexpectedStatus { status, .. } if status == StatusCode::MULTIPLE_CHOICES
    ));
}

#[tokio::test]
async fn test_login_page_without_token() {
    let server = setup_mock_server().await;
    mock_page(
        &server,
        "GET",
        "/account/login",
        ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"),
        1,
    )
    .await;
    mock_page(&server, "POST", "/account/login", redirect_to("/"), 0).await;

    let mut client = client_for(&server);
    let err = client.account().login("a", "b").await.unwrap_err();

    assert!(matches!(err, Error::TokenNotFound { matches: 0, .. }));
}

#[tokio::test]
async fn test_login_page_error_status() {
    let server = setup_mock_server().await;
    mock_page(
        &server,
        "GET",
        "/account/login",
        ResponseTemplate::new(503),
        1,
    )
    .await;

    let mut client = client_for(&server);
    let err = client.account().login("a", "b").await.unwrap_err();

    assert!(matches!(
        err,
        Error::UnexpectedStatus { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
    ));
}

#[tokio::test]
async fn test_login_page_cookies_sent_with_credentials() {
    let server = setup_mock_server().await;
    mock_page(
        &server,
        "GET",
        "/account/login",
        login_page("tok").insert_header("Set-Cookie", "pre_login=xyz; Path=/"),
        1,
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/account/login"))
        .and(header("cookie", "pre_login=xyz"))
        .respond_with(redirect_to("/"))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client.account().login("a", "b").await.unwrap();
}

#[tokio::test]
async fn test_saved_cookies_reused_across_runs() {
    let server = setup_mock_server().await;
    let dir = tempfile::tempdir().unwrap();
    let cookie_file = dir.path().join("cache").join("anki.cookies");

    mock_page(&server, "GET", "/account/login", login_page("tok"), 1).await;
    mock_page(
        &server,
        "POST",
        "/account/login",
        redirect_to("/").insert_header("Set-Cookie", "ankiweb=sess; Path=/; Max-Age=86400"),
        1,
    )
    .await;

    let mut first = client_for(&server);
    first.account().login("a", "b").await.unwrap();
    first.save_cookies(&cookie_file).unwrap();

    // A logged-in session is bounced away from the login page.
    let second_run = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/account/login"))
        .and(header("cookie", "ankiweb=sess"))
        .respond_with(redirect_to("/decks/"))
        .expect(1)
        .mount(&second_run)
        .await;
    mock_page(&second_run, "POST", "/account/login", redirect_to("/"), 0).await;

    // Cookies ignore the port, so the second server on the same host gets them.
    let jar = CookieJar::load(&cookie_file).unwrap();
    assert_eq!(jar.len(), 1);
    let mut second = AnkiWebClient::builder()
        .web_url(second_run.uri())
        .user_url(second_run.uri())
        .cookies(jar)
        .build()
        .unwrap();
    second.account().login("a", "b").await.unwrap();
}

#[tokio::test]
async fn test_check_session() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/account/checkCookie"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/account/checkCookie"))
        .respond_with(redirect_to("/account/login"))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    assert!(client.account().check_session().await.unwrap());
    assert!(!client.account().check_session().await.unwrap());
}

#[tokio::test]
async fn test_check_session_unexpected_status() {
    let server = setup_mock_server().await;
    mock_page(
        &server,
        "GET",
        "/account/checkCookie",
        ResponseTemplate::new(500),
        1,
    )
    .await;

    let mut client = client_for(&server);
    let err = client.account().check_session().await.unwrap_err();
    assert!(matches!(err, Error::UnexpectedStatus { .. }));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let mut client = AnkiWebClient::builder()
        .web_url("http://127.0.0.1:1")
        .user_url("http://127.0.0.1:1")
        .build()
        .unwrap();

    let err = client.account().login("a", "b").await.unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
}

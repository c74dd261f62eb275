//! End-to-end request tests against a local mock HTTP server. Kerberos is
//! off throughout; the negotiation path has its own tests next to the
//! transport.

use kurl::request::{perform_request, BasicAuth, Method, RequestOptions};
use kurl::transport::AuthenticatingClient;
use std::fs;

fn options(url: &str) -> RequestOptions {
    RequestOptions {
        method: Method::Get,
        url: url.parse().unwrap(),
        basic_auth: None,
        output_file: None,
        fail_on_error_status: false,
    }
}

fn client() -> AuthenticatingClient {
    AuthenticatingClient::build(false, false, "kurl-test/0.0").unwrap()
}

#[test]
fn successful_get_reports_status_200() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("ok")
        .create();

    let status = perform_request(&client(), &options(&server.url())).unwrap();

    assert_eq!(status, 200);
    mock.assert();
}

#[test]
fn output_file_is_recreated_not_appended_to() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body("fresh")
        .create();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("response.out");
    fs::write(&path, "a much longer stale body that must disappear").unwrap();

    let mut options = options(&server.url());
    options.output_file = Some(path.clone());
    perform_request(&client(), &options).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "fresh");
}

#[test]
fn error_status_is_reported_without_failing_by_default() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/")
        .with_status(404)
        .with_body("not here")
        .create();

    let status = perform_request(&client(), &options(&server.url())).unwrap();
    assert_eq!(status, 404);
}

#[test]
fn error_status_fails_when_opted_in() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/")
        .with_status(503)
        .with_body("down")
        .create();

    let mut options = options(&server.url());
    options.fail_on_error_status = true;
    let err = perform_request(&client(), &options).unwrap_err();
    assert!(err.to_string().contains("503"));
}

#[test]
fn error_status_does_not_touch_the_output_file() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/")
        .with_status(500)
        .with_body("boom")
        .create();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("response.out");
    fs::write(&path, "keep me").unwrap();

    let mut options = options(&server.url());
    options.output_file = Some(path.clone());
    perform_request(&client(), &options).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "keep me");
}

#[test]
fn basic_auth_and_user_agent_are_sent() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/")
        .match_header("authorization", "Basic aGRmczpzZWNyZXQ=")
        .match_header("user-agent", "kurl-test/0.0")
        .with_status(200)
        .with_body("ok")
        .create();

    let mut options = options(&server.url());
    options.basic_auth = Some(BasicAuth {
        user: "hdfs".to_owned(),
        password: Some("secret".to_owned()),
    });
    perform_request(&client(), &options).unwrap();
    mock.assert();
}

#[test]
fn transport_level_failure_is_an_error() {
    // Nothing listens on this port; the connection itself must fail.
    let err = perform_request(&client(), &options("http://127.0.0.1:1/")).unwrap_err();
    assert!(err.to_string().contains("http://127.0.0.1:1/"));
}

#[test]
fn head_requests_round_trip() {
    let mut server = mockito::Server::new();
    let mock = server.mock("HEAD", "/").with_status(200).create();

    let mut options = options(&server.url());
    options.method = Method::Head;
    let status = perform_request(&client(), &options).unwrap();

    assert_eq!(status, 200);
    mock.assert();
}

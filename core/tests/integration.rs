//! End-to-end tests of the client and `HttpTransport` against the live
//! mock server.
//!
//! # Design
//! Each test starts the mock server on a random port in a background
//! thread, then drives a `Client` over real HTTP. This validates request
//! formatting, header and cookie handling, format detection and the send
//! lifecycle together with an actual server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use courier_core::{
    Client, ClientConfig, Cookie, Headers, HttpMessage, HttpMethod, Options, PartOptions, Payload, Request,
};
use mock_server::{Echo, FORM_DOCUMENT};
use serde_json::{json, Value};

/// Start the mock server on a random port and return its address.
fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn client(addr: SocketAddr) -> Client {
    Client::builder().base_url(format!("http://{addr}")).build()
}

fn echo_of(request: &mut Request) -> Echo {
    let response = request.send().unwrap();
    assert!(response.is_ok().unwrap());
    serde_json::from_value(response.data().unwrap().unwrap().clone()).unwrap()
}

fn options(value: Value) -> Options {
    value.as_object().cloned().unwrap()
}

#[test]
fn get_with_data_goes_to_query_string() {
    let client = client(start_server());
    let mut request = client.get("echo", json!({"q": "hello world", "page": 2}), Headers::new(), Options::new());

    let echo = echo_of(&mut request);
    assert_eq!(echo.method, "GET");
    assert_eq!(echo.query, "q=hello+world&page=2");
    assert!(echo.body.is_empty());
}

#[test]
fn post_urlencoded_by_default() {
    let client = client(start_server());
    let mut request = client.post("echo", json!({"name": "value", "form": {"a": "1"}}), Headers::new(), Options::new());

    let echo = echo_of(&mut request);
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.body, "name=value&form%5Ba%5D=1");
    assert_eq!(echo.headers["content-type"], "application/x-www-form-urlencoded; charset=UTF-8");
}

#[test]
fn empty_post_declares_zero_length() {
    let client = client(start_server());
    let mut request = client.post("echo", Payload::None, Headers::new(), Options::new());

    let echo = echo_of(&mut request);
    assert_eq!(echo.method, "POST");
    assert!(echo.body.is_empty());
    assert_eq!(echo.headers["content-length"], "0");
    assert!(echo.headers.get("transfer-encoding").is_none());
}

#[test]
fn json_format_from_config() {
    let addr = start_server();
    let config = ClientConfig {
        base_url: format!("http://{addr}"),
        request_format: Some("json".to_string()),
        ..ClientConfig::default()
    };
    let client = Client::builder().config(config).build();
    let mut request = client.put("echo/items/1", json!({"title": "Updated"}), Headers::new(), Options::new());

    let echo = echo_of(&mut request);
    assert_eq!(echo.method, "PUT");
    assert_eq!(echo.path, "/echo/items/1");
    assert_eq!(echo.body, r#"{"title":"Updated"}"#);
    assert_eq!(echo.headers["content-type"], "application/json; charset=UTF-8");
}

#[test]
fn raw_content_headers_and_cookies_are_sent() {
    let client = client(start_server());
    let mut request = client.patch(
        "echo",
        "raw body",
        [("X-Custom", "yes"), ("Content-Type", "text/plain")].into_iter().collect(),
        Options::new(),
    );
    request.set_cookies([Cookie::new("a", "1"), Cookie::new("b", "2")]);

    let echo = echo_of(&mut request);
    assert_eq!(echo.method, "PATCH");
    assert_eq!(echo.body, "raw body");
    assert_eq!(echo.headers["x-custom"], "yes");
    assert_eq!(echo.headers["cookie"], "a=1;b=2");
}

#[test]
fn curl_format_sends_post_fields_as_form() {
    let client = client(start_server());
    let mut request = client.post("echo", json!({"name": "a b"}), Headers::new(), Options::new());
    request.set_format("curl");

    let echo = echo_of(&mut request);
    assert_eq!(echo.body, "name=a+b");
    assert_eq!(echo.headers["content-type"], "application/x-www-form-urlencoded; charset=UTF-8");
}

#[test]
fn multipart_upload() {
    let client = client(start_server());
    let mut request = client.post("echo", json!({"field": "value"}), Headers::new(), Options::new());
    request.add_file_content("upload", "file body", PartOptions::new().file_name("a.txt").mime_type("text/plain"));

    let echo = echo_of(&mut request);
    let content_type = echo.headers["content-type"].as_str().unwrap().to_string();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    assert!(echo.body.contains("Content-Disposition: form-data; name=\"field\"\r\n\r\nvalue\r\n"));
    assert!(echo
        .body
        .contains("Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n\r\nfile body\r\n"));
}

#[test]
fn response_formats_are_detected() {
    let client = client(start_server());
    let get = |path: &str| client.get(path, Payload::None, Headers::new(), Options::new()).send().unwrap();

    let response = get("json");
    assert_eq!(response.format(), Some("json"));
    assert_eq!(response.data().unwrap(), Some(&json!({"name": "value", "items": [1, 2]})));

    let response = get("xml");
    assert_eq!(response.format(), Some("xml"));
    assert_eq!(
        response.data().unwrap(),
        Some(&json!({"name": "value", "items": {"item": ["1", "2"]}}))
    );

    let response = get("form");
    assert_eq!(response.format(), Some("urlencoded"));
    assert_eq!(response.data().unwrap(), Some(&json!({"name": "value", "age": "30"})));

    let response = get("sniff/form");
    assert_eq!(response.format(), Some("urlencoded"));
    assert_eq!(response.content_str().unwrap(), FORM_DOCUMENT);

    let response = get("html");
    assert_eq!(response.format(), None);
    assert!(response.data().unwrap().unwrap().as_str().unwrap().starts_with("<!DOCTYPE html>"));
}

#[test]
fn error_statuses_are_responses() {
    let client = client(start_server());
    for (code, ok) in [(201u16, true), (404, false), (500, false)] {
        let mut request = client.delete(format!("status/{code}"), Payload::None, Headers::new(), Options::new());
        let response = request.send().unwrap();
        assert_eq!(response.status_code().unwrap(), code);
        assert_eq!(response.is_ok().unwrap(), ok);
        assert_eq!(response.content_str().unwrap(), format!("status {code}"));
    }
}

#[test]
fn set_cookie_headers_are_parsed() {
    let client = client(start_server());
    let response = client
        .get("cookies", Payload::None, Headers::new(), Options::new())
        .send()
        .unwrap();

    let session = response.cookies().get("session").unwrap();
    assert_eq!(session.value, "abc 123");
    assert_eq!(session.path.as_deref(), Some("/"));
    assert!(session.http_only);

    let theme = response.cookies().get("theme").unwrap();
    assert_eq!(theme.max_age, Some(3600));
    assert!(theme.secure);
}

#[test]
fn redirects_follow_location_option() {
    let client = client(start_server());

    let response = client
        .get("redirect", Payload::None, Headers::new(), Options::new())
        .send()
        .unwrap();
    assert_eq!(response.status_code().unwrap(), 200);
    assert_eq!(response.format(), Some("json"));

    let response = client
        .get("redirect", Payload::None, Headers::new(), options(json!({"followLocation": false})))
        .send()
        .unwrap();
    assert_eq!(response.status_code().unwrap(), 303);
    assert_eq!(response.headers().get("location"), Some("/json"));
}

#[test]
fn output_file_receives_body() {
    let client = client(start_server());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("document.json");

    let mut request = client.get("json", Payload::None, Headers::new(), Options::new());
    request.set_output_file(&path);
    let response = request.send().unwrap();

    assert!(response.content().is_none());
    let saved: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(saved["name"], "value");
}

#[test]
fn batch_send_pairs_keys_with_responses() {
    let client = client(start_server());
    let mut first = client.get("status/201", Payload::None, Headers::new(), Options::new());
    let mut second = client.get("status/404", Payload::None, Headers::new(), Options::new());

    let responses = client.batch_send([(1, &mut first), (2, &mut second)]).unwrap();
    let codes: Vec<(i32, u16)> = responses
        .iter()
        .map(|(key, response)| (*key, response.status_code().unwrap()))
        .collect();
    assert_eq!(codes, [(1, 201), (2, 404)]);
}

#[test]
fn lifecycle_hooks_and_timing() {
    let addr = start_server();
    let sent = Arc::new(AtomicUsize::new(0));
    let received = Arc::new(AtomicUsize::new(0));
    let (before, after) = (Arc::clone(&sent), Arc::clone(&received));
    let client = Client::builder()
        .base_url(format!("http://{addr}"))
        .on_before_send(move |request| {
            assert!(request.response_time().is_none());
            before.fetch_add(1, Ordering::SeqCst);
        })
        .on_after_send(move |request, response| {
            assert!(request.response_time().is_some());
            assert!(response.status_code().is_ok());
            after.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let mut request = client.create_request();
    request.set_method(HttpMethod::Head).set_url("json");
    let response = request.send().unwrap();

    assert_eq!(response.status_code().unwrap(), 200);
    assert_eq!(sent.load(Ordering::SeqCst), 1);
    assert_eq!(received.load(Ordering::SeqCst), 1);
    assert!(request.response_time().unwrap() >= 0.0);
}

#[test]
fn unreachable_server_is_transport_error() {
    let client = Client::builder().base_url("http://127.0.0.1:1").build();
    let err = client
        .get("anything", Payload::None, Headers::new(), options(json!({"timeout": 2})))
        .send()
        .unwrap_err();
    assert!(err.is_transport());
}

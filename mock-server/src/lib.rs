//! Deterministic HTTP endpoints for exercising the client end-to-end.
//!
//! Every route returns fixed content so tests can assert on format
//! detection, status handling, cookies and redirects. `/echo` reflects the
//! request back as JSON.

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{AppendHeaders, Html, IntoResponse, Redirect},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;

pub const XML_DOCUMENT: &str =
    r#"<?xml version="1.0" encoding="UTF-8"?><root><name>value</name><items><item>1</item><item>2</item></items></root>"#;

pub const HTML_DOCUMENT: &str =
    "<!DOCTYPE html>\n<html>\n<head><title>Some title</title></head>\n<body>some text</body>\n</html>";

pub const FORM_DOCUMENT: &str = "name=value&age=30";

/// What `/echo` saw.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: Map<String, Value>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/echo/{*rest}", any(echo))
        .route("/json", get(json_document))
        .route("/xml", get(xml_document))
        .route("/html", get(html_document))
        .route("/form", get(form_document))
        .route("/sniff/form", get(sniffed_form))
        .route("/status/{code}", any(status))
        .route("/cookies", get(cookies))
        .route("/redirect", get(redirect))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            (name.as_str().to_string(), Value::String(value))
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().unwrap_or_default().to_string(),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn json_document() -> Json<Value> {
    Json(json!({"name": "value", "items": [1, 2]}))
}

async fn xml_document() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/xml; charset=UTF-8")], XML_DOCUMENT)
}

async fn html_document() -> Html<&'static str> {
    Html(HTML_DOCUMENT)
}

async fn form_document() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/x-www-form-urlencoded")], FORM_DOCUMENT)
}

/// Query-string content under a content type that names no known format.
async fn sniffed_form() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], FORM_DOCUMENT)
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, format!("status {code}")))
}

async fn cookies() -> impl IntoResponse {
    (
        AppendHeaders([
            (header::SET_COOKIE, "session=abc%20123; Path=/; HttpOnly"),
            (header::SET_COOKIE, "theme=dark; Max-Age=3600; Secure"),
        ]),
        "cookies set",
    )
}

async fn redirect() -> Redirect {
    Redirect::to("/json")
}

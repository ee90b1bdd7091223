use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use ureq::tls::{parse_pem, Certificate, PemItem, RootCerts, TlsConfig};
use ureq::Agent;

use super::Transport;
use crate::client::request_log_token;
use crate::encoding::{build_query, EncodingType};
use crate::error::{ClientError, Result};
use crate::http::HttpMethod;
use crate::message::HttpMessage;
use crate::options::{as_seconds, ContextOptions, Options, IN_FILE, POST_FIELDS};
use crate::request::Request;
use crate::response::Response;

/// Content logged for a request when it is not bound to a client.
const DEFAULT_LOG_CONTENT_SIZE: usize = 2000;

const DEFAULT_MAX_REDIRECTS: u32 = 20;

/// `http` section keys the agent understands. Body options are consumed
/// by [`request_body`].
const HTTP_KEYS: [&str; 8] = [
    "timeout",
    "user_agent",
    "proxy",
    "follow_location",
    "max_redirects",
    "protocol_version",
    "post_fields",
    "in_file",
];

/// `ssl` section keys the agent understands.
const SSL_KEYS: [&str; 3] = ["verify_peer", "cafile", "capath"];

/// Blocking transport over `ureq`.
///
/// Status codes are never turned into errors: a 4xx or 5xx reply is a
/// regular [`Response`]. Only failures to complete the exchange are
/// reported as [`ClientError::Transport`]. An agent is built per request
/// from the request's options.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransport;

impl HttpTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &mut Request) -> Result<Response> {
        request.before_send();
        request.prepare()?;

        let url = request.full_url().into_owned();
        let method = request.method().as_str().to_ascii_uppercase();
        let mut header_lines = request.compose_header_lines();
        let body = request_body(request, &mut header_lines)?;

        let token = match request.client() {
            Some(client) => client.create_request_log_token(&method, &url, &header_lines, body.as_deref()),
            None => request_log_token(&method, &url, &header_lines, body.as_deref(), DEFAULT_LOG_CONTENT_SIZE),
        };
        info!("{token}");

        let agent = build_agent(request.options());
        let mut builder = ureq::http::Request::builder().method(method.as_str()).uri(url.as_str());
        for line in &header_lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim();
            if name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("host") {
                continue;
            }
            builder = builder.header(name, value.trim());
        }

        let started = Instant::now();
        let sent = match body {
            Some(body) => builder.body(body).map(|built| agent.run(built)),
            None => builder.body(()).map(|built| agent.run(built)),
        };
        let reply = sent
            .map_err(|e| ClientError::transport(format!("Unable to build request for URL: {url}"), e))?
            .map_err(|e| ClientError::transport(format!("Unable to open URL: {url}"), e))?;

        let mut lines = vec![format!(
            "{:?} {} {}",
            reply.version(),
            reply.status().as_u16(),
            reply.status().canonical_reason().unwrap_or_default()
        )
        .trim_end()
        .to_string()];
        for (name, value) in reply.headers() {
            lines.push(format!("{}: {}", name, String::from_utf8_lossy(value.as_bytes())));
        }

        let mut reader = reply.into_body().into_reader();
        let content = match request.output_file() {
            Some(path) => {
                let mut file = File::create(path)?;
                io::copy(&mut reader, &mut file)
                    .map_err(|e| ClientError::transport(format!("Unable to read response from URL: {url}"), e))?;
                None
            }
            None => {
                let mut content = Vec::new();
                reader
                    .read_to_end(&mut content)
                    .map_err(|e| ClientError::transport(format!("Unable to read response from URL: {url}"), e))?;
                Some(content)
            }
        };
        debug!(url = %url, elapsed_s = started.elapsed().as_secs_f64(), "exchange finished");

        let response = match request.client() {
            Some(client) => client.create_response(content, lines),
            None => Response::from_parts(content, lines),
        };
        request.after_send(&response);
        Ok(response)
    }
}

/// Wire body: the prepared content, else `postFields` encoded as a form,
/// else the file named by `inFile`. A `POST`, `PUT` or `PATCH` declaring
/// `Content-Length: 0` gets an empty body so the length reaches the wire.
fn request_body(request: &Request, header_lines: &mut Vec<String>) -> Result<Option<Vec<u8>>> {
    if let Some(content) = request.content() {
        return Ok(Some(content.to_vec()));
    }
    if let Some(fields) = request.options().get(POST_FIELDS) {
        if !request.headers().has("content-type") {
            header_lines.push("Content-Type: application/x-www-form-urlencoded; charset=UTF-8".to_string());
        }
        return Ok(Some(build_query(fields, EncodingType::Rfc1738).into_bytes()));
    }
    if let Some(path) = request.options().get(IN_FILE).and_then(Value::as_str) {
        return Ok(Some(fs::read(path)?));
    }
    let carries_body = matches!(request.method(), HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch);
    if carries_body && request.headers().get("content-length").map(str::trim) == Some("0") {
        return Ok(Some(Vec::new()));
    }
    Ok(None)
}

/// Agent configured from the request options, split into `http` and `ssl`
/// sections. Unsupported options are logged and ignored.
fn build_agent(options: &Options) -> Agent {
    let context = ContextOptions::compose(options);
    for key in unmapped_keys(&context) {
        debug!(option = %key, "ignoring unsupported transport option");
    }
    let http = &context.http;

    let mut config = Agent::config_builder()
        .http_status_as_error(false)
        .allow_non_standard_methods(true)
        .max_redirects_will_error(false);

    if let Some(secs) = http.get("timeout").and_then(as_seconds) {
        config = config.timeout_global(Some(Duration::from_secs_f64(secs)));
    }
    if let Some(agent) = http.get("user_agent").and_then(Value::as_str) {
        config = config.user_agent(agent);
    }
    if let Some(proxy) = http.get("proxy").and_then(Value::as_str) {
        let proxy = proxy.replacen("tcp://", "http://", 1);
        match ureq::Proxy::new(&proxy) {
            Ok(proxy) => config = config.proxy(Some(proxy)),
            Err(e) => warn!(proxy = %proxy, error = %e, "ignoring invalid proxy"),
        }
    }

    let follow = http
        .get("follow_location")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let max_redirects = http
        .get("max_redirects")
        .and_then(Value::as_u64)
        .and_then(|max| u32::try_from(max).ok())
        .unwrap_or(DEFAULT_MAX_REDIRECTS);
    config = config.max_redirects(if follow { max_redirects } else { 0 });

    if let Some(version) = http.get("protocol_version") {
        let version = version.as_str().map(str::to_string).unwrap_or_else(|| version.to_string());
        if version != "1.1" {
            debug!(version = %version, "protocol version not supported, using HTTP/1.1");
        }
    }

    if let Some(tls) = tls_config(&context.ssl) {
        config = config.tls_config(tls);
    }
    config.build().new_agent()
}

/// Keys of either section that the agent does not map, `ssl` ones with
/// their `ssl_` prefix restored.
fn unmapped_keys(context: &ContextOptions) -> Vec<String> {
    let http = context
        .http
        .keys()
        .filter(|key| !HTTP_KEYS.contains(&key.as_str()))
        .cloned();
    let ssl = context
        .ssl
        .keys()
        .filter(|key| !SSL_KEYS.contains(&key.as_str()))
        .map(|key| format!("ssl_{key}"));
    http.chain(ssl).collect()
}

fn tls_config(ssl: &Map<String, Value>) -> Option<TlsConfig> {
    let verify = ssl
        .get("verify_peer")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    let mut certs = Vec::new();
    if let Some(cafile) = ssl.get("cafile").and_then(Value::as_str) {
        load_certificates(Path::new(cafile), &mut certs);
    }
    if let Some(capath) = ssl.get("capath").and_then(Value::as_str) {
        match fs::read_dir(capath) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    if entry.path().is_file() {
                        load_certificates(&entry.path(), &mut certs);
                    }
                }
            }
            Err(e) => warn!(path = %capath, error = %e, "unable to read CA directory"),
        }
    }

    if verify && certs.is_empty() {
        return None;
    }
    let mut tls = TlsConfig::builder().disable_verification(!verify);
    if !certs.is_empty() {
        tls = tls.root_certs(RootCerts::Specific(Arc::new(certs)));
    }
    Some(tls.build())
}

fn load_certificates(path: &Path, certs: &mut Vec<Certificate<'static>>) {
    let pem = match fs::read(path) {
        Ok(pem) => pem,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unable to read CA file");
            return;
        }
    };
    for item in parse_pem(&pem) {
        match item {
            Ok(PemItem::Certificate(cert)) => certs.push(cert.to_owned()),
            Ok(_) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid PEM data");
                return;
            }
        }
    }
}

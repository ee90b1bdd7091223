//! Transport option bag.
//!
//! Options are an ordered string-keyed mapping so they can be declared in
//! configuration files and merged layer by layer (client defaults, then the
//! request's own). Keys use camelCase; transports translate them to their
//! own naming via [`ContextOptions`].

use serde_json::{Map, Value};

pub type Options = Map<String, Value>;

/// Total time budget for one exchange, in seconds (integer or float).
pub const TIMEOUT: &str = "timeout";
pub const PROXY: &str = "proxy";
pub const USER_AGENT: &str = "userAgent";
pub const FOLLOW_LOCATION: &str = "followLocation";
pub const MAX_REDIRECTS: &str = "maxRedirects";
pub const PROTOCOL_VERSION: &str = "protocolVersion";
pub const SSL_VERIFY_PEER: &str = "sslVerifyPeer";
pub const SSL_CAFILE: &str = "sslCafile";
pub const SSL_CAPATH: &str = "sslCapath";
/// Form fields left for the transport to encode (set by the curl formatter).
pub const POST_FIELDS: &str = "postFields";
/// Path of a file streamed as the request body.
pub const IN_FILE: &str = "inFile";

const SSL_PREFIX: &str = "ssl";

/// Merge `extra` into `base`. Nested mappings are merged recursively; any
/// other value in `extra` replaces the one in `base`.
pub fn merge_options(base: &mut Options, extra: Options) {
    for (key, value) in extra {
        match (base.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => merge_options(existing, nested),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Options split into the sections a socket-level transport expects:
/// `ssl*` keys lose their prefix and go to `ssl`, everything else to
/// `http`. Key names are converted from camelCase to snake_case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextOptions {
    pub http: Map<String, Value>,
    pub ssl: Map<String, Value>,
}

impl ContextOptions {
    pub fn compose(options: &Options) -> Self {
        let mut context = Self::default();
        for (key, value) in options {
            match key.strip_prefix(SSL_PREFIX).filter(|rest| starts_uppercase(rest)) {
                Some(rest) => context.ssl.insert(to_snake_case(rest), value.clone()),
                None => context.http.insert(to_snake_case(key), value.clone()),
            };
        }
        context
    }
}

fn starts_uppercase(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// `sslVerifyPeer` -> `ssl_verify_peer`, `VerifyPeer` -> `verify_peer`.
pub fn to_snake_case(key: &str) -> String {
    let mut result = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Numeric option as seconds; accepts integers and floats.
pub(crate) fn as_seconds(value: &Value) -> Option<f64> {
    value.as_f64().filter(|secs| secs.is_finite() && *secs >= 0.0)
}

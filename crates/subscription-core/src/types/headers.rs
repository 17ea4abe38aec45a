//! Raw header representation and header-value utilities
//!
//! The transport and parser layers live outside this crate; what arrives
//! here is a list of name/value pairs. Header names compare
//! case-insensitively (RFC 3261 §7.3.1), values are preserved byte-for-byte
//! as received.

use std::fmt;
use serde::{Serialize, Deserialize};

/// `Event` header name (RFC 6665)
pub const EVENT: &str = "Event";
/// `Expires` header name
pub const EXPIRES: &str = "Expires";
/// `Subscription-State` header name (RFC 6665)
pub const SUBSCRIPTION_STATE: &str = "Subscription-State";
/// `Retry-After` header name
pub const RETRY_AFTER: &str = "Retry-After";

/// A single raw SIP header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header field name as received
    pub name: String,
    /// Header field value as received, without the terminating CRLF
    pub value: String,
}

impl Header {
    /// Create a header from a name and value
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Return the leading token of a header value, with all `;name=value`
/// parameters stripped and surrounding whitespace trimmed.
pub fn strip_header_params(value: &str) -> &str {
    match value.split_once(';') {
        Some((token, _)) => token.trim(),
        None => value.trim(),
    }
}

/// Return the value of the `;name=value` parameter with the given name.
///
/// Parameter names compare case-insensitively. A valueless parameter
/// (`;name`) and an empty value (`;name=`) both read as an empty string,
/// which is distinct from `None` (parameter absent).
pub fn header_param<'a>(value: &'a str, name: &str) -> Option<&'a str> {
    for param in value.split(';').skip(1) {
        let (key, val) = match param.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (param.trim(), ""),
        };
        if key.eq_ignore_ascii_case(name) {
            return Some(val);
        }
    }
    None
}

/// Parse an `Expires`-style value: strip parameters, then read a
/// non-negative decimal integer. `None` when empty or unparsable.
pub fn parse_expires(value: &str) -> Option<u32> {
    let token = strip_header_params(value);
    if token.is_empty() {
        return None;
    }
    token.parse::<u32>().ok()
}

/// Case-insensitive lookup of the first header with the given name.
pub fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

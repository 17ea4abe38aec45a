//! SIP request methods
//!
//! Only the methods the subscription core distinguishes are carried as
//! variants; everything else folds into [`Method::Other`]. Method names are
//! case-sensitive tokens per RFC 3261 and are kept in their canonical
//! upper-case spelling.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

use crate::errors::SubscriptionError;

/// A SIP request method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// SUBSCRIBE (RFC 6665)
    Subscribe,
    /// NOTIFY (RFC 6665)
    Notify,
    /// REFER (RFC 3515)
    Refer,
    /// Any other method, carried verbatim
    Other(String),
}

impl Method {
    /// Whether this method may create or refresh a subscription
    pub fn creates_subscription(&self) -> bool {
        matches!(self, Method::Subscribe | Method::Refer)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Subscribe => write!(f, "SUBSCRIBE"),
            Method::Notify => write!(f, "NOTIFY"),
            Method::Refer => write!(f, "REFER"),
            Method::Other(m) => write!(f, "{}", m),
        }
    }
}

impl FromStr for Method {
    type Err = SubscriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.is_empty() {
            return Err(SubscriptionError::InvalidMethod(s.to_string()));
        }
        Ok(match token {
            "SUBSCRIBE" => Method::Subscribe,
            "NOTIFY" => Method::Notify,
            "REFER" => Method::Refer,
            other => Method::Other(other.to_string()),
        })
    }
}

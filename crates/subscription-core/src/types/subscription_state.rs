//! SIP Subscription-State header value (RFC 6665)
//!
//! Carried by NOTIFY requests to report the notifier's view of the
//! subscription:
//!
//! ```text
//! Subscription-State: active;expires=3600
//! Subscription-State: pending;expires=600
//! Subscription-State: terminated;reason=timeout
//! ```
//!
//! State tokens compare case-insensitively. Tokens outside the three
//! registered values are preserved as extensions; an unparsable `expires`
//! parameter reads as absent.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

use crate::errors::SubscriptionError;
use super::headers::{header_param, strip_header_params};

/// The state token of a Subscription-State header
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateToken {
    /// Notifications will be sent
    Active,
    /// The subscription awaits authorization
    Pending,
    /// The subscription has ended
    Terminated,
    /// An extension token this core does not interpret
    Extension(String),
}

impl StateToken {
    /// Parse a state token; never fails, unknown tokens become extensions
    pub fn from_token(s: &str) -> Self {
        if s.eq_ignore_ascii_case("active") {
            StateToken::Active
        } else if s.eq_ignore_ascii_case("pending") {
            StateToken::Pending
        } else if s.eq_ignore_ascii_case("terminated") {
            StateToken::Terminated
        } else {
            StateToken::Extension(s.to_string())
        }
    }
}

impl fmt::Display for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateToken::Active => write!(f, "active"),
            StateToken::Pending => write!(f, "pending"),
            StateToken::Terminated => write!(f, "terminated"),
            StateToken::Extension(s) => write!(f, "{}", s),
        }
    }
}

/// Parsed value of a `Subscription-State` header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStateHeader {
    /// The subscription state token
    pub state: StateToken,
    /// The `expires` parameter in seconds, when present and readable
    pub expires: Option<u32>,
    /// The `reason` parameter, when present (terminated state)
    pub reason: Option<String>,
}

impl SubscriptionStateHeader {
    /// An `active` state with expiry
    pub fn active(expires: u32) -> Self {
        Self {
            state: StateToken::Active,
            expires: Some(expires),
            reason: None,
        }
    }

    /// A `pending` state with expiry
    pub fn pending(expires: u32) -> Self {
        Self {
            state: StateToken::Pending,
            expires: Some(expires),
            reason: None,
        }
    }

    /// A `terminated` state with an optional reason token
    pub fn terminated(reason: Option<&str>) -> Self {
        Self {
            state: StateToken::Terminated,
            expires: None,
            reason: reason.map(str::to_string),
        }
    }

    /// The `expires` parameter, zero when absent
    pub fn expires_or_zero(&self) -> u32 {
        self.expires.unwrap_or(0)
    }
}

impl fmt::Display for SubscriptionStateHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state)?;
        if let Some(expires) = self.expires {
            write!(f, ";expires={}", expires)?;
        }
        if let Some(reason) = &self.reason {
            write!(f, ";reason={}", reason)?;
        }
        Ok(())
    }
}

impl FromStr for SubscriptionStateHeader {
    type Err = SubscriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = strip_header_params(s);
        if token.is_empty() {
            return Err(SubscriptionError::InvalidHeader(format!(
                "Subscription-State header has no state token: {:?}",
                s
            )));
        }
        Ok(SubscriptionStateHeader {
            state: StateToken::from_token(token),
            expires: header_param(s, "expires").and_then(|v| v.parse::<u32>().ok()),
            reason: header_param(s, "reason").map(str::to_string),
        })
    }
}

//! SIP Event header value (RFC 6665)
//!
//! The Event header names the event package a subscription carries and an
//! optional `id` parameter used to match subscriptions with notifications:
//!
//! ```text
//! Event: presence
//! Event: presence;id=q876098
//! Event: refer;id=93809824
//! ```
//!
//! The package token is case-sensitive as received. Parameters other than
//! `id` are tolerated and ignored by the core.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

use crate::errors::SubscriptionError;
use super::headers::{header_param, strip_header_params};

/// Parsed value of an `Event` header
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    /// Event package name, e.g. `presence`, `dialog`, `refer`
    pub package: String,
    /// The `id` parameter, when present
    pub id: Option<String>,
}

impl Event {
    /// Create an Event value with the given package name
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            id: None,
        }
    }

    /// Set the `id` parameter
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The `id` parameter, empty string when absent
    pub fn id_or_empty(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.package)?;
        if let Some(id) = &self.id {
            write!(f, ";id={}", id)?;
        }
        Ok(())
    }
}

impl FromStr for Event {
    type Err = SubscriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let package = strip_header_params(s);
        if package.is_empty() {
            return Err(SubscriptionError::InvalidHeader(format!(
                "Event header has no package token: {:?}",
                s
            )));
        }
        Ok(Event {
            package: package.to_string(),
            id: header_param(s, "id").map(str::to_string),
        })
    }
}

//! Parsed request and reply structures
//!
//! The SIP stack's parser hands these to the subscription core; only the
//! fields the core consumes are modeled. Both carry their raw header list
//! with case-insensitive name lookup.

use serde::{Serialize, Deserialize};

use super::headers::{find_header, Header};
use super::method::Method;

/// A parsed inbound or outbound SIP request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipRequest {
    /// Request method
    pub method: Method,
    /// CSeq sequence number
    pub cseq: u32,
    /// Raw headers in received order
    pub headers: Vec<Header>,
}

impl SipRequest {
    /// Create a request with the given method and CSeq
    pub fn new(method: Method, cseq: u32) -> Self {
        Self {
            method,
            cseq,
            headers: Vec::new(),
        }
    }

    /// Append a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    /// First header value with the given name, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A parsed final or provisional SIP reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipReply {
    /// Response status code
    pub code: u16,
    /// Reason phrase
    pub reason: String,
    /// CSeq sequence number of the transaction this reply belongs to
    pub cseq: u32,
    /// Method from the CSeq header
    pub cseq_method: Method,
    /// To-tag carried by the reply, empty when absent
    pub to_tag: String,
    /// Record-route set as received, empty when absent
    pub route: String,
    /// Raw headers in received order
    pub headers: Vec<Header>,
}

impl SipReply {
    /// Create a reply for the transaction identified by `cseq`/`cseq_method`
    pub fn new(code: u16, reason: impl Into<String>, cseq: u32, cseq_method: Method) -> Self {
        Self {
            code,
            reason: reason.into(),
            cseq,
            cseq_method,
            to_tag: String::new(),
            route: String::new(),
            headers: Vec::new(),
        }
    }

    /// Set the To-tag
    pub fn with_to_tag(mut self, tag: impl Into<String>) -> Self {
        self.to_tag = tag.into();
        self
    }

    /// Set the record-route set
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = route.into();
        self
    }

    /// Append a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    /// First header value with the given name, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Whether this is a final reply
    pub fn is_final(&self) -> bool {
        self.code >= 200
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::headers::EXPIRES;

    #[test]
    fn test_request_header_lookup() {
        let req = SipRequest::new(Method::Subscribe, 1)
            .with_header("Event", "presence;id=a")
            .with_header("Expires", "3600");
        assert_eq!(req.header("event"), Some("presence;id=a"));
        assert_eq!(req.header(EXPIRES), Some("3600"));
        assert_eq!(req.header("Subscription-State"), None);
    }

    #[test]
    fn test_reply_builder() {
        let reply = SipReply::new(200, "OK", 1, Method::Subscribe)
            .with_to_tag("remote-1")
            .with_route("<sip:proxy.example.com;lr>")
            .with_header("Expires", "3600");
        assert!(reply.is_final());
        assert_eq!(reply.to_tag, "remote-1");
        assert_eq!(reply.header("expires"), Some("3600"));
    }

    #[test]
    fn test_provisional_is_not_final() {
        let reply = SipReply::new(180, "Ringing", 2, Method::Notify);
        assert!(!reply.is_final());
    }
}

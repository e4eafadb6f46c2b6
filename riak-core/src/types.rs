//! Core data types shared by the Riak HTTP client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response header map. Names are lower-cased; repeated headers keep every
/// value in arrival order.
pub type Headers = BTreeMap<String, Vec<String>>;

/// User metadata attached to an object (`X-Riak-Meta-*` headers), keyed on the
/// lower-cased suffix.
pub type Meta = BTreeMap<String, String>;

pub const CONTENT_TYPE: &str = "content-type";
pub const LOCATION: &str = "location";
pub const LINK: &str = "link";
pub const ETAG: &str = "etag";
pub const LAST_MODIFIED: &str = "last-modified";
pub const VCLOCK: &str = "x-riak-vclock";
pub const META_PREFIX: &str = "x-riak-meta-";
pub const CLIENT_ID: &str = "x-riak-clientid";

/// Accessors over a [`Headers`] map with case-insensitive lookup.
pub trait HeadersExt {
    /// First value of the named header.
    fn first(&self, name: &str) -> Option<&str>;

    /// Every value of the named header.
    fn all(&self, name: &str) -> &[String];

    /// Append a value, lower-casing the header name.
    fn append_value(&mut self, name: &str, value: impl Into<String>);
}

impl HeadersExt for Headers {
    fn first(&self, name: &str) -> Option<&str> {
        self.all(name).first().map(String::as_str)
    }

    fn all(&self, name: &str) -> &[String] {
        match self.get(&name.to_ascii_lowercase()) {
            Some(values) => values.as_slice(),
            None => &[],
        }
    }

    fn append_value(&mut self, name: &str, value: impl Into<String>) {
        self.entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }
}

/// Opaque causality token issued by the store.
///
/// Never interpreted locally; it is only forwarded on subsequent requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VClock(String);

impl VClock {
    pub fn new(token: impl Into<String>) -> Self {
        VClock(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VClock {
    fn from(token: &str) -> Self {
        VClock::new(token)
    }
}

impl From<String> for VClock {
    fn from(token: String) -> Self {
        VClock(token)
    }
}

impl std::fmt::Display for VClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse an HTTP date (`Mon, 12 Jul 2010 21:37:43 GMT`).
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Render a timestamp in IMF-fixdate form for conditional requests.
pub fn format_http_date(time: &DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

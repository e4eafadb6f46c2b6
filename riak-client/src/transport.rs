//! Verb-based request/response primitives and the transport seam
//!
//! The client never talks to sockets directly. It builds a [`Request`], hands
//! it to a [`Transport`] and checks the returned status against the codes the
//! request expects.

use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use riak_core::{Headers, HeadersExt};

use crate::Result;

const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Head,
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Head => "HEAD",
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing request. `path` is already escaped.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    /// Acceptable status codes; empty accepts anything.
    pub expect: Vec<u16>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Request {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            expect: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Request::new(Method::Get, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Request::new(Method::Put, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Request::new(Method::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Request::new(Method::Delete, path)
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn expect(mut self, codes: &[u16]) -> Self {
        self.expect = codes.to_vec();
        self
    }

    /// First value of a request header, case-insensitive.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Path plus the encoded query string.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(name, QUERY_COMPONENT),
                    utf8_percent_encode(value, QUERY_COMPONENT)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }

    pub fn accepts(&self, status: u16) -> bool {
        self.expect.is_empty() || self.expect.contains(&status)
    }
}

/// A buffered response with lower-cased, multi-valued headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Response {
            status,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append_value(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.first(name)
    }
}

/// HTTP backend consumed by the client.
///
/// Implementations perform exactly one exchange and return whatever status
/// the server produced; status checking happens in [`crate::Client::request`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(&self, request: &Request) -> Result<Response>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_and_query() {
        let request = Request::get("/riak/people/sean")
            .query("r", 2)
            .query("returnbody", true);
        assert_eq!(request.path_and_query(), "/riak/people/sean?r=2&returnbody=true");
        assert_eq!(Request::get("/riak").path_and_query(), "/riak");

        let encoded = Request::get("/buckets/b/index/i_bin/x").query("continuation", "g2o=+/x");
        assert_eq!(
            encoded.path_and_query(),
            "/buckets/b/index/i_bin/x?continuation=g2o%3D%2B%2Fx"
        );
    }

    #[test]
    fn test_accepts() {
        assert!(Request::get("/").accepts(500));
        let request = Request::get("/").expect(&[200, 304]);
        assert!(request.accepts(304));
        assert!(!request.accepts(404));
    }

    #[test]
    fn test_header_lookup() {
        let request = Request::put("/riak/a/b").header("Content-Type", "text/plain");
        assert_eq!(request.header_value("content-type"), Some("text/plain"));
        assert_eq!(request.header_value("link"), None);

        let response = Response::new(200).with_header("ETag", "abc");
        assert_eq!(response.header("etag"), Some("abc"));
    }
}

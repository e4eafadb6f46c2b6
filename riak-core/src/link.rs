//! Typed, directed links between stored objects

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::escape::unescape;
use crate::{Result, RiakError, WalkSpec};

static LINK_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<([^>]+)>\s*;\s*(?:rel|riaktag)="([^"]+)""#).expect("link pattern is valid")
});

/// A tagged edge from one object to another resource, as carried in the
/// HTTP `Link` header.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Link {
    url: String,
    rel: String,
}

impl Link {
    pub fn new(url: impl Into<String>, rel: impl Into<String>) -> Self {
        Link {
            url: url.into(),
            rel: rel.into(),
        }
    }

    /// Parse a `Link` header value made of `<url>; rel="tag"` entries.
    ///
    /// Entries that do not match the syntax are skipped.
    pub fn parse(header: &str) -> Vec<Link> {
        LINK_ENTRY
            .captures_iter(header)
            .map(|caps| Link::new(&caps[1], &caps[2]))
            .collect()
    }

    /// Render a full header value, joining entries with `, `.
    pub fn to_header<'a>(links: impl IntoIterator<Item = &'a Link>) -> String {
        links
            .into_iter()
            .map(Link::to_header_fragment)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn rel(&self) -> &str {
        &self.rel
    }

    /// Alias for [`Link::rel`]; Riak calls the relation a tag.
    pub fn tag(&self) -> &str {
        &self.rel
    }

    /// Bucket named by the link target (`/<prefix>/<bucket>/...`).
    pub fn bucket(&self) -> Option<String> {
        self.segment(1)
    }

    /// Key named by the link target (`/<prefix>/<bucket>/<key>`).
    pub fn key(&self) -> Option<String> {
        self.segment(2)
    }

    pub fn to_header_fragment(&self) -> String {
        format!("<{}>; rel=\"{}\"", self.url, self.rel)
    }

    /// Walk step that follows links like this one.
    pub fn to_walk_spec(&self) -> Result<WalkSpec> {
        if self.rel == "up" {
            return Err(RiakError::InvalidLink(
                "an 'up' link points at a bucket and cannot be walked".to_string(),
            ));
        }
        let bucket = self
            .bucket()
            .ok_or_else(|| RiakError::InvalidLink(format!("no bucket in '{}'", self.url)))?;
        if self.key().is_none() {
            return Err(RiakError::InvalidLink(format!(
                "no key in '{}', bucket links cannot be walked",
                self.url
            )));
        }
        Ok(WalkSpec::new(Some(&bucket), Some(&self.rel), false))
    }

    fn segment(&self, index: usize) -> Option<String> {
        let path = self.url.strip_prefix('/')?;
        path.split('/')
            .nth(index)
            .filter(|segment| !segment.is_empty())
            .map(unescape)
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}>; rel=\"{}\"", self.url, self.rel)
    }
}

//! Link-walk query terms
//!
//! A walk is a sequence of hops. Each hop filters the links of the current
//! result set by bucket and tag, and optionally keeps the intermediate objects
//! in the response. The remote resource expects each hop rendered as
//! `bucket,tag,keep` with `_` for "any", hops joined by `/`.

use serde::{Deserialize, Serialize};

use crate::escape::escape;
use crate::{Link, Result, RiakError};

const WILDCARD: &str = "_";

/// One normalized walk hop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WalkSpec {
    bucket: Option<String>,
    tag: Option<String>,
    keep: bool,
}

/// Loosely typed hop criteria; absent or empty fields mean "any".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkFilter {
    pub bucket: Option<String>,
    pub tag: Option<String>,
    pub keep: bool,
}

/// Anything accepted by [`WalkSpec::normalize`].
///
/// Positional tokens are consumed three at a time as `bucket, tag, keep`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkTerm {
    Spec(WalkSpec),
    Filter(WalkFilter),
    Token(String),
}

impl WalkSpec {
    pub fn new(bucket: Option<&str>, tag: Option<&str>, keep: bool) -> Self {
        WalkSpec {
            bucket: filter(bucket),
            tag: filter(tag),
            keep,
        }
    }

    /// A hop matching every link.
    pub fn any() -> Self {
        WalkSpec::default()
    }

    pub fn with_bucket(mut self, bucket: &str) -> Self {
        self.bucket = filter(Some(bucket));
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = filter(Some(tag));
        self
    }

    pub fn with_keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn keep(&self) -> bool {
        self.keep
    }

    /// Normalize mixed walk terms into one spec per hop, preserving order.
    pub fn normalize<I, T>(terms: I) -> Result<Vec<WalkSpec>>
    where
        I: IntoIterator<Item = T>,
        T: Into<WalkTerm>,
    {
        let mut terms = terms.into_iter().map(Into::into);
        let mut specs = Vec::new();

        while let Some(term) = terms.next() {
            match term {
                WalkTerm::Spec(spec) => specs.push(spec),
                WalkTerm::Filter(criteria) => specs.push(criteria.into()),
                WalkTerm::Token(bucket) => {
                    let tag = next_token(&mut terms, &bucket)?;
                    let keep = next_token(&mut terms, &bucket)?;
                    specs.push(WalkSpec::new(Some(&bucket), Some(&tag), parse_keep(&keep)?));
                }
            }
        }

        Ok(specs)
    }

    /// Render this hop as `bucket,tag,keep`.
    pub fn to_path_segment(&self) -> String {
        format!(
            "{},{},{}",
            self.bucket.as_deref().map(escape).unwrap_or_else(|| WILDCARD.to_string()),
            self.tag.as_deref().map(escape).unwrap_or_else(|| WILDCARD.to_string()),
            if self.keep { "1" } else { WILDCARD }
        )
    }

    /// Render a multi-hop path expression.
    pub fn to_path(specs: &[WalkSpec]) -> String {
        specs
            .iter()
            .map(WalkSpec::to_path_segment)
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Whether `link` would be followed by this hop.
    pub fn matches(&self, link: &Link) -> bool {
        let bucket_ok = match &self.bucket {
            None => true,
            Some(bucket) => link.bucket().as_deref() == Some(bucket.as_str()),
        };
        let tag_ok = match &self.tag {
            None => true,
            Some(tag) => link.rel() == tag,
        };
        bucket_ok && tag_ok
    }
}

impl std::fmt::Display for WalkSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_path_segment())
    }
}

impl From<WalkFilter> for WalkSpec {
    fn from(criteria: WalkFilter) -> Self {
        WalkSpec::new(criteria.bucket.as_deref(), criteria.tag.as_deref(), criteria.keep)
    }
}

impl From<WalkSpec> for WalkTerm {
    fn from(spec: WalkSpec) -> Self {
        WalkTerm::Spec(spec)
    }
}

impl From<&WalkSpec> for WalkTerm {
    fn from(spec: &WalkSpec) -> Self {
        WalkTerm::Spec(spec.clone())
    }
}

impl From<WalkFilter> for WalkTerm {
    fn from(criteria: WalkFilter) -> Self {
        WalkTerm::Filter(criteria)
    }
}

impl From<&str> for WalkTerm {
    fn from(token: &str) -> Self {
        WalkTerm::Token(token.to_string())
    }
}

impl From<String> for WalkTerm {
    fn from(token: String) -> Self {
        WalkTerm::Token(token)
    }
}

fn filter(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| !v.is_empty() && *v != WILDCARD)
        .map(str::to_string)
}

fn next_token(terms: &mut impl Iterator<Item = WalkTerm>, bucket: &str) -> Result<String> {
    match terms.next() {
        Some(WalkTerm::Token(token)) => Ok(token),
        _ => Err(RiakError::InvalidWalkSpec(format!(
            "positional walk terms come in (bucket, tag, keep) triples; incomplete triple starting at '{}'",
            bucket
        ))),
    }
}

fn parse_keep(token: &str) -> Result<bool> {
    match token {
        "1" | "true" => Ok(true),
        "" | "_" | "0" | "false" => Ok(false),
        other => Err(RiakError::InvalidWalkSpec(format!(
            "keep must be one of 1, true, _, 0, false; got '{}'",
            other
        ))),
    }
}

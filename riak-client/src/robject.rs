//! Stored objects: load, store, reload, siblings, delete and link walking

use bytes::Bytes;
use chrono::{DateTime, Utc};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use riak_core::escape::unescape;
use riak_core::multipart::{self, Part};
use riak_core::types::{
    format_http_date, parse_http_date, CONTENT_TYPE, ETAG, LAST_MODIFIED, LINK, LOCATION,
    META_PREFIX, VCLOCK,
};
use riak_core::{Headers, HeadersExt, Link, Meta, Payload, VClock, WalkSpec, WalkTerm};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::transport::{Request, Response};
use crate::{Bucket, ClientError, Result};

static WALK_LOCATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/.*/([^/]*)/([^/]*)$").expect("location pattern is valid"));

/// Read or write quorum sent as a query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quorum {
    One,
    Quorum,
    All,
    Default,
    N(u32),
}

impl std::fmt::Display for Quorum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quorum::One => f.write_str("one"),
            Quorum::Quorum => f.write_str("quorum"),
            Quorum::All => f.write_str("all"),
            Quorum::Default => f.write_str("default"),
            Quorum::N(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Ask the store to echo the written object so it can be reloaded in place.
    pub returnbody: bool,
    pub r: Option<Quorum>,
    pub w: Option<Quorum>,
    pub dw: Option<Quorum>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            returnbody: true,
            r: None,
            w: None,
            dw: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadOptions {
    pub r: Option<Quorum>,
    /// Reload even when no vector clock is known.
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub rw: Option<Quorum>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    New,
    Stored,
    Deleted,
}

/// Data and metadata stored at a bucket/key pair.
#[derive(Clone)]
pub struct RObject {
    bucket: Bucket,
    key: Option<String>,
    content_type: Option<String>,
    /// Raw multipart body while in conflict.
    data: Option<Payload>,
    vclock: Option<VClock>,
    links: BTreeSet<Link>,
    etag: Option<String>,
    last_modified: Option<DateTime<Utc>>,
    meta: Meta,
    conflict: bool,
    siblings: OnceCell<Vec<RObject>>,
    state: ObjectState,
}

impl RObject {
    /// A new object; without a key the store assigns one on first `store`.
    pub fn new(bucket: Bucket, key: Option<String>) -> Self {
        RObject {
            bucket,
            key,
            content_type: None,
            data: None,
            vclock: None,
            links: BTreeSet::new(),
            etag: None,
            last_modified: None,
            meta: Meta::new(),
            conflict: false,
            siblings: OnceCell::new(),
            state: ObjectState::New,
        }
    }

    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = Some(key.into());
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    pub fn data(&self) -> Option<&Payload> {
        self.data.as_ref()
    }

    pub fn set_data(&mut self, data: impl Into<Payload>) {
        self.data = Some(data.into());
    }

    /// Decode the payload into a typed value.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match &self.data {
            Some(payload) => Ok(Some(payload.decode()?)),
            None => Ok(None),
        }
    }

    pub fn vclock(&self) -> Option<&VClock> {
        self.vclock.as_ref()
    }

    pub fn set_vclock(&mut self, vclock: impl Into<VClock>) {
        self.vclock = Some(vclock.into());
    }

    pub fn links(&self) -> &BTreeSet<Link> {
        &self.links
    }

    pub fn links_mut(&mut self) -> &mut BTreeSet<Link> {
        &mut self.links
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn last_modified(&self) -> Option<&DateTime<Utc>> {
        self.last_modified.as_ref()
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    pub fn is_conflict(&self) -> bool {
        self.conflict
    }

    pub fn state(&self) -> ObjectState {
        self.state
    }

    /// Replace this object's state with what a response describes.
    ///
    /// Headers that are absent leave the matching field untouched, except
    /// metadata which always mirrors the response.
    pub fn load(&mut self, response: &Response) -> Result<&mut Self> {
        self.load_message(Some(response.status), &response.headers, &response.body)?;
        Ok(self)
    }

    fn load_message(&mut self, status: Option<u16>, headers: &Headers, body: &Bytes) -> Result<()> {
        if let Some(location) = headers.first(LOCATION) {
            if let Some(segment) = location.rsplit('/').next().filter(|s| !s.is_empty()) {
                self.key = Some(unescape(segment));
            }
        }
        if let Some(content_type) = headers.first(CONTENT_TYPE) {
            self.content_type = Some(content_type.to_string());
        }
        if let Some(vclock) = headers.first(VCLOCK) {
            self.vclock = Some(VClock::from(vclock));
        }
        let link_headers = headers.all(LINK);
        if !link_headers.is_empty() {
            self.links = link_headers.iter().flat_map(|h| Link::parse(h)).collect();
        }
        if let Some(etag) = headers.first(ETAG) {
            self.etag = Some(etag.to_string());
        }
        if let Some(date) = headers.first(LAST_MODIFIED) {
            self.last_modified = parse_http_date(date);
        }
        self.meta = extract_meta(headers);

        let content_type = self.content_type.as_deref().unwrap_or_default();
        let was_conflict = self.conflict;
        self.conflict =
            status == Some(300) && content_type.to_ascii_lowercase().contains("multipart/mixed");
        self.siblings = OnceCell::new();

        if !body.is_empty() {
            if self.conflict {
                debug!("Conflicting load of {} ({} bytes)", self.describe(), body.len());
                self.data = Some(Payload::Raw(body.clone()));
            } else {
                let payload = self
                    .bucket
                    .client()
                    .serializers()
                    .deserialize(content_type, &self.meta, body)?;
                self.data = Some(payload);
            }
        } else if was_conflict && !self.conflict {
            // the multipart body no longer describes this object
            self.data = None;
        }

        if self.key.is_some() {
            self.state = ObjectState::Stored;
        }
        Ok(())
    }

    /// Write the object. Without a key the store assigns one.
    pub async fn store(&mut self, options: StoreOptions) -> Result<&mut Self> {
        self.ensure_live()?;
        let content_type = match self.content_type.as_deref().filter(|c| !c.is_empty()) {
            Some(content_type) => content_type.to_string(),
            None => {
                return Err(ClientError::Precondition(
                    "content type must be set before storing".to_string(),
                ))
            }
        };

        let client = self.bucket.client().clone();
        let path = client.object_path(self.bucket.name(), self.key.as_deref());
        let mut request = match self.key {
            Some(_) => Request::put(path).expect(&[200, 204, 300]),
            None => Request::post(path).expect(&[201]),
        };

        request = request.query("returnbody", options.returnbody);
        for (name, quorum) in [("r", options.r), ("w", options.w), ("dw", options.dw)] {
            if let Some(quorum) = quorum {
                request = request.query(name, quorum);
            }
        }

        request = request.header("Content-Type", content_type.clone());
        for (name, value) in self.store_headers() {
            request = request.header(name, value);
        }

        let body = match &self.data {
            Some(payload) => client.serializers().serialize(&content_type, &self.meta, payload)?,
            None => Bytes::new(),
        };
        let response = client.request(request.body(body)).await?;
        self.load(&response)?;
        self.state = ObjectState::Stored;
        Ok(self)
    }

    fn store_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(vclock) = &self.vclock {
            headers.push(("X-Riak-Vclock".to_string(), vclock.to_string()));
        }
        let links: Vec<&Link> = self.links.iter().filter(|l| l.rel() != "up").collect();
        if !links.is_empty() {
            headers.push(("Link".to_string(), Link::to_header(links)));
        }
        for (name, value) in &self.meta {
            headers.push((format!("X-Riak-Meta-{}", name), value.clone()));
        }
        headers
    }

    /// Refresh from the store using a conditional GET.
    ///
    /// Does nothing without a key, or without a vector clock unless forced.
    pub async fn reload(&mut self, options: ReloadOptions) -> Result<&mut Self> {
        self.ensure_live()?;
        if self.key.is_none() || (self.vclock.is_none() && !options.force) {
            return Ok(self);
        }
        let key = self.key.clone().unwrap_or_default();

        let client = self.bucket.client().clone();
        let codes: &[u16] = if self.bucket.allow_mult() {
            &[200, 300, 304]
        } else {
            &[200, 304]
        };
        let mut request = Request::get(client.object_path(self.bucket.name(), Some(&key))).expect(codes);
        if let Some(r) = options.r {
            request = request.query("r", r);
        }
        if let Some(etag) = self.etag.as_deref().filter(|e| !e.is_empty()) {
            request = request.header("If-None-Match", etag);
        }
        if let Some(last_modified) = &self.last_modified {
            request = request.header("If-Modified-Since", format_http_date(last_modified));
        }

        let response = client.request(request).await?;
        if response.status == 304 {
            debug!("{} not modified", self.describe());
        } else {
            self.load(&response)?;
        }
        Ok(self)
    }

    /// Remove the object from the store. The instance is unusable afterwards.
    pub async fn delete(&mut self, options: DeleteOptions) -> Result<()> {
        self.ensure_live()?;
        let key = match &self.key {
            Some(key) => key.clone(),
            None => return Ok(()),
        };
        self.bucket.delete(&key, options).await?;
        self.state = ObjectState::Deleted;
        Ok(())
    }

    /// Conflicting versions of this object, or just this object when there
    /// is no conflict. Parsed once per load.
    pub fn siblings(&self) -> Result<&[RObject]> {
        if !self.conflict {
            return Ok(std::slice::from_ref(self));
        }
        let siblings = self.siblings.get_or_try_init(|| self.parse_siblings())?;
        Ok(siblings.as_slice())
    }

    fn parse_siblings(&self) -> Result<Vec<RObject>> {
        let content_type = self.content_type.as_deref().unwrap_or_default();
        let boundary = multipart::extract_boundary(content_type).ok_or_else(|| {
            ClientError::InvalidResponse(format!(
                "conflicting response for {} has no multipart boundary",
                self.describe()
            ))
        })?;
        let body = match &self.data {
            Some(Payload::Raw(body)) => body.clone(),
            _ => Bytes::new(),
        };
        let parsed = multipart::parse(&body, &boundary);
        for diagnostic in &parsed.diagnostics {
            warn!("Sibling body of {}: {:?}", self.describe(), diagnostic);
        }

        parsed
            .parts()
            .into_iter()
            .map(|part| {
                let mut sibling = RObject::new(self.bucket.clone(), self.key.clone());
                sibling.load_part(part)?;
                sibling.vclock = self.vclock.clone();
                Ok(sibling)
            })
            .collect()
    }

    fn load_part(&mut self, part: &Part) -> Result<()> {
        self.load_message(None, &part.headers, &part.body)
    }

    /// Follow links from this object. Returns one group of objects per hop
    /// whose results the store returned.
    pub async fn walk<I, T>(&self, terms: I) -> Result<Vec<Vec<RObject>>>
    where
        I: IntoIterator<Item = T>,
        T: Into<WalkTerm>,
    {
        self.ensure_live()?;
        let key = self.key.as_deref().ok_or_else(|| {
            ClientError::Precondition("cannot walk from an object without a key".to_string())
        })?;
        let specs = WalkSpec::normalize(terms)?;
        if specs.is_empty() {
            return Err(ClientError::Precondition(
                "a walk needs at least one hop".to_string(),
            ));
        }

        let client = self.bucket.client().clone();
        let path = format!(
            "{}/{}",
            client.object_path(self.bucket.name(), Some(key)),
            WalkSpec::to_path(&specs)
        );
        let response = client.request(Request::get(path).expect(&[200])).await?;

        let boundary = match response.header(CONTENT_TYPE).and_then(multipart::extract_boundary) {
            Some(boundary) => boundary,
            None => return Ok(Vec::new()),
        };
        let parsed = multipart::parse(&response.body, &boundary);
        for diagnostic in &parsed.diagnostics {
            warn!("Walk from {}: {:?}", self.describe(), diagnostic);
        }

        let mut groups = Vec::new();
        for group in parsed.groups() {
            let mut objects = Vec::new();
            for part in group {
                let location = match part.headers.first(LOCATION) {
                    Some(location) => location,
                    None => continue,
                };
                let Some(caps) = WALK_LOCATION.captures(location) else {
                    debug!("Skipping walk result with location {}", location);
                    continue;
                };
                let bucket = client.bucket(unescape(&caps[1]));
                let mut object = RObject::new(bucket, Some(unescape(&caps[2])));
                object.load_part(part)?;
                objects.push(object);
            }
            groups.push(objects);
        }
        Ok(groups)
    }

    /// A link to this object tagged `tag`.
    pub fn to_link(&self, tag: &str) -> Result<Link> {
        let key = self.key.as_deref().ok_or_else(|| {
            ClientError::Precondition("cannot link to an object without a key".to_string())
        })?;
        let path = self.bucket.client().object_path(self.bucket.name(), Some(key));
        Ok(Link::new(path, tag))
    }

    /// Absolute URL of the object, or of its bucket when there is no key.
    pub fn url(&self) -> String {
        let client = self.bucket.client();
        client.url(&client.object_path(self.bucket.name(), self.key.as_deref()))
    }

    fn ensure_live(&self) -> Result<()> {
        if self.state == ObjectState::Deleted {
            return Err(ClientError::ObjectDeleted {
                bucket: self.bucket.name().to_string(),
                key: self.key.clone().unwrap_or_default(),
            });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.bucket.name(), self.key.as_deref().unwrap_or("<new>"))
    }
}

impl std::fmt::Debug for RObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RObject")
            .field("url", &self.url())
            .field("content_type", &self.content_type)
            .field("data", &self.data)
            .field("vclock", &self.vclock)
            .field("conflict", &self.conflict)
            .field("state", &self.state)
            .finish()
    }
}

fn extract_meta(headers: &Headers) -> Meta {
    headers
        .iter()
        .filter_map(|(name, values)| {
            name.strip_prefix(META_PREFIX)
                .map(|suffix| (suffix.to_string(), values.join(", ")))
        })
        .collect()
}

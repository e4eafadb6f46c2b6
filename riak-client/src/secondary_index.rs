//! Secondary index queries with pagination
//!
//! A query is validated against the server capabilities when it is built, so
//! an unsupported option fails before anything is sent. Results are fetched
//! on first access and cached; [`SecondaryIndex::next_page`] returns a new
//! query resuming from the continuation token.

use bytes::Bytes;
use riak_core::escape::escape;
use riak_core::Payload;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ops::{Range, RangeInclusive};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::transport::Request;
use crate::{Bucket, ClientError, Result};

/// An index term: integer indexes end in `_int`, binary ones in `_bin`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexValue {
    Int(i64),
    Bin(String),
}

impl std::fmt::Display for IndexValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexValue::Int(n) => write!(f, "{}", n),
            IndexValue::Bin(s) => f.write_str(s),
        }
    }
}

impl From<i64> for IndexValue {
    fn from(n: i64) -> Self {
        IndexValue::Int(n)
    }
}

impl From<&str> for IndexValue {
    fn from(s: &str) -> Self {
        IndexValue::Bin(s.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(s: String) -> Self {
        IndexValue::Bin(s)
    }
}

/// An exact match or an inclusive range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexQuery {
    Exact(IndexValue),
    Range(IndexValue, IndexValue),
}

impl IndexQuery {
    fn path_segments(&self) -> Vec<String> {
        match self {
            IndexQuery::Exact(value) => vec![escape(&value.to_string())],
            IndexQuery::Range(start, end) => {
                vec![escape(&start.to_string()), escape(&end.to_string())]
            }
        }
    }
}

impl From<i64> for IndexQuery {
    fn from(n: i64) -> Self {
        IndexQuery::Exact(IndexValue::Int(n))
    }
}

impl From<&str> for IndexQuery {
    fn from(s: &str) -> Self {
        IndexQuery::Exact(s.into())
    }
}

impl From<String> for IndexQuery {
    fn from(s: String) -> Self {
        IndexQuery::Exact(s.into())
    }
}

impl From<IndexValue> for IndexQuery {
    fn from(value: IndexValue) -> Self {
        IndexQuery::Exact(value)
    }
}

impl From<RangeInclusive<i64>> for IndexQuery {
    fn from(range: RangeInclusive<i64>) -> Self {
        let (start, end) = range.into_inner();
        IndexQuery::Range(IndexValue::Int(start), IndexValue::Int(end))
    }
}

/// Half-open integer ranges are sent as the equivalent inclusive range.
/// Half-open ranges are sent as `start..=end-1`; an empty range has no
/// inclusive form and is rejected.
impl TryFrom<Range<i64>> for IndexQuery {
    type Error = ClientError;

    fn try_from(range: Range<i64>) -> Result<Self> {
        match range.end.checked_sub(1) {
            Some(last) if range.start <= last => {
                Ok(IndexQuery::Range(IndexValue::Int(range.start), IndexValue::Int(last)))
            }
            _ => Err(ClientError::Precondition(format!(
                "empty index range {}..{}",
                range.start, range.end
            ))),
        }
    }
}

impl From<RangeInclusive<&str>> for IndexQuery {
    fn from(range: RangeInclusive<&str>) -> Self {
        let (start, end) = range.into_inner();
        IndexQuery::Range(start.into(), end.into())
    }
}

impl From<RangeInclusive<String>> for IndexQuery {
    fn from(range: RangeInclusive<String>) -> Self {
        let (start, end) = range.into_inner();
        IndexQuery::Range(start.into(), end.into())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub continuation: Option<String>,
    pub max_results: Option<u32>,
    pub return_terms: bool,
    pub stream: bool,
}

impl IndexOptions {
    fn paginated(&self) -> bool {
        self.continuation.is_some() || self.max_results.is_some()
    }
}

/// One page of index results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexCollection {
    pub keys: Vec<String>,
    /// `(term, key)` pairs, present when terms were requested.
    pub terms: Option<Vec<(String, String)>>,
    pub continuation: Option<String>,
}

#[derive(Deserialize)]
struct IndexBody {
    #[serde(default)]
    keys: Option<Vec<String>>,
    #[serde(default)]
    results: Option<Vec<BTreeMap<String, String>>>,
    #[serde(default)]
    continuation: Option<String>,
}

impl IndexCollection {
    fn from_json(body: &[u8]) -> Result<Self> {
        let parsed: IndexBody = serde_json::from_slice(body)
            .map_err(|e| ClientError::InvalidResponse(format!("index body is not JSON: {}", e)))?;

        let mut collection = IndexCollection {
            continuation: parsed.continuation,
            ..Default::default()
        };
        if let Some(results) = parsed.results {
            let terms: Vec<(String, String)> = results.into_iter().flatten().collect();
            collection.keys = terms.iter().map(|(_, key)| key.clone()).collect();
            collection.terms = Some(terms);
        } else if let Some(keys) = parsed.keys {
            collection.keys = keys;
        }
        Ok(collection)
    }
}

/// A secondary index query against one bucket.
pub struct SecondaryIndex {
    bucket: Bucket,
    index: String,
    query: IndexQuery,
    options: IndexOptions,
    collection: OnceCell<IndexCollection>,
    values: OnceCell<Vec<Payload>>,
}

impl SecondaryIndex {
    /// Build a query, rejecting options the server cannot honour.
    pub fn new(
        bucket: Bucket,
        index: impl Into<String>,
        query: impl Into<IndexQuery>,
        options: IndexOptions,
    ) -> Result<Self> {
        let capabilities = bucket.client().capabilities();
        if options.paginated() && !capabilities.index_pagination() {
            return Err(ClientError::Capability(
                "index pagination requires server 1.4.0 or later".to_string(),
            ));
        }
        if options.return_terms && !capabilities.index_return_terms() {
            return Err(ClientError::Capability(
                "returning index terms requires server 1.4.0 or later".to_string(),
            ));
        }
        if options.stream {
            return Err(ClientError::Capability(
                "streaming index results is not supported".to_string(),
            ));
        }

        Ok(SecondaryIndex {
            bucket,
            index: index.into(),
            query: query.into(),
            options,
            collection: OnceCell::new(),
            values: OnceCell::new(),
        })
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn query(&self) -> &IndexQuery {
        &self.query
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    fn request(&self) -> Request {
        let mut segments = vec![
            "buckets".to_string(),
            escape(self.bucket.name()),
            "index".to_string(),
            escape(&self.index),
        ];
        segments.extend(self.query.path_segments());

        let mut request = Request::get(format!("/{}", segments.join("/"))).expect(&[200]);
        if let Some(max_results) = self.options.max_results {
            request = request.query("max_results", max_results);
        }
        if let Some(continuation) = &self.options.continuation {
            request = request.query("continuation", continuation);
        }
        if self.options.return_terms {
            request = request.query("return_terms", true);
        }
        request
    }

    /// The matching keys of this page. Fetched once.
    pub async fn keys(&self) -> Result<&IndexCollection> {
        self.collection
            .get_or_try_init(|| async {
                let response = self.bucket.client().request(self.request()).await?;
                let collection = IndexCollection::from_json(&response.body)?;
                debug!(
                    "Index {} on {} matched {} keys",
                    self.index,
                    self.bucket.name(),
                    collection.keys.len()
                );
                Ok::<_, ClientError>(collection)
            })
            .await
    }

    /// Payloads of the matching objects in key order. Keys deleted since the
    /// index was read are skipped.
    pub async fn values(&self) -> Result<&[Payload]> {
        let values = self
            .values
            .get_or_try_init(|| async {
                let keys = self.keys().await?.keys.as_slice();
                let objects = self.bucket.get_many(keys).await?;
                let payloads = objects
                    .into_iter()
                    .map(|object| object.data().cloned().unwrap_or_else(|| Payload::Raw(Bytes::new())))
                    .collect::<Vec<_>>();
                Ok::<_, ClientError>(payloads)
            })
            .await?;
        Ok(values.as_slice())
    }

    /// A new query resuming after this page.
    pub async fn next_page(&self) -> Result<SecondaryIndex> {
        let continuation = self.keys().await?.continuation.clone().ok_or_else(|| {
            ClientError::Precondition("no next page".to_string())
        })?;

        let options = IndexOptions {
            continuation: Some(continuation),
            ..self.options.clone()
        };
        SecondaryIndex::new(self.bucket.clone(), self.index.clone(), self.query.clone(), options)
    }
}

impl std::fmt::Debug for SecondaryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecondaryIndex")
            .field("bucket", &self.bucket.name())
            .field("index", &self.index)
            .field("query", &self.query)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_conversions() {
        assert_eq!(
            IndexQuery::try_from(10i64..20).unwrap(),
            IndexQuery::Range(IndexValue::Int(10), IndexValue::Int(19))
        );
        assert_eq!(
            IndexQuery::from(10i64..=20),
            IndexQuery::Range(IndexValue::Int(10), IndexValue::Int(20))
        );
        assert_eq!(
            IndexQuery::from("a"..="m"),
            IndexQuery::Range(IndexValue::Bin("a".into()), IndexValue::Bin("m".into()))
        );
        assert_eq!(IndexQuery::from(42i64), IndexQuery::Exact(IndexValue::Int(42)));
    }

    #[test]
    fn test_empty_half_open_ranges_rejected() {
        assert!(matches!(IndexQuery::try_from(5i64..5), Err(ClientError::Precondition(_))));
        assert!(matches!(IndexQuery::try_from(9i64..3), Err(ClientError::Precondition(_))));
        assert!(matches!(
            IndexQuery::try_from(0i64..i64::MIN),
            Err(ClientError::Precondition(_))
        ));
        assert_eq!(
            IndexQuery::try_from(i64::MIN..i64::MIN + 1).unwrap(),
            IndexQuery::Range(IndexValue::Int(i64::MIN), IndexValue::Int(i64::MIN))
        );
    }

    #[test]
    fn test_path_segments_escaped() {
        let query = IndexQuery::from("Sean Cribbs");
        assert_eq!(query.path_segments(), vec!["Sean%20Cribbs".to_string()]);
    }

    #[test]
    fn test_collection_from_keys() {
        let collection =
            IndexCollection::from_json(br#"{"keys":["a","b"],"continuation":"g2o="}"#).unwrap();
        assert_eq!(collection.keys, vec!["a", "b"]);
        assert_eq!(collection.terms, None);
        assert_eq!(collection.continuation.as_deref(), Some("g2o="));
    }

    #[test]
    fn test_collection_from_results() {
        let collection =
            IndexCollection::from_json(br#"{"results":[{"10":"a"},{"12":"b"}]}"#).unwrap();
        assert_eq!(collection.keys, vec!["a", "b"]);
        assert_eq!(
            collection.terms,
            Some(vec![("10".into(), "a".into()), ("12".into(), "b".into())])
        );
        assert_eq!(collection.continuation, None);
    }

    #[test]
    fn test_collection_rejects_non_json() {
        assert!(matches!(
            IndexCollection::from_json(b"<html>"),
            Err(ClientError::InvalidResponse(_))
        ));
    }
}

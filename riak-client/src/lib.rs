//! Riak HTTP client: objects, siblings, link walking and secondary indexes

pub mod bucket;
pub mod client;
pub mod config;
pub mod error;
pub mod feature_detection;
pub mod http_backend;
pub mod robject;
pub mod secondary_index;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use bucket::{Bucket, GetOptions};
pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use error::ClientError;
pub use feature_detection::{Capabilities, ServerVersion};
pub use http_backend::HttpBackend;
pub use robject::{DeleteOptions, ObjectState, Quorum, RObject, ReloadOptions, StoreOptions};
pub use secondary_index::{IndexCollection, IndexOptions, IndexQuery, IndexValue, SecondaryIndex};
pub use transport::{Method, Request, Response, Transport};

pub use riak_core::{Link, Payload, Serializer, SerializerRegistry, VClock, WalkFilter, WalkSpec, WalkTerm};

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

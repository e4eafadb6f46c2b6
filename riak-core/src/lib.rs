//! Wire-format values for the Riak HTTP interface: links, link-walk specs,
//! multipart decoding and content-type driven payload serialization.

pub mod error;
pub mod escape;
pub mod link;
pub mod multipart;
pub mod serializers;
pub mod types;
pub mod walk_spec;

pub use error::*;
pub use link::Link;
pub use serializers::{Payload, Serializer, SerializerRegistry};
pub use types::*;
pub use walk_spec::{WalkFilter, WalkSpec, WalkTerm};

/// Result type alias for riak-core operations
pub type Result<T> = std::result::Result<T, RiakError>;

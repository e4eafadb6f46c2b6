//! Client error types

use bytes::Bytes;
use riak_core::Headers;
use thiserror::Error;

use crate::transport::Method;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The store answered with a status outside the expected set.
    #[error("Request failed: {method} {path} expected {expected:?}, got {status}")]
    RequestFailed {
        method: Method,
        path: String,
        expected: Vec<u16>,
        status: u16,
        headers: Headers,
        body: Bytes,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Capability not available: {0}")]
    Capability(String),

    #[error("Object {bucket}/{key} has been deleted")]
    ObjectDeleted { bucket: String, key: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] riak_core::RiakError),
}

impl ClientError {
    /// Status code of a failed request.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The request failed because the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Response body of a failed request, lossily decoded.
    pub fn body_text(&self) -> Option<String> {
        match self {
            ClientError::RequestFailed { body, .. } => {
                Some(String::from_utf8_lossy(body).into_owned())
            }
            _ => None,
        }
    }
}

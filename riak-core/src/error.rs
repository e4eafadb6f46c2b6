//! Error types for riak-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiakError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CBOR error: {0}")]
    Cbor(String),

    #[error("Invalid walk spec: {0}")]
    InvalidWalkSpec(String),

    #[error("Invalid link: {0}")]
    InvalidLink(String),
}

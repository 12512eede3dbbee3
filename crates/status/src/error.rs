//! Status cache error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("snapshot decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("not a cynic snapshot store (magic {0:#018x})")]
    BadMagic(u64),

    #[error("unsupported snapshot store version {0}")]
    UnsupportedVersion(u8),

    #[error("configuration error: {0}")]
    Config(#[from] cynic_core::CynicError),
}

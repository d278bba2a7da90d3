use std::io;

use thiserror::Error;

/// Failure reading from or writing to the key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage i/o failed for key '{key}': {source}")]
    Io { key: String, source: io::Error },

    #[error("stored value for key '{key}' is not valid: {source}")]
    Decode {
        key: &'static str,
        source: serde_json::Error,
    },

    #[error("failed to encode value for key '{key}': {source}")]
    Encode {
        key: &'static str,
        source: serde_json::Error,
    },

    #[error("storage writer is no longer running")]
    WriterClosed,
}

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Everything that can make the annotation of a Pod fail. Whatever the
/// variant, the outcome for the admission request is the same: the
/// annotation failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot build object store client: {0}")]
    Config(String),

    #[error("admission request does not identify a target object")]
    MissingTarget,

    #[error("pod {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("cannot read pod {namespace}/{name}: {reason}")]
    Read {
        namespace: String,
        name: String,
        reason: String,
    },

    #[error("cannot update pod {namespace}/{name}: {reason}")]
    Write {
        namespace: String,
        name: String,
        reason: String,
    },

    #[error("annotation of pod {namespace}/{name} did not complete within {timeout:?}")]
    Timeout {
        namespace: String,
        name: String,
        timeout: Duration,
    },
}

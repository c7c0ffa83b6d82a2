use std::fmt;

use thiserror::Error;

use tidelog_stream::StreamError;
use tidelog_types::{BucketName, ObjectKey, TypeError};
use tidelog_watch::WatchError;

/// Store operation named in errors and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Open,
    Put,
    Get,
    Info,
    Delete,
    List,
    Watermark,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Put => "put",
            Self::Get => "get",
            Self::Info => "info",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Watermark => "watermark",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: BucketName, key: ObjectKey },

    #[error("{operation} on {bucket} timed out")]
    Timeout {
        operation: Operation,
        bucket: BucketName,
    },

    #[error("{operation} on {bucket} failed: {source}")]
    Transport {
        operation: Operation,
        bucket: BucketName,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid name: {0}")]
    InvalidName(#[from] TypeError),

    #[error("config error: {0}")]
    Config(String),
}

impl StoreError {
    pub(crate) fn stream(operation: Operation, bucket: &BucketName, source: StreamError) -> Self {
        Self::Transport {
            operation,
            bucket: bucket.clone(),
            source: Box::new(source),
        }
    }

    pub(crate) fn watch(operation: Operation, bucket: &BucketName, source: WatchError) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                operation,
                bucket: bucket.clone(),
            }
        } else {
            Self::Transport {
                operation,
                bucket: bucket.clone(),
                source: Box::new(source),
            }
        }
    }

    pub(crate) fn timeout(operation: Operation, bucket: &BucketName) -> Self {
        Self::Timeout {
            operation,
            bucket: bucket.clone(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

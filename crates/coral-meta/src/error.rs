//! Failure modes of the metadata store.
//!
//! Call sites treat the backing engine as one opaque layer: nothing in coral
//! reacts differently to a failed transaction versus a failed table open, so
//! those collapse into a single storage variant. Missing records are not
//! errors; lookups return `Ok(None)`.

use thiserror::Error;

/// Result type alias for metadata store operations.
pub type MetaResult<T> = Result<T, MetaError>;

/// Errors surfaced by [`MetaStore`](crate::MetaStore) operations.
#[derive(Debug, Error)]
pub enum MetaError {
    /// The backing database could not be opened or created.
    #[error("cannot open metadata database: {0}")]
    Open(String),

    /// The storage engine rejected a transaction, table, or key operation.
    #[error("metadata storage failed: {0}")]
    Storage(String),

    /// A record could not be encoded to, or decoded from, its stored bytes.
    #[error("bad metadata record: {0}")]
    Codec(String),
}

impl From<redb::DatabaseError> for MetaError {
    fn from(e: redb::DatabaseError) -> Self {
        MetaError::Open(e.to_string())
    }
}

impl From<serde_json::Error> for MetaError {
    fn from(e: serde_json::Error) -> Self {
        MetaError::Codec(e.to_string())
    }
}

/// Everything the engine can throw mid-operation lands in `Storage`.
macro_rules! storage_error {
    ($($err:ty),+ $(,)?) => {$(
        impl From<$err> for MetaError {
            fn from(e: $err) -> Self {
                MetaError::Storage(e.to_string())
            }
        }
    )+};
}

storage_error!(
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

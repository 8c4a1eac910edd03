//! The table client trait and its error type.

use async_trait::async_trait;
use thiserror::Error;

use crate::entry::TableEntry;

/// Error type for table mutations.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The remote pipeline rejected or failed the mutation.
    #[error("table mutation failed: {message}")]
    Rpc { message: String },

    /// Modify targeted an entry that does not exist.
    #[error("entry not found in table {table}")]
    EntryNotFound { table: String },

    /// The entry is structurally invalid (e.g. missing action on insert).
    #[error("invalid entry for table {table}: {message}")]
    InvalidEntry { table: String, message: String },
}

impl ClientError {
    /// Creates an RPC failure error.
    pub fn rpc(message: impl Into<String>) -> Self {
        ClientError::Rpc {
            message: message.into(),
        }
    }

    /// Creates an invalid-entry error.
    pub fn invalid_entry(table: impl Into<String>, message: impl Into<String>) -> Self {
        ClientError::InvalidEntry {
            table: table.into(),
            message: message.into(),
        }
    }
}

/// Result type for table mutations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Submits match-action table mutations against the forwarding pipeline.
///
/// Each call is one remote round trip: it completes only once the mutation
/// has been accepted or rejected by the pipeline, so a caller issuing a
/// sequence of mutations may assume earlier ones committed before later
/// ones are submitted. The client performs no retries and no batching.
///
/// Idempotency expectations: inserting an already-present key and deleting
/// an already-absent key are tolerated so that a failed reconciliation can
/// be repaired by re-running the same operation.
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Inserts an entry. The entry must carry an action.
    async fn insert_entry(&self, entry: &TableEntry) -> ClientResult<()>;

    /// Replaces the action of an existing entry. The entry must carry an
    /// action, and the match key must already be present.
    async fn modify_entry(&self, entry: &TableEntry) -> ClientResult<()>;

    /// Deletes an entry by table and match key. Any action on the entry is
    /// ignored.
    async fn delete_entry(&self, entry: &TableEntry) -> ClientResult<()>;
}

//! Error type for the policy compiler.

use thiserror::Error;

use offload_p4rt::ClientError;
use offload_types::{ParseError, PolicyId};

use crate::types::TableOp;

/// Error type for builder and reconciler operations.
#[derive(Debug, Error)]
pub enum PolicyOrchError {
    /// A remote table mutation failed. Carries the table the mutation
    /// targeted; the client error is propagated verbatim underneath.
    #[error("{table}: {source}")]
    TableOp {
        table: &'static str,
        #[source]
        source: ClientError,
    },

    /// An operation code a builder does not support for its table.
    #[error("invalid operation {op} for {table}")]
    InvalidOperation { table: &'static str, op: TableOp },

    /// The port-range stage only exists for TCP and UDP.
    #[error("unsupported protocol {protocol} for destination-port range check")]
    UnsupportedProtocol { protocol: u8 },

    /// Malformed CIDR or direction string in a policy rule.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A policy index carries more rules than the 8-bit membership mask
    /// can attribute.
    #[error(
        "policy {policy} index {index} has {count} rules, exceeding the mask capacity of {max}"
    )]
    TooManyRules {
        policy: String,
        index: PolicyId,
        count: usize,
        max: usize,
    },
}

/// Result type alias for policy compiler operations.
pub type Result<T> = std::result::Result<T, PolicyOrchError>;

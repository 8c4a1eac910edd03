//! Match-action table client abstraction for the P4 dataplane.
//!
//! This crate models the narrow interface the policy compiler has to the
//! forwarding pipeline: a table entry is a table name, a set of match
//! specifications (exact or longest-prefix), and optionally a direct action
//! with byte-encoded parameters. The [`TableClient`] trait submits
//! insert/modify/delete mutations for such entries; session setup and the
//! wire encoding of entries belong to the client implementation, not here.
//!
//! [`MockTableClient`] is an in-memory implementation used by tests and by
//! callers that run without a dataplane session.

mod client;
pub mod encode;
mod entry;
mod mock;

pub use client::{ClientError, ClientResult, TableClient};
pub use entry::{ActionSpec, MatchValue, TableEntry};
pub use mock::MockTableClient;

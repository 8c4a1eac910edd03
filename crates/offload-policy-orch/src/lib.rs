//! Network-policy to match-action table compiler.
//!
//! This crate translates the high-level policy model (named policies, CIDR
//! rule sets, port ranges, workload endpoints) into the exact entries the
//! dataplane's fixed-function match tables must hold:
//!
//! 1. [`ProtoDispatchTable`]: classifies a packet by endpoint address and
//!    IP protocol and chains to the range-check stage, or marks the packet
//!    for set-membership-only evaluation when the protocol is wildcarded.
//! 2. [`IpSetMatchTable`]: matches the peer address against a policy's CIDR
//!    rules and accumulates a rule-membership bitmask.
//! 3. [`DportRangeTable`]: per policy and transport protocol, holds the
//!    allowed destination-port boundaries as direct action parameters.
//!
//! [`PolicyOrch`] orchestrates the three builders for whole-policy and
//! whole-workload reconciliation, computing minimal diffs on update and
//! rolling back already-applied mutations when a sequence fails partway.
//!
//! The core is synchronous per invocation: every builder call awaits one
//! remote mutation before the next is issued. It performs no locking over
//! the policy store; callers must not run two reconciliations for the same
//! policy name or endpoint key concurrently.

mod diff;
mod dispatch;
mod error;
mod ipset;
pub mod names;
mod orch;
mod portrange;
mod store;
mod types;

pub use dispatch::ProtoDispatchTable;
pub use error::{PolicyOrchError, Result};
pub use ipset::IpSetMatchTable;
pub use orch::PolicyOrch;
pub use portrange::DportRangeTable;
pub use store::{IpSetEntry, MemoryPolicyStore, Policy, PolicyStore, PolicyWorkerEndPoint, Rule};
pub use types::{ReconcileRequest, TableOp};

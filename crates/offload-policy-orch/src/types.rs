//! Operation codes for builders and the reconciler.

use std::fmt;

use crate::store::{Policy, PolicyWorkerEndPoint};

/// Operation applied to a single table entry by a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableOp {
    /// Create the entry with its action.
    Insert,
    /// Replace the action of an existing entry.
    Update,
    /// Remove the entry by match key.
    Delete,
}

impl fmt::Display for TableOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableOp::Insert => write!(f, "insert"),
            TableOp::Update => write!(f, "update"),
            TableOp::Delete => write!(f, "delete"),
        }
    }
}

/// A reconciliation request: one operation code plus its payload.
///
/// Policy operations act on the set-membership and port-range stages;
/// workload operations act on the dispatch stage.
#[derive(Debug, Clone)]
pub enum ReconcileRequest {
    /// Build a policy's full set-membership and port-range footprint.
    PolicyAdd(Policy),
    /// Tear down a policy's footprint.
    PolicyDel(Policy),
    /// Diff the policy against its prior stored revision and apply only
    /// the changes.
    PolicyUpdate(Policy),
    /// Insert dispatch entries for every policy bound to the endpoint.
    WorkloadAdd(PolicyWorkerEndPoint),
    /// Remove the endpoint's dispatch entries.
    WorkloadDel(PolicyWorkerEndPoint),
    /// Diff the endpoint's bindings against its prior stored binding and
    /// apply only the changes.
    WorkloadUpdate(PolicyWorkerEndPoint),
}

impl ReconcileRequest {
    /// Short operation name for logging.
    pub fn op_name(&self) -> &'static str {
        match self {
            ReconcileRequest::PolicyAdd(_) => "policy-add",
            ReconcileRequest::PolicyDel(_) => "policy-del",
            ReconcileRequest::PolicyUpdate(_) => "policy-update",
            ReconcileRequest::WorkloadAdd(_) => "workload-add",
            ReconcileRequest::WorkloadDel(_) => "workload-del",
            ReconcileRequest::WorkloadUpdate(_) => "workload-update",
        }
    }
}

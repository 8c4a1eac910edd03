//! Policy reconciler: whole-policy and whole-workload table orchestration.

use log::{debug, warn};
use std::net::Ipv4Addr;

use offload_p4rt::TableClient;
use offload_types::{Direction, PolicyId};

use crate::diff::missing_from;
use crate::dispatch::ProtoDispatchTable;
use crate::error::{PolicyOrchError, Result};
use crate::ipset::IpSetMatchTable;
use crate::portrange::DportRangeTable;
use crate::store::{IpSetEntry, Policy, PolicyStore, PolicyWorkerEndPoint};
use crate::types::{ReconcileRequest, TableOp};

/// One recorded inverse mutation, replayed in reverse order when a
/// reconciliation fails partway through.
#[derive(Debug)]
enum Undo {
    IpSet {
        op: TableOp,
        id: PolicyId,
        cidr: String,
        mask: u8,
        direction: Direction,
    },
    PortRange {
        op: TableOp,
        id: PolicyId,
        ports: Vec<u16>,
        protocol: u8,
    },
    Dispatch {
        op: TableOp,
        protocol: u8,
        worker_ip: Ipv4Addr,
        id: PolicyId,
        direction: Direction,
    },
}

fn invert(op: TableOp) -> TableOp {
    match op {
        TableOp::Insert => TableOp::Delete,
        TableOp::Delete => TableOp::Insert,
        TableOp::Update => TableOp::Update,
    }
}

/// Orchestrates the three table builders for policy and workload
/// reconciliation.
///
/// Each operation issues its table mutations strictly in sequence, one
/// awaited round trip at a time. On the first builder failure the
/// remaining sequence is abandoned, the mutations already applied are
/// rolled back (best-effort; rollback failures are logged, not returned),
/// and the original error - tagged with the failing table - is surfaced.
///
/// The reconciler borrows read access to the store per call and performs
/// no locking of its own: callers must not run two reconciliations for the
/// same policy name or endpoint key concurrently.
pub struct PolicyOrch<'a, C: TableClient, S: PolicyStore> {
    client: &'a C,
    store: &'a S,
}

impl<'a, C: TableClient, S: PolicyStore> PolicyOrch<'a, C, S> {
    /// Creates a reconciler over the given client and store.
    pub fn new(client: &'a C, store: &'a S) -> Self {
        PolicyOrch { client, store }
    }

    /// Dispatches one reconciliation request.
    pub async fn reconcile(&self, request: ReconcileRequest) -> Result<()> {
        debug!("reconcile: {}", request.op_name());
        let mut journal = Vec::new();
        let result = match &request {
            ReconcileRequest::PolicyAdd(policy) => {
                validate_rule_capacity(policy)?;
                self.apply_policy_footprint(policy, TableOp::Insert, &mut journal)
                    .await
            }
            ReconcileRequest::PolicyDel(policy) => {
                self.apply_policy_footprint(policy, TableOp::Delete, &mut journal)
                    .await
            }
            ReconcileRequest::PolicyUpdate(policy) => {
                validate_rule_capacity(policy)?;
                self.update_policy(policy, &mut journal).await
            }
            ReconcileRequest::WorkloadAdd(ep) => {
                self.apply_workload(ep, TableOp::Insert, &mut journal).await
            }
            ReconcileRequest::WorkloadDel(ep) => {
                self.apply_workload(ep, TableOp::Delete, &mut journal).await
            }
            ReconcileRequest::WorkloadUpdate(ep) => self.update_workload(ep, &mut journal).await,
        };

        if let Err(err) = result {
            self.rollback(journal).await;
            return Err(err);
        }
        Ok(())
    }

    // ============ Policy footprint (stages 2 and 3) ============

    /// Inserts or deletes the full set-membership and port-range footprint
    /// of a policy.
    async fn apply_policy_footprint(
        &self,
        policy: &Policy,
        op: TableOp,
        journal: &mut Vec<Undo>,
    ) -> Result<()> {
        for (id, entry) in &policy.ip_set_entries {
            self.apply_entry_footprint(&policy.name, *id, entry, op, journal)
                .await?;
        }
        Ok(())
    }

    /// Inserts or deletes the footprint of a single policy index.
    async fn apply_entry_footprint(
        &self,
        policy_name: &str,
        id: PolicyId,
        entry: &IpSetEntry,
        op: TableOp,
        journal: &mut Vec<Undo>,
    ) -> Result<()> {
        let ipset = IpSetMatchTable::new(self.client);
        for rule in &entry.rules {
            ipset
                .apply(op, id, &rule.cidr, rule.rule_mask, entry.direction)
                .await?;
            journal.push(Undo::IpSet {
                op: invert(op),
                id,
                cidr: rule.cidr.clone(),
                mask: rule.rule_mask,
                direction: entry.direction,
            });
        }

        if !entry.dport_range.is_empty() {
            if entry.has_port_range() {
                let ports: &[u16] = if op == TableOp::Insert {
                    &entry.dport_range
                } else {
                    &[]
                };
                DportRangeTable::new(self.client)
                    .apply(op, id, ports, entry.protocol)
                    .await?;
                journal.push(Undo::PortRange {
                    op: invert(op),
                    id,
                    ports: entry.dport_range.clone(),
                    protocol: entry.protocol,
                });
            } else {
                warn!(
                    "policy {} index {} carries a port range but protocol {} has no range-check stage; ignoring",
                    policy_name, id, entry.protocol
                );
            }
        }
        Ok(())
    }

    /// Diffs the policy against its prior stored revision and applies only
    /// the changed rules and port ranges.
    async fn update_policy(&self, new: &Policy, journal: &mut Vec<Undo>) -> Result<()> {
        let Some(old) = self.store.policy_revision(&new.name) else {
            debug!(
                "no prior revision of policy {}, treating update as add",
                new.name
            );
            return self
                .apply_policy_footprint(new, TableOp::Insert, journal)
                .await;
        };

        for (id, old_entry) in &old.ip_set_entries {
            match new.ip_set_entries.get(id) {
                None => {
                    self.apply_entry_footprint(&new.name, *id, old_entry, TableOp::Delete, journal)
                        .await?;
                }
                Some(new_entry) if new_entry == old_entry => {}
                Some(new_entry) if new_entry.direction != old_entry.direction => {
                    // The footprint moves to the other direction's tables;
                    // nothing is shared, so rebuild the index outright.
                    self.apply_entry_footprint(&new.name, *id, old_entry, TableOp::Delete, journal)
                        .await?;
                    self.apply_entry_footprint(&new.name, *id, new_entry, TableOp::Insert, journal)
                        .await?;
                }
                Some(new_entry) => {
                    self.diff_entry(&new.name, *id, old_entry, new_entry, journal)
                        .await?;
                }
            }
        }

        for (id, new_entry) in &new.ip_set_entries {
            if !old.ip_set_entries.contains_key(id) {
                self.apply_entry_footprint(&new.name, *id, new_entry, TableOp::Insert, journal)
                    .await?;
            }
        }
        Ok(())
    }

    /// Applies the rule and port-range delta between two revisions of one
    /// policy index (same direction).
    async fn diff_entry(
        &self,
        policy_name: &str,
        id: PolicyId,
        old: &IpSetEntry,
        new: &IpSetEntry,
        journal: &mut Vec<Undo>,
    ) -> Result<()> {
        let ipset = IpSetMatchTable::new(self.client);

        for rule in old.rules.iter().filter(|&r| !new.rules.contains(r)) {
            ipset
                .apply(TableOp::Delete, id, &rule.cidr, rule.rule_mask, old.direction)
                .await?;
            journal.push(Undo::IpSet {
                op: TableOp::Insert,
                id,
                cidr: rule.cidr.clone(),
                mask: rule.rule_mask,
                direction: old.direction,
            });
        }
        for rule in new.rules.iter().filter(|&r| !old.rules.contains(r)) {
            ipset
                .apply(TableOp::Insert, id, &rule.cidr, rule.rule_mask, new.direction)
                .await?;
            journal.push(Undo::IpSet {
                op: TableOp::Delete,
                id,
                cidr: rule.cidr.clone(),
                mask: rule.rule_mask,
                direction: new.direction,
            });
        }

        let ranges = DportRangeTable::new(self.client);
        match (old.has_port_range(), new.has_port_range()) {
            (true, false) => {
                ranges.apply(TableOp::Delete, id, &[], old.protocol).await?;
                journal.push(Undo::PortRange {
                    op: TableOp::Insert,
                    id,
                    ports: old.dport_range.clone(),
                    protocol: old.protocol,
                });
            }
            (false, true) => {
                ranges
                    .apply(TableOp::Insert, id, &new.dport_range, new.protocol)
                    .await?;
                journal.push(Undo::PortRange {
                    op: TableOp::Delete,
                    id,
                    ports: Vec::new(),
                    protocol: new.protocol,
                });
            }
            (true, true) if old.protocol != new.protocol => {
                // The entry lives in the other protocol's table now.
                ranges.apply(TableOp::Delete, id, &[], old.protocol).await?;
                journal.push(Undo::PortRange {
                    op: TableOp::Insert,
                    id,
                    ports: old.dport_range.clone(),
                    protocol: old.protocol,
                });
                ranges
                    .apply(TableOp::Insert, id, &new.dport_range, new.protocol)
                    .await?;
                journal.push(Undo::PortRange {
                    op: TableOp::Delete,
                    id,
                    ports: Vec::new(),
                    protocol: new.protocol,
                });
            }
            (true, true) if old.dport_range != new.dport_range => {
                ranges
                    .apply(TableOp::Update, id, &new.dport_range, new.protocol)
                    .await?;
                journal.push(Undo::PortRange {
                    op: TableOp::Update,
                    id,
                    ports: old.dport_range.clone(),
                    protocol: old.protocol,
                });
            }
            _ => {
                debug!("policy {} index {} port range unchanged", policy_name, id);
            }
        }
        Ok(())
    }

    // ============ Workload footprint (stage 1) ============

    /// Inserts or deletes the dispatch entries for every policy bound to
    /// the endpoint, separately per direction.
    async fn apply_workload(
        &self,
        ep: &PolicyWorkerEndPoint,
        op: TableOp,
        journal: &mut Vec<Undo>,
    ) -> Result<()> {
        for direction in [Direction::Rx, Direction::Tx] {
            for name in ep.names_for(direction) {
                let Some(policy) = self.store.policy(name) else {
                    warn!(
                        "policy {} bound to endpoint {} not in store; skipping",
                        name, ep.worker_ep
                    );
                    continue;
                };
                self.apply_workload_dispatch(&policy, ep.worker_ip, direction, op, journal)
                    .await?;
            }
        }
        Ok(())
    }

    /// Inserts or deletes the dispatch entries of one bound policy for one
    /// direction. The policy index doubles as the range-group id.
    async fn apply_workload_dispatch(
        &self,
        policy: &Policy,
        worker_ip: Ipv4Addr,
        direction: Direction,
        op: TableOp,
        journal: &mut Vec<Undo>,
    ) -> Result<()> {
        let dispatch = ProtoDispatchTable::new(self.client);
        for (id, entry) in policy.entries_for(direction) {
            dispatch
                .apply(op, entry.protocol, worker_ip, id, id, direction)
                .await?;
            journal.push(Undo::Dispatch {
                op: invert(op),
                protocol: entry.protocol,
                worker_ip,
                id,
                direction,
            });
        }
        Ok(())
    }

    /// Diffs the endpoint's bindings against its prior stored binding:
    /// policies no longer bound lose their dispatch entries, newly bound
    /// ones gain them, and unchanged bindings stay untouched.
    async fn update_workload(
        &self,
        ep: &PolicyWorkerEndPoint,
        journal: &mut Vec<Undo>,
    ) -> Result<()> {
        let old = match self.store.endpoint(&ep.worker_ep) {
            Some(old) => old,
            None => {
                // No prior binding: everything in the new binding is an
                // addition.
                debug!(
                    "no prior binding for endpoint {}; inserting all dispatch entries",
                    ep.worker_ep
                );
                return self.apply_workload(ep, TableOp::Insert, journal).await;
            }
        };

        for direction in [Direction::Rx, Direction::Tx] {
            let old_names = old.names_for(direction);
            let new_names = ep.names_for(direction);

            for name in missing_from(old_names, new_names) {
                let Some(policy) = self.store.policy(name) else {
                    warn!(
                        "removed policy {} for endpoint {} not in store; nothing to clean up",
                        name, ep.worker_ep
                    );
                    continue;
                };
                self.apply_workload_dispatch(
                    &policy,
                    ep.worker_ip,
                    direction,
                    TableOp::Delete,
                    journal,
                )
                .await?;
            }

            for name in missing_from(new_names, old_names) {
                let Some(policy) = self.store.policy(name) else {
                    warn!(
                        "added policy {} for endpoint {} not in store; skipping",
                        name, ep.worker_ep
                    );
                    continue;
                };
                self.apply_workload_dispatch(
                    &policy,
                    ep.worker_ip,
                    direction,
                    TableOp::Insert,
                    journal,
                )
                .await?;
            }
        }
        Ok(())
    }

    // ============ Rollback ============

    /// Replays the undo journal in reverse, best-effort. Failures here are
    /// logged and swallowed so the original reconciliation error is the
    /// one the caller sees.
    async fn rollback(&self, journal: Vec<Undo>) {
        if journal.is_empty() {
            return;
        }
        warn!("rolling back {} applied table mutations", journal.len());
        for undo in journal.into_iter().rev() {
            let result = match undo {
                Undo::IpSet {
                    op,
                    id,
                    cidr,
                    mask,
                    direction,
                } => {
                    IpSetMatchTable::new(self.client)
                        .apply(op, id, &cidr, mask, direction)
                        .await
                }
                Undo::PortRange {
                    op,
                    id,
                    ports,
                    protocol,
                } => {
                    DportRangeTable::new(self.client)
                        .apply(op, id, &ports, protocol)
                        .await
                }
                Undo::Dispatch {
                    op,
                    protocol,
                    worker_ip,
                    id,
                    direction,
                } => {
                    ProtoDispatchTable::new(self.client)
                        .apply(op, protocol, worker_ip, id, id, direction)
                        .await
                }
            };
            if let Err(err) = result {
                warn!("rollback step failed: {}", err);
            }
        }
    }
}

/// Rejects policies whose rule count per index exceeds what the 8-bit
/// membership mask can attribute. Checked before any table mutation.
fn validate_rule_capacity(policy: &Policy) -> Result<()> {
    for (id, entry) in &policy.ip_set_entries {
        if entry.rules.len() > PolicyId::MAX_RULES {
            return Err(PolicyOrchError::TooManyRules {
                policy: policy.name.clone(),
                index: *id,
                count: entry.rules.len(),
                max: PolicyId::MAX_RULES,
            });
        }
    }
    Ok(())
}

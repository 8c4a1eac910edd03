//! Policy and workload-endpoint model, and the store the reconciler reads.
//!
//! The store is authoritative for the current and immediately-prior
//! revisions of policies, and for the current binding of each workload
//! endpoint. The reconciler only reads it; writes are performed by the
//! orchestration layer, which must serialize them per key (the store
//! itself is safe for concurrent access, but interleaving two
//! reconciliations for the same key is not).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use std::sync::RwLock;

use offload_types::{Direction, PolicyId};

/// One CIDR rule of a policy index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Peer CIDR in "a.b.c.d/len" form. Parsed strictly by the
    /// set-membership builder; a missing "/len" is a contract violation.
    pub cidr: String,
    /// The bit this rule sets in the 8-bit membership result.
    pub rule_mask: u8,
}

/// The rule-group a single policy index compiles to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpSetEntry {
    /// Direction the rules constrain, relative to the workload.
    pub direction: Direction,
    /// IP protocol number; 0 matches any protocol.
    pub protocol: u8,
    /// Ordered CIDR rules; at most [`PolicyId::MAX_RULES`].
    pub rules: Vec<Rule>,
    /// Ordered destination-port boundaries. Meaningful only when
    /// `protocol` is TCP or UDP; ignored otherwise.
    #[serde(default)]
    pub dport_range: Vec<u16>,
}

impl IpSetEntry {
    /// Returns true if this entry owns a port-range table entry.
    pub fn has_port_range(&self) -> bool {
        !self.dport_range.is_empty()
            && matches!(self.protocol, offload_types::proto::TCP | offload_types::proto::UDP)
    }
}

/// A named network policy: a stable mapping of policy index to rule-group.
///
/// Indices are stable for the lifetime of a policy revision; the compiler
/// reuses each index simultaneously as the set-match key, the port-range
/// key, and the dispatch range-group id. The map is ordered so that the
/// mutation sequence of a reconciliation is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy name, unique in the store.
    pub name: String,
    /// Policy index to rule-group.
    pub ip_set_entries: BTreeMap<PolicyId, IpSetEntry>,
}

impl Policy {
    /// Creates an empty policy.
    pub fn new(name: impl Into<String>) -> Self {
        Policy {
            name: name.into(),
            ip_set_entries: BTreeMap::new(),
        }
    }

    /// Adds a rule-group under the given index.
    pub fn with_entry(mut self, index: impl Into<PolicyId>, entry: IpSetEntry) -> Self {
        self.ip_set_entries.insert(index.into(), entry);
        self
    }

    /// Iterates the rule-groups whose direction matches.
    pub fn entries_for(
        &self,
        direction: Direction,
    ) -> impl Iterator<Item = (PolicyId, &IpSetEntry)> {
        self.ip_set_entries
            .iter()
            .filter(move |(_, e)| e.direction == direction)
            .map(|(id, e)| (*id, e))
    }
}

/// One workload's policy bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyWorkerEndPoint {
    /// Unique endpoint key.
    pub worker_ep: String,
    /// The endpoint's address, used as the dispatch-stage match key.
    pub worker_ip: Ipv4Addr,
    /// Policy names bound for ingress traffic.
    pub policy_name_ingress: Vec<String>,
    /// Policy names bound for egress traffic.
    pub policy_name_egress: Vec<String>,
}

impl PolicyWorkerEndPoint {
    /// Returns the bound policy names for one direction.
    pub fn names_for(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Rx => &self.policy_name_ingress,
            Direction::Tx => &self.policy_name_egress,
        }
    }
}

/// Read access to the policy/workload store during reconciliation.
///
/// Lookups return owned clones: the reconciler works against a snapshot
/// taken at call time, and the store may be updated by the orchestration
/// layer for *other* keys while a reconciliation is in flight.
pub trait PolicyStore: Send + Sync {
    /// The current revision of a policy, or `None` if absent.
    fn policy(&self, name: &str) -> Option<Policy>;

    /// The immediately-prior stored revision of a policy, or `None` if it
    /// was never replaced.
    fn policy_revision(&self, name: &str) -> Option<Policy>;

    /// The current binding of a workload endpoint, or `None` if absent.
    fn endpoint(&self, worker_ep: &str) -> Option<PolicyWorkerEndPoint>;
}

/// In-memory [`PolicyStore`] keeping the current and prior revision of
/// each policy.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    policies: RwLock<HashMap<String, Policy>>,
    prior: RwLock<HashMap<String, Policy>>,
    endpoints: RwLock<HashMap<String, PolicyWorkerEndPoint>>,
}

impl MemoryPolicyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a policy. A previously-stored revision under the same name
    /// becomes retrievable via [`PolicyStore::policy_revision`].
    pub fn put_policy(&self, policy: Policy) {
        let mut policies = self.policies.lock_write();
        if let Some(old) = policies.insert(policy.name.clone(), policy) {
            self.prior.lock_write().insert(old.name.clone(), old);
        }
    }

    /// Removes a policy and its prior revision.
    pub fn remove_policy(&self, name: &str) -> Option<Policy> {
        self.prior.lock_write().remove(name);
        self.policies.lock_write().remove(name)
    }

    /// Stores a workload endpoint binding, replacing any previous one.
    pub fn put_endpoint(&self, ep: PolicyWorkerEndPoint) {
        self.endpoints.lock_write().insert(ep.worker_ep.clone(), ep);
    }

    /// Removes a workload endpoint binding.
    pub fn remove_endpoint(&self, worker_ep: &str) -> Option<PolicyWorkerEndPoint> {
        self.endpoints.lock_write().remove(worker_ep)
    }
}

impl PolicyStore for MemoryPolicyStore {
    fn policy(&self, name: &str) -> Option<Policy> {
        self.policies.lock_read().get(name).cloned()
    }

    fn policy_revision(&self, name: &str) -> Option<Policy> {
        self.prior.lock_read().get(name).cloned()
    }

    fn endpoint(&self, worker_ep: &str) -> Option<PolicyWorkerEndPoint> {
        self.endpoints.lock_read().get(worker_ep).cloned()
    }
}

/// Poisoned-lock recovery for the in-memory store: a panic while holding
/// the lock cannot leave the map partially mutated, so reads stay valid.
trait LockExt<T> {
    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, T>;
    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, T>;
}

impl<T> LockExt<T> for RwLock<T> {
    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, T> {
        self.read().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, T> {
        self.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offload_types::proto;
    use pretty_assertions::assert_eq;

    fn sample_policy(name: &str) -> Policy {
        Policy::new(name).with_entry(
            1u16,
            IpSetEntry {
                direction: Direction::Rx,
                protocol: proto::TCP,
                rules: vec![Rule {
                    cidr: "10.0.0.0/8".to_string(),
                    rule_mask: 0x01,
                }],
                dport_range: vec![80, 443],
            },
        )
    }

    #[test]
    fn test_put_and_get_policy() {
        let store = MemoryPolicyStore::new();
        store.put_policy(sample_policy("p"));

        assert_eq!(store.policy("p"), Some(sample_policy("p")));
        assert_eq!(store.policy("missing"), None);
    }

    #[test]
    fn test_prior_revision_tracked_on_replace() {
        let store = MemoryPolicyStore::new();
        store.put_policy(sample_policy("p"));
        assert_eq!(store.policy_revision("p"), None);

        let mut updated = sample_policy("p");
        updated
            .ip_set_entries
            .get_mut(&PolicyId::new(1))
            .unwrap()
            .dport_range = vec![8080];
        store.put_policy(updated.clone());

        assert_eq!(store.policy_revision("p"), Some(sample_policy("p")));
        assert_eq!(store.policy("p"), Some(updated));
    }

    #[test]
    fn test_remove_policy_clears_revision() {
        let store = MemoryPolicyStore::new();
        store.put_policy(sample_policy("p"));
        store.put_policy(sample_policy("p"));
        assert!(store.policy_revision("p").is_some());

        store.remove_policy("p");
        assert_eq!(store.policy("p"), None);
        assert_eq!(store.policy_revision("p"), None);
    }

    #[test]
    fn test_endpoint_roundtrip() {
        let store = MemoryPolicyStore::new();
        let ep = PolicyWorkerEndPoint {
            worker_ep: "ns/pod-a".to_string(),
            worker_ip: Ipv4Addr::new(10, 1, 2, 3),
            policy_name_ingress: vec!["p".to_string()],
            policy_name_egress: vec![],
        };
        store.put_endpoint(ep.clone());
        assert_eq!(store.endpoint("ns/pod-a"), Some(ep));
        assert_eq!(store.remove_endpoint("ns/pod-a").is_some(), true);
        assert_eq!(store.endpoint("ns/pod-a"), None);
    }

    #[test]
    fn test_has_port_range() {
        let mut e = IpSetEntry {
            direction: Direction::Tx,
            protocol: proto::UDP,
            rules: vec![],
            dport_range: vec![53],
        };
        assert!(e.has_port_range());

        e.protocol = proto::ANY;
        assert!(!e.has_port_range());

        e.protocol = proto::TCP;
        e.dport_range.clear();
        assert!(!e.has_port_range());
    }

    #[test]
    fn test_policy_deserializes_from_json() {
        let json = r#"{
            "name": "allow-web",
            "ip_set_entries": {
                "1": {
                    "direction": "Rx",
                    "protocol": 6,
                    "rules": [{"cidr": "10.0.0.0/8", "rule_mask": 1}],
                    "dport_range": [80, 443]
                }
            }
        }"#;
        let policy: Policy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.name, "allow-web");
        let entry = &policy.ip_set_entries[&PolicyId::new(1)];
        assert_eq!(entry.protocol, proto::TCP);
        assert_eq!(entry.dport_range, vec![80, 443]);
    }
}

//! Stage 2: set-membership table builder.
//!
//! One entry per (policy index, CIDR rule) matches the packet's *peer*
//! address - the opposite field from the dispatch stage, since a policy
//! rule constrains who the workload talks to, not the workload itself.
//! The action records the rule's mask byte; the pipeline ORs the masks of
//! all matching rules into the aggregate membership result.

use log::error;

use offload_p4rt::encode::{encode_ipv4, encode_u16, encode_u8};
use offload_p4rt::{TableClient, TableEntry};
use offload_types::{Direction, Ipv4Prefix, PolicyId};

use crate::error::{PolicyOrchError, Result};
use crate::names;
use crate::types::TableOp;

/// Builder for the direction-specific set-membership tables.
pub struct IpSetMatchTable<'a, C: TableClient> {
    client: &'a C,
}

impl<'a, C: TableClient> IpSetMatchTable<'a, C> {
    /// Creates a builder submitting through the given client.
    pub fn new(client: &'a C) -> Self {
        IpSetMatchTable { client }
    }

    /// Applies one set-membership mutation for a single rule.
    ///
    /// The CIDR must carry an explicit "/len"; the mask is only used on
    /// insert. Only `Insert` and `Delete` are supported.
    pub async fn apply(
        &self,
        op: TableOp,
        policy_id: PolicyId,
        cidr: &str,
        mask: u8,
        direction: Direction,
    ) -> Result<()> {
        let prefix: Ipv4Prefix = cidr.parse()?;

        // Egress constrains where the workload sends (peer = destination);
        // ingress constrains who reaches it (peer = source).
        let (table, peer_field) = match direction {
            Direction::Tx => (names::ACL_IPSET_MATCH_TABLE_EGRESS, names::FIELD_DST_ADDR),
            Direction::Rx => (names::ACL_IPSET_MATCH_TABLE_INGRESS, names::FIELD_SRC_ADDR),
        };

        let entry = TableEntry::new(table)
            .exact_match(names::FIELD_ACL_POL_ID, encode_u16(policy_id.value()))
            .lpm_match(
                peer_field,
                encode_ipv4(prefix.address()),
                prefix.prefix_len(),
            );

        match op {
            TableOp::Insert => {
                let entry =
                    entry.action(names::ACTION_SET_IPSET_MATCH_RESULT, vec![encode_u8(mask)]);
                self.client.insert_entry(&entry).await.map_err(|source| {
                    error!("cannot insert entry into {}: {}", table, source);
                    PolicyOrchError::TableOp { table, source }
                })
            }
            TableOp::Delete => self.client.delete_entry(&entry).await.map_err(|source| {
                error!("cannot delete entry from {}: {}", table, source);
                PolicyOrchError::TableOp { table, source }
            }),
            other => Err(PolicyOrchError::InvalidOperation { table, op: other }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offload_p4rt::{MatchValue, MockTableClient};
    use offload_types::ParseError;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_insert_ingress_matches_peer_source() {
        let client = MockTableClient::new();
        let table = IpSetMatchTable::new(&client);

        table
            .apply(
                TableOp::Insert,
                PolicyId::new(1),
                "10.0.0.0/8",
                0x01,
                Direction::Rx,
            )
            .await
            .unwrap();

        let entries = client.entries(names::ACL_IPSET_MATCH_TABLE_INGRESS);
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(
            entry.match_on(names::FIELD_ACL_POL_ID),
            Some(&MatchValue::Exact(vec![0, 1]))
        );
        assert_eq!(
            entry.match_on(names::FIELD_SRC_ADDR),
            Some(&MatchValue::Lpm {
                value: vec![10, 0, 0, 0],
                prefix_len: 8
            })
        );
        let action = entry.action.as_ref().unwrap();
        assert_eq!(action.action, names::ACTION_SET_IPSET_MATCH_RESULT);
        assert_eq!(action.params, vec![vec![0x01]]);
    }

    #[tokio::test]
    async fn test_insert_egress_matches_peer_destination() {
        let client = MockTableClient::new();
        let table = IpSetMatchTable::new(&client);

        table
            .apply(
                TableOp::Insert,
                PolicyId::new(2),
                "192.168.0.0/16",
                0x02,
                Direction::Tx,
            )
            .await
            .unwrap();

        let entries = client.entries(names::ACL_IPSET_MATCH_TABLE_EGRESS);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].match_on(names::FIELD_DST_ADDR).is_some());
        assert!(entries[0].match_on(names::FIELD_SRC_ADDR).is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_by_key() {
        let client = MockTableClient::new();
        let table = IpSetMatchTable::new(&client);

        table
            .apply(
                TableOp::Insert,
                PolicyId::new(1),
                "10.0.0.0/8",
                0x01,
                Direction::Rx,
            )
            .await
            .unwrap();
        table
            .apply(
                TableOp::Delete,
                PolicyId::new(1),
                "10.0.0.0/8",
                0,
                Direction::Rx,
            )
            .await
            .unwrap();

        assert_eq!(client.total_entries(), 0);
    }

    #[tokio::test]
    async fn test_malformed_cidr_fails_cleanly() {
        let client = MockTableClient::new();
        let table = IpSetMatchTable::new(&client);

        let err = table
            .apply(
                TableOp::Insert,
                PolicyId::new(1),
                "10.0.0.0",
                0x01,
                Direction::Rx,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyOrchError::Parse(ParseError::InvalidCidr(_))
        ));
        assert_eq!(client.total_entries(), 0);
    }

    #[tokio::test]
    async fn test_update_is_invalid() {
        let client = MockTableClient::new();
        let table = IpSetMatchTable::new(&client);

        let err = table
            .apply(
                TableOp::Update,
                PolicyId::new(1),
                "10.0.0.0/8",
                0x01,
                Direction::Rx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyOrchError::InvalidOperation { .. }));
    }
}

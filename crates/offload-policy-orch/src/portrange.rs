//! Stage 3: destination-port range-check table builder.
//!
//! One entry per (policy index, transport protocol) carries the policy's
//! allowed destination-port boundaries as direct action parameters. The
//! protocol selects the table statically: TCP and UDP each have their own
//! table and range-check action, and nothing else has a port range.

use log::error;

use offload_p4rt::encode::encode_u16;
use offload_p4rt::{TableClient, TableEntry};
use offload_types::{proto, PolicyId};

use crate::error::{PolicyOrchError, Result};
use crate::names;
use crate::types::TableOp;

/// Builder for the per-protocol destination-port range-check tables.
pub struct DportRangeTable<'a, C: TableClient> {
    client: &'a C,
}

impl<'a, C: TableClient> DportRangeTable<'a, C> {
    /// Creates a builder submitting through the given client.
    pub fn new(client: &'a C) -> Self {
        DportRangeTable { client }
    }

    /// Applies one range-check mutation for a policy index.
    ///
    /// The protocol is validated up front: anything other than TCP or UDP
    /// fails before any table is touched. `Update` replaces the boundary
    /// list of an existing entry in place.
    pub async fn apply(
        &self,
        op: TableOp,
        policy_id: PolicyId,
        port_range: &[u16],
        protocol: u8,
    ) -> Result<()> {
        let (table, action) = match protocol {
            proto::TCP => (names::TCP_DPORT_RC_TABLE, names::ACTION_DO_RANGE_CHECK_TCP),
            proto::UDP => (names::UDP_DPORT_RC_TABLE, names::ACTION_DO_RANGE_CHECK_UDP),
            other => return Err(PolicyOrchError::UnsupportedProtocol { protocol: other }),
        };

        let entry =
            TableEntry::new(table).exact_match(names::FIELD_ACL_POL_ID, encode_u16(policy_id.value()));

        match op {
            TableOp::Insert => {
                let entry = entry.action(action, encode_ports(port_range));
                self.client.insert_entry(&entry).await.map_err(|source| {
                    error!("cannot insert entry into {}: {}", table, source);
                    PolicyOrchError::TableOp { table, source }
                })
            }
            TableOp::Update => {
                let entry = entry.action(action, encode_ports(port_range));
                self.client.modify_entry(&entry).await.map_err(|source| {
                    error!("cannot update entry in {}: {}", table, source);
                    PolicyOrchError::TableOp { table, source }
                })
            }
            TableOp::Delete => self.client.delete_entry(&entry).await.map_err(|source| {
                error!("cannot delete entry from {}: {}", table, source);
                PolicyOrchError::TableOp { table, source }
            }),
        }
    }
}

fn encode_ports(port_range: &[u16]) -> Vec<Vec<u8>> {
    port_range.iter().map(|p| encode_u16(*p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use offload_p4rt::{MatchValue, MockTableClient};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_insert_tcp_selects_tcp_table() {
        let client = MockTableClient::new();
        let table = DportRangeTable::new(&client);

        table
            .apply(TableOp::Insert, PolicyId::new(1), &[80, 443], proto::TCP)
            .await
            .unwrap();

        let entries = client.entries(names::TCP_DPORT_RC_TABLE);
        assert_eq!(entries.len(), 1);
        assert_eq!(client.entry_count(names::UDP_DPORT_RC_TABLE), 0);

        let entry = &entries[0];
        assert_eq!(
            entry.match_on(names::FIELD_ACL_POL_ID),
            Some(&MatchValue::Exact(vec![0, 1]))
        );
        let action = entry.action.as_ref().unwrap();
        assert_eq!(action.action, names::ACTION_DO_RANGE_CHECK_TCP);
        assert_eq!(action.params, vec![vec![0x00, 0x50], vec![0x01, 0xbb]]);
    }

    #[tokio::test]
    async fn test_insert_udp_selects_udp_table() {
        let client = MockTableClient::new();
        let table = DportRangeTable::new(&client);

        table
            .apply(TableOp::Insert, PolicyId::new(4), &[53], proto::UDP)
            .await
            .unwrap();

        let entries = client.entries(names::UDP_DPORT_RC_TABLE);
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].action.as_ref().unwrap().action,
            names::ACTION_DO_RANGE_CHECK_UDP
        );
    }

    #[tokio::test]
    async fn test_unrecognized_protocol_rejected_before_mutation() {
        let client = MockTableClient::new();
        let table = DportRangeTable::new(&client);

        let err = table
            .apply(TableOp::Insert, PolicyId::new(1), &[80], 132)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyOrchError::UnsupportedProtocol { protocol: 132 }
        ));
        assert_eq!(client.total_entries(), 0);
    }

    #[tokio::test]
    async fn test_update_replaces_port_list() {
        let client = MockTableClient::new();
        let table = DportRangeTable::new(&client);

        table
            .apply(TableOp::Insert, PolicyId::new(1), &[80], proto::TCP)
            .await
            .unwrap();
        table
            .apply(TableOp::Update, PolicyId::new(1), &[80, 8080], proto::TCP)
            .await
            .unwrap();

        let entries = client.entries(names::TCP_DPORT_RC_TABLE);
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].action.as_ref().unwrap().params,
            vec![vec![0x00, 0x50], vec![0x1f, 0x90]]
        );
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let client = MockTableClient::new();
        let table = DportRangeTable::new(&client);

        table
            .apply(TableOp::Insert, PolicyId::new(1), &[80], proto::TCP)
            .await
            .unwrap();
        table
            .apply(TableOp::Delete, PolicyId::new(1), &[], proto::TCP)
            .await
            .unwrap();
        assert_eq!(client.total_entries(), 0);
    }
}

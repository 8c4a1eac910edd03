//! Stage 1: protocol-dispatch table builder.
//!
//! One entry per (workload endpoint, policy index, protocol) classifies a
//! packet by the endpoint's own address and IP protocol. With a specific
//! protocol the action chains to the port-range stage by carrying the
//! policy id and range-group id; with the wildcard protocol (0) the action
//! marks the packet for set-membership-only evaluation.

use log::error;
use std::net::Ipv4Addr;

use offload_p4rt::encode::{encode_ipv4, encode_u16, encode_u8};
use offload_p4rt::{TableClient, TableEntry};
use offload_types::{proto, Direction, PolicyId};

use crate::error::{PolicyOrchError, Result};
use crate::names;
use crate::types::TableOp;

/// Builder for the direction-specific dispatch tables.
pub struct ProtoDispatchTable<'a, C: TableClient> {
    client: &'a C,
}

impl<'a, C: TableClient> ProtoDispatchTable<'a, C> {
    /// Creates a builder submitting through the given client.
    pub fn new(client: &'a C) -> Self {
        ProtoDispatchTable { client }
    }

    /// Applies one dispatch-table mutation.
    ///
    /// `Insert` creates the entry with its action; `Delete` removes it by
    /// match key. The wildcard-protocol match uses prefix width 0 on both
    /// insert and delete so the two paths stay symmetric.
    pub async fn apply(
        &self,
        op: TableOp,
        protocol: u8,
        worker_ip: Ipv4Addr,
        policy_id: PolicyId,
        range_id: PolicyId,
        direction: Direction,
    ) -> Result<()> {
        let (table, addr_field) = match direction {
            Direction::Tx => (names::ACL_POD_IP_PROTO_TABLE_EGRESS, names::FIELD_SRC_ADDR),
            Direction::Rx => (names::ACL_POD_IP_PROTO_TABLE_INGRESS, names::FIELD_DST_ADDR),
        };

        let mut entry = TableEntry::new(table).exact_match(addr_field, encode_ipv4(worker_ip));
        entry = if protocol != proto::ANY {
            entry.lpm_match(names::FIELD_PROTOCOL, encode_u8(protocol), 8)
        } else {
            entry.lpm_match(names::FIELD_PROTOCOL, encode_u8(0), 0)
        };

        match op {
            TableOp::Insert => {
                entry = if protocol != proto::ANY {
                    entry.action(
                        names::ACTION_SET_RANGE_CHECK_REF,
                        vec![
                            encode_u16(policy_id.value()),
                            encode_u16(range_id.value()),
                        ],
                    )
                } else {
                    entry.action(
                        names::ACTION_SET_STATUS_MATCH_IPSET_ONLY,
                        vec![encode_u16(policy_id.value())],
                    )
                };
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

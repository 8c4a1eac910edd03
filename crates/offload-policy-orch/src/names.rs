//! Dataplane program identifiers.
//!
//! These strings are the stable contract with the P4 pipeline and must
//! match the program bit-exact.

/// Egress dispatch table: endpoint source address + IP protocol.
pub const ACL_POD_IP_PROTO_TABLE_EGRESS: &str = "k8s_dp_control.acl_pod_ip_proto_table_egress";
/// Ingress dispatch table: endpoint destination address + IP protocol.
pub const ACL_POD_IP_PROTO_TABLE_INGRESS: &str = "k8s_dp_control.acl_pod_ip_proto_table_ingress";
/// Egress set-membership table: policy id + peer destination address.
pub const ACL_IPSET_MATCH_TABLE_EGRESS: &str = "k8s_dp_control.acl_ipset_match_table_egress";
/// Ingress set-membership table: policy id + peer source address.
pub const ACL_IPSET_MATCH_TABLE_INGRESS: &str = "k8s_dp_control.acl_ipset_match_table_ingress";
/// TCP destination-port range-check table.
pub const TCP_DPORT_RC_TABLE: &str = "k8s_dp_control.tcp_dport_rc_table";
/// UDP destination-port range-check table.
pub const UDP_DPORT_RC_TABLE: &str = "k8s_dp_control.udp_dport_rc_table";

/// IPv4 source address key field (32-bit).
pub const FIELD_SRC_ADDR: &str = "hdr.ipv4.src_addr";
/// IPv4 destination address key field (32-bit).
pub const FIELD_DST_ADDR: &str = "hdr.ipv4.dst_addr";
/// IP protocol key field (8-bit, prefix-matched).
pub const FIELD_PROTOCOL: &str = "hdr.ipv4.protocol";
/// Policy identifier metadata key field (16-bit).
pub const FIELD_ACL_POL_ID: &str = "meta.acl_pol_id";

/// Chains the dispatch stage to a port-range entry: (policy id, range id).
pub const ACTION_SET_RANGE_CHECK_REF: &str = "k8s_dp_control.set_range_check_ref";
/// Marks the packet for set-membership-only evaluation: (policy id).
pub const ACTION_SET_STATUS_MATCH_IPSET_ONLY: &str =
    "k8s_dp_control.set_status_match_ipset_only";
/// Records a rule-membership mask bit, OR-merged across matching rules.
pub const ACTION_SET_IPSET_MATCH_RESULT: &str = "k8s_dp_control.set_ipset_match_result";
/// TCP destination-port range check over the boundary list.
pub const ACTION_DO_RANGE_CHECK_TCP: &str = "k8s_dp_control.do_range_check_tcp";
/// UDP destination-port range check over the boundary list.
pub const ACTION_DO_RANGE_CHECK_UDP: &str = "k8s_dp_control.do_range_check_udp";

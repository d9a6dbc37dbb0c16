//! Static catalog of the Sandesh struct kinds the vRouter kernel module speaks.
//!
//! Every kind carries two views:
//!
//! * a signedness table used by the protocol codec, listing which field ids
//!   travel with a synthetic unsigned wire type, and
//! * for the kinds the kernel tracer captures, the fixed memory layout of the
//!   kernel's C struct, used by the raw decoder.
//!
//! Both tables are contracts against the kernel module. They are `'static`
//! and never mutated, so they can be shared freely between threads.

use serde::Serialize;

/// Closed set of struct kinds known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StructKind {
    SandeshHdr,
    VrNexthopReq,
    VrInterfaceReq,
    VrVxlanReq,
    VrRouteReq,
    VrMplsReq,
    VrMirrorReq,
    VrVrfReq,
    VrFlowReq,
    VrVrfAssignReq,
    VrVrfStatsReq,
    VrResponse,
    VrouterOps,
    VrMemStatsReq,
    VrInfoReq,
    VrPktDropLogReq,
    VrDropStatsReq,
    VrQosMapReq,
    VrFcMapReq,
    VrFlowResponse,
    VrFlowTableData,
    VrBridgeTableData,
    VrHugepageConfig,
}

impl StructKind {
    pub const ALL: [StructKind; 23] = [
        StructKind::SandeshHdr,
        StructKind::VrNexthopReq,
        StructKind::VrInterfaceReq,
        StructKind::VrVxlanReq,
        StructKind::VrRouteReq,
        StructKind::VrMplsReq,
        StructKind::VrMirrorReq,
        StructKind::VrVrfReq,
        StructKind::VrFlowReq,
        StructKind::VrVrfAssignReq,
        StructKind::VrVrfStatsReq,
        StructKind::VrResponse,
        StructKind::VrouterOps,
        StructKind::VrMemStatsReq,
        StructKind::VrInfoReq,
        StructKind::VrPktDropLogReq,
        StructKind::VrDropStatsReq,
        StructKind::VrQosMapReq,
        StructKind::VrFcMapReq,
        StructKind::VrFlowResponse,
        StructKind::VrFlowTableData,
        StructKind::VrBridgeTableData,
        StructKind::VrHugepageConfig,
    ];

    /// Wire-level struct name.
    pub fn name(self) -> &'static str {
        match self {
            StructKind::SandeshHdr => "sandesh_hdr",
            StructKind::VrNexthopReq => "vr_nexthop_req",
            StructKind::VrInterfaceReq => "vr_interface_req",
            StructKind::VrVxlanReq => "vr_vxlan_req",
            StructKind::VrRouteReq => "vr_route_req",
            StructKind::VrMplsReq => "vr_mpls_req",
            StructKind::VrMirrorReq => "vr_mirror_req",
            StructKind::VrVrfReq => "vr_vrf_req",
            StructKind::VrFlowReq => "vr_flow_req",
            StructKind::VrVrfAssignReq => "vr_vrf_assign_req",
            StructKind::VrVrfStatsReq => "vr_vrf_stats_req",
            StructKind::VrResponse => "vr_response",
            StructKind::VrouterOps => "vrouter_ops",
            StructKind::VrMemStatsReq => "vr_mem_stats_req",
            StructKind::VrInfoReq => "vr_info_req",
            StructKind::VrPktDropLogReq => "vr_pkt_drop_log_req",
            StructKind::VrDropStatsReq => "vr_drop_stats_req",
            StructKind::VrQosMapReq => "vr_qos_map_req",
            StructKind::VrFcMapReq => "vr_fc_map_req",
            StructKind::VrFlowResponse => "vr_flow_response",
            StructKind::VrFlowTableData => "vr_flow_table_data",
            StructKind::VrBridgeTableData => "vr_bridge_table_data",
            StructKind::VrHugepageConfig => "vr_hugepage_config",
        }
    }

    /// The single mapping from wire name to kind.
    pub fn from_name(name: &str) -> Option<StructKind> {
        StructKind::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn signedness(self) -> &'static Signedness {
        match self {
            StructKind::SandeshHdr => &SANDESH_HDR,
            StructKind::VrNexthopReq => &VR_NEXTHOP_REQ,
            StructKind::VrInterfaceReq => &VR_INTERFACE_REQ,
            StructKind::VrVxlanReq => &VR_VXLAN_REQ,
            StructKind::VrRouteReq => &VR_ROUTE_REQ,
            StructKind::VrMplsReq => &VR_MPLS_REQ,
            StructKind::VrMirrorReq => &VR_MIRROR_REQ,
            StructKind::VrVrfReq => &VR_VRF_REQ,
            StructKind::VrFlowReq => &VR_FLOW_REQ,
            StructKind::VrVrfAssignReq => &VR_VRF_ASSIGN_REQ,
            StructKind::VrVrfStatsReq => &VR_VRF_STATS_REQ,
            StructKind::VrResponse => &VR_RESPONSE,
            StructKind::VrouterOps => &VROUTER_OPS,
            StructKind::VrMemStatsReq => &VR_MEM_STATS_REQ,
            StructKind::VrInfoReq => &VR_INFO_REQ,
            StructKind::VrPktDropLogReq => &VR_PKT_DROP_LOG_REQ,
            StructKind::VrDropStatsReq => &VR_DROP_STATS_REQ,
            StructKind::VrQosMapReq => &VR_QOS_MAP_REQ,
            StructKind::VrFcMapReq => &VR_FC_MAP_REQ,
            StructKind::VrFlowResponse => &VR_FLOW_RESPONSE,
            StructKind::VrFlowTableData => &VR_FLOW_TABLE_DATA,
            StructKind::VrBridgeTableData => &VR_BRIDGE_TABLE_DATA,
            StructKind::VrHugepageConfig => &VR_HUGEPAGE_CONFIG,
        }
    }

    /// Kernel memory layout, for the kinds the tracer can capture.
    pub fn layout(self) -> Option<&'static [FieldSlot]> {
        match self {
            StructKind::VrInterfaceReq => Some(vifr::LAYOUT),
            StructKind::VrRouteReq => Some(rtr::LAYOUT),
            StructKind::VrNexthopReq => Some(nhr::LAYOUT),
            StructKind::VrVrfAssignReq => Some(var::LAYOUT),
            StructKind::VrMplsReq => Some(mr::LAYOUT),
            StructKind::VrVrfStatsReq => Some(vsr::LAYOUT),
            _ => None,
        }
    }

    /// Number of bytes a captured buffer must hold for the raw decoder.
    pub fn extent(self) -> Option<usize> {
        self.layout().map(extent)
    }
}

impl std::fmt::Display for StructKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-struct field signedness.
///
/// Ids the table does not know are treated as signed, never as an error: the
/// kernel may grow new fields that older clients have not heard of.
#[derive(Debug)]
pub struct Signedness {
    /// Known field ids, as sorted inclusive ranges.
    known: &'static [(i16, i16)],
    /// Known field ids carried as unsigned on the wire. Sorted.
    unsigned: &'static [i16],
}

impl Signedness {
    pub const EMPTY: Signedness = Signedness {
        known: &[],
        unsigned: &[],
    };

    pub fn contains(&self, id: i16) -> bool {
        self.known.iter().any(|&(lo, hi)| (lo..=hi).contains(&id))
    }

    /// `Some(unsigned)` for a known id, `None` otherwise.
    pub fn get(&self, id: i16) -> Option<bool> {
        self.contains(id)
            .then(|| self.unsigned.binary_search(&id).is_ok())
    }

    pub fn is_unsigned(&self, id: i16) -> bool {
        self.get(id).unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

/// Look a struct up by wire name.
///
/// An unrecognised name yields the empty table and `false`; callers carry on
/// with signed typing for every field.
pub fn lookup(name: &str) -> (&'static Signedness, bool) {
    match StructKind::from_name(name) {
        Some(kind) => (kind.signedness(), true),
        None => (&EMPTY, false),
    }
}

const fn table(known: &'static [(i16, i16)], unsigned: &'static [i16]) -> Signedness {
    Signedness { known, unsigned }
}

static EMPTY: Signedness = Signedness::EMPTY;
static SANDESH_HDR: Signedness = table(&[(1, 2)], &[]);
static VR_NEXTHOP_REQ: Signedness = table(&[(1, 30)], &[10, 11, 16, 29]);
static VR_INTERFACE_REQ: Signedness = table(
    &[(1, 68), (77, 93)],
    &[2, 39, 40, 41, 58, 60, 65, 66, 67, 68, 77, 78, 81, 82, 91, 93],
);
static VR_VXLAN_REQ: Signedness = table(&[(1, 4)], &[]);
static VR_ROUTE_REQ: Signedness = table(&[(1, 14)], &[]);
static VR_MPLS_REQ: Signedness = table(&[(1, 5)], &[]);
static VR_MIRROR_REQ: Signedness = table(&[(1, 9)], &[]);
static VR_VRF_REQ: Signedness = table(&[(1, 7)], &[]);
static VR_FLOW_REQ: Signedness = table(
    &[(1, 39)],
    &[
        8, 9, 10, 11, 12, 13, 15, 16, 17, 18, 19, 20, 22, 23, 24, 25, 26, 28, 29, 30, 31, 32, 33,
        34, 35,
    ],
);
static VR_VRF_ASSIGN_REQ: Signedness = table(&[(1, 7)], &[]);
static VR_VRF_STATS_REQ: Signedness = table(&[(1, 33)], &[]);
static VR_RESPONSE: Signedness = table(&[(1, 2)], &[]);
static VROUTER_OPS: Signedness = table(&[(1, 47)], &[13, 30, 31, 32, 33, 38]);
static VR_MEM_STATS_REQ: Signedness = table(&[(1, 72)], &[]);
static VR_INFO_REQ: Signedness = table(&[(1, 9)], &[]);
static VR_PKT_DROP_LOG_REQ: Signedness = table(&[(1, 12)], &[]);
static VR_DROP_STATS_REQ: Signedness = table(&[(1, 58)], &[]);
static VR_QOS_MAP_REQ: Signedness = table(&[(1, 10)], &[2, 3]);
static VR_FC_MAP_REQ: Signedness = table(&[(1, 8)], &[2]);
static VR_FLOW_RESPONSE: Signedness = table(&[(1, 8)], &[2, 3, 4, 5, 6, 7]);
static VR_FLOW_TABLE_DATA: Signedness = table(
    &[(1, 17)],
    &[2, 3, 4, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17],
);
static VR_BRIDGE_TABLE_DATA: Signedness = table(&[(1, 5)], &[2, 3, 4]);
static VR_HUGEPAGE_CONFIG: Signedness = table(&[(1, 7)], &[2, 3, 4, 5, 7]);

// ── Raw layouts ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    Little,
    Big,
}

/// One field of a kernel struct: `buf[offset..offset + width]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSlot {
    pub name: &'static str,
    pub offset: usize,
    pub width: usize,
    pub endian: Endian,
}

impl FieldSlot {
    pub const fn end(&self) -> usize {
        self.offset + self.width
    }
}

const fn le(name: &'static str, offset: usize, width: usize) -> FieldSlot {
    FieldSlot {
        name,
        offset,
        width,
        endian: Endian::Little,
    }
}

const fn be(name: &'static str, offset: usize, width: usize) -> FieldSlot {
    FieldSlot {
        name,
        offset,
        width,
        endian: Endian::Big,
    }
}

fn extent(layout: &[FieldSlot]) -> usize {
    layout.iter().map(FieldSlot::end).max().unwrap_or(0)
}

/// `vr_interface_req`. Addresses are in network byte order.
pub mod vifr {
    use super::{be, le, FieldSlot};

    pub const H_OP: FieldSlot = le("h_op", 0, 4);
    pub const CORE: FieldSlot = le("vifr_core", 4, 4);
    pub const TYPE: FieldSlot = le("vifr_type", 8, 4);
    pub const FLAGS: FieldSlot = le("vifr_flags", 12, 4);
    pub const VRF: FieldSlot = le("vifr_vrf", 16, 4);
    pub const IDX: FieldSlot = le("vifr_idx", 20, 4);
    pub const RID: FieldSlot = le("vifr_rid", 24, 4);
    pub const OS_IDX: FieldSlot = le("vifr_os_idx", 28, 4);
    pub const MTU: FieldSlot = le("vifr_mtu", 32, 4);
    pub const REF_CNT: FieldSlot = le("vifr_ref_cnt", 36, 4);
    pub const MARKER: FieldSlot = le("vifr_marker", 40, 4);
    pub const IP: FieldSlot = be("vifr_ip", 44, 4);
    // 48..52: pad
    pub const IP6_U: FieldSlot = be("vifr_ip6_u", 52, 8);
    pub const IP6_L: FieldSlot = be("vifr_ip6_l", 60, 8);
    pub const VLAN_ID: FieldSlot = le("vifr_vlan_id", 68, 2);
    pub const NH_ID: FieldSlot = le("vifr_nh_id", 70, 4);
    pub const TRANSPORT: FieldSlot = le("vifr_transport", 74, 1);

    pub const LAYOUT: &[FieldSlot] = &[
        H_OP, CORE, TYPE, FLAGS, VRF, IDX, RID, OS_IDX, MTU, REF_CNT, MARKER, IP, IP6_U, IP6_L,
        VLAN_ID, NH_ID, TRANSPORT,
    ];
}

/// `vr_route_req`.
pub mod rtr {
    use super::{le, FieldSlot};

    pub const H_OP: FieldSlot = le("h_op", 0, 4);
    pub const VRF_ID: FieldSlot = le("rtr_vrf_id", 4, 4);
    pub const FAMILY: FieldSlot = le("rtr_family", 8, 4);
    // 12..14: pad
    pub const RID: FieldSlot = le("rtr_rid", 14, 2);
    pub const NH_ID: FieldSlot = le("rtr_nh_id", 16, 4);
    pub const INDEX: FieldSlot = le("rtr_index", 20, 4);

    pub const LAYOUT: &[FieldSlot] = &[H_OP, VRF_ID, FAMILY, RID, NH_ID, INDEX];
}

/// `vr_nexthop_req`.
pub mod nhr {
    use super::{le, FieldSlot};

    pub const H_OP: FieldSlot = le("h_op", 0, 4);
    // 4..6: pad
    pub const TYPE: FieldSlot = le("nhr_type", 6, 1);
    pub const FAMILY: FieldSlot = le("nhr_family", 7, 1);
    pub const ID: FieldSlot = le("nhr_id", 8, 4);
    pub const RID: FieldSlot = le("nhr_rid", 12, 4);
    pub const FLAGS: FieldSlot = le("nhr_flags", 16, 4);

    pub const LAYOUT: &[FieldSlot] = &[H_OP, TYPE, FAMILY, ID, RID, FLAGS];
}

/// `vr_vrf_assign_req`.
pub mod var {
    use super::{le, FieldSlot};

    pub const H_OP: FieldSlot = le("h_op", 0, 4);
    pub const RID: FieldSlot = le("var_rid", 4, 2);
    pub const VIF_INDEX: FieldSlot = le("var_vif_index", 6, 2);
    pub const VIF_VRF: FieldSlot = le("var_vif_vrf", 8, 4);
    pub const VLAN_ID: FieldSlot = le("var_vlan_id", 12, 2);
    pub const MARKER: FieldSlot = le("var_marker", 14, 2);
    pub const NH_ID: FieldSlot = le("var_nh_id", 16, 4);

    pub const LAYOUT: &[FieldSlot] = &[H_OP, RID, VIF_INDEX, VIF_VRF, VLAN_ID, MARKER, NH_ID];
}

/// `vr_mpls_req`.
pub mod mr {
    use super::{le, FieldSlot};

    pub const H_OP: FieldSlot = le("h_op", 0, 4);
    pub const LABEL: FieldSlot = le("mr_label", 4, 4);
    pub const RID: FieldSlot = le("mr_rid", 8, 2);
    // 10..12: pad
    pub const NHID: FieldSlot = le("mr_nhid", 12, 4);
    pub const MARKER: FieldSlot = le("mr_marker", 16, 4);

    pub const LAYOUT: &[FieldSlot] = &[H_OP, LABEL, RID, NHID, MARKER];
}

/// `vr_vrf_stats_req`. Counters are 64-bit.
pub mod vsr {
    use super::{le, FieldSlot};

    pub const H_OP: FieldSlot = le("h_op", 0, 4);
    pub const RID: FieldSlot = le("vsr_rid", 4, 2);
    pub const FAMILY: FieldSlot = le("vsr_family", 6, 2);
    // 8..10: pad
    pub const TYPE: FieldSlot = le("vsr_type", 10, 2);
    pub const VRF: FieldSlot = le("vsr_vrf", 12, 4);
    pub const DISCARDS: FieldSlot = le("vsr_discards", 16, 8);
    pub const RESOLVES: FieldSlot = le("vsr_resolves", 24, 8);
    pub const RECEIVES: FieldSlot = le("vsr_receives", 32, 8);
    pub const ECMP_COMPOSITES: FieldSlot = le("vsr_ecmp_composites", 40, 8);
    pub const L2_MCAST_COMPOSITES: FieldSlot = le("vsr_l2_mcast_composites", 48, 8);
    pub const FABRIC_COMPOSITES: FieldSlot = le("vsr_fabric_composites", 56, 8);
    pub const UDP_TUNNELS: FieldSlot = le("vsr_udp_tunnels", 64, 8);
    pub const UDP_MPLS_TUNNELS: FieldSlot = le("vsr_udp_mpls_tunnels", 72, 8);
    pub const GRE_MPLS_TUNNELS: FieldSlot = le("vsr_gre_mpls_tunnels", 80, 8);
    pub const L2_ENCAPS: FieldSlot = le("vsr_l2_encaps", 88, 8);
    pub const ENCAPS: FieldSlot = le("vsr_encaps", 96, 8);
    pub const MARKER: FieldSlot = le("vsr_marker", 104, 2);
    // 106..112: pad
    pub const GROS: FieldSlot = le("vsr_gros", 112, 8);
    pub const DIAGS: FieldSlot = le("vsr_diags", 120, 8);
    pub const ENCAP_COMPOSITES: FieldSlot = le("vsr_encap_composites", 128, 8);
    pub const EVPN_COMPOSITES: FieldSlot = le("vsr_evpn_composites", 136, 8);
    pub const VRF_TRANSLATES: FieldSlot = le("vsr_vrf_translates", 144, 8);
    pub const VXLAN_TUNNELS: FieldSlot = le("vsr_vxlan_tunnels", 152, 8);
    pub const ARP_VIRTUAL_PROXY: FieldSlot = le("vsr_arp_virtual_proxy", 160, 8);
    pub const ARP_VIRTUAL_STITCH: FieldSlot = le("vsr_arp_virtual_stitch", 168, 8);
    pub const ARP_VIRTUAL_FLOOD: FieldSlot = le("vsr_arp_virtual_flood", 176, 8);
    pub const ARP_PHYSICAL_STITCH: FieldSlot = le("vsr_arp_physical_stitch", 184, 8);
    pub const ARP_TOR_PROXY: FieldSlot = le("vsr_arp_tor_proxy", 192, 8);
    pub const ARP_PHYSICAL_FLOOD: FieldSlot = le("vsr_arp_physical_flood", 200, 8);
    pub const L2_RECEIVES: FieldSlot = le("vsr_l2_receives", 208, 8);
    pub const UUC_FLOODS: FieldSlot = le("vsr_uuc_floods", 216, 8);
    pub const PBB_TUNNELS: FieldSlot = le("vsr_pbb_tunnels", 224, 8);
    pub const UDP_MPLS_OVER_MPLS_TUNNELS: FieldSlot = le("vsr_udp_mpls_over_mpls_tunnels", 232, 8);

    pub const LAYOUT: &[FieldSlot] = &[
        H_OP,
        RID,
        FAMILY,
        TYPE,
        VRF,
        DISCARDS,
        RESOLVES,
        RECEIVES,
        ECMP_COMPOSITES,
        L2_MCAST_COMPOSITES,
        FABRIC_COMPOSITES,
        UDP_TUNNELS,
        UDP_MPLS_TUNNELS,
        GRE_MPLS_TUNNELS,
        L2_ENCAPS,
        ENCAPS,
        MARKER,
        GROS,
        DIAGS,
        ENCAP_COMPOSITES,
        EVPN_COMPOSITES,
        VRF_TRANSLATES,
        VXLAN_TUNNELS,
        ARP_VIRTUAL_PROXY,
        ARP_VIRTUAL_STITCH,
        ARP_VIRTUAL_FLOOD,
        ARP_PHYSICAL_STITCH,
        ARP_TOR_PROXY,
        ARP_PHYSICAL_FLOOD,
        L2_RECEIVES,
        UUC_FLOODS,
        PBB_TUNNELS,
        UDP_MPLS_OVER_MPLS_TUNNELS,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        for kind in StructKind::ALL {
            assert_eq!(StructKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(StructKind::from_name("vr_null_object"), None);
    }

    #[test]
    fn test_lookup_unknown_is_empty_and_signed() {
        let (table, found) = lookup("totally_unknown");
        assert!(!found);
        assert!(table.is_empty());
        for id in 0..200 {
            assert!(!table.is_unsigned(id));
        }
    }

    #[test]
    fn test_known_unsigned_fields() {
        let (nhr, found) = lookup("vr_nexthop_req");
        assert!(found);
        assert_eq!(nhr.get(10), Some(true));
        assert_eq!(nhr.get(12), Some(false));
        assert_eq!(nhr.get(31), None);
        assert!(!nhr.is_unsigned(31));

        let vifr = StructKind::VrInterfaceReq.signedness();
        assert!(vifr.is_unsigned(2));
        assert!(vifr.is_unsigned(40));
        // 69..=76 is a hole in the interface table.
        assert_eq!(vifr.get(70), None);
        assert_eq!(vifr.get(77), Some(true));
    }

    #[test]
    fn test_unsigned_ids_are_known_and_sorted() {
        for kind in StructKind::ALL {
            let table = kind.signedness();
            assert!(table.unsigned.windows(2).all(|w| w[0] < w[1]), "{kind}");
            for &id in table.unsigned {
                assert!(table.contains(id), "{kind} field {id}");
            }
        }
    }

    #[test]
    fn test_layouts_are_monotonic() {
        for kind in StructKind::ALL {
            let Some(layout) = kind.layout() else {
                continue;
            };
            for pair in layout.windows(2) {
                assert!(pair[0].end() <= pair[1].offset, "{kind}: {}", pair[1].name);
            }
        }
    }

    #[test]
    fn test_extents() {
        assert_eq!(StructKind::VrInterfaceReq.extent(), Some(75));
        assert_eq!(StructKind::VrRouteReq.extent(), Some(24));
        assert_eq!(StructKind::VrNexthopReq.extent(), Some(20));
        assert_eq!(StructKind::VrVrfAssignReq.extent(), Some(20));
        assert_eq!(StructKind::VrMplsReq.extent(), Some(20));
        assert_eq!(StructKind::VrVrfStatsReq.extent(), Some(240));
        assert_eq!(StructKind::VrFlowReq.extent(), None);
    }
}

//! Typed request/response records.
//!
//! Field ids follow the vRouter IDL. Only the fields the tools here use are
//! modelled; anything else on the wire is skipped on read.

use serde::Serialize;

use super::wire::{FlowOp, SandeshOp, WireValue};
use super::Sandesh;
use crate::catalog::StructKind;
use crate::protocol::{Protocol, Result, TType};

macro_rules! sandesh_struct {
    (
        $(#[$meta:meta])*
        pub struct $name:ident ($kind:ident) {
            $($id:literal => $field:ident : $ty:ty,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize)]
        pub struct $name {
            $(pub $field: $ty,)*
        }

        impl Sandesh for $name {
            const KIND: StructKind = StructKind::$kind;

            fn write<P: Protocol + ?Sized>(&self, p: &mut P) -> Result<()> {
                p.write_struct_begin(Self::KIND.name())?;
                $(
                    p.write_field_begin(stringify!($field), <$ty as WireValue>::TTYPE, $id)?;
                    self.$field.write(p)?;
                    p.write_field_end()?;
                )*
                p.write_field_stop()?;
                p.write_struct_end()
            }

            fn read_body<P: Protocol + ?Sized>(p: &mut P) -> Result<Self> {
                let mut out = Self::default();
                loop {
                    let (ttype, id) = p.read_field_begin()?;
                    if ttype == TType::STOP {
                        break;
                    }
                    match id {
                        $($id if ttype == <$ty as WireValue>::TTYPE => {
                            out.$field = WireValue::read(p)?;
                        })*
                        _ => p.skip(ttype)?,
                    }
                    p.read_field_end()?;
                }
                p.read_struct_end()?;
                Ok(out)
            }
        }
    };
}

sandesh_struct! {
    /// `vr_interface_req`: a virtual interface (vif).
    pub struct VrInterfaceReq (VrInterfaceReq) {
        1 => h_op: SandeshOp,
        2 => vifr_core: u32,
        3 => vifr_type: i32,
        4 => vifr_flags: i32,
        5 => vifr_vrf: i32,
        6 => vifr_idx: i32,
        7 => vifr_rid: i32,
        8 => vifr_os_idx: i32,
        9 => vifr_mtu: i32,
        10 => vifr_name: String,
        11 => vifr_ibytes: i64,
        12 => vifr_ipackets: i64,
        13 => vifr_ierrors: i64,
        14 => vifr_obytes: i64,
        15 => vifr_opackets: i64,
        16 => vifr_oerrors: i64,
        36 => vifr_ref_cnt: i32,
        37 => vifr_marker: i32,
        38 => vifr_mac: Vec<u8>,
        39 => vifr_ip: u32,
        40 => vifr_ip6_u: u64,
        41 => vifr_ip6_l: u64,
        46 => vifr_vlan_id: i16,
        48 => vifr_nh_id: i32,
        49 => vifr_cross_connect_idx: Vec<i32>,
        53 => vifr_transport: i8,
        58 => vifr_dpackets: u64,
        63 => vifr_mcast_vrf: i32,
    }
}

sandesh_struct! {
    /// `vr_route_req`.
    pub struct VrRouteReq (VrRouteReq) {
        1 => h_op: SandeshOp,
        2 => rtr_vrf_id: i32,
        3 => rtr_family: i32,
        4 => rtr_prefix: Vec<u8>,
        5 => rtr_prefix_len: i32,
        6 => rtr_rid: i16,
        7 => rtr_label_flags: i16,
        8 => rtr_label: i32,
        9 => rtr_nh_id: i32,
        10 => rtr_marker: Vec<u8>,
        11 => rtr_marker_plen: i32,
        12 => rtr_mac: Vec<u8>,
        13 => rtr_replace_plen: i32,
        14 => rtr_index: i32,
    }
}

sandesh_struct! {
    /// `vr_nexthop_req`.
    pub struct VrNexthopReq (VrNexthopReq) {
        1 => h_op: SandeshOp,
        2 => nhr_type: i8,
        3 => nhr_family: i8,
        4 => nhr_id: i32,
        5 => nhr_rid: i32,
        6 => nhr_encap_oif_id: Vec<i32>,
        7 => nhr_encap_len: i32,
        8 => nhr_encap_family: i32,
        9 => nhr_vrf: i32,
        10 => nhr_tun_sip: u32,
        11 => nhr_tun_dip: u32,
        12 => nhr_tun_sport: i16,
        13 => nhr_tun_dport: i16,
        14 => nhr_ref_cnt: i32,
        15 => nhr_marker: i32,
        16 => nhr_flags: u32,
        17 => nhr_encap: Vec<u8>,
        18 => nhr_nh_list: Vec<i32>,
        19 => nhr_label: i32,
        20 => nhr_label_list: Vec<i32>,
        21 => nhr_nh_count: Vec<i16>,
        22 => nhr_tun_sip6: Vec<u8>,
        23 => nhr_tun_dip6: Vec<u8>,
        24 => nhr_ecmp_config_hash: i8,
        25 => nhr_pbb_mac: Vec<u8>,
        26 => nhr_encap_crypt_oif_id: i32,
        27 => nhr_crypt_traffic: i32,
        28 => nhr_crypt_path_available: i32,
        29 => nhr_transport_label: u32,
        30 => nhr_rw_dst_mac: Vec<u8>,
    }
}

sandesh_struct! {
    /// `vr_vrf_assign_req`.
    pub struct VrVrfAssignReq (VrVrfAssignReq) {
        1 => h_op: SandeshOp,
        2 => var_rid: i16,
        3 => var_vif_index: i16,
        4 => var_vif_vrf: i32,
        5 => var_vlan_id: i16,
        6 => var_marker: i16,
        7 => var_nh_id: i32,
    }
}

sandesh_struct! {
    /// `vr_mpls_req`.
    pub struct VrMplsReq (VrMplsReq) {
        1 => h_op: SandeshOp,
        2 => mr_label: i32,
        3 => mr_rid: i16,
        4 => mr_nhid: i32,
        5 => mr_marker: i32,
    }
}

sandesh_struct! {
    /// `vr_vrf_stats_req`: per-VRF forwarding counters.
    pub struct VrVrfStatsReq (VrVrfStatsReq) {
        1 => h_op: SandeshOp,
        2 => vsr_rid: i16,
        3 => vsr_family: i16,
        4 => vsr_type: i16,
        5 => vsr_vrf: i32,
        6 => vsr_discards: i64,
        7 => vsr_resolves: i64,
        8 => vsr_receives: i64,
        9 => vsr_ecmp_composites: i64,
        10 => vsr_l2_mcast_composites: i64,
        11 => vsr_fabric_composites: i64,
        12 => vsr_udp_tunnels: i64,
        13 => vsr_udp_mpls_tunnels: i64,
        14 => vsr_gre_mpls_tunnels: i64,
        15 => vsr_l2_encaps: i64,
        16 => vsr_encaps: i64,
        17 => vsr_marker: i16,
        18 => vsr_gros: i64,
        19 => vsr_diags: i64,
        20 => vsr_encap_composites: i64,
        21 => vsr_evpn_composites: i64,
        22 => vsr_vrf_translates: i64,
        23 => vsr_vxlan_tunnels: i64,
        24 => vsr_arp_virtual_proxy: i64,
        25 => vsr_arp_virtual_stitch: i64,
        26 => vsr_arp_virtual_flood: i64,
        27 => vsr_arp_physical_stitch: i64,
        28 => vsr_arp_tor_proxy: i64,
        29 => vsr_arp_physical_flood: i64,
        30 => vsr_l2_receives: i64,
        31 => vsr_uuc_floods: i64,
        32 => vsr_pbb_tunnels: i64,
        33 => vsr_udp_mpls_over_mpls_tunnels: i64,
    }
}

sandesh_struct! {
    /// `vr_response`, the kernel's reply header. A non-zero `resp_code`
    /// is a negated errno.
    pub struct VrResponse (VrResponse) {
        1 => h_op: SandeshOp,
        2 => resp_code: i32,
    }
}

impl VrResponse {
    pub fn is_ok(&self) -> bool {
        self.resp_code >= 0
    }
}

sandesh_struct! {
    /// `vr_vxlan_req`.
    pub struct VrVxlanReq (VrVxlanReq) {
        1 => h_op: SandeshOp,
        2 => vxlanr_rid: i16,
        3 => vxlanr_vnid: i32,
        4 => vxlanr_nhid: i32,
    }
}

sandesh_struct! {
    /// `vr_flow_req`. Addresses are split into upper and lower 64-bit
    /// halves; IPv4 uses the lower half only.
    pub struct VrFlowReq (VrFlowReq) {
        1 => fr_op: FlowOp,
        2 => fr_rid: i16,
        3 => fr_index: i32,
        4 => fr_action: i16,
        5 => fr_flags: i16,
        6 => fr_rindex: i32,
        7 => fr_family: i32,
        8 => fr_flow_sip_u: u64,
        9 => fr_flow_sip_l: u64,
        10 => fr_flow_dip_u: u64,
        11 => fr_flow_dip_l: u64,
        12 => fr_flow_sport: u16,
        13 => fr_flow_dport: u16,
        14 => fr_flow_proto: i8,
        15 => fr_flow_vrf: u16,
        16 => fr_flow_dvrf: u16,
        17 => fr_mir_id: u16,
        18 => fr_sec_mir_id: u16,
        19 => fr_mir_sip: u32,
        20 => fr_mir_sport: u16,
        21 => fr_pcap_meta_data: Vec<u8>,
        22 => fr_mir_vrf: u16,
        23 => fr_ecmp_nh_index: u32,
        24 => fr_src_nh_index: u32,
        25 => fr_flow_nh_id: u32,
        26 => fr_drop_reason: u16,
        27 => fr_gen_id: i8,
        28 => fr_rflow_sip_u: u64,
        29 => fr_rflow_sip_l: u64,
        30 => fr_rflow_dip_u: u64,
        31 => fr_rflow_dip_l: u64,
        32 => fr_rflow_nh_id: u32,
        33 => fr_rflow_sport: u16,
        34 => fr_rflow_dport: u16,
        35 => fr_qos_id: u16,
        36 => fr_ttl: i8,
        37 => fr_extflags: i16,
        38 => fr_flags1: i16,
        39 => fr_underlay_ecmp_index: i8,
    }
}

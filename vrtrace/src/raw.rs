//! Decoder for raw kernel struct bytes captured by the kernel hooks.
//!
//! Each kind is read at the fixed offsets of its [`crate::catalog`] layout. The
//! whole extent is checked once up front, so no decode ever reads past the
//! captured slice.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::Serialize;
use thiserror::Error;

use crate::catalog::{mr, nhr, rtr, var, vifr, vsr, Endian, FieldSlot, StructKind};
use crate::message::{
    SandeshOp, VrInterfaceReq, VrMplsReq, VrNexthopReq, VrRouteReq, VrVrfAssignReq, VrVrfStatsReq,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RawDecodeError {
    #[error("{kind} needs {need} bytes, captured {got}")]
    ShortBuffer {
        kind: StructKind,
        need: usize,
        got: usize,
    },
}

/// A raw capture decoded into its typed record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RawRecord {
    Interface(VrInterfaceReq),
    Route(VrRouteReq),
    Nexthop(VrNexthopReq),
    VrfAssign(VrVrfAssignReq),
    Mpls(VrMplsReq),
    VrfStats(VrVrfStatsReq),
}

impl RawRecord {
    pub fn kind(&self) -> StructKind {
        match self {
            RawRecord::Interface(_) => StructKind::VrInterfaceReq,
            RawRecord::Route(_) => StructKind::VrRouteReq,
            RawRecord::Nexthop(_) => StructKind::VrNexthopReq,
            RawRecord::VrfAssign(_) => StructKind::VrVrfAssignReq,
            RawRecord::Mpls(_) => StructKind::VrMplsReq,
            RawRecord::VrfStats(_) => StructKind::VrVrfStatsReq,
        }
    }
}

/// Decode `buf` as `kind`. `Ok(None)` when the kind has no raw layout.
pub fn decode(kind: StructKind, buf: &[u8]) -> Result<Option<RawRecord>, RawDecodeError> {
    let record = match kind {
        StructKind::VrInterfaceReq => RawRecord::Interface(decode_interface(buf)?),
        StructKind::VrRouteReq => RawRecord::Route(decode_route(buf)?),
        StructKind::VrNexthopReq => RawRecord::Nexthop(decode_nexthop(buf)?),
        StructKind::VrVrfAssignReq => RawRecord::VrfAssign(decode_vrf_assign(buf)?),
        StructKind::VrMplsReq => RawRecord::Mpls(decode_mpls(buf)?),
        StructKind::VrVrfStatsReq => RawRecord::VrfStats(decode_vrf_stats(buf)?),
        _ => return Ok(None),
    };
    Ok(Some(record))
}

/// Decode by struct name, as reported alongside a capture.
///
/// Unknown names decode to `Ok(None)`; the caller shows the bytes instead.
pub fn decode_named(name: &str, buf: &[u8]) -> Result<Option<RawRecord>, RawDecodeError> {
    match StructKind::from_name(name) {
        Some(kind) => decode(kind, buf),
        None => Ok(None),
    }
}

pub fn decode_interface(buf: &[u8]) -> Result<VrInterfaceReq, RawDecodeError> {
    let r = RawBuf::new(StructKind::VrInterfaceReq, buf)?;
    Ok(VrInterfaceReq {
        h_op: r.op(vifr::H_OP),
        vifr_core: r.uint(vifr::CORE) as u32,
        vifr_type: r.uint(vifr::TYPE) as i32,
        vifr_flags: r.uint(vifr::FLAGS) as i32,
        vifr_vrf: r.uint(vifr::VRF) as i32,
        vifr_idx: r.uint(vifr::IDX) as i32,
        vifr_rid: r.uint(vifr::RID) as i32,
        vifr_os_idx: r.uint(vifr::OS_IDX) as i32,
        vifr_mtu: r.uint(vifr::MTU) as i32,
        vifr_ref_cnt: r.uint(vifr::REF_CNT) as i32,
        vifr_marker: r.uint(vifr::MARKER) as i32,
        vifr_ip: r.uint(vifr::IP) as u32,
        vifr_ip6_u: r.uint(vifr::IP6_U),
        vifr_ip6_l: r.uint(vifr::IP6_L),
        vifr_vlan_id: r.uint(vifr::VLAN_ID) as i16,
        vifr_nh_id: r.uint(vifr::NH_ID) as i32,
        vifr_transport: r.uint(vifr::TRANSPORT) as i8,
        ..Default::default()
    })
}

pub fn decode_route(buf: &[u8]) -> Result<VrRouteReq, RawDecodeError> {
    let r = RawBuf::new(StructKind::VrRouteReq, buf)?;
    Ok(VrRouteReq {
        h_op: r.op(rtr::H_OP),
        rtr_vrf_id: r.uint(rtr::VRF_ID) as i32,
        rtr_family: r.uint(rtr::FAMILY) as i32,
        rtr_rid: r.uint(rtr::RID) as i16,
        rtr_nh_id: r.uint(rtr::NH_ID) as i32,
        rtr_index: r.uint(rtr::INDEX) as i32,
        ..Default::default()
    })
}

pub fn decode_nexthop(buf: &[u8]) -> Result<VrNexthopReq, RawDecodeError> {
    let r = RawBuf::new(StructKind::VrNexthopReq, buf)?;
    Ok(VrNexthopReq {
        h_op: r.op(nhr::H_OP),
        nhr_type: r.uint(nhr::TYPE) as i8,
        nhr_family: r.uint(nhr::FAMILY) as i8,
        nhr_id: r.uint(nhr::ID) as i32,
        nhr_rid: r.uint(nhr::RID) as i32,
        nhr_flags: r.uint(nhr::FLAGS) as u32,
        ..Default::default()
    })
}

pub fn decode_vrf_assign(buf: &[u8]) -> Result<VrVrfAssignReq, RawDecodeError> {
    let r = RawBuf::new(StructKind::VrVrfAssignReq, buf)?;
    Ok(VrVrfAssignReq {
        h_op: r.op(var::H_OP),
        var_rid: r.uint(var::RID) as i16,
        var_vif_index: r.uint(var::VIF_INDEX) as i16,
        var_vif_vrf: r.uint(var::VIF_VRF) as i32,
        var_vlan_id: r.uint(var::VLAN_ID) as i16,
        var_marker: r.uint(var::MARKER) as i16,
        var_nh_id: r.uint(var::NH_ID) as i32,
    })
}

pub fn decode_mpls(buf: &[u8]) -> Result<VrMplsReq, RawDecodeError> {
    let r = RawBuf::new(StructKind::VrMplsReq, buf)?;
    Ok(VrMplsReq {
        h_op: r.op(mr::H_OP),
        mr_label: r.uint(mr::LABEL) as i32,
        mr_rid: r.uint(mr::RID) as i16,
        mr_nhid: r.uint(mr::NHID) as i32,
        mr_marker: r.uint(mr::MARKER) as i32,
    })
}

pub fn decode_vrf_stats(buf: &[u8]) -> Result<VrVrfStatsReq, RawDecodeError> {
    let r = RawBuf::new(StructKind::VrVrfStatsReq, buf)?;
    let c = |slot| r.uint(slot) as i64;
    Ok(VrVrfStatsReq {
        h_op: r.op(vsr::H_OP),
        vsr_rid: r.uint(vsr::RID) as i16,
        vsr_family: r.uint(vsr::FAMILY) as i16,
        vsr_type: r.uint(vsr::TYPE) as i16,
        vsr_vrf: r.uint(vsr::VRF) as i32,
        vsr_discards: c(vsr::DISCARDS),
        vsr_resolves: c(vsr::RESOLVES),
        vsr_receives: c(vsr::RECEIVES),
        vsr_ecmp_composites: c(vsr::ECMP_COMPOSITES),
        vsr_l2_mcast_composites: c(vsr::L2_MCAST_COMPOSITES),
        vsr_fabric_composites: c(vsr::FABRIC_COMPOSITES),
        vsr_udp_tunnels: c(vsr::UDP_TUNNELS),
        vsr_udp_mpls_tunnels: c(vsr::UDP_MPLS_TUNNELS),
        vsr_gre_mpls_tunnels: c(vsr::GRE_MPLS_TUNNELS),
        vsr_l2_encaps: c(vsr::L2_ENCAPS),
        vsr_encaps: c(vsr::ENCAPS),
        vsr_marker: r.uint(vsr::MARKER) as i16,
        vsr_gros: c(vsr::GROS),
        vsr_diags: c(vsr::DIAGS),
        vsr_encap_composites: c(vsr::ENCAP_COMPOSITES),
        vsr_evpn_composites: c(vsr::EVPN_COMPOSITES),
        vsr_vrf_translates: c(vsr::VRF_TRANSLATES),
        vsr_vxlan_tunnels: c(vsr::VXLAN_TUNNELS),
        vsr_arp_virtual_proxy: c(vsr::ARP_VIRTUAL_PROXY),
        vsr_arp_virtual_stitch: c(vsr::ARP_VIRTUAL_STITCH),
        vsr_arp_virtual_flood: c(vsr::ARP_VIRTUAL_FLOOD),
        vsr_arp_physical_stitch: c(vsr::ARP_PHYSICAL_STITCH),
        vsr_arp_tor_proxy: c(vsr::ARP_TOR_PROXY),
        vsr_arp_physical_flood: c(vsr::ARP_PHYSICAL_FLOOD),
        vsr_l2_receives: c(vsr::L2_RECEIVES),
        vsr_uuc_floods: c(vsr::UUC_FLOODS),
        vsr_pbb_tunnels: c(vsr::PBB_TUNNELS),
        vsr_udp_mpls_over_mpls_tunnels: c(vsr::UDP_MPLS_OVER_MPLS_TUNNELS),
    })
}

/// A capture already checked to cover the kind's extent.
struct RawBuf<'a> {
    buf: &'a [u8],
}

impl<'a> RawBuf<'a> {
    fn new(kind: StructKind, buf: &'a [u8]) -> Result<Self, RawDecodeError> {
        let need = kind.extent().unwrap_or(0);
        if buf.len() < need {
            return Err(RawDecodeError::ShortBuffer {
                kind,
                need,
                got: buf.len(),
            });
        }
        Ok(Self { buf })
    }

    /// Zero-extended value of a 1, 2, 4 or 8 byte slot.
    fn uint(&self, slot: FieldSlot) -> u64 {
        let b = &self.buf[slot.offset..slot.end()];
        match (slot.width, slot.endian) {
            (1, _) => b[0] as u64,
            (2, Endian::Little) => LittleEndian::read_u16(b) as u64,
            (2, Endian::Big) => BigEndian::read_u16(b) as u64,
            (4, Endian::Little) => LittleEndian::read_u32(b) as u64,
            (4, Endian::Big) => BigEndian::read_u32(b) as u64,
            (_, Endian::Little) => LittleEndian::read_u64(b),
            (_, Endian::Big) => BigEndian::read_u64(b),
        }
    }

    // The kernel's sandesh_op enum fits in the low byte.
    fn op(&self, slot: FieldSlot) -> SandeshOp {
        SandeshOp(self.buf[slot.offset] as i32)
    }
}

/// Raw field values of a capture by slot name, for kinds the caller wants
/// to inspect without a typed record.
pub fn fields(kind: StructKind, buf: &[u8]) -> Result<Vec<(&'static str, u64)>, RawDecodeError> {
    let Some(layout) = kind.layout() else {
        return Ok(Vec::new());
    };
    let r = RawBuf::new(kind, buf)?;
    Ok(layout.iter().map(|slot| (slot.name, r.uint(*slot))).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le32(buf: &mut [u8], off: usize, v: u32) {
        buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
    }

    fn le16(buf: &mut [u8], off: usize, v: u16) {
        buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
    }

    fn le64(buf: &mut [u8], off: usize, v: u64) {
        buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
    }

    #[test]
    fn test_interface_mixed_endianness() {
        let mut buf = vec![0u8; 75];
        buf[0] = 0;
        le32(&mut buf, 8, 3);
        le32(&mut buf, 20, 7);
        le32(&mut buf, 32, 1514);
        buf[44..48].copy_from_slice(&[10, 0, 0, 1]);
        buf[48..52].copy_from_slice(&[0xaa; 4]);
        buf[52..60].copy_from_slice(&[0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0]);
        buf[60..68].copy_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]);
        le16(&mut buf, 68, 100);
        le32(&mut buf, 70, 49);
        buf[74] = 1;

        let vif = decode_interface(&buf).unwrap();
        assert_eq!(vif.h_op, SandeshOp::ADD);
        assert_eq!(vif.vifr_type, 3);
        assert_eq!(vif.vifr_idx, 7);
        assert_eq!(vif.vifr_mtu, 1514);
        assert_eq!(vif.vifr_ip, 0x0a00_0001);
        assert_eq!(vif.vifr_ip6_u, 0x2001_0db8_0000_0000);
        assert_eq!(vif.vifr_ip6_l, 1);
        assert_eq!(vif.vifr_vlan_id, 100);
        assert_eq!(vif.vifr_nh_id, 49);
        assert_eq!(vif.vifr_transport, 1);
        assert!(vif.vifr_name.is_empty());
    }

    #[test]
    fn test_nexthop_bytes() {
        let mut buf = vec![0u8; 20];
        buf[0] = 1;
        buf[4..6].copy_from_slice(&[0xff, 0xff]);
        buf[6] = 2;
        buf[7] = 7;
        le32(&mut buf, 8, 49);
        le32(&mut buf, 16, 0x8000_0001);
        let nh = decode_nexthop(&buf).unwrap();
        assert_eq!(nh.h_op, SandeshOp::GET);
        assert_eq!(nh.nhr_type, 2);
        assert_eq!(nh.nhr_family, 7);
        assert_eq!(nh.nhr_id, 49);
        assert_eq!(nh.nhr_rid, 0);
        assert_eq!(nh.nhr_flags, 0x8000_0001);
    }

    #[test]
    fn test_route_and_mpls_skip_padding() {
        let mut rt = vec![0xeeu8; 24];
        le32(&mut rt, 0, 0);
        le32(&mut rt, 4, 1);
        le32(&mut rt, 8, 2);
        le16(&mut rt, 14, 0);
        le32(&mut rt, 16, 12);
        le32(&mut rt, 20, 0xffff_ffff);
        let rt = decode_route(&rt).unwrap();
        assert_eq!(rt.rtr_vrf_id, 1);
        assert_eq!(rt.rtr_family, 2);
        assert_eq!(rt.rtr_rid, 0);
        assert_eq!(rt.rtr_nh_id, 12);
        assert_eq!(rt.rtr_index, -1);

        let mut mpls = vec![0xeeu8; 20];
        le32(&mut mpls, 0, 2);
        le32(&mut mpls, 4, 16);
        le16(&mut mpls, 8, 0);
        le32(&mut mpls, 12, 5);
        le32(&mut mpls, 16, 0);
        let mpls = decode_mpls(&mpls).unwrap();
        assert_eq!(mpls.h_op, SandeshOp::DEL);
        assert_eq!(mpls.mr_label, 16);
        assert_eq!(mpls.mr_nhid, 5);
    }

    #[test]
    fn test_vrf_assign() {
        let mut buf = vec![0u8; 20];
        le16(&mut buf, 4, 0);
        le16(&mut buf, 6, 3);
        le32(&mut buf, 8, 9);
        le16(&mut buf, 12, 0xffff);
        le16(&mut buf, 14, 2);
        le32(&mut buf, 16, 11);
        let var = decode_vrf_assign(&buf).unwrap();
        assert_eq!(var.var_vif_index, 3);
        assert_eq!(var.var_vif_vrf, 9);
        assert_eq!(var.var_vlan_id, -1);
        assert_eq!(var.var_marker, 2);
        assert_eq!(var.var_nh_id, 11);
    }

    #[test]
    fn test_vrf_stats_marker_and_counters() {
        let mut buf = vec![0u8; 240];
        le32(&mut buf, 12, 4);
        le64(&mut buf, 16, 1);
        le64(&mut buf, 96, 11);
        le16(&mut buf, 104, 5);
        buf[106..112].copy_from_slice(&[0xff; 6]);
        le64(&mut buf, 112, 12);
        le64(&mut buf, 232, 27);
        let vsr = decode_vrf_stats(&buf).unwrap();
        assert_eq!(vsr.vsr_vrf, 4);
        assert_eq!(vsr.vsr_discards, 1);
        assert_eq!(vsr.vsr_encaps, 11);
        assert_eq!(vsr.vsr_marker, 5);
        assert_eq!(vsr.vsr_gros, 12);
        assert_eq!(vsr.vsr_udp_mpls_over_mpls_tunnels, 27);
    }

    #[test]
    fn test_short_buffer_rejected() {
        for kind in StructKind::ALL {
            let Some(extent) = kind.extent() else { continue };
            let buf = vec![0u8; extent - 1];
            assert_eq!(
                decode(kind, &buf),
                Err(RawDecodeError::ShortBuffer {
                    kind,
                    need: extent,
                    got: extent - 1,
                })
            );
            assert!(decode(kind, &vec![0u8; extent]).unwrap().is_some());
        }
        assert_eq!(
            decode_route(&[0u8; 23]),
            Err(RawDecodeError::ShortBuffer {
                kind: StructKind::VrRouteReq,
                need: 24,
                got: 23,
            })
        );
    }

    #[test]
    fn test_decode_is_deterministic_and_ignores_trailing_bytes() {
        let mut buf = vec![0u8; 64];
        le32(&mut buf, 4, 16);
        let a = decode_named("vr_mpls_req", &buf).unwrap();
        let b = decode_named("vr_mpls_req", &buf[..20]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.map(|r| r.kind()), Some(StructKind::VrMplsReq));
    }

    #[test]
    fn test_unknown_or_layoutless_kind() {
        assert_eq!(decode_named("vr_nonexistent", &[1, 2, 3]), Ok(None));
        assert_eq!(decode(StructKind::VrFlowReq, &[]), Ok(None));
        assert!(fields(StructKind::VrFlowReq, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_fields_by_slot_name() {
        let mut buf = vec![0u8; 20];
        le32(&mut buf, 4, 16);
        let named = fields(StructKind::VrMplsReq, &buf).unwrap();
        assert_eq!(named[1], ("mr_label", 16));
        assert_eq!(named.len(), 5);
    }
}
